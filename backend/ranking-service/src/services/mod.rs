pub mod ranking;

pub use ranking::{
    AffinityScorer, FeedRanker, ModelHandle, ModelScorer, RankingError, ScoringStrategy,
};
