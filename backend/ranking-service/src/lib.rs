pub mod config;
pub mod metrics;
pub mod models;
pub mod services;

pub use config::{Config, RankingConfig};
pub use models::{EventAggregates, RankScore, RankedEvent, UserSnapshot};
pub use services::{
    AffinityScorer, FeedRanker, ModelHandle, ModelScorer, RankingError, ScoringStrategy,
};
