/// Ranking Module
///
/// Hybrid "for you" ranking over the event catalogue.
///
/// # Architecture
/// - **Affinity Layer**: ordered rule groups producing an integer affinity score
/// - **Model Layer**: ONNX relevance model inference with tract-onnx
/// - **Strategy**: pure switch on the user's interaction volume
///
/// # Workflow
/// 1. Count the user's interactions and pick a strategy
/// 2. Fetch the user snapshot and per-event aggregates
/// 3. Score every candidate with the chosen scorer
/// 4. Sort by score (event id breaks ties) and take the top N
pub mod affinity;
pub mod engine;
pub mod features;
pub mod model;
pub mod strategy;

pub use affinity::{AffinityContribution, AffinityScorer};
pub use engine::FeedRanker;
pub use features::{extract_features, FeatureVector};
pub use model::{ModelHandle, ModelScorer, OnnxRelevanceModel, RelevanceModel, FEATURE_VECTOR_SIZE};
pub use strategy::{select_strategy, ScoringStrategy};

use signal_store::StoreError;
use thiserror::Error;
use uuid::Uuid;

/// Shown to end users for any ranking failure
pub const PUBLIC_FAILURE_MESSAGE: &str = "ranking unavailable";

#[derive(Debug, Error)]
pub enum RankingError {
    #[error("User not found: {0}")]
    UserNotFound(Uuid),

    #[error("Relevance model unavailable: {0}")]
    ModelUnavailable(String),

    #[error("Model loading failed: {0}")]
    ModelLoadError(String),

    #[error("Feature extraction failed: {0}")]
    FeatureExtractionError(String),

    #[error("Model inference failed: {0}")]
    InferenceError(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Signal store error: {0}")]
    Store(#[from] StoreError),
}

impl RankingError {
    /// Dependency failures (store, model) are worth retrying; bad input is not.
    pub fn is_retryable(&self) -> bool {
        match self {
            RankingError::Store(e) => e.is_retryable(),
            RankingError::ModelUnavailable(_) | RankingError::ModelLoadError(_) => true,
            RankingError::UserNotFound(_)
            | RankingError::FeatureExtractionError(_)
            | RankingError::InferenceError(_)
            | RankingError::InvalidInput(_) => false,
        }
    }

    pub fn public_message(&self) -> &'static str {
        PUBLIC_FAILURE_MESSAGE
    }

    /// Label used for the outcome metric
    pub fn kind(&self) -> &'static str {
        match self {
            RankingError::UserNotFound(_) => "user_not_found",
            RankingError::ModelUnavailable(_) => "model_unavailable",
            RankingError::ModelLoadError(_) => "model_load_error",
            RankingError::FeatureExtractionError(_) => "feature_error",
            RankingError::InferenceError(_) => "inference_error",
            RankingError::InvalidInput(_) => "invalid_input",
            RankingError::Store(_) => "store_error",
        }
    }
}

pub type Result<T> = std::result::Result<T, RankingError>;
