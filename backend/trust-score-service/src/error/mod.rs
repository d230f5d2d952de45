use signal_store::StoreError;
use thiserror::Error;
use uuid::Uuid;

#[derive(Debug, Error)]
pub enum TrustScoreError {
    #[error("Signal store error: {0}")]
    Store(#[from] StoreError),

    #[error("Event not found: {0}")]
    EventNotFound(Uuid),
}

impl TrustScoreError {
    /// Dependency failures may clear up on their own; a missing event will not.
    pub fn is_retryable(&self) -> bool {
        match self {
            TrustScoreError::Store(e) => e.is_retryable(),
            TrustScoreError::EventNotFound(_) => false,
        }
    }
}

pub type Result<T> = std::result::Result<T, TrustScoreError>;
