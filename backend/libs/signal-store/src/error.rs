use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Signal store call timed out after {0:?}")]
    Timeout(Duration),

    #[error("Signal store unavailable: {0}")]
    Unavailable(String),

    /// Optimistic concurrency token did not match; the caller should re-derive.
    #[error("Concurrent update conflict: {0}")]
    Conflict(String),
}

impl StoreError {
    /// Whether the same call may succeed if issued again.
    pub fn is_retryable(&self) -> bool {
        match self {
            StoreError::Timeout(_) | StoreError::Unavailable(_) | StoreError::Conflict(_) => true,
            StoreError::Database(e) => matches!(
                e,
                sqlx::Error::PoolTimedOut
                    | sqlx::Error::PoolClosed
                    | sqlx::Error::Io(_)
                    | sqlx::Error::WorkerCrashed
            ),
        }
    }
}

pub type StoreResult<T> = std::result::Result<T, StoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(StoreError::Timeout(Duration::from_millis(5)).is_retryable());
        assert!(StoreError::Conflict("version".into()).is_retryable());
        assert!(StoreError::Database(sqlx::Error::PoolTimedOut).is_retryable());
        assert!(!StoreError::Database(sqlx::Error::RowNotFound).is_retryable());
    }
}
