/// Timeout wrapper for async operations
use std::future::Future;
use std::time::Duration;
use tokio::time::timeout;

#[derive(Debug, Clone)]
pub struct TimeoutConfig {
    pub duration: Duration,
}

impl Default for TimeoutConfig {
    fn default() -> Self {
        Self {
            duration: Duration::from_secs(2),
        }
    }
}

impl TimeoutConfig {
    pub fn from_millis(millis: u64) -> Self {
        Self {
            duration: Duration::from_millis(millis),
        }
    }
}

/// Outcome of a bounded call.
///
/// `Inner` carries the operation's own error untouched so callers can still
/// classify it (retryable or not) after the timeout layer.
#[derive(Debug, thiserror::Error)]
pub enum TimeoutError<E> {
    #[error("Operation timed out after {0:?}")]
    Elapsed(Duration),
    #[error(transparent)]
    Inner(E),
}

impl<E> TimeoutError<E> {
    /// Collapse into the caller's error type.
    pub fn into_inner_or(self, on_elapsed: impl FnOnce(Duration) -> E) -> E {
        match self {
            TimeoutError::Elapsed(d) => on_elapsed(d),
            TimeoutError::Inner(e) => e,
        }
    }
}

/// Execute a future with timeout
pub async fn with_timeout<F, T>(duration: Duration, future: F) -> Result<T, TimeoutError<()>>
where
    F: Future<Output = T>,
{
    timeout(duration, future)
        .await
        .map_err(|_| TimeoutError::Elapsed(duration))
}

/// Execute a fallible future with timeout
pub async fn with_timeout_result<F, T, E>(duration: Duration, future: F) -> Result<T, TimeoutError<E>>
where
    F: Future<Output = Result<T, E>>,
{
    match timeout(duration, future).await {
        Ok(Ok(result)) => Ok(result),
        Ok(Err(e)) => Err(TimeoutError::Inner(e)),
        Err(_) => Err(TimeoutError::Elapsed(duration)),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_timeout_success() {
        let result = with_timeout(Duration::from_secs(1), async { 42 }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_timeout_elapsed() {
        let result = with_timeout(Duration::from_millis(10), async {
            tokio::time::sleep(Duration::from_secs(1)).await;
            42
        })
        .await;

        assert!(matches!(result, Err(TimeoutError::Elapsed(_))));
    }

    #[tokio::test]
    async fn test_timeout_result_keeps_inner_error() {
        let result = with_timeout_result(Duration::from_secs(1), async {
            Err::<i32, _>("connection reset")
        })
        .await;

        match result {
            Err(TimeoutError::Inner(e)) => assert_eq!(e, "connection reset"),
            other => panic!("expected inner error, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_into_inner_or_maps_elapsed() {
        let result = with_timeout_result(Duration::from_millis(5), async {
            tokio::time::sleep(Duration::from_millis(200)).await;
            Ok::<_, String>(1)
        })
        .await;

        let err = result.unwrap_err();
        assert!(matches!(err, TimeoutError::Elapsed(_)));
        let collapsed = err.into_inner_or(|d| format!("timeout {}ms", d.as_millis()));
        assert_eq!(collapsed, "timeout 5ms");
    }
}
