/// Resilience helpers for calls that leave the process
///
/// - **Timeout**: bounds a single call and keeps the inner error type intact
/// - **Retry**: exponential backoff with jitter, gated on a retryability predicate
/// - **Presets**: tuned settings for the signal store and batch jobs
///
/// # Example: Signal store query with timeout
///
/// ```rust,no_run
/// use resilience::{presets, with_timeout_result, TimeoutError};
///
/// #[tokio::main]
/// async fn main() {
///     let config = presets::signal_store_config();
///
///     let result: Result<u32, TimeoutError<String>> = with_timeout_result(
///         config.timeout.duration,
///         async { Ok::<_, String>(7) },
///     )
///     .await;
/// }
/// ```

pub mod presets;
pub mod retry;
pub mod timeout;

pub use presets::{batch_job_config, signal_store_config, ServiceConfig};
pub use retry::{with_retry, with_retry_if, RetryConfig, RetryError};
pub use timeout::{with_timeout, with_timeout_result, TimeoutConfig, TimeoutError};
