/// Preset configurations for the call sites in this workspace
use crate::retry::RetryConfig;
use crate::timeout::TimeoutConfig;
use std::time::Duration;

/// Configuration bundle for a dependency type
#[derive(Debug, Clone)]
pub struct ServiceConfig {
    pub timeout: TimeoutConfig,
    pub retry: Option<RetryConfig>,
}

/// Signal store queries issued while serving a request
///
/// - Timeout: 2s per call
/// - No retry: the request fails with a retryable error and the caller decides
pub fn signal_store_config() -> ServiceConfig {
    ServiceConfig {
        timeout: TimeoutConfig::default(),
        retry: None,
    }
}

/// Offline batch jobs (trust score recompute)
///
/// - Timeout: 10s per call
/// - Retry: 3 attempts with exponential backoff
pub fn batch_job_config() -> ServiceConfig {
    ServiceConfig {
        timeout: TimeoutConfig {
            duration: Duration::from_secs(10),
        },
        retry: Some(RetryConfig {
            max_retries: 3,
            initial_backoff: Duration::from_millis(200),
            max_backoff: Duration::from_secs(5),
            backoff_multiplier: 2.0,
            jitter: true,
        }),
    }
}
