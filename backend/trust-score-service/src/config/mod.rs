use resilience::TimeoutConfig;
use serde::Deserialize;
use std::time::Duration;

fn default_service_name() -> String {
    "trust-score-service".to_string()
}

fn default_environment() -> String {
    "development".to_string()
}

fn default_signal_store_timeout_ms() -> u64 {
    resilience::signal_store_config().timeout.duration.as_millis() as u64
}

/// Service-level settings read from the process environment
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_service_name")]
    pub service_name: String,
    #[serde(default = "default_environment")]
    pub environment: String,
    /// Upper bound on a single signal store call
    #[serde(default = "default_signal_store_timeout_ms")]
    pub signal_store_timeout_ms: u64,
}

impl Config {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env::<Config>()
    }

    pub fn signal_store_timeout(&self) -> Duration {
        TimeoutConfig::from_millis(self.signal_store_timeout_ms).duration
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;
    use std::env;

    #[test]
    #[serial]
    fn test_defaults() {
        env::remove_var("SIGNAL_STORE_TIMEOUT_MS");
        env::remove_var("SERVICE_NAME");
        let config = Config::from_env().unwrap();
        assert_eq!(config.service_name, "trust-score-service");
        assert_eq!(config.signal_store_timeout(), Duration::from_secs(2));
    }

    #[test]
    #[serial]
    fn test_timeout_override() {
        env::set_var("SIGNAL_STORE_TIMEOUT_MS", "350");
        let config = Config::from_env().unwrap();
        env::remove_var("SIGNAL_STORE_TIMEOUT_MS");
        assert_eq!(config.signal_store_timeout(), Duration::from_millis(350));
    }
}
