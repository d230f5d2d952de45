use resilience::TimeoutConfig;
use serde::Deserialize;
use std::time::Duration;

fn default_service_name() -> String {
    "ranking-service".to_string()
}

fn default_signal_store_timeout_ms() -> u64 {
    resilience::signal_store_config().timeout.duration.as_millis() as u64
}

fn default_learned_threshold() -> i64 {
    100
}

fn default_top_n() -> usize {
    10
}

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub service: ServiceConfig,
    pub ranking: RankingConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ServiceConfig {
    #[serde(default = "default_service_name")]
    pub service_name: String,
    #[serde(default = "default_signal_store_timeout_ms")]
    pub signal_store_timeout_ms: u64,
}

/// `RANKING_*` environment variables
#[derive(Debug, Clone, Deserialize)]
pub struct RankingConfig {
    /// ONNX relevance model; learned ranking is unavailable without it
    #[serde(default)]
    pub model_path: Option<String>,
    /// Interaction count at which a user switches to the learned strategy
    #[serde(default = "default_learned_threshold")]
    pub learned_threshold: i64,
    #[serde(default = "default_top_n")]
    pub default_top_n: usize,
}

impl Default for RankingConfig {
    fn default() -> Self {
        Self {
            model_path: None,
            learned_threshold: default_learned_threshold(),
            default_top_n: default_top_n(),
        }
    }
}

impl Config {
    pub fn from_env() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();

        Ok(Config {
            service: envy::from_env::<ServiceConfig>()?,
            ranking: envy::prefixed("RANKING_").from_env::<RankingConfig>()?,
        })
    }
}

impl ServiceConfig {
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
        env::remove_var("RANKING_MODEL_PATH");
        env::remove_var("RANKING_LEARNED_THRESHOLD");
        env::remove_var("RANKING_DEFAULT_TOP_N");

        let config = Config::from_env().unwrap();
        assert_eq!(config.ranking.learned_threshold, 100);
        assert_eq!(config.ranking.default_top_n, 10);
        assert!(config.ranking.model_path.is_none());
        assert_eq!(config.service.service_name, "ranking-service");
        assert_eq!(config.service.signal_store_timeout(), Duration::from_secs(2));
    }

    #[test]
    #[serial]
    fn test_overrides() {
        env::set_var("RANKING_MODEL_PATH", "/models/relevance.onnx");
        env::set_var("RANKING_LEARNED_THRESHOLD", "250");
        env::set_var("SIGNAL_STORE_TIMEOUT_MS", "750");
        let config = Config::from_env().unwrap();
        env::remove_var("RANKING_MODEL_PATH");
        env::remove_var("RANKING_LEARNED_THRESHOLD");
        env::remove_var("SIGNAL_STORE_TIMEOUT_MS");

        assert_eq!(
            config.ranking.model_path.as_deref(),
            Some("/models/relevance.onnx")
        );
        assert_eq!(config.ranking.learned_threshold, 250);
        assert_eq!(
            config.service.signal_store_timeout(),
            Duration::from_millis(750)
        );
    }
}
