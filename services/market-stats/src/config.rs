//! Pipeline configuration
//!
//! Every setting has a default; `PipelineConfig::from_env` layers
//! environment overrides (optionally from a `.env` file) on top.

use tracing::{debug, info};

/// Errors while reading configuration from the environment.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?} (expected true/false)")]
    InvalidBool { key: &'static str, value: String },
}

pub const ENV_PARALLEL: &str = "MARKET_STATS_PARALLEL";
pub const ENV_REJECT_EMPTY_BATCH: &str = "MARKET_STATS_REJECT_EMPTY_BATCH";

/// Configuration for the batch ingestion front end.
#[derive(Debug, Clone)]
pub struct IngestionConfig {
    /// Fail the batch when the source yields no documents at all.
    pub reject_empty_batch: bool,
}

impl Default for IngestionConfig {
    fn default() -> Self {
        Self {
            reject_empty_batch: true,
        }
    }
}

/// Configuration for the windowed aggregator.
#[derive(Debug, Clone, Default)]
pub struct AggregatorConfig {
    /// Process partitions on the rayon thread pool.
    pub parallel: bool,
}

/// Full pipeline configuration.
#[derive(Debug, Clone, Default)]
pub struct PipelineConfig {
    pub ingestion: IngestionConfig,
    pub aggregator: AggregatorConfig,
}

impl PipelineConfig {
    /// Defaults overridden by `MARKET_STATS_*` environment variables.
    ///
    /// A `.env` file in the working directory is loaded first when present.
    pub fn from_env() -> Result<Self, ConfigError> {
        if let Ok(path) = dotenv::dotenv() {
            debug!(path = %path.display(), "Loaded .env file");
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup (used by `from_env` and tests).
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();

        if let Some(raw) = lookup(ENV_PARALLEL) {
            config.aggregator.parallel = parse_bool(ENV_PARALLEL, &raw)?;
        }
        if let Some(raw) = lookup(ENV_REJECT_EMPTY_BATCH) {
            config.ingestion.reject_empty_batch = parse_bool(ENV_REJECT_EMPTY_BATCH, &raw)?;
        }

        info!(
            parallel = config.aggregator.parallel,
            reject_empty_batch = config.ingestion.reject_empty_batch,
            "Pipeline configuration loaded"
        );
        Ok(config)
    }
}

fn parse_bool(key: &'static str, raw: &str) -> Result<bool, ConfigError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        _ => Err(ConfigError::InvalidBool {
            key,
            value: raw.to_string(),
        }),
    }
}
