//! Configuration management for the scoring service

use std::path::{Path, PathBuf};
use std::time::Duration;

use config::{Config, Environment, File};
use serde::Deserialize;

use crate::application::ScoringPolicy;
use crate::domain::{DecisionThreshold, DEFAULT_THRESHOLD};
use crate::ports::DEFAULT_HISTORY_CAPACITY;

/// Environment variable naming a TOML config file.
pub const CONFIG_ENV: &str = "MEDIPULSE_CONFIG";

/// Prefix for per-key environment overrides, e.g. `MEDIPULSE_THRESHOLD`.
pub const ENV_PREFIX: &str = "MEDIPULSE";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to load configuration: {0}")]
    Load(#[from] config::ConfigError),

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}

/// Main application configuration
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct AppConfig {
    /// Probability at or above which a result is labelled High
    #[serde(default = "default_threshold")]
    pub threshold: f64,
    /// Entries retained per user
    #[serde(default = "default_history_capacity")]
    pub history_capacity: usize,
    /// Directory holding model.json, preprocessing.json and manifest.json
    #[serde(default = "default_artifacts_dir")]
    pub artifacts_dir: PathBuf,
    #[serde(default = "default_database_path")]
    pub database_path: PathBuf,
    /// Per-request deadline in milliseconds
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,
    /// Wait before the single storage retry
    #[serde(default = "default_storage_retry_backoff_ms")]
    pub storage_retry_backoff_ms: u64,
    /// Load artifacts even when no manifest is present
    #[serde(default)]
    pub allow_unverified_artifacts: bool,
}

fn default_threshold() -> f64 {
    DEFAULT_THRESHOLD
}

fn default_history_capacity() -> usize {
    DEFAULT_HISTORY_CAPACITY
}

fn default_artifacts_dir() -> PathBuf {
    PathBuf::from("models")
}

fn default_database_path() -> PathBuf {
    PathBuf::from("data/medipulse.db")
}

fn default_request_timeout_ms() -> u64 {
    5000
}

fn default_storage_retry_backoff_ms() -> u64 {
    100
}

impl AppConfig {
    /// Load configuration from `path` (or `MEDIPULSE_CONFIG` if unset) plus
    /// `MEDIPULSE_*` environment overrides.
    ///
    /// # Errors
    /// Returns error if a named file is missing or unparseable, or the result
    /// fails validation.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let from_env = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
        let file = path.map(Path::to_path_buf).or(from_env);
        Self::load_from_sources(file.as_deref(), Environment::with_prefix(ENV_PREFIX))
    }

    fn load_from_sources(file: Option<&Path>, env: Environment) -> Result<Self, ConfigError> {
        let mut builder = Config::builder();
        if let Some(file) = file {
            builder = builder.add_source(File::from(file));
        }
        let config = builder
            .add_source(env.try_parsing(true))
            .build()?
            .try_deserialize::<Self>()?;

        config.validate()?;
        Ok(config)
    }

    /// # Errors
    /// Returns `ConfigError::Invalid` naming the first bad key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.decision_threshold()?;
        if self.history_capacity == 0 {
            return Err(ConfigError::Invalid("history_capacity must be at least 1".into()));
        }
        if self.request_timeout_ms == 0 {
            return Err(ConfigError::Invalid("request_timeout_ms must be positive".into()));
        }
        Ok(())
    }

    /// The configured threshold.
    ///
    /// # Errors
    /// Returns `ConfigError::Invalid` if it lies outside `[0, 1]`.
    pub fn decision_threshold(&self) -> Result<DecisionThreshold, ConfigError> {
        DecisionThreshold::new(self.threshold)
            .map_err(|e| ConfigError::Invalid(format!("threshold: {e}")))
    }

    #[must_use]
    pub fn scoring_policy(&self) -> ScoringPolicy {
        ScoringPolicy {
            request_timeout: Duration::from_millis(self.request_timeout_ms),
            storage_retry_backoff: Duration::from_millis(self.storage_retry_backoff_ms),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            threshold: default_threshold(),
            history_capacity: default_history_capacity(),
            artifacts_dir: default_artifacts_dir(),
            database_path: default_database_path(),
            request_timeout_ms: default_request_timeout_ms(),
            storage_retry_backoff_ms: default_storage_retry_backoff_ms(),
            allow_unverified_artifacts: false,
        }
    }
}
