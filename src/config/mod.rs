// Runtime configuration
//
// Supports configuration from multiple sources:
// 1. Environment variables (highest priority)
// 2. Config file path from RADIOMAP_CONFIG env var
// 3. Config file contents from RADIOMAP_CONFIG_CONTENT env var
// 4. Default config file location (./radiomap.toml)
// 5. Built-in defaults (lowest priority)

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::time::Duration;

mod env_overrides;
mod sources;
mod validation;

pub use env_overrides::{EnvSource, ENV_PREFIX};

/// Batch size value that turns in-memory batching off.
pub const BATCHING_DISABLED: i64 = -1;

/// Main runtime configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RuntimeConfig {
    #[serde(default)]
    pub batch: BatchConfig,

    #[serde(default)]
    pub storage: StorageConfig,

    #[serde(default)]
    pub worker: WorkerConfig,

    #[serde(default)]
    pub log: LogConfig,
}

/// Batch configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct BatchConfig {
    /// Records per batch; -1 flushes every call immediately
    pub batch_size: i64,
    /// Maximum age of the oldest queued record before flushing
    pub batch_age_secs: u64,
    /// Hand batches to the worker pool instead of writing inline
    #[serde(rename = "async")]
    pub async_flush: bool,
    /// Queue capacity before producers block (0 = unbounded)
    pub max_pending: usize,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            batch_size: 100,
            batch_age_secs: 600,
            async_flush: false,
            max_pending: 10_000,
        }
    }
}

impl BatchConfig {
    pub fn is_enabled(&self) -> bool {
        self.batch_size != BATCHING_DISABLED
    }

    /// Coordinator thresholds, or `None` when batching is disabled.
    pub fn thresholds(&self) -> Option<crate::batch::BatchConfig> {
        if !self.is_enabled() {
            return None;
        }
        Some(crate::batch::BatchConfig {
            max_size: self.batch_size.max(1) as usize,
            max_age: Duration::from_secs(self.batch_age_secs),
            max_pending: self.max_pending,
        })
    }
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    /// Connection string: sqlite::memory:, sqlite://<path> or a file path
    pub sqluri: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            sqluri: "sqlite://./radiomap.db".to_string(),
        }
    }
}

/// Async flush worker configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkerConfig {
    pub concurrency: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self { concurrency: 2 }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
    pub level: String,
    pub format: LogFormat,
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Text,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

impl std::str::FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => anyhow::bail!("Unsupported log format: {}. Supported: text, json", s),
        }
    }
}

impl RuntimeConfig {
    /// Load configuration from all sources with priority
    pub fn load() -> Result<Self> {
        sources::load_config()
    }

    /// Load configuration from a specific file path (for CLI usage).
    pub fn load_from_path(path: impl AsRef<std::path::Path>) -> Result<Self> {
        sources::load_from_file_path(path)
    }

    /// Build a configuration from inline TOML plus overrides from `env`.
    pub fn load_with_env<E: EnvSource>(inline_config: Option<&str>, env: &E) -> Result<Self> {
        let mut config = match inline_config {
            Some(inline) => RuntimeConfig::from_toml(inline)?,
            None => RuntimeConfig::default(),
        };

        config.apply_env_overrides_from(env)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).context("Failed to parse config content")
    }

    pub fn to_toml(&self) -> Result<String> {
        toml::to_string(self).context("Failed to render config as TOML")
    }

    /// Apply environment overrides from a custom source.
    pub fn apply_env_overrides_from<E: EnvSource>(&mut self, env: &E) -> Result<()> {
        env_overrides::apply_env_overrides(self, env)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        validation::validate_config(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_configs() {
        let config = RuntimeConfig::default();
        assert_eq!(config.batch.batch_size, 100);
        assert_eq!(config.batch.batch_age_secs, 600);
        assert!(!config.batch.async_flush);
        assert_eq!(config.worker.concurrency, 2);
        assert_eq!(config.log.format, LogFormat::Text);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = RuntimeConfig::from_toml(
            r#"
            [batch]
            batch_size = 5
            async = true
            "#,
        )
        .unwrap();
        assert_eq!(config.batch.batch_size, 5);
        assert!(config.batch.async_flush);
        assert_eq!(config.batch.batch_age_secs, 600);
        assert_eq!(config.storage.sqluri, "sqlite://./radiomap.db");
    }

    #[test]
    fn test_thresholds() {
        let mut batch = BatchConfig::default();
        let thresholds = batch.thresholds().unwrap();
        assert_eq!(thresholds.max_size, 100);
        assert_eq!(thresholds.max_age, Duration::from_secs(600));

        batch.batch_size = BATCHING_DISABLED;
        assert!(!batch.is_enabled());
        assert!(batch.thresholds().is_none());
    }

    #[test]
    fn test_toml_output_parses_back() {
        let config = RuntimeConfig::default();
        let text = config.to_toml().unwrap();
        assert!(text.contains("async = false"));
        let parsed = RuntimeConfig::from_toml(&text).unwrap();
        assert_eq!(parsed.storage.sqluri, config.storage.sqluri);
    }
}
