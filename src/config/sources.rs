// Configuration source loading
//
// Priority order:
// 1. Environment variables (RADIOMAP_* prefix)
// 2. Config file path from RADIOMAP_CONFIG
// 3. Inline config content from RADIOMAP_CONFIG_CONTENT
// 4. Default config file (./radiomap.toml)
// 5. Built-in defaults

use super::env_overrides::{self, EnvSource, ENV_PREFIX};
use super::RuntimeConfig;
use anyhow::{Context, Result};
use std::env;
use std::path::Path;

const DEFAULT_CONFIG_FILE: &str = "./radiomap.toml";

/// Load configuration using native environment/file access.
pub fn load_config() -> Result<RuntimeConfig> {
    let mut config = load_from_file()?.unwrap_or_default();

    env_overrides::apply_env_overrides(&mut config, &StdEnvSource)?;
    config.validate()?;
    Ok(config)
}

fn load_from_file() -> Result<Option<RuntimeConfig>> {
    if let Ok(path) = env::var(format!("{}CONFIG", ENV_PREFIX)) {
        return read_file(Path::new(&path)).map(Some);
    }

    if let Ok(content) = env::var(format!("{}CONFIG_CONTENT", ENV_PREFIX)) {
        let config = RuntimeConfig::from_toml(&content).with_context(|| {
            format!("Failed to parse inline config from {}CONFIG_CONTENT", ENV_PREFIX)
        })?;
        return Ok(Some(config));
    }

    let default_path = Path::new(DEFAULT_CONFIG_FILE);
    if default_path.exists() {
        return read_file(default_path).map(Some);
    }

    Ok(None)
}

/// Load configuration from a specific file path (for CLI --config flag).
/// Returns error if file doesn't exist or can't be parsed.
pub fn load_from_file_path(path: impl AsRef<Path>) -> Result<RuntimeConfig> {
    let mut config = read_file(path.as_ref())?;

    env_overrides::apply_env_overrides(&mut config, &StdEnvSource)?;
    config.validate()?;
    Ok(config)
}

fn read_file(path: &Path) -> Result<RuntimeConfig> {
    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config file: {}", path.display()))?;
    RuntimeConfig::from_toml(&content)
        .with_context(|| format!("Failed to parse config file: {}", path.display()))
}

struct StdEnvSource;

impl EnvSource for StdEnvSource {
    fn get(&self, key: &str) -> Option<String> {
        env::var(format!("{}{}", ENV_PREFIX, key)).ok()
    }
}
