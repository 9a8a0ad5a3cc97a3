use super::{LogFormat, RuntimeConfig};
use anyhow::{anyhow, Context, Result};
use std::str::FromStr;

pub const ENV_PREFIX: &str = "RADIOMAP_";

/// Abstraction over environment-variable lookups so tests and embedders can
/// supply their own source of overrides.
pub trait EnvSource {
    /// Look up `key` (without the RADIOMAP_ prefix)
    fn get(&self, key: &str) -> Option<String>;
}

/// Apply environment-variable overrides (highest priority) to the runtime config.
pub fn apply_env_overrides<E: EnvSource>(config: &mut RuntimeConfig, env: &E) -> Result<()> {
    // Batch configuration
    if let Some(val) = get_env_parsed::<i64, _>(env, "BATCH_SIZE")? {
        config.batch.batch_size = val;
    }
    if let Some(val) = get_env_parsed::<u64, _>(env, "BATCH_AGE_SECS")? {
        config.batch.batch_age_secs = val;
    }
    if let Some(val) = get_env_parsed::<bool, _>(env, "ASYNC")? {
        config.batch.async_flush = val;
    }
    if let Some(val) = get_env_parsed::<usize, _>(env, "MAX_PENDING")? {
        config.batch.max_pending = val;
    }

    // Storage
    if let Some(uri) = env.get("SQLURI") {
        config.storage.sqluri = uri;
    }

    // Worker pool
    if let Some(val) = get_env_parsed::<usize, _>(env, "WORKER_CONCURRENCY")? {
        config.worker.concurrency = val;
    }

    // Logging
    if let Some(level) = env.get("LOG_LEVEL") {
        config.log.level = level;
    }
    if let Some(format) = env.get("LOG_FORMAT") {
        config.log.format = format
            .parse::<LogFormat>()
            .with_context(|| format!("Invalid {}LOG_FORMAT value", ENV_PREFIX))?;
    }

    Ok(())
}

fn get_env_parsed<T, E>(env: &E, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    E: EnvSource,
{
    match env.get(key) {
        Some(val) => {
            let parsed = val
                .trim()
                .parse::<T>()
                .map_err(|e| anyhow!("Failed to parse {}{}: {}", ENV_PREFIX, key, e))?;
            Ok(Some(parsed))
        }
        None => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    struct MapEnv(HashMap<&'static str, &'static str>);

    impl EnvSource for MapEnv {
        fn get(&self, key: &str) -> Option<String> {
            self.0.get(key).map(|v| v.to_string())
        }
    }

    #[test]
    fn test_overrides_applied() {
        let env = MapEnv(HashMap::from([
            ("BATCH_SIZE", "-1"),
            ("BATCH_AGE_SECS", "30"),
            ("ASYNC", "true"),
            ("SQLURI", "sqlite::memory:"),
            ("WORKER_CONCURRENCY", "4"),
            ("LOG_FORMAT", "json"),
        ]));
        let mut config = RuntimeConfig::default();
        apply_env_overrides(&mut config, &env).unwrap();

        assert_eq!(config.batch.batch_size, -1);
        assert_eq!(config.batch.batch_age_secs, 30);
        assert!(config.batch.async_flush);
        assert_eq!(config.storage.sqluri, "sqlite::memory:");
        assert_eq!(config.worker.concurrency, 4);
        assert_eq!(config.log.format, LogFormat::Json);
    }

    #[test]
    fn test_invalid_number_reports_variable() {
        let env = MapEnv(HashMap::from([("BATCH_SIZE", "lots")]));
        let mut config = RuntimeConfig::default();
        let err = apply_env_overrides(&mut config, &env).unwrap_err();
        assert!(err.to_string().contains("RADIOMAP_BATCH_SIZE"));
    }
}
