// Configuration validation
//
// Validates that values are sensible before the pipeline is built

use super::*;
use anyhow::{bail, Result};
use tracing::warn;

pub fn validate_config(config: &RuntimeConfig) -> Result<()> {
    validate_batch_config(&config.batch)?;
    validate_storage_config(&config.storage)?;

    if config.batch.async_flush {
        validate_worker_config(&config.worker)?;
    }

    if config.log.level.trim().is_empty() {
        bail!("log.level must not be empty");
    }

    Ok(())
}

fn validate_batch_config(config: &BatchConfig) -> Result<()> {
    if config.batch_size != BATCHING_DISABLED && config.batch_size < 1 {
        bail!(
            "batch.batch_size must be at least 1, or {} to disable batching (got {})",
            BATCHING_DISABLED,
            config.batch_size
        );
    }

    if config.is_enabled()
        && config.max_pending != 0
        && (config.max_pending as i64) < config.batch_size
    {
        bail!(
            "batch.max_pending ({}) must be 0 (unbounded) or at least batch.batch_size ({})",
            config.max_pending,
            config.batch_size
        );
    }

    if config.batch_size > 100_000 {
        warn!(
            batch_size = config.batch_size,
            "batch.batch_size is very large; a single transaction may hold many rows"
        );
    }

    if config.batch_age_secs > 24 * 60 * 60 {
        warn!(
            batch_age_secs = config.batch_age_secs,
            "batch.batch_age_secs exceeds one day; queued records may wait a long time"
        );
    }

    Ok(())
}

fn validate_storage_config(config: &StorageConfig) -> Result<()> {
    if config.sqluri.trim().is_empty() {
        bail!(
            "Storage connection string is required\n\n\
            How to fix:\n\
              • Environment: export {}SQLURI=sqlite:///var/lib/radiomap/measures.db\n\
              • TOML: [storage]\n              sqluri = \"sqlite:///var/lib/radiomap/measures.db\"\n",
            ENV_PREFIX
        );
    }
    Ok(())
}

fn validate_worker_config(config: &WorkerConfig) -> Result<()> {
    if config.concurrency == 0 {
        bail!("worker.concurrency must be greater than 0 when batch.async is enabled");
    }

    if config.concurrency > 64 {
        warn!(
            concurrency = config.concurrency,
            "worker.concurrency is very large; each worker holds its own storage handle"
        );
    }

    Ok(())
}
