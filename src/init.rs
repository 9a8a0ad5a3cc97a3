// Initialization utilities
//
// Logging/tracing setup and pipeline assembly from RuntimeConfig

use crate::batch::BatchCoordinator;
use crate::config::{LogConfig, LogFormat, RuntimeConfig};
use crate::dispatch::WorkerPool;
use crate::ingest::{FlushTarget, Pipeline};
use crate::writer::{HandleRegistry, StorageWriter, WorkerId};
use anyhow::{Context, Result};
use std::sync::Arc;
use tracing::info;

/// A ready-to-use pipeline plus the worker pool backing it, if any.
pub struct Runtime {
    pub pipeline: Pipeline,
    pub workers: Option<WorkerPool>,
}

impl Runtime {
    /// Flush what is still queued and wait for dispatched jobs to finish.
    pub async fn shutdown(self) -> Result<()> {
        let report = self
            .pipeline
            .flush_pending()
            .context("Failed to flush pending measures")?;
        if report.flushed > 0 {
            info!(records = report.flushed, "Flushed pending measures on shutdown");
        }

        if let Some(workers) = self.workers {
            workers.shutdown().await;
        }
        Ok(())
    }
}

/// Build the process-wide pipeline from RuntimeConfig.
///
/// Inline mode opens the storage handle for the calling thread up front; async
/// mode starts the worker pool on `runtime`.
pub fn init_pipeline(config: &RuntimeConfig, runtime: &tokio::runtime::Handle) -> Result<Runtime> {
    let registry = Arc::new(HandleRegistry::new());
    let writer = StorageWriter::new(Arc::clone(&registry));

    let batcher = match config.batch.thresholds() {
        Some(thresholds) => {
            info!(
                "Batching enabled (batch_size={} batch_age={}s max_pending={})",
                thresholds.max_size,
                thresholds.max_age.as_secs(),
                thresholds.max_pending
            );
            Some(Arc::new(BatchCoordinator::new(thresholds)))
        }
        None => {
            info!("Batching disabled by configuration");
            None
        }
    };

    let (target, workers) = if config.batch.async_flush {
        let pool = WorkerPool::start(runtime, writer, config.worker.concurrency);
        let target = FlushTarget::Async {
            queue: Arc::new(pool.submitter()),
            storage_location: config.storage.sqluri.clone(),
        };
        (target, Some(pool))
    } else {
        let db = registry
            .handle(&WorkerId::current_thread(), &config.storage.sqluri)
            .with_context(|| format!("Failed to open storage at {}", config.storage.sqluri))?;
        info!("Writing batches inline to {}", config.storage.sqluri);
        (FlushTarget::Inline(db), None)
    };

    Ok(Runtime {
        pipeline: Pipeline::new(batcher, target),
        workers,
    })
}

/// Initialize tracing/logging from LogConfig
pub fn init_tracing(config: &LogConfig) {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    let env_filter = EnvFilter::try_new(&config.level).unwrap_or_else(|_| EnvFilter::new("info"));

    let registry = tracing_subscriber::registry().with(env_filter);

    // Try to set the global subscriber; ignore error if already set (idempotent)
    let _ = match config.format {
        LogFormat::Json => {
            tracing::subscriber::set_global_default(registry.with(fmt::layer().json()))
        }
        LogFormat::Text => tracing::subscriber::set_global_default(registry.with(fmt::layer())),
    };
}
