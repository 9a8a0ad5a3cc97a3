// Ingestion entry point
//
// Takes validated observations, normalizes and encodes them, and either queues
// them for the next batch or flushes immediately. Flushing writes inline
// through the pipeline's storage handle, or submits a job to the async queue.

use metrics::{counter, histogram};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;
use tracing::{debug, info};

use crate::batch::BatchCoordinator;
use crate::dispatch::{DispatchError, FlushJob, JobQueue};
use crate::measure::{transport, Observation, TransportRecord};
use crate::writer::{write_measures, MeasureDb, WriterError};

#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Failed to encode observation {index}: {source}")]
    Encode {
        index: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error(transparent)]
    Write(#[from] WriterError),

    #[error(transparent)]
    Dispatch(#[from] DispatchError),
}

/// Where drained batches go.
#[derive(Clone)]
pub enum FlushTarget {
    /// Write inline through the pipeline's own handle
    Inline(Arc<MeasureDb>),
    /// Submit to a job queue that writes to `storage_location`
    Async {
        queue: Arc<dyn JobQueue>,
        storage_location: String,
    },
}

impl std::fmt::Debug for FlushTarget {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FlushTarget::Inline(db) => f.debug_tuple("Inline").field(&db.location()).finish(),
            FlushTarget::Async {
                storage_location, ..
            } => f
                .debug_struct("Async")
                .field("storage_location", storage_location)
                .finish_non_exhaustive(),
        }
    }
}

/// Outcome of one `add_measures` call.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IngestReport {
    /// Records received in this call
    pub accepted: usize,
    /// Records flushed (written or dispatched) by this call
    pub flushed: usize,
    /// Batches flushed by this call
    pub batches: usize,
    /// Records left in the queue afterwards
    pub pending: usize,
}

impl IngestReport {
    pub fn is_queued_only(&self) -> bool {
        self.batches == 0
    }
}

/// Ingestion pipeline shared by every call site in the process.
///
/// `batcher` is `None` when batching is disabled; every call then flushes its
/// own records straight away.
#[derive(Clone, Debug)]
pub struct Pipeline {
    batcher: Option<Arc<BatchCoordinator>>,
    target: FlushTarget,
}

impl Pipeline {
    pub fn new(batcher: Option<Arc<BatchCoordinator>>, target: FlushTarget) -> Self {
        Self { batcher, target }
    }

    pub fn batcher(&self) -> Option<&Arc<BatchCoordinator>> {
        self.batcher.as_ref()
    }

    pub fn target(&self) -> &FlushTarget {
        &self.target
    }

    /// Add freshly validated observations.
    ///
    /// When no batch is ready the records stay queued and the call succeeds.
    pub fn add_measures(
        &self,
        observations: Vec<Observation>,
    ) -> Result<IngestReport, IngestError> {
        let accepted = observations.len();
        counter!("measures.ingest.received").increment(accepted as u64);

        let encoded = observations
            .into_iter()
            .enumerate()
            .map(|(index, obs)| {
                transport::encode(&obs.normalized()).map_err(|source| IngestError::Encode {
                    index,
                    source,
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let mut report = IngestReport {
            accepted,
            ..IngestReport::default()
        };

        let Some(batcher) = self.batcher.as_ref() else {
            // Batching disabled: this call's records are the batch
            if !encoded.is_empty() {
                self.flush(encoded, &mut report)?;
            }
            return Ok(report);
        };

        for record in encoded {
            batcher.enqueue(record);
            // A full queue would block the next enqueue; make room first
            if batcher.is_full() {
                if let Some(batch) = batcher.take_ready() {
                    self.flush(batch, &mut report)?;
                }
            }
        }

        if let Some(batch) = batcher.take_ready() {
            self.flush(batch, &mut report)?;
        }

        report.pending = batcher.pending();
        if report.is_queued_only() {
            debug!(
                records = accepted,
                pending = report.pending,
                "Buffered measures"
            );
        }
        Ok(report)
    }

    /// Flush everything still queued, regardless of thresholds.
    pub fn flush_pending(&self) -> Result<IngestReport, IngestError> {
        let mut report = IngestReport::default();
        let Some(batcher) = self.batcher.as_ref() else {
            return Ok(report);
        };

        let batch = batcher.drain_all();
        if !batch.is_empty() {
            self.flush(batch, &mut report)?;
        }
        report.pending = batcher.pending();
        Ok(report)
    }

    fn flush(&self, batch: Vec<String>, report: &mut IngestReport) -> Result<(), IngestError> {
        let start = Instant::now();
        let count = batch.len();
        let records: Vec<TransportRecord> =
            batch.into_iter().map(TransportRecord::Encoded).collect();

        match &self.target {
            FlushTarget::Inline(db) => {
                write_measures(db, records)?;
                info!(records = count, mode = "inline", "Flushed batch");
            }
            FlushTarget::Async {
                queue,
                storage_location,
            } => {
                queue.submit(FlushJob {
                    records,
                    storage_location: storage_location.clone(),
                })?;
                info!(records = count, mode = "async", "Dispatched batch");
            }
        }

        counter!("measures.flush.batches").increment(1);
        counter!("measures.flush.records").increment(count as u64);
        histogram!("measures.flush.latency_ms").record(start.elapsed().as_secs_f64() * 1000.0);

        report.flushed += count;
        report.batches += 1;
        Ok(())
    }
}
