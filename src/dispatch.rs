// Asynchronous flush dispatch
//
// A drained batch can be handed off as a `FlushJob` instead of being written
// inline. `WorkerPool` is the in-process implementation: a fixed set of tokio
// tasks pulling jobs from one channel and running the storage writer on the
// blocking pool.

use metrics::counter;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, Mutex as AsyncMutex};
use tokio::task::JoinHandle;
use tracing::{debug, error, info};

use crate::measure::TransportRecord;
use crate::writer::{StorageWriter, WorkerId};

/// Payload of an asynchronous flush.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlushJob {
    pub records: Vec<TransportRecord>,
    pub storage_location: String,
}

#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("[E004] Job queue is closed; flush job with {records} records was not submitted")]
    Closed { records: usize },
}

/// Typed job submission used by the ingestion pipeline.
///
/// `submit` returns once the job is accepted, not once it has been written.
pub trait JobQueue: Send + Sync {
    fn submit(&self, job: FlushJob) -> Result<(), DispatchError>;
}

/// Cloneable handle submitting jobs to a `WorkerPool`.
///
/// All handles share one sender; shutting the pool down closes it for every
/// clone at once.
#[derive(Clone)]
pub struct JobSubmitter {
    sender: Arc<Mutex<Option<mpsc::UnboundedSender<FlushJob>>>>,
}

impl JobQueue for JobSubmitter {
    fn submit(&self, job: FlushJob) -> Result<(), DispatchError> {
        let records = job.records.len();
        let guard = self.sender.lock();
        let sender = guard.as_ref().ok_or(DispatchError::Closed { records })?;
        sender
            .send(job)
            .map_err(|_| DispatchError::Closed { records })?;
        debug!(records, "Submitted flush job");
        Ok(())
    }
}

/// Worker pool executing flush jobs on a tokio runtime.
pub struct WorkerPool {
    submitter: JobSubmitter,
    workers: Vec<JoinHandle<()>>,
}

impl WorkerPool {
    /// Start `concurrency` workers on the given runtime.
    pub fn start(
        runtime: &tokio::runtime::Handle,
        writer: StorageWriter,
        concurrency: usize,
    ) -> Self {
        let (sender, receiver) = mpsc::unbounded_channel();
        let receiver = Arc::new(AsyncMutex::new(receiver));

        let workers = (0..concurrency.max(1))
            .map(|n| {
                let worker = WorkerId::named(format!("flush-worker-{}", n));
                runtime.spawn(run_worker(worker, writer.clone(), Arc::clone(&receiver)))
            })
            .collect();

        info!(concurrency = concurrency.max(1), "Started flush worker pool");
        Self {
            submitter: JobSubmitter {
                sender: Arc::new(Mutex::new(Some(sender))),
            },
            workers,
        }
    }

    pub fn submitter(&self) -> JobSubmitter {
        self.submitter.clone()
    }

    /// Stop accepting jobs and wait for queued ones to finish.
    pub async fn shutdown(self) {
        drop(self.submitter.sender.lock().take());
        for handle in self.workers {
            if let Err(e) = handle.await {
                error!("Flush worker terminated abnormally: {}", e);
            }
        }
        info!("Flush worker pool stopped");
    }
}

impl JobQueue for WorkerPool {
    fn submit(&self, job: FlushJob) -> Result<(), DispatchError> {
        self.submitter.submit(job)
    }
}

async fn run_worker(
    worker: WorkerId,
    writer: StorageWriter,
    receiver: Arc<AsyncMutex<mpsc::UnboundedReceiver<FlushJob>>>,
) {
    loop {
        // Hold the receiver lock only while waiting for the next job
        let job = receiver.lock().await.recv().await;
        let Some(job) = job else {
            break;
        };

        let records = job.records.len();
        let writer = writer.clone();
        let id = worker.clone();
        let result = tokio::task::spawn_blocking(move || {
            writer.write_to(&id, &job.storage_location, job.records)
        })
        .await;

        match result {
            Ok(Ok(written)) => {
                debug!(worker = %worker, rows = written, "Flush job completed");
            }
            Ok(Err(e)) => {
                counter!("measures.dispatch.failed").increment(1);
                error!(worker = %worker, records, "Flush job failed: {}", e);
            }
            Err(e) => {
                counter!("measures.dispatch.failed").increment(1);
                error!(worker = %worker, records, "Flush job panicked: {}", e);
            }
        }
    }
    debug!(worker = %worker, "Flush worker exiting");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::measure::Observation;

    #[test]
    fn test_job_payload_shape() {
        let job = FlushJob {
            records: vec![TransportRecord::Encoded("{\"lat\":1.0,\"lon\":2.0}".to_string())],
            storage_location: "sqlite::memory:".to_string(),
        };
        let value = serde_json::to_value(&job).unwrap();
        assert_eq!(value["storage_location"], "sqlite::memory:");
        assert!(value["records"][0].is_string());

        let back: FlushJob = serde_json::from_value(value).unwrap();
        assert_eq!(back, job);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_pool_writes_submitted_jobs() {
        let dir = tempfile::tempdir().unwrap();
        let location = format!("sqlite://{}", dir.path().join("jobs.db").display());
        let writer = StorageWriter::default();
        let pool = WorkerPool::start(&tokio::runtime::Handle::current(), writer.clone(), 1);

        for i in 0..3 {
            pool.submit(FlushJob {
                records: vec![Observation::new(i as f64, 0.0).into()],
                storage_location: location.clone(),
            })
            .unwrap();
        }
        pool.shutdown().await;

        let db = writer
            .registry()
            .handle(&WorkerId::named("flush-worker-0"), &location)
            .unwrap();
        assert_eq!(db.count().unwrap(), 3);
        assert_eq!(writer.registry().len(), 1);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_submit_after_shutdown_is_rejected() {
        let pool = WorkerPool::start(
            &tokio::runtime::Handle::current(),
            StorageWriter::default(),
            2,
        );
        let submitter = pool.submitter();
        pool.shutdown().await;

        let err = submitter
            .submit(FlushJob {
                records: vec![Observation::new(0.0, 0.0).into()],
                storage_location: "sqlite::memory:".to_string(),
            })
            .unwrap_err();
        assert!(matches!(err, DispatchError::Closed { records: 1 }));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_failed_job_does_not_stop_worker() {
        let dir = tempfile::tempdir().unwrap();
        let location = format!("sqlite://{}", dir.path().join("jobs.db").display());
        let writer = StorageWriter::default();
        let pool = WorkerPool::start(&tokio::runtime::Handle::current(), writer.clone(), 1);

        pool.submit(FlushJob {
            records: vec![TransportRecord::Encoded("garbage".to_string())],
            storage_location: location.clone(),
        })
        .unwrap();
        pool.submit(FlushJob {
            records: vec![Observation::new(5.0, 5.0).into()],
            storage_location: location.clone(),
        })
        .unwrap();
        pool.shutdown().await;

        let db = writer
            .registry()
            .handle(&WorkerId::named("flush-worker-0"), &location)
            .unwrap();
        assert_eq!(db.count().unwrap(), 1);
    }
}
