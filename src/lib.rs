//! radiomap - batched ingestion of crowd-sourced radio observations
//!
//! Validated cell and Wi-Fi observations are queued in memory and flushed to
//! the measurement store once a batch is large or old enough, either inline or
//! through an asynchronous worker pool.

pub mod batch;
pub mod config;
pub mod dispatch;
pub mod ingest;
pub mod measure;
pub mod writer;

mod init;

pub use init::{init_pipeline, init_tracing, Runtime};
pub use ingest::{FlushTarget, IngestError, IngestReport, Pipeline};
pub use measure::{Observation, Submission};
