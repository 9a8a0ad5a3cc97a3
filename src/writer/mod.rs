//! Measurement store writer.
//!
//! Converts queued observation records into `measure` rows and commits each
//! batch in a single transaction.

mod error;
mod storage;
mod write;

pub use error::{ErrorCode, Result, WriterError};
pub use storage::{HandleRegistry, MeasureDb, MeasureRow, WorkerId};
pub use write::{write_measures, StorageWriter};
