//! Storage handles and the per-worker handle registry.

use parking_lot::Mutex;
use rusqlite::Connection;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use super::error::{Result, WriterError};

const MEMORY_LOCATIONS: [&str; 2] = ["sqlite::memory:", ":memory:"];

const CREATE_MEASURE_TABLE: &str = "CREATE TABLE IF NOT EXISTS measure (
    id INTEGER PRIMARY KEY AUTOINCREMENT,
    lat INTEGER NOT NULL,
    lon INTEGER NOT NULL,
    accuracy INTEGER,
    altitude INTEGER,
    altitude_accuracy INTEGER,
    radio INTEGER,
    cell TEXT,
    wifi TEXT
)";

/// One persisted row of the `measure` table.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MeasureRow {
    pub lat: i64,
    pub lon: i64,
    pub accuracy: Option<i64>,
    pub altitude: Option<i64>,
    pub altitude_accuracy: Option<i64>,
    pub radio: Option<i32>,
    pub cell: Option<String>,
    pub wifi: Option<String>,
}

/// An open handle on the measurement store.
pub struct MeasureDb {
    location: String,
    conn: Mutex<Connection>,
}

impl fmt::Debug for MeasureDb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MeasureDb")
            .field("location", &self.location)
            .finish_non_exhaustive()
    }
}

impl MeasureDb {
    /// Open the store named by a connection string.
    ///
    /// Accepts `sqlite::memory:`, `sqlite://<path>` or a bare file path.
    pub fn open(location: &str) -> Result<Self> {
        let conn = if MEMORY_LOCATIONS.contains(&location) {
            Connection::open_in_memory()?
        } else {
            Connection::open(file_path(location)?)?
        };
        conn.execute_batch(CREATE_MEASURE_TABLE)?;

        tracing::debug!(location, "Opened measure store");
        Ok(Self {
            location: location.to_string(),
            conn: Mutex::new(conn),
        })
    }

    pub fn location(&self) -> &str {
        &self.location
    }

    pub(crate) fn with_connection<R>(
        &self,
        f: impl FnOnce(&mut Connection) -> Result<R>,
    ) -> Result<R> {
        let mut conn = self.conn.lock();
        f(&mut conn)
    }

    pub fn count(&self) -> Result<usize> {
        self.with_connection(|conn| {
            let count: i64 = conn.query_row("SELECT COUNT(*) FROM measure", [], |row| row.get(0))?;
            Ok(count as usize)
        })
    }

    /// All stored rows in insertion order.
    pub fn measures(&self) -> Result<Vec<MeasureRow>> {
        self.with_connection(|conn| {
            let mut stmt = conn.prepare(
                "SELECT lat, lon, accuracy, altitude, altitude_accuracy, radio, cell, wifi \
                 FROM measure ORDER BY id",
            )?;
            let rows = stmt
                .query_map([], |row| {
                    Ok(MeasureRow {
                        lat: row.get(0)?,
                        lon: row.get(1)?,
                        accuracy: row.get(2)?,
                        altitude: row.get(3)?,
                        altitude_accuracy: row.get(4)?,
                        radio: row.get(5)?,
                        cell: row.get(6)?,
                        wifi: row.get(7)?,
                    })
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(rows)
        })
    }
}

fn file_path(location: &str) -> Result<&str> {
    if let Some(path) = location.strip_prefix("sqlite://") {
        if path.is_empty() {
            return Err(WriterError::invalid_location(location, "missing database path"));
        }
        return Ok(path);
    }

    if let Some((scheme, _)) = location.split_once("://") {
        return Err(WriterError::invalid_location(
            location,
            format!("unsupported scheme '{}', expected sqlite", scheme),
        ));
    }

    if location.is_empty() {
        return Err(WriterError::invalid_location(location, "empty location"));
    }
    Ok(location)
}

/// Identity of a thread or worker task owning storage handles.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct WorkerId(String);

impl WorkerId {
    pub fn named(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn current_thread() -> Self {
        let thread = std::thread::current();
        match thread.name() {
            Some(name) => Self(format!("{}-{:?}", name, thread.id())),
            None => Self(format!("{:?}", thread.id())),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for WorkerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Lazily opened storage handles, one per (worker, location) pair.
///
/// Handles are never shared between workers; a worker asking again for the
/// same location gets the handle it opened the first time.
#[derive(Debug, Default)]
pub struct HandleRegistry {
    handles: Mutex<HashMap<(WorkerId, String), Arc<MeasureDb>>>,
}

impl HandleRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn handle(&self, worker: &WorkerId, location: &str) -> Result<Arc<MeasureDb>> {
        let key = (worker.clone(), location.to_string());
        let mut handles = self.handles.lock();
        if let Some(db) = handles.get(&key) {
            return Ok(Arc::clone(db));
        }

        let db = Arc::new(MeasureDb::open(location)?);
        tracing::debug!(worker = %worker, location, "Created storage handle");
        handles.insert(key, Arc::clone(&db));
        Ok(db)
    }

    pub fn len(&self) -> usize {
        self.handles.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.handles.lock().is_empty()
    }
}
