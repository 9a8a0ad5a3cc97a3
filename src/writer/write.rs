//! Batch writes into the measurement store.
//!
//! Every record of a batch is decoded and converted before the transaction
//! opens. Rows are inserted in one transaction, so a batch is stored whole or
//! not at all.

use rusqlite::params;
use std::sync::Arc;
use std::time::Instant;

use crate::measure::{
    normalize_wifi, transport::to_micro_degrees, Observation, Radio, TransportRecord,
};

use super::error::{Result, WriterError};
use super::storage::{HandleRegistry, MeasureDb, WorkerId};

const INSERT_MEASURE: &str = "INSERT INTO measure \
    (lat, lon, accuracy, altitude, altitude_accuracy, radio, cell, wifi) \
    VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)";

/// Row ready for insertion.
#[derive(Debug, Clone, PartialEq)]
struct NewMeasure {
    lat: i64,
    lon: i64,
    accuracy: Option<i64>,
    altitude: Option<i64>,
    altitude_accuracy: Option<i64>,
    radio: Option<i32>,
    cell: Option<String>,
    wifi: Option<String>,
}

impl NewMeasure {
    fn from_observation(mut data: Observation) -> serde_json::Result<Self> {
        let mut measure = NewMeasure {
            lat: to_micro_degrees(data.lat),
            lon: to_micro_degrees(data.lon),
            accuracy: data.accuracy,
            altitude: data.altitude,
            altitude_accuracy: data.altitude_accuracy,
            radio: None,
            cell: None,
            wifi: None,
        };

        if let Some(cell) = data.cell.as_ref() {
            let radio = data
                .radio
                .as_deref()
                .map(Radio::from_name)
                .unwrap_or_default();
            measure.radio = Some(radio.code());
            measure.cell = Some(serde_json::to_string(cell)?);
        }

        if let Some(wifi) = data.wifi.as_mut().filter(|w| !w.is_empty()) {
            normalize_wifi(wifi);
            measure.wifi = Some(serde_json::to_string(wifi)?);
        }

        Ok(measure)
    }
}

/// Persist a batch of records through an open handle.
///
/// Returns the number of rows committed.
pub fn write_measures(db: &MeasureDb, records: Vec<TransportRecord>) -> Result<usize> {
    let start = Instant::now();
    let measures = records
        .into_iter()
        .enumerate()
        .map(|(index, record)| {
            record
                .into_observation()
                .and_then(NewMeasure::from_observation)
                .map_err(|e| WriterError::decode(index, e))
        })
        .collect::<Result<Vec<_>>>()?;

    let count = measures.len();
    db.with_connection(|conn| {
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare_cached(INSERT_MEASURE)?;
            for m in &measures {
                stmt.execute(params![
                    m.lat,
                    m.lon,
                    m.accuracy,
                    m.altitude,
                    m.altitude_accuracy,
                    m.radio,
                    m.cell,
                    m.wifi
                ])?;
            }
        }
        tx.commit()?;
        Ok(())
    })?;

    tracing::info!(
        rows = count,
        location = db.location(),
        elapsed_us = start.elapsed().as_micros() as u64,
        "Committed measure batch"
    );

    Ok(count)
}

/// Storage writer resolving connection strings through a handle registry.
#[derive(Debug, Clone, Default)]
pub struct StorageWriter {
    registry: Arc<HandleRegistry>,
}

impl StorageWriter {
    pub fn new(registry: Arc<HandleRegistry>) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Arc<HandleRegistry> {
        &self.registry
    }

    /// Write through the handle `worker` holds for `location`, opening it on first use.
    pub fn write_to(
        &self,
        worker: &WorkerId,
        location: &str,
        records: Vec<TransportRecord>,
    ) -> Result<usize> {
        let db = self.registry.handle(worker, location)?;
        write_measures(&db, records)
    }
}
