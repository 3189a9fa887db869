#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! POI import, validation, upsert, and district assignment.
//!
//! Sources (CSV files, `GeoJSON` files, Overpass responses) produce
//! [`PoiRecord`]s. [`import::import_records`] validates each one, upserts
//! it into a [`PoiSink`] keyed by `(layer, source_id)`, and collects
//! per-record failures into an [`ImportReport`] instead of aborting.
//! [`assign::assign_all`] then resolves every POI to a district.

pub mod assign;
pub mod csv_import;
pub mod geojson_import;
pub mod import;
pub mod progress;
#[cfg(test)]
mod repository;

use equity_map_poi_models::{Poi, PoiRecord, RejectedRecord, SourceKey, UpsertOutcome};
use equity_map_spatial::{GeometryError, validate_coordinate};
use thiserror::Error;

pub use equity_map_poi_models::ImportReport;

/// Two records in one batch share an upsert key but disagree on content.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
#[error("conflicting records for source key {key}")]
pub struct DuplicateSourceError {
    /// The repeated key.
    pub key: SourceKey,
}

/// Errors that can occur during POI import.
#[derive(Debug, Error)]
pub enum PoiError {
    /// Reading an input file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The CSV header could not be read.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// The input is not usable `GeoJSON`.
    #[error("GeoJSON error: {message}")]
    GeoJson {
        /// Description of what went wrong.
        message: String,
    },

    /// The sink rejected a write.
    #[error("Storage error: {0}")]
    Sink(Box<dyn std::error::Error + Send + Sync>),
}

/// Destination for validated POIs.
///
/// Implementations must treat `(layer, source_id)` as a unique key: writing
/// the same key twice updates in place.
pub trait PoiSink {
    /// Error type for failed writes.
    type Error: std::error::Error + Send + Sync + 'static;

    /// Inserts or updates one POI.
    ///
    /// # Errors
    ///
    /// Returns the sink's error if the write fails.
    fn upsert(&mut self, poi: &Poi) -> Result<UpsertOutcome, Self::Error>;

    /// Called after every batch of upserts.
    ///
    /// # Errors
    ///
    /// Returns the sink's error if committing the batch fails.
    fn flush(&mut self) -> Result<(), Self::Error> {
        Ok(())
    }
}

/// Validates a raw record into a [`Poi`] with no district assigned.
///
/// # Errors
///
/// Returns [`GeometryError`] if the coordinate is missing or invalid.
pub fn validate_record(record: PoiRecord) -> Result<Poi, GeometryError> {
    let coordinate = validate_coordinate(record.coordinate)?;
    Ok(Poi {
        layer: record.layer,
        source_id: record.source_id,
        name: record.name,
        coordinate,
        address: record.address,
        attributes: record.attributes,
        accessibility: record.accessibility,
        district: None,
    })
}

pub(crate) fn rejected(layer: &str, source_id: &str, reason: impl ToString) -> RejectedRecord {
    RejectedRecord {
        layer: layer.to_string(),
        source_id: source_id.to_string(),
        reason: reason.to_string(),
    }
}
