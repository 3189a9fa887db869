#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! `DuckDB` storage for the equity map.
//!
//! One database file holds every city. District geometry is stored as
//! `GeoJSON` text (no spatial extension); point-in-polygon work happens in
//! memory after [`snapshot::load_snapshot`] or
//! [`districts::load_district_index`]. POIs are unique on
//! `(city, layer, source_id)` so re-imports update in place.

pub mod cities;
pub mod districts;
pub mod paths;
pub mod pois;
pub mod snapshot;

use std::path::Path;

pub use duckdb::Connection;
use equity_map_spatial::GeometryError;

/// Errors that can occur during database operations.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// `DuckDB` error.
    #[error("DuckDB error: {0}")]
    DuckDb(#[from] duckdb::Error),

    /// I/O error creating the database directory.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A JSON column could not be encoded or decoded.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A stored district boundary is not valid geometry.
    #[error("Geometry error: {0}")]
    Geometry(#[from] GeometryError),

    /// No city with this slug has been loaded.
    #[error("City '{slug}' not found; run load-city first")]
    CityNotFound {
        /// The requested slug.
        slug: String,
    },

    /// Data conversion error.
    #[error("Data conversion error: {message}")]
    Conversion {
        /// Description of what went wrong.
        message: String,
    },
}

/// Opens (or creates) the database at `path` and ensures the schema exists.
///
/// # Errors
///
/// Returns [`DbError`] if the connection or schema creation fails.
pub fn open(path: &Path) -> Result<Connection, DbError> {
    if let Some(parent) = path.parent() {
        paths::ensure_dir(parent)?;
    }

    let conn = Connection::open(path)?;
    conn.execute_batch("SET threads = 4; SET memory_limit = '512MB';")?;
    create_schema(&conn)?;

    log::debug!("Opened database {}", path.display());
    Ok(conn)
}

/// Opens the database at [`paths::db_path`].
///
/// # Errors
///
/// Returns [`DbError`] if the connection or schema creation fails.
pub fn open_default() -> Result<Connection, DbError> {
    open(&paths::db_path())
}

/// Opens a throwaway in-memory database with the schema applied.
///
/// # Errors
///
/// Returns [`DbError`] if the connection or schema creation fails.
pub fn open_in_memory() -> Result<Connection, DbError> {
    let conn = Connection::open_in_memory()?;
    create_schema(&conn)?;
    Ok(conn)
}

fn create_schema(conn: &Connection) -> Result<(), DbError> {
    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS cities (
            slug TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            state TEXT,
            center_lat DOUBLE NOT NULL,
            center_lng DOUBLE NOT NULL,
            zoom INTEGER NOT NULL,
            south DOUBLE NOT NULL,
            west DOUBLE NOT NULL,
            north DOUBLE NOT NULL,
            east DOUBLE NOT NULL,
            primary_color TEXT NOT NULL,
            loaded_at TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS layers (
            city TEXT NOT NULL,
            slug TEXT NOT NULL,
            position INTEGER NOT NULL,
            name TEXT NOT NULL,
            name_de TEXT,
            icon TEXT NOT NULL,
            color TEXT NOT NULL,
            visible_by_default BOOLEAN NOT NULL,
            source_json TEXT,
            PRIMARY KEY (city, slug)
        );

        CREATE TABLE IF NOT EXISTS districts (
            city TEXT NOT NULL,
            id TEXT NOT NULL,
            position INTEGER NOT NULL,
            name TEXT NOT NULL,
            area_km2 DOUBLE,
            population BIGINT,
            boundary_geojson TEXT NOT NULL,
            PRIMARY KEY (city, id)
        );

        CREATE TABLE IF NOT EXISTS pois (
            city TEXT NOT NULL,
            layer TEXT NOT NULL,
            source_id TEXT NOT NULL,
            name TEXT NOT NULL,
            latitude DOUBLE NOT NULL,
            longitude DOUBLE NOT NULL,
            address TEXT,
            attributes_json TEXT NOT NULL,
            wheelchair TEXT,
            district_id TEXT,
            PRIMARY KEY (city, layer, source_id)
        );",
    )?;

    Ok(())
}

/// Runs `f` inside a transaction, committing on success and rolling back
/// on error.
///
/// # Errors
///
/// Returns the error from `f`, or [`DbError`] if BEGIN/COMMIT fails.
pub fn in_transaction<T>(
    conn: &Connection,
    f: impl FnOnce(&Connection) -> Result<T, DbError>,
) -> Result<T, DbError> {
    conn.execute_batch("BEGIN TRANSACTION")?;
    match f(conn) {
        Ok(value) => {
            conn.execute_batch("COMMIT")?;
            Ok(value)
        }
        Err(e) => {
            if let Err(rollback) = conn.execute_batch("ROLLBACK") {
                log::error!("Rollback failed: {rollback}");
            }
            Err(e)
        }
    }
}

/// Converts a stored non-negative integer.
pub(crate) fn to_u64(value: i64, column: &str) -> Result<u64, DbError> {
    u64::try_from(value).map_err(|_| DbError::Conversion {
        message: format!("negative value {value} in {column}"),
    })
}

/// Converts a count or position for storage.
pub(crate) fn to_i64(value: impl TryInto<i64>, column: &str) -> Result<i64, DbError> {
    value.try_into().map_err(|_| DbError::Conversion {
        message: format!("value out of range for {column}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schema_creation_is_idempotent() {
        let conn = open_in_memory().unwrap();
        create_schema(&conn).unwrap();
        let tables: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM information_schema.tables
                 WHERE table_name IN ('cities', 'layers', 'districts', 'pois')",
                [],
                |row| row.get(0),
            )
            .unwrap();
        assert_eq!(tables, 4);
    }

    #[test]
    fn failed_transaction_rolls_back() {
        let conn = open_in_memory().unwrap();
        let result: Result<(), DbError> = in_transaction(&conn, |conn| {
            conn.execute(
                "INSERT INTO districts VALUES ('x', 'a', 0, 'A', NULL, NULL, '{}')",
                [],
            )?;
            Err(DbError::Conversion {
                message: "boom".to_string(),
            })
        });
        assert!(result.is_err());

        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM districts", [], |row| row.get(0))
            .unwrap();
        assert_eq!(count, 0);
    }
}
