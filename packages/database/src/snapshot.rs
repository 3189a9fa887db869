//! Immutable city snapshots for analytics.

use duckdb::Connection;
use equity_map_analytics::report::CitySnapshot;

use crate::DbError;
use crate::cities::require_city;
use crate::districts::load_district_records;
use crate::pois::load_pois;

/// Loads the current state of `city` for report generation.
///
/// # Errors
///
/// Returns [`DbError::CityNotFound`] if the city was never loaded, or
/// [`DbError`] if a query fails.
pub fn load_snapshot(conn: &Connection, city: &str) -> Result<CitySnapshot, DbError> {
    let city = require_city(conn, city)?;
    let districts = load_district_records(conn, &city.slug)?;
    let pois = load_pois(conn, &city.slug)?;

    log::debug!(
        "Snapshot of {}: {} districts, {} POIs",
        city.slug,
        districts.len(),
        pois.len()
    );

    Ok(CitySnapshot {
        city,
        districts,
        pois,
    })
}
