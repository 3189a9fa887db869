//! District rows with `GeoJSON` boundary text.

use duckdb::Connection;
use equity_map_city_models::{City, DistrictRecord};
use equity_map_spatial::boundary::{geometry_to_string, parse_geometry};
use equity_map_spatial::{DistrictBoundary, DistrictIndex};

use crate::{DbError, in_transaction, to_i64, to_u64};

/// Replaces every district of `city` with `districts`, in the given order.
///
/// District assignments of the city's POIs are cleared because they may
/// no longer be valid; run assignment again afterwards.
///
/// # Errors
///
/// Returns [`DbError`] if any statement fails.
pub fn replace_districts(
    conn: &Connection,
    city: &str,
    districts: &[DistrictBoundary],
) -> Result<usize, DbError> {
    in_transaction(conn, |conn| {
        let mut stmt = conn.prepare(
            "INSERT INTO districts (
                city, id, position, name, area_km2, population, boundary_geojson
            ) VALUES (?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (city, id) DO UPDATE SET
                position = EXCLUDED.position,
                name = EXCLUDED.name,
                area_km2 = EXCLUDED.area_km2,
                population = EXCLUDED.population,
                boundary_geojson = EXCLUDED.boundary_geojson",
        )?;

        for (position, district) in districts.iter().enumerate() {
            let population = district
                .population
                .map(|p| to_i64(p, "districts.population"))
                .transpose()?;
            stmt.execute(duckdb::params![
                city,
                district.id,
                to_i64(position, "districts.position")?,
                district.name,
                district.area_km2,
                population,
                geometry_to_string(&district.polygon)?,
            ])?;
        }

        let stored: Vec<String> = {
            let mut stmt = conn.prepare("SELECT id FROM districts WHERE city = ?")?;
            let mut rows = stmt.query([city])?;
            let mut ids = Vec::new();
            while let Some(row) = rows.next()? {
                ids.push(row.get(0)?);
            }
            ids
        };
        for stale in stored
            .iter()
            .filter(|id| !districts.iter().any(|d| &d.id == *id))
        {
            conn.execute(
                "DELETE FROM districts WHERE city = ? AND id = ?",
                duckdb::params![city, stale],
            )?;
        }

        conn.execute(
            "UPDATE pois SET district_id = NULL WHERE city = ? AND district_id IS NOT NULL",
            [city],
        )?;

        Ok(())
    })?;

    log::info!("Stored {} districts for {city}", districts.len());
    Ok(districts.len())
}

/// Loads district boundaries in stored order.
///
/// # Errors
///
/// Returns [`DbError`] if a query fails or a stored geometry is invalid.
pub fn load_districts(conn: &Connection, city: &str) -> Result<Vec<DistrictBoundary>, DbError> {
    let mut stmt = conn.prepare(
        "SELECT id, name, population, boundary_geojson
         FROM districts WHERE city = ? ORDER BY position",
    )?;
    let mut rows = stmt.query([city])?;

    let mut districts = Vec::new();
    while let Some(row) = rows.next()? {
        let id: String = row.get(0)?;
        let name: String = row.get(1)?;
        let population: Option<i64> = row.get(2)?;
        let geojson: String = row.get(3)?;

        let mut district = DistrictBoundary::new(id, name, parse_geometry(&geojson)?);
        district.population = population
            .map(|p| to_u64(p, "districts.population"))
            .transpose()?;
        districts.push(district);
    }

    Ok(districts)
}

/// Loads descriptive district data without geometry, in stored order.
///
/// # Errors
///
/// Returns [`DbError`] if a query fails.
pub fn load_district_records(
    conn: &Connection,
    city: &str,
) -> Result<Vec<DistrictRecord>, DbError> {
    let mut stmt = conn.prepare(
        "SELECT id, name, area_km2, population
         FROM districts WHERE city = ? ORDER BY position",
    )?;
    let mut rows = stmt.query([city])?;

    let mut records = Vec::new();
    while let Some(row) = rows.next()? {
        let population: Option<i64> = row.get(3)?;
        records.push(DistrictRecord {
            id: row.get(0)?,
            name: row.get(1)?,
            area_km2: row.get(2)?,
            population: population
                .map(|p| to_u64(p, "districts.population"))
                .transpose()?,
        });
    }

    Ok(records)
}

/// Builds the spatial index for `city` from stored boundaries, using the
/// city bounding box as the assignment pre-filter.
///
/// # Errors
///
/// Returns [`DbError`] if loading fails or the boundaries cannot be
/// indexed.
pub fn load_district_index(conn: &Connection, city: &City) -> Result<DistrictIndex, DbError> {
    let districts = load_districts(conn, &city.slug)?;
    Ok(DistrictIndex::new(districts, Some(city.bounds))?)
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::open_in_memory;
    use geo::{MultiPolygon, polygon};

    /// Square district from (`x0`, `y0`) with side `size`, in lon/lat.
    pub(crate) fn square(id: &str, x0: f64, y0: f64, size: f64) -> DistrictBoundary {
        let p = polygon![
            (x: x0, y: y0),
            (x: x0 + size, y: y0),
            (x: x0 + size, y: y0 + size),
            (x: x0, y: y0 + size),
            (x: x0, y: y0),
        ];
        DistrictBoundary::new(id, id.to_uppercase(), MultiPolygon(vec![p]))
    }

    #[test]
    fn districts_round_trip_in_order() {
        let conn = open_in_memory().unwrap();
        let mut west = square("west", 8.4, 49.4, 0.1);
        west.population = Some(12_000);
        let districts = vec![square("zentrum", 8.5, 49.4, 0.1), west];

        replace_districts(&conn, "mannheim", &districts).unwrap();
        let loaded = load_districts(&conn, "mannheim").unwrap();

        assert_eq!(loaded.len(), 2);
        assert_eq!(loaded[0].id, "zentrum");
        assert_eq!(loaded[1].population, Some(12_000));
        assert_eq!(loaded[0].polygon, districts[0].polygon);

        let records = load_district_records(&conn, "mannheim").unwrap();
        assert_eq!(records[1].name, "WEST");
        assert!(records[0].area_km2.unwrap() > 0.0);
    }

    #[test]
    fn replacing_drops_stale_districts() {
        let conn = open_in_memory().unwrap();
        replace_districts(
            &conn,
            "mannheim",
            &[square("a", 8.4, 49.4, 0.1), square("b", 8.5, 49.4, 0.1)],
        )
        .unwrap();
        replace_districts(&conn, "mannheim", &[square("b", 8.5, 49.4, 0.1)]).unwrap();

        let ids: Vec<String> = load_districts(&conn, "mannheim")
            .unwrap()
            .into_iter()
            .map(|d| d.id)
            .collect();
        assert_eq!(ids, vec!["b"]);
    }

    #[test]
    fn cities_are_partitioned() {
        let conn = open_in_memory().unwrap();
        replace_districts(&conn, "mannheim", &[square("a", 8.4, 49.4, 0.1)]).unwrap();
        replace_districts(&conn, "darmstadt", &[]).unwrap();
        assert_eq!(load_districts(&conn, "mannheim").unwrap().len(), 1);
        assert!(load_districts(&conn, "darmstadt").unwrap().is_empty());
    }
}
