//! POI rows, the [`PoiSink`] implementation, and assignment write-back.

use std::collections::BTreeMap;

use duckdb::Connection;
use equity_map_city_models::Coordinate;
use equity_map_poi::PoiSink;
use equity_map_poi_models::{Accessibility, Poi, UpsertOutcome, Wheelchair};

use crate::{DbError, in_transaction, to_u64};

/// Raw column values of a `pois` row.
struct PoiRow {
    layer: String,
    source_id: String,
    name: String,
    latitude: f64,
    longitude: f64,
    address: Option<String>,
    attributes_json: String,
    wheelchair: Option<String>,
    district_id: Option<String>,
}

impl PoiRow {
    fn from_row(row: &duckdb::Row<'_>) -> duckdb::Result<Self> {
        Ok(Self {
            layer: row.get(0)?,
            source_id: row.get(1)?,
            name: row.get(2)?,
            latitude: row.get(3)?,
            longitude: row.get(4)?,
            address: row.get(5)?,
            attributes_json: row.get(6)?,
            wheelchair: row.get(7)?,
            district_id: row.get(8)?,
        })
    }
}

impl TryFrom<PoiRow> for Poi {
    type Error = DbError;

    fn try_from(row: PoiRow) -> Result<Self, Self::Error> {
        let attributes: BTreeMap<String, String> = serde_json::from_str(&row.attributes_json)?;
        let wheelchair = row
            .wheelchair
            .as_deref()
            .map(|w| {
                w.parse::<Wheelchair>().map_err(|_| DbError::Conversion {
                    message: format!("unknown wheelchair value '{w}'"),
                })
            })
            .transpose()?;

        Ok(Self {
            layer: row.layer,
            source_id: row.source_id,
            name: row.name,
            coordinate: Coordinate::new(row.latitude, row.longitude),
            address: row.address,
            attributes,
            accessibility: Accessibility { wheelchair },
            district: row.district_id,
        })
    }
}

const SELECT_COLUMNS: &str = "layer, source_id, name, latitude, longitude, address, \
                              attributes_json, wheelchair, district_id";

fn find_poi(conn: &Connection, city: &str, poi: &Poi) -> Result<Option<Poi>, DbError> {
    let row = conn.query_row(
        &format!(
            "SELECT {SELECT_COLUMNS} FROM pois
             WHERE city = ? AND layer = ? AND source_id = ?"
        ),
        duckdb::params![city, poi.layer, poi.source_id],
        PoiRow::from_row,
    );
    match row {
        Ok(row) => Ok(Some(Poi::try_from(row)?)),
        Err(duckdb::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(DbError::DuckDb(e)),
    }
}

/// Inserts or updates one POI keyed by `(city, layer, source_id)`.
///
/// The stored district is kept when the coordinate is unchanged and
/// cleared when it moved.
///
/// # Errors
///
/// Returns [`DbError`] if a statement fails.
pub fn upsert_poi(conn: &Connection, city: &str, poi: &Poi) -> Result<UpsertOutcome, DbError> {
    let existing = find_poi(conn, city, poi)?;

    let (outcome, district) = match &existing {
        None => (UpsertOutcome::Inserted, poi.district.clone()),
        Some(stored) if stored.same_content(poi) => return Ok(UpsertOutcome::Unchanged),
        Some(stored) if stored.coordinate == poi.coordinate => {
            (UpsertOutcome::Updated, stored.district.clone())
        }
        Some(_) => (UpsertOutcome::Updated, None),
    };

    conn.execute(
        "INSERT INTO pois (
            city, layer, source_id, name, latitude, longitude, address,
            attributes_json, wheelchair, district_id
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT (city, layer, source_id) DO UPDATE SET
            name = EXCLUDED.name,
            latitude = EXCLUDED.latitude,
            longitude = EXCLUDED.longitude,
            address = EXCLUDED.address,
            attributes_json = EXCLUDED.attributes_json,
            wheelchair = EXCLUDED.wheelchair,
            district_id = EXCLUDED.district_id",
        duckdb::params![
            city,
            poi.layer,
            poi.source_id,
            poi.name,
            poi.coordinate.lat,
            poi.coordinate.lng,
            poi.address.as_deref(),
            serde_json::to_string(&poi.attributes)?,
            poi.accessibility.wheelchair.as_ref().map(AsRef::<str>::as_ref),
            district.as_deref(),
        ],
    )?;

    Ok(outcome)
}

/// Writes POIs for one city. Every upsert commits on its own, so an
/// import that stops midway keeps the records written before it.
pub struct PoiWriter<'a> {
    conn: &'a Connection,
    city: String,
    written: u64,
}

impl<'a> PoiWriter<'a> {
    /// Writer for the POIs of `city`.
    #[must_use]
    pub fn new(conn: &'a Connection, city: impl Into<String>) -> Self {
        Self {
            conn,
            city: city.into(),
            written: 0,
        }
    }
}

impl PoiSink for PoiWriter<'_> {
    type Error = DbError;

    fn upsert(&mut self, poi: &Poi) -> Result<UpsertOutcome, Self::Error> {
        let outcome = upsert_poi(self.conn, &self.city, poi)?;
        self.written += 1;
        Ok(outcome)
    }

    fn flush(&mut self) -> Result<(), Self::Error> {
        log::debug!("Wrote {} POIs for {}", self.written, self.city);
        Ok(())
    }
}

/// Loads every POI of `city`, ordered by layer and source id.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails or a stored value is invalid.
pub fn load_pois(conn: &Connection, city: &str) -> Result<Vec<Poi>, DbError> {
    let mut stmt = conn.prepare(&format!(
        "SELECT {SELECT_COLUMNS} FROM pois WHERE city = ? ORDER BY layer, source_id"
    ))?;
    let mut rows = stmt.query([city])?;

    let mut pois = Vec::new();
    while let Some(row) = rows.next()? {
        pois.push(Poi::try_from(PoiRow::from_row(row)?)?);
    }

    Ok(pois)
}

/// Number of POIs stored for `city`.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub fn count_pois(conn: &Connection, city: &str) -> Result<u64, DbError> {
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM pois WHERE city = ?", [city], |row| {
        row.get(0)
    })?;
    to_u64(count, "poi count")
}

/// Writes the `district` of every POI back to storage.
///
/// # Errors
///
/// Returns [`DbError`] if any update fails; no assignment is written then.
pub fn save_assignments(conn: &Connection, city: &str, pois: &[Poi]) -> Result<usize, DbError> {
    in_transaction(conn, |conn| {
        let mut stmt = conn.prepare(
            "UPDATE pois SET district_id = ?
             WHERE city = ? AND layer = ? AND source_id = ?",
        )?;
        let mut updated = 0;
        for poi in pois {
            updated += stmt.execute(duckdb::params![
                poi.district.as_deref(),
                city,
                poi.layer,
                poi.source_id,
            ])?;
        }
        Ok(updated)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::open_in_memory;
    use equity_map_poi::import::import_records;
    use equity_map_poi::progress::null_progress;
    use equity_map_poi_models::PoiRecord;

    fn poi(id: &str, name: &str, lat: f64) -> Poi {
        Poi {
            layer: "playgrounds".to_string(),
            source_id: id.to_string(),
            name: name.to_string(),
            coordinate: Coordinate::new(lat, 8.47),
            address: Some("Hauptstraße 1".to_string()),
            attributes: BTreeMap::from([("operator".to_string(), "Stadt".to_string())]),
            accessibility: Accessibility {
                wheelchair: Some(Wheelchair::Limited),
            },
            district: None,
        }
    }

    #[test]
    fn upsert_reports_outcomes() {
        let conn = open_in_memory().unwrap();
        assert_eq!(
            upsert_poi(&conn, "mannheim", &poi("node/1", "A", 49.5)).unwrap(),
            UpsertOutcome::Inserted
        );
        assert_eq!(
            upsert_poi(&conn, "mannheim", &poi("node/1", "A", 49.5)).unwrap(),
            UpsertOutcome::Unchanged
        );
        assert_eq!(
            upsert_poi(&conn, "mannheim", &poi("node/1", "B", 49.5)).unwrap(),
            UpsertOutcome::Updated
        );
        assert_eq!(count_pois(&conn, "mannheim").unwrap(), 1);

        let loaded = load_pois(&conn, "mannheim").unwrap();
        assert_eq!(loaded, vec![poi("node/1", "B", 49.5)]);
    }

    #[test]
    fn moving_a_poi_clears_its_district() {
        let conn = open_in_memory().unwrap();
        let mut assigned = poi("node/1", "A", 49.5);
        assigned.district = Some("mitte".to_string());
        upsert_poi(&conn, "mannheim", &assigned).unwrap();

        upsert_poi(&conn, "mannheim", &poi("node/1", "Renamed", 49.5)).unwrap();
        assert_eq!(load_pois(&conn, "mannheim").unwrap()[0].district.as_deref(), Some("mitte"));

        upsert_poi(&conn, "mannheim", &poi("node/1", "Renamed", 49.6)).unwrap();
        assert_eq!(load_pois(&conn, "mannheim").unwrap()[0].district, None);
    }

    #[test]
    fn import_twice_is_idempotent() {
        let conn = open_in_memory().unwrap();
        let records = || {
            (1..=3).map(|i| {
                Ok(PoiRecord {
                    layer: "playgrounds".to_string(),
                    source_id: format!("node/{i}"),
                    name: format!("Spielplatz {i}"),
                    coordinate: Some(Coordinate::new(49.5, 8.47)),
                    address: None,
                    attributes: BTreeMap::new(),
                    accessibility: Accessibility::default(),
                })
            })
        };

        let first = {
            let mut writer = PoiWriter::new(&conn, "mannheim");
            import_records(&mut writer, records(), 2, &null_progress()).unwrap()
        };
        let second = {
            let mut writer = PoiWriter::new(&conn, "mannheim");
            import_records(&mut writer, records(), 2, &null_progress()).unwrap()
        };

        assert_eq!(first.inserted, 3);
        assert_eq!(second.unchanged, 3);
        assert_eq!(count_pois(&conn, "mannheim").unwrap(), 3);
    }

    #[test]
    fn records_written_before_an_interrupted_batch_persist() {
        let conn = open_in_memory().unwrap();
        {
            let mut writer = PoiWriter::new(&conn, "mannheim");
            writer.upsert(&poi("node/1", "A", 49.5)).unwrap();
            writer.flush().unwrap();
            writer.upsert(&poi("node/2", "B", 49.5)).unwrap();
        }
        assert_eq!(count_pois(&conn, "mannheim").unwrap(), 2);
    }

    #[test]
    fn assignments_are_written_back() {
        let conn = open_in_memory().unwrap();
        upsert_poi(&conn, "mannheim", &poi("node/1", "A", 49.5)).unwrap();
        upsert_poi(&conn, "darmstadt", &poi("node/1", "A", 49.5)).unwrap();

        let mut assigned = poi("node/1", "A", 49.5);
        assigned.district = Some("innenstadt".to_string());
        assert_eq!(save_assignments(&conn, "mannheim", &[assigned]).unwrap(), 1);

        assert_eq!(
            load_pois(&conn, "mannheim").unwrap()[0].district.as_deref(),
            Some("innenstadt")
        );
        assert_eq!(load_pois(&conn, "darmstadt").unwrap()[0].district, None);
    }
}
