//! City and layer rows.

use duckdb::Connection;
use equity_map_city_models::{BoundingBox, City, Coordinate, Layer, LayerSource};

use crate::{DbError, in_transaction, to_i64, to_u64};

/// One row of [`list_cities`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CitySummary {
    pub slug: String,
    pub name: String,
    /// RFC 3339 timestamp of the last `load-city`.
    pub loaded_at: String,
    pub layers: u64,
    pub districts: u64,
    pub pois: u64,
}

/// Inserts or replaces a city and its layers.
///
/// Layers no longer in the configuration are removed; their POIs stay in
/// the database but are reported under an unconfigured layer id.
///
/// # Errors
///
/// Returns [`DbError`] if any statement fails.
pub fn upsert_city(conn: &Connection, city: &City) -> Result<(), DbError> {
    let loaded_at = chrono::Utc::now().to_rfc3339();

    in_transaction(conn, |conn| {
        conn.execute(
            "INSERT INTO cities (
                slug, name, state, center_lat, center_lng, zoom,
                south, west, north, east, primary_color, loaded_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (slug) DO UPDATE SET
                name = EXCLUDED.name,
                state = EXCLUDED.state,
                center_lat = EXCLUDED.center_lat,
                center_lng = EXCLUDED.center_lng,
                zoom = EXCLUDED.zoom,
                south = EXCLUDED.south,
                west = EXCLUDED.west,
                north = EXCLUDED.north,
                east = EXCLUDED.east,
                primary_color = EXCLUDED.primary_color,
                loaded_at = EXCLUDED.loaded_at",
            duckdb::params![
                city.slug,
                city.name,
                city.state.as_deref(),
                city.center.lat,
                city.center.lng,
                i64::from(city.zoom),
                city.bounds.south,
                city.bounds.west,
                city.bounds.north,
                city.bounds.east,
                city.primary_color,
                loaded_at,
            ],
        )?;

        let mut stmt = conn.prepare(
            "INSERT INTO layers (
                city, slug, position, name, name_de, icon, color,
                visible_by_default, source_json
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
            ON CONFLICT (city, slug) DO UPDATE SET
                position = EXCLUDED.position,
                name = EXCLUDED.name,
                name_de = EXCLUDED.name_de,
                icon = EXCLUDED.icon,
                color = EXCLUDED.color,
                visible_by_default = EXCLUDED.visible_by_default,
                source_json = EXCLUDED.source_json",
        )?;
        for (position, layer) in city.layers.iter().enumerate() {
            let source_json = layer
                .source
                .as_ref()
                .map(serde_json::to_string)
                .transpose()?;
            stmt.execute(duckdb::params![
                city.slug,
                layer.slug,
                to_i64(position, "layers.position")?,
                layer.name,
                layer.name_de.as_deref(),
                layer.icon,
                layer.color,
                layer.visible_by_default,
                source_json,
            ])?;
        }

        let stored: Vec<String> = {
            let mut stmt = conn.prepare("SELECT slug FROM layers WHERE city = ?")?;
            let mut rows = stmt.query([&city.slug])?;
            let mut slugs = Vec::new();
            while let Some(row) = rows.next()? {
                slugs.push(row.get(0)?);
            }
            slugs
        };
        for stale in stored.iter().filter(|s| city.layer(s).is_none()) {
            log::info!("Removing layer '{stale}' from {}", city.slug);
            conn.execute(
                "DELETE FROM layers WHERE city = ? AND slug = ?",
                duckdb::params![city.slug, stale],
            )?;
        }

        Ok(())
    })?;

    log::info!("Loaded city {} with {} layers", city.slug, city.layers.len());
    Ok(())
}

/// Loads a city with its layers in configured order.
///
/// # Errors
///
/// Returns [`DbError`] if a query fails or a stored value is invalid.
pub fn load_city(conn: &Connection, slug: &str) -> Result<Option<City>, DbError> {
    let row = conn.query_row(
        "SELECT name, state, center_lat, center_lng, zoom,
                south, west, north, east, primary_color
         FROM cities WHERE slug = ?",
        [slug],
        |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, Option<String>>(1)?,
                Coordinate::new(row.get(2)?, row.get(3)?),
                row.get::<_, i64>(4)?,
                BoundingBox::new(row.get(5)?, row.get(6)?, row.get(7)?, row.get(8)?),
                row.get::<_, String>(9)?,
            ))
        },
    );
    let (name, state, center, zoom, bounds, primary_color) = match row {
        Ok(v) => v,
        Err(duckdb::Error::QueryReturnedNoRows) => return Ok(None),
        Err(e) => return Err(DbError::DuckDb(e)),
    };

    let zoom = u8::try_from(zoom).map_err(|_| DbError::Conversion {
        message: format!("zoom {zoom} out of range"),
    })?;

    Ok(Some(City {
        slug: slug.to_string(),
        name,
        state,
        center,
        zoom,
        bounds,
        primary_color,
        layers: load_layers(conn, slug)?,
    }))
}

/// Like [`load_city`] but a missing city is an error.
///
/// # Errors
///
/// Returns [`DbError::CityNotFound`] if the city was never loaded.
pub fn require_city(conn: &Connection, slug: &str) -> Result<City, DbError> {
    load_city(conn, slug)?.ok_or_else(|| DbError::CityNotFound {
        slug: slug.to_string(),
    })
}

fn load_layers(conn: &Connection, city: &str) -> Result<Vec<Layer>, DbError> {
    let mut stmt = conn.prepare(
        "SELECT slug, name, name_de, icon, color, visible_by_default, source_json
         FROM layers WHERE city = ? ORDER BY position",
    )?;
    let mut rows = stmt.query([city])?;

    let mut layers = Vec::new();
    while let Some(row) = rows.next()? {
        let source_json: Option<String> = row.get(6)?;
        let source = source_json
            .as_deref()
            .map(serde_json::from_str::<LayerSource>)
            .transpose()?;
        layers.push(Layer {
            slug: row.get(0)?,
            name: row.get(1)?,
            name_de: row.get(2)?,
            icon: row.get(3)?,
            color: row.get(4)?,
            visible_by_default: row.get(5)?,
            source,
        });
    }

    Ok(layers)
}

/// Every loaded city with row counts, ordered by slug.
///
/// # Errors
///
/// Returns [`DbError`] if the query fails.
pub fn list_cities(conn: &Connection) -> Result<Vec<CitySummary>, DbError> {
    let mut stmt = conn.prepare(
        "SELECT c.slug, c.name, c.loaded_at,
                (SELECT COUNT(*) FROM layers l WHERE l.city = c.slug),
                (SELECT COUNT(*) FROM districts d WHERE d.city = c.slug),
                (SELECT COUNT(*) FROM pois p WHERE p.city = c.slug)
         FROM cities c ORDER BY c.slug",
    )?;
    let mut rows = stmt.query([])?;

    let mut cities = Vec::new();
    while let Some(row) = rows.next()? {
        cities.push(CitySummary {
            slug: row.get(0)?,
            name: row.get(1)?,
            loaded_at: row.get(2)?,
            layers: to_u64(row.get(3)?, "layer count")?,
            districts: to_u64(row.get(4)?, "district count")?,
            pois: to_u64(row.get(5)?, "poi count")?,
        });
    }

    Ok(cities)
}
