#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! City, layer, and district definition types.
//!
//! A [`City`] owns an ordered list of [`Layer`]s (facility categories such
//! as playgrounds or schools). Districts are the aggregation unit; their
//! polygon geometry lives in the spatial crate, only the descriptive
//! [`DistrictRecord`] is defined here.

use serde::{Deserialize, Serialize};

/// A WGS84 coordinate in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Coordinate {
    /// Latitude, -90 to 90.
    pub lat: f64,
    /// Longitude, -180 to 180.
    pub lng: f64,
}

impl Coordinate {
    /// Coordinate from latitude and longitude in degrees.
    #[must_use]
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    /// Returns `true` if both components are finite and within the valid
    /// latitude/longitude ranges.
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.lat.is_finite()
            && self.lng.is_finite()
            && (-90.0..=90.0).contains(&self.lat)
            && (-180.0..=180.0).contains(&self.lng)
    }
}

/// An axis-aligned bounding box in decimal degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    /// Southern edge (minimum latitude).
    pub south: f64,
    /// Western edge (minimum longitude).
    pub west: f64,
    /// Northern edge (maximum latitude).
    pub north: f64,
    /// Eastern edge (maximum longitude).
    pub east: f64,
}

impl BoundingBox {
    /// Box from its south, west, north and east edges.
    #[must_use]
    pub const fn new(south: f64, west: f64, north: f64, east: f64) -> Self {
        Self {
            south,
            west,
            north,
            east,
        }
    }

    /// A square box of `half_extent` degrees around `center`.
    #[must_use]
    pub fn around(center: Coordinate, half_extent: f64) -> Self {
        Self {
            south: center.lat - half_extent,
            west: center.lng - half_extent,
            north: center.lat + half_extent,
            east: center.lng + half_extent,
        }
    }

    /// Inclusive containment test.
    #[must_use]
    pub fn contains(&self, coord: Coordinate) -> bool {
        coord.lat >= self.south
            && coord.lat <= self.north
            && coord.lng >= self.west
            && coord.lng <= self.east
    }

    /// Returns `true` if the box is non-degenerate (south < north, west < east).
    #[must_use]
    pub fn is_valid(&self) -> bool {
        self.south < self.north && self.west < self.east
    }

    /// Formats the box as an Overpass `(south,west,north,east)` filter body.
    #[must_use]
    pub fn to_overpass(&self) -> String {
        format!("{},{},{},{}", self.south, self.west, self.north, self.east)
    }
}

/// A city with its map configuration and configured layers.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct City {
    /// URL-safe identifier (e.g. `"mannheim"`).
    pub slug: String,
    /// Display name.
    pub name: String,
    /// State (Bundesland), if configured.
    pub state: Option<String>,
    /// Map center.
    pub center: Coordinate,
    /// Default map zoom level.
    pub zoom: u8,
    /// Bounding box used for sync queries and the assignment pre-filter.
    pub bounds: BoundingBox,
    /// Theme color as `#rrggbb`.
    pub primary_color: String,
    /// Layers in configured order.
    pub layers: Vec<Layer>,
}

impl City {
    /// Looks up a layer by slug.
    #[must_use]
    pub fn layer(&self, slug: &str) -> Option<&Layer> {
        self.layers.iter().find(|l| l.slug == slug)
    }

    /// Layer slugs in configured order.
    #[must_use]
    pub fn layer_ids(&self) -> Vec<String> {
        self.layers.iter().map(|l| l.slug.clone()).collect()
    }
}

/// A facility category within a city.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Layer {
    /// Identifier, unique within the city.
    pub slug: String,
    /// Display name.
    pub name: String,
    /// German display name.
    pub name_de: Option<String>,
    /// Icon name for the map front-end.
    pub icon: String,
    /// Marker color as `#rrggbb`.
    pub color: String,
    /// Whether the layer is shown when the map first loads.
    pub visible_by_default: bool,
    /// Where POIs for this layer come from.
    pub source: Option<LayerSource>,
}

/// Data source for a layer's POIs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum LayerSource {
    /// `OpenStreetMap` via the Overpass API.
    Osm {
        /// Tag filter body, e.g. `"leisure"="playground"`.
        query: String,
    },
    /// A local CSV file.
    Csv {
        /// Path to the file.
        path: String,
        /// Column names.
        #[serde(default)]
        columns: CsvColumns,
    },
    /// A local `GeoJSON` `FeatureCollection` of points.
    Geojson {
        /// Path to the file.
        path: String,
        /// Property holding the POI name.
        #[serde(default = "default_name_property")]
        name_property: String,
    },
}

fn default_name_property() -> String {
    "name".to_string()
}

/// Column mapping for CSV imports.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CsvColumns {
    pub name: String,
    pub lat: String,
    pub lng: String,
    pub address: String,
    /// Column holding a stable record id. Rows without one fall back to
    /// their row number.
    pub id: String,
}

impl Default for CsvColumns {
    fn default() -> Self {
        Self {
            name: "name".to_string(),
            lat: "lat".to_string(),
            lng: "lng".to_string(),
            address: "address".to_string(),
            id: "id".to_string(),
        }
    }
}

/// Descriptive district data (geometry is held separately).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistrictRecord {
    /// Slug identifier, unique within the city.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Spherical area in square kilometres.
    pub area_km2: Option<f64>,
    /// Resident population, when known.
    pub population: Option<u64>,
}

/// Derives a district slug from its name.
///
/// Lowercases, replaces spaces with `-`, transliterates German umlauts and
/// `ß`, and drops everything that is not alphanumeric or `-`. Other
/// letters such as `é` are kept as they are. A name without any
/// alphanumeric character yields an empty slug.
#[must_use]
pub fn district_slug(name: &str) -> String {
    let mut slug = String::with_capacity(name.len());
    for c in name.trim().to_lowercase().chars() {
        match c {
            ' ' => slug.push('-'),
            'ä' => slug.push_str("ae"),
            'ö' => slug.push_str("oe"),
            'ü' => slug.push_str("ue"),
            'ß' => slug.push_str("ss"),
            c if c.is_alphanumeric() || c == '-' => slug.push(c),
            _ => {}
        }
    }
    slug
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slug_transliterates_umlauts() {
        assert_eq!(district_slug("Neckarstadt-Ost"), "neckarstadt-ost");
        assert_eq!(district_slug("Schönau Nord"), "schoenau-nord");
        assert_eq!(district_slug("Käfertal"), "kaefertal");
        assert_eq!(district_slug("Straße (Alt)"), "strasse-alt");
    }

    #[test]
    fn slug_keeps_other_letters() {
        assert_eq!(district_slug("Île Saint-Louis"), "île-saint-louis");
        assert_ne!(district_slug("Élysée"), district_slug("Îlot"));
        assert_eq!(district_slug("(*)"), "");
    }

    #[test]
    fn bounding_box_is_inclusive() {
        let bbox = BoundingBox::new(49.0, 8.0, 50.0, 9.0);
        assert!(bbox.contains(Coordinate::new(49.0, 8.0)));
        assert!(bbox.contains(Coordinate::new(50.0, 9.0)));
        assert!(!bbox.contains(Coordinate::new(50.000_1, 8.5)));
    }

    #[test]
    fn default_bounds_around_center() {
        let bbox = BoundingBox::around(Coordinate::new(49.5, 8.5), 0.1);
        assert!((bbox.south - 49.4).abs() < 1e-9);
        assert!((bbox.east - 8.6).abs() < 1e-9);
        assert!(bbox.is_valid());
    }

    #[test]
    fn rejects_out_of_range_coordinates() {
        assert!(Coordinate::new(49.5, 8.5).is_valid());
        assert!(!Coordinate::new(91.0, 8.5).is_valid());
        assert!(!Coordinate::new(49.5, f64::NAN).is_valid());
        assert!(!Coordinate::new(49.5, -180.5).is_valid());
    }
}
