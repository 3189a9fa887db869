#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions)]

//! In-memory spatial index for district assignment.
//!
//! Holds a city's district polygons as an indexed array with a parallel
//! R-tree of bounding boxes, and resolves POI coordinates to the district
//! that contains them. The index is immutable once built; lookups take
//! `&self` and can run from any number of threads.
//!
//! # Boundary rule
//!
//! Districts keep the order they were loaded in. A point is tested against
//! the closed polygon (edges and vertices count as inside), and when more
//! than one district covers it (shared edge, overlapping data) the district
//! with the lowest load index wins. The answer never depends on R-tree
//! traversal order.

pub mod boundary;

use std::collections::BTreeSet;

use equity_map_city_models::{BoundingBox, Coordinate};
use geo::{BoundingRect, Intersects, MultiPolygon, Point};
use rstar::{AABB, RTree, RTreeObject};
use thiserror::Error;

/// Invalid or missing geometry.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum GeometryError {
    /// The record has no coordinate at all.
    #[error("missing coordinate")]
    MissingCoordinate,

    /// The coordinate is non-finite or out of range.
    #[error("invalid coordinate ({lat}, {lng})")]
    InvalidCoordinate {
        /// Latitude as supplied.
        lat: f64,
        /// Longitude as supplied.
        lng: f64,
    },

    /// A district polygon has no rings or non-finite vertices.
    #[error("invalid polygon for district '{district}': {message}")]
    InvalidPolygon {
        /// District identifier.
        district: String,
        /// What is wrong with it.
        message: String,
    },

    /// A district name has no characters usable in an identifier.
    #[error("district name '{0}' yields an empty id")]
    EmptyDistrictId(String),

    /// Two districts share an identifier.
    #[error("duplicate district id '{0}'")]
    DuplicateDistrict(String),

    /// A `GeoJSON` document or geometry could not be parsed.
    #[error("GeoJSON error: {0}")]
    GeoJson(String),
}

/// A district with its boundary geometry.
#[derive(Debug, Clone, PartialEq)]
pub struct DistrictBoundary {
    /// Slug identifier, unique within the city.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Boundary in lon/lat degrees. Holes and multiple parts are allowed.
    pub polygon: MultiPolygon<f64>,
    /// Spherical area in square kilometres.
    pub area_km2: f64,
    /// Resident population, when known.
    pub population: Option<u64>,
}

impl DistrictBoundary {
    /// Builds a district and computes its area.
    #[must_use]
    pub fn new(id: impl Into<String>, name: impl Into<String>, polygon: MultiPolygon<f64>) -> Self {
        let area_km2 = boundary::area_km2(&polygon);
        Self {
            id: id.into(),
            name: name.into(),
            polygon,
            area_km2,
            population: None,
        }
    }
}

/// R-tree entry pointing back into the district array.
struct DistrictEntry {
    index: usize,
    envelope: AABB<[f64; 2]>,
}

impl RTreeObject for DistrictEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        self.envelope
    }
}

/// Pre-built spatial index over one city's districts.
pub struct DistrictIndex {
    districts: Vec<DistrictBoundary>,
    tree: RTree<DistrictEntry>,
    /// City bounding box; points outside it skip polygon testing.
    bounds: Option<BoundingBox>,
}

impl DistrictIndex {
    /// Builds the index. District order is preserved and defines the
    /// tie-break order for shared boundaries.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError::DuplicateDistrict`] if two districts share
    /// an id, or [`GeometryError::InvalidPolygon`] if a polygon is empty
    /// or has non-finite vertices.
    pub fn new(
        districts: Vec<DistrictBoundary>,
        bounds: Option<BoundingBox>,
    ) -> Result<Self, GeometryError> {
        let mut seen = BTreeSet::new();
        let mut entries = Vec::with_capacity(districts.len());

        for (index, district) in districts.iter().enumerate() {
            if !seen.insert(district.id.as_str()) {
                return Err(GeometryError::DuplicateDistrict(district.id.clone()));
            }
            boundary::validate_polygon(&district.id, &district.polygon)?;
            let envelope = compute_envelope(&district.polygon).ok_or_else(|| {
                GeometryError::InvalidPolygon {
                    district: district.id.clone(),
                    message: "polygon has no extent".to_string(),
                }
            })?;
            entries.push(DistrictEntry { index, envelope });
        }

        log::debug!("Indexed {} district boundaries", entries.len());

        Ok(Self {
            districts,
            tree: RTree::bulk_load(entries),
            bounds,
        })
    }

    /// Districts in load order.
    #[must_use]
    pub fn districts(&self) -> &[DistrictBoundary] {
        &self.districts
    }

    /// Number of indexed districts.
    #[must_use]
    pub fn len(&self) -> usize {
        self.districts.len()
    }

    /// Whether the index holds no districts.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.districts.is_empty()
    }

    /// Finds the district containing `coord`.
    ///
    /// Returns `Ok(None)` ("unassigned") when the point lies outside the
    /// city bounding box or outside every district.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError`] if the coordinate is missing, non-finite,
    /// or out of range.
    pub fn locate(
        &self,
        coord: Option<Coordinate>,
    ) -> Result<Option<&DistrictBoundary>, GeometryError> {
        let coord = validate_coordinate(coord)?;

        if let Some(bounds) = &self.bounds
            && !bounds.contains(coord)
        {
            return Ok(None);
        }

        let point = Point::new(coord.lng, coord.lat);
        let query_env = AABB::from_point([coord.lng, coord.lat]);

        let winner = self
            .tree
            .locate_in_envelope_intersecting(&query_env)
            .filter(|entry| self.districts[entry.index].polygon.intersects(&point))
            .map(|entry| entry.index)
            .min();

        Ok(winner.map(|index| &self.districts[index]))
    }

    /// Like [`Self::locate`] but returns the district id.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError`] for a missing or invalid coordinate.
    pub fn assign(&self, coord: Option<Coordinate>) -> Result<Option<String>, GeometryError> {
        Ok(self.locate(coord)?.map(|d| d.id.clone()))
    }
}

/// Checks that a coordinate is present, finite and in range.
///
/// # Errors
///
/// Returns [`GeometryError::MissingCoordinate`] or
/// [`GeometryError::InvalidCoordinate`].
pub fn validate_coordinate(coord: Option<Coordinate>) -> Result<Coordinate, GeometryError> {
    let coord = coord.ok_or(GeometryError::MissingCoordinate)?;
    if coord.is_valid() {
        Ok(coord)
    } else {
        Err(GeometryError::InvalidCoordinate {
            lat: coord.lat,
            lng: coord.lng,
        })
    }
}

fn compute_envelope(mp: &MultiPolygon<f64>) -> Option<AABB<[f64; 2]>> {
    mp.bounding_rect()
        .map(|rect| AABB::from_corners([rect.min().x, rect.min().y], [rect.max().x, rect.max().y]))
}
