//! District boundary parsing, validation, and area computation.
//!
//! Boundaries arrive as `GeoJSON` (files, or geometry text stored in the
//! database). Both `Polygon` and `MultiPolygon` geometries are accepted and
//! normalized to [`MultiPolygon`].

use equity_map_city_models::district_slug;
use geo::{ChamberlainDuquetteArea, MultiPolygon};
use geojson::GeoJson;

use crate::{DistrictBoundary, GeometryError};

/// Spherical area of a multipolygon in square kilometres.
#[must_use]
pub fn area_km2(mp: &MultiPolygon<f64>) -> f64 {
    mp.chamberlain_duquette_unsigned_area() / 1_000_000.0
}

/// Checks that a polygon has at least one ring with three or more distinct
/// vertices and that every vertex is finite.
///
/// # Errors
///
/// Returns [`GeometryError::InvalidPolygon`] describing the first problem.
pub fn validate_polygon(district: &str, mp: &MultiPolygon<f64>) -> Result<(), GeometryError> {
    let invalid = |message: &str| GeometryError::InvalidPolygon {
        district: district.to_string(),
        message: message.to_string(),
    };

    if mp.0.is_empty() {
        return Err(invalid("no polygon parts"));
    }

    for polygon in &mp.0 {
        // A closed ring repeats its first vertex, so a triangle has 4 coords.
        if polygon.exterior().0.len() < 4 {
            return Err(invalid("exterior ring has fewer than 3 vertices"));
        }
        let all_finite = std::iter::once(polygon.exterior())
            .chain(polygon.interiors())
            .flat_map(|ring| ring.0.iter())
            .all(|c| c.x.is_finite() && c.y.is_finite());
        if !all_finite {
            return Err(invalid("non-finite vertex"));
        }
    }

    Ok(())
}

/// Converts a `geojson` geometry into a [`MultiPolygon`].
///
/// # Errors
///
/// Returns [`GeometryError::GeoJson`] for non-areal geometry types or
/// conversion failures.
pub fn geometry_to_multipolygon(
    geometry: geojson::Geometry,
) -> Result<MultiPolygon<f64>, GeometryError> {
    let geo_geom: geo::Geometry<f64> = geometry
        .try_into()
        .map_err(|e: geojson::Error| GeometryError::GeoJson(e.to_string()))?;
    match geo_geom {
        geo::Geometry::MultiPolygon(mp) => Ok(mp),
        geo::Geometry::Polygon(p) => Ok(MultiPolygon(vec![p])),
        other => Err(GeometryError::GeoJson(format!(
            "expected Polygon or MultiPolygon, found {}",
            geometry_kind(&other)
        ))),
    }
}

/// Parses a `GeoJSON` geometry string into a [`MultiPolygon`].
///
/// # Errors
///
/// Returns [`GeometryError::GeoJson`] if the text is not a `GeoJSON`
/// `Polygon`/`MultiPolygon` geometry.
pub fn parse_geometry(geojson_str: &str) -> Result<MultiPolygon<f64>, GeometryError> {
    let geojson: GeoJson = geojson_str
        .parse()
        .map_err(|e: geojson::Error| GeometryError::GeoJson(e.to_string()))?;
    match geojson {
        GeoJson::Geometry(geom) => geometry_to_multipolygon(geom),
        GeoJson::Feature(feature) => feature
            .geometry
            .ok_or_else(|| GeometryError::GeoJson("feature has no geometry".to_string()))
            .and_then(geometry_to_multipolygon),
        GeoJson::FeatureCollection(_) => Err(GeometryError::GeoJson(
            "expected a single geometry, found a FeatureCollection".to_string(),
        )),
    }
}

/// Serializes a [`MultiPolygon`] as a `GeoJSON` geometry string.
///
/// # Errors
///
/// Returns [`GeometryError::GeoJson`] if serialization fails.
pub fn geometry_to_string(mp: &MultiPolygon<f64>) -> Result<String, GeometryError> {
    let geometry = geojson::Geometry::new(geojson::Value::from(mp));
    serde_json::to_string(&geometry).map_err(|e| GeometryError::GeoJson(e.to_string()))
}

/// Result of parsing a boundary `FeatureCollection`.
#[derive(Debug, Default)]
pub struct ParsedBoundaries {
    /// Districts in feature order.
    pub districts: Vec<DistrictBoundary>,
    /// Features that were skipped, with their index and reason.
    pub rejected: Vec<(usize, GeometryError)>,
}

/// Parses a `GeoJSON` `FeatureCollection` of district polygons.
///
/// The district name comes from `name_property`; the id is the slug of the
/// name. An optional numeric `population` property is carried over.
/// Features with a missing name, non-areal geometry, invalid polygon, or a
/// slug already used by an earlier feature are rejected individually;
/// they never abort the rest of the collection.
///
/// # Errors
///
/// Returns [`GeometryError::GeoJson`] if the document itself is not a
/// `FeatureCollection`.
pub fn parse_feature_collection(
    geojson_str: &str,
    name_property: &str,
) -> Result<ParsedBoundaries, GeometryError> {
    let geojson: GeoJson = geojson_str
        .parse()
        .map_err(|e: geojson::Error| GeometryError::GeoJson(e.to_string()))?;
    let GeoJson::FeatureCollection(collection) = geojson else {
        return Err(GeometryError::GeoJson(
            "expected a FeatureCollection".to_string(),
        ));
    };

    let mut parsed = ParsedBoundaries::default();
    let mut seen = std::collections::BTreeSet::new();

    for (i, feature) in collection.features.into_iter().enumerate() {
        let name = feature
            .property(name_property)
            .and_then(serde_json::Value::as_str)
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(ToString::to_string);
        let Some(name) = name else {
            parsed.rejected.push((
                i,
                GeometryError::GeoJson(format!("missing '{name_property}' property")),
            ));
            continue;
        };

        let population = feature
            .property("population")
            .and_then(serde_json::Value::as_u64);

        let Some(geometry) = feature.geometry else {
            parsed.rejected.push((
                i,
                GeometryError::GeoJson(format!("district '{name}' has no geometry")),
            ));
            continue;
        };

        let id = district_slug(&name);
        if id.is_empty() {
            parsed.rejected.push((i, GeometryError::EmptyDistrictId(name)));
            continue;
        }
        let result = geometry_to_multipolygon(geometry)
            .and_then(|mp| validate_polygon(&id, &mp).map(|()| mp));
        match result {
            Ok(_) if !seen.insert(id.clone()) => {
                parsed.rejected.push((i, GeometryError::DuplicateDistrict(id)));
            }
            Ok(mp) => {
                let mut district = DistrictBoundary::new(id, name, mp);
                district.population = population;
                parsed.districts.push(district);
            }
            Err(e) => parsed.rejected.push((i, e)),
        }
    }

    for (i, e) in &parsed.rejected {
        log::warn!("Skipping boundary feature #{i}: {e}");
    }

    Ok(parsed)
}

const fn geometry_kind(geom: &geo::Geometry<f64>) -> &'static str {
    match geom {
        geo::Geometry::Point(_) => "Point",
        geo::Geometry::LineString(_) | geo::Geometry::Line(_) => "LineString",
        geo::Geometry::MultiPoint(_) => "MultiPoint",
        geo::Geometry::MultiLineString(_) => "MultiLineString",
        geo::Geometry::GeometryCollection(_) => "GeometryCollection",
        _ => "non-areal geometry",
    }
}
