//! `GeoJSON` source: one POI per `Point` feature.

use std::collections::BTreeMap;

use equity_map_city_models::Coordinate;
use equity_map_poi_models::{Accessibility, PoiRecord, RejectedRecord, Wheelchair};
use geojson::GeoJson;
use geojson::feature::Id;
use serde_json::Value;

use crate::{PoiError, rejected};

const DEFAULT_NAME: &str = "Unknown";

/// Reads POI records for `layer` from a `GeoJSON` `FeatureCollection`.
///
/// The source id is the feature `id`, else an `id` property, else
/// `feature-<n>` (1-based). The name is read from `name_property`. Every
/// other non-null property becomes a string attribute, except
/// `wheelchair`, which is parsed into the accessibility metadata.
///
/// Features with a non-`Point` geometry are rejected; features without
/// geometry are returned with `coordinate: None`.
///
/// # Errors
///
/// Returns [`PoiError::GeoJson`] if the document is not a
/// `FeatureCollection`.
pub fn read_records(
    geojson_str: &str,
    layer: &str,
    name_property: &str,
) -> Result<Vec<Result<PoiRecord, RejectedRecord>>, PoiError> {
    let geojson: GeoJson = geojson_str.parse().map_err(|e: geojson::Error| PoiError::GeoJson {
        message: e.to_string(),
    })?;
    let GeoJson::FeatureCollection(collection) = geojson else {
        return Err(PoiError::GeoJson {
            message: "expected a FeatureCollection".to_string(),
        });
    };

    Ok(collection
        .features
        .into_iter()
        .enumerate()
        .map(|(i, feature)| parse_feature(feature, i, layer, name_property))
        .collect())
}

fn parse_feature(
    feature: geojson::Feature,
    index: usize,
    layer: &str,
    name_property: &str,
) -> Result<PoiRecord, RejectedRecord> {
    let properties = feature.properties.unwrap_or_default();

    let source_id = match feature.id {
        Some(Id::String(s)) => s,
        Some(Id::Number(n)) => n.to_string(),
        None => properties
            .get("id")
            .and_then(property_string)
            .unwrap_or_else(|| format!("feature-{}", index + 1)),
    };

    let coordinate = match feature.geometry.map(|g| g.value) {
        None => None,
        Some(geojson::Value::Point(position)) => match (position.first(), position.get(1)) {
            (Some(&lng), Some(&lat)) => Some(Coordinate::new(lat, lng)),
            _ => return Err(rejected(layer, &source_id, "point has fewer than 2 positions")),
        },
        Some(other) => {
            return Err(rejected(
                layer,
                &source_id,
                format!("expected Point geometry, found {}", value_kind(&other)),
            ));
        }
    };

    let name = properties
        .get(name_property)
        .and_then(property_string)
        .unwrap_or_else(|| DEFAULT_NAME.to_string());
    let address = properties.get("address").and_then(property_string);
    let wheelchair = properties
        .get("wheelchair")
        .and_then(property_string)
        .and_then(|v| v.parse::<Wheelchair>().ok());

    let attributes: BTreeMap<String, String> = properties
        .iter()
        .filter(|(k, _)| !matches!(k.as_str(), "id" | "address" | "wheelchair"))
        .filter(|(k, _)| k.as_str() != name_property)
        .filter_map(|(k, v)| property_string(v).map(|v| (k.clone(), v)))
        .collect();

    Ok(PoiRecord {
        layer: layer.to_string(),
        source_id,
        name,
        coordinate,
        address,
        attributes,
        accessibility: Accessibility { wheelchair },
    })
}

const fn value_kind(value: &geojson::Value) -> &'static str {
    match value {
        geojson::Value::Point(_) => "Point",
        geojson::Value::MultiPoint(_) => "MultiPoint",
        geojson::Value::LineString(_) => "LineString",
        geojson::Value::MultiLineString(_) => "MultiLineString",
        geojson::Value::Polygon(_) => "Polygon",
        geojson::Value::MultiPolygon(_) => "MultiPolygon",
        geojson::Value::GeometryCollection(_) => "GeometryCollection",
    }
}

/// Renders a property as a string; `None` for null and empty strings.
fn property_string(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) if s.trim().is_empty() => None,
        Value::String(s) => Some(s.trim().to_string()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"{
        "type": "FeatureCollection",
        "features": [
            {
                "type": "Feature",
                "id": "tw-17",
                "geometry": { "type": "Point", "coordinates": [8.651, 49.872] },
                "properties": { "name": "Marktbrunnen", "operator": "Stadt", "wheelchair": "limited", "seasonal": true }
            },
            {
                "type": "Feature",
                "geometry": { "type": "Point", "coordinates": [8.66, 49.88] },
                "properties": { "id": 42, "name": "" }
            },
            {
                "type": "Feature",
                "geometry": null,
                "properties": { "name": "Nowhere" }
            },
            {
                "type": "Feature",
                "geometry": { "type": "LineString", "coordinates": [[8.6, 49.8], [8.7, 49.9]] },
                "properties": { "name": "A path" }
            }
        ]
    }"#;

    #[test]
    fn reads_point_features() {
        let rows = read_records(SAMPLE, "drinking-water", "name").unwrap();
        assert_eq!(rows.len(), 4);

        let first = rows[0].as_ref().unwrap();
        assert_eq!(first.source_id, "tw-17");
        assert_eq!(first.name, "Marktbrunnen");
        assert_eq!(first.coordinate, Some(Coordinate::new(49.872, 8.651)));
        assert_eq!(first.accessibility.wheelchair, Some(Wheelchair::Limited));
        assert_eq!(first.attributes.get("operator").map(String::as_str), Some("Stadt"));
        assert_eq!(first.attributes.get("seasonal").map(String::as_str), Some("true"));
        assert!(!first.attributes.contains_key("name"));
    }

    #[test]
    fn falls_back_to_id_property_and_default_name() {
        let rows = read_records(SAMPLE, "drinking-water", "name").unwrap();
        let second = rows[1].as_ref().unwrap();
        assert_eq!(second.source_id, "42");
        assert_eq!(second.name, "Unknown");
    }

    #[test]
    fn missing_geometry_has_no_coordinate() {
        let rows = read_records(SAMPLE, "drinking-water", "name").unwrap();
        let third = rows[2].as_ref().unwrap();
        assert_eq!(third.source_id, "feature-3");
        assert_eq!(third.coordinate, None);
    }

    #[test]
    fn non_point_geometry_is_rejected() {
        let rows = read_records(SAMPLE, "drinking-water", "name").unwrap();
        let err = rows[3].as_ref().unwrap_err();
        assert_eq!(err.source_id, "feature-4");
        assert!(err.reason.contains("LineString"));
    }

    #[test]
    fn rejects_non_collection_documents() {
        let point = r#"{ "type": "Point", "coordinates": [8.6, 49.8] }"#;
        assert!(matches!(
            read_records(point, "x", "name"),
            Err(PoiError::GeoJson { .. })
        ));
    }
}
