//! Overpass elements to POI records.

use std::collections::BTreeMap;

use equity_map_city_models::Layer;
use equity_map_poi_models::{Accessibility, PoiRecord, RejectedRecord, Wheelchair};

use crate::element::Element;

/// Tags that become dedicated fields instead of attributes.
const PROMOTED_TAGS: &[&str] = &["name", "addr:street", "addr:housenumber"];

/// Converts the elements of a POI query into records of `layer`.
///
/// Elements without a position (a way returned without `center`) are
/// kept with no coordinate, so they surface as rejected records during
/// import rather than disappearing.
#[must_use]
pub fn to_records(elements: &[Element], layer: &Layer) -> Vec<Result<PoiRecord, RejectedRecord>> {
    elements
        .iter()
        .filter(|e| !matches!(e, Element::Other))
        .enumerate()
        .map(|(i, element)| to_record(element, layer, i + 1))
        .collect()
}

/// Converts one element. `position` is its 1-based place in the response
/// and only names elements that carry no usable tag.
///
/// # Errors
///
/// Returns a [`RejectedRecord`] for element types that cannot be a POI.
pub fn to_record(
    element: &Element,
    layer: &Layer,
    position: usize,
) -> Result<PoiRecord, RejectedRecord> {
    let (Some(source_id), Some(tags)) = (element.source_id(), element.tags()) else {
        return Err(RejectedRecord {
            layer: layer.slug.clone(),
            source_id: format!("element-{position}"),
            reason: "unsupported element type".to_string(),
        });
    };

    let accessibility = Accessibility {
        wheelchair: tags
            .get("wheelchair")
            .and_then(|w| w.parse::<Wheelchair>().ok()),
    };

    Ok(PoiRecord {
        layer: layer.slug.clone(),
        source_id,
        name: derive_name(tags, &layer.name, position),
        coordinate: element.coordinate(),
        address: address(tags),
        attributes: tags
            .iter()
            .filter(|(k, _)| !PROMOTED_TAGS.contains(&k.as_str()))
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect(),
        accessibility,
    })
}

/// A display name for an element.
///
/// `name` and then `operator` win. Unnamed facilities are named by what
/// they are, and anything else by the layer name plus the street or the
/// position.
#[must_use]
pub fn derive_name(tags: &BTreeMap<String, String>, layer_name: &str, position: usize) -> String {
    let tag = |key: &str| tags.get(key).filter(|v| !v.is_empty());

    if let Some(name) = tag("name").or_else(|| tag("operator")) {
        return name.clone();
    }

    match (
        tag("amenity").map(String::as_str),
        tag("leisure").map(String::as_str),
        tag("natural").map(String::as_str),
    ) {
        (Some("recycling"), _, _) => {
            let kinds: Vec<&str> = tags
                .iter()
                .filter(|(_, v)| v.as_str() == "yes")
                .filter_map(|(k, _)| k.strip_prefix("recycling:"))
                .take(3)
                .collect();
            if kinds.is_empty() {
                "Recyclingcontainer".to_string()
            } else {
                format!("Recycling: {}", kinds.join(", "))
            }
        }
        (_, Some("playground"), _) => tag("description")
            .map_or("Spielplatz", String::as_str)
            .to_string(),
        (Some("kindergarten"), _, _) => "Kindergarten".to_string(),
        (Some("school"), _, _) => tag("school:type")
            .map_or("Schule", String::as_str)
            .to_string(),
        (_, _, Some("tree")) => ["species:de", "species", "genus:de", "genus"]
            .into_iter()
            .find_map(tag)
            .map_or("Baum", String::as_str)
            .to_string(),
        _ => tag("addr:street").map_or_else(
            || format!("{layer_name} #{position}"),
            |street| format!("{layer_name} - {street}"),
        ),
    }
}

/// `street housenumber`, or `None` without a street.
fn address(tags: &BTreeMap<String, String>) -> Option<String> {
    let street = tags.get("addr:street").filter(|s| !s.is_empty())?;
    let address = tags
        .get("addr:housenumber")
        .filter(|n| !n.is_empty())
        .map_or_else(|| street.clone(), |number| format!("{street} {number}"));
    Some(address)
}
