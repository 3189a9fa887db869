//! Overpass QL builders.

use equity_map_city_models::BoundingBox;

/// Offset that turns an OSM relation id into an Overpass area id.
const AREA_ID_OFFSET: u64 = 3_600_000_000;

/// Administrative boundary relation ids of known cities.
const CITY_RELATIONS: &[(&str, u64)] = &[
    ("berlin", 62_422),
    ("darmstadt", 62_581),
    ("frankfurt", 62_400),
    ("hamburg", 62_782),
    ("koeln", 62_578),
    ("mannheim", 62_691),
    ("muenchen", 62_428),
];

/// OSM relation id of the administrative boundary of `city`, if known.
#[must_use]
pub fn city_relation(city: &str) -> Option<u64> {
    CITY_RELATIONS
        .iter()
        .find(|(slug, _)| *slug == city)
        .map(|(_, id)| *id)
}

/// Where district relations are searched.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DistrictArea {
    /// Inside the area of a city boundary relation.
    Relation(u64),
    /// Inside a bounding box, for cities without a known relation.
    BoundingBox(BoundingBox),
}

impl DistrictArea {
    /// The relation area when the city is known, the bounding box otherwise.
    #[must_use]
    pub fn for_city(city: &str, bounds: BoundingBox) -> Self {
        city_relation(city).map_or(Self::BoundingBox(bounds), Self::Relation)
    }
}

/// Query for nodes and ways matching `filter` inside `bbox`.
///
/// `filter` is a tag filter such as `"leisure"="playground"`; ways are
/// returned with their center so every element has one coordinate.
#[must_use]
pub fn poi_query(bbox: &BoundingBox, filter: &str) -> String {
    let bbox = bbox.to_overpass();
    format!(
        "[out:json][timeout:60];\n\
         (\n  node[{filter}]({bbox});\n  way[{filter}]({bbox});\n);\n\
         out center;"
    )
}

/// Query for sub-city administrative boundaries (`admin_level` 9 or 10)
/// with their member ways and nodes.
#[must_use]
pub fn district_query(area: &DistrictArea) -> String {
    let selector = match area {
        DistrictArea::Relation(id) => {
            format!("area({})->.city;\nrelation{DISTRICT_FILTER}(area.city);", AREA_ID_OFFSET + id)
        }
        DistrictArea::BoundingBox(bbox) => {
            format!("relation{DISTRICT_FILTER}({});", bbox.to_overpass())
        }
    };
    format!("[out:json][timeout:90];\n{selector}\nout body;\n>;\nout skel qt;")
}

const DISTRICT_FILTER: &str = r#"["boundary"="administrative"]["admin_level"~"9|10"]"#;
