//! Overpass JSON response model.

use std::collections::{BTreeMap, HashMap};

use equity_map_city_models::Coordinate;
use serde::Deserialize;

/// Top-level Overpass JSON response.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct OverpassResponse {
    #[serde(default)]
    pub elements: Vec<Element>,
    /// Set when the server hit a timeout or memory limit mid-query.
    #[serde(default)]
    pub remark: Option<String>,
}

/// Latitude/longitude pair as Overpass writes it.
#[derive(Debug, Clone, Copy, PartialEq, Deserialize)]
pub struct LatLon {
    pub lat: f64,
    pub lon: f64,
}

impl From<LatLon> for Coordinate {
    fn from(p: LatLon) -> Self {
        Self::new(p.lat, p.lon)
    }
}

/// One OSM element.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum Element {
    Node {
        id: u64,
        #[serde(default)]
        lat: Option<f64>,
        #[serde(default)]
        lon: Option<f64>,
        #[serde(default)]
        tags: BTreeMap<String, String>,
    },
    Way {
        id: u64,
        /// Present with `out center`.
        #[serde(default)]
        center: Option<LatLon>,
        #[serde(default)]
        nodes: Vec<u64>,
        #[serde(default)]
        tags: BTreeMap<String, String>,
    },
    Relation {
        id: u64,
        #[serde(default)]
        members: Vec<Member>,
        #[serde(default)]
        tags: BTreeMap<String, String>,
    },
    #[serde(other)]
    Other,
}

/// A member reference of a relation.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Member {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(rename = "ref")]
    pub id: u64,
    #[serde(default)]
    pub role: String,
}

impl Element {
    /// `node/123`, `way/45`, `relation/6`.
    #[must_use]
    pub fn source_id(&self) -> Option<String> {
        match self {
            Self::Node { id, .. } => Some(format!("node/{id}")),
            Self::Way { id, .. } => Some(format!("way/{id}")),
            Self::Relation { id, .. } => Some(format!("relation/{id}")),
            Self::Other => None,
        }
    }

    /// The node position, or the way center.
    #[must_use]
    pub fn coordinate(&self) -> Option<Coordinate> {
        match self {
            Self::Node {
                lat: Some(lat),
                lon: Some(lon),
                ..
            } => Some(Coordinate::new(*lat, *lon)),
            Self::Way {
                center: Some(center),
                ..
            } => Some((*center).into()),
            _ => None,
        }
    }

    #[must_use]
    pub fn tags(&self) -> Option<&BTreeMap<String, String>> {
        match self {
            Self::Node { tags, .. } | Self::Way { tags, .. } | Self::Relation { tags, .. } => {
                Some(tags)
            }
            Self::Other => None,
        }
    }
}

/// Node coordinates and way node lists of a response, for resolving
/// relation geometry.
#[derive(Debug, Default)]
pub struct ElementLookup<'a> {
    nodes: HashMap<u64, Coordinate>,
    ways: HashMap<u64, &'a [u64]>,
}

impl<'a> ElementLookup<'a> {
    #[must_use]
    pub fn new(elements: &'a [Element]) -> Self {
        let mut lookup = Self::default();
        for element in elements {
            match element {
                Element::Node {
                    id,
                    lat: Some(lat),
                    lon: Some(lon),
                    ..
                } => {
                    lookup.nodes.insert(*id, Coordinate::new(*lat, *lon));
                }
                Element::Way { id, nodes, .. } => {
                    lookup.ways.insert(*id, nodes.as_slice());
                }
                _ => {}
            }
        }
        lookup
    }

    /// Node ids of a way, if the way is part of the response.
    #[must_use]
    pub fn way_nodes(&self, way: u64) -> Option<&'a [u64]> {
        self.ways.get(&way).copied()
    }

    #[must_use]
    pub fn node(&self, id: u64) -> Option<Coordinate> {
        self.nodes.get(&id).copied()
    }
}
