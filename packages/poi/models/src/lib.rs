#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Point-of-interest record and import report types.
//!
//! [`PoiRecord`] is what a sync or import source produces: the coordinate
//! may be missing or invalid. [`Poi`] is a validated record, optionally
//! resolved to a district. Both are keyed by [`SourceKey`] so re-syncing
//! the same source updates rather than duplicates.

use std::collections::BTreeMap;

use equity_map_city_models::Coordinate;
use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Upsert key: a source identifier is only unique within its layer.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SourceKey {
    /// Layer slug.
    pub layer: String,
    /// Identifier assigned by the source (e.g. `"node/123"`, `"row-7"`).
    pub source_id: String,
}

impl SourceKey {
    #[must_use]
    pub fn new(layer: impl Into<String>, source_id: impl Into<String>) -> Self {
        Self {
            layer: layer.into(),
            source_id: source_id.into(),
        }
    }
}

impl std::fmt::Display for SourceKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}", self.layer, self.source_id)
    }
}

/// Wheelchair accessibility as tagged in `OpenStreetMap`.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case", ascii_case_insensitive)]
pub enum Wheelchair {
    /// Fully accessible.
    Yes,
    /// Partially accessible.
    Limited,
    /// Not accessible.
    No,
    /// Accessible only with staff assistance.
    Designated,
}

/// Accessibility metadata attached to a POI.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Accessibility {
    /// Wheelchair access, when known.
    pub wheelchair: Option<Wheelchair>,
}

/// A raw POI as produced by an import or sync source.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PoiRecord {
    /// Layer slug.
    pub layer: String,
    /// Source identifier, stable across re-syncs.
    pub source_id: String,
    /// Display name.
    pub name: String,
    /// Location. `None` when the source row had no usable coordinate.
    pub coordinate: Option<Coordinate>,
    /// Street address.
    pub address: Option<String>,
    /// Remaining source attributes.
    pub attributes: BTreeMap<String, String>,
    /// Accessibility metadata.
    pub accessibility: Accessibility,
}

impl PoiRecord {
    #[must_use]
    pub fn key(&self) -> SourceKey {
        SourceKey::new(self.layer.clone(), self.source_id.clone())
    }
}

/// A validated POI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Poi {
    /// Layer slug.
    pub layer: String,
    /// Source identifier, stable across re-syncs.
    pub source_id: String,
    /// Display name.
    pub name: String,
    /// Validated location.
    pub coordinate: Coordinate,
    /// Street address.
    pub address: Option<String>,
    /// Remaining source attributes.
    pub attributes: BTreeMap<String, String>,
    /// Accessibility metadata.
    pub accessibility: Accessibility,
    /// Containing district id, or `None` when unassigned.
    pub district: Option<String>,
}

impl Poi {
    #[must_use]
    pub fn key(&self) -> SourceKey {
        SourceKey::new(self.layer.clone(), self.source_id.clone())
    }

    /// Returns `true` if the descriptive content (everything except the
    /// district assignment) matches `other`.
    #[must_use]
    pub fn same_content(&self, other: &Self) -> bool {
        self.layer == other.layer
            && self.source_id == other.source_id
            && self.name == other.name
            && self.coordinate == other.coordinate
            && self.address == other.address
            && self.attributes == other.attributes
            && self.accessibility == other.accessibility
    }
}

/// A record excluded from a batch, with the reason.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RejectedRecord {
    /// Layer slug.
    pub layer: String,
    /// Source identifier (or a row/feature position when none was present).
    pub source_id: String,
    /// Human-readable reason.
    pub reason: String,
}

/// What an upsert did.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UpsertOutcome {
    /// New key.
    Inserted,
    /// Existing key, content changed.
    Updated,
    /// Existing key, identical content.
    Unchanged,
}

/// Summary of one import or sync batch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImportReport {
    pub inserted: u64,
    pub updated: u64,
    pub unchanged: u64,
    /// Records excluded because of invalid data.
    pub rejected: Vec<RejectedRecord>,
    /// Keys that appeared more than once in the batch with different
    /// content. The last occurrence was kept.
    pub conflicts: Vec<SourceKey>,
}

impl ImportReport {
    /// Number of records written (inserted, updated, or confirmed unchanged).
    #[must_use]
    pub const fn accepted(&self) -> u64 {
        self.inserted + self.updated + self.unchanged
    }

    pub const fn record(&mut self, outcome: UpsertOutcome) {
        match outcome {
            UpsertOutcome::Inserted => self.inserted += 1,
            UpsertOutcome::Updated => self.updated += 1,
            UpsertOutcome::Unchanged => self.unchanged += 1,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wheelchair_parses_osm_values() {
        assert_eq!("yes".parse::<Wheelchair>().unwrap(), Wheelchair::Yes);
        assert_eq!("Limited".parse::<Wheelchair>().unwrap(), Wheelchair::Limited);
        assert_eq!(Wheelchair::No.as_ref(), "no");
        assert!("sometimes".parse::<Wheelchair>().is_err());
    }

    #[test]
    fn report_counts_outcomes() {
        let mut report = ImportReport::default();
        report.record(UpsertOutcome::Inserted);
        report.record(UpsertOutcome::Inserted);
        report.record(UpsertOutcome::Unchanged);
        assert_eq!(report.inserted, 2);
        assert_eq!(report.accepted(), 3);
    }

    #[test]
    fn source_key_orders_by_layer_then_id() {
        let a = SourceKey::new("parks", "node/2");
        let b = SourceKey::new("schools", "node/1");
        assert!(a < b);
        assert_eq!(a.to_string(), "parks:node/2");
    }
}
