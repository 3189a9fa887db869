#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Derived statistics and report views.
//!
//! Nothing in this crate is stored: every value is recomputed from a city
//! snapshot on request. All maps are `BTreeMap`s so that serializing the
//! same report twice yields byte-identical JSON.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Per-district facility counts and equity score.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DistrictStat {
    /// District slug.
    pub district_id: String,
    /// Display name.
    pub name: String,
    /// Facilities of all layers in the district.
    pub total: u64,
    /// Facility count per layer id. Every configured layer is present,
    /// including layers with zero facilities.
    pub per_layer: BTreeMap<String, u64>,
    /// `total / city_average * 100`. `None` when the city has no
    /// facilities at all.
    pub equity_score: Option<f64>,
    /// Whether the score is at or below the underserved threshold.
    pub underserved: bool,
}

/// City-wide summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CityStat {
    /// City slug.
    pub city: String,
    /// POIs assigned to a district.
    pub total_pois: u64,
    /// POIs outside every district.
    pub unassigned_pois: u64,
    /// Unassigned POIs per layer id.
    pub unassigned_per_layer: BTreeMap<String, u64>,
    /// Number of districts.
    pub total_districts: u64,
    /// Average facilities per district.
    pub city_average: f64,
    /// Districts flagged as underserved.
    pub underserved_count: u64,
}

/// Distribution of one layer's counts across districts.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerComparison {
    /// Layer slug.
    pub layer_id: String,
    /// Smallest district count.
    pub min: u64,
    /// Largest district count.
    pub max: u64,
    /// Mean district count.
    pub avg: f64,
    /// `max - min`.
    pub spread: u64,
}

/// Districts without any facility of one layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CoverageRecord {
    /// Layer slug.
    pub layer_id: String,
    /// Gap districts, ordered by id.
    pub gap_district_ids: Vec<String>,
}

/// Sort order for the district ranking.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum RankingOrder {
    /// Worst-served first. Districts without a score sort last.
    #[default]
    #[strum(serialize = "score", serialize = "score_ascending")]
    ScoreAscending,
    /// Most facilities first.
    #[strum(serialize = "total", serialize = "total_descending")]
    TotalDescending,
}

/// All views of one city in a single document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CityReport {
    /// City-wide summary.
    pub city: CityStat,
    /// District ranking in the requested order.
    pub ranking: Vec<DistrictStat>,
    /// One record per layer, in layer order.
    pub layers: Vec<LayerComparison>,
    /// One record per layer, in layer order.
    pub coverage: Vec<CoverageRecord>,
    /// Layer with the greatest spread, if any layer exists.
    pub most_uneven_layer: Option<String>,
}
