#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Facility equity analytics.
//!
//! Pure, synchronous functions over an immutable [`report::CitySnapshot`]:
//! [`aggregate`] counts POIs per (district, layer), [`equity`] turns the
//! counts into scores relative to the city average, [`coverage`] finds gap
//! districts and per-layer distributions, and [`report`] composes the
//! views the CLI prints. Nothing is cached; every call recomputes.

pub mod aggregate;
pub mod coverage;
pub mod equity;
pub mod report;

use thiserror::Error;

/// A statistic cannot be computed from the available data.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
pub enum NoDataError {
    /// The city has no districts, so there is nothing to average over.
    #[error("city has no districts")]
    NoDistricts,

    /// The city has districts but no assigned facilities, so scores are
    /// undefined.
    #[error("city has no assigned facilities")]
    NoFacilities,
}

/// Errors that can occur during analytics operations.
#[derive(Debug, Error)]
pub enum AnalyticsError {
    /// Not enough data for the requested view.
    #[error(transparent)]
    NoData(#[from] NoDataError),

    /// Serializing a view failed.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
