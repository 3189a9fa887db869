#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! `OpenStreetMap` sync through the Overpass API.
//!
//! [`query`] builds Overpass QL for POI layers and district relations,
//! [`client::OverpassClient`] sends it with retry and endpoint fallback,
//! [`element`] models the JSON response, [`poi`] turns elements into
//! [`PoiRecord`](equity_map_poi_models::PoiRecord)s, and [`boundary`]
//! assembles district polygons from relation members.

pub mod boundary;
pub mod client;
pub mod element;
pub mod poi;
pub mod query;
pub mod retry;
pub mod sync;

use equity_map_poi::PoiError;
use equity_map_spatial::GeometryError;
use thiserror::Error;

/// Public Overpass API endpoints, tried in order.
pub const OVERPASS_ENDPOINTS: &[&str] = &[
    "https://overpass.kumi.systems/api/interpreter",
    "https://overpass-api.de/api/interpreter",
];

/// Errors that can occur during an Overpass sync.
#[derive(Debug, Error)]
pub enum SyncError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The server answered with an error status.
    #[error("Overpass error: {message}")]
    Status {
        /// Description of what went wrong.
        message: String,
    },

    /// The response was not valid Overpass JSON.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Every configured endpoint failed.
    #[error("All Overpass endpoints failed: {}", .errors.join("; "))]
    AllEndpointsFailed {
        /// One message per endpoint.
        errors: Vec<String>,
    },

    /// The layer has no `OpenStreetMap` source.
    #[error("Layer '{layer}' is not an OSM layer")]
    NotOsmLayer {
        /// Layer slug.
        layer: String,
    },

    /// Writing the synced POIs failed.
    #[error(transparent)]
    Poi(#[from] PoiError),

    /// Boundary geometry could not be built.
    #[error(transparent)]
    Geometry(#[from] GeometryError),
}
