#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! City configuration loading and validation.
//!
//! Each city is described by one TOML file: map settings, theme, and an
//! ordered list of layers with their data source. Bundled cities are
//! embedded at compile time (see [`registry`]); additional cities can be
//! loaded from a directory at runtime.

pub mod config;
pub mod registry;

use thiserror::Error;

/// A city or layer definition that cannot be used.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfigurationError {
    /// The city has no slug.
    #[error("City config must include city.slug")]
    MissingSlug,

    /// A layer has an empty slug.
    #[error("City '{city}' has a layer without a slug")]
    EmptyLayerSlug {
        /// City slug.
        city: String,
    },

    /// Two layers share a slug.
    #[error("City '{city}' defines layer '{layer}' more than once")]
    DuplicateLayer {
        /// City slug.
        city: String,
        /// Repeated layer slug.
        layer: String,
    },

    /// Center coordinate is out of range.
    #[error("City '{city}' has an invalid center coordinate")]
    InvalidCenter {
        /// City slug.
        city: String,
    },

    /// Bounding box is degenerate or inverted.
    #[error("City '{city}' has invalid bounds (south/west must be less than north/east)")]
    InvalidBounds {
        /// City slug.
        city: String,
    },

    /// A layer source is missing required data.
    #[error("Layer '{layer}' in city '{city}' has an invalid source: {message}")]
    InvalidSource {
        /// City slug.
        city: String,
        /// Layer slug.
        layer: String,
        /// What is wrong with the source.
        message: String,
    },
}

/// Errors that can occur while loading city configs.
#[derive(Debug, Error)]
pub enum CityError {
    /// Reading a config file failed.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The TOML could not be parsed.
    #[error("TOML error: {0}")]
    Toml(#[from] toml::de::Error),

    /// The config parsed but is not usable.
    #[error("Configuration error: {0}")]
    Configuration(#[from] ConfigurationError),
}
