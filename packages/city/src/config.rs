//! TOML schema for a city config file and conversion into [`City`].
//!
//! ```toml
//! [city]
//! slug = "mannheim"
//! name = "Mannheim"
//! center = [49.4875, 8.4660]
//! bounds = [[49.41, 8.41], [49.59, 8.59]]
//!
//! [[layers]]
//! slug = "playgrounds"
//! name = "Playgrounds"
//! source = { type = "osm", query = '"leisure"="playground"' }
//! ```

use std::collections::BTreeSet;

use equity_map_city_models::{BoundingBox, City, Coordinate, Layer, LayerSource};
use serde::Deserialize;

use crate::{CityError, ConfigurationError};

/// Half-width in degrees of the box used when a config has no `bounds`.
pub const DEFAULT_BOUNDS_EXTENT: f64 = 0.1;

const DEFAULT_CENTER: [f64; 2] = [49.4875, 8.4660];
const DEFAULT_ZOOM: u8 = 12;
const DEFAULT_PRIMARY_COLOR: &str = "#0066CC";
const DEFAULT_LAYER_ICON: &str = "map-marker";
const DEFAULT_LAYER_COLOR: &str = "#3388ff";

/// Root of a city config file.
#[derive(Debug, Clone, Deserialize)]
pub struct CityConfig {
    pub city: CitySection,
    #[serde(default)]
    pub theme: ThemeSection,
    #[serde(default)]
    pub layers: Vec<LayerSection>,
}

/// The `[city]` table.
#[derive(Debug, Clone, Deserialize)]
pub struct CitySection {
    #[serde(default)]
    pub slug: String,
    pub name: Option<String>,
    pub state: Option<String>,
    /// `[lat, lng]`.
    pub center: Option<[f64; 2]>,
    pub zoom: Option<u8>,
    /// `[[south, west], [north, east]]`.
    pub bounds: Option<[[f64; 2]; 2]>,
}

/// The `[theme]` table.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ThemeSection {
    pub primary_color: Option<String>,
}

/// One `[[layers]]` entry.
#[derive(Debug, Clone, Deserialize)]
pub struct LayerSection {
    #[serde(default)]
    pub slug: String,
    pub name: Option<String>,
    pub name_de: Option<String>,
    pub icon: Option<String>,
    pub color: Option<String>,
    pub visible: Option<bool>,
    pub source: Option<LayerSource>,
}

/// Parses and validates a city config from TOML text.
///
/// # Errors
///
/// Returns [`CityError::Toml`] if the text is not valid TOML for the
/// schema, or [`CityError::Configuration`] if validation fails.
pub fn parse_city(toml_str: &str) -> Result<City, CityError> {
    let config: CityConfig = toml::from_str(toml_str)?;
    Ok(config.into_city()?)
}

impl CityConfig {
    /// Validates the config and converts it into a [`City`].
    ///
    /// # Errors
    ///
    /// Returns [`ConfigurationError`] for an empty slug, out-of-range
    /// center, inverted bounds, empty or duplicate layer slugs, or a layer
    /// source with an empty query/path.
    pub fn into_city(self) -> Result<City, ConfigurationError> {
        let slug = self.city.slug.trim().to_string();
        if slug.is_empty() {
            return Err(ConfigurationError::MissingSlug);
        }

        let [lat, lng] = self.city.center.unwrap_or(DEFAULT_CENTER);
        let center = Coordinate::new(lat, lng);
        if !center.is_valid() {
            return Err(ConfigurationError::InvalidCenter { city: slug });
        }

        let bounds = match self.city.bounds {
            Some([[south, west], [north, east]]) => BoundingBox::new(south, west, north, east),
            None => BoundingBox::around(center, DEFAULT_BOUNDS_EXTENT),
        };
        if !bounds.is_valid() {
            return Err(ConfigurationError::InvalidBounds { city: slug });
        }

        let mut seen = BTreeSet::new();
        let mut layers = Vec::with_capacity(self.layers.len());
        for section in self.layers {
            let layer_slug = section.slug.trim().to_string();
            if layer_slug.is_empty() {
                return Err(ConfigurationError::EmptyLayerSlug { city: slug });
            }
            if !seen.insert(layer_slug.clone()) {
                return Err(ConfigurationError::DuplicateLayer {
                    city: slug,
                    layer: layer_slug,
                });
            }
            if let Some(source) = &section.source {
                validate_source(&slug, &layer_slug, source)?;
            }

            layers.push(Layer {
                name: section.name.unwrap_or_else(|| title_case(&layer_slug)),
                name_de: section.name_de,
                icon: section
                    .icon
                    .unwrap_or_else(|| DEFAULT_LAYER_ICON.to_string()),
                color: section
                    .color
                    .unwrap_or_else(|| DEFAULT_LAYER_COLOR.to_string()),
                visible_by_default: section.visible.unwrap_or(true),
                source: section.source,
                slug: layer_slug,
            });
        }

        Ok(City {
            name: self.city.name.unwrap_or_else(|| title_case(&slug)),
            state: self.city.state,
            center,
            zoom: self.city.zoom.unwrap_or(DEFAULT_ZOOM),
            bounds,
            primary_color: self
                .theme
                .primary_color
                .unwrap_or_else(|| DEFAULT_PRIMARY_COLOR.to_string()),
            layers,
            slug,
        })
    }
}

fn validate_source(
    city: &str,
    layer: &str,
    source: &LayerSource,
) -> Result<(), ConfigurationError> {
    let message = match source {
        LayerSource::Osm { query } if query.trim().is_empty() => "empty OSM query",
        LayerSource::Csv { path, .. } | LayerSource::Geojson { path, .. }
            if path.trim().is_empty() =>
        {
            "empty file path"
        }
        _ => return Ok(()),
    };
    Err(ConfigurationError::InvalidSource {
        city: city.to_string(),
        layer: layer.to_string(),
        message: message.to_string(),
    })
}

/// `"drinking-water"` -> `"Drinking-water"`.
fn title_case(slug: &str) -> String {
    let mut chars = slug.chars();
    chars.next().map_or_else(String::new, |first| {
        first.to_uppercase().chain(chars).collect()
    })
}
