//! Bundled and on-disk city configs.
//!
//! Bundled cities are `(name, toml_content)` pairs embedded via
//! `include_str!`. Adding a bundled city requires a TOML file in `cities/`
//! and an entry here.

use std::path::Path;

use equity_map_city_models::City;

use crate::CityError;
use crate::config::parse_city;

/// Number of bundled cities. Enforced by a test.
#[cfg(test)]
const EXPECTED_CITY_COUNT: usize = 2;

const CITY_TOMLS: &[(&str, &str)] = &[
    ("darmstadt", include_str!("../cities/darmstadt.toml")),
    ("mannheim", include_str!("../cities/mannheim.toml")),
];

/// Returns all bundled cities.
///
/// # Panics
///
/// Panics if an embedded TOML file fails to parse or validate. These are
/// compile-time constants, so a failure is a development error caught by
/// the tests below.
#[must_use]
pub fn bundled_cities() -> Vec<City> {
    CITY_TOMLS
        .iter()
        .map(|(name, toml_str)| {
            parse_city(toml_str)
                .unwrap_or_else(|e| panic!("Failed to parse bundled city '{name}': {e}"))
        })
        .collect()
}

/// Loads a single city config file.
///
/// # Errors
///
/// Returns [`CityError`] if the file cannot be read, parsed, or validated.
pub fn load_file(path: &Path) -> Result<City, CityError> {
    let text = std::fs::read_to_string(path)?;
    let city = parse_city(&text)?;
    log::debug!("Loaded city '{}' from {}", city.slug, path.display());
    Ok(city)
}

/// Loads every `*.toml` file in `dir`, sorted by file name.
///
/// Files whose name starts with `_` are templates and skipped. One
/// malformed file does not prevent the others from loading; failures are
/// returned alongside the loaded cities.
///
/// # Errors
///
/// Returns [`CityError::Io`] if the directory itself cannot be read.
pub fn load_dir(dir: &Path) -> Result<(Vec<City>, Vec<(String, CityError)>), CityError> {
    let mut paths = Vec::new();
    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        let is_toml = path.extension().is_some_and(|ext| ext == "toml");
        let is_template = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.starts_with('_'));
        if is_toml && !is_template {
            paths.push(path);
        }
    }
    paths.sort();

    let mut cities = Vec::with_capacity(paths.len());
    let mut failures = Vec::new();
    for path in paths {
        match load_file(&path) {
            Ok(city) => cities.push(city),
            Err(e) => {
                log::warn!("Skipping city config {}: {e}", path.display());
                failures.push((path.display().to_string(), e));
            }
        }
    }

    log::info!("Loaded {} city configs from {}", cities.len(), dir.display());
    Ok((cities, failures))
}

/// Finds a city by slug, checking `dir` first (when given) and then the
/// bundled configs.
///
/// # Errors
///
/// Returns [`CityError::Io`] if `dir` cannot be read.
pub fn find_city(dir: Option<&Path>, slug: &str) -> Result<Option<City>, CityError> {
    if let Some(dir) = dir {
        let (cities, _) = load_dir(dir)?;
        if let Some(city) = cities.into_iter().find(|c| c.slug == slug) {
            return Ok(Some(city));
        }
    }
    Ok(bundled_cities().into_iter().find(|c| c.slug == slug))
}

/// Cities for a bulk run: every config in `dir`, or the bundled configs
/// when no directory is given, narrowed to `only` when set.
///
/// Configs that fail to load are logged by [`load_dir`] and left out.
///
/// # Errors
///
/// Returns [`CityError::Io`] if `dir` cannot be read.
pub fn select_cities(dir: Option<&Path>, only: Option<&str>) -> Result<Vec<City>, CityError> {
    let mut cities = match dir {
        Some(dir) => load_dir(dir)?.0,
        None => bundled_cities(),
    };
    cities.retain(|c| only.is_none_or(|slug| c.slug == slug));
    cities.sort_by(|a, b| a.slug.cmp(&b.slug));
    Ok(cities)
}
