//! Database file location.

use std::path::{Path, PathBuf};

/// Environment variable overriding the database path.
pub const DB_PATH_ENV: &str = "EQUITY_MAP_DB";

/// Default database path, relative to the working directory.
pub const DEFAULT_DB_PATH: &str = "data/equity_map.duckdb";

/// Returns `$EQUITY_MAP_DB` if set and non-empty, else
/// [`DEFAULT_DB_PATH`].
#[must_use]
pub fn db_path() -> PathBuf {
    std::env::var_os(DB_PATH_ENV)
        .filter(|v| !v.is_empty())
        .map_or_else(|| PathBuf::from(DEFAULT_DB_PATH), PathBuf::from)
}

/// Ensures a directory exists, creating it if necessary.
///
/// # Errors
///
/// Returns an I/O error if the directory cannot be created.
pub fn ensure_dir(path: &Path) -> std::io::Result<()> {
    if !path.as_os_str().is_empty() && !path.exists() {
        std::fs::create_dir_all(path)?;
    }
    Ok(())
}
