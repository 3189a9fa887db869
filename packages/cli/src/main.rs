#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the civic facility equity map.
//!
//! Typical flow for a city: `load-city`, then `sync-districts` or
//! `import-districts`, then `sync-osm` and file imports for the layers,
//! then `assign`, then `report`. The database location comes from
//! `EQUITY_MAP_DB`.

mod commands;

use std::path::PathBuf;

use clap::{Parser, Subcommand, ValueEnum};
use equity_map_analytics_models::RankingOrder;

#[derive(Parser)]
#[command(name = "equity_map", about = "Civic facility equity map toolchain")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Parse and validate city config files without touching the database
    ValidateConfig {
        /// A city TOML file or a directory of them
        path: PathBuf,
    },
    /// Load a city and its layers into the database
    LoadCity {
        /// City slug (e.g., "mannheim")
        city: String,
        /// Directory with city TOML files, checked before the bundled configs
        #[arg(long)]
        config_dir: Option<PathBuf>,
    },
    /// List loaded cities with layer, district and POI counts
    ListCities,
    /// Import POIs of a layer from a CSV file
    ImportCsv {
        city: String,
        layer: String,
        /// CSV file; defaults to the path configured for the layer
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Import POIs of a layer from a `GeoJSON` point `FeatureCollection`
    ImportGeojson {
        city: String,
        layer: String,
        /// `GeoJSON` file; defaults to the path configured for the layer
        #[arg(long)]
        file: Option<PathBuf>,
    },
    /// Replace the districts of a city with polygons from a `GeoJSON` file
    ImportDistricts {
        city: String,
        file: PathBuf,
        /// Feature property holding the district name
        #[arg(long, default_value = "name")]
        name_property: String,
    },
    /// Sync OSM layers of a city from the Overpass API
    SyncOsm {
        city: String,
        /// Only sync this layer; defaults to every OSM layer of the city
        #[arg(long)]
        layer: Option<String>,
    },
    /// Load every city config and sync all of their OSM layers
    SyncAll {
        /// Directory with city TOML files; defaults to the bundled configs
        #[arg(long)]
        config_dir: Option<PathBuf>,
        /// Only sync this city
        #[arg(long, short)]
        city: Option<String>,
        /// Sync cities already in the database without reloading their configs
        #[arg(long)]
        skip_load: bool,
    },
    /// Replace the districts of a city with OSM administrative boundaries
    SyncDistricts { city: String },
    /// Assign every POI of a city to the district containing it
    Assign { city: String },
    /// Print a report view as JSON
    Report {
        city: String,
        #[arg(value_enum, default_value = "full")]
        view: ReportView,
        /// Ranking order: `score` (lowest equity score first) or `total`
        #[arg(long, default_value = "score")]
        order: RankingOrder,
        /// Fail instead of printing `null` scores when a city has no facilities
        #[arg(long)]
        strict: bool,
    },
}

/// Which report view to print.
#[derive(Clone, Copy, ValueEnum)]
enum ReportView {
    /// Districts with equity scores
    Ranking,
    /// Per-layer distribution across districts
    Layers,
    /// Districts without any facility, per layer
    Coverage,
    /// City summary plus all views
    Full,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let multi = equity_map_cli_utils::init_logger();
    let cli = Cli::parse();

    match cli.command {
        Commands::ValidateConfig { path } => commands::validate_config(&path)?,
        Commands::LoadCity { city, config_dir } => {
            commands::load_city(&city, config_dir.as_deref())?;
        }
        Commands::ListCities => commands::list_cities()?,
        Commands::ImportCsv { city, layer, file } => {
            commands::import_csv(&multi, &city, &layer, file.as_deref())?;
        }
        Commands::ImportGeojson { city, layer, file } => {
            commands::import_geojson(&multi, &city, &layer, file.as_deref())?;
        }
        Commands::ImportDistricts {
            city,
            file,
            name_property,
        } => commands::import_districts(&city, &file, &name_property)?,
        Commands::SyncOsm { city, layer } => {
            commands::sync_osm(&multi, &city, layer.as_deref()).await?;
        }
        Commands::SyncAll {
            config_dir,
            city,
            skip_load,
        } => {
            commands::sync_all(&multi, config_dir.as_deref(), city.as_deref(), skip_load).await?;
        }
        Commands::SyncDistricts { city } => commands::sync_districts(&city).await?,
        Commands::Assign { city } => commands::assign(&multi, &city)?,
        Commands::Report {
            city,
            view,
            order,
            strict,
        } => commands::report(&city, view, order, strict)?,
    }

    Ok(())
}
