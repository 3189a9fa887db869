//! Subcommand implementations.

use std::error::Error;
use std::path::Path;

use equity_map_analytics::NoDataError;
use equity_map_analytics::equity::require_scores;
use equity_map_analytics::report::{
    city_report, coverage, district_ranking, layer_comparison, strict_ranking, to_json,
};
use equity_map_analytics_models::RankingOrder;
use equity_map_city::registry::{find_city, load_dir, load_file, select_cities};
use equity_map_city_models::{City, CsvColumns, Layer, LayerSource};
use equity_map_cli_utils::{IndicatifProgress, MultiProgress};
use equity_map_database::cities::{list_cities as stored_cities, require_city, upsert_city};
use equity_map_database::districts::{load_district_index, replace_districts};
use equity_map_database::pois::{PoiWriter, load_pois, save_assignments};
use equity_map_database::snapshot::load_snapshot;
use equity_map_database::{Connection, open_default};
use equity_map_osm::client::OverpassClient;
use equity_map_osm::sync::{osm_filter, sync_layer};
use equity_map_poi::ImportReport;
use equity_map_poi::assign::assign_all;
use equity_map_poi::import::{DEFAULT_BATCH_SIZE, import_records};
use equity_map_poi::{csv_import, geojson_import};
use equity_map_spatial::DistrictBoundary;
use equity_map_spatial::boundary::parse_feature_collection;

use crate::ReportView;

type CommandResult = Result<(), Box<dyn Error>>;

pub fn validate_config(path: &Path) -> CommandResult {
    if !path.is_dir() {
        let city = load_file(path)?;
        println!("OK   {} ({} layers)", city.slug, city.layers.len());
        return Ok(());
    }

    let (cities, failures) = load_dir(path)?;
    for city in &cities {
        println!("OK   {} ({} layers)", city.slug, city.layers.len());
    }
    for (file, e) in &failures {
        println!("FAIL {file}: {e}");
    }

    if failures.is_empty() {
        Ok(())
    } else {
        let total = cities.len() + failures.len();
        Err(format!("{} of {total} city configs are invalid", failures.len()).into())
    }
}

pub fn load_city(slug: &str, config_dir: Option<&Path>) -> CommandResult {
    let city = find_city(config_dir, slug)?.ok_or_else(|| format!("Unknown city: {slug}"))?;
    let conn = open_default()?;
    upsert_city(&conn, &city)?;
    println!("Loaded {} ({}) with {} layers", city.name, city.slug, city.layers.len());
    Ok(())
}

pub fn list_cities() -> CommandResult {
    let conn = open_default()?;
    let cities = stored_cities(&conn)?;

    println!(
        "{:<16} {:<24} {:>6} {:>9} {:>7}  LOADED",
        "SLUG", "NAME", "LAYERS", "DISTRICTS", "POIS"
    );
    println!("{}", "-".repeat(90));
    for city in &cities {
        println!(
            "{:<16} {:<24} {:>6} {:>9} {:>7}  {}",
            city.slug, city.name, city.layers, city.districts, city.pois, city.loaded_at
        );
    }
    Ok(())
}

pub fn import_csv(
    multi: &MultiProgress,
    city: &str,
    layer: &str,
    file: Option<&Path>,
) -> CommandResult {
    let conn = open_default()?;
    let city = require_city(&conn, city)?;
    let layer = find_layer(&city, layer)?;

    let (configured, columns) = match &layer.source {
        Some(LayerSource::Csv { path, columns }) => (Some(Path::new(path)), columns.clone()),
        _ => (None, CsvColumns::default()),
    };
    let path = source_path(layer, file, configured)?;

    log::info!("Importing {} into {}/{}", path.display(), city.slug, layer.slug);
    let records = csv_import::read_records(std::fs::File::open(path)?, &layer.slug, &columns)?;

    let progress =
        IndicatifProgress::records_bar(multi, &format!("{}: {}", city.slug, layer.slug));
    let mut writer = PoiWriter::new(&conn, &city.slug);
    let report = import_records(&mut writer, records, DEFAULT_BATCH_SIZE, &progress)?;
    progress.finish(format!("{}: {} accepted", layer.slug, report.accepted()));

    print_import_report(&layer.slug, &report);
    Ok(())
}

pub fn import_geojson(
    multi: &MultiProgress,
    city: &str,
    layer: &str,
    file: Option<&Path>,
) -> CommandResult {
    let conn = open_default()?;
    let city = require_city(&conn, city)?;
    let layer = find_layer(&city, layer)?;

    let (configured, name_property) = match &layer.source {
        Some(LayerSource::Geojson {
            path,
            name_property,
        }) => (Some(Path::new(path)), name_property.as_str()),
        _ => (None, "name"),
    };
    let path = source_path(layer, file, configured)?;

    log::info!("Importing {} into {}/{}", path.display(), city.slug, layer.slug);
    let text = std::fs::read_to_string(path)?;
    let records = geojson_import::read_records(&text, &layer.slug, name_property)?;

    let progress =
        IndicatifProgress::records_bar(multi, &format!("{}: {}", city.slug, layer.slug));
    progress.set_total(records.len() as u64);
    let mut writer = PoiWriter::new(&conn, &city.slug);
    let report = import_records(&mut writer, records, DEFAULT_BATCH_SIZE, &progress)?;
    progress.finish(format!("{}: {} accepted", layer.slug, report.accepted()));

    print_import_report(&layer.slug, &report);
    Ok(())
}

pub fn import_districts(city: &str, file: &Path, name_property: &str) -> CommandResult {
    let conn = open_default()?;
    let city = require_city(&conn, city)?;

    let text = std::fs::read_to_string(file)?;
    let parsed = parse_feature_collection(&text, name_property)?;
    for (i, e) in &parsed.rejected {
        println!("  skipped feature #{i}: {e}");
    }

    store_districts(&conn, &city, &parsed.districts)
}

#[allow(clippy::future_not_send)]
pub async fn sync_osm(multi: &MultiProgress, city: &str, layer: Option<&str>) -> CommandResult {
    let conn = open_default()?;
    let city = require_city(&conn, city)?;

    let layers: Vec<&Layer> = match layer {
        Some(slug) => vec![find_layer(&city, slug)?],
        None => osm_layers(&city),
    };
    if layers.is_empty() {
        return Err(format!("City '{}' has no OSM layers", city.slug).into());
    }

    let client = OverpassClient::new()?;
    let failed = sync_layers(multi, &conn, &client, &city, &layers).await;

    if failed.is_empty() {
        Ok(())
    } else {
        Err(format!("Failed to sync layers: {}", failed.join(", ")).into())
    }
}

#[allow(clippy::future_not_send)]
pub async fn sync_all(
    multi: &MultiProgress,
    config_dir: Option<&Path>,
    only: Option<&str>,
    skip_load: bool,
) -> CommandResult {
    let configs = select_cities(config_dir, only)?;
    if configs.is_empty() {
        return Err(match only {
            Some(slug) => format!("Unknown city: {slug}"),
            None => "No city configs found".to_string(),
        }
        .into());
    }
    log::info!("Syncing {} cities", configs.len());

    let conn = open_default()?;
    let client = OverpassClient::new()?;
    let mut failed = Vec::new();

    for config in configs {
        let slug = config.slug.clone();
        let loaded = if skip_load {
            require_city(&conn, &slug)
        } else {
            upsert_city(&conn, &config).map(|()| config)
        };
        let city = match loaded {
            Ok(city) => city,
            Err(e) => {
                log::error!("Failed to load {slug}: {e}");
                failed.push(slug);
                continue;
            }
        };

        let layers = osm_layers(&city);
        if layers.is_empty() {
            log::info!("{} has no OSM layers", city.slug);
            continue;
        }
        let failed_layers = sync_layers(multi, &conn, &client, &city, &layers).await;
        if !failed_layers.is_empty() {
            log::error!("Failed to sync {}: {}", city.slug, failed_layers.join(", "));
            failed.push(city.slug.clone());
        }
    }

    if failed.is_empty() {
        Ok(())
    } else {
        Err(format!("Failed to sync cities: {}", failed.join(", ")).into())
    }
}

#[allow(clippy::future_not_send)]
pub async fn sync_districts(city: &str) -> CommandResult {
    let conn = open_default()?;
    let city = require_city(&conn, city)?;

    let client = OverpassClient::new()?;
    let parsed = equity_map_osm::sync::sync_districts(&client, &city).await?;
    for (i, e) in &parsed.rejected {
        println!("  skipped element #{i}: {e}");
    }

    store_districts(&conn, &city, &parsed.districts)
}

pub fn assign(multi: &MultiProgress, city: &str) -> CommandResult {
    let conn = open_default()?;
    let city = require_city(&conn, city)?;

    let index = load_district_index(&conn, &city)?;
    if index.is_empty() {
        return Err(NoDataError::NoDistricts.into());
    }
    let pois = load_pois(&conn, &city.slug)?;

    let progress = IndicatifProgress::assignment_bar(multi, &format!("{}: assigning", city.slug));
    progress.set_total(pois.len() as u64);
    let report = assign_all(&index, pois, &progress);
    save_assignments(&conn, &city.slug, &report.pois)?;

    println!(
        "{}: {} assigned, {} outside every district, {} rejected",
        city.slug,
        report.assigned,
        report.unassigned,
        report.rejected.len()
    );
    for (key, e) in &report.rejected {
        println!("  rejected {key}: {e}");
    }
    Ok(())
}

/// With `strict`, the ranking and full views fail when districts cannot
/// be scored instead of printing `null` scores.
pub fn report(city: &str, view: ReportView, order: RankingOrder, strict: bool) -> CommandResult {
    let conn = open_default()?;
    let snapshot = load_snapshot(&conn, city)?;

    let json = match view {
        ReportView::Ranking if strict => to_json(&strict_ranking(&snapshot, order)?)?,
        ReportView::Ranking => to_json(&district_ranking(&snapshot, order)?)?,
        ReportView::Layers => to_json(&layer_comparison(&snapshot))?,
        ReportView::Coverage => to_json(&coverage(&snapshot))?,
        ReportView::Full => {
            let report = city_report(&snapshot, order)?;
            if strict {
                require_scores(&report.ranking)?;
            }
            to_json(&report)?
        }
    };
    println!("{json}");
    Ok(())
}

fn osm_layers(city: &City) -> Vec<&Layer> {
    city.layers.iter().filter(|l| osm_filter(l).is_ok()).collect()
}

/// Syncs each layer in turn, returning the slugs of layers that failed.
#[allow(clippy::future_not_send)]
async fn sync_layers(
    multi: &MultiProgress,
    conn: &Connection,
    client: &OverpassClient,
    city: &City,
    layers: &[&Layer],
) -> Vec<String> {
    let mut failed = Vec::new();
    for layer in layers {
        let progress =
            IndicatifProgress::records_bar(multi, &format!("{}: {}", city.slug, layer.slug));
        let mut writer = PoiWriter::new(conn, &city.slug);
        match sync_layer(client, city, layer, &mut writer, &progress).await {
            Ok(report) => print_import_report(&layer.slug, &report),
            Err(e) => {
                progress.finish(format!("{}: failed", layer.slug));
                log::error!("Failed to sync {}/{}: {e}", city.slug, layer.slug);
                failed.push(layer.slug.clone());
            }
        }
    }
    failed
}

fn find_layer<'a>(city: &'a City, slug: &str) -> Result<&'a Layer, Box<dyn Error>> {
    city.layer(slug).ok_or_else(|| {
        format!(
            "City '{}' has no layer '{slug}' (layers: {})",
            city.slug,
            city.layer_ids().join(", ")
        )
        .into()
    })
}

/// `--file` wins over the path configured for the layer.
fn source_path<'a>(
    layer: &Layer,
    file: Option<&'a Path>,
    configured: Option<&'a Path>,
) -> Result<&'a Path, Box<dyn Error>> {
    file.or(configured).ok_or_else(|| {
        format!("Layer '{}' has no file configured; pass --file", layer.slug).into()
    })
}

fn store_districts(
    conn: &Connection,
    city: &City,
    districts: &[DistrictBoundary],
) -> CommandResult {
    if districts.is_empty() {
        return Err(NoDataError::NoDistricts.into());
    }
    let count = replace_districts(conn, &city.slug, districts)?;
    println!("{}: stored {count} districts; run assign to refresh POI districts", city.slug);
    Ok(())
}

fn print_import_report(layer: &str, report: &ImportReport) {
    println!(
        "{layer}: {} inserted, {} updated, {} unchanged, {} rejected, {} conflicts",
        report.inserted,
        report.updated,
        report.unchanged,
        report.rejected.len(),
        report.conflicts.len()
    );
    for reject in &report.rejected {
        println!("  rejected {}: {}", reject.source_id, reject.reason);
    }
}
