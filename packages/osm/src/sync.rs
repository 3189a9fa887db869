//! Layer and district sync from `OpenStreetMap`.

use std::sync::Arc;

use equity_map_city_models::{City, Layer, LayerSource};
use equity_map_poi::import::{DEFAULT_BATCH_SIZE, import_records};
use equity_map_poi::progress::ProgressCallback;
use equity_map_poi::{ImportReport, PoiSink};
use equity_map_spatial::boundary::ParsedBoundaries;

use crate::client::OverpassClient;
use crate::query::{DistrictArea, district_query, poi_query};
use crate::{SyncError, boundary, poi};

/// The Overpass tag filter of an OSM layer.
///
/// # Errors
///
/// Returns [`SyncError::NotOsmLayer`] if the layer has another source.
pub fn osm_filter(layer: &Layer) -> Result<&str, SyncError> {
    match &layer.source {
        Some(LayerSource::Osm { query }) => Ok(query),
        _ => Err(SyncError::NotOsmLayer {
            layer: layer.slug.clone(),
        }),
    }
}

/// Fetches the POIs of `layer` within the city bounds and upserts them
/// into `sink`.
///
/// Re-running a sync updates POIs in place by their `node/<id>` or
/// `way/<id>` source id.
///
/// # Errors
///
/// Returns [`SyncError`] if the layer is not an OSM layer, every endpoint
/// fails, or the sink fails.
#[allow(clippy::future_not_send)]
pub async fn sync_layer<S: PoiSink>(
    client: &OverpassClient,
    city: &City,
    layer: &Layer,
    sink: &mut S,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<ImportReport, SyncError> {
    let filter = osm_filter(layer)?;
    log::info!("Syncing layer '{}' of {} from OpenStreetMap", layer.slug, city.slug);

    let response = client.fetch(&poi_query(&city.bounds, filter)).await?;
    let records = poi::to_records(&response.elements, layer);

    progress.set_total(records.len() as u64);
    progress.set_message(format!("{}: {}", city.slug, layer.slug));
    let report = import_records(sink, records, DEFAULT_BATCH_SIZE, progress)?;
    progress.finish(format!(
        "{}: {} accepted, {} rejected",
        layer.slug,
        report.accepted(),
        report.rejected.len()
    ));

    log::info!(
        "Synced layer '{}': {} inserted, {} updated, {} unchanged, {} rejected",
        layer.slug,
        report.inserted,
        report.updated,
        report.unchanged,
        report.rejected.len()
    );
    Ok(report)
}

/// Fetches the administrative districts of `city` and builds their
/// boundaries.
///
/// Districts are searched inside the city's boundary relation when it is
/// known and inside the city bounds otherwise.
///
/// # Errors
///
/// Returns [`SyncError`] if every endpoint fails.
#[allow(clippy::future_not_send)]
pub async fn sync_districts(
    client: &OverpassClient,
    city: &City,
) -> Result<ParsedBoundaries, SyncError> {
    let area = DistrictArea::for_city(&city.slug, city.bounds);
    log::info!("Syncing districts of {} within {area:?}", city.slug);

    let response = client.fetch(&district_query(&area)).await?;
    let parsed = boundary::parse_relations(&response.elements);

    log::info!(
        "Built {} districts for {} ({} skipped)",
        parsed.districts.len(),
        city.slug,
        parsed.rejected.len()
    );
    Ok(parsed)
}
