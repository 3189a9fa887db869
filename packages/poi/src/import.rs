//! Batched, partial-failure import of POI records into a [`PoiSink`].

use std::collections::BTreeMap;
use std::sync::Arc;

use equity_map_poi_models::{ImportReport, Poi, PoiRecord, RejectedRecord, SourceKey};

use crate::progress::ProgressCallback;
use crate::{DuplicateSourceError, PoiError, PoiSink, rejected, validate_record};

/// Default number of records between [`PoiSink::flush`] calls.
pub const DEFAULT_BATCH_SIZE: usize = 500;

/// Validates and upserts every record from `records`.
///
/// Items that are already `Err` (unparseable rows) and records whose
/// coordinate fails validation are added to [`ImportReport::rejected`] and
/// logged; the rest of the stream continues. Records are written one at a
/// time, with [`PoiSink::flush`] after every `batch_size` records and at
/// the end, so work committed before a failure stays committed.
///
/// A key seen twice in the same batch with different content is listed
/// in [`ImportReport::conflicts`]; the later record wins. Only the current
/// batch is held in memory, so a repeat across batches is a plain update.
///
/// # Errors
///
/// Returns [`PoiError::Sink`] if the sink fails. Records written before
/// the failure remain in the sink.
pub fn import_records<S, I>(
    sink: &mut S,
    records: I,
    batch_size: usize,
    progress: &Arc<dyn ProgressCallback>,
) -> Result<ImportReport, PoiError>
where
    S: PoiSink,
    I: IntoIterator<Item = Result<PoiRecord, RejectedRecord>>,
{
    let batch_size = batch_size.max(1);
    let mut report = ImportReport::default();
    let mut seen: BTreeMap<SourceKey, Poi> = BTreeMap::new();
    let mut pending = 0usize;

    for item in records {
        progress.inc(1);

        let record = match item {
            Ok(record) => record,
            Err(reject) => {
                log::warn!(
                    "Rejected {}:{}: {}",
                    reject.layer,
                    reject.source_id,
                    reject.reason
                );
                report.rejected.push(reject);
                continue;
            }
        };

        let layer = record.layer.clone();
        let source_id = record.source_id.clone();
        let poi = match validate_record(record) {
            Ok(poi) => poi,
            Err(e) => {
                log::warn!("Rejected {layer}:{source_id}: {e}");
                report.rejected.push(rejected(&layer, &source_id, e));
                continue;
            }
        };

        let key = poi.key();
        if let Some(previous) = seen.get(&key)
            && !previous.same_content(&poi)
            && !report.conflicts.contains(&key)
        {
            log::warn!(
                "{}; keeping the last one",
                DuplicateSourceError { key: key.clone() }
            );
            report.conflicts.push(key.clone());
        }

        let outcome = sink
            .upsert(&poi)
            .map_err(|e| PoiError::Sink(Box::new(e)))?;
        report.record(outcome);
        seen.insert(key, poi);

        pending += 1;
        if pending >= batch_size {
            sink.flush().map_err(|e| PoiError::Sink(Box::new(e)))?;
            seen.clear();
            pending = 0;
        }
    }

    sink.flush().map_err(|e| PoiError::Sink(Box::new(e)))?;

    log::info!(
        "Import finished: {} inserted, {} updated, {} unchanged, {} rejected",
        report.inserted,
        report.updated,
        report.unchanged,
        report.rejected.len()
    );
    progress.finish(format!(
        "{} accepted, {} rejected",
        report.accepted(),
        report.rejected.len()
    ));

    Ok(report)
}
