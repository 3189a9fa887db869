//! Coverage gaps and per-layer distribution across districts.

use equity_map_analytics_models::{CoverageRecord, LayerComparison};

use crate::aggregate::Aggregation;

/// Districts with no facility of `layer`, ordered by id.
#[must_use]
pub fn gap_districts(agg: &Aggregation, layer: &str) -> Vec<String> {
    districts_below(agg, layer, 1)
}

/// Districts with fewer than `threshold` facilities of `layer`, ordered
/// by id.
#[must_use]
pub fn districts_below(agg: &Aggregation, layer: &str, threshold: u64) -> Vec<String> {
    agg.districts()
        .iter()
        .filter(|d| d.per_layer.get(layer).copied().unwrap_or(0) < threshold)
        .map(|d| d.id.clone())
        .collect()
}

/// Min, max, mean and spread of `layer` across all districts. All zero
/// when the city has no districts.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn layer_distribution(agg: &Aggregation, layer: &str) -> LayerComparison {
    let counts = agg.layer_counts(layer);
    let min = counts.iter().copied().min().unwrap_or(0);
    let max = counts.iter().copied().max().unwrap_or(0);
    let avg = if counts.is_empty() {
        0.0
    } else {
        counts.iter().sum::<u64>() as f64 / counts.len() as f64
    };

    LayerComparison {
        layer_id: layer.to_string(),
        min,
        max,
        avg,
        spread: max - min,
    }
}

/// One [`LayerComparison`] per layer, in layer order.
#[must_use]
pub fn layer_comparison(agg: &Aggregation) -> Vec<LayerComparison> {
    agg.layers()
        .iter()
        .map(|layer| layer_distribution(agg, layer))
        .collect()
}

/// One [`CoverageRecord`] per layer, in layer order.
#[must_use]
pub fn coverage(agg: &Aggregation) -> Vec<CoverageRecord> {
    agg.layers()
        .iter()
        .map(|layer| CoverageRecord {
            layer_id: layer.clone(),
            gap_district_ids: gap_districts(agg, layer),
        })
        .collect()
}

/// The layer with the greatest spread. Ties go to the earlier layer.
#[must_use]
pub fn most_uneven_layer(comparisons: &[LayerComparison]) -> Option<&LayerComparison> {
    comparisons
        .iter()
        .fold(None, |best: Option<&LayerComparison>, c| match best {
            Some(b) if b.spread >= c.spread => Some(b),
            _ => Some(c),
        })
}
