//! Read-only report views over a city snapshot.

use std::cmp::Ordering;

use equity_map_analytics_models::{
    CityReport, CoverageRecord, DistrictStat, LayerComparison, RankingOrder,
};
use equity_map_city_models::{City, DistrictRecord};
use equity_map_poi_models::Poi;
use serde::Serialize;

use crate::AnalyticsError;
use crate::aggregate::{Aggregation, aggregate};
use crate::{coverage, equity};

/// Immutable state of one city at a point in time.
///
/// POIs carry their district assignment; every view is derived from this
/// and nothing else.
#[derive(Debug, Clone)]
pub struct CitySnapshot {
    /// City configuration, including the layer order.
    pub city: City,
    /// Districts of the city.
    pub districts: Vec<DistrictRecord>,
    /// Every POI of the city, assigned or not.
    pub pois: Vec<Poi>,
}

impl CitySnapshot {
    /// Counts POIs per district and layer.
    #[must_use]
    pub fn aggregate(&self) -> Aggregation {
        aggregate(&self.districts, &self.city.layer_ids(), &self.pois)
    }
}

/// Districts with their equity scores, in `order`.
///
/// # Errors
///
/// Returns [`AnalyticsError::NoData`] if the city has no districts.
pub fn district_ranking(
    snapshot: &CitySnapshot,
    order: RankingOrder,
) -> Result<Vec<DistrictStat>, AnalyticsError> {
    let mut stats = equity::district_stats(&snapshot.aggregate())?;
    sort_ranking(&mut stats, order);
    Ok(stats)
}

/// Like [`district_ranking`], but fails instead of returning districts
/// without a score.
///
/// # Errors
///
/// Returns [`AnalyticsError::NoData`] if the city has no districts or no
/// facilities in any configured layer.
pub fn strict_ranking(
    snapshot: &CitySnapshot,
    order: RankingOrder,
) -> Result<Vec<DistrictStat>, AnalyticsError> {
    let stats = district_ranking(snapshot, order)?;
    equity::require_scores(&stats)?;
    Ok(stats)
}

/// Per-layer distribution across districts, in layer order.
#[must_use]
pub fn layer_comparison(snapshot: &CitySnapshot) -> Vec<LayerComparison> {
    coverage::layer_comparison(&snapshot.aggregate())
}

/// Gap districts per layer, in layer order.
#[must_use]
pub fn coverage(snapshot: &CitySnapshot) -> Vec<CoverageRecord> {
    coverage::coverage(&snapshot.aggregate())
}

/// City summary plus all three views.
///
/// # Errors
///
/// Returns [`AnalyticsError::NoData`] if the city has no districts.
pub fn city_report(
    snapshot: &CitySnapshot,
    order: RankingOrder,
) -> Result<CityReport, AnalyticsError> {
    let agg = snapshot.aggregate();

    let city = equity::city_stat(&snapshot.city.slug, &agg)?;
    let mut ranking = equity::district_stats(&agg)?;
    sort_ranking(&mut ranking, order);
    let layers = coverage::layer_comparison(&agg);
    let most_uneven_layer = coverage::most_uneven_layer(&layers).map(|l| l.layer_id.clone());

    log::info!(
        "{}: {} districts, average {:.2}, {} underserved",
        city.city,
        city.total_districts,
        city.city_average,
        city.underserved_count
    );

    Ok(CityReport {
        city,
        ranking,
        coverage: coverage::coverage(&agg),
        layers,
        most_uneven_layer,
    })
}

/// Serializes a view as pretty-printed JSON.
///
/// # Errors
///
/// Returns [`AnalyticsError::Serialization`] if serialization fails.
pub fn to_json<T: Serialize>(view: &T) -> Result<String, AnalyticsError> {
    Ok(serde_json::to_string_pretty(view)?)
}

fn sort_ranking(stats: &mut [DistrictStat], order: RankingOrder) {
    stats.sort_by(|a, b| {
        let cmp = match order {
            RankingOrder::ScoreAscending => match (a.equity_score, b.equity_score) {
                (Some(a_score), Some(b_score)) => {
                    a_score.partial_cmp(&b_score).unwrap_or(Ordering::Equal)
                }
                // Scored districts sort before unscored ones
                (Some(_), None) => Ordering::Less,
                (None, Some(_)) => Ordering::Greater,
                (None, None) => Ordering::Equal,
            },
            RankingOrder::TotalDescending => b.total.cmp(&a.total),
        };
        cmp.then_with(|| a.district_id.cmp(&b.district_id))
    });
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::NoDataError;
    use crate::aggregate::tests::{district, pois};
    use equity_map_city_models::{BoundingBox, Coordinate, Layer};

    fn layer(slug: &str) -> Layer {
        Layer {
            slug: slug.to_string(),
            name: slug.to_string(),
            name_de: None,
            icon: "map-marker".to_string(),
            color: "#3388ff".to_string(),
            visible_by_default: true,
            source: None,
        }
    }

    fn city() -> City {
        City {
            slug: "mannheim".to_string(),
            name: "Mannheim".to_string(),
            state: None,
            center: Coordinate::new(49.4875, 8.466),
            zoom: 12,
            bounds: BoundingBox::new(49.4, 8.4, 49.6, 8.6),
            primary_color: "#0066CC".to_string(),
            layers: vec![layer("playgrounds"), layer("schools")],
        }
    }

    fn snapshot() -> CitySnapshot {
        let mut all = pois("playgrounds", Some("neckarstadt"), 6);
        all.extend(pois("playgrounds", Some("lindenhof"), 2));
        all.extend(pois("schools", Some("lindenhof"), 2));
        all.extend(pois("schools", Some("almenhof"), 2));
        all.extend(pois("schools", None, 1));
        CitySnapshot {
            city: city(),
            districts: vec![
                district("neckarstadt"),
                district("lindenhof"),
                district("almenhof"),
                district("feudenheim"),
            ],
            pois: all,
        }
    }

    fn ids(stats: &[DistrictStat]) -> Vec<&str> {
        stats.iter().map(|s| s.district_id.as_str()).collect()
    }

    #[test]
    fn ranking_by_score_puts_worst_first() {
        let ranking = district_ranking(&snapshot(), RankingOrder::ScoreAscending).unwrap();
        assert_eq!(ids(&ranking), vec!["feudenheim", "almenhof", "lindenhof", "neckarstadt"]);
    }

    #[test]
    fn ranking_by_total_breaks_ties_by_id() {
        let ranking = district_ranking(&snapshot(), RankingOrder::TotalDescending).unwrap();
        assert_eq!(ids(&ranking), vec!["neckarstadt", "lindenhof", "almenhof", "feudenheim"]);
    }

    #[test]
    fn unscored_districts_rank_last_by_id() {
        let mut snap = snapshot();
        snap.pois.clear();
        let ranking = district_ranking(&snap, RankingOrder::ScoreAscending).unwrap();
        assert_eq!(ids(&ranking), vec!["almenhof", "feudenheim", "lindenhof", "neckarstadt"]);
    }

    #[test]
    fn strict_ranking_needs_facilities() {
        let ranking = strict_ranking(&snapshot(), RankingOrder::ScoreAscending).unwrap();
        assert_eq!(ranking.len(), 4);

        let mut snap = snapshot();
        snap.pois.clear();
        assert!(matches!(
            strict_ranking(&snap, RankingOrder::ScoreAscending),
            Err(AnalyticsError::NoData(NoDataError::NoFacilities))
        ));
    }

    #[test]
    fn full_report_bundles_every_view() {
        let report = city_report(&snapshot(), RankingOrder::ScoreAscending).unwrap();

        assert_eq!(report.city.total_pois, 12);
        assert_eq!(report.city.unassigned_pois, 1);
        assert!((report.city.city_average - 3.0).abs() < f64::EPSILON);
        assert_eq!(report.layers.len(), 2);
        assert_eq!(report.coverage[0].gap_district_ids, vec!["almenhof", "feudenheim"]);
        assert_eq!(report.coverage[1].gap_district_ids, vec!["feudenheim", "neckarstadt"]);
        assert_eq!(report.most_uneven_layer.as_deref(), Some("playgrounds"));
    }

    #[test]
    fn serialization_is_byte_identical_across_runs() {
        let snap = snapshot();
        let first = to_json(&city_report(&snap, RankingOrder::ScoreAscending).unwrap()).unwrap();
        let second = to_json(&city_report(&snap, RankingOrder::ScoreAscending).unwrap()).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn zero_districts_is_no_data_but_views_are_empty() {
        let mut snap = snapshot();
        snap.districts.clear();

        assert!(matches!(
            district_ranking(&snap, RankingOrder::ScoreAscending),
            Err(AnalyticsError::NoData(NoDataError::NoDistricts))
        ));
        assert!(coverage(&snap).iter().all(|c| c.gap_district_ids.is_empty()));
        assert!(layer_comparison(&snap).iter().all(|l| l.max == 0));
    }
}
