//! Batch district assignment.

use std::sync::Arc;

use equity_map_poi_models::{Poi, SourceKey};
use equity_map_spatial::{DistrictIndex, GeometryError};

use crate::progress::ProgressCallback;

/// Outcome of assigning a batch of POIs.
#[derive(Debug, Default)]
pub struct AssignmentReport {
    /// Every POI that had a usable coordinate, with `district` set (or
    /// cleared when no district contains it). Input order is preserved.
    pub pois: Vec<Poi>,
    /// POIs whose coordinate failed validation. They are not in `pois`.
    pub rejected: Vec<(SourceKey, GeometryError)>,
    /// Number of POIs resolved to a district.
    pub assigned: usize,
    /// Number of POIs outside every district.
    pub unassigned: usize,
}

/// Resolves every POI to a district, replacing any previous assignment.
///
/// A POI whose coordinate is invalid is reported in
/// [`AssignmentReport::rejected`] and logged; it never aborts the batch.
#[must_use]
pub fn assign_all<I>(
    index: &DistrictIndex,
    pois: I,
    progress: &Arc<dyn ProgressCallback>,
) -> AssignmentReport
where
    I: IntoIterator<Item = Poi>,
{
    let mut report = AssignmentReport::default();

    for mut poi in pois {
        progress.inc(1);
        match index.assign(Some(poi.coordinate)) {
            Ok(district) => {
                log::debug!("{} -> {}", poi.key(), district.as_deref().unwrap_or("-"));
                if district.is_some() {
                    report.assigned += 1;
                } else {
                    report.unassigned += 1;
                }
                poi.district = district;
                report.pois.push(poi);
            }
            Err(e) => {
                log::warn!("Skipping {}: {e}", poi.key());
                report.rejected.push((poi.key(), e));
            }
        }
    }

    log::info!(
        "Assigned {} POIs to {} districts ({} unassigned, {} rejected)",
        report.assigned,
        index.len(),
        report.unassigned,
        report.rejected.len()
    );
    progress.finish(format!(
        "{} assigned, {} unassigned",
        report.assigned, report.unassigned
    ));

    report
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::progress::null_progress;
    use equity_map_city_models::Coordinate;
    use equity_map_poi_models::Accessibility;
    use equity_map_spatial::DistrictBoundary;
    use geo::{MultiPolygon, polygon};

    fn square(id: &str, x0: f64, y0: f64) -> DistrictBoundary {
        let p = polygon![
            (x: x0, y: y0),
            (x: x0 + 1.0, y: y0),
            (x: x0 + 1.0, y: y0 + 1.0),
            (x: x0, y: y0 + 1.0),
            (x: x0, y: y0),
        ];
        DistrictBoundary::new(id, id, MultiPolygon(vec![p]))
    }

    fn poi(id: &str, lat: f64, lng: f64) -> Poi {
        Poi {
            layer: "schools".to_string(),
            source_id: id.to_string(),
            name: id.to_string(),
            coordinate: Coordinate::new(lat, lng),
            address: None,
            attributes: BTreeMap::new(),
            accessibility: Accessibility::default(),
            district: Some("stale".to_string()),
        }
    }

    fn index() -> DistrictIndex {
        DistrictIndex::new(vec![square("west", 0.0, 0.0), square("east", 1.0, 0.0)], None).unwrap()
    }

    #[test]
    fn assigns_and_clears_stale_districts() {
        let pois = vec![poi("a", 0.5, 0.5), poi("b", 0.5, 1.5), poi("c", 5.0, 5.0)];
        let report = assign_all(&index(), pois, &null_progress());

        let districts: Vec<Option<&str>> =
            report.pois.iter().map(|p| p.district.as_deref()).collect();
        assert_eq!(districts, vec![Some("west"), Some("east"), None]);
        assert_eq!(report.assigned, 2);
        assert_eq!(report.unassigned, 1);
    }

    #[test]
    fn result_does_not_depend_on_input_order() {
        let pois = vec![poi("a", 0.5, 0.5), poi("b", 0.5, 1.5), poi("c", 0.2, 1.9)];
        let mut reversed = pois.clone();
        reversed.reverse();

        let collect = |report: AssignmentReport| {
            let mut v: Vec<(String, Option<String>)> = report
                .pois
                .into_iter()
                .map(|p| (p.source_id, p.district))
                .collect();
            v.sort();
            v
        };

        assert_eq!(
            collect(assign_all(&index(), pois, &null_progress())),
            collect(assign_all(&index(), reversed, &null_progress()))
        );
    }

    #[test]
    fn invalid_coordinate_is_rejected_without_aborting() {
        let pois = vec![poi("bad", f64::NAN, 0.5), poi("good", 0.5, 0.5)];
        let report = assign_all(&index(), pois, &null_progress());

        assert_eq!(report.pois.len(), 1);
        assert_eq!(report.rejected.len(), 1);
        assert_eq!(report.rejected[0].0.source_id, "bad");
        assert!(matches!(
            report.rejected[0].1,
            GeometryError::InvalidCoordinate { .. }
        ));
    }
}
