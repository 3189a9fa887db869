//! Per-(district, layer) facility counts.

use std::collections::{BTreeMap, BTreeSet};

use equity_map_city_models::DistrictRecord;
use equity_map_poi_models::Poi;

/// Counts for one district.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DistrictCounts {
    /// District slug.
    pub id: String,
    /// Display name.
    pub name: String,
    /// Count per layer id, with every layer present.
    pub per_layer: BTreeMap<String, u64>,
    /// Sum of `per_layer`.
    pub total: u64,
}

/// Facility counts for one city.
///
/// Districts are ordered by id. Layers keep their configured order,
/// followed by any layer ids that only appear on POIs (sorted).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Aggregation {
    districts: Vec<DistrictCounts>,
    layers: Vec<String>,
    unassigned_per_layer: BTreeMap<String, u64>,
    unassigned: u64,
}

impl Aggregation {
    /// Districts ordered by id.
    #[must_use]
    pub fn districts(&self) -> &[DistrictCounts] {
        &self.districts
    }

    /// Layer ids in report order.
    #[must_use]
    pub fn layers(&self) -> &[String] {
        &self.layers
    }

    /// POIs not inside any district.
    #[must_use]
    pub const fn unassigned(&self) -> u64 {
        self.unassigned
    }

    /// Unassigned POIs per layer id, with every layer present.
    #[must_use]
    pub const fn unassigned_per_layer(&self) -> &BTreeMap<String, u64> {
        &self.unassigned_per_layer
    }

    /// POIs assigned to some district.
    #[must_use]
    pub fn total_assigned(&self) -> u64 {
        self.districts.iter().map(|d| d.total).sum()
    }

    /// Count of `layer` in `district`; 0 for unknown ids.
    #[must_use]
    pub fn count(&self, district: &str, layer: &str) -> u64 {
        self.districts
            .binary_search_by(|d| d.id.as_str().cmp(district))
            .ok()
            .and_then(|i| self.districts[i].per_layer.get(layer).copied())
            .unwrap_or(0)
    }

    /// Count of `layer` in every district, in district order.
    #[must_use]
    pub fn layer_counts(&self, layer: &str) -> Vec<u64> {
        self.districts
            .iter()
            .map(|d| d.per_layer.get(layer).copied().unwrap_or(0))
            .collect()
    }
}

/// Counts POIs per district and layer.
///
/// POIs without a district, or whose district is not in `districts`, are
/// counted as unassigned. POIs of a layer missing from `layers` are still
/// counted; the layer is appended to the layer list.
#[must_use]
pub fn aggregate(districts: &[DistrictRecord], layers: &[String], pois: &[Poi]) -> Aggregation {
    let mut layer_list: Vec<String> = Vec::with_capacity(layers.len());
    for layer in layers {
        if !layer_list.contains(layer) {
            layer_list.push(layer.clone());
        }
    }
    let extra: BTreeSet<&str> = pois
        .iter()
        .map(|p| p.layer.as_str())
        .filter(|l| !layer_list.iter().any(|known| known == l))
        .collect();
    if !extra.is_empty() {
        log::warn!("POIs reference unconfigured layers: {extra:?}");
    }
    layer_list.extend(extra.into_iter().map(ToString::to_string));

    let zeroes: BTreeMap<String, u64> = layer_list.iter().map(|l| (l.clone(), 0)).collect();

    let mut by_id: BTreeMap<&str, DistrictCounts> = BTreeMap::new();
    for district in districts {
        by_id
            .entry(district.id.as_str())
            .or_insert_with(|| DistrictCounts {
                id: district.id.clone(),
                name: district.name.clone(),
                per_layer: zeroes.clone(),
                total: 0,
            });
    }

    let mut unassigned_per_layer = zeroes;
    let mut unassigned = 0;

    for poi in pois {
        let target = match poi.district.as_deref() {
            Some(id) => {
                let found = by_id.get_mut(id);
                if found.is_none() {
                    log::warn!("{} references unknown district '{id}'", poi.key());
                }
                found
            }
            None => None,
        };

        let counts = match target {
            Some(district) => {
                district.total += 1;
                &mut district.per_layer
            }
            None => {
                unassigned += 1;
                &mut unassigned_per_layer
            }
        };
        *counts.entry(poi.layer.clone()).or_insert(0) += 1;
    }

    Aggregation {
        districts: by_id.into_values().collect(),
        layers: layer_list,
        unassigned_per_layer,
        unassigned,
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use equity_map_city_models::Coordinate;
    use equity_map_poi_models::Accessibility;

    pub(crate) fn district(id: &str) -> DistrictRecord {
        DistrictRecord {
            id: id.to_string(),
            name: id.to_uppercase(),
            area_km2: None,
            population: None,
        }
    }

    pub(crate) fn poi(layer: &str, id: &str, district: Option<&str>) -> Poi {
        Poi {
            layer: layer.to_string(),
            source_id: id.to_string(),
            name: id.to_string(),
            coordinate: Coordinate::new(49.5, 8.5),
            address: None,
            attributes: BTreeMap::new(),
            accessibility: Accessibility::default(),
            district: district.map(ToString::to_string),
        }
    }

    /// `n` POIs of `layer` in `district`.
    pub(crate) fn pois(layer: &str, district: Option<&str>, n: usize) -> Vec<Poi> {
        (0..n)
            .map(|i| poi(layer, &format!("{layer}-{}-{i}", district.unwrap_or("none")), district))
            .collect()
    }

    fn layers(ids: &[&str]) -> Vec<String> {
        ids.iter().map(ToString::to_string).collect()
    }

    #[test]
    fn per_layer_counts_sum_to_assigned_total() {
        let mut all = pois("parks", Some("a"), 3);
        all.extend(pois("schools", Some("a"), 2));
        all.extend(pois("parks", Some("b"), 4));
        all.extend(pois("parks", None, 5));

        let agg = aggregate(
            &[district("a"), district("b")],
            &layers(&["parks", "schools"]),
            &all,
        );

        let per_layer_sum: u64 = agg
            .districts()
            .iter()
            .flat_map(|d| d.per_layer.values())
            .sum();
        assert_eq!(per_layer_sum, agg.total_assigned());
        assert_eq!(agg.total_assigned(), 9);
        assert_eq!(agg.unassigned(), 5);
        assert_eq!(agg.unassigned_per_layer()["parks"], 5);
        assert_eq!(agg.count("a", "schools"), 2);
        assert_eq!(agg.count("b", "schools"), 0);
    }

    #[test]
    fn districts_sorted_and_every_layer_present() {
        let agg = aggregate(
            &[district("zeta"), district("alpha")],
            &layers(&["parks", "schools"]),
            &pois("parks", Some("zeta"), 1),
        );
        let ids: Vec<&str> = agg.districts().iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["alpha", "zeta"]);
        for d in agg.districts() {
            assert_eq!(d.per_layer.len(), 2);
        }
        assert_eq!(agg.layer_counts("parks"), vec![0, 1]);
    }

    #[test]
    fn unknown_layers_and_districts_are_not_lost() {
        let mut all = pois("benches", Some("a"), 2);
        all.push(poi("parks", "ghost", Some("nowhere")));

        let agg = aggregate(&[district("a")], &layers(&["parks"]), &all);

        assert_eq!(agg.layers(), &["parks".to_string(), "benches".to_string()]);
        assert_eq!(agg.count("a", "benches"), 2);
        assert_eq!(agg.unassigned(), 1);
        assert_eq!(agg.unassigned_per_layer()["parks"], 1);
    }

    #[test]
    fn aggregation_is_repeatable() {
        let mut all = pois("parks", Some("b"), 2);
        all.extend(pois("schools", Some("a"), 1));
        let districts = [district("b"), district("a")];
        let ids = layers(&["schools", "parks"]);

        assert_eq!(
            aggregate(&districts, &ids, &all),
            aggregate(&districts, &ids, &all)
        );
    }
}
