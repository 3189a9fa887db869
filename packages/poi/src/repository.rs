//! In-memory [`PoiSink`] with the same upsert-by-source-key semantics as
//! the database writer, for exercising imports without storage.

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use std::convert::Infallible;

use equity_map_poi_models::{Poi, SourceKey, UpsertOutcome};

use crate::PoiSink;

/// POIs keyed by `(layer, source_id)`.
#[derive(Debug, Clone, Default)]
pub struct PoiRepository {
    pois: BTreeMap<SourceKey, Poi>,
}

impl PoiRepository {
    /// Empty repository.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Inserts or replaces a POI.
    ///
    /// An existing district assignment is kept when the coordinate did not
    /// change, and cleared when it did (the POI must be re-assigned).
    pub fn put(&mut self, poi: Poi) -> UpsertOutcome {
        match self.pois.entry(poi.key()) {
            Entry::Vacant(slot) => {
                slot.insert(poi);
                UpsertOutcome::Inserted
            }
            Entry::Occupied(mut slot) => {
                let existing = slot.get_mut();
                if existing.same_content(&poi) {
                    return UpsertOutcome::Unchanged;
                }
                let district = if existing.coordinate == poi.coordinate {
                    existing.district.take()
                } else {
                    None
                };
                *existing = Poi { district, ..poi };
                UpsertOutcome::Updated
            }
        }
    }

    /// The POI stored under `key`.
    #[must_use]
    pub fn get(&self, key: &SourceKey) -> Option<&Poi> {
        self.pois.get(key)
    }

    /// Number of stored POIs.
    #[must_use]
    pub fn len(&self) -> usize {
        self.pois.len()
    }
}

impl PoiSink for PoiRepository {
    type Error = Infallible;

    fn upsert(&mut self, poi: &Poi) -> Result<UpsertOutcome, Self::Error> {
        Ok(self.put(poi.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use equity_map_city_models::Coordinate;

    fn poi(layer: &str, id: &str, name: &str, lat: f64) -> Poi {
        Poi {
            layer: layer.to_string(),
            source_id: id.to_string(),
            name: name.to_string(),
            coordinate: Coordinate::new(lat, 8.5),
            address: None,
            attributes: BTreeMap::new(),
            accessibility: equity_map_poi_models::Accessibility::default(),
            district: None,
        }
    }

    #[test]
    fn upsert_is_idempotent() {
        let mut repo = PoiRepository::new();
        assert_eq!(repo.put(poi("parks", "1", "A", 49.5)), UpsertOutcome::Inserted);
        assert_eq!(repo.put(poi("parks", "1", "A", 49.5)), UpsertOutcome::Unchanged);
        assert_eq!(repo.len(), 1);
    }

    #[test]
    fn same_source_id_in_different_layers_is_distinct() {
        let mut repo = PoiRepository::new();
        repo.put(poi("parks", "1", "A", 49.5));
        repo.put(poi("schools", "1", "B", 49.5));
        assert_eq!(repo.len(), 2);
    }

    #[test]
    fn update_keeps_district_only_when_coordinate_unchanged() {
        let mut repo = PoiRepository::new();
        let mut assigned = poi("parks", "1", "A", 49.5);
        assigned.district = Some("mitte".to_string());
        repo.put(assigned);

        assert_eq!(repo.put(poi("parks", "1", "Renamed", 49.5)), UpsertOutcome::Updated);
        let key = SourceKey::new("parks", "1");
        assert_eq!(repo.get(&key).unwrap().district.as_deref(), Some("mitte"));

        assert_eq!(repo.put(poi("parks", "1", "Renamed", 49.6)), UpsertOutcome::Updated);
        assert_eq!(repo.get(&key).unwrap().district, None);
    }
}
