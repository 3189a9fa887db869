//! District polygons from administrative boundary relations.
//!
//! A relation lists its boundary as member ways with role `outer` or
//! `inner`. Ways are stitched end to end by shared node ids into closed
//! rings; each inner ring becomes a hole of the outer ring containing it.

use std::collections::BTreeSet;

use equity_map_city_models::district_slug;
use equity_map_spatial::boundary::{ParsedBoundaries, validate_polygon};
use equity_map_spatial::{DistrictBoundary, GeometryError};
use geo::{Contains, Coord, LineString, MultiPolygon, Point, Polygon};

use crate::element::{Element, ElementLookup, Member};

/// Builds one district per named relation in `elements`.
///
/// Relations without a `name` tag, whose name yields an empty slug,
/// without enough resolvable outer geometry, or whose slug repeats an
/// earlier relation are rejected
/// individually; the index in the result refers to `elements`.
#[must_use]
pub fn parse_relations(elements: &[Element]) -> ParsedBoundaries {
    let lookup = ElementLookup::new(elements);
    let mut parsed = ParsedBoundaries::default();
    let mut seen = BTreeSet::new();

    for (i, element) in elements.iter().enumerate() {
        let Element::Relation { id, members, tags } = element else {
            continue;
        };

        let Some(name) = tags.get("name").map(|n| n.trim()).filter(|n| !n.is_empty()) else {
            parsed.rejected.push((
                i,
                GeometryError::InvalidPolygon {
                    district: format!("relation/{id}"),
                    message: "missing name tag".to_string(),
                },
            ));
            continue;
        };

        let slug = district_slug(name);
        if slug.is_empty() {
            parsed
                .rejected
                .push((i, GeometryError::EmptyDistrictId(name.to_string())));
            continue;
        }
        let polygon = relation_polygon(&lookup, members);
        match validate_polygon(&slug, &polygon) {
            Ok(()) if !seen.insert(slug.clone()) => {
                parsed.rejected.push((i, GeometryError::DuplicateDistrict(slug)));
            }
            Ok(()) => {
                let mut district = DistrictBoundary::new(slug, name, polygon);
                district.population = tags
                    .get("population")
                    .and_then(|p| p.replace(['.', ',', ' '], "").parse().ok());
                parsed.districts.push(district);
            }
            Err(e) => parsed.rejected.push((i, e)),
        }
    }

    for (i, e) in &parsed.rejected {
        log::warn!("Skipping boundary element #{i}: {e}");
    }

    parsed
}

/// Assembles the outer and inner rings of a relation.
fn relation_polygon(lookup: &ElementLookup<'_>, members: &[Member]) -> MultiPolygon<f64> {
    let rings_with_role = |role: &str| {
        let ways = members
            .iter()
            .filter(|m| m.kind == "way" && m.role == role)
            .filter_map(|m| lookup.way_nodes(m.id))
            .map(<[u64]>::to_vec)
            .collect();
        stitch(ways)
            .into_iter()
            .filter_map(|ids| ring(lookup, &ids))
            .collect::<Vec<_>>()
    };

    let mut polygons: Vec<Polygon<f64>> = rings_with_role("outer")
        .into_iter()
        .map(|exterior| Polygon::new(exterior, vec![]))
        .collect();

    for hole in rings_with_role("inner") {
        let Some(first) = hole.0.first().copied() else {
            continue;
        };
        if let Some(polygon) = polygons
            .iter_mut()
            .find(|p| p.contains(&Point::from(first)))
        {
            polygon.interiors_push(hole);
        }
    }

    MultiPolygon(polygons)
}

/// Joins ways that share end nodes into chains. Chains that cannot be
/// closed are returned as they are.
fn stitch(mut ways: Vec<Vec<u64>>) -> Vec<Vec<u64>> {
    ways.retain(|w| !w.is_empty());
    ways.reverse();

    let mut chains = Vec::new();
    while let Some(mut chain) = ways.pop() {
        while chain.first() != chain.last() || chain.len() == 1 {
            let Some(&end) = chain.last() else { break };
            let Some(next) = ways
                .iter()
                .position(|w| w.first() == Some(&end) || w.last() == Some(&end))
            else {
                break;
            };
            let mut way = ways.remove(next);
            if way.first() != Some(&end) {
                way.reverse();
            }
            chain.extend(way.into_iter().skip(1));
        }
        chains.push(chain);
    }
    chains
}

/// Resolves node ids to a ring. `None` below three distinct vertices.
fn ring(lookup: &ElementLookup<'_>, ids: &[u64]) -> Option<LineString<f64>> {
    let coords: Vec<Coord<f64>> = ids
        .iter()
        .filter_map(|id| lookup.node(*id))
        .map(|c| Coord { x: c.lng, y: c.lat })
        .collect();
    let distinct = if coords.first() == coords.last() {
        coords.len().saturating_sub(1)
    } else {
        coords.len()
    };
    (distinct >= 3).then(|| LineString::new(coords))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;

    fn node(id: u64, lon: f64, lat: f64) -> Element {
        Element::Node {
            id,
            lat: Some(lat),
            lon: Some(lon),
            tags: BTreeMap::new(),
        }
    }

    fn way(id: u64, nodes: &[u64]) -> Element {
        Element::Way {
            id,
            center: None,
            nodes: nodes.to_vec(),
            tags: BTreeMap::new(),
        }
    }

    fn relation(id: u64, name: Option<&str>, members: &[(u64, &str)]) -> Element {
        let mut tags = BTreeMap::new();
        if let Some(name) = name {
            tags.insert("name".to_string(), name.to_string());
        }
        Element::Relation {
            id,
            members: members
                .iter()
                .map(|(id, role)| Member {
                    kind: "way".to_string(),
                    id: *id,
                    role: (*role).to_string(),
                })
                .collect(),
            tags,
        }
    }

    /// A 4x4 square split into two open ways, plus a 1x1 hole.
    fn square_elements() -> Vec<Element> {
        vec![
            node(1, 0.0, 0.0),
            node(2, 4.0, 0.0),
            node(3, 4.0, 4.0),
            node(4, 0.0, 4.0),
            node(5, 1.0, 1.0),
            node(6, 2.0, 1.0),
            node(7, 2.0, 2.0),
            node(8, 1.0, 2.0),
            way(10, &[1, 2, 3]),
            // Reversed relative to way 10
            way(11, &[1, 4, 3]),
            way(12, &[5, 6, 7, 8, 5]),
        ]
    }

    #[test]
    fn stitches_reversed_ways_into_a_ring() {
        assert_eq!(
            stitch(vec![vec![1, 2, 3], vec![1, 4, 3]]),
            vec![vec![1, 2, 3, 4, 1]]
        );
        assert_eq!(stitch(vec![vec![5, 6, 7, 5]]), vec![vec![5, 6, 7, 5]]);
    }

    #[test]
    fn builds_polygon_with_hole() {
        let mut elements = square_elements();
        let mut rel = relation(100, Some("Schönau Nord"), &[(10, "outer"), (11, "outer"), (12, "inner")]);
        if let Element::Relation { tags, .. } = &mut rel {
            tags.insert("population".to_string(), "12.345".to_string());
        }
        elements.push(rel);

        let parsed = parse_relations(&elements);
        assert!(parsed.rejected.is_empty());
        let district = &parsed.districts[0];
        assert_eq!(district.id, "schoenau-nord");
        assert_eq!(district.name, "Schönau Nord");
        assert_eq!(district.population, Some(12_345));
        assert_eq!(district.polygon.0.len(), 1);
        assert_eq!(district.polygon.0[0].interiors().len(), 1);
        assert!(!district.polygon.contains(&Point::new(1.5, 1.5)));
        assert!(district.polygon.contains(&Point::new(3.0, 3.0)));
    }

    #[test]
    fn rejects_unnamed_degenerate_and_duplicate_relations() {
        let mut elements = square_elements();
        elements.push(relation(100, None, &[(10, "outer"), (11, "outer")]));
        elements.push(relation(101, Some("Mitte"), &[(10, "outer"), (11, "outer")]));
        elements.push(relation(102, Some("Mitte"), &[(12, "outer")]));
        elements.push(relation(103, Some("Leer"), &[(99, "outer")]));

        let parsed = parse_relations(&elements);
        let ids: Vec<&str> = parsed.districts.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["mitte"]);
        assert_eq!(parsed.rejected.len(), 3);
        assert!(matches!(
            parsed.rejected[1].1,
            GeometryError::DuplicateDistrict(ref id) if id == "mitte"
        ));
    }

    #[test]
    fn rejects_names_without_id_characters() {
        let mut elements = square_elements();
        elements.push(relation(100, Some("(*)"), &[(10, "outer"), (11, "outer")]));
        elements.push(relation(101, Some("Élysée"), &[(10, "outer"), (11, "outer")]));
        elements.push(relation(102, Some("Îlot"), &[(10, "outer"), (11, "outer")]));

        let parsed = parse_relations(&elements);
        let ids: Vec<&str> = parsed.districts.iter().map(|d| d.id.as_str()).collect();
        assert_eq!(ids, vec!["élysée", "îlot"]);
        assert_eq!(parsed.rejected.len(), 1);
        assert!(matches!(
            parsed.rejected[0].1,
            GeometryError::EmptyDistrictId(ref name) if name == "(*)"
        ));
    }
}
