//! Equity scores relative to the city-wide average.
//!
//! A district's score is its facility total divided by the city average
//! facilities-per-district, times 100: 100.0 means exactly average. Scores
//! are not rounded.

use equity_map_analytics_models::{CityStat, DistrictStat};

use crate::NoDataError;
use crate::aggregate::Aggregation;

/// Districts scoring at or below this are underserved.
pub const UNDERSERVED_THRESHOLD: f64 = 50.0;

/// Total assigned facilities divided by the number of districts.
///
/// # Errors
///
/// Returns [`NoDataError::NoDistricts`] if the city has no districts.
#[allow(clippy::cast_precision_loss)]
pub fn city_average(agg: &Aggregation) -> Result<f64, NoDataError> {
    let districts = agg.districts().len();
    if districts == 0 {
        return Err(NoDataError::NoDistricts);
    }
    Ok(agg.total_assigned() as f64 / districts as f64)
}

/// `total / city_average * 100`, or `None` when the average is zero.
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn equity_score(total: u64, city_average: f64) -> Option<f64> {
    (city_average > 0.0).then(|| total as f64 / city_average * 100.0)
}

/// Whether a score marks the district as underserved. A missing score
/// never does.
#[must_use]
pub fn is_underserved(score: Option<f64>) -> bool {
    score.is_some_and(|s| s <= UNDERSERVED_THRESHOLD)
}

/// Builds a [`DistrictStat`] for every district, ordered by id.
///
/// # Errors
///
/// Returns [`NoDataError::NoDistricts`] if the city has no districts.
pub fn district_stats(agg: &Aggregation) -> Result<Vec<DistrictStat>, NoDataError> {
    let average = city_average(agg)?;
    Ok(agg
        .districts()
        .iter()
        .map(|d| {
            let equity_score = equity_score(d.total, average);
            DistrictStat {
                district_id: d.id.clone(),
                name: d.name.clone(),
                total: d.total,
                per_layer: d.per_layer.clone(),
                equity_score,
                underserved: is_underserved(equity_score),
            }
        })
        .collect())
}

/// City-wide summary for `city`.
///
/// # Errors
///
/// Returns [`NoDataError::NoDistricts`] if the city has no districts.
pub fn city_stat(city: &str, agg: &Aggregation) -> Result<CityStat, NoDataError> {
    let stats = district_stats(agg)?;
    Ok(CityStat {
        city: city.to_string(),
        total_pois: agg.total_assigned(),
        unassigned_pois: agg.unassigned(),
        unassigned_per_layer: agg.unassigned_per_layer().clone(),
        total_districts: stats.len() as u64,
        city_average: city_average(agg)?,
        underserved_count: stats.iter().filter(|s| s.underserved).count() as u64,
    })
}

/// Extracts every district's score, for callers that cannot work with a
/// missing ratio.
///
/// # Errors
///
/// Returns [`NoDataError::NoDistricts`] for an empty slice and
/// [`NoDataError::NoFacilities`] if any score is missing.
pub fn require_scores(stats: &[DistrictStat]) -> Result<Vec<(String, f64)>, NoDataError> {
    if stats.is_empty() {
        return Err(NoDataError::NoDistricts);
    }
    stats
        .iter()
        .map(|s| {
            s.equity_score
                .map(|score| (s.district_id.clone(), score))
                .ok_or(NoDataError::NoFacilities)
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::aggregate::aggregate;
    use crate::aggregate::tests::{district, pois};

    fn layers() -> Vec<String> {
        vec!["parks".to_string()]
    }

    #[test]
    fn thousand_facilities_over_fifty_districts_average_twenty() {
        let districts: Vec<_> = (0..50).map(|i| district(&format!("d{i:02}"))).collect();
        let all: Vec<_> = districts
            .iter()
            .flat_map(|d| pois("parks", Some(d.id.as_str()), 20))
            .collect();
        assert_eq!(all.len(), 1000);

        let agg = aggregate(&districts, &layers(), &all);
        assert!((city_average(&agg).unwrap() - 20.0).abs() < f64::EPSILON);
    }

    #[test]
    fn half_the_average_is_underserved() {
        let mut all = pois("parks", Some("low"), 10);
        all.extend(pois("parks", Some("high"), 30));
        let agg = aggregate(&[district("low"), district("high")], &layers(), &all);

        let stats = district_stats(&agg).unwrap();
        let high = &stats[0];
        let low = &stats[1];

        assert_eq!(low.district_id, "low");
        assert!((low.equity_score.unwrap() - 50.0).abs() < f64::EPSILON);
        assert!(low.underserved);

        assert_eq!(high.district_id, "high");
        assert!((high.equity_score.unwrap() - 150.0).abs() < f64::EPSILON);
        assert!(!high.underserved);
    }

    #[test]
    fn empty_district_scores_zero() {
        let all = pois("parks", Some("a"), 4);
        let agg = aggregate(&[district("a"), district("b")], &layers(), &all);
        let stats = district_stats(&agg).unwrap();
        assert_eq!(stats[1].equity_score, Some(0.0));
        assert!(stats[1].underserved);
    }

    #[test]
    fn scores_are_scale_invariant() {
        let counts = [3usize, 7, 11, 0];
        let ids = ["a", "b", "c", "d"];
        let districts: Vec<_> = ids.iter().map(|id| district(id)).collect();

        let scores = |factor: usize| {
            let all: Vec<_> = ids
                .iter()
                .zip(counts)
                .flat_map(|(id, n)| pois("parks", Some(*id), n * factor))
                .collect();
            let agg = aggregate(&districts, &layers(), &all);
            district_stats(&agg)
                .unwrap()
                .into_iter()
                .map(|s| s.equity_score.unwrap())
                .collect::<Vec<_>>()
        };

        for (a, b) in scores(1).iter().zip(scores(13)) {
            assert!((a - b).abs() < 1e-9, "{a} != {b}");
        }
    }

    #[test]
    fn no_facilities_gives_null_scores() {
        let agg = aggregate(&[district("a"), district("b")], &layers(), &[]);
        let stats = district_stats(&agg).unwrap();

        assert!(stats.iter().all(|s| s.equity_score.is_none() && !s.underserved));
        assert_eq!(require_scores(&stats), Err(NoDataError::NoFacilities));

        let city = city_stat("x", &agg).unwrap();
        assert!(city.city_average.abs() < f64::EPSILON);
        assert_eq!(city.underserved_count, 0);
    }

    #[test]
    fn zero_districts_is_an_error() {
        let agg = aggregate(&[], &layers(), &pois("parks", None, 3));
        assert_eq!(city_average(&agg), Err(NoDataError::NoDistricts));
        assert_eq!(district_stats(&agg), Err(NoDataError::NoDistricts));
        assert_eq!(require_scores(&[]), Err(NoDataError::NoDistricts));
    }

    #[test]
    fn city_stat_counts_unassigned_separately() {
        let mut all = pois("parks", Some("a"), 2);
        all.extend(pois("parks", None, 3));
        let agg = aggregate(&[district("a"), district("b")], &layers(), &all);

        let city = city_stat("mannheim", &agg).unwrap();
        assert_eq!(city.total_pois, 2);
        assert_eq!(city.unassigned_pois, 3);
        assert_eq!(city.total_districts, 2);
        assert!((city.city_average - 1.0).abs() < f64::EPSILON);
        assert_eq!(city.underserved_count, 1);
    }
}
