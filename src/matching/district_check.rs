// src/matching/district_check.rs - Stored district vs. the cadastral region prefix
use serde::Serialize;
use std::collections::BTreeMap;
use uuid::Uuid;

use crate::matching::cadastral::{cadastral_region_prefix, district_by_region_prefix, districts_match};
use crate::models::core::LandPlot;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PrefixStats {
    pub district: &'static str,
    pub total: usize,
    pub correct: usize,
    pub wrong: usize,
}

/// A parcel whose `district` disagrees with the district its cadastral
/// region prefix belongs to. A null or blank district is a mismatch.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DistrictMismatch {
    pub id: Uuid,
    pub cadastral_number: String,
    pub prefix: String,
    pub current_district: Option<String>,
    pub expected_district: &'static str,
    pub location: Option<String>,
    pub has_coordinates: bool,
    pub center_lat: Option<f64>,
    pub center_lon: Option<f64>,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct DistrictCheckReport {
    pub total_plots: usize,
    /// Parcels whose prefix is in the regional table.
    pub checked: usize,
    pub total_mismatches: usize,
    pub prefix_stats: BTreeMap<String, PrefixStats>,
    pub mismatches: Vec<DistrictMismatch>,
}

impl DistrictCheckReport {
    /// Share of checked parcels whose district agrees, in percent.
    pub fn match_rate(&self) -> f64 {
        if self.checked == 0 {
            return 100.0;
        }
        (self.checked - self.total_mismatches) as f64 / self.checked as f64 * 100.0
    }

    pub fn mismatches_by_prefix(&self) -> BTreeMap<&str, Vec<&DistrictMismatch>> {
        let mut grouped: BTreeMap<&str, Vec<&DistrictMismatch>> = BTreeMap::new();
        for mismatch in &self.mismatches {
            grouped.entry(mismatch.prefix.as_str()).or_default().push(mismatch);
        }
        grouped
    }
}

/// Compares every parcel's district with the one implied by its
/// cadastral prefix. Parcels without a cadastral number or with a prefix
/// outside the region table are counted in `total_plots` only.
pub fn find_district_mismatches(plots: &[LandPlot]) -> DistrictCheckReport {
    let mut report = DistrictCheckReport {
        total_plots: plots.len(),
        ..Default::default()
    };

    for plot in plots {
        let Some(cadastral) = plot.cadastral() else {
            continue;
        };
        let Some(prefix) = cadastral_region_prefix(cadastral) else {
            continue;
        };
        let Some(expected) = district_by_region_prefix(&prefix) else {
            continue;
        };

        report.checked += 1;
        let stats = report
            .prefix_stats
            .entry(prefix.clone())
            .or_insert_with(|| PrefixStats {
                district: expected,
                total: 0,
                correct: 0,
                wrong: 0,
            });
        stats.total += 1;

        let agrees = plot
            .district
            .as_deref()
            .map_or(false, |current| districts_match(current, expected));
        if agrees {
            stats.correct += 1;
            continue;
        }

        stats.wrong += 1;
        report.mismatches.push(DistrictMismatch {
            id: plot.id,
            cadastral_number: cadastral.to_string(),
            prefix,
            current_district: plot.district.clone(),
            expected_district: expected,
            location: plot.location.clone(),
            has_coordinates: plot.has_coordinates,
            center_lat: plot.center_lat,
            center_lon: plot.center_lon,
        });
    }

    report.total_mismatches = report.mismatches.len();
    report
}

#[cfg(test)]
mod tests {
    use super::*;

    fn plot(n: u128, cadastral: &str, district: Option<&str>) -> LandPlot {
        let mut p = LandPlot::new(Uuid::from_u128(n), cadastral);
        p.district = district.map(str::to_string);
        p
    }

    #[test]
    fn test_finds_drifted_districts() {
        let mut unnumbered = plot(6, "", Some("Славский район"));
        unnumbered.cadastral_number = None;
        let plots = vec![
            plot(1, "39:03:080808:562", Some("Гурьевский городской округ")),
            plot(2, "39:03:080808:563", Some("Гурьевский район")),
            plot(3, "39:03:080808:564", Some("Зеленоградский район")),
            plot(4, "39:05:010101:ЗУ1", None),
            plot(5, "47:01:000000:1", Some("Всеволожский район")),
            unnumbered,
        ];

        let report = find_district_mismatches(&plots);
        assert_eq!(report.total_plots, 6);
        assert_eq!(report.checked, 4);
        assert_eq!(report.total_mismatches, 2);

        let ids: Vec<Uuid> = report.mismatches.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![Uuid::from_u128(3), Uuid::from_u128(4)]);
        assert_eq!(report.mismatches[0].expected_district, "Гурьевский городской округ");
        assert_eq!(report.mismatches[1].prefix, "39:05");
        assert_eq!(report.mismatches[1].current_district, None);
    }

    #[test]
    fn test_prefix_stats_and_grouping() {
        let plots = vec![
            plot(1, "39:03:080808:562", Some("Гурьевский городской округ")),
            plot(2, "39:03:080808:564", Some("Калининград")),
            plot(3, "39:15:000000:1", Some("г. Калининград")),
            plot(4, "39:15:000000:2", Some("  ")),
        ];
        let report = find_district_mismatches(&plots);

        let gurievsk = &report.prefix_stats["39:03"];
        assert_eq!((gurievsk.total, gurievsk.correct, gurievsk.wrong), (2, 1, 1));
        let city = &report.prefix_stats["39:15"];
        assert_eq!(city.district, "Калининград");
        assert_eq!((city.total, city.correct, city.wrong), (2, 1, 1));
        assert_eq!(report.match_rate(), 50.0);

        let grouped = report.mismatches_by_prefix();
        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped["39:03"][0].id, Uuid::from_u128(2));
    }

    #[test]
    fn test_empty_table() {
        let report = find_district_mismatches(&[]);
        assert_eq!(report.total_mismatches, 0);
        assert_eq!(report.match_rate(), 100.0);
        assert!(report.prefix_stats.is_empty());
    }
}
