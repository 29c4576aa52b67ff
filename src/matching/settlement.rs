// src/matching/settlement.rs
use log::debug;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use strsim::normalized_levenshtein;
use uuid::Uuid;

use crate::matching::address::ParsedAddress;
use crate::models::core::{District, Settlement};

/// Locality-type prefixes some reference names carry, e.g. "п. Родники".
const SETTLEMENT_NAME_PREFIXES: [&str; 2] = ["п. ", "пос. "];

/// Districts and settlements in reference order. Lookups mirror a
/// case-insensitive `ILIKE '%name%'` and return the first hit.
#[derive(Debug, Clone, Default)]
pub struct ReferenceTable {
    districts: Vec<District>,
    settlements: Vec<Settlement>,
}

fn contains_ci(haystack: &str, needle_lower: &str) -> bool {
    haystack.to_lowercase().contains(needle_lower)
}

impl ReferenceTable {
    pub fn new(districts: Vec<District>, settlements: Vec<Settlement>) -> Self {
        Self {
            districts,
            settlements,
        }
    }

    pub fn district_count(&self) -> usize {
        self.districts.len()
    }

    pub fn settlement_count(&self) -> usize {
        self.settlements.len()
    }

    pub fn find_district(&self, fragment: &str) -> Option<&District> {
        let needle = fragment.trim().to_lowercase();
        if needle.is_empty() {
            return None;
        }
        self.districts.iter().find(|d| contains_ci(&d.name, &needle))
    }

    pub fn district_by_id(&self, id: Uuid) -> Option<&District> {
        self.districts.iter().find(|d| d.id == id)
    }

    /// Settlements whose name contains `fragment`, optionally restricted
    /// to one district, in reference order.
    pub fn settlements_matching<'a>(
        &'a self,
        fragment: &str,
        district_id: Option<Uuid>,
    ) -> Vec<&'a Settlement> {
        let needle = fragment.trim().to_lowercase();
        if needle.is_empty() {
            return Vec::new();
        }
        self.settlements
            .iter()
            .filter(|s| district_id.map_or(true, |id| s.district_id == id))
            .filter(|s| contains_ci(&s.name, &needle))
            .collect()
    }
}

/// Tie-break among several substring hits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum MatchStrategy {
    /// First hit in reference order.
    #[default]
    FirstHit,
    /// A hit whose name equals the detected name, with or without a
    /// locality prefix, beats earlier hits.
    PreferExact,
}

impl FromStr for MatchStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "first" | "first_hit" => Ok(MatchStrategy::FirstHit),
            "prefer_exact" | "exact" => Ok(MatchStrategy::PreferExact),
            other => Err(format!("unknown settlement match strategy '{}'", other)),
        }
    }
}

impl MatchStrategy {
    pub fn from_env() -> Self {
        env::var("SETTLEMENT_MATCH_STRATEGY")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or_default()
    }
}

/// Outcome of matching one parsed address. Empty names mean no match.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LocationMatch {
    pub final_district_name: String,
    pub final_settlement_name: String,
    pub district_id: Option<Uuid>,
    pub settlement_id: Option<Uuid>,
}

impl LocationMatch {
    pub fn is_empty(&self) -> bool {
        self.final_district_name.is_empty() && self.final_settlement_name.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredCandidate {
    pub settlement_id: Uuid,
    pub settlement_name: String,
    pub district_id: Uuid,
    pub district_name: Option<String>,
    pub score: f64,
}

fn strip_name_prefix(name_lower: &str) -> &str {
    SETTLEMENT_NAME_PREFIXES
        .iter()
        .find_map(|p| name_lower.strip_prefix(p))
        .unwrap_or(name_lower)
}

/// 1.0 for an exact name, 0.95 for an exact name behind a locality
/// prefix, otherwise 0.5 + 0.4 × normalized Levenshtein similarity.
pub fn candidate_score(candidate_name: &str, detected_name: &str) -> f64 {
    let candidate = candidate_name.trim().to_lowercase();
    let detected = detected_name.trim().to_lowercase();
    if candidate == detected {
        1.0
    } else if strip_name_prefix(&candidate) == strip_name_prefix(&detected) {
        0.95
    } else {
        0.5 + 0.4 * normalized_levenshtein(&candidate, &detected)
    }
}

pub struct SettlementMatcher {
    table: ReferenceTable,
    strategy: MatchStrategy,
}

impl SettlementMatcher {
    pub fn new(table: ReferenceTable, strategy: MatchStrategy) -> Self {
        Self { table, strategy }
    }

    pub fn table(&self) -> &ReferenceTable {
        &self.table
    }

    pub fn strategy(&self) -> MatchStrategy {
        self.strategy
    }

    fn pick<'a>(&self, hits: &[&'a Settlement], detected: &str) -> Option<&'a Settlement> {
        match self.strategy {
            MatchStrategy::FirstHit => hits.first().copied(),
            MatchStrategy::PreferExact => hits
                .iter()
                .copied()
                .find(|s| candidate_score(&s.name, detected) >= 0.95)
                .or_else(|| hits.first().copied()),
        }
    }

    /// District-scoped when the district resolves, global otherwise. A
    /// resolved district is kept even if no settlement matches inside it.
    pub fn match_location(&self, parsed: &ParsedAddress) -> LocationMatch {
        let mut outcome = LocationMatch::default();
        let detected_settlement = parsed.detected_settlement_name.trim();

        let district = self.table.find_district(&parsed.detected_district_name);
        match district {
            Some(district) => {
                outcome.final_district_name = district.name.clone();
                outcome.district_id = Some(district.id);
                debug!("District match: {} ({})", district.name, district.id);

                let hits = self.table.settlements_matching(detected_settlement, Some(district.id));
                if let Some(settlement) = self.pick(&hits, detected_settlement) {
                    outcome.final_settlement_name = settlement.name.clone();
                    outcome.settlement_id = Some(settlement.id);
                } else if !detected_settlement.is_empty() {
                    debug!("Settlement '{}' not found in district {}", detected_settlement, district.name);
                }
            }
            None => {
                let hits = self.table.settlements_matching(detected_settlement, None);
                if let Some(settlement) = self.pick(&hits, detected_settlement) {
                    outcome.final_settlement_name = settlement.name.clone();
                    outcome.settlement_id = Some(settlement.id);
                    if let Some(d) = self.table.district_by_id(settlement.district_id) {
                        outcome.final_district_name = d.name.clone();
                        outcome.district_id = Some(d.id);
                    }
                    debug!("Global settlement match: {}", settlement.name);
                }
            }
        }

        outcome
    }

    /// Every substring hit with a confidence score, best first; equal
    /// scores keep reference order.
    pub fn rank_candidates(&self, parsed: &ParsedAddress) -> Vec<ScoredCandidate> {
        let detected = parsed.detected_settlement_name.trim();
        let scope = self
            .table
            .find_district(&parsed.detected_district_name)
            .map(|d| d.id);

        let mut ranked: Vec<ScoredCandidate> = self
            .table
            .settlements_matching(detected, scope)
            .into_iter()
            .map(|s| ScoredCandidate {
                settlement_id: s.id,
                settlement_name: s.name.clone(),
                district_id: s.district_id,
                district_name: self.table.district_by_id(s.district_id).map(|d| d.name.clone()),
                score: candidate_score(&s.name, detected),
            })
            .collect();

        ranked.sort_by(|a, b| b.score.total_cmp(&a.score));
        ranked
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u128) -> Uuid {
        Uuid::from_u128(n)
    }

    fn table() -> ReferenceTable {
        let districts = vec![
            District { id: id(1), name: "Гурьевский городской округ".to_string() },
            District { id: id(2), name: "Зеленоградский район".to_string() },
        ];
        let settlements = vec![
            Settlement { id: id(10), name: "п. Заречье".to_string(), district_id: id(1) },
            Settlement { id: id(11), name: "Поддубное".to_string(), district_id: id(1) },
            Settlement { id: id(12), name: "Малое Исаково".to_string(), district_id: id(1) },
            Settlement { id: id(13), name: "Исаково".to_string(), district_id: id(1) },
            Settlement { id: id(20), name: "Коврово".to_string(), district_id: id(2) },
            Settlement { id: id(21), name: "Заречье".to_string(), district_id: id(2) },
        ];
        ReferenceTable::new(districts, settlements)
    }

    fn parsed(district: &str, settlement: &str) -> ParsedAddress {
        ParsedAddress {
            detected_district_name: district.to_string(),
            detected_settlement_name: settlement.to_string(),
        }
    }

    #[test]
    fn test_reference_table_counts() {
        let table = table();
        assert_eq!(table.district_count(), 2);
        assert_eq!(table.settlement_count(), 6);
        assert_eq!(ReferenceTable::default().settlement_count(), 0);
    }

    #[test]
    fn test_district_scoped_match() {
        let matcher = SettlementMatcher::new(table(), MatchStrategy::FirstHit);
        let outcome = matcher.match_location(&parsed("Гурьевский", "Поддубное"));
        assert_eq!(outcome.final_district_name, "Гурьевский городской округ");
        assert_eq!(outcome.final_settlement_name, "Поддубное");
        assert_eq!(outcome.district_id, Some(id(1)));
        assert_eq!(outcome.settlement_id, Some(id(11)));
    }

    #[test]
    fn test_district_scope_excludes_other_districts() {
        let matcher = SettlementMatcher::new(table(), MatchStrategy::FirstHit);
        let outcome = matcher.match_location(&parsed("Зеленоградский", "Заречье"));
        assert_eq!(outcome.final_settlement_name, "Заречье");
        assert_eq!(outcome.settlement_id, Some(id(21)));
    }

    #[test]
    fn test_district_kept_when_settlement_misses() {
        let matcher = SettlementMatcher::new(table(), MatchStrategy::FirstHit);
        let outcome = matcher.match_location(&parsed("Зеленоградский", "Поддубное"));
        assert_eq!(outcome.final_district_name, "Зеленоградский район");
        assert_eq!(outcome.final_settlement_name, "");
        assert_eq!(outcome.settlement_id, None);
    }

    #[test]
    fn test_global_fallback_joins_district() {
        let matcher = SettlementMatcher::new(table(), MatchStrategy::FirstHit);
        let outcome = matcher.match_location(&parsed("", "Коврово"));
        assert_eq!(outcome.final_settlement_name, "Коврово");
        assert_eq!(outcome.final_district_name, "Зеленоградский район");

        // unknown district falls back to the global search too
        let outcome = matcher.match_location(&parsed("Неманский", "ковРОВО"));
        assert_eq!(outcome.final_settlement_name, "Коврово");
    }

    #[test]
    fn test_first_hit_tie_break() {
        let matcher = SettlementMatcher::new(table(), MatchStrategy::FirstHit);
        let outcome = matcher.match_location(&parsed("Гурьевский", "Исаково"));
        assert_eq!(outcome.final_settlement_name, "Малое Исаково");
    }

    #[test]
    fn test_prefer_exact_tie_break() {
        let matcher = SettlementMatcher::new(table(), MatchStrategy::PreferExact);
        let outcome = matcher.match_location(&parsed("Гурьевский", "Исаково"));
        assert_eq!(outcome.final_settlement_name, "Исаково");

        let outcome = matcher.match_location(&parsed("", "Заречье"));
        assert_eq!(outcome.final_settlement_name, "п. Заречье");
    }

    #[test]
    fn test_no_match_is_empty() {
        let matcher = SettlementMatcher::new(table(), MatchStrategy::FirstHit);
        assert!(matcher.match_location(&parsed("", "")).is_empty());
        assert!(matcher.match_location(&parsed("", "Янтарный")).is_empty());
    }

    #[test]
    fn test_rank_candidates_scores() {
        let matcher = SettlementMatcher::new(table(), MatchStrategy::FirstHit);
        let ranked = matcher.rank_candidates(&parsed("Гурьевский", "Исаково"));
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].settlement_name, "Исаково");
        assert_eq!(ranked[0].score, 1.0);
        assert!(ranked[1].score > 0.5 && ranked[1].score < 0.95);
        assert_eq!(ranked[1].district_name.as_deref(), Some("Гурьевский городской округ"));

        let ranked = matcher.rank_candidates(&parsed("", "Заречье"));
        assert_eq!(ranked.len(), 2);
        assert_eq!(ranked[0].settlement_id, id(21));
        assert_eq!(ranked[1].score, 0.95);
    }

    #[test]
    fn test_strategy_parsing() {
        assert_eq!("first".parse::<MatchStrategy>(), Ok(MatchStrategy::FirstHit));
        assert_eq!("PREFER_EXACT".parse::<MatchStrategy>(), Ok(MatchStrategy::PreferExact));
        assert!("fuzzy".parse::<MatchStrategy>().is_err());
        assert_eq!(MatchStrategy::default(), MatchStrategy::FirstHit);
    }
}
