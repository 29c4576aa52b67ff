// src/matching/resolver.rs
use log::debug;
use serde::Serialize;
use std::env;
use uuid::Uuid;

use crate::error::ResolveError;
use crate::matching::address::{parse_address, ParsedAddress};
use crate::matching::cadastral::{district_for_cadastral, normalize_district_name};
use crate::matching::settlement::{LocationMatch, ScoredCandidate, SettlementMatcher};
use crate::models::core::LocationFields;
use crate::nspd::client::{detect_land_status, object_from_response, NspdClient};
use crate::nspd::geometry::{is_contour, LatLon};
use crate::nspd::schemas::NspdSearchResponse;

#[derive(Debug, Clone, Serialize)]
pub struct ResolutionDebug {
    pub nspd_address: String,
    pub parsed: ParsedAddress,
    pub matched: LocationMatch,
    pub candidates: Vec<ScoredCandidate>,
    pub used_prefix_fallback: bool,
}

/// District and settlement derived for one cadastral number.
#[derive(Debug, Clone, Serialize)]
pub struct LocationResolution {
    pub cadastral_number: String,
    pub district: Option<String>,
    pub location: Option<String>,
    pub district_id: Option<Uuid>,
    pub settlement_id: Option<Uuid>,
    pub nspd_address: String,
    pub land_status: Option<&'static str>,
    pub centroid: Option<LatLon>,
    pub geometry_type: String,
    pub has_contour: bool,
    pub debug: ResolutionDebug,
}

impl LocationResolution {
    /// Fields to write over `current`: only resolved, non-empty values
    /// that differ from what the parcel already holds.
    pub fn location_patch(&self, current: &LocationFields) -> LocationFields {
        fn changed(new: &Option<String>, old: &Option<String>) -> Option<String> {
            match new {
                Some(value) if !value.is_empty() && Some(value) != old.as_ref() => Some(value.clone()),
                _ => None,
            }
        }
        LocationFields {
            district: changed(&self.district, &current.district),
            location: changed(&self.location, &current.location),
        }
    }
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_string())
    }
}

pub struct LocationResolver {
    matcher: SettlementMatcher,
    prefix_fallback: bool,
}

impl LocationResolver {
    pub fn new(matcher: SettlementMatcher, prefix_fallback: bool) -> Self {
        Self {
            matcher,
            prefix_fallback,
        }
    }

    /// Reads `RESOLVER_PREFIX_FALLBACK` (default off).
    pub fn from_env(matcher: SettlementMatcher) -> Self {
        let prefix_fallback = env::var("RESOLVER_PREFIX_FALLBACK")
            .unwrap_or_else(|_| "false".to_string())
            .parse()
            .unwrap_or(false);
        Self::new(matcher, prefix_fallback)
    }

    pub fn with_prefix_fallback(mut self, enabled: bool) -> Self {
        self.prefix_fallback = enabled;
        self
    }

    pub fn matcher(&self) -> &SettlementMatcher {
        &self.matcher
    }

    pub fn prefix_fallback(&self) -> bool {
        self.prefix_fallback
    }

    pub async fn resolve(
        &self,
        client: &NspdClient,
        cadastral_number: &str,
    ) -> Result<LocationResolution, ResolveError> {
        let response = client.search(cadastral_number).await?;
        self.resolve_response(&response, cadastral_number)
    }

    /// Registry response → address → parsed fragments → reference match.
    pub fn resolve_response(
        &self,
        response: &NspdSearchResponse,
        cadastral_number: &str,
    ) -> Result<LocationResolution, ResolveError> {
        let object = object_from_response(response, cadastral_number)?;
        let address = object
            .address
            .as_deref()
            .and_then(non_empty)
            .ok_or(ResolveError::AddressMissing)?;

        let parsed = parse_address(&address);
        let matched = self.matcher.match_location(&parsed);
        let candidates = self.matcher.rank_candidates(&parsed);

        let mut district = non_empty(&matched.final_district_name);
        let location = non_empty(&matched.final_settlement_name);
        let mut used_prefix_fallback = false;

        if district.is_none() && self.prefix_fallback {
            if let Some(by_prefix) = district_for_cadastral(cadastral_number) {
                debug!("{}: district taken from cadastral prefix", cadastral_number);
                district = Some(normalize_district_name(by_prefix));
                used_prefix_fallback = true;
            }
        }

        if district.is_none() && location.is_none() {
            debug!("{}: nothing matched in '{}'", cadastral_number, address);
            return Err(ResolveError::NotFound);
        }

        Ok(LocationResolution {
            cadastral_number: object.cadastral_number.clone(),
            district,
            location,
            district_id: matched.district_id,
            settlement_id: matched.settlement_id,
            land_status: detect_land_status(
                object.land_category.as_deref(),
                object.permitted_use.as_deref(),
            ),
            centroid: object.centroid,
            geometry_type: object.geometry_type().to_string(),
            has_contour: is_contour(&object.geometry),
            nspd_address: address.clone(),
            debug: ResolutionDebug {
                nspd_address: address,
                parsed,
                matched,
                candidates,
                used_prefix_fallback,
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::matching::settlement::{MatchStrategy, ReferenceTable};
    use crate::models::core::{District, Settlement};
    use serde_json::json;

    fn matcher() -> SettlementMatcher {
        let gurievsk = District {
            id: Uuid::from_u128(1),
            name: "Гурьевский городской округ".to_string(),
        };
        let settlements = vec![
            Settlement {
                id: Uuid::from_u128(10),
                name: "Шоссейное".to_string(),
                district_id: gurievsk.id,
            },
            Settlement {
                id: Uuid::from_u128(11),
                name: "Поддубное".to_string(),
                district_id: gurievsk.id,
            },
        ];
        SettlementMatcher::new(ReferenceTable::new(vec![gurievsk], settlements), MatchStrategy::FirstHit)
    }

    fn response(address: Option<&str>) -> NspdSearchResponse {
        serde_json::from_value(json!({
            "data": {
                "features": [{
                    "geometry": {
                        "type": "Polygon",
                        "coordinates": [[[2250000.0, 7260000.0], [2250100.0, 7260000.0], [2250100.0, 7260100.0], [2250000.0, 7260000.0]]]
                    },
                    "properties": {
                        "cadastral_number": "39:03:080808:562",
                        "address": address,
                        "utilization_id": "Для ведения личного подсобного хозяйства (ЛПХ)"
                    }
                }]
            }
        }))
        .unwrap()
    }

    #[test]
    fn test_resolves_district_and_settlement() {
        let resolver = LocationResolver::new(matcher(), false);
        let resolution = resolver
            .resolve_response(
                &response(Some("Калининградская обл, Гурьевский р-н, п Шоссейное")),
                "39:03:080808:562",
            )
            .unwrap();

        assert_eq!(resolution.district.as_deref(), Some("Гурьевский городской округ"));
        assert_eq!(resolution.location.as_deref(), Some("Шоссейное"));
        assert_eq!(resolution.settlement_id, Some(Uuid::from_u128(10)));
        assert_eq!(resolution.geometry_type, "Polygon");
        assert!(resolution.has_contour);
        assert!(resolution.centroid.is_some());
        assert_eq!(resolution.land_status, Some("ЛПХ"));
        assert_eq!(resolution.debug.parsed.detected_district_name, "Гурьевский");
        assert_eq!(resolution.debug.candidates.len(), 1);
    }

    #[test]
    fn test_empty_features_is_not_found() {
        let resolver = LocationResolver::new(matcher(), false);
        let empty: NspdSearchResponse = serde_json::from_value(json!({"data": {"features": []}})).unwrap();
        let err = resolver.resolve_response(&empty, "39:03:080808:999").unwrap_err();
        assert_eq!(err, ResolveError::NotFound);
        assert_eq!(err.to_string(), "No location resolved");
    }

    #[test]
    fn test_missing_address() {
        let resolver = LocationResolver::new(matcher(), false);
        let err = resolver
            .resolve_response(&response(None), "39:03:080808:562")
            .unwrap_err();
        assert_eq!(err, ResolveError::AddressMissing);
    }

    #[test]
    fn test_unmatched_address_is_not_found() {
        let resolver = LocationResolver::new(matcher(), false);
        let err = resolver
            .resolve_response(&response(Some("Калининградская обл, ул Лесная, 5")), "39:03:080808:562")
            .unwrap_err();
        assert_eq!(err, ResolveError::NotFound);
    }

    #[test]
    fn test_prefix_fallback_fills_district() {
        let resolver = LocationResolver::new(matcher(), true);
        let resolution = resolver
            .resolve_response(&response(Some("Калининградская обл, ул Лесная, 5")), "39:05:010101:10")
            .unwrap();
        assert_eq!(resolution.district.as_deref(), Some("Зеленоградский район"));
        assert_eq!(resolution.location, None);
        assert!(resolution.debug.used_prefix_fallback);
    }

    #[test]
    fn test_location_patch_skips_unchanged_fields() {
        let resolver = LocationResolver::new(matcher(), false);
        let resolution = resolver
            .resolve_response(
                &response(Some("Калининградская обл, Гурьевский р-н, п Шоссейное")),
                "39:03:080808:562",
            )
            .unwrap();

        let current = LocationFields {
            district: Some("Гурьевский городской округ".to_string()),
            location: Some("Шоссейное (старое)".to_string()),
        };
        let patch = resolution.location_patch(&current);
        assert_eq!(patch.district, None);
        assert_eq!(patch.location.as_deref(), Some("Шоссейное"));

        let settled = LocationFields {
            district: resolution.district.clone(),
            location: resolution.location.clone(),
        };
        assert!(resolution.location_patch(&settled).is_empty());
    }
}
