// src/matching/address.rs
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};

/// Fragment markers of a district / municipal area.
const DISTRICT_MARKERS: [&str; 4] = ["р-н", "г.о.", "городской округ", "район"];

/// A fragment starting with one of these names a settlement.
const SETTLEMENT_PREFIXES: [&str; 7] = ["г ", "п ", "пос ", "с ", "д ", "ст-ца ", "х "];

/// A fragment containing one of these names a settlement as well.
const SETTLEMENT_INFIXES: [&str; 3] = [" г", " п ", " пос"];

static DISTRICT_MARKER_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"р-н|г\.о\.|городской округ|район").expect("static district marker regex"));

static SETTLEMENT_MARKER_RE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"г\.|п\.|пос\.|с\.|д\.|ст-ца|х\.|г |п |пос |с |д ").expect("static settlement marker regex")
});

static CITY_MARKER_RE: Lazy<Regex> = Lazy::new(|| Regex::new(r"г\.|г ").expect("static city marker regex"));

/// District and settlement hints pulled out of a free-text address.
/// Either may be empty.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParsedAddress {
    pub detected_district_name: String,
    pub detected_settlement_name: String,
}

impl ParsedAddress {
    pub fn is_empty(&self) -> bool {
        self.detected_district_name.is_empty() && self.detected_settlement_name.is_empty()
    }
}

fn is_district_fragment(fragment: &str) -> bool {
    DISTRICT_MARKERS.iter().any(|m| fragment.contains(m))
}

fn is_settlement_fragment(fragment: &str) -> bool {
    SETTLEMENT_PREFIXES.iter().any(|p| fragment.starts_with(p))
        || SETTLEMENT_INFIXES.iter().any(|i| fragment.contains(i))
}

/// Splits a comma-separated Russian postal address into district and
/// settlement candidates using marker words. Ambiguous fragments, such as
/// a street whose name starts with a settlement-type letter, are taken
/// as found.
pub fn parse_address(address: &str) -> ParsedAddress {
    let parts: Vec<&str> = address.split(',').map(str::trim).collect();
    let mut parsed = ParsedAddress::default();

    let district_part = parts.iter().copied().find(|p| is_district_fragment(p));
    if let Some(part) = district_part {
        parsed.detected_district_name = DISTRICT_MARKER_RE.replace_all(part, "").trim().to_string();
    }

    if let Some(part) = parts.iter().copied().find(|p| is_settlement_fragment(p)) {
        parsed.detected_settlement_name = SETTLEMENT_MARKER_RE.replace_all(part, "").trim().to_string();
    } else if district_part.is_none() && parts.len() > 2 {
        // City addresses usually carry no district fragment:
        // "Калининградская обл, г.Калининград, ..."
        let potential_city = parts[1];
        if potential_city.contains("г ") || potential_city.contains("г.") {
            parsed.detected_settlement_name =
                CITY_MARKER_RE.replace_all(potential_city, "").trim().to_string();
        }
    }

    parsed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_district_marker_after_name() {
        let parsed = parse_address("Калининградская обл, Гурьевский р-н, п Поддубное");
        assert_eq!(parsed.detected_district_name, "Гурьевский");
        assert_eq!(parsed.detected_settlement_name, "Поддубное");
    }

    #[test]
    fn test_district_marker_before_name() {
        let parsed = parse_address("Калининградская область, р-н Зеленоградский, п Коврово");
        assert_eq!(parsed.detected_district_name, "Зеленоградский");
        assert_eq!(parsed.detected_settlement_name, "Коврово");
    }

    #[test]
    fn test_district_markers_are_removed() {
        for address in [
            "Калининградская обл, Багратионовский р-н, с Нивенское",
            "Калининградская обл, р-н Полесский, д Красное",
            "Калининградская обл, Славский р-н",
        ] {
            let parsed = parse_address(address);
            assert!(!parsed.detected_district_name.is_empty(), "{}", address);
            assert!(!parsed.detected_district_name.contains("р-н"), "{}", address);
        }
    }

    #[test]
    fn test_settlement_prefix_is_removed() {
        for address in [
            "Калининградская обл, Гурьевский р-н, п Родники",
            "Калининградская обл, Зеленоградский р-н, п Мельниково, ул Лесная",
            "обл Калининградская, п Луговое",
        ] {
            let parsed = parse_address(address);
            assert!(!parsed.detected_settlement_name.starts_with("п "), "{}", address);
            assert!(!parsed.detected_settlement_name.starts_with('п'), "{}", address);
        }
    }

    #[test]
    fn test_okrug_fragment_is_ambiguous() {
        // " г" inside "городской" also reads as a settlement marker
        let parsed = parse_address("Калининградская обл, Светлогорский городской округ, пос. Приморье");
        assert_eq!(parsed.detected_district_name, "Светлогорский");
        assert_eq!(parsed.detected_settlement_name, "Светлогорский городской округ");
    }

    #[test]
    fn test_embedded_settlement_marker() {
        // Markers are stripped wherever they occur in the fragment
        let parsed = parse_address("Калининградская обл, Гвардейский р-н, Озерское с/п пос Озерки");
        assert_eq!(parsed.detected_district_name, "Гвардейский");
        assert_eq!(parsed.detected_settlement_name, "Озерское с/Озерки");
    }

    #[test]
    fn test_city_without_district() {
        let parsed = parse_address("Калининградская обл, г Калининград, ул Центральная");
        assert_eq!(parsed.detected_district_name, "");
        assert_eq!(parsed.detected_settlement_name, "Калининград");
    }

    #[test]
    fn test_city_fallback_on_second_fragment() {
        // "г.Светлый" has no separating space, so only the fallback sees it
        let parsed = parse_address("Калининградская обл, г.Светлый, ул Лесная");
        assert_eq!(parsed.detected_settlement_name, "Светлый");
    }

    #[test]
    fn test_city_fallback_needs_more_than_two_fragments() {
        let parsed = parse_address("Калининградская обл, г.Светлый");
        assert!(parsed.is_empty());
    }

    #[test]
    fn test_unrecognized_address() {
        assert!(parse_address("").is_empty());
        assert!(parse_address("Калининградская обл, ул Лесная, 5").is_empty());
    }
}
