// src/matching/cadastral.rs
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

use crate::error::CadastralParseError;

/// Cadastral district of the region, keyed by the two leading segments.
const CADASTRAL_PREFIX_TO_DISTRICT: [(&str, &str); 22] = [
    ("39:01", "Багратионовский район"),
    ("39:02", "Гвардейский район"),
    ("39:03", "Гурьевский городской округ"),
    ("39:04", "Гусевский городской округ"),
    ("39:05", "Зеленоградский район"),
    ("39:06", "Краснознаменский городской округ"),
    ("39:07", "Неманский городской округ"),
    ("39:08", "Нестеровский район"),
    ("39:09", "Озерский городской округ"),
    ("39:10", "Полесский район"),
    ("39:11", "Правдинский район"),
    ("39:12", "Славский район"),
    ("39:13", "Советский городской округ"),
    ("39:14", "Черняховский городской округ"),
    ("39:15", "Калининград"),
    ("39:16", "Балтийский городской округ"),
    ("39:17", "Светлогорский городской округ"),
    ("39:18", "Пионерский городской округ"),
    ("39:19", "Светловский городской округ"),
    ("39:20", "Ладушкинский городской округ"),
    ("39:21", "Мамоновский городской округ"),
    ("39:22", "Янтарный городской округ"),
];

/// Spelling variants seen in registry and geocoder output. Canonical
/// names map to themselves through the fallthrough.
const DISTRICT_ALIASES: [(&str, &str); 10] = [
    ("городской округ Янтарный", "Янтарный городской округ"),
    ("Янтарный", "Янтарный городской округ"),
    ("Зеленоградский городской округ", "Зеленоградский район"),
    ("Гурьевский район", "Гурьевский городской округ"),
    ("Светлогорский район", "Светлогорский городской округ"),
    ("Светлый городской округ", "Светловский городской округ"),
    ("Балтийский район", "Балтийский городской округ"),
    ("городской округ Калининград", "Калининград"),
    ("город Калининград", "Калининград"),
    ("г. Калининград", "Калининград"),
];

/// Leading `region:district` digits; the rest of the number is not checked.
static REGION_PREFIX_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^(\d+:\d+)").expect("valid region prefix regex"));

/// Suffixes dropped before a loose district comparison.
static DISTRICT_KIND_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"городской округ|район").expect("valid district kind regex"));

/// A parsed `XX:XX:XXXXXX:XXXX` registry number.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CadastralNumber {
    segments: Vec<String>,
    last_number: u64,
}

impl CadastralNumber {
    pub fn parse(raw: &str) -> Result<Self, CadastralParseError> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(CadastralParseError::Empty);
        }

        let segments: Vec<String> = trimmed.split(':').map(|s| s.trim().to_string()).collect();
        let well_formed = segments.len() >= 2
            && segments
                .iter()
                .all(|s| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit()));
        if !well_formed {
            return Err(CadastralParseError::InvalidFormat(trimmed.to_string()));
        }

        let last_number = segments
            .last()
            .and_then(|s| s.parse::<u64>().ok())
            .ok_or_else(|| CadastralParseError::InvalidFormat(trimmed.to_string()))?;

        Ok(Self {
            segments,
            last_number,
        })
    }

    /// First two segments, e.g. `39:03`.
    pub fn region_prefix(&self) -> String {
        self.segments
            .iter()
            .take(2)
            .cloned()
            .collect::<Vec<_>>()
            .join(":")
    }

    /// Every segment except the last, e.g. `39:03:080808`.
    pub fn block_prefix(&self) -> String {
        self.segments[..self.segments.len() - 1].join(":")
    }

    pub fn last_number(&self) -> u64 {
        self.last_number
    }

    /// Numeric distance of the last segments, or `None` across blocks.
    pub fn distance_to(&self, other: &CadastralNumber) -> Option<u64> {
        if self.block_prefix() == other.block_prefix() {
            Some(self.last_number.abs_diff(other.last_number))
        } else {
            None
        }
    }
}

impl fmt::Display for CadastralNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.segments.join(":"))
    }
}

impl FromStr for CadastralNumber {
    type Err = CadastralParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl Serialize for CadastralNumber {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

pub fn district_by_region_prefix(prefix: &str) -> Option<&'static str> {
    CADASTRAL_PREFIX_TO_DISTRICT
        .iter()
        .find(|(p, _)| *p == prefix)
        .map(|(_, district)| *district)
}

pub fn district_by_cadastral_prefix(number: &CadastralNumber) -> Option<&'static str> {
    district_by_region_prefix(&number.region_prefix())
}

/// `39:03` out of `39:03:080808:ЗУ1`. Only the two leading segments
/// have to be numeric.
pub fn cadastral_region_prefix(raw: &str) -> Option<String> {
    REGION_PREFIX_RE
        .captures(raw.trim())
        .map(|caps| caps[1].to_string())
}

/// District for a raw cadastral string, keyed by its region prefix.
pub fn district_for_cadastral(raw: &str) -> Option<&'static str> {
    cadastral_region_prefix(raw).and_then(|prefix| district_by_region_prefix(&prefix))
}

pub fn normalize_district_name(name: &str) -> String {
    let trimmed = name.trim();
    DISTRICT_ALIASES
        .iter()
        .find(|(alias, _)| *alias == trimmed)
        .map(|(_, canonical)| canonical.to_string())
        .unwrap_or_else(|| trimmed.to_string())
}

fn loose_district_key(name: &str) -> String {
    let lowered = name.to_lowercase();
    DISTRICT_KIND_RE
        .replace_all(&lowered, "")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Whether a stored district names the same area as `expected`: equal,
/// a known alias, or equal once "район" / "городской округ" are dropped
/// ("Гусевский район" vs "Гусевский городской округ").
pub fn districts_match(actual: &str, expected: &str) -> bool {
    let actual = actual.trim();
    if actual.is_empty() {
        return false;
    }
    actual == expected
        || normalize_district_name(actual) == expected
        || loose_district_key(actual) == loose_district_key(expected)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_number() {
        let number = CadastralNumber::parse(" 39:03:080808:562 ").unwrap();
        assert_eq!(number.region_prefix(), "39:03");
        assert_eq!(number.block_prefix(), "39:03:080808");
        assert_eq!(number.last_number(), 562);
        assert_eq!(number.to_string(), "39:03:080808:562");
        assert_eq!(district_by_cadastral_prefix(&number), Some("Гурьевский городской округ"));
    }

    #[test]
    fn test_parse_errors() {
        assert_eq!(CadastralNumber::parse("  "), Err(CadastralParseError::Empty));
        assert!(matches!(
            CadastralNumber::parse("39:03:080808:56a"),
            Err(CadastralParseError::InvalidFormat(_))
        ));
        assert!(CadastralNumber::parse("39").is_err());
        assert!(CadastralNumber::parse("39::1").is_err());
        assert!("39:03:080808:ЗУ1".parse::<CadastralNumber>().is_err());
    }

    #[test]
    fn test_distance_requires_same_block() {
        let a = CadastralNumber::parse("39:03:080808:562").unwrap();
        let b = CadastralNumber::parse("39:03:080808:542").unwrap();
        let c = CadastralNumber::parse("39:03:080809:560").unwrap();
        assert_eq!(a.distance_to(&b), Some(20));
        assert_eq!(b.distance_to(&a), Some(20));
        assert_eq!(a.distance_to(&c), None);
    }

    #[test]
    fn test_district_by_prefix() {
        assert_eq!(district_for_cadastral("39:03:080808:562"), Some("Гурьевский городской округ"));
        assert_eq!(district_for_cadastral("39:15:000000:1"), Some("Калининград"));
        assert_eq!(district_for_cadastral("39:22:010005:852"), Some("Янтарный городской округ"));
        assert_eq!(district_for_cadastral("47:01:000000:1"), None);
        assert_eq!(district_for_cadastral("garbage"), None);
    }

    #[test]
    fn test_district_ignores_last_segment_format() {
        assert_eq!(cadastral_region_prefix("39:03:080808:ЗУ1").as_deref(), Some("39:03"));
        assert_eq!(district_for_cadastral(" 39:03:080808:ЗУ1"), Some("Гурьевский городской округ"));
        assert_eq!(district_for_cadastral("39:05"), Some("Зеленоградский район"));
        assert_eq!(cadastral_region_prefix("КН 39:03:080808:1"), None);
    }

    #[test]
    fn test_districts_match() {
        assert!(districts_match("Гурьевский городской округ", "Гурьевский городской округ"));
        assert!(districts_match("Гурьевский район", "Гурьевский городской округ"));
        assert!(districts_match("г. Калининград", "Калининград"));
        assert!(districts_match("Гусевский район", "Гусевский городской округ"));
        assert!(districts_match(" Багратионовский  городской округ", "Багратионовский район"));
        assert!(!districts_match("Зеленоградский район", "Гурьевский городской округ"));
        assert!(!districts_match("  ", "Калининград"));
    }

    #[test]
    fn test_normalize_district_name() {
        assert_eq!(normalize_district_name("Гурьевский район"), "Гурьевский городской округ");
        assert_eq!(normalize_district_name("городской округ Калининград"), "Калининград");
        assert_eq!(normalize_district_name(" Янтарный "), "Янтарный городской округ");
        assert_eq!(normalize_district_name("Славский район"), "Славский район");
        assert_eq!(normalize_district_name("Неизвестный"), "Неизвестный");
    }
}
