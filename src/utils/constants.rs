// src/utils/constants.rs

/// Public cadastral map search endpoint; the cadastral number goes into
/// the `query` parameter.
pub const NSPD_DEFAULT_BASE_URL: &str = "https://nspd.gov.ru/api/geoportal/v2/search/geoportal";

pub const NSPD_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/132.0.0.0 Safari/537.36";
pub const NSPD_ACCEPT_LANGUAGE: &str = "ru-RU,ru;q=0.9,en-US;q=0.8,en;q=0.7";
pub const NSPD_REFERER: &str = "https://nspd.gov.ru/map?thematic=PKK&zoom=16&active_layers=36049";
pub const NSPD_ORIGIN: &str = "https://nspd.gov.ru";

pub const NSPD_DEFAULT_TIMEOUT_SECS: u64 = 5;

/// Half the equator length of the spherical Mercator plane (EPSG:3857), meters.
pub const WEB_MERCATOR_HALF_EXTENT: f64 = 20037508.34;

/// Secondary parcels link to a primary only when their trailing cadastral
/// numbers differ by at most this much.
pub const MAX_BUNDLE_CADASTRAL_DISTANCE: u64 = 20;

pub const RESOLVE_DEFAULT_LIMIT: i64 = 200;
pub const RESOLVE_MAX_LIMIT: i64 = 200;
pub const RESOLVE_DEFAULT_DELAY_MS: u64 = 500;
pub const RESOLVE_MAX_DELAY_MS: u64 = 3000;

/// Delay between registry calls in the bulk geometry sync.
pub const GEOMETRY_SYNC_DELAY_MS: u64 = 1500;

/// Title markers of a lot split into several parcels.
pub const BUNDLE_MAIN_MARKER: &str = "главный";
pub const BUNDLE_ADDITIONAL_MARKER: &str = "дополнительный";
