// src/nspd/client.rs
use anyhow::{Context, Result};
use log::{debug, info, warn};
use once_cell::sync::Lazy;
use regex::Regex;
use reqwest::header::{self, HeaderMap, HeaderValue};
use std::env;
use std::time::Duration;
use url::Url;

use super::geometry::centroid_wgs84;
use super::schemas::{CadastralObject, NspdSearchResponse};
use crate::error::ResolveError;
use crate::utils::constants::{
    NSPD_ACCEPT_LANGUAGE, NSPD_DEFAULT_BASE_URL, NSPD_DEFAULT_TIMEOUT_SECS, NSPD_ORIGIN,
    NSPD_REFERER, NSPD_USER_AGENT, RESOLVE_DEFAULT_DELAY_MS,
};

static PROXY_PASSWORD: Lazy<Regex> =
    Lazy::new(|| Regex::new(r":[^:@]+@").expect("static proxy mask regex"));

#[derive(Debug, Clone)]
pub struct NspdConfig {
    pub base_url: String,
    /// Raw proxy setting as given by the operator.
    pub proxy: Option<String>,
    pub timeout_secs: u64,
    pub accept_invalid_certs: bool,
    /// Courtesy pause between consecutive registry calls.
    pub request_delay_ms: u64,
}

impl Default for NspdConfig {
    fn default() -> Self {
        Self {
            base_url: NSPD_DEFAULT_BASE_URL.to_string(),
            proxy: None,
            timeout_secs: NSPD_DEFAULT_TIMEOUT_SECS,
            accept_invalid_certs: true,
            request_delay_ms: RESOLVE_DEFAULT_DELAY_MS,
        }
    }
}

impl NspdConfig {
    pub fn from_env() -> Self {
        Self {
            base_url: env::var("NSPD_BASE_URL")
                .ok()
                .filter(|s| !s.trim().is_empty())
                .unwrap_or_else(|| NSPD_DEFAULT_BASE_URL.to_string()),
            proxy: env::var("NSPD_PROXY").ok().filter(|s| !s.trim().is_empty()),
            timeout_secs: env::var("NSPD_TIMEOUT_SECS")
                .unwrap_or_else(|_| NSPD_DEFAULT_TIMEOUT_SECS.to_string())
                .parse()
                .unwrap_or(NSPD_DEFAULT_TIMEOUT_SECS),
            accept_invalid_certs: env::var("NSPD_ACCEPT_INVALID_CERTS")
                .unwrap_or_else(|_| "true".to_string())
                .parse()
                .unwrap_or(true),
            request_delay_ms: env::var("NSPD_REQUEST_DELAY_MS")
                .unwrap_or_else(|_| RESOLVE_DEFAULT_DELAY_MS.to_string())
                .parse()
                .unwrap_or(RESOLVE_DEFAULT_DELAY_MS),
        }
    }
}

/// Turns `host:port`, `user:pass@host:port` or `host:port:user:pass` into
/// an `http://` proxy URL. Explicit `http(s)://` URLs are kept as given.
pub fn normalize_proxy_url(raw: &str) -> Result<String> {
    let mut proxy = raw.trim().to_string();

    let parts: Vec<&str> = proxy.split(':').collect();
    if parts.len() == 4 && !proxy.contains('@') {
        proxy = format!("http://{}:{}@{}:{}", parts[2], parts[3], parts[0], parts[1]);
    }
    if !proxy.starts_with("http://") && !proxy.starts_with("https://") {
        proxy = format!("http://{}", proxy);
    }

    Url::parse(&proxy)
        .with_context(|| format!("Invalid proxy setting '{}'", mask_proxy_credentials(&proxy)))?;
    Ok(proxy)
}

pub fn mask_proxy_credentials(proxy_url: &str) -> String {
    PROXY_PASSWORD.replace(proxy_url, ":***@").into_owned()
}

/// Maps registry land category / permitted use onto the catalog's
/// land-status labels.
pub fn detect_land_status(land_category: Option<&str>, permitted_use: Option<&str>) -> Option<&'static str> {
    let category = land_category.unwrap_or("").to_lowercase();
    let usage = permitted_use.unwrap_or("").to_lowercase();

    if usage.contains("индивидуальное жилищное строительство") || usage.contains("ижс") {
        return Some("ИЖС");
    }
    if usage.contains("личное подсобное хозяйство") || usage.contains("лпх") {
        return Some("ЛПХ");
    }
    if usage.contains("садоводство") || usage.contains("снт") || usage.contains("дачное") {
        if usage.contains("дачное") {
            return Some("ДНП");
        }
        return Some("СНТ");
    }
    if category.contains("населенных пунктов") && usage.is_empty() {
        return Some("ИЖС");
    }
    None
}

/// Builds the registry object out of a search response. The first feature
/// wins; a missing feature is `NotFound`, a missing geometry `GeometryMissing`.
pub fn object_from_response(
    response: &NspdSearchResponse,
    cadastral_number: &str,
) -> Result<CadastralObject, ResolveError> {
    let feature = response.first_feature().ok_or(ResolveError::NotFound)?;
    let geometry = feature
        .geometry
        .clone()
        .ok_or(ResolveError::GeometryMissing)?;
    let props = &feature.properties;

    Ok(CadastralObject {
        cadastral_number: props
            .cadastral_number
            .clone()
            .unwrap_or_else(|| cadastral_number.to_string()),
        address: props.address.clone(),
        centroid: centroid_wgs84(&geometry),
        geometry,
        land_category: props.category_id.clone(),
        permitted_use: props.utilization_id.clone(),
        area: props.area_value,
        area_unit: props.area_unit.clone(),
    })
}

pub struct NspdClient {
    http: reqwest::Client,
    config: NspdConfig,
}

impl NspdClient {
    pub fn new(config: NspdConfig) -> Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(header::ACCEPT, HeaderValue::from_static("*/*"));
        headers.insert(header::ACCEPT_LANGUAGE, HeaderValue::from_static(NSPD_ACCEPT_LANGUAGE));
        headers.insert(header::REFERER, HeaderValue::from_static(NSPD_REFERER));
        headers.insert(header::ORIGIN, HeaderValue::from_static(NSPD_ORIGIN));

        let mut builder = reqwest::Client::builder()
            .user_agent(NSPD_USER_AGENT)
            .default_headers(headers)
            .timeout(Duration::from_secs(config.timeout_secs))
            .danger_accept_invalid_certs(config.accept_invalid_certs);

        if let Some(raw) = &config.proxy {
            let proxy_url = normalize_proxy_url(raw)?;
            let proxy = reqwest::Proxy::all(&proxy_url).context("Failed to configure NSPD proxy")?;
            builder = builder.proxy(proxy);
            info!("🌐 NSPD proxy configured: {}", mask_proxy_credentials(&proxy_url));
        }
        if config.accept_invalid_certs {
            debug!("NSPD certificate verification disabled");
        }

        let http = builder.build().context("Failed to build NSPD HTTP client")?;
        Ok(Self { http, config })
    }

    pub fn from_env() -> Result<Self> {
        Self::new(NspdConfig::from_env())
    }

    pub fn config(&self) -> &NspdConfig {
        &self.config
    }

    pub async fn search(&self, cadastral_number: &str) -> Result<NspdSearchResponse, ResolveError> {
        let timeout = self.config.timeout_secs;
        let response = self
            .http
            .get(&self.config.base_url)
            .query(&[("query", cadastral_number)])
            .send()
            .await
            .map_err(|e| ResolveError::from_reqwest(e, timeout))?;

        let status = response.status();
        if !status.is_success() {
            warn!("NSPD returned {} for {}", status, cadastral_number);
            return Err(ResolveError::Http {
                status: status.as_u16(),
            });
        }

        let body = response
            .text()
            .await
            .map_err(|e| ResolveError::from_reqwest(e, timeout))?;
        serde_json::from_str(&body).map_err(|e| ResolveError::MalformedResponse(e.to_string()))
    }

    pub async fn fetch_object(&self, cadastral_number: &str) -> Result<CadastralObject, ResolveError> {
        let response = self.search(cadastral_number).await?;
        object_from_response(&response, cadastral_number)
    }

    /// Sleeps for the configured courtesy delay, or `override_ms` if given.
    pub async fn pause(&self, override_ms: Option<u64>) {
        let ms = override_ms.unwrap_or(self.config.request_delay_ms);
        if ms > 0 {
            tokio::time::sleep(Duration::from_millis(ms)).await;
        }
    }
}
