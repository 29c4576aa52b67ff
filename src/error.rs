// src/error.rs
use thiserror::Error;

/// Failures of a single cadastral lookup. None of these abort a batch;
/// callers record `to_string()` against the parcel and move on.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ResolveError {
    #[error("No location resolved")]
    NotFound,
    #[error("API Error: {status}")]
    Http { status: u16 },
    #[error("Network error: {0}")]
    Network(String),
    #[error("Request timed out after {0}s")]
    Timeout(u64),
    #[error("Malformed registry response: {0}")]
    MalformedResponse(String),
    #[error("Geometry not found")]
    GeometryMissing,
    #[error("Address not found in registry response")]
    AddressMissing,
}

impl ResolveError {
    pub fn from_reqwest(err: reqwest::Error, timeout_secs: u64) -> Self {
        if err.is_timeout() {
            ResolveError::Timeout(timeout_secs)
        } else if err.is_decode() {
            ResolveError::MalformedResponse(err.to_string())
        } else if let Some(status) = err.status() {
            ResolveError::Http {
                status: status.as_u16(),
            }
        } else {
            ResolveError::Network(err.to_string())
        }
    }
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CadastralParseError {
    #[error("empty cadastral number")]
    Empty,
    #[error("invalid cadastral number '{0}': expected digit groups separated by ':'")]
    InvalidFormat(String),
}

#[derive(Debug, Error)]
pub enum MappingError {
    #[error("line {line}: invalid bundle mapping JSON: {source}")]
    InvalidJson {
        line: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("line {line}: bundle mapping has an empty 'main' cadastral number")]
    MissingMain { line: usize },
}
