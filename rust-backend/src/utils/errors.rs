// src/utils/errors.rs

use std::{error::Error, fmt};
use reqwest;
use serde_json;

/// Errors coming from upstream market-data calls (HTTP, JSON, status).
#[derive(Debug)]
pub enum ApiError {
    Http(reqwest::Error),
    Json(serde_json::Error),
    Status(u16),
    Other(String),
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::Http(e)     => write!(f, "HTTP error: {}", e),
            ApiError::Json(e)     => write!(f, "JSON error: {}", e),
            ApiError::Status(s)   => write!(f, "upstream returned status {}", s),
            ApiError::Other(msg)  => write!(f, "{}", msg),
        }
    }
}

impl Error for ApiError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            ApiError::Http(e)   => Some(e),
            ApiError::Json(e)   => Some(e),
            ApiError::Status(_) => None,
            ApiError::Other(_)  => None,
        }
    }
}

// Conversions from underlying errors into ApiError
impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self { ApiError::Http(err) }
}
impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self { ApiError::Json(err) }
}

/// Pipeline stage a query failed in. Carried for logs and metrics only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    FetchTickers,
    FetchCandles,
    Rank,
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Stage::FetchTickers => "fetch_tickers",
            Stage::FetchCandles => "fetch_candles",
            Stage::Rank         => "rank",
        };
        f.write_str(s)
    }
}

/// Query-level failures surfaced to callers of `Scanner::query`.
///
/// Never carries the upstream body; the detail is logged where the
/// failure is first observed. `Clone` so it can travel through a shared
/// in-flight future.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ScanError {
    #[error("malformed upstream payload for `{key}` at {stage}")]
    MalformedInput { key: String, stage: Stage },

    #[error("upstream unavailable for `{key}` at {stage}")]
    UpstreamUnavailable { key: String, stage: Stage },

    #[error("upstream timed out after {secs}s for `{key}` at {stage}")]
    Timeout { key: String, stage: Stage, secs: u64 },
}

impl ScanError {
    pub fn key(&self) -> &str {
        match self {
            ScanError::MalformedInput { key, .. }
            | ScanError::UpstreamUnavailable { key, .. }
            | ScanError::Timeout { key, .. } => key,
        }
    }

    pub fn stage(&self) -> Stage {
        match self {
            ScanError::MalformedInput { stage, .. }
            | ScanError::UpstreamUnavailable { stage, .. }
            | ScanError::Timeout { stage, .. } => *stage,
        }
    }
}
