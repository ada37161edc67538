//! Upstream provider API
//!
//! Everything that talks to the provider's `player_api.php` endpoint: the
//! transport seam, the memoizing request cache and the typed client built on
//! top of it.

/// Memoizing request cache
pub mod cache;
/// Typed provider API calls
pub mod client;
/// reqwest-backed transport
pub mod http;
/// Provider payload records
pub mod models;

pub use cache::{CacheStats, RequestCache};
pub use client::{ConnectionCheck, XtreamClient};
pub use http::ReqwestTransport;

use crate::config::PlaylistConfig;
use async_trait::async_trait;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use thiserror::Error;

/// Errors that can occur while talking to the provider
#[derive(Debug, Error)]
pub enum UpstreamError {
    /// The request did not complete within the configured timeout
    #[error("Request timed out")]
    Timeout,
    /// Connection-level failure (DNS, refused, TLS)
    #[error("Network error: {0}")]
    Network(String),
    /// The provider answered with a non-success status on every attempt
    #[error("HTTP status {0}")]
    Status(u16),
    /// The provider answered 200 with an empty, non-JSON body
    #[error("Empty response body")]
    EmptyBody,
    /// The payload did not have the expected shape
    #[error("Unexpected payload: {0}")]
    Decode(String),
}

impl From<reqwest::Error> for UpstreamError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else {
            Self::Network(e.to_string())
        }
    }
}

/// Status and body of one HTTP exchange
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawResponse {
    /// HTTP status code
    pub status: u16,
    /// Response body as text
    pub body: String,
}

impl RawResponse {
    /// Build a response from its parts.
    #[must_use]
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    /// Whether the provider answered 200 OK.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        self.status == 200
    }
}

/// Interface for the HTTP layer beneath the request cache
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait UpstreamTransport: Send + Sync {
    /// Issue a GET with `params` as the query string.
    async fn get(&self, url: &str, params: &ApiParams) -> Result<RawResponse, UpstreamError>;
    /// Issue a POST with `params` as a form body.
    async fn post_form(&self, url: &str, params: &ApiParams) -> Result<RawResponse, UpstreamError>;
}

/// Provider API actions
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ApiAction {
    /// Live channel categories
    GetLiveCategories,
    /// Live channels, optionally scoped to a category
    GetLiveStreams,
    /// Movie categories
    GetVodCategories,
    /// Movies, optionally scoped to a category
    GetVodStreams,
    /// Series categories
    GetSeriesCategories,
    /// Series, optionally scoped to a category
    GetSeries,
    /// Seasons and episodes of one series
    GetSeriesInfo,
    /// Account and server summary
    GetAccountInfo,
}

impl ApiAction {
    /// Wire name of the action.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::GetLiveCategories => "get_live_categories",
            Self::GetLiveStreams => "get_live_streams",
            Self::GetVodCategories => "get_vod_categories",
            Self::GetVodStreams => "get_vod_streams",
            Self::GetSeriesCategories => "get_series_categories",
            Self::GetSeries => "get_series",
            Self::GetSeriesInfo => "get_series_info",
            Self::GetAccountInfo => "get_account_info",
        }
    }
}

/// Request parameter set of one provider call.
///
/// Backed by a sorted map so serialization is canonical regardless of the
/// order parameters were added in.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ApiParams(BTreeMap<String, String>);

impl ApiParams {
    /// Credentials of `config` plus the `action` parameter.
    #[must_use]
    pub fn for_action(config: &PlaylistConfig, action: ApiAction) -> Self {
        Self::default()
            .with("username", &config.username)
            .with("password", &config.password)
            .with("action", action.as_str())
    }

    /// Add or replace one parameter.
    #[must_use]
    pub fn with(mut self, key: &str, value: impl Into<String>) -> Self {
        self.0.insert(key.to_string(), value.into());
        self
    }

    /// Look up one parameter.
    #[must_use]
    pub fn get(&self, key: &str) -> Option<&str> {
        self.0.get(key).map(String::as_str)
    }

    /// Canonical key-sorted JSON form of the parameters.
    #[must_use]
    pub fn canonical(&self) -> String {
        serde_json::to_string(&self.0).unwrap_or_default()
    }

    /// SHA-256 hex fingerprint of `endpoint` and the canonical parameters.
    #[must_use]
    pub fn fingerprint(&self, endpoint: &str) -> String {
        let mut hasher = Sha256::new();
        hasher.update(endpoint.as_bytes());
        hasher.update(b"\n");
        hasher.update(self.canonical().as_bytes());
        hasher
            .finalize()
            .iter()
            .fold(String::with_capacity(64), |mut out, byte| {
                let _ = write!(out, "{byte:02x}");
                out
            })
    }
}

impl<K: Into<String>, V: Into<String>> FromIterator<(K, V)> for ApiParams {
    fn from_iter<I: IntoIterator<Item = (K, V)>>(iter: I) -> Self {
        Self(iter.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}
