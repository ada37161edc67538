//! Memoizing cache in front of the provider API
//!
//! Responses are keyed by the SHA-256 fingerprint of the endpoint and the
//! key-sorted request parameters, and expire after a fixed time-to-live.
//! Only structured (JSON) responses are memoized.

use super::{ApiParams, UpstreamError, UpstreamTransport};
use crate::config::PlaylistConfig;
use moka::future::Cache;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Counters exposed for the admin statistics view
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Every `fetch` call, hit or miss
    pub total_requests: u64,
    /// Calls answered from the cache
    pub cache_hits: u64,
    /// Entries currently cached
    pub entries: u64,
}

/// TTL cache wrapping every outbound provider call.
#[derive(Clone)]
pub struct RequestCache {
    transport: Arc<dyn UpstreamTransport>,
    /// Moka cache storing fingerprint -> decoded payload with automatic TTL
    cache: Cache<String, Arc<Value>>,
    total_requests: Arc<AtomicU64>,
    cache_hits: Arc<AtomicU64>,
}

impl RequestCache {
    /// Creates a cache over `transport`.
    ///
    /// # Arguments
    ///
    /// * `transport` - HTTP layer used on cache misses
    /// * `ttl` - How long a decoded response stays valid
    /// * `max_capacity` - Maximum number of cached responses
    #[must_use]
    pub fn new(transport: Arc<dyn UpstreamTransport>, ttl: Duration, max_capacity: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(ttl)
            .build();

        Self {
            transport,
            cache,
            total_requests: Arc::new(AtomicU64::new(0)),
            cache_hits: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Fetch a payload, failing soft.
    ///
    /// Returns `None` on any transport or decoding failure; the failure is
    /// logged and the cache is left untouched.
    pub async fn fetch(&self, config: &PlaylistConfig, params: &ApiParams) -> Option<Arc<Value>> {
        match self.try_fetch(config, params).await {
            Ok(payload) => Some(payload),
            Err(e) => {
                warn!(
                    action = params.get("action").unwrap_or("unknown"),
                    "Upstream request failed: {e}"
                );
                None
            }
        }
    }

    /// Fetch a payload, reporting why it could not be obtained.
    ///
    /// On a cache miss issues a GET; a non-200 answer is retried once as a
    /// POST with the same parameters in the form body. A 200 answer that is
    /// not JSON but has a body is passed through as
    /// `{"status": "ok", "raw_data": <body>}` and is not cached.
    ///
    /// # Errors
    ///
    /// Returns `UpstreamError` on timeout, connection failure, a non-200
    /// answer to both attempts, or an empty non-JSON body.
    pub async fn try_fetch(
        &self,
        config: &PlaylistConfig,
        params: &ApiParams,
    ) -> Result<Arc<Value>, UpstreamError> {
        self.total_requests.fetch_add(1, Ordering::Relaxed);

        let key = params.fingerprint(&config.api_url);
        if let Some(hit) = self.cache.get(&key).await {
            self.cache_hits.fetch_add(1, Ordering::Relaxed);
            debug!(action = params.get("action").unwrap_or("unknown"), "Cache hit");
            return Ok(hit);
        }

        let mut response = self.transport.get(&config.api_url, params).await?;
        if !response.is_ok() {
            debug!(status = response.status, "GET rejected, retrying with POST");
            response = self.transport.post_form(&config.api_url, params).await?;
            if !response.is_ok() {
                return Err(UpstreamError::Status(response.status));
            }
        }

        match serde_json::from_str::<Value>(&response.body) {
            Ok(decoded) => {
                let decoded = Arc::new(decoded);
                self.cache.insert(key, Arc::clone(&decoded)).await;
                Ok(decoded)
            }
            Err(_) if !response.body.trim().is_empty() => {
                debug!("Response is not JSON, passing raw body through");
                Ok(Arc::new(json!({ "status": "ok", "raw_data": response.body })))
            }
            Err(_) => Err(UpstreamError::EmptyBody),
        }
    }

    /// Drop every cached response and return how many were removed.
    pub async fn clear(&self) -> u64 {
        self.cache.run_pending_tasks().await;
        let removed = self.cache.entry_count();
        self.cache.invalidate_all();
        self.cache.run_pending_tasks().await;
        removed
    }

    /// Current counters.
    pub async fn stats(&self) -> CacheStats {
        self.cache.run_pending_tasks().await;
        CacheStats {
            total_requests: self.total_requests.load(Ordering::Relaxed),
            cache_hits: self.cache_hits.load(Ordering::Relaxed),
            entries: self.cache.entry_count(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upstream::{ApiAction, MockUpstreamTransport, RawResponse};

    fn config() -> PlaylistConfig {
        PlaylistConfig::new("http://x.tv", "u1", "p1")
    }

    fn params() -> ApiParams {
        ApiParams::for_action(&config(), ApiAction::GetLiveCategories)
    }

    fn cache_over(mock: MockUpstreamTransport, ttl: Duration) -> RequestCache {
        RequestCache::new(Arc::new(mock), ttl, 100)
    }

    #[tokio::test]
    async fn test_hit_skips_network() {
        let mut mock = MockUpstreamTransport::new();
        mock.expect_get()
            .times(1)
            .returning(|_, _| Ok(RawResponse::new(200, r#"[{"category_id":"1"}]"#)));
        let cache = cache_over(mock, Duration::from_secs(3600));

        let first = cache.fetch(&config(), &params()).await;
        let second = cache.fetch(&config(), &params()).await;

        assert_eq!(first, second);
        assert!(first.is_some());
        let stats = cache.stats().await;
        assert_eq!(stats.total_requests, 2);
        assert_eq!(stats.cache_hits, 1);
        assert_eq!(stats.entries, 1);
    }

    #[tokio::test]
    async fn test_parameter_order_does_not_change_key() {
        let mut mock = MockUpstreamTransport::new();
        mock.expect_get()
            .times(1)
            .returning(|_, _| Ok(RawResponse::new(200, "{}")));
        let cache = cache_over(mock, Duration::from_secs(3600));

        let a: ApiParams = [("action", "get_series"), ("username", "u1")]
            .into_iter()
            .collect();
        let b = ApiParams::default()
            .with("username", "u1")
            .with("action", "get_series");

        assert!(cache.fetch(&config(), &a).await.is_some());
        assert!(cache.fetch(&config(), &b).await.is_some());
    }

    #[tokio::test]
    async fn test_expired_entry_is_refetched() {
        let mut mock = MockUpstreamTransport::new();
        mock.expect_get()
            .times(2)
            .returning(|_, _| Ok(RawResponse::new(200, "[]")));
        let cache = cache_over(mock, Duration::from_millis(150));

        assert!(cache.fetch(&config(), &params()).await.is_some());
        tokio::time::sleep(Duration::from_millis(300)).await;
        assert!(cache.fetch(&config(), &params()).await.is_some());

        assert_eq!(cache.stats().await.cache_hits, 0);
    }

    #[tokio::test]
    async fn test_get_failure_falls_back_to_post() {
        let mut mock = MockUpstreamTransport::new();
        mock.expect_get()
            .times(1)
            .returning(|_, _| Ok(RawResponse::new(405, "method not allowed")));
        mock.expect_post_form()
            .times(1)
            .returning(|_, _| Ok(RawResponse::new(200, r#"{"user_info":{}}"#)));
        let cache = cache_over(mock, Duration::from_secs(3600));

        let payload = cache.fetch(&config(), &params()).await;
        assert_eq!(payload.as_deref(), Some(&json!({ "user_info": {} })));

        // Served from cache now, so neither expectation is hit again
        assert!(cache.fetch(&config(), &params()).await.is_some());
    }

    #[tokio::test]
    async fn test_both_methods_failing_is_absent() {
        let mut mock = MockUpstreamTransport::new();
        mock.expect_get()
            .returning(|_, _| Ok(RawResponse::new(500, "")));
        mock.expect_post_form()
            .returning(|_, _| Ok(RawResponse::new(503, "")));
        let cache = cache_over(mock, Duration::from_secs(3600));

        let err = cache
            .try_fetch(&config(), &params())
            .await
            .expect_err("both attempts failed");
        assert!(matches!(err, UpstreamError::Status(503)));
        assert!(cache.fetch(&config(), &params()).await.is_none());
    }

    #[tokio::test]
    async fn test_non_json_body_passes_through_uncached() {
        let mut mock = MockUpstreamTransport::new();
        mock.expect_get()
            .times(2)
            .returning(|_, _| Ok(RawResponse::new(200, "#EXTM3U")));
        let cache = cache_over(mock, Duration::from_secs(3600));

        let payload = cache.fetch(&config(), &params()).await;
        assert_eq!(
            payload.as_deref(),
            Some(&json!({ "status": "ok", "raw_data": "#EXTM3U" }))
        );
        assert!(cache.fetch(&config(), &params()).await.is_some());
        assert_eq!(cache.stats().await.entries, 0);
    }

    #[tokio::test]
    async fn test_empty_body_is_absent() {
        let mut mock = MockUpstreamTransport::new();
        mock.expect_get()
            .returning(|_, _| Ok(RawResponse::new(200, "  ")));
        let cache = cache_over(mock, Duration::from_secs(3600));

        assert!(cache.fetch(&config(), &params()).await.is_none());
    }

    #[tokio::test]
    async fn test_transport_error_leaves_cache_untouched() {
        let mut mock = MockUpstreamTransport::new();
        mock.expect_get().returning(|_, _| Err(UpstreamError::Timeout));
        mock.expect_post_form().never();
        let cache = cache_over(mock, Duration::from_secs(3600));

        assert!(cache.fetch(&config(), &params()).await.is_none());
        let stats = cache.stats().await;
        assert_eq!(stats.total_requests, 1);
        assert_eq!(stats.entries, 0);
    }

    #[tokio::test]
    async fn test_clear_reports_removed_entries() {
        let mut mock = MockUpstreamTransport::new();
        mock.expect_get()
            .returning(|_, _| Ok(RawResponse::new(200, "[]")));
        let cache = cache_over(mock, Duration::from_secs(3600));

        cache.fetch(&config(), &params()).await;
        cache
            .fetch(&config(), &params().with("category_id", "3"))
            .await;

        assert_eq!(cache.clear().await, 2);
        assert_eq!(cache.stats().await.entries, 0);
    }
}
