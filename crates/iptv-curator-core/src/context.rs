//! Process-wide application state
//!
//! Built once at startup and shared with every handler behind an `Arc`.

use crate::aggregator::Aggregator;
use crate::config::CoreSettings;
use crate::playlist::{spawn_cleanup_task, PlaylistExporter};
use crate::rate_limit::RateLimiter;
use crate::selection::SelectionStore;
use crate::upstream::{ReqwestTransport, RequestCache, UpstreamTransport, XtreamClient};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::info;

/// Counters shown on the admin statistics view
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct GlobalStats {
    /// Upstream fetches, hits included
    pub total_requests: u64,
    /// Fetches answered from the cache
    pub cache_hits: u64,
    /// Entries currently cached
    pub cache_size: u64,
    /// Users with a selection record
    pub active_users: usize,
    /// Items selected across all users
    pub selections: usize,
    /// Time since the context was built
    pub uptime: Duration,
}

impl GlobalStats {
    /// Share of requests served from the cache, in percent.
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn hit_rate(&self) -> f64 {
        if self.total_requests == 0 {
            0.0
        } else {
            self.cache_hits as f64 * 100.0 / self.total_requests as f64
        }
    }
}

/// Everything a handler needs
pub struct AppContext {
    /// Loaded settings
    pub settings: CoreSettings,
    /// Typed provider client
    pub client: XtreamClient,
    /// Per-user throttle
    pub rate_limiter: RateLimiter,
    /// Curated selections
    pub selections: Arc<SelectionStore>,
    /// Category and single-item adds
    pub aggregator: Aggregator,
    /// M3U writer
    pub exporter: PlaylistExporter,
    started_at: Instant,
}

impl AppContext {
    /// Context talking to real providers over HTTP.
    #[must_use]
    pub fn new(settings: CoreSettings) -> Self {
        let api = Arc::new(ReqwestTransport::new(settings.http_timeout()));
        let direct = Arc::new(ReqwestTransport::new(settings.connection_test_timeout()));
        Self::with_transports(settings, api, direct)
    }

    /// Context over arbitrary transports; `direct` serves connection tests.
    #[must_use]
    pub fn with_transports(
        settings: CoreSettings,
        api: Arc<dyn UpstreamTransport>,
        direct: Arc<dyn UpstreamTransport>,
    ) -> Self {
        let cache = RequestCache::new(api, settings.cache_ttl(), settings.cache_max_entries);
        let client = XtreamClient::new(cache, direct);
        let selections = Arc::new(SelectionStore::new());
        let aggregator = Aggregator::new(client.clone(), Arc::clone(&selections));
        let exporter = PlaylistExporter::new(Arc::clone(&selections), settings.export_dir.clone());
        let rate_limiter = RateLimiter::new(
            settings.owner(),
            settings.rate_limit_window(),
            settings.rate_limit_max_requests,
        );

        Self {
            settings,
            client,
            rate_limiter,
            selections,
            aggregator,
            exporter,
            started_at: Instant::now(),
        }
    }

    /// Whether `user_id` is the configured owner.
    #[must_use]
    pub fn is_owner(&self, user_id: i64) -> bool {
        self.rate_limiter.is_owner(user_id)
    }

    /// Snapshot of the global counters.
    pub async fn stats(&self) -> GlobalStats {
        let cache = self.client.cache().stats().await;
        GlobalStats {
            total_requests: cache.total_requests,
            cache_hits: cache.cache_hits,
            cache_size: cache.entries,
            active_users: self.selections.active_users(),
            selections: self.selections.total_selections(),
            uptime: self.started_at.elapsed(),
        }
    }

    /// Drop every cached response, returning how many were removed.
    pub async fn clear_cache(&self) -> u64 {
        let removed = self.client.cache().clear().await;
        info!(removed, "Response cache cleared");
        removed
    }

    /// Start the periodic export retention sweep.
    #[must_use]
    pub fn spawn_cleanup(&self, token: CancellationToken) -> JoinHandle<()> {
        spawn_cleanup_task(
            self.settings.export_dir.clone(),
            self.settings.cleanup_interval(),
            self.settings.file_retention(),
            token,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PlaylistConfig;
    use crate::selection::{ContentKind, SelectionItem};
    use crate::upstream::{MockUpstreamTransport, RawResponse};

    #[tokio::test]
    async fn test_stats_and_clear_cache() {
        let mut api = MockUpstreamTransport::new();
        api.expect_get()
            .returning(|_, _| Ok(RawResponse::new(200, "[]")));
        let settings = CoreSettings {
            owner_id: 99,
            ..CoreSettings::default()
        };
        let ctx = AppContext::with_transports(
            settings,
            Arc::new(api),
            Arc::new(MockUpstreamTransport::new()),
        );
        let config = PlaylistConfig::new("http://x.tv", "u1", "p1");

        ctx.client.categories(&config, ContentKind::Movies).await;
        ctx.client.categories(&config, ContentKind::Movies).await;
        ctx.selections.add(
            1,
            ContentKind::Channels,
            SelectionItem {
                id: "5".into(),
                name: "ESPN".into(),
                logo: String::new(),
                container: "ts".into(),
                category: "Sports".into(),
                episode: None,
            },
        );

        let stats = ctx.stats().await;
        assert_eq!(stats.total_requests, 2);
        assert_eq!(stats.cache_hits, 1);
        assert_eq!(stats.cache_size, 1);
        assert_eq!(stats.active_users, 1);
        assert_eq!(stats.selections, 1);
        assert!((stats.hit_rate() - 50.0).abs() < f64::EPSILON);

        assert_eq!(ctx.clear_cache().await, 1);
        assert_eq!(ctx.stats().await.cache_size, 0);
        assert!(ctx.is_owner(99));
        assert!(!ctx.is_owner(1));
    }
}
