//! Rate-limit notice flood protection
//!
//! A throttled user who keeps tapping buttons would otherwise receive one
//! "too many requests" message per tap, which in turn counts against the
//! bot's own Telegram limits.

use moka::future::Cache;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Tracks when a user was last told they are being throttled.
#[derive(Clone)]
pub struct RateLimitNoticeCache {
    /// Moka cache storing user_id -> () with the cooldown as TTL
    cache: Cache<i64, ()>,
    /// Counter for notices that were held back
    silenced_count: Arc<AtomicU64>,
}

impl RateLimitNoticeCache {
    /// Creates a new `RateLimitNoticeCache`.
    ///
    /// # Arguments
    ///
    /// * `cooldown_secs` - Seconds between notices to the same user
    /// * `max_capacity` - Maximum number of tracked users
    #[must_use]
    pub fn new(cooldown_secs: u64, max_capacity: u64) -> Self {
        let cache = Cache::builder()
            .max_capacity(max_capacity)
            .time_to_live(Duration::from_secs(cooldown_secs))
            .build();

        Self {
            cache,
            silenced_count: Arc::new(AtomicU64::new(0)),
        }
    }

    /// Returns `true` if no notice was sent to `user_id` within the cooldown.
    pub async fn should_send(&self, user_id: i64) -> bool {
        if self.cache.get(&user_id).await.is_none() {
            return true;
        }

        let count = self.silenced_count.fetch_add(1, Ordering::Relaxed) + 1;
        // Log only every 100th silenced notice
        if count.is_multiple_of(100) {
            debug!(user_id, count, "Silenced rate limit notices");
        }
        false
    }

    /// Start the cooldown for `user_id` after a notice was delivered.
    pub async fn mark_sent(&self, user_id: i64) {
        self.cache.insert(user_id, ()).await;
    }

    /// Total number of notices held back.
    #[must_use]
    pub fn silenced_count(&self) -> u64 {
        self.silenced_count.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_cooldown_blocks_repeat_notice() {
        let cache = RateLimitNoticeCache::new(60, 100);

        assert!(cache.should_send(42).await);
        cache.mark_sent(42).await;
        assert!(!cache.should_send(42).await);
        assert!(!cache.should_send(42).await);
        assert_eq!(cache.silenced_count(), 2);

        // Other users are independent
        assert!(cache.should_send(43).await);
    }

    #[tokio::test]
    async fn test_notice_allowed_again_after_cooldown() {
        let cache = RateLimitNoticeCache::new(1, 100);
        cache.mark_sent(42).await;
        tokio::time::sleep(Duration::from_millis(1200)).await;
        assert!(cache.should_send(42).await);
    }
}
