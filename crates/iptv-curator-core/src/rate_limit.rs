//! Per-user request throttling
//!
//! Each user has a counter that resets once they have been quiet for longer
//! than the window. The owner is never throttled. Counters idle for a whole
//! window are evicted, so memory follows the number of active users.

use moka::sync::Cache;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::Instant;
use tracing::info;

/// Upper bound on users tracked at once
const MAX_TRACKED_USERS: u64 = 100_000;

#[derive(Debug, Clone, Copy)]
struct RateWindow {
    count: u32,
    last_request: Instant,
}

/// In-memory per-user rate limiter
pub struct RateLimiter {
    owner_id: Option<i64>,
    window: Duration,
    max_requests: u32,
    windows: Cache<i64, Arc<Mutex<RateWindow>>>,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RateLimiter")
            .field("owner_id", &self.owner_id)
            .field("window", &self.window)
            .field("max_requests", &self.max_requests)
            .finish_non_exhaustive()
    }
}

impl RateLimiter {
    /// Creates a limiter allowing `max_requests` per `window`.
    #[must_use]
    pub fn new(owner_id: Option<i64>, window: Duration, max_requests: u32) -> Self {
        let windows = Cache::builder()
            .max_capacity(MAX_TRACKED_USERS)
            .time_to_idle(window)
            .build();
        Self {
            owner_id,
            window,
            max_requests,
            windows,
        }
    }

    /// Whether `user_id` is the configured owner.
    #[must_use]
    pub fn is_owner(&self, user_id: i64) -> bool {
        self.owner_id == Some(user_id)
    }

    /// Record one request and report whether it may proceed.
    ///
    /// The counter only resets after a quiet period longer than the window,
    /// so a user who keeps sending requests stays throttled until they pause.
    pub fn allow(&self, user_id: i64) -> bool {
        if self.is_owner(user_id) {
            return true;
        }

        let now = Instant::now();
        let slot = self.windows.get_with(user_id, || {
            Arc::new(Mutex::new(RateWindow {
                count: 0,
                last_request: now,
            }))
        });
        let mut entry = slot.lock().unwrap_or_else(PoisonError::into_inner);

        if now.duration_since(entry.last_request) > self.window {
            entry.count = 0;
        }
        entry.count = entry.count.saturating_add(1);
        entry.last_request = now;

        let allowed = entry.count <= self.max_requests;
        if !allowed {
            info!(user_id, count = entry.count, "Rate limit exceeded");
        }
        allowed
    }

    #[cfg(test)]
    fn tracked_users(&self) -> u64 {
        self.windows.run_pending_tasks();
        self.windows.entry_count()
    }
}
