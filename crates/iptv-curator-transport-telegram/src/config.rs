//! Telegram transport settings.

use config::ConfigError;
use iptv_curator_core::config::CoreSettings;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

/// Telegram transport settings loaded from environment variables.
#[derive(Debug, Deserialize, Serialize, Clone, Default)]
pub struct TelegramSettings {
    /// Telegram Bot API token.
    pub telegram_token: String,
}

impl TelegramSettings {
    /// Create new settings by loading from environment and files.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading fails.
    pub fn new() -> Result<Self, ConfigError> {
        iptv_curator_core::config::build_config()?.try_deserialize()
    }
}

/// Combined settings used by the Telegram transport layer.
#[derive(Clone)]
pub struct BotSettings {
    /// Core settings shared with the curator engine.
    pub core: Arc<CoreSettings>,
    /// Telegram-specific settings.
    pub telegram: Arc<TelegramSettings>,
}

impl BotSettings {
    /// Create a new combined settings bundle.
    #[must_use]
    pub fn new(core: CoreSettings, telegram: TelegramSettings) -> Self {
        Self {
            core: Arc::new(core),
            telegram: Arc::new(telegram),
        }
    }
}

/// Initial delay before retrying a failed Telegram call.
pub const TELEGRAM_API_INITIAL_BACKOFF_MS: u64 = 500;
/// Upper bound of the retry delay.
pub const TELEGRAM_API_MAX_BACKOFF_MS: u64 = 4000;
/// Retries after the first failed attempt.
pub const TELEGRAM_API_MAX_RETRIES: usize = 3;

/// Cooldown period (seconds) between "too many requests" notices for the
/// same user.
pub const RATE_LIMIT_NOTICE_COOLDOWN_SECS: u64 = 60;
/// Maximum number of users tracked by the notice cooldown.
pub const RATE_LIMIT_NOTICE_CACHE_MAX_SIZE: u64 = 10_000;

/// Get the rate-limit notice cooldown from env or default.
///
/// Environment variable: `RATE_LIMIT_NOTICE_COOLDOWN_SECS`.
#[must_use]
pub fn get_rate_limit_notice_cooldown() -> u64 {
    std::env::var("RATE_LIMIT_NOTICE_COOLDOWN_SECS")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(RATE_LIMIT_NOTICE_COOLDOWN_SECS)
}

/// Get the notice cache max size from env or default.
///
/// Environment variable: `RATE_LIMIT_NOTICE_CACHE_MAX_SIZE`.
#[must_use]
pub fn get_rate_limit_notice_cache_max_size() -> u64 {
    std::env::var("RATE_LIMIT_NOTICE_CACHE_MAX_SIZE")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(RATE_LIMIT_NOTICE_CACHE_MAX_SIZE)
}
