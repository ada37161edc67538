/// Typed inline keyboard payloads
pub mod callbacks;
/// Command, text and callback handlers
pub mod handlers;
/// Cooldown for rate limit notices
pub mod notice_cache;
/// Resilient messaging with automatic retry for Telegram API operations
pub mod resilient;
/// User state and dialogue management
pub mod state;
/// View layer for UI components (keyboards, messages)
pub mod views;

pub use notice_cache::RateLimitNoticeCache;
