#![deny(missing_docs)]
//! Telegram transport for the IPTV playlist curator.

/// Telegram-specific bot/transport implementation.
pub mod bot;
/// Telegram transport configuration.
pub mod config;
/// Telegram runtime entrypoint.
pub mod runner;
