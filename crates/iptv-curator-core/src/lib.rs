#![deny(missing_docs)]
//! IPTV curator core library.
//!
//! Provider API access with caching, per-user rate limiting, selection
//! curation and M3U export.

/// Category aggregation and single-item adds.
pub mod aggregator;
/// Configuration management.
pub mod config;
/// Shared application state.
pub mod context;
/// M3U export and retention.
pub mod playlist;
/// Per-user rate limiting.
pub mod rate_limit;
/// Per-user selection store.
pub mod selection;
/// Provider API access.
pub mod upstream;
/// Utility functions.
pub mod utils;

pub use context::{AppContext, GlobalStats};
