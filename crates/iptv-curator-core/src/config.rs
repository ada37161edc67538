//! Configuration and settings management
//!
//! Loads core settings from config files and environment variables and
//! defines the default limits used by the cache, rate limiter and exporter.

use config::{Config, ConfigError, Environment, File};
use reqwest::Url;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use std::time::Duration;

/// Lifetime of a cached upstream response (1 hour).
pub const CACHE_TTL_SECS: u64 = 3600;
/// Maximum number of cached upstream responses.
pub const CACHE_MAX_ENTRIES: u64 = 10_000;
/// Quiet period after which a user's request counter resets.
pub const RATE_LIMIT_WINDOW_SECS: u64 = 60;
/// Requests allowed per window before a user is throttled.
pub const RATE_LIMIT_MAX_REQUESTS: u32 = 20;
/// Timeout for upstream API calls.
pub const HTTP_TIMEOUT_SECS: u64 = 15;
/// Timeout for the credential check performed when a playlist is submitted.
pub const CONNECTION_TEST_TIMEOUT_SECS: u64 = 10;
/// Age after which exported playlists are swept (24 hours).
pub const FILE_RETENTION_SECS: u64 = 24 * 3600;
/// Interval between retention sweeps (30 minutes).
pub const CLEANUP_INTERVAL_SECS: u64 = 1800;
/// Directory exported playlists are written to.
pub const DEFAULT_EXPORT_DIR: &str = "exports";

/// Build the layered configuration shared by every crate of the bot.
///
/// Sources, later ones winning: `config/default`, `config/{RUN_MODE}`,
/// `config/local`, `APP__*` variables, then plain environment variables.
///
/// # Errors
///
/// Returns a `ConfigError` if a present source cannot be parsed.
pub fn build_config() -> Result<Config, ConfigError> {
    let run_mode = std::env::var("RUN_MODE").unwrap_or_else(|_| "development".into());

    Config::builder()
        .add_source(File::with_name("config/default").required(false))
        .add_source(File::with_name(&format!("config/{run_mode}")).required(false))
        // Not checked into git
        .add_source(File::with_name("config/local").required(false))
        .add_source(Environment::with_prefix("APP").separator("__"))
        // ignore_empty treats empty env vars as unset
        .add_source(Environment::default().ignore_empty(true))
        .build()
}

/// Core settings: owner identity, export location and the cache/limit knobs.
#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct CoreSettings {
    /// Telegram id of the bot owner. `0` means no owner is configured.
    #[serde(default)]
    pub owner_id: i64,
    /// Directory exported playlists are written to
    #[serde(default = "default_export_dir")]
    pub export_dir: PathBuf,
    /// Cached response lifetime in seconds
    #[serde(default = "default_cache_ttl_secs")]
    pub cache_ttl_secs: u64,
    /// Maximum number of cached responses
    #[serde(default = "default_cache_max_entries")]
    pub cache_max_entries: u64,
    /// Rate limiter quiet period in seconds
    #[serde(default = "default_rate_limit_window_secs")]
    pub rate_limit_window_secs: u64,
    /// Requests allowed per rate limiter window
    #[serde(default = "default_rate_limit_max_requests")]
    pub rate_limit_max_requests: u32,
    /// Upstream API timeout in seconds
    #[serde(default = "default_http_timeout_secs")]
    pub http_timeout_secs: u64,
    /// Credential check timeout in seconds
    #[serde(default = "default_connection_test_timeout_secs")]
    pub connection_test_timeout_secs: u64,
    /// Exported file retention in seconds
    #[serde(default = "default_file_retention_secs")]
    pub file_retention_secs: u64,
    /// Retention sweep interval in seconds
    #[serde(default = "default_cleanup_interval_secs")]
    pub cleanup_interval_secs: u64,
}

fn default_export_dir() -> PathBuf {
    PathBuf::from(DEFAULT_EXPORT_DIR)
}

const fn default_cache_ttl_secs() -> u64 {
    CACHE_TTL_SECS
}

const fn default_cache_max_entries() -> u64 {
    CACHE_MAX_ENTRIES
}

const fn default_rate_limit_window_secs() -> u64 {
    RATE_LIMIT_WINDOW_SECS
}

const fn default_rate_limit_max_requests() -> u32 {
    RATE_LIMIT_MAX_REQUESTS
}

const fn default_http_timeout_secs() -> u64 {
    HTTP_TIMEOUT_SECS
}

const fn default_connection_test_timeout_secs() -> u64 {
    CONNECTION_TEST_TIMEOUT_SECS
}

const fn default_file_retention_secs() -> u64 {
    FILE_RETENTION_SECS
}

const fn default_cleanup_interval_secs() -> u64 {
    CLEANUP_INTERVAL_SECS
}

impl Default for CoreSettings {
    fn default() -> Self {
        Self {
            owner_id: 0,
            export_dir: default_export_dir(),
            cache_ttl_secs: CACHE_TTL_SECS,
            cache_max_entries: CACHE_MAX_ENTRIES,
            rate_limit_window_secs: RATE_LIMIT_WINDOW_SECS,
            rate_limit_max_requests: RATE_LIMIT_MAX_REQUESTS,
            http_timeout_secs: HTTP_TIMEOUT_SECS,
            connection_test_timeout_secs: CONNECTION_TEST_TIMEOUT_SECS,
            file_retention_secs: FILE_RETENTION_SECS,
            cleanup_interval_secs: CLEANUP_INTERVAL_SECS,
        }
    }
}

impl CoreSettings {
    /// Load core settings from config files and the environment.
    ///
    /// # Errors
    ///
    /// Returns a `ConfigError` if loading or deserialization fails.
    pub fn new() -> Result<Self, ConfigError> {
        build_config()?.try_deserialize()
    }

    /// Returns the owner id, if one is configured.
    #[must_use]
    pub const fn owner(&self) -> Option<i64> {
        if self.owner_id == 0 {
            None
        } else {
            Some(self.owner_id)
        }
    }

    /// Cached response lifetime.
    #[must_use]
    pub const fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// Rate limiter quiet period.
    #[must_use]
    pub const fn rate_limit_window(&self) -> Duration {
        Duration::from_secs(self.rate_limit_window_secs)
    }

    /// Upstream API timeout.
    #[must_use]
    pub const fn http_timeout(&self) -> Duration {
        Duration::from_secs(self.http_timeout_secs)
    }

    /// Credential check timeout.
    #[must_use]
    pub const fn connection_test_timeout(&self) -> Duration {
        Duration::from_secs(self.connection_test_timeout_secs)
    }

    /// Exported file retention.
    #[must_use]
    pub const fn file_retention(&self) -> Duration {
        Duration::from_secs(self.file_retention_secs)
    }

    /// Retention sweep interval.
    #[must_use]
    pub const fn cleanup_interval(&self) -> Duration {
        Duration::from_secs(self.cleanup_interval_secs)
    }
}

/// Credentials of one provider account, derived from a playlist URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlaylistConfig {
    /// `scheme://host[:port]` of the provider
    pub server: String,
    /// Account username
    pub username: String,
    /// Account password
    pub password: String,
    /// `player_api.php` endpoint on `server`
    pub api_url: String,
}

impl PlaylistConfig {
    /// Build a config for `server` with the derived API endpoint.
    #[must_use]
    pub fn new(server: &str, username: &str, password: &str) -> Self {
        let server = server.trim_end_matches('/').to_string();
        let api_url = format!("{server}/player_api.php");
        Self {
            server,
            username: username.to_string(),
            password: password.to_string(),
            api_url,
        }
    }

    /// Parse a playlist URL such as
    /// `http://host:8080/get.php?username=user&password=pass`.
    ///
    /// Returns `None` if the URL is malformed or lacks either credential.
    ///
    /// # Examples
    ///
    /// ```
    /// use iptv_curator_core::config::PlaylistConfig;
    ///
    /// let cfg = PlaylistConfig::from_playlist_url(
    ///     "http://x.tv:8080/get.php?username=u1&password=p1&type=m3u",
    /// )
    /// .unwrap();
    /// assert_eq!(cfg.server, "http://x.tv:8080");
    /// assert_eq!(cfg.api_url, "http://x.tv:8080/player_api.php");
    /// ```
    #[must_use]
    pub fn from_playlist_url(url: &str) -> Option<Self> {
        let parsed = Url::parse(url.trim()).ok()?;
        let host = parsed.host_str()?;
        let server = match parsed.port() {
            Some(port) => format!("{}://{host}:{port}", parsed.scheme()),
            None => format!("{}://{host}", parsed.scheme()),
        };

        let mut username = None;
        let mut password = None;
        for (key, value) in parsed.query_pairs() {
            match key.as_ref() {
                "username" if username.is_none() => username = Some(value.into_owned()),
                "password" if password.is_none() => password = Some(value.into_owned()),
                _ => {}
            }
        }

        match (username, password) {
            (Some(u), Some(p)) if !u.is_empty() && !p.is_empty() => Some(Self::new(&server, &u, &p)),
            _ => None,
        }
    }

    /// Server address without the scheme, for display.
    #[must_use]
    pub fn display_host(&self) -> &str {
        self.server
            .split_once("//")
            .map_or(self.server.as_str(), |(_, host)| host)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_playlist_url_parsing() {
        let cfg = PlaylistConfig::from_playlist_url(
            "http://example.com/get.php?username=meuuser&password=minhasenha",
        );
        assert_eq!(
            cfg,
            Some(PlaylistConfig {
                server: "http://example.com".to_string(),
                username: "meuuser".to_string(),
                password: "minhasenha".to_string(),
                api_url: "http://example.com/player_api.php".to_string(),
            })
        );
    }

    #[test]
    fn test_playlist_url_keeps_port_and_scheme() {
        let cfg = PlaylistConfig::from_playlist_url(
            "https://iptv.example:25461/get.php?password=p&username=u&output=ts",
        )
        .expect("valid url");
        assert_eq!(cfg.server, "https://iptv.example:25461");
        assert_eq!(cfg.username, "u");
        assert_eq!(cfg.password, "p");
        assert_eq!(cfg.display_host(), "iptv.example:25461");
    }

    #[test]
    fn test_playlist_url_requires_credentials() {
        assert!(PlaylistConfig::from_playlist_url("http://x.tv/get.php?username=u").is_none());
        assert!(
            PlaylistConfig::from_playlist_url("http://x.tv/get.php?username=&password=p").is_none()
        );
        assert!(PlaylistConfig::from_playlist_url("not a url").is_none());
    }

    #[test]
    fn test_new_trims_trailing_slash() {
        let cfg = PlaylistConfig::new("http://x.tv/", "u1", "p1");
        assert_eq!(cfg.server, "http://x.tv");
        assert_eq!(cfg.api_url, "http://x.tv/player_api.php");
    }

    #[test]
    fn test_owner_zero_means_unset() {
        let mut settings = CoreSettings::default();
        assert_eq!(settings.owner(), None);
        settings.owner_id = 1_985_282_432;
        assert_eq!(settings.owner(), Some(1_985_282_432));
        assert_eq!(settings.cache_ttl(), Duration::from_secs(3600));
        assert_eq!(settings.rate_limit_max_requests, 20);
    }
}
