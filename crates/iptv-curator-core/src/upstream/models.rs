//! Provider payload records
//!
//! Providers disagree on field types (ids arrive as numbers or strings) and
//! routinely omit fields, so every field is optional and read through a
//! lenient deserializer. Defaults are applied by the accessor methods, never
//! by callers.

use chrono::DateTime;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::cmp::Ordering;
use tracing::debug;

/// Placeholder name for a channel without one
pub const UNNAMED_CHANNEL: &str = "Unnamed channel";
/// Placeholder name for a movie without one
pub const UNNAMED_MOVIE: &str = "Unnamed movie";
/// Placeholder name for a series without one
pub const UNNAMED_SERIES: &str = "Series";
/// Placeholder title for an episode without one
pub const UNNAMED_EPISODE: &str = "Episode";
/// Placeholder for an unknown episode number
pub const UNKNOWN_EPISODE_NUM: &str = "?";
/// Container used for channels that do not declare one
pub const DEFAULT_LIVE_CONTAINER: &str = "ts";
/// Container used for movies and episodes that do not declare one
pub const DEFAULT_VOD_CONTAINER: &str = "mp4";

/// Accept a string, number or bool; anything else (and empty strings) is `None`.
fn lenient_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value: Value = Deserialize::deserialize(deserializer)?;
    Ok(match value {
        Value::String(s) if !s.trim().is_empty() => Some(s),
        Value::Number(n) => Some(n.to_string()),
        Value::Bool(b) => Some(b.to_string()),
        _ => None,
    })
}

/// Parse every element of a JSON array, skipping elements that do not fit `T`.
///
/// Non-array payloads (including the raw pass-through object) yield an
/// empty list.
#[must_use]
pub fn parse_list<T: DeserializeOwned>(payload: &Value) -> Vec<T> {
    let Some(items) = payload.as_array() else {
        return Vec::new();
    };
    items
        .iter()
        .filter_map(|item| match T::deserialize(item) {
            Ok(parsed) => Some(parsed),
            Err(e) => {
                debug!("Skipping malformed upstream item: {e}");
                None
            }
        })
        .collect()
}

/// A provider category
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    /// Provider category id
    #[serde(default, deserialize_with = "lenient_string")]
    pub category_id: Option<String>,
    /// Provider category name
    #[serde(default, deserialize_with = "lenient_string")]
    pub category_name: Option<String>,
}

impl Category {
    /// Category name, or `fallback` when absent.
    #[must_use]
    pub fn name_or<'a>(&'a self, fallback: &'a str) -> &'a str {
        self.category_name.as_deref().unwrap_or(fallback)
    }
}

/// A live channel or a movie from `get_live_streams` / `get_vod_streams`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Stream {
    /// Stream id
    #[serde(default, deserialize_with = "lenient_string")]
    pub stream_id: Option<String>,
    /// Alternative id field used by some panels
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: Option<String>,
    /// Display name
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: Option<String>,
    /// Logo / poster URL
    #[serde(default, deserialize_with = "lenient_string")]
    pub stream_icon: Option<String>,
    /// File extension hint
    #[serde(default, deserialize_with = "lenient_string")]
    pub container_extension: Option<String>,
    /// Provider category id
    #[serde(default, deserialize_with = "lenient_string")]
    pub category_id: Option<String>,
    /// Provider category name, when the panel includes it
    #[serde(default, deserialize_with = "lenient_string")]
    pub category_name: Option<String>,
}

impl Stream {
    /// `stream_id`, falling back to `id`; empty when neither is present.
    #[must_use]
    pub fn item_id(&self) -> String {
        self.stream_id
            .as_ref()
            .or(self.id.as_ref())
            .cloned()
            .unwrap_or_default()
    }

    /// Display name, or `placeholder`.
    #[must_use]
    pub fn name_or(&self, placeholder: &str) -> String {
        self.name.clone().unwrap_or_else(|| placeholder.to_string())
    }

    /// Logo URL, empty when absent.
    #[must_use]
    pub fn logo(&self) -> String {
        self.stream_icon.clone().unwrap_or_default()
    }

    /// Container extension, or `default`.
    #[must_use]
    pub fn container_or(&self, default: &str) -> String {
        self.container_extension
            .clone()
            .unwrap_or_else(|| default.to_string())
    }
}

/// A series from `get_series`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesEntry {
    /// Series id
    #[serde(default, deserialize_with = "lenient_string")]
    pub series_id: Option<String>,
    /// Alternative id field used by some panels
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: Option<String>,
    /// Series title
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: Option<String>,
    /// Cover artwork URL
    #[serde(default, deserialize_with = "lenient_string")]
    pub cover: Option<String>,
    /// Provider category id
    #[serde(default, deserialize_with = "lenient_string")]
    pub category_id: Option<String>,
}

impl SeriesEntry {
    /// `series_id`, falling back to `id`; empty when neither is present.
    #[must_use]
    pub fn item_id(&self) -> String {
        self.series_id
            .as_ref()
            .or(self.id.as_ref())
            .cloned()
            .unwrap_or_default()
    }

    /// Series title, or the series placeholder.
    #[must_use]
    pub fn title(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| UNNAMED_SERIES.to_string())
    }

    /// Cover URL, empty when absent.
    #[must_use]
    pub fn cover(&self) -> String {
        self.cover.clone().unwrap_or_default()
    }
}

/// One episode inside `get_series_info`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Episode {
    /// Episode stream id
    #[serde(default, deserialize_with = "lenient_string")]
    pub id: Option<String>,
    /// Episode number within its season
    #[serde(default, deserialize_with = "lenient_string")]
    pub episode_num: Option<String>,
    /// Episode title
    #[serde(default, deserialize_with = "lenient_string")]
    pub title: Option<String>,
    /// File extension hint
    #[serde(default, deserialize_with = "lenient_string")]
    pub container_extension: Option<String>,
    /// Season number, when the panel repeats it per episode
    #[serde(default, deserialize_with = "lenient_string")]
    pub season: Option<String>,
}

impl Episode {
    /// Episode id, empty when absent.
    #[must_use]
    pub fn item_id(&self) -> String {
        self.id.clone().unwrap_or_default()
    }

    /// Episode number, or `?`.
    #[must_use]
    pub fn number(&self) -> String {
        self.episode_num
            .clone()
            .unwrap_or_else(|| UNKNOWN_EPISODE_NUM.to_string())
    }

    /// Episode title, or the episode placeholder.
    #[must_use]
    pub fn title(&self) -> String {
        self.title
            .clone()
            .unwrap_or_else(|| UNNAMED_EPISODE.to_string())
    }

    /// Container extension, or `mp4`.
    #[must_use]
    pub fn container(&self) -> String {
        self.container_extension
            .clone()
            .unwrap_or_else(|| DEFAULT_VOD_CONTAINER.to_string())
    }
}

/// Episodes of one season
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Season {
    /// Season number as the provider keys it
    pub number: String,
    /// Episodes in provider order
    pub episodes: Vec<Episode>,
}

/// Series-level details inside `get_series_info`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesDetails {
    /// Series title
    #[serde(default, deserialize_with = "lenient_string")]
    pub name: Option<String>,
    /// Cover artwork URL
    #[serde(default, deserialize_with = "lenient_string")]
    pub cover: Option<String>,
    /// Provider category id
    #[serde(default, deserialize_with = "lenient_string")]
    pub category_id: Option<String>,
}

/// Payload of `get_series_info`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SeriesInfo {
    /// Series-level details
    #[serde(default)]
    pub info: Option<SeriesDetails>,
    /// Season number -> episode list; some panels send a list of lists
    #[serde(default)]
    pub episodes: Option<Value>,
}

impl SeriesInfo {
    /// Parse a `get_series_info` payload; anything that is not an object
    /// yields an empty record.
    #[must_use]
    pub fn from_payload(payload: &Value) -> Self {
        if !payload.is_object() {
            return Self::default();
        }
        Self::deserialize(payload).unwrap_or_default()
    }

    /// Seasons in ascending numeric order, each with its parseable episodes.
    #[must_use]
    pub fn seasons(&self) -> Vec<Season> {
        let mut seasons: Vec<Season> = match &self.episodes {
            Some(Value::Object(map)) => map
                .iter()
                .map(|(number, episodes)| Season {
                    number: number.clone(),
                    episodes: parse_list(episodes),
                })
                .collect(),
            Some(Value::Array(list)) => list
                .iter()
                .enumerate()
                .map(|(idx, episodes)| {
                    let episodes: Vec<Episode> = parse_list(episodes);
                    let number = episodes
                        .iter()
                        .find_map(|e| e.season.clone())
                        .unwrap_or_else(|| (idx + 1).to_string());
                    Season { number, episodes }
                })
                .collect(),
            _ => Vec::new(),
        };
        seasons.sort_by(|a, b| compare_season_numbers(&a.number, &b.number));
        seasons
    }

    /// Every episode of every season, in season order.
    #[must_use]
    pub fn all_episodes(&self) -> Vec<(String, Episode)> {
        self.seasons()
            .into_iter()
            .flat_map(|season| {
                let number = season.number;
                season
                    .episodes
                    .into_iter()
                    .map(move |episode| (number.clone(), episode))
            })
            .collect()
    }
}

fn compare_season_numbers(a: &str, b: &str) -> Ordering {
    match (a.parse::<u32>(), b.parse::<u32>()) {
        (Ok(x), Ok(y)) => x.cmp(&y),
        (Ok(_), Err(_)) => Ordering::Less,
        (Err(_), Ok(_)) => Ordering::Greater,
        (Err(_), Err(_)) => a.cmp(b),
    }
}

/// `user_info` block of `get_account_info`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserInfo {
    /// Account status as reported by the panel
    #[serde(default, deserialize_with = "lenient_string")]
    pub status: Option<String>,
    /// Expiry as a unix timestamp string
    #[serde(default, deserialize_with = "lenient_string")]
    pub exp_date: Option<String>,
    /// Connections in use
    #[serde(default, deserialize_with = "lenient_string")]
    pub active_cons: Option<String>,
    /// Connection allowance
    #[serde(default, deserialize_with = "lenient_string")]
    pub max_connections: Option<String>,
}

/// `server_info` block of `get_account_info`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerInfo {
    /// Channel count, on panels that report it
    #[serde(default, deserialize_with = "lenient_string")]
    pub available_channels: Option<String>,
    /// Movie count, on panels that report it
    #[serde(default, deserialize_with = "lenient_string")]
    pub available_movies: Option<String>,
    /// Series count, on panels that report it
    #[serde(default, deserialize_with = "lenient_string")]
    pub available_series: Option<String>,
}

/// Payload of `get_account_info`
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccountInfo {
    /// Account block
    #[serde(default)]
    pub user_info: Option<UserInfo>,
    /// Server block
    #[serde(default)]
    pub server_info: Option<ServerInfo>,
}

/// Display-ready account summary with every default applied
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountSummary {
    /// Provider base URL
    pub server: String,
    /// Account username
    pub username: String,
    /// Account status
    pub status: String,
    /// Expiry, formatted `dd/mm/YYYY HH:MM` when the panel sends a timestamp
    pub exp_date: String,
    /// Connections in use
    pub active_cons: String,
    /// Connection allowance
    pub max_connections: String,
    /// Channel count
    pub available_channels: String,
    /// Movie count
    pub available_movies: String,
    /// Series count
    pub available_series: String,
}

impl AccountSummary {
    /// Summary used when the provider answered nothing usable.
    #[must_use]
    pub fn unreachable(server: &str, username: &str) -> Self {
        Self {
            server: server.to_string(),
            username: username.to_string(),
            status: "Connected".to_string(),
            exp_date: "N/A".to_string(),
            active_cons: "0".to_string(),
            max_connections: "1".to_string(),
            available_channels: "N/A".to_string(),
            available_movies: "N/A".to_string(),
            available_series: "N/A".to_string(),
        }
    }

    /// Build a summary from a decoded payload.
    #[must_use]
    pub fn from_payload(server: &str, username: &str, payload: &Value) -> Self {
        let info = if payload.is_object() {
            AccountInfo::deserialize(payload).unwrap_or_default()
        } else {
            AccountInfo::default()
        };
        let user = info.user_info.unwrap_or_default();
        let srv = info.server_info.unwrap_or_default();
        let status_default = if payload.get("user_info").is_some() {
            "Active"
        } else {
            "Online"
        };

        Self {
            server: server.to_string(),
            username: username.to_string(),
            status: user.status.unwrap_or_else(|| status_default.to_string()),
            exp_date: user
                .exp_date
                .map_or_else(|| "N/A".to_string(), |raw| format_expiry(&raw)),
            active_cons: user.active_cons.unwrap_or_else(|| "0".to_string()),
            max_connections: user.max_connections.unwrap_or_else(|| "1".to_string()),
            available_channels: srv.available_channels.unwrap_or_else(|| "0".to_string()),
            available_movies: srv.available_movies.unwrap_or_else(|| "0".to_string()),
            available_series: srv.available_series.unwrap_or_else(|| "0".to_string()),
        }
    }

    /// Whether the panel reports the account as active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status.eq_ignore_ascii_case("active")
    }
}

fn format_expiry(raw: &str) -> String {
    raw.parse::<i64>()
        .ok()
        .and_then(|ts| DateTime::from_timestamp(ts, 0))
        .map_or_else(
            || raw.to_string(),
            |dt| dt.format("%d/%m/%Y %H:%M").to_string(),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_stream_accepts_numeric_and_string_ids() {
        let streams: Vec<Stream> = parse_list(&json!([
            { "stream_id": 5, "name": "ESPN" },
            { "stream_id": "6", "name": "CNN", "container_extension": "m3u8" },
            { "id": 7 }
        ]));
        assert_eq!(streams.len(), 3);
        assert_eq!(streams[0].item_id(), "5");
        assert_eq!(streams[1].item_id(), "6");
        assert_eq!(streams[2].item_id(), "7");
        assert_eq!(streams[0].container_or(DEFAULT_LIVE_CONTAINER), "ts");
        assert_eq!(streams[1].container_or(DEFAULT_LIVE_CONTAINER), "m3u8");
        assert_eq!(streams[2].name_or(UNNAMED_CHANNEL), UNNAMED_CHANNEL);
    }

    #[test]
    fn test_parse_list_skips_malformed_items() {
        let streams: Vec<Stream> = parse_list(&json!([{ "stream_id": 1 }, "garbage", 42]));
        assert_eq!(streams.len(), 1);
        assert!(parse_list::<Stream>(&json!({ "status": "ok" })).is_empty());
    }

    #[test]
    fn test_null_and_empty_fields_are_absent() {
        let streams: Vec<Stream> = parse_list(&json!([
            { "stream_id": null, "name": "", "stream_icon": null }
        ]));
        assert_eq!(streams[0].item_id(), "");
        assert_eq!(streams[0].name, None);
        assert_eq!(streams[0].logo(), "");
    }

    #[test]
    fn test_seasons_are_numerically_ordered() {
        let info = SeriesInfo::from_payload(&json!({
            "info": { "name": "Show" },
            "episodes": {
                "10": [{ "id": "c", "episode_num": 1 }],
                "2": [{ "id": "b", "episode_num": 1 }],
                "1": [{ "id": "a", "episode_num": 1, "title": "Pilot" }]
            }
        }));
        let order: Vec<String> = info.seasons().into_iter().map(|s| s.number).collect();
        assert_eq!(order, vec!["1", "2", "10"]);

        let episodes = info.all_episodes();
        assert_eq!(episodes[0].0, "1");
        assert_eq!(episodes[0].1.title(), "Pilot");
        assert_eq!(episodes[1].1.title(), UNNAMED_EPISODE);
    }

    #[test]
    fn test_seasons_from_list_of_lists() {
        let info = SeriesInfo::from_payload(&json!({
            "episodes": [
                [{ "id": "1", "episode_num": 1 }],
                [{ "id": "2", "episode_num": 1, "season": 3 }]
            ]
        }));
        let numbers: Vec<String> = info.seasons().into_iter().map(|s| s.number).collect();
        assert_eq!(numbers, vec!["1", "3"]);
    }

    #[test]
    fn test_series_info_tolerates_non_object() {
        assert!(SeriesInfo::from_payload(&json!([])).seasons().is_empty());
        assert!(SeriesInfo::from_payload(&json!({ "episodes": 5 }))
            .seasons()
            .is_empty());
    }

    #[test]
    fn test_account_summary_defaults() {
        let summary = AccountSummary::from_payload(
            "http://x.tv",
            "u1",
            &json!({ "user_info": { "exp_date": "0", "max_connections": 2 } }),
        );
        assert_eq!(summary.status, "Active");
        assert!(summary.is_active());
        assert_eq!(summary.exp_date, "01/01/1970 00:00");
        assert_eq!(summary.max_connections, "2");
        assert_eq!(summary.available_channels, "0");

        let bare = AccountSummary::from_payload("http://x.tv", "u1", &json!({ "raw_data": "x" }));
        assert_eq!(bare.status, "Online");
        assert_eq!(bare.exp_date, "N/A");
    }
}
