//! Inline keyboard callback payloads
//!
//! Every button carries a `:`-separated payload that round-trips through
//! [`CallbackAction`]. Payloads must stay under Telegram's 64-byte limit,
//! which holds for the numeric ids providers use.

use iptv_curator_core::selection::ContentKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// One selectable item: a channel or movie stream, or a series episode
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ItemRef {
    /// Channel or movie
    Stream {
        /// Content kind
        kind: ContentKind,
        /// Provider stream id
        stream_id: String,
    },
    /// Episode of a series
    Episode {
        /// Provider series id
        series_id: String,
        /// Provider episode id
        episode_id: String,
    },
}

impl ItemRef {
    /// Bucket the item belongs to.
    #[must_use]
    pub const fn kind(&self) -> ContentKind {
        match self {
            Self::Stream { kind, .. } => *kind,
            Self::Episode { .. } => ContentKind::Series,
        }
    }

    /// Action adding this item to the selection.
    #[must_use]
    pub fn add_action(&self) -> CallbackAction {
        match self {
            Self::Stream { kind, stream_id } => CallbackAction::AddItem {
                kind: *kind,
                stream_id: stream_id.clone(),
            },
            Self::Episode {
                series_id,
                episode_id,
            } => CallbackAction::AddEpisode {
                series_id: series_id.clone(),
                episode_id: episode_id.clone(),
            },
        }
    }
}

impl fmt::Display for ItemRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Stream { kind, stream_id } => write!(f, "{kind}:{stream_id}"),
            Self::Episode {
                series_id,
                episode_id,
            } => write!(f, "ep:{series_id}:{episode_id}"),
        }
    }
}

/// Action requested by an inline keyboard button
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallbackAction {
    /// Show the main menu
    MainMenu,
    /// List categories of a kind
    Categories {
        /// Content kind
        kind: ContentKind,
        /// Zero-based page
        page: usize,
    },
    /// List the items of one category
    CategoryItems {
        /// Content kind
        kind: ContentKind,
        /// Provider category id
        category_id: String,
        /// Zero-based page
        page: usize,
    },
    /// List every item of a kind, regardless of category
    AllItems {
        /// Content kind
        kind: ContentKind,
        /// Zero-based page
        page: usize,
    },
    /// List the episodes of one series
    SeriesEpisodes {
        /// Provider series id
        series_id: String,
        /// Zero-based page
        page: usize,
    },
    /// Show one item with its stream URL
    Details(ItemRef),
    /// Owner broadcast of one item to a group
    Share(ItemRef),
    /// Add one channel or movie
    AddItem {
        /// Content kind
        kind: ContentKind,
        /// Provider stream id
        stream_id: String,
    },
    /// Add one episode
    AddEpisode {
        /// Provider series id
        series_id: String,
        /// Provider episode id
        episode_id: String,
    },
    /// Add every item of a category after asking for a label
    AddFullCategory {
        /// Content kind
        kind: ContentKind,
        /// Provider category id
        category_id: String,
    },
    /// Show the selection summary
    Selections,
    /// Export and send the playlist
    GenerateM3u,
    /// Empty every bucket
    ClearSelections,
    /// Empty one bucket
    ClearBucket(ContentKind),
    /// Show the provider account summary
    AccountInfo,
    /// Owner statistics
    AdminStats,
    /// Owner cache flush
    AdminClearCache,
    /// Page counter button; does nothing
    PageInfo,
}

impl fmt::Display for CallbackAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MainMenu => f.write_str("menu"),
            Self::Categories { kind, page } => write!(f, "cats:{kind}:{page}"),
            Self::CategoryItems {
                kind,
                category_id,
                page,
            } => write!(f, "list:{kind}:{category_id}:{page}"),
            Self::AllItems { kind, page } => write!(f, "all:{kind}:{page}"),
            Self::SeriesEpisodes { series_id, page } => write!(f, "eps:{series_id}:{page}"),
            Self::Details(item) => write!(f, "info:{item}"),
            Self::Share(item) => write!(f, "share:{item}"),
            Self::AddItem { kind, stream_id } => write!(f, "add:{kind}:{stream_id}"),
            Self::AddEpisode {
                series_id,
                episode_id,
            } => write!(f, "adde:{series_id}:{episode_id}"),
            Self::AddFullCategory { kind, category_id } => {
                write!(f, "addcat:{kind}:{category_id}")
            }
            Self::Selections => f.write_str("sel"),
            Self::GenerateM3u => f.write_str("m3u"),
            Self::ClearSelections => f.write_str("clear"),
            Self::ClearBucket(kind) => write!(f, "clear:{kind}"),
            Self::AccountInfo => f.write_str("account"),
            Self::AdminStats => f.write_str("admin:stats"),
            Self::AdminClearCache => f.write_str("admin:flush"),
            Self::PageInfo => f.write_str("noop"),
        }
    }
}

/// Payload that does not describe a known action
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownCallback(pub String);

impl fmt::Display for UnknownCallback {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown callback payload: {}", self.0)
    }
}

impl std::error::Error for UnknownCallback {}

impl FromStr for CallbackAction {
    type Err = UnknownCallback;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let unknown = || UnknownCallback(s.to_string());
        let kind = |raw: &str| raw.parse::<ContentKind>().map_err(|_| unknown());
        let page = |raw: &str| raw.parse::<usize>().map_err(|_| unknown());
        let id = |raw: &str| {
            if raw.is_empty() {
                Err(unknown())
            } else {
                Ok(raw.to_string())
            }
        };

        let parts: Vec<&str> = s.split(':').collect();
        let action = match parts.as_slice() {
            ["menu"] => Self::MainMenu,
            ["cats", k, p] => Self::Categories {
                kind: kind(*k)?,
                page: page(*p)?,
            },
            ["list", k, c, p] => Self::CategoryItems {
                kind: kind(*k)?,
                category_id: id(*c)?,
                page: page(*p)?,
            },
            ["all", k, p] => Self::AllItems {
                kind: kind(*k)?,
                page: page(*p)?,
            },
            [verb @ ("info" | "share"), rest @ ..] => {
                let item = match rest {
                    ["ep", sid, eid] => ItemRef::Episode {
                        series_id: id(*sid)?,
                        episode_id: id(*eid)?,
                    },
                    [k, sid] => ItemRef::Stream {
                        kind: kind(*k)?,
                        stream_id: id(*sid)?,
                    },
                    _ => return Err(unknown()),
                };
                if *verb == "info" {
                    Self::Details(item)
                } else {
                    Self::Share(item)
                }
            }
            ["eps", sid, p] => Self::SeriesEpisodes {
                series_id: id(*sid)?,
                page: page(*p)?,
            },
            ["add", k, sid] => Self::AddItem {
                kind: kind(*k)?,
                stream_id: id(*sid)?,
            },
            ["adde", sid, eid] => Self::AddEpisode {
                series_id: id(*sid)?,
                episode_id: id(*eid)?,
            },
            ["addcat", k, c] => Self::AddFullCategory {
                kind: kind(*k)?,
                category_id: id(*c)?,
            },
            ["sel"] => Self::Selections,
            ["m3u"] => Self::GenerateM3u,
            ["clear"] => Self::ClearSelections,
            ["clear", k] => Self::ClearBucket(kind(*k)?),
            ["account"] => Self::AccountInfo,
            ["admin", "stats"] => Self::AdminStats,
            ["admin", "flush"] => Self::AdminClearCache,
            ["noop"] => Self::PageInfo,
            _ => return Err(unknown()),
        };
        Ok(action)
    }
}

impl CallbackAction {
    /// Whether only the owner may trigger this action.
    #[must_use]
    pub const fn is_admin(&self) -> bool {
        matches!(
            self,
            Self::AdminStats | Self::AdminClearCache | Self::Share(_)
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_known_payloads() {
        assert_eq!("menu".parse::<CallbackAction>(), Ok(CallbackAction::MainMenu));
        assert_eq!(
            "list:channels:12:3".parse::<CallbackAction>(),
            Ok(CallbackAction::CategoryItems {
                kind: ContentKind::Channels,
                category_id: "12".to_string(),
                page: 3,
            })
        );
        assert_eq!(
            "adde:77:e21".parse::<CallbackAction>(),
            Ok(CallbackAction::AddEpisode {
                series_id: "77".to_string(),
                episode_id: "e21".to_string(),
            })
        );
        assert_eq!(
            "info:ep:77:e21".parse::<CallbackAction>(),
            Ok(CallbackAction::Details(ItemRef::Episode {
                series_id: "77".to_string(),
                episode_id: "e21".to_string(),
            }))
        );
        assert_eq!(
            "share:movies:9".parse::<CallbackAction>(),
            Ok(CallbackAction::Share(ItemRef::Stream {
                kind: ContentKind::Movies,
                stream_id: "9".to_string(),
            }))
        );
        assert_eq!(
            "all:series:2".parse::<CallbackAction>(),
            Ok(CallbackAction::AllItems {
                kind: ContentKind::Series,
                page: 2,
            })
        );
        assert_eq!(
            "clear:movies".parse::<CallbackAction>(),
            Ok(CallbackAction::ClearBucket(ContentKind::Movies))
        );
    }

    #[test]
    fn test_reject_malformed_payloads() {
        for raw in [
            "",
            "cats:music:0",
            "cats:channels:x",
            "list:series::0",
            "add:movies",
            "admin:reboot",
            "menu:extra",
            "info:ep:77",
            "info:radio:5",
            "share:channels:",
            "all:movies",
        ] {
            assert!(raw.parse::<CallbackAction>().is_err(), "accepted {raw:?}");
        }
    }

    #[test]
    fn test_admin_actions_are_flagged() {
        assert!(CallbackAction::AdminStats.is_admin());
        assert!(CallbackAction::AdminClearCache.is_admin());
        assert!(CallbackAction::Share(ItemRef::Stream {
            kind: ContentKind::Channels,
            stream_id: "5".to_string(),
        })
        .is_admin());
        assert!(!CallbackAction::Details(ItemRef::Stream {
            kind: ContentKind::Channels,
            stream_id: "5".to_string(),
        })
        .is_admin());
        assert!(!CallbackAction::Selections.is_admin());
    }

    #[test]
    fn test_display_fits_callback_limit() {
        let action = CallbackAction::CategoryItems {
            kind: ContentKind::Channels,
            category_id: "1234567890".to_string(),
            page: 999,
        };
        assert!(action.to_string().len() <= 64);
    }
}
