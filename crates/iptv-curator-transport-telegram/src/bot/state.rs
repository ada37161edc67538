use crate::bot::callbacks::ItemRef;
use iptv_curator_core::config::PlaylistConfig;
use iptv_curator_core::selection::ContentKind;
use serde::{Deserialize, Serialize};

/// Represents the current state of the user dialogue
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq, Eq)]
pub enum State {
    /// No playlist submitted yet
    #[default]
    Start,
    /// Playlist accepted; browsing and curating
    Ready {
        /// Provider credentials of the session
        config: PlaylistConfig,
    },
    /// Waiting for the label of a full-category add
    AwaitingCategoryLabel {
        /// Provider credentials of the session
        config: PlaylistConfig,
        /// Kind of the category being added
        kind: ContentKind,
        /// Provider category id
        category_id: String,
    },
    /// Owner only: waiting for the group that receives an item card
    AwaitingGroupId {
        /// Provider credentials of the session
        config: PlaylistConfig,
        /// Item to broadcast
        item: ItemRef,
    },
}

impl State {
    /// Playlist credentials, if one was accepted.
    #[must_use]
    pub fn config(&self) -> Option<&PlaylistConfig> {
        match self {
            Self::Start => None,
            Self::Ready { config }
            | Self::AwaitingCategoryLabel { config, .. }
            | Self::AwaitingGroupId { config, .. } => Some(config),
        }
    }
}
