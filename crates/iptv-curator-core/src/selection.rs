//! Per-user curated selections
//!
//! Every user owns three ordered buckets (channels, movies, series). Items
//! are deduplicated by id within a bucket and kept in insertion order.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::fmt;
use std::str::FromStr;
use std::sync::{Mutex, PoisonError};

/// Kind of content, also naming a selection bucket
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentKind {
    /// Live channels
    Channels,
    /// Video on demand
    Movies,
    /// Series episodes
    Series,
}

impl ContentKind {
    /// All kinds in export order.
    pub const ALL: [Self; 3] = [Self::Channels, Self::Movies, Self::Series];

    /// Stable lowercase name, also used in callback payloads.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Channels => "channels",
            Self::Movies => "movies",
            Self::Series => "series",
        }
    }

    /// Label given to items whose provider category is unknown.
    #[must_use]
    pub const fn default_label(self) -> &'static str {
        match self {
            Self::Channels => "Channels",
            Self::Movies => "Movies",
            Self::Series => "Series",
        }
    }

    /// Path segment of the stream URL for this kind.
    #[must_use]
    pub const fn url_segment(self) -> &'static str {
        match self {
            Self::Channels => "live",
            Self::Movies => "movie",
            Self::Series => "series",
        }
    }
}

impl fmt::Display for ContentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ContentKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "channels" => Ok(Self::Channels),
            "movies" => Ok(Self::Movies),
            "series" => Ok(Self::Series),
            other => Err(format!("unknown content kind: {other}")),
        }
    }
}

/// Series metadata carried by episode items
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpisodeMeta {
    /// Title of the parent series
    pub series_name: String,
    /// Season number
    pub season: String,
    /// Episode number within the season
    pub episode: String,
}

/// One curated playlist entry
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionItem {
    /// Provider id; identity within a bucket. Empty means missing.
    pub id: String,
    /// Display name
    pub name: String,
    /// Logo URL, possibly empty
    pub logo: String,
    /// File extension used in the stream URL
    pub container: String,
    /// Group label written to the playlist
    pub category: String,
    /// Present for series episodes only
    pub episode: Option<EpisodeMeta>,
}

/// The three buckets of one user
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserSelections {
    /// Selected live channels
    pub channels: Vec<SelectionItem>,
    /// Selected movies
    pub movies: Vec<SelectionItem>,
    /// Selected episodes
    pub series: Vec<SelectionItem>,
}

impl UserSelections {
    /// Items of one bucket.
    #[must_use]
    pub fn bucket(&self, kind: ContentKind) -> &[SelectionItem] {
        match kind {
            ContentKind::Channels => &self.channels,
            ContentKind::Movies => &self.movies,
            ContentKind::Series => &self.series,
        }
    }

    fn bucket_mut(&mut self, kind: ContentKind) -> &mut Vec<SelectionItem> {
        match kind {
            ContentKind::Channels => &mut self.channels,
            ContentKind::Movies => &mut self.movies,
            ContentKind::Series => &mut self.series,
        }
    }

    /// Total number of items across buckets.
    #[must_use]
    pub fn total(&self) -> usize {
        self.channels.len() + self.movies.len() + self.series.len()
    }

    /// Whether every bucket is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.total() == 0
    }

    /// Buckets paired with their kind, in export order.
    pub fn iter(&self) -> impl Iterator<Item = (ContentKind, &SelectionItem)> {
        ContentKind::ALL
            .into_iter()
            .flat_map(move |kind| self.bucket(kind).iter().map(move |item| (kind, item)))
    }
}

/// Per-bucket counts for one user
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SelectionStats {
    /// Channels selected
    pub channels: usize,
    /// Movies selected
    pub movies: usize,
    /// Episodes selected
    pub series: usize,
    /// Sum of the above
    pub total: usize,
}

/// Selections of one user plus the ids held by each bucket
#[derive(Debug, Default)]
struct UserRecord {
    selections: UserSelections,
    channel_ids: HashSet<String>,
    movie_ids: HashSet<String>,
    series_ids: HashSet<String>,
}

impl UserRecord {
    fn ids_mut(&mut self, kind: ContentKind) -> &mut HashSet<String> {
        match kind {
            ContentKind::Channels => &mut self.channel_ids,
            ContentKind::Movies => &mut self.movie_ids,
            ContentKind::Series => &mut self.series_ids,
        }
    }

    fn insert(&mut self, kind: ContentKind, item: SelectionItem) -> bool {
        if !self.ids_mut(kind).insert(item.id.clone()) {
            return false;
        }
        self.selections.bucket_mut(kind).push(item);
        true
    }

    fn clear(&mut self, kind: ContentKind) {
        self.ids_mut(kind).clear();
        self.selections.bucket_mut(kind).clear();
    }
}

/// Thread-safe store of every user's selections
#[derive(Debug, Default)]
pub struct SelectionStore {
    users: Mutex<HashMap<i64, UserRecord>>,
}

impl SelectionStore {
    /// Empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `item` to the `kind` bucket of `user_id`.
    ///
    /// Returns `false` without mutating when the id is empty or already
    /// present in that bucket.
    pub fn add(&self, user_id: i64, kind: ContentKind, item: SelectionItem) -> bool {
        if item.id.is_empty() {
            return false;
        }
        let mut users = self.users.lock().unwrap_or_else(PoisonError::into_inner);
        users.entry(user_id).or_default().insert(kind, item)
    }

    /// Add many items under one lock, returning how many were new.
    pub fn add_all<I>(&self, user_id: i64, kind: ContentKind, items: I) -> usize
    where
        I: IntoIterator<Item = SelectionItem>,
    {
        let mut users = self.users.lock().unwrap_or_else(PoisonError::into_inner);
        let record = users.entry(user_id).or_default();
        items
            .into_iter()
            .filter(|item| !item.id.is_empty())
            .map(|item| record.insert(kind, item))
            .filter(|added| *added)
            .count()
    }

    /// Snapshot of the user's selections, materializing an empty record for
    /// unknown users.
    pub fn get(&self, user_id: i64) -> UserSelections {
        let mut users = self.users.lock().unwrap_or_else(PoisonError::into_inner);
        users.entry(user_id).or_default().selections.clone()
    }

    /// Empty one bucket, or all of them when `kind` is `None`.
    pub fn clear(&self, user_id: i64, kind: Option<ContentKind>) {
        let mut users = self.users.lock().unwrap_or_else(PoisonError::into_inner);
        let record = users.entry(user_id).or_default();
        match kind {
            Some(kind) => record.clear(kind),
            None => *record = UserRecord::default(),
        }
    }

    /// Per-bucket counts for `user_id`.
    pub fn stats(&self, user_id: i64) -> SelectionStats {
        let selections = self.get(user_id);
        SelectionStats {
            channels: selections.channels.len(),
            movies: selections.movies.len(),
            series: selections.series.len(),
            total: selections.total(),
        }
    }

    /// Number of users with a materialized record.
    #[must_use]
    pub fn active_users(&self) -> usize {
        self.users
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Items selected across all users.
    #[must_use]
    pub fn total_selections(&self) -> usize {
        self.users
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .values()
            .map(|record| record.selections.total())
            .sum()
    }
}
