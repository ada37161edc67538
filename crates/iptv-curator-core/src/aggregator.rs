//! Category aggregation and single-item adds
//!
//! Turns provider listings into [`SelectionItem`]s and feeds them into the
//! [`SelectionStore`]. Missing fields fall back to the placeholders defined
//! in [`crate::upstream::models`]; unparseable items are skipped one by one.

use crate::config::PlaylistConfig;
use crate::selection::{ContentKind, EpisodeMeta, SelectionItem, SelectionStore};
use crate::upstream::models::{
    Episode, Stream, DEFAULT_LIVE_CONTAINER, DEFAULT_VOD_CONTAINER, UNNAMED_CHANNEL,
    UNNAMED_MOVIE, UNNAMED_SERIES,
};
use crate::upstream::{UpstreamError, XtreamClient};
use std::sync::Arc;
use tracing::{debug, info};

/// Result of adding one item
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AddOutcome {
    /// The item was appended to the selection
    Added,
    /// The selection already held an item with that id
    AlreadyPresent,
    /// The provider listing does not contain the item
    NotFound,
    /// The provider could not be reached
    Unavailable,
}

/// Result of resolving one item against the provider
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// The item as it would be stored
    Found(SelectionItem),
    /// The provider listing does not contain the item
    NotFound,
    /// The provider could not be reached
    Unavailable,
}

/// Builds selection items from provider data.
#[derive(Clone)]
pub struct Aggregator {
    client: XtreamClient,
    store: Arc<SelectionStore>,
}

impl Aggregator {
    /// Creates an aggregator writing into `store`.
    #[must_use]
    pub fn new(client: XtreamClient, store: Arc<SelectionStore>) -> Self {
        Self { client, store }
    }

    /// Add every item of a provider category, labelled `custom_label`.
    ///
    /// Returns the number of items actually added; `0` when the provider
    /// is unreachable or the category is empty.
    pub async fn add_full_category(
        &self,
        user_id: i64,
        config: &PlaylistConfig,
        kind: ContentKind,
        category_id: &str,
        custom_label: &str,
    ) -> usize {
        self.try_add_full_category(user_id, config, kind, category_id, custom_label)
            .await
            .unwrap_or(0)
    }

    /// Like [`Self::add_full_category`], but reports a failed top-level
    /// listing instead of returning `0`.
    ///
    /// For series, a failed `get_series_info` of one series skips that
    /// series only.
    ///
    /// # Errors
    ///
    /// Returns `UpstreamError` if the category listing itself could not be
    /// fetched.
    pub async fn try_add_full_category(
        &self,
        user_id: i64,
        config: &PlaylistConfig,
        kind: ContentKind,
        category_id: &str,
        custom_label: &str,
    ) -> Result<usize, UpstreamError> {
        let added = match kind {
            ContentKind::Channels | ContentKind::Movies => {
                let streams = self
                    .client
                    .try_streams(config, kind, Some(category_id))
                    .await?;
                let items = streams
                    .iter()
                    .map(|stream| stream_item(stream, kind, custom_label));
                self.store.add_all(user_id, kind, items)
            }
            ContentKind::Series => {
                self.add_series_category(user_id, config, category_id, custom_label)
                    .await?
            }
        };

        info!(
            user_id,
            kind = kind.as_str(),
            category_id,
            added,
            "Full category added"
        );
        Ok(added)
    }

    async fn add_series_category(
        &self,
        user_id: i64,
        config: &PlaylistConfig,
        category_id: &str,
        custom_label: &str,
    ) -> Result<usize, UpstreamError> {
        let series_list = self
            .client
            .try_series_list(config, Some(category_id))
            .await?;

        let mut added = 0;
        for series in series_list {
            let series_id = series.item_id();
            if series_id.is_empty() {
                continue;
            }
            let Some(info) = self.client.series_info(config, &series_id).await else {
                debug!(series_id = %series_id, "Skipping series without details");
                continue;
            };

            let title = series.title();
            let cover = series.cover();
            let items = info.all_episodes().into_iter().map(|(season, episode)| {
                episode_item(&title, &cover, &season, &episode, custom_label)
            });
            added += self.store.add_all(user_id, ContentKind::Series, items);
        }
        Ok(added)
    }

    /// Resolve one channel or movie into the item it would be added as.
    pub async fn lookup_stream(
        &self,
        config: &PlaylistConfig,
        kind: ContentKind,
        stream_id: &str,
    ) -> Lookup {
        if kind == ContentKind::Series {
            return Lookup::NotFound;
        }
        let Some(streams) = self.client.streams(config, kind, None).await else {
            return Lookup::Unavailable;
        };
        let Some(stream) = streams.into_iter().find(|s| s.item_id() == stream_id) else {
            return Lookup::NotFound;
        };

        let label = match (&stream.category_name, &stream.category_id) {
            (Some(name), _) => name.clone(),
            (None, Some(id)) => self
                .client
                .category_name(config, kind, id)
                .await
                .unwrap_or_else(|| kind.default_label().to_string()),
            (None, None) => kind.default_label().to_string(),
        };

        Lookup::Found(stream_item(&stream, kind, &label))
    }

    /// Resolve one episode of a series into the item it would be added as.
    pub async fn lookup_episode(
        &self,
        config: &PlaylistConfig,
        series_id: &str,
        episode_id: &str,
    ) -> Lookup {
        let Some(info) = self.client.series_info(config, series_id).await else {
            return Lookup::Unavailable;
        };
        let Some((season, episode)) = info
            .all_episodes()
            .into_iter()
            .find(|(_, e)| e.item_id() == episode_id)
        else {
            return Lookup::NotFound;
        };

        let details = info.info.unwrap_or_default();
        let title = details.name.unwrap_or_else(|| UNNAMED_SERIES.to_string());
        let cover = details.cover.unwrap_or_default();
        let label = match details.category_id {
            Some(id) => self
                .client
                .category_name(config, ContentKind::Series, &id)
                .await
                .unwrap_or_else(|| ContentKind::Series.default_label().to_string()),
            None => ContentKind::Series.default_label().to_string(),
        };

        Lookup::Found(episode_item(&title, &cover, &season, &episode, &label))
    }

    /// Add one channel or movie, keeping its provider category as label.
    pub async fn add_stream(
        &self,
        user_id: i64,
        config: &PlaylistConfig,
        kind: ContentKind,
        stream_id: &str,
    ) -> AddOutcome {
        match self.lookup_stream(config, kind, stream_id).await {
            Lookup::Found(item) => self.record(user_id, kind, item),
            Lookup::NotFound => AddOutcome::NotFound,
            Lookup::Unavailable => AddOutcome::Unavailable,
        }
    }

    /// Add a single episode of a series.
    pub async fn add_episode(
        &self,
        user_id: i64,
        config: &PlaylistConfig,
        series_id: &str,
        episode_id: &str,
    ) -> AddOutcome {
        match self.lookup_episode(config, series_id, episode_id).await {
            Lookup::Found(item) => self.record(user_id, ContentKind::Series, item),
            Lookup::NotFound => AddOutcome::NotFound,
            Lookup::Unavailable => AddOutcome::Unavailable,
        }
    }

    fn record(&self, user_id: i64, kind: ContentKind, item: SelectionItem) -> AddOutcome {
        let id = item.id.clone();
        if self.store.add(user_id, kind, item) {
            info!(user_id, kind = kind.as_str(), id = %id, "Item added");
            AddOutcome::Added
        } else {
            AddOutcome::AlreadyPresent
        }
    }
}

fn stream_item(stream: &Stream, kind: ContentKind, label: &str) -> SelectionItem {
    let (placeholder, container) = match kind {
        ContentKind::Channels => (UNNAMED_CHANNEL, DEFAULT_LIVE_CONTAINER),
        ContentKind::Movies | ContentKind::Series => (UNNAMED_MOVIE, DEFAULT_VOD_CONTAINER),
    };
    SelectionItem {
        id: stream.item_id(),
        name: stream.name_or(placeholder),
        logo: stream.logo(),
        container: stream.container_or(container),
        category: label.to_string(),
        episode: None,
    }
}

fn episode_item(
    series_name: &str,
    cover: &str,
    season: &str,
    episode: &Episode,
    label: &str,
) -> SelectionItem {
    let number = episode.number();
    SelectionItem {
        id: episode.item_id(),
        name: format!(
            "{series_name} - S{season}E{number} - {}",
            episode.title()
        ),
        logo: cover.to_string(),
        container: episode.container(),
        category: label.to_string(),
        episode: Some(EpisodeMeta {
            series_name: series_name.to_string(),
            season: season.to_string(),
            episode: number,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upstream::{MockUpstreamTransport, RawResponse, RequestCache};
    use std::time::Duration;

    fn config() -> PlaylistConfig {
        PlaylistConfig::new("http://x.tv", "u1", "p1")
    }

    fn aggregator(api: MockUpstreamTransport) -> (Aggregator, Arc<SelectionStore>) {
        let cache = RequestCache::new(Arc::new(api), Duration::from_secs(3600), 100);
        let client = XtreamClient::new(cache, Arc::new(MockUpstreamTransport::new()));
        let store = Arc::new(SelectionStore::new());
        (Aggregator::new(client, Arc::clone(&store)), store)
    }

    fn answer(action: &'static str, body: &'static str, api: &mut MockUpstreamTransport) {
        api.expect_get()
            .withf(move |_, p| p.get("action") == Some(action))
            .returning(move |_, _| Ok(RawResponse::new(200, body)));
    }

    #[tokio::test]
    async fn test_channel_category_uses_custom_label_and_defaults() {
        let mut api = MockUpstreamTransport::new();
        answer(
            "get_live_streams",
            r#"[{"stream_id":5,"name":"ESPN","category_name":"Desportos"},{"id":"6"},{"name":"no id"}]"#,
            &mut api,
        );
        let (agg, store) = aggregator(api);

        let added = agg
            .add_full_category(42, &config(), ContentKind::Channels, "1", "Sports")
            .await;
        assert_eq!(added, 2);

        let channels = store.get(42).channels;
        assert!(channels.iter().all(|c| c.category == "Sports"));
        assert_eq!(channels[1].name, UNNAMED_CHANNEL);
        assert_eq!(channels[1].container, "ts");

        // Second run adds nothing new
        assert_eq!(
            agg.add_full_category(42, &config(), ContentKind::Channels, "1", "Sports")
                .await,
            0
        );
    }

    #[tokio::test]
    async fn test_movie_container_defaults_to_mp4() {
        let mut api = MockUpstreamTransport::new();
        answer("get_vod_streams", r#"[{"stream_id":9}]"#, &mut api);
        let (agg, store) = aggregator(api);

        agg.add_full_category(1, &config(), ContentKind::Movies, "2", "Films")
            .await;
        let movie = &store.get(1).movies[0];
        assert_eq!(movie.container, "mp4");
        assert_eq!(movie.name, UNNAMED_MOVIE);
    }

    #[tokio::test]
    async fn test_unreachable_category_is_an_error() {
        let mut api = MockUpstreamTransport::new();
        api.expect_get()
            .returning(|_, _| Err(UpstreamError::Network("refused".into())));
        let (agg, _) = aggregator(api);

        let result = agg
            .try_add_full_category(1, &config(), ContentKind::Channels, "1", "X")
            .await;
        assert!(matches!(result, Err(UpstreamError::Network(_))));
        assert_eq!(
            agg.add_full_category(1, &config(), ContentKind::Channels, "1", "X")
                .await,
            0
        );
    }

    #[tokio::test]
    async fn test_add_stream_preserves_provider_category() {
        let mut api = MockUpstreamTransport::new();
        answer(
            "get_live_streams",
            r#"[{"stream_id":5,"name":"ESPN","category_id":"3"},{"stream_id":6,"name":"CNN"}]"#,
            &mut api,
        );
        answer(
            "get_live_categories",
            r#"[{"category_id":"3","category_name":"Sports"}]"#,
            &mut api,
        );
        let (agg, store) = aggregator(api);

        assert_eq!(
            agg.add_stream(42, &config(), ContentKind::Channels, "5").await,
            AddOutcome::Added
        );
        assert_eq!(
            agg.add_stream(42, &config(), ContentKind::Channels, "5").await,
            AddOutcome::AlreadyPresent
        );
        assert_eq!(
            agg.add_stream(42, &config(), ContentKind::Channels, "6").await,
            AddOutcome::Added
        );
        assert_eq!(
            agg.add_stream(42, &config(), ContentKind::Channels, "404").await,
            AddOutcome::NotFound
        );

        let channels = store.get(42).channels;
        assert_eq!(channels[0].category, "Sports");
        assert_eq!(channels[1].category, "Channels");
    }

    #[tokio::test]
    async fn test_add_episode_synthesizes_name() {
        let mut api = MockUpstreamTransport::new();
        answer(
            "get_series_info",
            r#"{"info":{"name":"Dark","cover":"http://img/dark.jpg"},
                "episodes":{"2":[{"id":"e21","episode_num":1,"title":"Return","container_extension":"mkv"}]}}"#,
            &mut api,
        );
        let (agg, store) = aggregator(api);

        assert_eq!(
            agg.add_episode(7, &config(), "77", "e21").await,
            AddOutcome::Added
        );
        assert_eq!(
            agg.add_episode(7, &config(), "77", "nope").await,
            AddOutcome::NotFound
        );

        let episode = &store.get(7).series[0];
        assert_eq!(episode.name, "Dark - S2E1 - Return");
        assert_eq!(episode.logo, "http://img/dark.jpg");
        assert_eq!(episode.container, "mkv");
        assert_eq!(episode.category, "Series");
        assert_eq!(
            episode.episode,
            Some(EpisodeMeta {
                series_name: "Dark".to_string(),
                season: "2".to_string(),
                episode: "1".to_string(),
            })
        );
    }

    #[tokio::test]
    async fn test_lookup_resolves_without_selecting() {
        let mut api = MockUpstreamTransport::new();
        answer(
            "get_vod_streams",
            r#"[{"stream_id":9,"name":"Heat","category_name":"Crime","container_extension":"mkv"}]"#,
            &mut api,
        );
        let (agg, store) = aggregator(api);

        let Lookup::Found(item) = agg.lookup_stream(&config(), ContentKind::Movies, "9").await
        else {
            panic!("movie 9 should resolve");
        };
        assert_eq!(item.name, "Heat");
        assert_eq!(item.category, "Crime");
        assert_eq!(item.container, "mkv");
        assert_eq!(
            agg.lookup_stream(&config(), ContentKind::Movies, "10").await,
            Lookup::NotFound
        );
        assert!(store.get(1).is_empty());
    }

    #[tokio::test]
    async fn test_lookup_reports_unreachable_provider() {
        let mut api = MockUpstreamTransport::new();
        api.expect_get()
            .returning(|_, _| Err(UpstreamError::Network("refused".into())));
        let (agg, _) = aggregator(api);

        assert_eq!(
            agg.lookup_episode(&config(), "77", "e21").await,
            Lookup::Unavailable
        );
    }
}
