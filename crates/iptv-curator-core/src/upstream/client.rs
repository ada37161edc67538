//! Typed provider API calls
//!
//! Thin wrappers over [`RequestCache`] that turn raw payloads into the
//! records of [`super::models`]. A `None` listing means the provider could
//! not be reached; `Some(vec![])` means it answered with nothing.

use super::models::{parse_list, AccountSummary, Category, SeriesEntry, SeriesInfo, Stream};
use super::{ApiAction, ApiParams, RequestCache, UpstreamError, UpstreamTransport};
use crate::config::PlaylistConfig;
use crate::selection::ContentKind;
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

/// Outcome of probing a provider with freshly submitted credentials
#[derive(Debug)]
pub enum ConnectionCheck {
    /// The provider returned account details
    Authenticated,
    /// The provider answered 200 without an error marker
    Accepted,
    /// The provider answered, but refused the credentials
    Rejected(String),
    /// The provider could not be reached or answered non-200
    Failed(UpstreamError),
}

impl ConnectionCheck {
    /// Whether the credentials may be used.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        matches!(self, Self::Authenticated | Self::Accepted)
    }

    fn from_body(body: &str) -> Self {
        match serde_json::from_str::<Value>(body) {
            Ok(Value::Object(map)) if map.contains_key("user_info") => Self::Authenticated,
            Ok(Value::Object(map)) => match map.get("error") {
                Some(err) if is_truthy(err) => Self::Rejected(err.to_string()),
                _ => Self::Accepted,
            },
            Ok(other) => Self::Rejected(format!("unexpected payload: {other}")),
            Err(_) => Self::Accepted,
        }
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Null => false,
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => !s.is_empty(),
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
    }
}

const fn categories_action(kind: ContentKind) -> ApiAction {
    match kind {
        ContentKind::Channels => ApiAction::GetLiveCategories,
        ContentKind::Movies => ApiAction::GetVodCategories,
        ContentKind::Series => ApiAction::GetSeriesCategories,
    }
}

/// Typed client over the memoizing cache.
#[derive(Clone)]
pub struct XtreamClient {
    cache: RequestCache,
    direct: Arc<dyn UpstreamTransport>,
}

impl XtreamClient {
    /// Creates a client.
    ///
    /// `direct` is used, uncached, for connection tests only and should carry
    /// the shorter connection-test timeout.
    #[must_use]
    pub fn new(cache: RequestCache, direct: Arc<dyn UpstreamTransport>) -> Self {
        Self { cache, direct }
    }

    /// The underlying request cache.
    #[must_use]
    pub const fn cache(&self) -> &RequestCache {
        &self.cache
    }

    /// Check the provider with `get_account_info`, bypassing the cache.
    pub async fn check_connection(&self, config: &PlaylistConfig) -> ConnectionCheck {
        let params = ApiParams::for_action(config, ApiAction::GetAccountInfo);
        let check = match self.direct.get(&config.api_url, &params).await {
            Ok(resp) if resp.is_ok() => ConnectionCheck::from_body(&resp.body),
            Ok(resp) => ConnectionCheck::Failed(UpstreamError::Status(resp.status)),
            Err(e) => ConnectionCheck::Failed(e),
        };
        info!(server = %config.server, ok = check.is_ok(), "Connection test finished");
        check
    }

    /// Whether `config` holds working credentials.
    pub async fn test_connection(&self, config: &PlaylistConfig) -> bool {
        self.check_connection(config).await.is_ok()
    }

    /// Categories of `kind`.
    pub async fn categories(
        &self,
        config: &PlaylistConfig,
        kind: ContentKind,
    ) -> Option<Vec<Category>> {
        let params = ApiParams::for_action(config, categories_action(kind));
        let payload = self.cache.fetch(config, &params).await?;
        Some(parse_list(&payload))
    }

    /// Name of category `category_id` of `kind`, if the provider lists it.
    pub async fn category_name(
        &self,
        config: &PlaylistConfig,
        kind: ContentKind,
        category_id: &str,
    ) -> Option<String> {
        self.categories(config, kind)
            .await?
            .into_iter()
            .find(|c| c.category_id.as_deref() == Some(category_id))
            .and_then(|c| c.category_name)
    }

    /// Channels or movies, scoped to `category_id` when given.
    ///
    /// # Errors
    ///
    /// Returns `UpstreamError::Decode` when asked for series, and any error
    /// of the underlying fetch.
    pub async fn try_streams(
        &self,
        config: &PlaylistConfig,
        kind: ContentKind,
        category_id: Option<&str>,
    ) -> Result<Vec<Stream>, UpstreamError> {
        let action = match kind {
            ContentKind::Channels => ApiAction::GetLiveStreams,
            ContentKind::Movies => ApiAction::GetVodStreams,
            ContentKind::Series => {
                return Err(UpstreamError::Decode(
                    "series are listed through get_series".to_string(),
                ))
            }
        };
        let payload = self
            .cache
            .try_fetch(config, &scoped(config, action, category_id))
            .await?;
        Ok(parse_list(&payload))
    }

    /// Channels or movies, `None` if the provider could not be reached.
    pub async fn streams(
        &self,
        config: &PlaylistConfig,
        kind: ContentKind,
        category_id: Option<&str>,
    ) -> Option<Vec<Stream>> {
        self.try_streams(config, kind, category_id)
            .await
            .map_err(|e| warn!(kind = kind.as_str(), "Stream listing failed: {e}"))
            .ok()
    }

    /// Series, scoped to `category_id` when given.
    ///
    /// # Errors
    ///
    /// Returns any error of the underlying fetch.
    pub async fn try_series_list(
        &self,
        config: &PlaylistConfig,
        category_id: Option<&str>,
    ) -> Result<Vec<SeriesEntry>, UpstreamError> {
        let payload = self
            .cache
            .try_fetch(config, &scoped(config, ApiAction::GetSeries, category_id))
            .await?;
        Ok(parse_list(&payload))
    }

    /// Series, `None` if the provider could not be reached.
    pub async fn series_list(
        &self,
        config: &PlaylistConfig,
        category_id: Option<&str>,
    ) -> Option<Vec<SeriesEntry>> {
        self.try_series_list(config, category_id)
            .await
            .map_err(|e| warn!("Series listing failed: {e}"))
            .ok()
    }

    /// Seasons and episodes of one series.
    pub async fn series_info(
        &self,
        config: &PlaylistConfig,
        series_id: &str,
    ) -> Option<SeriesInfo> {
        let params =
            ApiParams::for_action(config, ApiAction::GetSeriesInfo).with("series_id", series_id);
        let payload = self.cache.fetch(config, &params).await?;
        Some(SeriesInfo::from_payload(&payload))
    }

    /// Account summary with every default applied; never fails.
    pub async fn account_summary(&self, config: &PlaylistConfig) -> AccountSummary {
        let params = ApiParams::for_action(config, ApiAction::GetAccountInfo);
        match self.cache.fetch(config, &params).await {
            Some(payload) => {
                AccountSummary::from_payload(&config.server, &config.username, &payload)
            }
            None => AccountSummary::unreachable(&config.server, &config.username),
        }
    }
}

fn scoped(config: &PlaylistConfig, action: ApiAction, category_id: Option<&str>) -> ApiParams {
    let params = ApiParams::for_action(config, action);
    match category_id {
        Some(id) => params.with("category_id", id),
        None => params,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::upstream::{MockUpstreamTransport, RawResponse};
    use std::time::Duration;

    fn config() -> PlaylistConfig {
        PlaylistConfig::new("http://x.tv", "u1", "p1")
    }

    fn client(api: MockUpstreamTransport, direct: MockUpstreamTransport) -> XtreamClient {
        let cache = RequestCache::new(Arc::new(api), Duration::from_secs(3600), 100);
        XtreamClient::new(cache, Arc::new(direct))
    }

    fn direct_returning(status: u16, body: &'static str) -> MockUpstreamTransport {
        let mut direct = MockUpstreamTransport::new();
        direct
            .expect_get()
            .withf(|_, params| params.get("action") == Some("get_account_info"))
            .returning(move |_, _| Ok(RawResponse::new(status, body)));
        direct
    }

    #[tokio::test]
    async fn test_connection_outcomes() {
        let cases = [
            (200, r#"{"user_info":{"auth":1}}"#, true),
            (200, r#"{"server_info":{}}"#, true),
            (200, r#"{"error":"invalid credentials"}"#, false),
            (200, r#"{"error":""}"#, true),
            (200, "<html>ok</html>", true),
            (200, "[1,2]", false),
            (401, "", false),
        ];
        for (status, body, expected) in cases {
            let c = client(MockUpstreamTransport::new(), direct_returning(status, body));
            assert_eq!(c.test_connection(&config()).await, expected, "body: {body}");
        }
    }

    #[tokio::test]
    async fn test_connection_timeout_fails() {
        let mut direct = MockUpstreamTransport::new();
        direct.expect_get().returning(|_, _| Err(UpstreamError::Timeout));
        let c = client(MockUpstreamTransport::new(), direct);
        assert!(matches!(
            c.check_connection(&config()).await,
            ConnectionCheck::Failed(UpstreamError::Timeout)
        ));
    }

    #[tokio::test]
    async fn test_streams_are_category_scoped() {
        let mut api = MockUpstreamTransport::new();
        api.expect_get()
            .withf(|_, p| {
                p.get("action") == Some("get_vod_streams") && p.get("category_id") == Some("9")
            })
            .times(1)
            .returning(|_, _| Ok(RawResponse::new(200, r#"[{"stream_id":1,"name":"Film"}]"#)));
        let c = client(api, MockUpstreamTransport::new());

        let movies = c
            .streams(&config(), ContentKind::Movies, Some("9"))
            .await
            .expect("reachable");
        assert_eq!(movies.len(), 1);
        assert_eq!(movies[0].item_id(), "1");
    }

    #[tokio::test]
    async fn test_unreachable_is_distinct_from_empty() {
        let mut api = MockUpstreamTransport::new();
        api.expect_get()
            .withf(|_, p| p.get("action") == Some("get_series"))
            .returning(|_, _| Err(UpstreamError::Network("refused".into())));
        api.expect_get()
            .withf(|_, p| p.get("action") == Some("get_live_categories"))
            .returning(|_, _| Ok(RawResponse::new(200, "[]")));
        let c = client(api, MockUpstreamTransport::new());

        assert!(c.series_list(&config(), None).await.is_none());
        assert_eq!(
            c.categories(&config(), ContentKind::Channels).await,
            Some(vec![])
        );
    }

    #[tokio::test]
    async fn test_category_name_lookup() {
        let mut api = MockUpstreamTransport::new();
        api.expect_get().returning(|_, _| {
            Ok(RawResponse::new(
                200,
                r#"[{"category_id":3,"category_name":"News"},{"category_id":"4"}]"#,
            ))
        });
        let c = client(api, MockUpstreamTransport::new());

        let name = c
            .category_name(&config(), ContentKind::Channels, "3")
            .await;
        assert_eq!(name.as_deref(), Some("News"));
        assert_eq!(
            c.category_name(&config(), ContentKind::Channels, "4").await,
            None
        );
    }

    #[tokio::test]
    async fn test_account_summary_when_unreachable() {
        let mut api = MockUpstreamTransport::new();
        api.expect_get().returning(|_, _| Err(UpstreamError::Timeout));
        let c = client(api, MockUpstreamTransport::new());

        let summary = c.account_summary(&config()).await;
        assert_eq!(summary.status, "Connected");
        assert_eq!(summary.exp_date, "N/A");
        assert_eq!(summary.username, "u1");
    }
}
