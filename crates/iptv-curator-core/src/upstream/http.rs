//! reqwest-backed implementation of [`UpstreamTransport`].

use super::{ApiParams, RawResponse, UpstreamError, UpstreamTransport};
use async_trait::async_trait;
use reqwest::Client as HttpClient;
use std::time::Duration;
use tracing::trace;

/// Creates an HTTP client with a bounded timeout.
///
/// Prevents a slow provider from hanging a handler. Falls back to a default
/// client if the builder fails.
#[must_use]
pub fn create_http_client(timeout: Duration) -> HttpClient {
    HttpClient::builder()
        .timeout(timeout)
        .connect_timeout(timeout)
        .build()
        .unwrap_or_else(|_| HttpClient::new())
}

/// Transport issuing real HTTP requests to the provider.
#[derive(Clone)]
pub struct ReqwestTransport {
    client: HttpClient,
}

impl ReqwestTransport {
    /// Create a transport whose requests time out after `timeout`.
    #[must_use]
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: create_http_client(timeout),
        }
    }

    async fn into_raw(response: reqwest::Response) -> Result<RawResponse, UpstreamError> {
        let status = response.status().as_u16();
        let body = response.text().await?;
        trace!(status, body_len = body.len(), "Upstream response received");
        Ok(RawResponse { status, body })
    }
}

#[async_trait]
impl UpstreamTransport for ReqwestTransport {
    async fn get(&self, url: &str, params: &ApiParams) -> Result<RawResponse, UpstreamError> {
        let response = self.client.get(url).query(params).send().await?;
        Self::into_raw(response).await
    }

    async fn post_form(&self, url: &str, params: &ApiParams) -> Result<RawResponse, UpstreamError> {
        let response = self.client.post(url).form(params).send().await?;
        Self::into_raw(response).await
    }
}
