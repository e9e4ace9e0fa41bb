//! HTTP page source for the paginated articles API.
//!
//! Issues `GET <base_url>?page=<n>` and decodes the JSON body into a
//! [`PageResponse`]. There is no retry: a non-success status, a transport
//! failure or a decode failure ends the call with an error.
//!
//! ```ascii
//! ┌────────────────┐   GET ?page=n   ┌─────────────────┐
//! │ HttpPageSource │ ──────────────► │  Articles API   │
//! │                │ ◄────────────── │                 │
//! └────────────────┘   JSON page     └─────────────────┘
//! ```

use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error};

use crate::config::PipelineConfig;
use crate::error::{ArticlesError, Result};
use crate::traits::{PageResponse, PageSource};

/// Default articles API endpoint.
pub const DEFAULT_BASE_URL: &str = "https://jsonmock.hackerrank.com/api/articles";

/// Default per-request timeout.
pub const DEFAULT_REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

/// Page source backed by the remote articles API.
#[derive(Debug, Clone)]
pub struct HttpPageSource {
    client: Client,
    base_url: String,
}

impl HttpPageSource {
    /// Create a source for `base_url` with the given request timeout.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .pool_max_idle_per_host(1)
            .pool_idle_timeout(Duration::from_secs(60))
            .build()
            .map_err(|e| ArticlesError::NetworkError(e.to_string()))?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    /// Create a source from pipeline configuration.
    pub fn from_config(config: &PipelineConfig) -> Result<Self> {
        Self::new(config.base_url.clone(), config.request_timeout)
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn request_page(&self, page: u32) -> Result<PageResponse> {
        let response = self
            .client
            .get(&self.base_url)
            .query(&[("page", page)])
            .send()
            .await
            .map_err(|e| {
                error!(page, error = %e, "External API error");
                ArticlesError::from(e)
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(ArticlesError::ApiError {
                page,
                status: status.as_u16(),
            });
        }

        let body = response.bytes().await?;
        let decoded: PageResponse = serde_json::from_slice(&body)?;
        Ok(decoded)
    }
}

#[async_trait]
impl PageSource for HttpPageSource {
    fn name(&self) -> &str {
        "http"
    }

    async fn fetch_page(&self, page: u32, cancel: &CancellationToken) -> Result<PageResponse> {
        debug!(page, url = %self.base_url, "Fetching page");

        tokio::select! {
            biased;
            _ = cancel.cancelled() => Err(ArticlesError::Cancelled),
            result = self.request_page(page) => result,
        }
    }
}
