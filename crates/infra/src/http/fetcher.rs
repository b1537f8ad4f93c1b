//! HTTP feed fetcher.
//!
//! Downloads iCalendar documents over HTTPS with a request timeout and a hard
//! response size cap. The body is consumed chunk by chunk so an oversized
//! response is rejected as soon as the cap is crossed, without buffering the
//! rest.
//!
//! The fetcher performs no retries of its own; a failed fetch surfaces to the
//! caller and the next scheduled run retries naturally.

use std::time::Duration;

use async_trait::async_trait;
use bookingsync_core::FeedFetcher;
use bookingsync_domain::{FetchError, FetchSettings};
use tracing::{debug, instrument, warn};

use crate::errors::conversions::fetch_error_from_reqwest;

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);
const DEFAULT_MAX_BODY_BYTES: usize = 1024 * 1024;
const DEFAULT_USER_AGENT: &str = "BookingSync/1.0";

/// Feed fetcher backed by a shared `reqwest` client.
#[derive(Debug, Clone)]
pub struct HttpFeedFetcher {
    client: reqwest::Client,
    max_body_bytes: usize,
}

/// Builder for [`HttpFeedFetcher`].
#[derive(Debug)]
pub struct HttpFeedFetcherBuilder {
    timeout: Duration,
    max_body_bytes: usize,
    user_agent: String,
}

impl Default for HttpFeedFetcherBuilder {
    fn default() -> Self {
        Self {
            timeout: DEFAULT_TIMEOUT,
            max_body_bytes: DEFAULT_MAX_BODY_BYTES,
            user_agent: DEFAULT_USER_AGENT.to_string(),
        }
    }
}

impl HttpFeedFetcherBuilder {
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn max_body_bytes(mut self, limit: usize) -> Self {
        self.max_body_bytes = limit;
        self
    }

    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.user_agent = user_agent.into();
        self
    }

    pub fn build(self) -> Result<HttpFeedFetcher, FetchError> {
        let client = reqwest::Client::builder()
            .timeout(self.timeout)
            .user_agent(self.user_agent)
            .build()
            .map_err(|e| FetchError::Network(format!("failed to build HTTP client: {e}")))?;

        Ok(HttpFeedFetcher { client, max_body_bytes: self.max_body_bytes })
    }
}

impl HttpFeedFetcher {
    pub fn builder() -> HttpFeedFetcherBuilder {
        HttpFeedFetcherBuilder::default()
    }

    /// Build a fetcher from loaded configuration.
    pub fn from_settings(settings: &FetchSettings) -> Result<Self, FetchError> {
        Self::builder()
            .timeout(Duration::from_secs(settings.timeout_secs))
            .max_body_bytes(settings.max_body_bytes)
            .user_agent(settings.user_agent.clone())
            .build()
    }
}

#[async_trait]
impl FeedFetcher for HttpFeedFetcher {
    #[instrument(skip(self), fields(url = %url))]
    async fn fetch(&self, url: &str) -> Result<Vec<u8>, FetchError> {
        let mut response = self.client.get(url).send().await.map_err(fetch_error_from_reqwest)?;

        let status = response.status();
        if !status.is_success() {
            warn!(status = status.as_u16(), "feed request returned non-success status");
            return Err(FetchError::HttpStatus(status.as_u16()));
        }

        // Reject early when the server declares an oversized body up front.
        if let Some(length) = response.content_length() {
            if length as usize > self.max_body_bytes {
                return Err(FetchError::TooLarge { limit: self.max_body_bytes });
            }
        }

        let mut body = Vec::new();
        while let Some(chunk) = response.chunk().await.map_err(fetch_error_from_reqwest)? {
            if body.len() + chunk.len() > self.max_body_bytes {
                return Err(FetchError::TooLarge { limit: self.max_body_bytes });
            }
            body.extend_from_slice(&chunk);
        }

        debug!(bytes = body.len(), "feed document fetched");
        Ok(body)
    }
}
