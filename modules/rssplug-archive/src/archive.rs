// Archive: HTTP transport for feeds and media. Every request is bounded by a
// timeout and non-2xx statuses are errors.

use std::time::Duration;

use bytes::Bytes;
use tracing::{debug, info};

use rssplug_common::{Feed, FetchError};

use crate::feed::parse_feed;

/// Timeouts and identification for outgoing requests.
#[derive(Debug, Clone)]
pub struct ArchiveConfig {
    pub feed_timeout: Duration,
    pub media_timeout: Duration,
    pub user_agent: String,
}

impl Default for ArchiveConfig {
    fn default() -> Self {
        Self {
            feed_timeout: Duration::from_secs(60),
            media_timeout: Duration::from_secs(30),
            user_agent: concat!("rssplug-archive/", env!("CARGO_PKG_VERSION")).to_string(),
        }
    }
}

pub struct Archive {
    client: reqwest::Client,
    config: ArchiveConfig,
}

impl Archive {
    pub fn new(config: ArchiveConfig) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(config.user_agent.clone())
            .build()?;
        Ok(Self { client, config })
    }

    /// Fetch and parse an RSS/Atom/JSON feed.
    pub async fn feed(&self, url: &str) -> Result<Feed, FetchError> {
        let bytes = self.get(url, self.config.feed_timeout).await?;
        let feed = parse_feed(&bytes, url)?;

        info!(feed_url = url, items = feed.items.len(), "feed: parsed successfully");
        Ok(feed)
    }

    /// Fetch the raw bytes of a media resource.
    pub async fn fetch_bytes(&self, url: &str) -> Result<Bytes, FetchError> {
        let bytes = self.get(url, self.config.media_timeout).await?;
        debug!(url, size = bytes.len(), "media: fetched");
        Ok(bytes)
    }

    async fn get(&self, url: &str, timeout: Duration) -> Result<Bytes, FetchError> {
        let request_error = |e: reqwest::Error| FetchError::Request {
            url: url.to_string(),
            reason: e.to_string(),
        };

        let resp = self
            .client
            .get(url)
            .timeout(timeout)
            .send()
            .await
            .map_err(request_error)?;

        let status = resp.status();
        if !status.is_success() {
            return Err(FetchError::Status {
                url: url.to_string(),
                status: status.as_u16(),
            });
        }

        resp.bytes().await.map_err(request_error)
    }
}
