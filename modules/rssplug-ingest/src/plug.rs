// Plug: the ingestion orchestrator.
//
// One tick: fetch the feed → read published links from the log → select new
// items oldest first → convert each to markdown (uploading images) → compose
// → publish, threading long posts. The first tick also publishes the about
// entry if the log has none.

use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tracing::{info, warn};

use rssplug_common::{
    AboutMessage, EntryId, Feed, FeedItem, Message, PlugError, PostMessage,
};

use crate::chunker::Chunker;
use crate::dedup::new_items;
use crate::markup::{self, MarkupConverter};
use crate::media::MediaResolver;
use crate::publisher::ThreadPublisher;
use crate::traits::{ContentStore, EntryLog, FeedSource, Identity, MediaFetcher};

#[derive(Debug, Clone)]
pub struct PlugConfig {
    pub feed_url: String,
    /// Avatar for the about entry.
    pub avatar: Option<String>,
    pub ceiling: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PlugState {
    Bootstrapping,
    Polling,
}

/// Outcome of one tick.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TickReport {
    pub about_published: bool,
    pub new_items: usize,
    pub entries_published: usize,
    pub threads: usize,
}

impl fmt::Display for TickReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "new_items={} entries={} threads={} about={}",
            self.new_items, self.entries_published, self.threads, self.about_published
        )
    }
}

pub struct Plug {
    feeds: Arc<dyn FeedSource>,
    log: Arc<dyn EntryLog>,
    identity: Arc<dyn Identity>,
    media: MediaResolver,
    converter: MarkupConverter,
    publisher: ThreadPublisher,
    config: PlugConfig,
    state: PlugState,
}

impl Plug {
    pub fn new(
        config: PlugConfig,
        feeds: Arc<dyn FeedSource>,
        fetcher: Arc<dyn MediaFetcher>,
        store: Arc<dyn ContentStore>,
        log: Arc<dyn EntryLog>,
        identity: Arc<dyn Identity>,
    ) -> Self {
        let media = MediaResolver::new(fetcher, store);
        let converter = MarkupConverter::new(media.clone());
        let publisher = ThreadPublisher::new(log.clone(), Chunker::new(config.ceiling));

        Self {
            feeds,
            log,
            identity,
            media,
            converter,
            publisher,
            config,
            state: PlugState::Bootstrapping,
        }
    }

    /// Run one poll cycle.
    pub async fn tick(&mut self) -> Result<TickReport, PlugError> {
        let mut report = TickReport::default();

        let feed = self
            .feeds
            .fetch(&self.config.feed_url)
            .await
            .map_err(PlugError::Feed)?;
        info!(feed_url = self.config.feed_url.as_str(), items = feed.items.len(), "plug: fetched feed");

        if self.state == PlugState::Bootstrapping {
            report.about_published = self.bootstrap(&feed).await?.is_some();
            self.state = PlugState::Polling;
        }

        let history = self.log.published_links().await?;
        info!(published = history.len(), "plug: read history from log");

        let fresh = new_items(&feed.items, &history);
        report.new_items = fresh.len();

        for item in &fresh {
            let message = Message::Post(self.compose(item).await?);
            let label = message.label().to_string();
            let published = self
                .publisher
                .publish(message)
                .await
                .map_err(|source| PlugError::Publish { label, source })?;

            info!(
                link = item.link.as_str(),
                root = %published.root,
                entries = published.entries(),
                "plug: published"
            );
            report.entries_published += published.entries();
            if published.is_thread() {
                report.threads += 1;
            }
        }

        Ok(report)
    }

    /// Publish the about entry unless the log already holds one. The check
    /// reads the log every time.
    pub async fn bootstrap(&self, feed: &Feed) -> Result<Option<EntryId>, PlugError> {
        if self.log.has_about().await? {
            info!("plug: about entry already published, skipping");
            return Ok(None);
        }

        let name = feed
            .title
            .clone()
            .filter(|t| !t.trim().is_empty())
            .unwrap_or_else(|| self.config.feed_url.clone());

        let image = match &self.config.avatar {
            Some(url) => Some(self.media.resolve(url).await.map_err(|source| {
                PlugError::Avatar {
                    url: url.clone(),
                    source,
                }
            })?),
            None => None,
        };

        let about = Message::About(AboutMessage {
            about: self.identity.public_id(),
            name,
            image,
        });
        let label = about.label().to_string();

        info!(name = label.as_str(), "plug: publishing about entry");
        let published = self
            .publisher
            .publish(about)
            .await
            .map_err(|source| PlugError::Publish { label, source })?;

        Ok(Some(published.root))
    }

    /// Build the post for a feed item: title heading, optional cover image,
    /// converted body, source link footer.
    pub async fn compose(&self, item: &FeedItem) -> Result<PostMessage, PlugError> {
        info!(title = item.title.as_str(), link = item.link.as_str(), "plug: converting to markdown");

        let markdown = self
            .converter
            .convert(item.body(), Some(&item.link), true)
            .await
            .map_err(|source| PlugError::Conversion {
                link: item.link.clone(),
                source,
            })?;

        let mut text = String::new();
        let title = item.title.trim();
        if !title.is_empty() {
            text.push_str(&format!("# {title}\n"));
        }

        if let Some(cover) = &item.image {
            let media_ref = self.media.resolve(cover).await.map_err(|source| {
                PlugError::CoverImage {
                    link: item.link.clone(),
                    source,
                }
            })?;
            text.push_str(&format!("\n![]({media_ref})\n"));
        }

        if !markdown.is_empty() {
            text.push('\n');
            text.push_str(&markdown);
            text.push('\n');
        }
        text.push_str(&format!("\n---\n[Original post]({})\n", item.link));

        Ok(PostMessage {
            link: item.link.clone(),
            text,
        })
    }

    /// Convert the newest item of `feed_url` without uploading images or
    /// writing to the log.
    pub async fn preview(&self, feed_url: &str) -> Result<String, PlugError> {
        preview_feed(self.feeds.as_ref(), feed_url).await
    }

    /// Tick now, then once per `interval`, until `shutdown` flips to true or
    /// a tick fails. A tick in progress is finished before shutting down.
    pub async fn run(
        &mut self,
        interval: Duration,
        mut shutdown: watch::Receiver<bool>,
    ) -> Result<(), PlugError> {
        loop {
            let report = self.tick().await?;
            info!(%report, "plug: tick complete");

            if *shutdown.borrow() {
                break;
            }

            info!(minutes = interval.as_secs() / 60, "plug: sleeping until next poll");
            tokio::select! {
                changed = shutdown.changed() => {
                    if changed.is_err() {
                        warn!("plug: shutdown channel closed");
                    }
                    break;
                }
                _ = tokio::time::sleep(interval) => {}
            }
        }

        info!("plug: shutting down");
        Ok(())
    }
}

/// Fetch `feed_url` and render its newest item as markdown. Images are
/// dropped; nothing is stored.
pub async fn preview_feed(feeds: &dyn FeedSource, feed_url: &str) -> Result<String, PlugError> {
    let feed = feeds.fetch(feed_url).await.map_err(PlugError::Feed)?;
    let item = feed.items.first().ok_or(PlugError::EmptyFeed)?;

    info!(title = item.title.as_str(), link = item.link.as_str(), "plug: previewing");
    Ok(markup::preview(item.body(), Some(&item.link)))
}
