// Test doubles for the ingest pipeline.
//
// One per trait boundary:
// - MockFeedSource (FeedSource): url→Feed map, swappable between ticks
// - MockMediaFetcher (MediaFetcher): url→bytes map, 404 for the rest
// - MemoryBlobs (ContentStore): content-addressed map, optionally failing
// - MemoryLog (EntryLog + Identity): Vec-backed log with injectable failure
//
// Plus builders for feed items.

use std::collections::HashMap;
use std::sync::Mutex;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;

use rssplug_common::{
    Entry, EntryId, Feed, FeedItem, FetchError, LogReadError, LogWriteError, MediaRef,
    StoreError, StoredEntry,
};
use rssplug_events::media_ref_for;

use crate::traits::{ContentStore, EntryLog, FeedSource, Identity, MediaFetcher};

// ---------------------------------------------------------------------------
// MockFeedSource
// ---------------------------------------------------------------------------

/// URL→Feed map. Unregistered URLs fail with a request error.
#[derive(Default)]
pub struct MockFeedSource {
    feeds: Mutex<HashMap<String, Feed>>,
    fetches: Mutex<usize>,
}

impl MockFeedSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_feed(self, url: &str, feed: Feed) -> Self {
        self.set_feed(url, feed);
        self
    }

    /// Replace the feed served for `url`.
    pub fn set_feed(&self, url: &str, feed: Feed) {
        self.feeds.lock().unwrap().insert(url.to_string(), feed);
    }

    pub fn fetch_count(&self) -> usize {
        *self.fetches.lock().unwrap()
    }
}

#[async_trait]
impl FeedSource for MockFeedSource {
    async fn fetch(&self, url: &str) -> Result<Feed, FetchError> {
        *self.fetches.lock().unwrap() += 1;
        self.feeds
            .lock()
            .unwrap()
            .get(url)
            .cloned()
            .ok_or_else(|| FetchError::Request {
                url: url.to_string(),
                reason: "MockFeedSource: no feed registered".into(),
            })
    }
}

// ---------------------------------------------------------------------------
// MockMediaFetcher
// ---------------------------------------------------------------------------

/// URL→bytes map. Unregistered URLs answer HTTP 404.
#[derive(Default)]
pub struct MockMediaFetcher {
    images: HashMap<String, Bytes>,
    requests: Mutex<Vec<String>>,
}

impl MockMediaFetcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_image(mut self, url: &str, bytes: &[u8]) -> Self {
        self.images
            .insert(url.to_string(), Bytes::copy_from_slice(bytes));
        self
    }

    /// Every URL requested so far, in order.
    pub fn requests(&self) -> Vec<String> {
        self.requests.lock().unwrap().clone()
    }
}

#[async_trait]
impl MediaFetcher for MockMediaFetcher {
    async fn fetch_bytes(&self, url: &str) -> Result<Bytes, FetchError> {
        self.requests.lock().unwrap().push(url.to_string());
        self.images.get(url).cloned().ok_or_else(|| FetchError::Status {
            url: url.to_string(),
            status: 404,
        })
    }
}

// ---------------------------------------------------------------------------
// MemoryBlobs
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct MemoryBlobs {
    blobs: Mutex<HashMap<MediaRef, Vec<u8>>>,
    failing: bool,
}

impl MemoryBlobs {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every `put` fails.
    pub fn failing(mut self) -> Self {
        self.failing = true;
        self
    }

    pub fn get(&self, media_ref: &MediaRef) -> Option<Vec<u8>> {
        self.blobs.lock().unwrap().get(media_ref).cloned()
    }

    pub fn len(&self) -> usize {
        self.blobs.lock().unwrap().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl ContentStore for MemoryBlobs {
    async fn put(&self, bytes: &[u8]) -> Result<MediaRef, StoreError> {
        if self.failing {
            return Err(StoreError("MemoryBlobs: store unavailable".into()));
        }
        let media_ref = media_ref_for(bytes);
        self.blobs
            .lock()
            .unwrap()
            .insert(media_ref.clone(), bytes.to_vec());
        Ok(media_ref)
    }
}

// ---------------------------------------------------------------------------
// MemoryLog
// ---------------------------------------------------------------------------

/// Vec-backed append-only log for one author.
pub struct MemoryLog {
    author: String,
    entries: Mutex<Vec<StoredEntry>>,
    /// Appends allowed before every further append fails.
    fail_after: Option<usize>,
    scans: Mutex<usize>,
}

impl MemoryLog {
    pub fn new(author: &str) -> Self {
        Self {
            author: author.to_string(),
            entries: Mutex::new(Vec::new()),
            fail_after: None,
            scans: Mutex::new(0),
        }
    }

    /// Seed the log with existing entries.
    pub fn with_entries(self, entries: Vec<Entry>) -> Self {
        {
            let mut stored = self.entries.lock().unwrap();
            for entry in entries {
                let id = EntryId(stored.len() as i64 + 1);
                stored.push(StoredEntry {
                    id,
                    ts: Utc::now(),
                    author: self.author.clone(),
                    entry,
                });
            }
        }
        self
    }

    /// Fail every append after the first `n` succeed.
    pub fn fail_after(mut self, n: usize) -> Self {
        self.fail_after = Some(n);
        self
    }

    pub fn entries(&self) -> Vec<Entry> {
        self.entries
            .lock()
            .unwrap()
            .iter()
            .map(|stored| stored.entry.clone())
            .collect()
    }

    pub fn stored(&self) -> Vec<StoredEntry> {
        self.entries.lock().unwrap().clone()
    }

    pub fn scan_count(&self) -> usize {
        *self.scans.lock().unwrap()
    }
}

#[async_trait]
impl EntryLog for MemoryLog {
    async fn scan(&self) -> Result<Vec<StoredEntry>, LogReadError> {
        *self.scans.lock().unwrap() += 1;
        Ok(self.entries.lock().unwrap().clone())
    }

    async fn append(&self, entry: &Entry) -> Result<EntryId, LogWriteError> {
        let mut stored = self.entries.lock().unwrap();
        if self.fail_after.is_some_and(|n| stored.len() >= n) {
            return Err(LogWriteError("MemoryLog: injected failure".into()));
        }
        let id = EntryId(stored.len() as i64 + 1);
        stored.push(StoredEntry {
            id,
            ts: Utc::now(),
            author: self.author.clone(),
            entry: entry.clone(),
        });
        Ok(id)
    }
}

impl Identity for MemoryLog {
    fn public_id(&self) -> String {
        self.author.clone()
    }
}

// ---------------------------------------------------------------------------
// Builders
// ---------------------------------------------------------------------------

/// A feed item with an HTML paragraph body.
pub fn feed_item(title: &str, link: &str, body_html: &str) -> FeedItem {
    FeedItem {
        title: title.to_string(),
        link: link.to_string(),
        content: body_html.to_string(),
        summary: String::new(),
        image: None,
    }
}

pub fn feed(title: &str, items: Vec<FeedItem>) -> Feed {
    Feed {
        title: Some(title.to_string()),
        items,
    }
}
