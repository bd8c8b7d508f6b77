// Trait abstractions for the pipeline's collaborators.
//
// FeedSource + MediaFetcher replace Archive, EntryLog + Identity replace
// EntryStore, ContentStore replaces BlobStore. The in-memory doubles in
// `testing` implement the same traits.

use std::collections::HashSet;

use async_trait::async_trait;
use bytes::Bytes;

use rssplug_archive::Archive;
use rssplug_common::{
    Entry, EntryId, Feed, FetchError, LogReadError, LogWriteError, MediaRef, StoreError,
    StoredEntry,
};
use rssplug_events::{BlobStore, EntryStore};

// ---------------------------------------------------------------------------
// Transport
// ---------------------------------------------------------------------------

#[async_trait]
pub trait FeedSource: Send + Sync {
    /// Fetch a feed. Items are newest first.
    async fn fetch(&self, url: &str) -> Result<Feed, FetchError>;
}

#[async_trait]
pub trait MediaFetcher: Send + Sync {
    /// Fetch the raw bytes behind a media URL.
    async fn fetch_bytes(&self, url: &str) -> Result<Bytes, FetchError>;
}

#[async_trait]
impl FeedSource for Archive {
    async fn fetch(&self, url: &str) -> Result<Feed, FetchError> {
        self.feed(url).await
    }
}

#[async_trait]
impl MediaFetcher for Archive {
    async fn fetch_bytes(&self, url: &str) -> Result<Bytes, FetchError> {
        Archive::fetch_bytes(self, url).await
    }
}

// ---------------------------------------------------------------------------
// Storage
// ---------------------------------------------------------------------------

#[async_trait]
pub trait ContentStore: Send + Sync {
    async fn put(&self, bytes: &[u8]) -> Result<MediaRef, StoreError>;
}

/// The local identity's append-only log.
#[async_trait]
pub trait EntryLog: Send + Sync {
    /// Every entry, in append order.
    async fn scan(&self) -> Result<Vec<StoredEntry>, LogReadError>;

    /// Append one entry and return its assigned identifier.
    async fn append(&self, entry: &Entry) -> Result<EntryId, LogWriteError>;

    /// Links of every published post.
    async fn published_links(&self) -> Result<HashSet<String>, LogReadError> {
        Ok(self
            .scan()
            .await?
            .into_iter()
            .filter_map(|stored| stored.entry.link().map(str::to_string))
            .collect())
    }

    /// Whether an about entry exists.
    async fn has_about(&self) -> Result<bool, LogReadError> {
        Ok(self
            .scan()
            .await?
            .iter()
            .any(|stored| matches!(stored.entry, Entry::About(_))))
    }
}

/// Exposes the public identifier of the identity that owns the log.
pub trait Identity: Send + Sync {
    fn public_id(&self) -> String;
}

#[async_trait]
impl ContentStore for BlobStore {
    async fn put(&self, bytes: &[u8]) -> Result<MediaRef, StoreError> {
        BlobStore::put(self, bytes).await
    }
}

#[async_trait]
impl EntryLog for EntryStore {
    async fn scan(&self) -> Result<Vec<StoredEntry>, LogReadError> {
        EntryStore::scan(self).await
    }

    async fn append(&self, entry: &Entry) -> Result<EntryId, LogWriteError> {
        EntryStore::append(self, entry).await
    }

    async fn published_links(&self) -> Result<HashSet<String>, LogReadError> {
        EntryStore::published_links(self).await
    }

    async fn has_about(&self) -> Result<bool, LogReadError> {
        EntryStore::has_about(self).await
    }
}

impl Identity for EntryStore {
    fn public_id(&self) -> String {
        self.author().to_string()
    }
}
