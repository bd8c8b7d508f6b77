use std::sync::Arc;

use tracing::info;

use rssplug_common::{MediaError, MediaRef};

use crate::traits::{ContentStore, MediaFetcher};

/// Fetches an image and hands its bytes to the content store.
///
/// One network read and one store write per call. No retries: the caller
/// decides what a failure means.
#[derive(Clone)]
pub struct MediaResolver {
    fetcher: Arc<dyn MediaFetcher>,
    store: Arc<dyn ContentStore>,
}

impl MediaResolver {
    pub fn new(fetcher: Arc<dyn MediaFetcher>, store: Arc<dyn ContentStore>) -> Self {
        Self { fetcher, store }
    }

    pub async fn resolve(&self, url: &str) -> Result<MediaRef, MediaError> {
        let bytes = self.fetcher.fetch_bytes(url).await?;
        let media_ref = self.store.put(&bytes).await?;

        info!(url, blob = %media_ref, size = bytes.len(), "media: stored as blob");
        Ok(media_ref)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{MemoryBlobs, MockMediaFetcher};
    use rssplug_common::FetchError;

    #[tokio::test]
    async fn resolve_stores_fetched_bytes() {
        let fetcher = Arc::new(MockMediaFetcher::new().on_image("https://cdn/a.png", b"aaaa"));
        let blobs = Arc::new(MemoryBlobs::new());
        let resolver = MediaResolver::new(fetcher.clone(), blobs.clone());

        let media_ref = resolver.resolve("https://cdn/a.png").await.unwrap();

        assert_eq!(blobs.get(&media_ref).unwrap(), b"aaaa");
        assert_eq!(fetcher.requests(), vec!["https://cdn/a.png"]);
    }

    #[tokio::test]
    async fn fetch_failure_propagates_without_store_write() {
        let fetcher = Arc::new(MockMediaFetcher::new());
        let blobs = Arc::new(MemoryBlobs::new());
        let resolver = MediaResolver::new(fetcher, blobs.clone());

        let err = resolver.resolve("https://cdn/missing.png").await.unwrap_err();

        assert!(matches!(err, MediaError::Fetch(FetchError::Status { status: 404, .. })));
        assert_eq!(blobs.len(), 0);
    }

    #[tokio::test]
    async fn store_failure_propagates() {
        let fetcher = Arc::new(MockMediaFetcher::new().on_image("https://cdn/a.png", b"aaaa"));
        let blobs = Arc::new(MemoryBlobs::new().failing());
        let resolver = MediaResolver::new(fetcher, blobs);

        let err = resolver.resolve("https://cdn/a.png").await.unwrap_err();

        assert!(matches!(err, MediaError::Store(_)));
    }
}
