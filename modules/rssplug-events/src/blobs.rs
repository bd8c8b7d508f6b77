//! BlobStore: content-addressed binary storage for media.

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use sha2::{Digest, Sha256};
use sqlx::PgPool;
use tracing::debug;

use rssplug_common::{MediaRef, StoreError};

/// Content reference for a byte string: `&<base64(sha256)>.sha256`.
pub fn media_ref_for(bytes: &[u8]) -> MediaRef {
    let digest = Sha256::digest(bytes);
    MediaRef(format!("&{}.sha256", STANDARD.encode(digest)))
}

#[derive(Clone)]
pub struct BlobStore {
    pool: PgPool,
}

impl BlobStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Store bytes under their content reference. Storing identical bytes
    /// twice is a no-op and returns the same reference.
    pub async fn put(&self, bytes: &[u8]) -> Result<MediaRef, StoreError> {
        let media_ref = media_ref_for(bytes);

        let result = sqlx::query(
            r#"
            INSERT INTO blobs (hash, bytes, size)
            VALUES ($1, $2, $3)
            ON CONFLICT (hash) DO NOTHING
            "#,
        )
        .bind(media_ref.as_str())
        .bind(bytes)
        .bind(bytes.len() as i64)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError(e.to_string()))?;

        debug!(
            blob = media_ref.as_str(),
            size = bytes.len(),
            new = result.rows_affected() > 0,
            "Stored blob"
        );
        Ok(media_ref)
    }
}

#[cfg(feature = "test-utils")]
impl BlobStore {
    /// Fetch the bytes behind a reference.
    pub async fn get(&self, media_ref: &MediaRef) -> Result<Option<Vec<u8>>, StoreError> {
        let row = sqlx::query_as::<_, (Vec<u8>,)>("SELECT bytes FROM blobs WHERE hash = $1")
            .bind(media_ref.as_str())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError(e.to_string()))?;

        Ok(row.map(|(bytes,)| bytes))
    }
}
