//! EntryStore: the append-only entry log for one identity, backed by Postgres.
//!
//! The store is scoped to a single author at construction. Appends are
//! sequential from the caller's side; ordering is the BIGSERIAL `seq`.

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use sqlx::PgPool;
use tracing::debug;

use rssplug_common::{Entry, EntryId, LogReadError, LogWriteError, StoredEntry};

// ---------------------------------------------------------------------------
// EntryStore
// ---------------------------------------------------------------------------

/// Append-only entry log for one identity.
#[derive(Clone)]
pub struct EntryStore {
    pool: PgPool,
    author: String,
}

impl EntryStore {
    pub fn new(pool: PgPool, author: impl Into<String>) -> Self {
        Self {
            pool,
            author: author.into(),
        }
    }

    /// The identity this log belongs to.
    pub fn author(&self) -> &str {
        &self.author
    }

    /// Append an entry. Returns the assigned identifier.
    pub async fn append(&self, entry: &Entry) -> Result<EntryId, LogWriteError> {
        let payload =
            serde_json::to_value(entry).map_err(|e| LogWriteError(e.to_string()))?;

        let row = sqlx::query_as::<_, (i64,)>(
            r#"
            INSERT INTO entries (author, kind, root_seq, link, payload)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING seq
            "#,
        )
        .bind(&self.author)
        .bind(entry.kind())
        .bind(entry.root().map(|id| id.0))
        .bind(entry.link())
        .bind(&payload)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| LogWriteError(e.to_string()))?;

        debug!(seq = row.0, kind = entry.kind(), "Appended entry");
        Ok(EntryId(row.0))
    }

    /// Read the whole log in append order.
    pub async fn scan(&self) -> Result<Vec<StoredEntry>, LogReadError> {
        let rows = sqlx::query_as::<_, EntryRow>(
            r#"
            SELECT seq, ts, author, payload
            FROM entries
            WHERE author = $1
            ORDER BY seq ASC
            "#,
        )
        .bind(&self.author)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| LogReadError(e.to_string()))?;

        rows.into_iter().map(EntryRow::decode).collect()
    }

    /// Links of every post in the log.
    pub async fn published_links(&self) -> Result<HashSet<String>, LogReadError> {
        let rows = sqlx::query_as::<_, (String,)>(
            r#"
            SELECT DISTINCT link
            FROM entries
            WHERE author = $1 AND kind = 'post' AND link IS NOT NULL
            "#,
        )
        .bind(&self.author)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| LogReadError(e.to_string()))?;

        Ok(rows.into_iter().map(|(link,)| link).collect())
    }

    /// Whether an about entry has been published.
    pub async fn has_about(&self) -> Result<bool, LogReadError> {
        let row = sqlx::query_as::<_, (bool,)>(
            "SELECT EXISTS (SELECT 1 FROM entries WHERE author = $1 AND kind = 'about')",
        )
        .bind(&self.author)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| LogReadError(e.to_string()))?;

        Ok(row.0)
    }
}

// ---------------------------------------------------------------------------
// Row mapping
// ---------------------------------------------------------------------------

struct EntryRow {
    seq: i64,
    ts: DateTime<Utc>,
    author: String,
    payload: serde_json::Value,
}

impl EntryRow {
    fn decode(self) -> Result<StoredEntry, LogReadError> {
        let entry: Entry = serde_json::from_value(self.payload)
            .map_err(|e| LogReadError(format!("entry {} has an invalid payload: {e}", self.seq)))?;
        Ok(StoredEntry {
            id: EntryId(self.seq),
            ts: self.ts,
            author: self.author,
            entry,
        })
    }
}

impl<'r> sqlx::FromRow<'r, sqlx::postgres::PgRow> for EntryRow {
    fn from_row(row: &'r sqlx::postgres::PgRow) -> std::result::Result<Self, sqlx::Error> {
        use sqlx::Row;
        Ok(EntryRow {
            seq: row.try_get("seq")?,
            ts: row.try_get("ts")?,
            author: row.try_get("author")?,
            payload: row.try_get("payload")?,
        })
    }
}

// ---------------------------------------------------------------------------
// Read helpers and test utilities (feature `test-utils`)
// ---------------------------------------------------------------------------

#[cfg(feature = "test-utils")]
impl EntryStore {
    /// Read a single entry by identifier.
    pub async fn read_entry(&self, id: EntryId) -> Result<Option<StoredEntry>, LogReadError> {
        let row = sqlx::query_as::<_, EntryRow>(
            r#"
            SELECT seq, ts, author, payload
            FROM entries
            WHERE author = $1 AND seq = $2
            "#,
        )
        .bind(&self.author)
        .bind(id.0)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| LogReadError(e.to_string()))?;

        row.map(EntryRow::decode).transpose()
    }

    /// Replies to a thread root, in order.
    pub async fn read_thread(&self, root: EntryId) -> Result<Vec<StoredEntry>, LogReadError> {
        let rows = sqlx::query_as::<_, EntryRow>(
            r#"
            SELECT seq, ts, author, payload
            FROM entries
            WHERE author = $1 AND (seq = $2 OR root_seq = $2)
            ORDER BY seq ASC
            "#,
        )
        .bind(&self.author)
        .bind(root.0)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| LogReadError(e.to_string()))?;

        rows.into_iter().map(EntryRow::decode).collect()
    }

    /// Delete every entry of every author (for tests).
    pub async fn truncate_all(&self) -> anyhow::Result<()> {
        sqlx::query("TRUNCATE entries, blobs RESTART IDENTITY CASCADE")
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}
