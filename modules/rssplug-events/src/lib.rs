//! Append-only, per-identity entry log and content-addressed blob store.
//!
//! Both live in Postgres. The log never updates or deletes rows; readers see
//! entries in append order.

pub mod blobs;
pub mod store;

pub use blobs::{media_ref_for, BlobStore};
pub use store::EntryStore;

use sqlx::PgPool;

/// Apply the embedded schema migrations. Idempotent.
pub async fn migrate(pool: &PgPool) -> anyhow::Result<()> {
    sqlx::migrate!("../../migrations").run(pool).await?;
    Ok(())
}
