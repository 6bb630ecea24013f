//! Content-hash embedding cache.
//!
//! Pure memoization: identical content never hits the provider twice
//! within an entry's lifetime. Entries are evicted only by the periodic
//! age sweep, which runs as part of the maintenance tick.

use std::sync::Arc;

use chrono::Utc;
use rusqlite::{params, OptionalExtension};

use crate::embeddings::{from_blob, to_blob};
use crate::error::Result;
use crate::storage::Store;

/// Persistent content-hash → embedding map.
pub struct ContentHashCache {
    store: Arc<Store>,
}

impl ContentHashCache {
    /// Create a cache view over a store.
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Look up a previously computed embedding.
    pub fn get(&self, content_hash: &str) -> Result<Option<Vec<f32>>> {
        let reader = self.store.reader()?;
        let blob: Option<Vec<u8>> = reader
            .query_row(
                "SELECT embedding FROM embedding_cache WHERE content_hash = ?1",
                params![content_hash],
                |row| row.get(0),
            )
            .optional()?;
        Ok(blob.and_then(|b| from_blob(&b)))
    }

    /// Store (or refresh) an embedding for a content hash.
    pub fn put(&self, content_hash: &str, embedding: &[f32]) -> Result<()> {
        let writer = self.store.writer()?;
        writer.execute(
            "INSERT OR REPLACE INTO embedding_cache (content_hash, embedding, created_at)
             VALUES (?1, ?2, ?3)",
            params![content_hash, to_blob(embedding), Utc::now()],
        )?;
        Ok(())
    }

    /// Evict entries older than `max_age_days`. Returns how many went.
    pub fn sweep(&self, max_age_days: i64) -> Result<usize> {
        let cutoff = Utc::now() - chrono::Duration::days(max_age_days);
        let writer = self.store.writer()?;
        let evicted = writer.execute(
            "DELETE FROM embedding_cache WHERE created_at < ?1",
            params![cutoff],
        )?;
        if evicted > 0 {
            tracing::debug!(evicted, "embedding cache sweep");
        }
        Ok(evicted)
    }
}
