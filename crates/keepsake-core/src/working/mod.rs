//! Working memory.
//!
//! An ephemeral, TTL-bound buffer. Every item either gets promoted into
//! the long-term store on expiry or is discarded — never both, never
//! neither; nothing outlives its expiry here. Promotion reuses the item's
//! existing embedding, so promoted memories cost no second provider call.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::embeddings::{from_blob, to_blob};
use crate::error::{MemoryError, Result};
use crate::storage::Store;

/// An item in the ephemeral buffer.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WorkingMemoryItem {
    /// Unique identifier (UUID v4)
    pub id: String,
    /// The buffered content
    pub content: String,
    /// Embedding vector, reused on promotion
    pub embedding: Vec<f32>,
    /// Salience in [0, 1]
    pub importance: f64,
    /// Trust carried into promotion
    pub trust_level: f64,
    /// Times this item has been read
    pub access_count: i64,
    /// Last read time
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_accessed: Option<DateTime<Utc>>,
    /// Explicit promotion request, overriding the thresholds
    pub promote: bool,
    /// Hard expiry
    pub expires_at: DateTime<Utc>,
    /// Creation time
    pub created_at: DateTime<Utc>,
}

/// Outcome of one cleanup pass.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupReport {
    /// (working item id, long-term memory id) per promotion
    pub promoted: Vec<(String, String)>,
    /// Expired items deleted without promotion
    pub discarded: usize,
}

/// The TTL-bound buffer over the shared store.
pub struct WorkingMemoryStore {
    store: Arc<Store>,
}

impl WorkingMemoryStore {
    /// Create a buffer view over a store.
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Add an item with `expiry = now + ttl`.
    pub fn add(
        &self,
        content: impl Into<String>,
        embedding: Vec<f32>,
        ttl: Duration,
        importance: f64,
        trust_level: Option<f64>,
    ) -> Result<WorkingMemoryItem> {
        let content = content.into();
        if content.trim().is_empty() {
            return Err(MemoryError::Validation("content must not be empty".into()));
        }
        if embedding.len() != self.store.dimensions() {
            return Err(MemoryError::Validation(format!(
                "embedding dimension {} does not match configured {}",
                embedding.len(),
                self.store.dimensions()
            )));
        }

        let now = Utc::now();
        let item = WorkingMemoryItem {
            id: Uuid::new_v4().to_string(),
            content,
            embedding,
            importance: importance.clamp(0.0, 1.0),
            trust_level: trust_level.unwrap_or(0.5).clamp(0.0, 1.0),
            access_count: 0,
            last_accessed: None,
            promote: false,
            expires_at: now + ttl,
            created_at: now,
        };
        let writer = self.store.writer()?;
        writer.execute(
            "INSERT INTO working_memory (
                id, content, embedding, importance, trust_level,
                access_count, last_accessed, promote, expires_at, created_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
            params![
                item.id,
                item.content,
                to_blob(&item.embedding),
                item.importance,
                item.trust_level,
                item.access_count,
                item.last_accessed,
                item.promote,
                item.expires_at,
                item.created_at,
            ],
        )?;
        Ok(item)
    }

    /// Read an item, bumping its access count. Expired items read as gone.
    pub fn get(&self, id: &str) -> Result<Option<WorkingMemoryItem>> {
        let item = {
            let reader = self.store.reader()?;
            reader
                .query_row(
                    "SELECT id, content, embedding, importance, trust_level,
                            access_count, last_accessed, promote, expires_at, created_at
                     FROM working_memory WHERE id = ?1 AND expires_at > ?2",
                    params![id, Utc::now()],
                    map_item_row,
                )
                .optional()?
        };
        if item.is_some() {
            let writer = self.store.writer()?;
            writer.execute(
                "UPDATE working_memory
                 SET access_count = access_count + 1, last_accessed = ?2
                 WHERE id = ?1",
                params![id, Utc::now()],
            )?;
        }
        Ok(item)
    }

    /// Flag an item for promotion regardless of thresholds. Missing or
    /// expired ids are a no-op.
    pub fn set_promote(&self, id: &str, promote: bool) -> Result<()> {
        let writer = self.store.writer()?;
        writer.execute(
            "UPDATE working_memory SET promote = ?2 WHERE id = ?1",
            params![id, promote],
        )?;
        Ok(())
    }

    /// Expire the buffer: promote-or-discard every item past its expiry.
    ///
    /// An item is promoted iff its promote flag is set, or its importance
    /// reaches `min_importance`, or its access count reaches
    /// `min_accesses`. `promote_item` creates the long-term memory (the
    /// engine wires in its own create path) and returns the new id.
    /// Deletion always follows, promoted or not. The pass reads expired
    /// rows once; items added during the pass are untouched.
    pub fn cleanup(
        &self,
        min_importance: f64,
        min_accesses: i64,
        mut promote_item: impl FnMut(&WorkingMemoryItem) -> Result<String>,
    ) -> Result<CleanupReport> {
        let now = Utc::now();
        let expired: Vec<WorkingMemoryItem> = {
            let reader = self.store.reader()?;
            let mut stmt = reader.prepare(
                "SELECT id, content, embedding, importance, trust_level,
                        access_count, last_accessed, promote, expires_at, created_at
                 FROM working_memory WHERE expires_at <= ?1",
            )?;
            let rows = stmt
                .query_map(params![now], map_item_row)?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows
        };

        let mut report = CleanupReport::default();
        for item in expired {
            let should_promote = item.promote
                || item.importance >= min_importance
                || item.access_count >= min_accesses;
            if should_promote {
                let memory_id = promote_item(&item)?;
                tracing::debug!(item_id = %item.id, memory_id = %memory_id, "working item promoted");
                report.promoted.push((item.id.clone(), memory_id));
            } else {
                report.discarded += 1;
            }
            let writer = self.store.writer()?;
            writer.execute(
                "DELETE FROM working_memory WHERE id = ?1",
                params![item.id],
            )?;
        }
        Ok(report)
    }

    /// Number of unexpired items.
    pub fn len(&self) -> Result<i64> {
        let reader = self.store.reader()?;
        Ok(reader.query_row(
            "SELECT COUNT(*) FROM working_memory WHERE expires_at > ?1",
            params![Utc::now()],
            |row| row.get(0),
        )?)
    }

    /// Whether the buffer holds no unexpired items.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

fn map_item_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<WorkingMemoryItem> {
    let embedding_blob: Vec<u8> = row.get(2)?;
    Ok(WorkingMemoryItem {
        id: row.get(0)?,
        content: row.get(1)?,
        embedding: from_blob(&embedding_blob).unwrap_or_default(),
        importance: row.get(3)?,
        trust_level: row.get(4)?,
        access_count: row.get(5)?,
        last_accessed: row.get(6)?,
        promote: row.get(7)?,
        expires_at: row.get(8)?,
        created_at: row.get(9)?,
    })
}

// ============================================================================
// TESTS
// ============================================================================
