//! Neighborhood cache.
//!
//! Precomputed per-memory association maps replace live spreading
//! activation at recall time. A memory's own neighborhood flips stale when
//! its importance or status changes; staleness never propagates to
//! memories that list it as a neighbor — the periodic batch sweep is the
//! only mechanism that catches up. Stale neighborhoods are excluded from
//! scoring entirely rather than contributing stale weights.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::Utc;
use rusqlite::{params, OptionalExtension};

use crate::embeddings::{cosine_similarity, is_degenerate};
use crate::error::Result;
use crate::memory::MemoryStatus;
use crate::storage::Store;

/// Association map maintenance over the shared store.
pub struct NeighborhoodCache {
    store: Arc<Store>,
    k: usize,
    min_similarity: f32,
}

impl NeighborhoodCache {
    /// Create a cache with the given neighborhood size and similarity floor.
    pub fn new(store: Arc<Store>, k: usize, min_similarity: f32) -> Self {
        Self {
            store,
            k,
            min_similarity,
        }
    }

    /// Recompute one memory's neighborhood: top-k cosine neighbors above the
    /// floor among active, non-degenerate memories, excluding itself.
    /// Clears staleness. A missing or non-active memory is a no-op
    /// (returns false).
    pub fn recompute(&self, id: &str) -> Result<bool> {
        let Some(subject) = self.store.get_memory(id)? else {
            return Ok(false);
        };
        if subject.status != MemoryStatus::Active {
            return Ok(false);
        }

        let mut neighbors: HashMap<String, f32> = HashMap::new();
        if !is_degenerate(&subject.embedding) {
            let mut scored: Vec<(String, f32)> = self
                .store
                .load_active_memories()?
                .into_iter()
                .filter(|m| m.id != id && !is_degenerate(&m.embedding))
                .map(|m| {
                    let sim = cosine_similarity(&subject.embedding, &m.embedding);
                    (m.id, sim)
                })
                .filter(|(_, sim)| *sim >= self.min_similarity)
                .collect();
            scored.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));
            scored.truncate(self.k);
            neighbors = scored
                .into_iter()
                .map(|(id, sim)| (id, sim.clamp(0.0, 1.0)))
                .collect();
        }

        let neighbor_count = neighbors.len();
        let neighbors_json = serde_json::to_string(&neighbors)?;
        let writer = self.store.writer()?;
        writer.execute(
            "INSERT INTO neighborhoods (memory_id, neighbors, computed_at, is_stale)
             VALUES (?1, ?2, ?3, 0)
             ON CONFLICT(memory_id) DO UPDATE
             SET neighbors = ?2, computed_at = ?3, is_stale = 0",
            params![id, neighbors_json, Utc::now()],
        )?;
        tracing::debug!(memory_id = %id, neighbors = neighbor_count, "neighborhood recomputed");
        Ok(true)
    }

    /// Drain up to `n` entries from the stale queue, oldest-first with
    /// never-computed entries winning ties. Returns how many were
    /// recomputed; truncating the batch only defers the rest to the next
    /// tick.
    pub fn batch_recompute(&self, n: usize) -> Result<usize> {
        let queue: Vec<String> = {
            let reader = self.store.reader()?;
            let mut stmt = reader.prepare(
                "SELECT memory_id FROM neighborhoods
                 WHERE is_stale = 1
                 ORDER BY computed_at IS NOT NULL, computed_at ASC
                 LIMIT ?1",
            )?;
            let rows = stmt
                .query_map(params![n as i64], |row| row.get::<_, String>(0))?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows
        };

        let mut done = 0;
        for id in queue {
            if self.recompute(&id)? {
                done += 1;
            } else {
                // Archived or deleted since queued: drop it from the queue
                // and wipe the outdated map so it cannot read back as fresh
                let writer = self.store.writer()?;
                writer.execute(
                    "UPDATE neighborhoods SET neighbors = '{}', is_stale = 0
                     WHERE memory_id = ?1",
                    params![id],
                )?;
            }
        }
        Ok(done)
    }

    /// Flip a memory's own neighborhood stale.
    pub fn mark_stale(&self, id: &str) -> Result<()> {
        let writer = self.store.writer()?;
        writer.execute(
            "UPDATE neighborhoods SET is_stale = 1 WHERE memory_id = ?1",
            params![id],
        )?;
        Ok(())
    }

    /// A memory's neighbor map, only if it is fresh. Stale neighborhoods
    /// never silently contribute to scoring.
    pub fn get_fresh(&self, id: &str) -> Result<Option<HashMap<String, f32>>> {
        let reader = self.store.reader()?;
        let json: Option<String> = reader
            .query_row(
                "SELECT neighbors FROM neighborhoods
                 WHERE memory_id = ?1 AND is_stale = 0",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        Ok(json.and_then(|j| serde_json::from_str(&j).ok()))
    }

    /// Number of entries waiting in the stale queue.
    pub fn stale_count(&self) -> Result<i64> {
        let reader = self.store.reader()?;
        Ok(reader.query_row(
            "SELECT COUNT(*) FROM neighborhoods WHERE is_stale = 1",
            [],
            |row| row.get(0),
        )?)
    }
}

// ============================================================================
// TESTS
// ============================================================================
