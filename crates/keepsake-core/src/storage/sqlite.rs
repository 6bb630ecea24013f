//! SQLite Storage Implementation
//!
//! Canonical store of memory records plus the shared connection pair every
//! other component runs its SQL through. Uses separate reader/writer
//! connections for interior mutability: all methods take `&self`, so the
//! store is `Send + Sync` and callers share it behind an `Arc`.

use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::{Mutex, MutexGuard};
use uuid::Uuid;

use crate::affect::AffectSnapshot;
use crate::embeddings::{from_blob, to_blob};
use crate::error::{MemoryError, Result};
use crate::memory::{MemoryRecord, MemoryStatus, MemoryType, SourceReference, TypedMetadata};

// ============================================================================
// STORE
// ============================================================================

/// Shared SQLite store.
///
/// Exclusively owns memory rows; neighborhoods are owned 1:1 by their
/// memory and cascade-deleted with it. Episodes are independent entities
/// referenced through the membership relation.
pub struct Store {
    writer: Mutex<Connection>,
    reader: Mutex<Connection>,
    dimensions: usize,
}

impl Store {
    /// Apply PRAGMAs to a connection
    fn configure_connection(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA cache_size = -64000;
             PRAGMA temp_store = MEMORY;
             PRAGMA foreign_keys = ON;
             PRAGMA busy_timeout = 5000;",
        )?;
        Ok(())
    }

    /// Open (or create) a store at the given path.
    ///
    /// `dimensions` fixes the embedding dimension every stored vector must
    /// match; inserts with any other dimension are rejected before writing.
    pub fn open(db_path: Option<PathBuf>, dimensions: usize) -> Result<Self> {
        let path = match db_path {
            Some(p) => p,
            None => {
                let proj_dirs = ProjectDirs::from("ai", "keepsake", "core").ok_or_else(|| {
                    MemoryError::Init("Could not determine project directories".to_string())
                })?;
                let data_dir = proj_dirs.data_dir();
                std::fs::create_dir_all(data_dir)?;
                data_dir.join("keepsake.db")
            }
        };

        let writer_conn = Connection::open(&path)?;
        Self::configure_connection(&writer_conn)?;
        super::migrations::apply_migrations(&writer_conn)?;

        let reader_conn = Connection::open(&path)?;
        Self::configure_connection(&reader_conn)?;

        Ok(Self {
            writer: Mutex::new(writer_conn),
            reader: Mutex::new(reader_conn),
            dimensions,
        })
    }

    /// Configured embedding dimension.
    pub fn dimensions(&self) -> usize {
        self.dimensions
    }

    /// Lock the writer connection.
    pub(crate) fn writer(&self) -> Result<MutexGuard<'_, Connection>> {
        self.writer
            .lock()
            .map_err(|_| MemoryError::Init("Writer lock poisoned".into()))
    }

    /// Lock the reader connection.
    pub(crate) fn reader(&self) -> Result<MutexGuard<'_, Connection>> {
        self.reader
            .lock()
            .map_err(|_| MemoryError::Init("Reader lock poisoned".into()))
    }

    // ========================================================================
    // MEMORY CRUD
    // ========================================================================

    /// Insert a fully formed memory row and its (stale) neighborhood shell.
    ///
    /// Validates embedding dimension and metadata/type agreement. Episode
    /// placement happens separately, under the episode-assignment lock.
    pub fn insert_memory(&self, record: &MemoryRecord) -> Result<()> {
        if record.embedding.len() != self.dimensions {
            return Err(MemoryError::Validation(format!(
                "embedding dimension {} does not match configured {}",
                record.embedding.len(),
                self.dimensions
            )));
        }
        if record.content.trim().is_empty() {
            return Err(MemoryError::Validation("content must not be empty".into()));
        }
        if record.metadata.memory_type() != record.memory_type {
            return Err(MemoryError::Validation(format!(
                "metadata bag is for {} but memory type is {}",
                record.metadata.memory_type(),
                record.memory_type
            )));
        }

        let source_json = record
            .source_attribution
            .as_ref()
            .map(serde_json::to_string)
            .transpose()?;
        let affect_json = serde_json::to_string(&record.emotional_context)?;
        let metadata_json = serde_json::to_string(&record.metadata)?;

        let mut writer = self.writer()?;
        let tx = writer.transaction()?;
        tx.execute(
            "INSERT INTO memories (
                id, memory_type, status, content, embedding,
                importance, trust_level, trust_updated_at, source_attribution,
                access_count, last_accessed, decay_rate,
                emotional_context, metadata, created_at, updated_at
            ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16)",
            params![
                record.id,
                record.memory_type.as_str(),
                record.status.as_str(),
                record.content,
                to_blob(&record.embedding),
                record.importance,
                record.trust_level,
                record.trust_updated_at,
                source_json,
                record.access_count,
                record.last_accessed,
                record.decay_rate,
                affect_json,
                metadata_json,
                record.created_at,
                record.updated_at,
            ],
        )?;
        // Neighborhood shell starts stale so the batch sweep picks it up
        tx.execute(
            "INSERT INTO neighborhoods (memory_id, neighbors, computed_at, is_stale)
             VALUES (?1, '{}', NULL, 1)",
            params![record.id],
        )?;
        tx.commit()?;
        Ok(())
    }

    /// Fetch a memory by id.
    pub fn get_memory(&self, id: &str) -> Result<Option<MemoryRecord>> {
        let reader = self.reader()?;
        let record = reader
            .query_row(
                &format!("SELECT {} FROM memories WHERE id = ?1", MEMORY_COLUMNS),
                params![id],
                map_memory_row,
            )
            .optional()?;
        Ok(record)
    }

    /// Load every active memory. Recall and neighborhood recompute scan
    /// these linearly; the corpus is small enough that a scan beats
    /// maintaining a live index.
    pub fn load_active_memories(&self) -> Result<Vec<MemoryRecord>> {
        let reader = self.reader()?;
        let mut stmt = reader.prepare(&format!(
            "SELECT {} FROM memories WHERE status = 'active'",
            MEMORY_COLUMNS
        ))?;
        let rows = stmt
            .query_map([], map_memory_row)?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Touch memories: bump access counts, refresh `last_accessed`, and
    /// reinforce importance with diminishing returns
    /// (`importance *= 1 + 0.1*ln(access_count + 1)`).
    ///
    /// Each touched memory's own neighborhood flips stale, because its
    /// importance changed. Ids that no longer exist are skipped.
    pub fn touch(&self, ids: &[String]) -> Result<usize> {
        let now = Utc::now();
        let mut touched = 0;
        let mut writer = self.writer()?;
        let tx = writer.transaction()?;
        for id in ids {
            let row: Option<(i64, f64)> = tx
                .query_row(
                    "SELECT access_count, importance FROM memories WHERE id = ?1",
                    params![id],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?;
            let Some((access_count, importance)) = row else {
                // Benign race with archival/deletion
                continue;
            };
            let new_count = access_count + 1;
            let boosted =
                (importance * (1.0 + 0.1 * ((new_count as f64) + 1.0).ln())).clamp(0.0, 1.0);
            tx.execute(
                "UPDATE memories
                 SET access_count = ?2, last_accessed = ?3, importance = ?4, updated_at = ?3
                 WHERE id = ?1",
                params![id, new_count, now, boosted],
            )?;
            tx.execute(
                "UPDATE neighborhoods SET is_stale = 1 WHERE memory_id = ?1",
                params![id],
            )?;
            touched += 1;
        }
        tx.commit()?;
        Ok(touched)
    }

    /// Transition a memory's status. One-directional: only active memories
    /// move, and never back. Returns whether anything changed; a missing id
    /// is a no-op.
    pub fn set_status(&self, id: &str, next: MemoryStatus) -> Result<bool> {
        let mut writer = self.writer()?;
        let tx = writer.transaction()?;
        let current: Option<String> = tx
            .query_row(
                "SELECT status FROM memories WHERE id = ?1",
                params![id],
                |row| row.get(0),
            )
            .optional()?;
        let Some(current) = current else {
            tx.commit()?;
            return Ok(false);
        };
        if !MemoryStatus::parse_name(&current).can_transition_to(next) {
            tx.commit()?;
            return Ok(false);
        }
        tx.execute(
            "UPDATE memories SET status = ?2, updated_at = ?3 WHERE id = ?1",
            params![id, next.as_str(), Utc::now()],
        )?;
        tx.execute(
            "UPDATE neighborhoods SET is_stale = 1 WHERE memory_id = ?1",
            params![id],
        )?;
        tx.commit()?;
        Ok(true)
    }

    /// Persist a derived trust level. Missing ids are a no-op.
    pub fn update_trust(&self, id: &str, trust_level: f64, when: DateTime<Utc>) -> Result<()> {
        let writer = self.writer()?;
        writer.execute(
            "UPDATE memories
             SET trust_level = ?2, trust_updated_at = ?3, updated_at = ?3
             WHERE id = ?1",
            params![id, trust_level.clamp(0.0, 1.0), when],
        )?;
        Ok(())
    }

    /// Backfill an empty source attribution. An existing attribution is
    /// never overwritten; missing ids are a no-op.
    pub fn backfill_attribution(&self, id: &str, source: &SourceReference) -> Result<()> {
        let source_json = serde_json::to_string(source)?;
        let writer = self.writer()?;
        writer.execute(
            "UPDATE memories
             SET source_attribution = COALESCE(source_attribution, ?2), updated_at = ?3
             WHERE id = ?1",
            params![id, source_json, Utc::now()],
        )?;
        Ok(())
    }

    /// Apply the maintenance importance decay pass: memories not accessed
    /// since `cutoff` lose importance by `exp(-decay_rate * elapsed_days)`,
    /// floored at 0.05. Returns how many rows changed.
    pub fn decay_importance(&self, cutoff: DateTime<Utc>, elapsed_days: f64) -> Result<usize> {
        let candidates: Vec<(String, f64, f64)> = {
            let reader = self.reader()?;
            let mut stmt = reader.prepare(
                "SELECT id, importance, decay_rate FROM memories
                 WHERE status = 'active'
                   AND COALESCE(last_accessed, created_at) < ?1",
            )?;
            let rows = stmt
                .query_map(params![cutoff], |row| {
                    Ok((row.get(0)?, row.get(1)?, row.get(2)?))
                })?
                .collect::<rusqlite::Result<Vec<_>>>()?;
            rows
        };

        let mut changed = 0;
        let mut writer = self.writer()?;
        let tx = writer.transaction()?;
        for (id, importance, decay_rate) in candidates {
            let decayed = (importance * (-decay_rate * elapsed_days).exp()).max(0.05);
            if (decayed - importance).abs() < 1e-9 {
                continue;
            }
            tx.execute(
                "UPDATE memories SET importance = ?2, updated_at = ?3 WHERE id = ?1",
                params![id, decayed, Utc::now()],
            )?;
            tx.execute(
                "UPDATE neighborhoods SET is_stale = 1 WHERE memory_id = ?1",
                params![id],
            )?;
            changed += 1;
        }
        tx.commit()?;
        Ok(changed)
    }

    // ========================================================================
    // STATS
    // ========================================================================

    /// Corpus statistics.
    pub fn stats(&self) -> Result<StoreStats> {
        let reader = self.reader()?;
        let mut by_type = HashMap::new();
        {
            let mut stmt = reader
                .prepare("SELECT memory_type, COUNT(*) FROM memories GROUP BY memory_type")?;
            let rows = stmt.query_map([], |row| {
                Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
            })?;
            for row in rows {
                let (memory_type, count) = row?;
                by_type.insert(memory_type, count);
            }
        }
        let active: i64 = reader.query_row(
            "SELECT COUNT(*) FROM memories WHERE status = 'active'",
            [],
            |row| row.get(0),
        )?;
        let episodes: i64 = reader.query_row("SELECT COUNT(*) FROM episodes", [], |row| row.get(0))?;
        let working: i64 =
            reader.query_row("SELECT COUNT(*) FROM working_memory", [], |row| row.get(0))?;
        let cached_embeddings: i64 =
            reader.query_row("SELECT COUNT(*) FROM embedding_cache", [], |row| row.get(0))?;
        let stale_neighborhoods: i64 = reader.query_row(
            "SELECT COUNT(*) FROM neighborhoods WHERE is_stale = 1",
            [],
            |row| row.get(0),
        )?;
        Ok(StoreStats {
            active_memories: active,
            memories_by_type: by_type,
            episodes,
            working_items: working,
            cached_embeddings,
            stale_neighborhoods,
        })
    }
}

/// Corpus statistics snapshot.
#[derive(Debug, Clone, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StoreStats {
    /// Memories with status = active
    pub active_memories: i64,
    /// Counts per memory type (all statuses)
    pub memories_by_type: HashMap<String, i64>,
    /// Total episodes, open or closed
    pub episodes: i64,
    /// Items currently in the working buffer
    pub working_items: i64,
    /// Entries in the embedding cache
    pub cached_embeddings: i64,
    /// Neighborhoods awaiting recompute
    pub stale_neighborhoods: i64,
}

// ============================================================================
// ROW MAPPING
// ============================================================================

const MEMORY_COLUMNS: &str = "id, memory_type, status, content, embedding, \
     importance, trust_level, trust_updated_at, source_attribution, \
     access_count, last_accessed, decay_rate, emotional_context, metadata, \
     created_at, updated_at";

fn map_memory_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<MemoryRecord> {
    let memory_type = MemoryType::parse_name(&row.get::<_, String>(1)?);
    let embedding_blob: Vec<u8> = row.get(4)?;
    let source_json: Option<String> = row.get(8)?;
    let affect_json: String = row.get(12)?;
    let metadata_json: String = row.get(13)?;

    Ok(MemoryRecord {
        id: row.get(0)?,
        memory_type,
        status: MemoryStatus::parse_name(&row.get::<_, String>(2)?),
        content: row.get(3)?,
        embedding: from_blob(&embedding_blob).unwrap_or_default(),
        importance: row.get(5)?,
        trust_level: row.get(6)?,
        trust_updated_at: row.get(7)?,
        source_attribution: source_json.and_then(|s| serde_json::from_str(&s).ok()),
        access_count: row.get(9)?,
        last_accessed: row.get(10)?,
        decay_rate: row.get(11)?,
        emotional_context: serde_json::from_str::<AffectSnapshot>(&affect_json)
            .unwrap_or_default(),
        metadata: serde_json::from_str(&metadata_json)
            .unwrap_or_else(|_| TypedMetadata::default_for(memory_type)),
        created_at: row.get(14)?,
        updated_at: row.get(15)?,
    })
}

/// Build a fresh record from validated inputs. Helper for the engine and
/// working-memory promotion.
#[allow(clippy::too_many_arguments)]
pub(crate) fn new_record(
    memory_type: MemoryType,
    content: String,
    embedding: Vec<f32>,
    importance: f64,
    trust_level: f64,
    decay_rate: f64,
    source_attribution: Option<SourceReference>,
    emotional_context: AffectSnapshot,
    metadata: TypedMetadata,
) -> MemoryRecord {
    let now = Utc::now();
    MemoryRecord {
        id: Uuid::new_v4().to_string(),
        memory_type,
        status: MemoryStatus::Active,
        content,
        embedding,
        importance: importance.clamp(0.0, 1.0),
        trust_level: trust_level.clamp(0.0, 1.0),
        trust_updated_at: None,
        source_attribution,
        access_count: 0,
        last_accessed: None,
        decay_rate,
        emotional_context,
        metadata,
        created_at: now,
        updated_at: now,
    }
}

// ============================================================================
// TESTS
// ============================================================================
