//! Episode segmentation.
//!
//! Session-windowing over memory insertions: a run of memories with no
//! internal gap over the threshold forms one episode. Placement runs under
//! the episode-assignment lock so two concurrent inserts can't both decide
//! to start a new episode. At most one episode is open at a time.

use std::collections::HashSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::Result;
use crate::locks::{NamedLocks, EPISODE_ASSIGNMENT};
use crate::storage::Store;

/// A temporally contiguous run of memories.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Episode {
    /// Unique identifier
    pub id: String,
    /// First activity in the episode
    pub started_at: DateTime<Utc>,
    /// Close time; `None` while the episode is open
    pub ended_at: Option<DateTime<Utc>>,
    /// Consolidated summary, once one exists
    pub summary: Option<String>,
    /// Free-form metadata
    pub metadata: serde_json::Value,
}

/// One membership row: which memory sits where in an episode.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EpisodeMember {
    /// The member memory
    pub memory_id: String,
    /// Position within the episode, starting at 1
    pub seq: i64,
    /// When the memory was recorded
    pub occurred_at: DateTime<Utc>,
}

/// Assigns memories to episodes with an inactivity-gap window.
pub struct EpisodeSegmenter {
    store: Arc<Store>,
    locks: NamedLocks,
    gap_minutes: i64,
}

impl EpisodeSegmenter {
    /// Create a segmenter with the given inactivity gap.
    pub fn new(store: Arc<Store>, locks: NamedLocks, gap_minutes: i64) -> Self {
        Self {
            store,
            locks,
            gap_minutes,
        }
    }

    /// Place a memory into an episode, opening or closing episodes as the
    /// gap rule dictates. Returns the episode id the memory joined.
    pub fn assign(&self, memory_id: &str, occurred_at: DateTime<Utc>) -> Result<String> {
        let _guard = self.locks.acquire(EPISODE_ASSIGNMENT)?;

        let open: Option<(String, DateTime<Utc>)> = {
            let reader = self.store.reader()?;
            reader
                .query_row(
                    "SELECT id, started_at FROM episodes
                     WHERE ended_at IS NULL
                     ORDER BY started_at DESC LIMIT 1",
                    [],
                    |row| Ok((row.get(0)?, row.get(1)?)),
                )
                .optional()?
        };

        let episode_id = match open {
            Some((episode_id, started_at)) => {
                let latest = self
                    .latest_member_time(&episode_id)?
                    .unwrap_or(started_at);
                if occurred_at - latest > chrono::Duration::minutes(self.gap_minutes) {
                    // Gap exceeded: the old episode ended with its last member
                    self.close_episode(&episode_id, latest)?;
                    self.open_episode(occurred_at)?
                } else {
                    episode_id
                }
            }
            None => self.open_episode(occurred_at)?,
        };

        let next_seq = self.next_seq(&episode_id)?;
        let writer = self.store.writer()?;
        writer.execute(
            "INSERT OR IGNORE INTO episode_members (episode_id, memory_id, seq, occurred_at)
             VALUES (?1, ?2, ?3, ?4)",
            params![episode_id, memory_id, next_seq, occurred_at],
        )?;
        Ok(episode_id)
    }

    fn open_episode(&self, started_at: DateTime<Utc>) -> Result<String> {
        let id = Uuid::new_v4().to_string();
        let writer = self.store.writer()?;
        writer.execute(
            "INSERT INTO episodes (id, started_at, ended_at, summary, summary_embedding, metadata)
             VALUES (?1, ?2, NULL, NULL, NULL, '{}')",
            params![id, started_at],
        )?;
        tracing::debug!(episode_id = %id, "opened episode");
        Ok(id)
    }

    fn close_episode(&self, episode_id: &str, ended_at: DateTime<Utc>) -> Result<()> {
        let writer = self.store.writer()?;
        writer.execute(
            "UPDATE episodes SET ended_at = ?2 WHERE id = ?1 AND ended_at IS NULL",
            params![episode_id, ended_at],
        )?;
        tracing::debug!(episode_id = %episode_id, "closed episode");
        Ok(())
    }

    fn latest_member_time(&self, episode_id: &str) -> Result<Option<DateTime<Utc>>> {
        let reader = self.store.reader()?;
        let latest: Option<DateTime<Utc>> = reader.query_row(
            "SELECT MAX(occurred_at) FROM episode_members WHERE episode_id = ?1",
            params![episode_id],
            |row| row.get(0),
        )?;
        Ok(latest)
    }

    fn next_seq(&self, episode_id: &str) -> Result<i64> {
        let reader = self.store.reader()?;
        let max_seq: Option<i64> = reader.query_row(
            "SELECT MAX(seq) FROM episode_members WHERE episode_id = ?1",
            params![episode_id],
            |row| row.get(0),
        )?;
        Ok(max_seq.unwrap_or(0) + 1)
    }

    /// Fetch an episode by id.
    pub fn get_episode(&self, id: &str) -> Result<Option<Episode>> {
        let reader = self.store.reader()?;
        let episode = reader
            .query_row(
                "SELECT id, started_at, ended_at, summary, metadata FROM episodes WHERE id = ?1",
                params![id],
                map_episode_row,
            )
            .optional()?;
        Ok(episode)
    }

    /// The currently open episode, if any.
    pub fn current_open(&self) -> Result<Option<Episode>> {
        let reader = self.store.reader()?;
        let episode = reader
            .query_row(
                "SELECT id, started_at, ended_at, summary, metadata FROM episodes
                 WHERE ended_at IS NULL
                 ORDER BY started_at DESC LIMIT 1",
                [],
                map_episode_row,
            )
            .optional()?;
        Ok(episode)
    }

    /// Ordered members of an episode.
    pub fn members(&self, episode_id: &str) -> Result<Vec<EpisodeMember>> {
        let reader = self.store.reader()?;
        let mut stmt = reader.prepare(
            "SELECT memory_id, seq, occurred_at FROM episode_members
             WHERE episode_id = ?1 ORDER BY seq",
        )?;
        let rows = stmt
            .query_map(params![episode_id], |row| {
                Ok(EpisodeMember {
                    memory_id: row.get(0)?,
                    seq: row.get(1)?,
                    occurred_at: row.get(2)?,
                })
            })?
            .collect::<rusqlite::Result<Vec<_>>>()?;
        Ok(rows)
    }

    /// Memory ids carrying the temporal recency signal: members of the open
    /// episode plus members of episodes closed within `recency_hours`.
    pub fn recent_member_ids(&self, recency_hours: i64) -> Result<HashSet<String>> {
        let cutoff = Utc::now() - chrono::Duration::hours(recency_hours);
        let reader = self.store.reader()?;
        let mut stmt = reader.prepare(
            "SELECT m.memory_id FROM episode_members m
             JOIN episodes e ON e.id = m.episode_id
             WHERE e.ended_at IS NULL OR e.ended_at >= ?1",
        )?;
        let rows = stmt
            .query_map(params![cutoff], |row| row.get::<_, String>(0))?
            .collect::<rusqlite::Result<HashSet<_>>>()?;
        Ok(rows)
    }

    /// Total number of episodes, open or closed.
    pub fn episode_count(&self) -> Result<i64> {
        let reader = self.store.reader()?;
        Ok(reader.query_row("SELECT COUNT(*) FROM episodes", [], |row| row.get(0))?)
    }
}

fn map_episode_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Episode> {
    Ok(Episode {
        id: row.get(0)?,
        started_at: row.get(1)?,
        ended_at: row.get(2)?,
        summary: row.get(3)?,
        metadata: serde_json::from_str(&row.get::<_, String>(4)?)
            .unwrap_or(serde_json::Value::Null),
    })
}

// ============================================================================
// TESTS
// ============================================================================
