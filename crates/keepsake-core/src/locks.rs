//! Named coordination locks.
//!
//! Backed by an advisory-lock table in the shared store, so independent
//! processes against the same database coordinate too. Two locks exist:
//! episode assignment (blocking, with a bounded wait) and maintenance
//! (try-acquire; losing the race means skipping the tick, never an error).
//!
//! A holder that crashes leaves its row behind; acquisition steals rows
//! older than the stale window.

use std::sync::Arc;
use std::time::{Duration, Instant};

use chrono::Utc;
use rusqlite::params;
use uuid::Uuid;

use crate::error::{MemoryError, Result};
use crate::storage::Store;

/// Lock serializing episode placement across writers.
pub const EPISODE_ASSIGNMENT: &str = "episode-assignment";

/// Lock making maintenance ticks mutually exclusive.
pub const MAINTENANCE: &str = "maintenance";

/// A row older than this is considered abandoned and may be stolen.
const STALE_LOCK_SECONDS: i64 = 60;

/// How long a blocking acquire waits before giving up.
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(10);

const ACQUIRE_POLL: Duration = Duration::from_millis(10);

/// Named lock set over the shared store.
#[derive(Clone)]
pub struct NamedLocks {
    store: Arc<Store>,
}

impl NamedLocks {
    /// Create a lock set against a store.
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Try to take a named lock without waiting. `None` means another
    /// holder currently has it.
    pub fn try_acquire(&self, name: &str) -> Result<Option<LockGuard>> {
        let holder = Uuid::new_v4().to_string();
        let acquired = {
            let writer = self.store.writer()?;
            // Steal abandoned rows first
            writer.execute(
                "DELETE FROM advisory_locks
                 WHERE name = ?1 AND acquired_at < ?2",
                params![
                    name,
                    Utc::now() - chrono::Duration::seconds(STALE_LOCK_SECONDS)
                ],
            )?;
            writer.execute(
                "INSERT OR IGNORE INTO advisory_locks (name, acquired_at, holder)
                 VALUES (?1, ?2, ?3)",
                params![name, Utc::now(), holder],
            )? == 1
        };
        if acquired {
            Ok(Some(LockGuard {
                store: Arc::clone(&self.store),
                name: name.to_string(),
                holder,
            }))
        } else {
            Ok(None)
        }
    }

    /// Take a named lock, waiting up to a bounded timeout. Used where the
    /// operation must serialize rather than skip (episode assignment).
    pub fn acquire(&self, name: &str) -> Result<LockGuard> {
        let deadline = Instant::now() + ACQUIRE_TIMEOUT;
        loop {
            if let Some(guard) = self.try_acquire(name)? {
                return Ok(guard);
            }
            if Instant::now() >= deadline {
                return Err(MemoryError::Init(format!(
                    "timed out acquiring lock '{}'",
                    name
                )));
            }
            std::thread::sleep(ACQUIRE_POLL);
        }
    }
}

/// Holds a named lock until dropped.
pub struct LockGuard {
    store: Arc<Store>,
    name: String,
    holder: String,
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        let released = self.store.writer().and_then(|writer| {
            writer
                .execute(
                    "DELETE FROM advisory_locks WHERE name = ?1 AND holder = ?2",
                    params![self.name, self.holder],
                )
                .map_err(Into::into)
        });
        if let Err(e) = released {
            tracing::warn!("failed to release lock '{}': {}", self.name, e);
        }
    }
}
