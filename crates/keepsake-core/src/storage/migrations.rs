//! Database Migrations
//!
//! Schema migration definitions for the storage layer.

/// Migration definitions
pub const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        description: "Initial schema: memories, episodes, working memory, caches, graph",
        up: MIGRATION_V1_UP,
    },
    Migration {
        version: 2,
        description: "Advisory lock table and maintenance bookkeeping",
        up: MIGRATION_V2_UP,
    },
];

/// A database migration
#[derive(Debug, Clone)]
pub struct Migration {
    /// Version number
    pub version: u32,
    /// Description
    pub description: &'static str,
    /// SQL to apply
    pub up: &'static str,
}

/// V1: Initial schema
const MIGRATION_V1_UP: &str = r#"
CREATE TABLE IF NOT EXISTS schema_version (
    version INTEGER PRIMARY KEY,
    applied_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- ============================================================================
-- LONG-TERM MEMORIES
-- ============================================================================

CREATE TABLE IF NOT EXISTS memories (
    id TEXT PRIMARY KEY,
    memory_type TEXT NOT NULL DEFAULT 'episodic',
    status TEXT NOT NULL DEFAULT 'active',
    content TEXT NOT NULL,
    embedding BLOB NOT NULL,

    -- Salience and reliability
    importance REAL NOT NULL DEFAULT 0.5,
    trust_level REAL NOT NULL DEFAULT 0.5,
    trust_updated_at TEXT,

    -- Provenance
    source_attribution TEXT,

    -- Access tracking
    access_count INTEGER NOT NULL DEFAULT 0,
    last_accessed TEXT,

    -- Time-based forgetting
    decay_rate REAL NOT NULL DEFAULT 0.01,

    -- Affect snapshot frozen at creation (JSON)
    emotional_context TEXT NOT NULL DEFAULT '{}',

    -- Type-specific metadata bag (JSON, tagged by kind)
    metadata TEXT NOT NULL DEFAULT '{}',

    created_at TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_memories_status ON memories(status);
CREATE INDEX IF NOT EXISTS idx_memories_type ON memories(memory_type);
CREATE INDEX IF NOT EXISTS idx_memories_created ON memories(created_at);

-- ============================================================================
-- EPISODES (30-minute session windows)
-- ============================================================================

CREATE TABLE IF NOT EXISTS episodes (
    id TEXT PRIMARY KEY,
    started_at TEXT NOT NULL,
    ended_at TEXT,
    summary TEXT,
    summary_embedding BLOB,
    metadata TEXT NOT NULL DEFAULT '{}'
);

CREATE INDEX IF NOT EXISTS idx_episodes_open ON episodes(ended_at) WHERE ended_at IS NULL;
CREATE INDEX IF NOT EXISTS idx_episodes_ended ON episodes(ended_at);

-- Membership is a relation, not containment: episodes never own memories
CREATE TABLE IF NOT EXISTS episode_members (
    episode_id TEXT NOT NULL REFERENCES episodes(id) ON DELETE CASCADE,
    memory_id TEXT NOT NULL REFERENCES memories(id) ON DELETE CASCADE,
    seq INTEGER NOT NULL,
    occurred_at TEXT NOT NULL,
    PRIMARY KEY (episode_id, memory_id)
);

CREATE INDEX IF NOT EXISTS idx_members_memory ON episode_members(memory_id);
CREATE INDEX IF NOT EXISTS idx_members_occurred ON episode_members(episode_id, occurred_at);

-- ============================================================================
-- NEIGHBORHOODS (precomputed association maps, 1:1 with memories)
-- ============================================================================

CREATE TABLE IF NOT EXISTS neighborhoods (
    memory_id TEXT PRIMARY KEY REFERENCES memories(id) ON DELETE CASCADE,
    neighbors TEXT NOT NULL DEFAULT '{}',
    computed_at TEXT,
    is_stale INTEGER NOT NULL DEFAULT 1
);

CREATE INDEX IF NOT EXISTS idx_neighborhoods_stale ON neighborhoods(is_stale, computed_at);

-- ============================================================================
-- WORKING MEMORY (TTL-bound ephemeral buffer)
-- ============================================================================

CREATE TABLE IF NOT EXISTS working_memory (
    id TEXT PRIMARY KEY,
    content TEXT NOT NULL,
    embedding BLOB NOT NULL,
    importance REAL NOT NULL DEFAULT 0.5,
    trust_level REAL NOT NULL DEFAULT 0.5,
    access_count INTEGER NOT NULL DEFAULT 0,
    last_accessed TEXT,
    promote INTEGER NOT NULL DEFAULT 0,
    expires_at TEXT NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_working_expiry ON working_memory(expires_at);

-- ============================================================================
-- EMBEDDING CACHE (content hash -> vector)
-- ============================================================================

CREATE TABLE IF NOT EXISTS embedding_cache (
    content_hash TEXT PRIMARY KEY,
    embedding BLOB NOT NULL,
    created_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_embedding_cache_age ON embedding_cache(created_at);

-- ============================================================================
-- GRAPH (adjacency store for support/contradict and concept links)
-- ============================================================================

CREATE TABLE IF NOT EXISTS graph_nodes (
    label TEXT NOT NULL,
    key TEXT NOT NULL,
    created_at TEXT NOT NULL,
    PRIMARY KEY (label, key)
);

CREATE TABLE IF NOT EXISTS graph_edges (
    edge_type TEXT NOT NULL,
    from_label TEXT NOT NULL,
    from_key TEXT NOT NULL,
    to_label TEXT NOT NULL,
    to_key TEXT NOT NULL,
    properties TEXT NOT NULL DEFAULT '{}',
    created_at TEXT NOT NULL,
    PRIMARY KEY (edge_type, from_label, from_key, to_label, to_key)
);

CREATE INDEX IF NOT EXISTS idx_edges_from ON graph_edges(from_label, from_key, edge_type);
CREATE INDEX IF NOT EXISTS idx_edges_to ON graph_edges(to_label, to_key, edge_type);

INSERT INTO schema_version (version) VALUES (1);
"#;

/// V2: Advisory locks and maintenance bookkeeping
const MIGRATION_V2_UP: &str = r#"
-- Named advisory locks shared by every process against this store.
-- try-acquire = INSERT OR IGNORE; release = DELETE. Holders that crash
-- leave a row behind; acquire steals rows older than the stale window.
CREATE TABLE IF NOT EXISTS advisory_locks (
    name TEXT PRIMARY KEY,
    acquired_at TEXT NOT NULL,
    holder TEXT NOT NULL
);

-- Single-row bookkeeping for maintenance passes
CREATE TABLE IF NOT EXISTS maintenance_state (
    id INTEGER PRIMARY KEY CHECK (id = 1),
    last_decay_pass TEXT
);

INSERT OR IGNORE INTO maintenance_state (id, last_decay_pass) VALUES (1, NULL);

INSERT INTO schema_version (version) VALUES (2);
"#;

/// Get current schema version from database
pub fn get_current_version(conn: &rusqlite::Connection) -> rusqlite::Result<u32> {
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )
    .or(Ok(0))
}

/// Apply pending migrations
pub fn apply_migrations(conn: &rusqlite::Connection) -> rusqlite::Result<u32> {
    let current_version = get_current_version(conn)?;
    let mut applied = 0;

    for migration in MIGRATIONS {
        if migration.version > current_version {
            tracing::info!(
                "Applying migration v{}: {}",
                migration.version,
                migration.description
            );
            conn.execute_batch(migration.up)?;
            applied += 1;
        }
    }

    Ok(applied)
}
