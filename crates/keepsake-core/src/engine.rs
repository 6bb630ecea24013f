//! Engine facade.
//!
//! `MemoryEngine` owns the store and wires every component over it:
//! embedding cache, episode segmentation, neighborhood cache, trust,
//! working memory, recall. Callers interact with this type; the component
//! modules stay usable on their own for tests and tooling.

use std::path::PathBuf;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use rusqlite::params;
use serde_json::json;

use crate::affect::AffectSource;
use crate::config::{ConfigProvider, EngineConfig};
use crate::embeddings::{content_hash, embed_with_retry, ContentHashCache, EmbeddingProvider};
use crate::episodes::EpisodeSegmenter;
use crate::error::{MemoryError, Result};
use crate::graph::{
    GraphStore, SqliteGraph, EDGE_CONTRADICTS, EDGE_MENTIONS, EDGE_SUPPORTS, LABEL_CONCEPT,
    LABEL_MEMORY,
};
use crate::locks::{self, NamedLocks};
use crate::memory::{
    CreateMemoryInput, MemoryRecord, MemoryStatus, MemoryType, SourceReference, TypedMetadata,
};
use crate::neighborhood::NeighborhoodCache;
use crate::recall::{RecallEngine, RecallResult};
use crate::storage::{new_record, Store, StoreStats};
use crate::trust::TrustEngine;
use crate::working::{CleanupReport, WorkingMemoryItem, WorkingMemoryStore};

/// Neighborhoods recomputed per maintenance tick.
const MAINTENANCE_RECOMPUTE_BATCH: usize = 50;

/// What one maintenance tick did.
#[derive(Debug, Clone, Default)]
pub struct MaintenanceReport {
    /// Stale neighborhoods recomputed
    pub neighborhoods_recomputed: usize,
    /// Embedding-cache entries evicted by the age sweep
    pub embeddings_evicted: usize,
    /// Working-memory promote-or-discard outcome
    pub working: CleanupReport,
    /// Memories whose importance the decay pass reduced
    pub memories_decayed: usize,
}

// ============================================================================
// ENGINE
// ============================================================================

/// The long-term memory engine.
pub struct MemoryEngine {
    config: EngineConfig,
    store: Arc<Store>,
    graph: Arc<dyn GraphStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    affect: Arc<dyn AffectSource>,
    embedding_cache: Arc<ContentHashCache>,
    neighborhoods: Arc<NeighborhoodCache>,
    episodes: Arc<EpisodeSegmenter>,
    trust: TrustEngine,
    working: WorkingMemoryStore,
    recall: RecallEngine,
    locks: NamedLocks,
}

impl MemoryEngine {
    /// Open (creating if needed) a database and wire the engine over it.
    ///
    /// `db_path = None` resolves a per-user data directory.
    pub fn open(
        db_path: Option<PathBuf>,
        embedder: Arc<dyn EmbeddingProvider>,
        affect: Arc<dyn AffectSource>,
        config_provider: &dyn ConfigProvider,
    ) -> Result<Self> {
        let config = EngineConfig::from_provider(config_provider);
        let store = Arc::new(Store::open(db_path, config.embedding_dimensions)?);
        let graph: Arc<dyn GraphStore> = Arc::new(SqliteGraph::new(Arc::clone(&store)));
        let embedding_cache = Arc::new(ContentHashCache::new(Arc::clone(&store)));
        let neighborhoods = Arc::new(NeighborhoodCache::new(
            Arc::clone(&store),
            config.neighborhood_k,
            config.neighborhood_min_similarity,
        ));
        let episodes = Arc::new(EpisodeSegmenter::new(
            Arc::clone(&store),
            NamedLocks::new(Arc::clone(&store)),
            config.episode_gap_minutes,
        ));
        let trust = TrustEngine::new(Arc::clone(&store), Arc::clone(&graph));
        let working = WorkingMemoryStore::new(Arc::clone(&store));
        let recall = RecallEngine::new(
            Arc::clone(&store),
            Arc::clone(&neighborhoods),
            Arc::clone(&episodes),
            Arc::clone(&embedding_cache),
            Arc::clone(&embedder),
            Arc::clone(&affect),
            config.recall_trust_floor,
            config.embedding_retry_attempts,
        );
        let locks = NamedLocks::new(Arc::clone(&store));
        tracing::debug!(
            dimensions = config.embedding_dimensions,
            "memory engine opened"
        );
        Ok(Self {
            config,
            store,
            graph,
            embedder,
            affect,
            embedding_cache,
            neighborhoods,
            episodes,
            trust,
            working,
            recall,
            locks,
        })
    }

    /// The resolved configuration this engine runs with.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    // ========================================================================
    // MEMORY LIFECYCLE
    // ========================================================================

    /// Create a long-term memory: embed the content (cache-first), freeze
    /// the current emotional context, persist, and assign an episode. For
    /// semantic memories trust is derived from evidence immediately.
    pub fn create_memory(&self, input: CreateMemoryInput) -> Result<MemoryRecord> {
        if input.content.trim().is_empty() {
            return Err(MemoryError::Validation("content must not be empty".into()));
        }
        let embedding = self.resolve_embedding(&input.content)?;
        let metadata = input
            .metadata
            .unwrap_or_else(|| TypedMetadata::default_for(input.memory_type));

        let record = new_record(
            input.memory_type,
            input.content,
            embedding,
            input.importance,
            input.trust_level.unwrap_or(0.5),
            input.decay_rate,
            input.source_attribution,
            self.affect.current(),
            metadata,
        );
        self.store.insert_memory(&record)?;
        self.graph.upsert_node(LABEL_MEMORY, &record.id)?;
        self.episodes.assign(&record.id, record.created_at)?;

        if record.memory_type == MemoryType::Semantic {
            self.trust.sync(&record.id)?;
            return self
                .store
                .get_memory(&record.id)?
                .ok_or_else(|| MemoryError::NotFound(record.id.clone()));
        }
        Ok(record)
    }

    /// Fetch a memory by id.
    pub fn get_memory(&self, id: &str) -> Result<Option<MemoryRecord>> {
        self.store.get_memory(id)
    }

    /// Record accesses: bump counts, boost importance logarithmically, and
    /// flip the touched memories' neighborhoods stale. Missing ids are
    /// skipped; returns how many rows changed.
    pub fn touch(&self, ids: &[String]) -> Result<usize> {
        self.store.touch(ids)
    }

    /// Archive an active memory. Returns false when the id is missing or
    /// the memory already left the active state.
    pub fn archive(&self, id: &str) -> Result<bool> {
        self.store.set_status(id, MemoryStatus::Archived)
    }

    /// Invalidate an active memory. Same no-op semantics as [`archive`].
    ///
    /// [`archive`]: MemoryEngine::archive
    pub fn invalidate(&self, id: &str) -> Result<bool> {
        self.store.set_status(id, MemoryStatus::Invalidated)
    }

    // ========================================================================
    // RECALL
    // ========================================================================

    /// Rank the `limit` most relevant active memories for a query. A pure
    /// read; callers wanting access tracking follow up with [`touch`].
    ///
    /// [`touch`]: MemoryEngine::touch
    pub fn fast_recall(&self, query: &str, limit: usize) -> Result<Vec<RecallResult>> {
        self.recall.fast_recall(query, limit)
    }

    // ========================================================================
    // WORKING MEMORY
    // ========================================================================

    /// Buffer a short-lived item, embedding its content first.
    pub fn add_to_working_memory(
        &self,
        content: impl Into<String>,
        ttl: chrono::Duration,
        importance: f64,
        trust_level: Option<f64>,
    ) -> Result<WorkingMemoryItem> {
        let content = content.into();
        if content.trim().is_empty() {
            return Err(MemoryError::Validation("content must not be empty".into()));
        }
        let embedding = self.resolve_embedding(&content)?;
        self.working.add(content, embedding, ttl, importance, trust_level)
    }

    /// Read a working item, bumping its access count.
    pub fn get_working_item(&self, id: &str) -> Result<Option<WorkingMemoryItem>> {
        self.working.get(id)
    }

    /// Force (or clear) promotion for a working item regardless of its
    /// importance or access count.
    pub fn flag_for_promotion(&self, id: &str, promote: bool) -> Result<()> {
        self.working.set_promote(id, promote)
    }

    /// Expire the working buffer: each expired item is promoted into an
    /// episodic long-term memory (reusing its embedding, with a
    /// working-memory provenance reference) or discarded, then deleted.
    pub fn cleanup_working_memory(&self) -> Result<CleanupReport> {
        self.working.cleanup(
            self.config.working_promote_importance,
            self.config.working_promote_accesses,
            |item| self.promote_working_item(item),
        )
    }

    fn promote_working_item(&self, item: &WorkingMemoryItem) -> Result<String> {
        let source = SourceReference {
            kind: "working_memory".to_string(),
            reference: Some(item.id.clone()),
            label: None,
            author: None,
            observed_at: item.created_at,
            trust: item.trust_level,
            content_hash: Some(content_hash(&item.content)),
        };
        let record = new_record(
            MemoryType::Episodic,
            item.content.clone(),
            item.embedding.clone(),
            item.importance,
            item.trust_level,
            0.01,
            Some(source),
            self.affect.current(),
            TypedMetadata::default_for(MemoryType::Episodic),
        );
        self.embedding_cache
            .put(&content_hash(&record.content), &record.embedding)?;
        self.store.insert_memory(&record)?;
        self.graph.upsert_node(LABEL_MEMORY, &record.id)?;
        self.episodes.assign(&record.id, record.created_at)?;
        Ok(record.id)
    }

    // ========================================================================
    // TRUST AND GRAPH
    // ========================================================================

    /// Re-derive trust for a semantic memory from its evidence and graph
    /// alignment. `Ok(None)` for missing ids and non-semantic memories.
    pub fn sync_memory_trust(&self, id: &str) -> Result<Option<f64>> {
        self.trust.sync(id)
    }

    /// Record that `memory_id` supports the standing belief `belief_id`,
    /// then re-derive the memory's trust from its new alignment.
    pub fn link_support(&self, memory_id: &str, belief_id: &str, strength: f64) -> Result<()> {
        self.link_memories(EDGE_SUPPORTS, memory_id, belief_id, strength)
    }

    /// Record that `memory_id` contradicts the standing belief
    /// `belief_id`, then re-derive the memory's trust.
    pub fn link_contradict(&self, memory_id: &str, belief_id: &str, strength: f64) -> Result<()> {
        self.link_memories(EDGE_CONTRADICTS, memory_id, belief_id, strength)
    }

    fn link_memories(
        &self,
        edge_type: &str,
        memory_id: &str,
        belief_id: &str,
        strength: f64,
    ) -> Result<()> {
        self.graph.upsert_node(LABEL_MEMORY, memory_id)?;
        self.graph.upsert_node(LABEL_MEMORY, belief_id)?;
        self.graph.create_edge(
            (LABEL_MEMORY, memory_id),
            (LABEL_MEMORY, belief_id),
            edge_type,
            json!({ "strength": strength.clamp(0.0, 1.0) }),
        )?;
        self.trust.sync(memory_id)?;
        Ok(())
    }

    /// Tag a memory as mentioning a named concept.
    pub fn link_concept(&self, memory_id: &str, concept: &str) -> Result<()> {
        self.graph.upsert_node(LABEL_MEMORY, memory_id)?;
        self.graph.upsert_node(LABEL_CONCEPT, concept)?;
        self.graph.create_edge(
            (LABEL_MEMORY, memory_id),
            (LABEL_CONCEPT, concept),
            EDGE_MENTIONS,
            json!({}),
        )
    }

    // ========================================================================
    // NEIGHBORHOODS
    // ========================================================================

    /// Recompute one memory's neighborhood now.
    pub fn recompute_neighborhood(&self, id: &str) -> Result<bool> {
        self.neighborhoods.recompute(id)
    }

    /// Recompute up to `n` stale neighborhoods, oldest first.
    pub fn batch_recompute_neighborhoods(&self, n: usize) -> Result<usize> {
        self.neighborhoods.batch_recompute(n)
    }

    // ========================================================================
    // MAINTENANCE
    // ========================================================================

    /// Run one maintenance tick under the maintenance lock. On contention
    /// the tick is skipped (`Ok(None)`) rather than stalled; another holder
    /// is already doing the work.
    pub fn run_maintenance(&self) -> Result<Option<MaintenanceReport>> {
        let Some(_guard) = self.locks.try_acquire(locks::MAINTENANCE)? else {
            tracing::debug!("maintenance lock held elsewhere, skipping tick");
            return Ok(None);
        };

        let mut report = MaintenanceReport {
            neighborhoods_recomputed: self
                .neighborhoods
                .batch_recompute(MAINTENANCE_RECOMPUTE_BATCH)?,
            embeddings_evicted: self
                .embedding_cache
                .sweep(self.config.embedding_cache_max_age_days)?,
            ..Default::default()
        };
        report.working = self.cleanup_working_memory()?;
        report.memories_decayed = self.decay_pass(Utc::now())?;
        tracing::debug!(
            recomputed = report.neighborhoods_recomputed,
            evicted = report.embeddings_evicted,
            promoted = report.working.promoted.len(),
            discarded = report.working.discarded,
            decayed = report.memories_decayed,
            "maintenance tick complete"
        );
        Ok(Some(report))
    }

    /// Importance decay pass: memories untouched since the previous pass
    /// lose importance by `exp(-decay_rate * elapsed_days)`, floored. The
    /// first pass only records its timestamp.
    fn decay_pass(&self, now: DateTime<Utc>) -> Result<usize> {
        let last: Option<DateTime<Utc>> = {
            let reader = self.store.reader()?;
            reader.query_row(
                "SELECT last_decay_pass FROM maintenance_state WHERE id = 1",
                [],
                |row| row.get(0),
            )?
        };
        let changed = match last {
            Some(last) if now > last => {
                let elapsed_days = ((now - last).num_seconds() as f64) / 86_400.0;
                self.store.decay_importance(last, elapsed_days)?
            }
            _ => 0,
        };
        let writer = self.store.writer()?;
        writer.execute(
            "UPDATE maintenance_state SET last_decay_pass = ?1 WHERE id = 1",
            params![now],
        )?;
        Ok(changed)
    }

    // ========================================================================
    // STATS
    // ========================================================================

    /// Corpus statistics.
    pub fn stats(&self) -> Result<StoreStats> {
        self.store.stats()
    }

    // ========================================================================
    // INTERNAL
    // ========================================================================

    /// Embed content through the persistent content-hash cache. Cache
    /// misses go to the provider within the retry budget and are written
    /// back for reuse.
    fn resolve_embedding(&self, text: &str) -> Result<Vec<f32>> {
        let hash = content_hash(text);
        if let Some(cached) = self.embedding_cache.get(&hash)? {
            tracing::debug!("embedding cache hit");
            return Ok(cached);
        }
        let embedding = embed_with_retry(
            self.embedder.as_ref(),
            text,
            self.config.embedding_retry_attempts,
        )?;
        if embedding.len() != self.config.embedding_dimensions {
            return Err(MemoryError::Validation(format!(
                "provider returned {} dimensions, expected {}",
                embedding.len(),
                self.config.embedding_dimensions
            )));
        }
        self.embedding_cache.put(&hash, &embedding)?;
        Ok(embedding)
    }
}

// ============================================================================
// TESTS
// ============================================================================
