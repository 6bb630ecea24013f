//! Recall.
//!
//! One ranked answer per query, fused from six signals: vector similarity,
//! cached associations, episode recency, decayed relevance, trust, and
//! mood congruence. A pure read — recall never mutates the store, and for
//! fixed inputs and state its output is deterministic. Embedding failure
//! is a hard error; no fallback ranking is ever produced.

use std::collections::{HashMap, HashSet};
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use lru::LruCache;
use serde::Serialize;

use crate::affect::{mood_congruence, AffectSource};
use crate::embeddings::{
    content_hash, cosine_similarity, embed_with_retry, is_degenerate, ContentHashCache,
    EmbeddingProvider,
};
use crate::episodes::EpisodeSegmenter;
use crate::error::Result;
use crate::memory::{MemoryRecord, MemoryType};
use crate::neighborhood::NeighborhoodCache;
use crate::storage::Store;

// Signal weights in the final blend
const W_VECTOR: f64 = 0.5;
const W_ASSOCIATION: f64 = 0.2;
const W_TEMPORAL: f64 = 0.15;
const W_DECAYED_RELEVANCE: f64 = 0.05;
const W_TRUST: f64 = 0.10;
const W_MOOD: f64 = 0.05;

/// Flat bonus for membership in the open episode or one closed recently.
const TEMPORAL_BONUS: f64 = 0.15;

/// How long after an episode closes its members keep the recency bonus.
const EPISODE_RECENCY_HOURS: i64 = 1;

/// Scores never collapse to exactly zero.
const MIN_SCORE: f64 = 0.001;

/// Minimum seed-set size regardless of the requested limit.
const MIN_SEEDS: usize = 5;

const QUERY_CACHE_CAPACITY: usize = 100;

// ============================================================================
// RESULT TYPES
// ============================================================================

/// Per-signal score breakdown for one candidate.
#[derive(Debug, Clone, Copy, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecallSignals {
    /// Cosine similarity to the query
    pub vector: f64,
    /// Strongest seed-neighbor path
    pub association: f64,
    /// Episode recency bonus
    pub temporal: f64,
    /// Importance decayed by age, access-aware
    pub decayed_relevance: f64,
    /// The memory's trust level
    pub trust: f64,
    /// Mood congruence against the frozen emotional context
    pub mood: f64,
}

impl RecallSignals {
    /// The signal contributing most to the blended score.
    pub fn dominant(&self) -> &'static str {
        let weighted = [
            ("vector", W_VECTOR * self.vector),
            ("association", W_ASSOCIATION * self.association),
            ("temporal", W_TEMPORAL * self.temporal),
            ("decayed_relevance", W_DECAYED_RELEVANCE * self.decayed_relevance),
            ("trust", W_TRUST * self.trust),
            ("mood", W_MOOD * self.mood),
        ];
        weighted
            .iter()
            .max_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(std::cmp::Ordering::Equal))
            .map(|(name, _)| *name)
            .unwrap_or("vector")
    }

    fn blend(&self) -> f64 {
        let blended = W_VECTOR * self.vector
            + W_ASSOCIATION * self.association
            + W_TEMPORAL * self.temporal
            + W_DECAYED_RELEVANCE * self.decayed_relevance
            + W_TRUST * self.trust
            + W_MOOD * self.mood;
        blended.max(MIN_SCORE)
    }
}

/// One ranked recall hit.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RecallResult {
    /// Memory id
    pub id: String,
    /// Memory content
    pub content: String,
    /// Memory type
    pub memory_type: MemoryType,
    /// Blended score
    pub score: f64,
    /// Name of the dominant signal
    pub contributing_signal: String,
    /// Full per-signal breakdown
    pub signals: RecallSignals,
}

// ============================================================================
// RECALL ENGINE
// ============================================================================

/// Fuses the stores and caches into one ranked answer.
pub struct RecallEngine {
    store: Arc<Store>,
    neighborhoods: Arc<NeighborhoodCache>,
    episodes: Arc<EpisodeSegmenter>,
    embedding_cache: Arc<ContentHashCache>,
    embedder: Arc<dyn EmbeddingProvider>,
    affect: Arc<dyn AffectSource>,
    trust_floor: f64,
    retry_attempts: u32,
    /// LRU over query embeddings; interior mutability keeps recall `&self`
    query_cache: Mutex<LruCache<String, Vec<f32>>>,
}

impl RecallEngine {
    /// Wire a recall engine over the shared components.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        store: Arc<Store>,
        neighborhoods: Arc<NeighborhoodCache>,
        episodes: Arc<EpisodeSegmenter>,
        embedding_cache: Arc<ContentHashCache>,
        embedder: Arc<dyn EmbeddingProvider>,
        affect: Arc<dyn AffectSource>,
        trust_floor: f64,
        retry_attempts: u32,
    ) -> Self {
        Self {
            store,
            neighborhoods,
            episodes,
            embedding_cache,
            embedder,
            affect,
            trust_floor,
            retry_attempts,
            query_cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(QUERY_CACHE_CAPACITY).expect("capacity is non-zero"),
            )),
        }
    }

    /// Rank the `limit` most relevant active memories for a query.
    pub fn fast_recall(&self, query: &str, limit: usize) -> Result<Vec<RecallResult>> {
        if limit == 0 {
            return Ok(vec![]);
        }
        let query_embedding = self.query_embedding(query)?;
        let mood_now = self.affect.current();

        let corpus = self.store.load_active_memories()?;
        let by_id: HashMap<&str, &MemoryRecord> =
            corpus.iter().map(|m| (m.id.as_str(), m)).collect();

        // Seed set: top max(limit, 5) by cosine similarity, degenerate
        // embeddings excluded on both sides
        let mut seeds: Vec<(&str, f64)> = corpus
            .iter()
            .filter(|m| !is_degenerate(&m.embedding))
            .map(|m| {
                (
                    m.id.as_str(),
                    cosine_similarity(&query_embedding, &m.embedding) as f64,
                )
            })
            .collect();
        seeds.sort_by(|a, b| {
            b.1.partial_cmp(&a.1)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.0.cmp(b.0))
        });
        seeds.truncate(limit.max(MIN_SEEDS));

        let mut signals: HashMap<String, RecallSignals> = HashMap::new();
        for (id, similarity) in &seeds {
            signals.entry(id.to_string()).or_default().vector = *similarity;
        }

        // Association set: strongest single seed-neighbor path per
        // candidate, multiplicative, never additive across paths
        for (seed_id, seed_similarity) in &seeds {
            let Some(neighbors) = self.neighborhoods.get_fresh(seed_id)? else {
                continue;
            };
            for (neighbor_id, weight) in neighbors {
                if !by_id.contains_key(neighbor_id.as_str()) {
                    continue;
                }
                let path = (weight as f64) * seed_similarity;
                let entry = signals.entry(neighbor_id).or_default();
                entry.association = entry.association.max(path);
            }
        }

        // Temporal set: flat recency bonus for current-episode members
        let recent: HashSet<String> = self.episodes.recent_member_ids(EPISODE_RECENCY_HOURS)?;
        for id in &recent {
            if by_id.contains_key(id.as_str()) {
                signals.entry(id.clone()).or_default().temporal = TEMPORAL_BONUS;
            }
        }

        // Per-candidate enrichment and final blend
        let mut results: Vec<RecallResult> = signals
            .into_iter()
            .filter_map(|(id, mut sig)| {
                let memory = by_id.get(id.as_str())?;
                if memory.trust_level < self.trust_floor {
                    return None;
                }
                sig.decayed_relevance = decayed_relevance(memory);
                sig.trust = memory.trust_level;
                sig.mood = mood_congruence(&mood_now, &memory.emotional_context);
                Some(RecallResult {
                    id,
                    content: memory.content.clone(),
                    memory_type: memory.memory_type,
                    score: sig.blend(),
                    contributing_signal: sig.dominant().to_string(),
                    signals: sig,
                })
            })
            .collect();

        results.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
                .then_with(|| a.id.cmp(&b.id))
        });
        results.truncate(limit);
        Ok(results)
    }

    /// Resolve the query embedding: in-process LRU, then the persistent
    /// content-hash cache (read-only here; recall never writes the store),
    /// then the provider within the retry budget.
    fn query_embedding(&self, query: &str) -> Result<Vec<f32>> {
        if let Ok(mut cache) = self.query_cache.lock() {
            if let Some(hit) = cache.get(query) {
                return Ok(hit.clone());
            }
        }
        let hash = content_hash(query);
        let embedding = match self.embedding_cache.get(&hash)? {
            Some(cached) => cached,
            None => embed_with_retry(self.embedder.as_ref(), query, self.retry_attempts)?,
        };
        if let Ok(mut cache) = self.query_cache.lock() {
            cache.put(query.to_string(), embedding.clone());
        }
        Ok(embedding)
    }
}

/// Importance decayed by age, where recent access resets the clock at half
/// rate: `importance * exp(-decay_rate * min(created_age, 0.5 * access_age))`.
pub fn decayed_relevance(memory: &MemoryRecord) -> f64 {
    let now = Utc::now();
    let created_age_days = age_days(now, memory.created_at);
    let access_age_days = age_days(now, memory.last_accessed.unwrap_or(memory.created_at));
    let effective_age = created_age_days.min(0.5 * access_age_days);
    memory.importance * (-memory.decay_rate * effective_age).exp()
}

fn age_days(now: chrono::DateTime<Utc>, then: chrono::DateTime<Utc>) -> f64 {
    ((now - then).num_seconds().max(0) as f64) / 86_400.0
}

// ============================================================================
// TESTS
// ============================================================================
