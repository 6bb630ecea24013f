//! Trust derivation.
//!
//! A semantic memory's trust level is derived, never self-reported:
//! deduplicated provenance feeds a saturating reinforcement score that
//! caps the memory's own confidence, and alignment with standing worldview
//! beliefs pushes the result up or down. One low-trust source yields
//! near-zero reinforcement; many independent trustworthy sources approach,
//! but never reach, full reinforcement. Contradiction with standing belief
//! actively penalizes trust instead of being ignored.
//!
//! Non-semantic memories set trust once at creation and never re-derive it.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};

use crate::error::Result;
use crate::graph::{EdgePattern, GraphStore, EDGE_CONTRADICTS, EDGE_SUPPORTS, LABEL_MEMORY};
use crate::memory::{MemoryType, SourceReference};
use crate::storage::Store;

/// Reinforcement steepness: how fast independent sources saturate.
const REINFORCEMENT_RATE: f64 = 0.8;

/// Trust floor granted before any evidence.
const BASE_TRUST_CAP: f64 = 0.15;

/// Evidence-driven share of the trust cap.
const EVIDENCE_TRUST_SPAN: f64 = 0.85;

/// Boost per unit of positive worldview alignment.
const ALIGNMENT_BONUS: f64 = 0.10;

// ============================================================================
// PURE FUNCTIONS
// ============================================================================

/// Normalize a loosely structured source reference: clamp trust to [0, 1],
/// default `observed_at` to now when missing or unparsable, drop empty
/// string fields.
pub fn normalize(value: &serde_json::Value) -> SourceReference {
    let text = |key: &str| {
        value
            .get(key)
            .and_then(|v| v.as_str())
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
    };
    let observed_at = value
        .get("observedAt")
        .and_then(|v| v.as_str())
        .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(Utc::now);

    SourceReference {
        kind: text("kind").unwrap_or_else(|| "unknown".to_string()),
        reference: text("ref"),
        label: text("label"),
        author: text("author"),
        observed_at,
        trust: value
            .get("trust")
            .and_then(|v| v.as_f64())
            .unwrap_or(0.5)
            .clamp(0.0, 1.0),
        content_hash: text("contentHash"),
    }
}

/// Deduplicate sources by canonical key, keeping the most-recently-observed
/// entry per key.
pub fn dedupe(sources: &[SourceReference]) -> Vec<SourceReference> {
    let mut by_key: HashMap<String, SourceReference> = HashMap::new();
    for source in sources {
        let key = source.canonical_key();
        match by_key.get(&key) {
            Some(existing) if existing.observed_at >= source.observed_at => {}
            _ => {
                by_key.insert(key, source.clone());
            }
        }
    }
    let mut deduped: Vec<SourceReference> = by_key.into_values().collect();
    // Stable output order for idempotent downstream writes
    deduped.sort_by(|a, b| a.canonical_key().cmp(&b.canonical_key()));
    deduped
}

/// Saturating reinforcement in [0, 1): `1 - exp(-0.8 * n * avg_trust)` over
/// deduplicated sources. No sources means no reinforcement.
pub fn reinforcement(sources: &[SourceReference]) -> f64 {
    let unique = dedupe(sources);
    if unique.is_empty() {
        return 0.0;
    }
    let avg_trust: f64 =
        unique.iter().map(|source| source.trust).sum::<f64>() / unique.len() as f64;
    1.0 - (-REINFORCEMENT_RATE * unique.len() as f64 * avg_trust).exp()
}

/// Derive trust from self-reported confidence, provenance, and worldview
/// alignment.
///
/// The reinforcement cap guarantees confidence never exceeds what evidence
/// supports; negative alignment scales trust toward zero, positive
/// alignment adds a small bonus.
pub fn compute_trust(confidence: f64, sources: &[SourceReference], alignment: f64) -> f64 {
    let cap = BASE_TRUST_CAP + EVIDENCE_TRUST_SPAN * reinforcement(sources);
    let mut effective = confidence.clamp(0.0, 1.0).min(cap);
    if alignment < 0.0 {
        effective *= 1.0 + alignment.max(-1.0);
    } else {
        effective = (effective + ALIGNMENT_BONUS * alignment.min(1.0)).min(1.0);
    }
    effective.clamp(0.0, 1.0)
}

// ============================================================================
// TRUST ENGINE
// ============================================================================

/// Derives and persists trust for semantic memories.
pub struct TrustEngine {
    store: Arc<Store>,
    graph: Arc<dyn GraphStore>,
}

impl TrustEngine {
    /// Create a trust engine over a store and graph.
    pub fn new(store: Arc<Store>, graph: Arc<dyn GraphStore>) -> Self {
        Self { store, graph }
    }

    /// Net support-vs-contradiction signal in [-1, 1] over the memory's
    /// linked worldview beliefs; 0 with no such relations. Graph failures
    /// degrade to neutral rather than failing the caller.
    pub fn alignment(&self, memory_id: &str) -> f64 {
        let sum_strength = |edge_type: &str| -> f64 {
            match self
                .graph
                .query_edges(&EdgePattern::outgoing(edge_type, LABEL_MEMORY, memory_id))
            {
                Ok(edges) => edges.iter().map(|edge| edge.strength().max(0.0)).sum(),
                Err(e) => {
                    tracing::warn!(memory_id, "alignment lookup degraded to neutral: {}", e);
                    0.0
                }
            }
        };
        let support = sum_strength(EDGE_SUPPORTS);
        let contradict = sum_strength(EDGE_CONTRADICTS);
        let total = support + contradict;
        if total == 0.0 {
            0.0
        } else {
            (support - contradict) / total
        }
    }

    /// Recompute and persist trust for a semantic memory.
    ///
    /// Idempotent: without new evidence, a second sync lands on the same
    /// trust level. Non-semantic memories and missing ids are no-ops
    /// (`Ok(None)`). Also backfills an empty source attribution from the
    /// first available source.
    pub fn sync(&self, memory_id: &str) -> Result<Option<f64>> {
        let Some(memory) = self.store.get_memory(memory_id)? else {
            return Ok(None);
        };
        if memory.memory_type != MemoryType::Semantic {
            return Ok(None);
        }
        let confidence = memory.confidence().unwrap_or(0.5);
        let sources = dedupe(memory.semantic_sources());
        let alignment = self.alignment(memory_id);
        let trust = compute_trust(confidence, &sources, alignment);

        self.store.update_trust(memory_id, trust, Utc::now())?;
        if memory.source_attribution.is_none() {
            if let Some(first) = sources.first() {
                self.store.backfill_attribution(memory_id, first)?;
            }
        }
        tracing::debug!(memory_id, trust, alignment, "trust synced");
        Ok(Some(trust))
    }
}

// ============================================================================
// TESTS
// ============================================================================
