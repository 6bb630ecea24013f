//! Test Fixtures
//!
//! Deterministic implementations of the engine's pluggable seams:
//! - An embedder that hashes text into a stable unit vector, so repeated
//!   runs produce identical rankings and no model is needed
//! - A scripted affect source tests can steer mid-journey

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use keepsake_core::{AffectSnapshot, AffectSource, EmbedError, EmbeddingProvider};
use sha2::{Digest, Sha256};

/// Dimensionality every journey test runs with.
pub const EMBEDDING_DIMENSIONS: usize = 8;

/// Embedder that folds a SHA-256 digest of the text into a normalized
/// vector. Identical text always embeds identically, which makes the
/// content-hash cache observable through the call counter.
pub struct HashEmbedder {
    calls: AtomicUsize,
}

impl HashEmbedder {
    pub fn new() -> Self {
        Self {
            calls: AtomicUsize::new(0),
        }
    }

    /// How many times the provider was actually invoked (cache misses).
    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl Default for HashEmbedder {
    fn default() -> Self {
        Self::new()
    }
}

impl EmbeddingProvider for HashEmbedder {
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let digest = Sha256::digest(text.as_bytes());
        let mut vector = vec![0.0f32; EMBEDDING_DIMENSIONS];
        for (i, byte) in digest.iter().enumerate() {
            vector[i % EMBEDDING_DIMENSIONS] += *byte as f32 / 255.0;
        }
        let norm = vector.iter().map(|x| x * x).sum::<f32>().sqrt();
        if norm == 0.0 {
            return Err(EmbedError::Fatal("degenerate embedding".to_string()));
        }
        Ok(vector.into_iter().map(|x| x / norm).collect())
    }
}

/// Affect source whose reading tests can change between operations, to
/// exercise mood-congruent recall against frozen emotional context.
pub struct ScriptedAffect {
    current: Mutex<AffectSnapshot>,
}

impl ScriptedAffect {
    pub fn new() -> Self {
        Self {
            current: Mutex::new(AffectSnapshot::neutral()),
        }
    }

    /// Replace the reported state.
    pub fn set(&self, snapshot: AffectSnapshot) {
        if let Ok(mut current) = self.current.lock() {
            *current = snapshot;
        }
    }
}

impl Default for ScriptedAffect {
    fn default() -> Self {
        Self::new()
    }
}

impl AffectSource for ScriptedAffect {
    fn current(&self) -> AffectSnapshot {
        self.current
            .lock()
            .map(|current| current.clone())
            .unwrap_or_default()
    }
}
