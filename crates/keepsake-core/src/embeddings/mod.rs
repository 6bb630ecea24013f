//! Embedding integration.
//!
//! The model itself lives outside this crate. The core consumes an
//! [`EmbeddingProvider`], retries transient failures within a bounded
//! budget, and memoizes results by content hash (see [`cache`]). A memory
//! is never persisted without its embedding: provider exhaustion is a
//! terminal error, not a silent fallback.

mod cache;

pub use cache::ContentHashCache;

use sha2::{Digest, Sha256};

// ============================================================================
// PROVIDER TRAIT
// ============================================================================

/// Embedding provider failure modes.
#[derive(Debug, Clone, thiserror::Error)]
pub enum EmbedError {
    /// Worth retrying within the budget (timeout, rate limit, cold start)
    #[error("transient embedding failure: {0}")]
    Transient(String),
    /// Retrying will not help (bad model config, invalid input)
    #[error("fatal embedding failure: {0}")]
    Fatal(String),
}

/// External embedding service.
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a text into a fixed-dimension vector.
    fn embed(&self, text: &str) -> Result<Vec<f32>, EmbedError>;
}

/// Call the provider, retrying transient failures up to `attempts` times
/// with linear backoff. Fatal errors and budget exhaustion both surface as
/// [`crate::MemoryError::EmbeddingUnavailable`].
pub fn embed_with_retry(
    provider: &dyn EmbeddingProvider,
    text: &str,
    attempts: u32,
) -> crate::Result<Vec<f32>> {
    let mut last_transient = String::new();
    for attempt in 1..=attempts.max(1) {
        match provider.embed(text) {
            Ok(vector) => return Ok(vector),
            Err(EmbedError::Fatal(msg)) => {
                return Err(crate::MemoryError::EmbeddingUnavailable(msg));
            }
            Err(EmbedError::Transient(msg)) => {
                tracing::debug!(attempt, "transient embedding failure: {}", msg);
                last_transient = msg;
                if attempt < attempts {
                    std::thread::sleep(std::time::Duration::from_millis(50 * attempt as u64));
                }
            }
        }
    }
    Err(crate::MemoryError::EmbeddingUnavailable(format!(
        "retry budget exhausted after {} attempts: {}",
        attempts.max(1),
        last_transient
    )))
}

// ============================================================================
// VECTOR MATH
// ============================================================================

/// Cosine similarity between two vectors.
///
/// Returns 0.0 for mismatched dimensions or degenerate (all-zero) inputs,
/// so callers never see NaN from an undefined similarity.
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    if a.len() != b.len() || a.is_empty() {
        return 0.0;
    }
    let mut dot = 0.0f32;
    let mut norm_a = 0.0f32;
    let mut norm_b = 0.0f32;
    for (x, y) in a.iter().zip(b.iter()) {
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }
    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }
    dot / (norm_a.sqrt() * norm_b.sqrt())
}

/// Whether a vector is degenerate (all zeros) and must be excluded from
/// similarity scoring.
pub fn is_degenerate(v: &[f32]) -> bool {
    v.iter().all(|x| *x == 0.0)
}

// ============================================================================
// BLOB CODEC
// ============================================================================

/// Encode a vector as little-endian f32 bytes for storage.
pub fn to_blob(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|f| f.to_le_bytes()).collect()
}

/// Decode a vector from little-endian f32 bytes.
pub fn from_blob(bytes: &[u8]) -> Option<Vec<f32>> {
    if bytes.len() % 4 != 0 {
        return None;
    }
    Some(
        bytes
            .chunks_exact(4)
            .map(|chunk| f32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]))
            .collect(),
    )
}

/// Stable content hash used as the embedding-cache key.
pub fn content_hash(text: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(text.as_bytes());
    hex::encode(hasher.finalize())
}

// ============================================================================
// TESTS
// ============================================================================
