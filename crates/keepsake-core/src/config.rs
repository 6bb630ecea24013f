//! Configuration access.
//!
//! The core reads its tunables through a narrow provider trait so callers
//! can back it with whatever settings store they already have. Every key
//! has a default; a missing key is never an error.

use std::collections::HashMap;

/// Narrow configuration surface consumed by the core.
pub trait ConfigProvider: Send + Sync {
    /// Fetch a float setting, falling back to `default`.
    fn get_float(&self, key: &str, default: f64) -> f64;
    /// Fetch an integer setting, falling back to `default`.
    fn get_int(&self, key: &str, default: i64) -> i64;
    /// Fetch a text setting, falling back to `default`.
    fn get_text(&self, key: &str, default: &str) -> String;
}

/// In-memory provider seeded from key/value pairs.
#[derive(Debug, Default, Clone)]
pub struct InMemoryConfig {
    values: HashMap<String, String>,
}

impl InMemoryConfig {
    /// Create an empty provider (all lookups return defaults).
    pub fn new() -> Self {
        Self::default()
    }

    /// Set a key, replacing any previous value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }
}

impl ConfigProvider for InMemoryConfig {
    fn get_float(&self, key: &str, default: f64) -> f64 {
        self.values
            .get(key)
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    fn get_int(&self, key: &str, default: i64) -> i64 {
        self.values
            .get(key)
            .and_then(|v| v.parse().ok())
            .unwrap_or(default)
    }

    fn get_text(&self, key: &str, default: &str) -> String {
        self.values
            .get(key)
            .cloned()
            .unwrap_or_else(|| default.to_string())
    }
}

/// Resolved engine tunables, read once at construction.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Embedding dimension every stored vector must match
    pub embedding_dimensions: usize,
    /// Minimum trust a candidate needs to survive recall filtering
    pub recall_trust_floor: f64,
    /// Neighborhood size for `recompute`
    pub neighborhood_k: usize,
    /// Similarity floor for neighborhood membership
    pub neighborhood_min_similarity: f32,
    /// Inactivity gap that closes an episode, in minutes
    pub episode_gap_minutes: i64,
    /// Maximum age of an embedding-cache entry before the sweep evicts it, in days
    pub embedding_cache_max_age_days: i64,
    /// Working-memory promotion threshold on importance
    pub working_promote_importance: f64,
    /// Working-memory promotion threshold on access count
    pub working_promote_accesses: i64,
    /// Retry attempts allowed per embedding call
    pub embedding_retry_attempts: u32,
}

impl EngineConfig {
    /// Defaults used when no provider override exists.
    pub const DEFAULT_DIMENSIONS: usize = 256;

    /// Resolve from a provider.
    pub fn from_provider(config: &dyn ConfigProvider) -> Self {
        Self {
            embedding_dimensions: config
                .get_int("embedding.dimensions", Self::DEFAULT_DIMENSIONS as i64)
                .max(1) as usize,
            recall_trust_floor: config.get_float("recall.trust_floor", 0.05),
            neighborhood_k: config.get_int("neighborhood.k", 20).max(1) as usize,
            neighborhood_min_similarity: config.get_float("neighborhood.min_similarity", 0.5)
                as f32,
            episode_gap_minutes: config.get_int("episode.gap_minutes", 30),
            embedding_cache_max_age_days: config.get_int("embedding_cache.max_age_days", 30),
            working_promote_importance: config.get_float("working.promote_importance", 0.7),
            working_promote_accesses: config.get_int("working.promote_accesses", 3),
            embedding_retry_attempts: config.get_int("embedding.retry_attempts", 3).max(1) as u32,
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from_provider(&InMemoryConfig::new())
    }
}
