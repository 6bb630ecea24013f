//! # Keepsake Core
//!
//! Persistent memory substrate for a long-running autonomous agent.
//!
//! - **Multi-signal recall**: one ranked answer fused from vector
//!   similarity, cached associations, episode recency, decayed relevance,
//!   trust, and mood congruence
//! - **Trust engine**: evidence-driven trust with diminishing returns,
//!   provenance dedup, and graph alignment against supporting or
//!   contradicting memories
//! - **Episode segmentation**: 30-minute session windowing, serialized
//!   against concurrent writers by a named lock
//! - **Neighborhood caches**: precomputed per-memory similarity maps with
//!   explicit staleness, recomputed lazily in maintenance batches
//! - **Working memory**: a TTL buffer whose expired items are promoted
//!   into long-term episodic memories or discarded
//! - **Embedding cache**: content-hash keyed, so repeated content never
//!   hits the embedding provider twice
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use keepsake_core::{CreateMemoryInput, MemoryEngine, MemoryType};
//!
//! // Open the engine (None resolves a per-user data directory)
//! let engine = MemoryEngine::open(None, embedder, affect, &config)?;
//!
//! // Remember something
//! let input = CreateMemoryInput::new(MemoryType::Episodic, "shipped the release");
//! let memory = engine.create_memory(input)?;
//!
//! // Recall, then record the access
//! let results = engine.fast_recall("what did I ship?", 10)?;
//! engine.touch(&results.iter().map(|r| r.id.clone()).collect::<Vec<_>>())?;
//! ```
//!
//! Recall itself is a pure read; access tracking is the caller's explicit
//! follow-up via [`MemoryEngine::touch`].
//!
//! ## Feature Flags
//!
//! - `bundled-sqlite` (default): compile SQLite in rather than linking the
//!   system library

#![warn(rustdoc::missing_crate_level_docs)]

// ============================================================================
// MODULES
// ============================================================================

pub mod affect;
pub mod config;
pub mod embeddings;
pub mod engine;
pub mod episodes;
pub mod error;
pub mod graph;
pub mod locks;
pub mod memory;
pub mod neighborhood;
pub mod recall;
pub mod storage;
pub mod trust;
pub mod working;

// ============================================================================
// PUBLIC API RE-EXPORTS
// ============================================================================

// Engine facade
pub use engine::{MaintenanceReport, MemoryEngine};

// Memory data model
pub use memory::{
    CreateMemoryInput, MemoryRecord, MemoryStatus, MemoryType, SourceReference, TypedMetadata,
};

// Recall output
pub use recall::{RecallResult, RecallSignals};

// Seams callers implement or configure
pub use affect::{AffectSnapshot, AffectSource, NeutralAffect};
pub use config::{ConfigProvider, EngineConfig, InMemoryConfig};
pub use embeddings::{EmbedError, EmbeddingProvider};

// Component surfaces useful on their own
pub use episodes::{Episode, EpisodeMember};
pub use storage::{Store, StoreStats};
pub use working::{CleanupReport, WorkingMemoryItem};

// Errors
pub use error::{MemoryError, Result};

/// Crate version.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
