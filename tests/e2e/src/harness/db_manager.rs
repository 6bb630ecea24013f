//! Test Database Manager
//!
//! Provides isolated engine instances for testing:
//! - Temporary databases that are automatically cleaned up
//! - Deterministic embedder and scripted affect wired in
//! - Concurrent test isolation (each harness owns its own directory)

use std::path::PathBuf;
use std::sync::Arc;

use keepsake_core::{
    CreateMemoryInput, InMemoryConfig, MemoryEngine, MemoryRecord, MemoryType,
};
use tempfile::TempDir;

use crate::mocks::{HashEmbedder, ScriptedAffect, EMBEDDING_DIMENSIONS};

/// An engine over an isolated temporary database.
///
/// The temporary directory is kept alive for the harness's lifetime and
/// deleted when it drops, so tests never interfere with each other.
///
/// # Example
///
/// ```rust,ignore
/// let harness = TestHarness::new();
/// let memory = harness.remember(MemoryType::Episodic, "saw a heron");
/// let hits = harness.engine.fast_recall("saw a heron", 5).unwrap();
/// ```
pub struct TestHarness {
    /// The engine under test
    pub engine: MemoryEngine,
    /// Provider call counter, for cache assertions
    pub embedder: Arc<HashEmbedder>,
    /// Steerable affect source
    pub affect: Arc<ScriptedAffect>,
    /// Temporary directory (kept alive to prevent premature deletion)
    _temp_dir: TempDir,
    db_path: PathBuf,
}

impl TestHarness {
    /// Open an engine over a fresh temporary database.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("create temp dir");
        let db_path = temp_dir.path().join("keepsake.db");
        let mut config = InMemoryConfig::new();
        config.set("embedding.dimensions", EMBEDDING_DIMENSIONS.to_string());

        let embedder = Arc::new(HashEmbedder::new());
        let affect = Arc::new(ScriptedAffect::new());
        let provider_handle: Arc<dyn keepsake_core::EmbeddingProvider> =
            Arc::clone(&embedder) as Arc<dyn keepsake_core::EmbeddingProvider>;
        let affect_handle: Arc<dyn keepsake_core::AffectSource> =
            Arc::clone(&affect) as Arc<dyn keepsake_core::AffectSource>;
        let engine = MemoryEngine::open(
            Some(db_path.clone()),
            provider_handle,
            affect_handle,
            &config,
        )
        .expect("open engine");

        Self {
            engine,
            embedder,
            affect,
            _temp_dir: temp_dir,
            db_path,
        }
    }

    /// Where this harness's database lives.
    pub fn db_path(&self) -> &PathBuf {
        &self.db_path
    }

    /// Create a memory with defaults, panicking on failure.
    pub fn remember(&self, memory_type: MemoryType, content: &str) -> MemoryRecord {
        self.engine
            .create_memory(CreateMemoryInput::new(memory_type, content))
            .expect("create memory")
    }
}

impl Default for TestHarness {
    fn default() -> Self {
        Self::new()
    }
}
