//! Crate-wide error taxonomy.
//!
//! Write-path errors are fatal to the caller's operation; read-path
//! enrichment (alignment lookups, affect sampling) degrades to neutral
//! values instead of surfacing here. Benign id races (touching or syncing
//! a memory that was just archived) are no-ops, not errors.

/// Core error type
#[non_exhaustive]
#[derive(Debug, thiserror::Error)]
pub enum MemoryError {
    /// Input rejected before any write (dimension mismatch, empty content)
    #[error("Validation error: {0}")]
    Validation(String),

    /// Database error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Embedding provider exhausted its retry budget
    #[error("Embedding unavailable: {0}")]
    EmbeddingUnavailable(String),

    /// Lookup that must exist came back empty
    #[error("Not found: {0}")]
    NotFound(String),

    /// Serialization of a metadata bag or neighbor map failed
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Initialization or lock-poisoning failure
    #[error("Initialization error: {0}")]
    Init(String),
}

/// Core result type
pub type Result<T> = std::result::Result<T, MemoryError>;
