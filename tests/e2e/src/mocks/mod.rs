//! Deterministic stand-ins for the engine's external seams.

mod fixtures;

pub use fixtures::{HashEmbedder, ScriptedAffect, EMBEDDING_DIMENSIONS};
