//! End-to-end test support for keepsake-core.
//!
//! Journey tests drive the public engine surface the way a host agent
//! would; this crate supplies the harness (isolated databases) and the
//! mocks (deterministic embedder, scripted affect) they share.

pub mod harness;
pub mod mocks;

pub use harness::TestHarness;
pub use mocks::{HashEmbedder, ScriptedAffect, EMBEDDING_DIMENSIONS};
