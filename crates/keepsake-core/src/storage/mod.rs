//! Storage Module
//!
//! SQLite-based storage layer: canonical memory rows, versioned
//! migrations, and the shared connection pair the other components run
//! their SQL through.

mod migrations;
mod sqlite;

pub use migrations::MIGRATIONS;
pub use sqlite::{Store, StoreStats};

pub(crate) use sqlite::new_record;
