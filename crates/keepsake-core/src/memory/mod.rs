//! Memory record types - the data model of the substrate.

mod record;
mod source;

pub use record::{
    CreateMemoryInput, MemoryRecord, MemoryStatus, MemoryType, TypedMetadata,
};
pub use source::SourceReference;
