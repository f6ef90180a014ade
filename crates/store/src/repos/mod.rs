//! Repository traits for entry and chunk operations.

pub mod chunks;
pub mod entries;

pub use chunks::ChunkRepo;
pub use entries::EntryRepo;
