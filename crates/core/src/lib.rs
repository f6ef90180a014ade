//! Core domain types and shared logic for blobshelf.
//!
//! This crate defines the data model shared by the storage engine and its
//! consumers:
//! - Entry identifiers, filenames and metadata
//! - The persisted timestamp format
//! - Store configuration and chunk sizing

pub mod config;
pub mod entry;
pub mod error;
pub mod timestamp;

pub use config::StoreConfig;
pub use entry::{EntryId, EntryMetadata, Filename};
pub use error::{Error, Result};
pub use timestamp::{format_timestamp, parse_timestamp, truncate_to_seconds};

/// Default chunk size: 32 MiB
pub const DEFAULT_CHUNK_SIZE: u64 = 32 * 1024 * 1024;

/// Maximum chunk size: 256 MiB (well below SQLite's default blob limit)
pub const MAX_CHUNK_SIZE: u64 = 256 * 1024 * 1024;

/// Minimum chunk size: 1 byte
pub const MIN_CHUNK_SIZE: u64 = 1;
