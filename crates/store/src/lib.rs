//! Chunked blob storage for blobshelf.
//!
//! Uploads of arbitrary size are stored in SQLite as an entry metadata row
//! plus an ordered sequence of bounded-size chunk rows:
//! - Writes split the incoming stream into chunks inside one transaction
//! - Reads reassemble the chunks lazily, holding one chunk at a time
//! - Expired entries are hidden from reads and removed by purge

pub mod error;
pub mod models;
pub mod reader;
pub mod repos;
pub mod store;

pub use error::{StoreError, StoreResult};
pub use models::{ByteStream, ChunkRow, Entry, EntryReader, EntryRow};
pub use reader::ChunkReader;
pub use repos::{ChunkRepo, EntryRepo};
pub use store::{EntryStore, SqliteStore};

use blobshelf_core::StoreConfig;
use std::sync::Arc;

/// Create an entry store from configuration.
pub async fn from_config(config: &StoreConfig) -> StoreResult<Arc<dyn EntryStore>> {
    config.validate().map_err(StoreError::Config)?;
    let store = SqliteStore::open(config).await?;
    Ok(Arc::new(store) as Arc<dyn EntryStore>)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_from_config_sqlite() {
        let temp_dir = tempfile::tempdir().unwrap();
        let config = StoreConfig::at(temp_dir.path().join("nested").join("store.db"));

        let store = from_config(&config).await.unwrap();
        store.health_check().await.unwrap();
        assert!(temp_dir.path().join("nested").join("store.db").exists());
    }

    #[tokio::test]
    async fn test_from_config_rejects_zero_connections() {
        let mut config = StoreConfig::in_memory();
        config.max_connections = 0;

        match from_config(&config).await {
            Ok(_) => panic!("expected error"),
            Err(StoreError::Config(_)) => {}
            Err(other) => panic!("unexpected error: {other:?}"),
        }
    }
}
