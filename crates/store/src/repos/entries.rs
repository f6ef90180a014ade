//! Entry repository.

use crate::error::StoreResult;
use crate::models::Entry;
use async_trait::async_trait;
use blobshelf_core::{EntryId, EntryMetadata};
use tokio::io::AsyncRead;

/// Repository for whole-entry operations.
#[async_trait]
pub trait EntryRepo: Send + Sync {
    /// List metadata for every entry, expired or not.
    ///
    /// Sizes are derived from the stored chunks. Not paginated.
    async fn list_entries_metadata(&self) -> StoreResult<Vec<EntryMetadata>>;

    /// Get a live entry with a lazy reader over its content.
    ///
    /// Expired entries are reported as [`StoreError::EntryNotFound`](crate::StoreError::EntryNotFound),
    /// the same as missing ones.
    async fn get_entry(&self, id: &EntryId) -> StoreResult<Entry>;

    /// Store a new entry, consuming `reader` to end of stream.
    ///
    /// Metadata and all chunks are written in a single transaction. On any
    /// read or write failure the transaction is rolled back and nothing
    /// for this id becomes visible.
    async fn insert_entry(
        &self,
        reader: &mut (dyn AsyncRead + Unpin + Send),
        metadata: &EntryMetadata,
    ) -> StoreResult<()>;

    /// Delete an entry and all of its chunks. Deleting a missing id succeeds.
    async fn delete_entry(&self, id: &EntryId) -> StoreResult<()>;

    /// Delete every expired entry together with its chunks.
    ///
    /// Returns the number of entries removed.
    async fn purge_expired(&self) -> StoreResult<u64>;
}
