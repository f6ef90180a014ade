//! Chunk repository.

use crate::error::StoreResult;
use crate::models::ChunkRow;
use async_trait::async_trait;
use blobshelf_core::EntryId;

/// Repository for chunk-level reads.
#[async_trait]
pub trait ChunkRepo: Send + Sync {
    /// Get a single chunk by entry and position.
    async fn get_chunk(&self, id: &EntryId, chunk_index: u64) -> StoreResult<Option<ChunkRow>>;

    /// Count the chunks stored for an entry.
    async fn chunk_count(&self, id: &EntryId) -> StoreResult<u64>;

    /// Chunk lengths in index order.
    async fn chunk_sizes(&self, id: &EntryId) -> StoreResult<Vec<u64>>;
}
