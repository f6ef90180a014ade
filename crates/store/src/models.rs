//! Database rows and read-side entry types.

use crate::error::StoreResult;
use blobshelf_core::{EntryId, EntryMetadata, Filename, parse_timestamp};
use bytes::Bytes;
use futures::Stream;
use sqlx::FromRow;
use std::fmt;
use std::pin::Pin;
use tokio::io::AsyncRead;
use tokio_util::io::ReaderStream;

/// Buffer size used when adapting an entry reader into a byte stream (64 KiB).
const STREAM_CHUNK_SIZE: usize = 64 * 1024;

/// Entry metadata row, with the content size derived from its chunks.
#[derive(Debug, Clone, FromRow)]
pub struct EntryRow {
    pub id: String,
    pub filename: String,
    pub upload_time: String,
    pub expiration_time: String,
    pub size_bytes: i64,
}

impl EntryRow {
    /// Decode the persisted columns into domain metadata.
    pub fn into_metadata(self) -> StoreResult<EntryMetadata> {
        let uploaded = parse_timestamp(&self.upload_time)?;
        let expires = parse_timestamp(&self.expiration_time)?;
        Ok(EntryMetadata {
            id: EntryId::new(self.id)?,
            filename: Filename::new(self.filename),
            uploaded,
            expires,
            size: Some(u64::try_from(self.size_bytes).unwrap_or_default()),
        })
    }
}

/// A single chunk of entry content.
#[derive(Debug, Clone, FromRow)]
pub struct ChunkRow {
    pub id: String,
    pub chunk_index: i64,
    pub chunk_bytes: Vec<u8>,
}

/// Reader over an entry's reassembled content.
pub type EntryReader = Box<dyn AsyncRead + Send + Unpin>;

/// A boxed stream of bytes for streaming reads.
pub type ByteStream = Pin<Box<dyn Stream<Item = std::io::Result<Bytes>> + Send>>;

/// A live entry: metadata plus a lazy reader over its content.
pub struct Entry {
    pub metadata: EntryMetadata,
    pub reader: EntryReader,
}

impl Entry {
    pub fn new(metadata: EntryMetadata, reader: impl AsyncRead + Send + Unpin + 'static) -> Self {
        Self {
            metadata,
            reader: Box::new(reader),
        }
    }

    /// Adapt the content into a stream of byte buffers.
    pub fn into_byte_stream(self) -> ByteStream {
        Box::pin(ReaderStream::with_capacity(self.reader, STREAM_CHUNK_SIZE))
    }
}

impl fmt::Debug for Entry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Entry")
            .field("metadata", &self.metadata)
            .finish_non_exhaustive()
    }
}
