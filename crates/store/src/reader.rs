//! Lazy reassembly of an entry's chunks into a byte stream.

use crate::error::StoreResult;
use blobshelf_core::EntryId;
use futures::future::BoxFuture;
use sqlx::{Pool, Sqlite};
use std::fmt;
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll, ready};
use tokio::io::{AsyncRead, ReadBuf};

type ChunkFetch = BoxFuture<'static, StoreResult<Option<Vec<u8>>>>;

/// Forward-only reader over the chunk rows of one entry.
///
/// Chunks are fetched one at a time, in index order, as the caller reads.
/// At most one chunk is held in memory. The reader does not pin the rows:
/// if the entry is deleted mid-read, the next missing chunk ends the stream.
pub struct ChunkReader {
    pool: Pool<Sqlite>,
    entry_id: EntryId,
    next_chunk_index: i64,
    current: Vec<u8>,
    offset: usize,
    pending: Option<ChunkFetch>,
    finished: bool,
}

impl ChunkReader {
    /// Create a reader positioned at the first chunk of `entry_id`.
    pub fn new(pool: Pool<Sqlite>, entry_id: EntryId) -> Self {
        Self {
            pool,
            entry_id,
            next_chunk_index: 0,
            current: Vec::new(),
            offset: 0,
            pending: None,
            finished: false,
        }
    }

    pub fn entry_id(&self) -> &EntryId {
        &self.entry_id
    }

    /// Index of the next chunk to fetch.
    pub fn next_chunk_index(&self) -> u64 {
        self.next_chunk_index as u64
    }
}

impl fmt::Debug for ChunkReader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ChunkReader")
            .field("entry_id", &self.entry_id)
            .field("next_chunk_index", &self.next_chunk_index)
            .field("buffered", &(self.current.len() - self.offset))
            .field("finished", &self.finished)
            .finish()
    }
}

/// Load one chunk's bytes, or `None` past the last chunk.
pub(crate) async fn fetch_chunk(
    pool: Pool<Sqlite>,
    entry_id: EntryId,
    chunk_index: i64,
) -> StoreResult<Option<Vec<u8>>> {
    let chunk = sqlx::query_scalar::<_, Vec<u8>>(
        "SELECT chunk_bytes FROM entries_data WHERE id = ? AND chunk_index = ?",
    )
    .bind(entry_id.as_str())
    .bind(chunk_index)
    .fetch_optional(&pool)
    .await?;
    Ok(chunk)
}

impl AsyncRead for ChunkReader {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        let this = self.get_mut();
        if buf.remaining() == 0 {
            return Poll::Ready(Ok(()));
        }

        loop {
            if this.offset < this.current.len() {
                let n = buf.remaining().min(this.current.len() - this.offset);
                buf.put_slice(&this.current[this.offset..this.offset + n]);
                this.offset += n;
                return Poll::Ready(Ok(()));
            }

            if this.finished {
                return Poll::Ready(Ok(()));
            }

            let (pool, entry_id, chunk_index) =
                (&this.pool, &this.entry_id, this.next_chunk_index);
            let fetch = this.pending.get_or_insert_with(|| {
                let fetch: ChunkFetch =
                    Box::pin(fetch_chunk(pool.clone(), entry_id.clone(), chunk_index));
                fetch
            });
            let result = ready!(fetch.as_mut().poll(cx));
            this.pending = None;

            match result {
                Ok(Some(chunk)) => {
                    tracing::debug!(
                        entry_id = %this.entry_id,
                        chunk_index = this.next_chunk_index,
                        bytes = chunk.len(),
                        "read chunk"
                    );
                    this.current = chunk;
                    this.offset = 0;
                    this.next_chunk_index += 1;
                }
                Ok(None) => {
                    this.current = Vec::new();
                    this.offset = 0;
                    this.finished = true;
                }
                Err(e) => return Poll::Ready(Err(io::Error::other(e))),
            }
        }
    }
}
