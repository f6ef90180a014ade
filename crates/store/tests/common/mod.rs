//! Shared fixtures for store integration tests.

#![allow(dead_code)]

use blobshelf_core::{EntryId, EntryMetadata, Filename, StoreConfig};
use blobshelf_store::{SqliteStore, StoreResult};
use rand::rngs::StdRng;
use rand::{RngCore, SeedableRng};
use std::io;
use std::pin::Pin;
use std::task::{Context, Poll};
use tempfile::TempDir;
use time::OffsetDateTime;
use time::macros::datetime;
use tokio::io::{AsyncRead, ReadBuf};

/// A file-backed test store that cleans up on drop.
pub struct TestStore {
    pub store: SqliteStore,
    pub config: StoreConfig,
    _temp_dir: TempDir,
}

impl TestStore {
    /// Create a store in a fresh temporary directory.
    pub async fn new(chunk_size: u64) -> StoreResult<Self> {
        init_tracing();
        let temp_dir = tempfile::tempdir().expect("Failed to create temp directory");
        let config = StoreConfig::at(temp_dir.path().join("test.db")).with_chunk_size(chunk_size);
        let store = SqliteStore::open(&config).await?;
        Ok(Self {
            store,
            config,
            _temp_dir: temp_dir,
        })
    }

    /// Reopen the same database file with a new handle.
    pub async fn reopen(&self) -> StoreResult<SqliteStore> {
        SqliteStore::open(&self.config).await
    }
}

/// Install a test subscriber once; controlled by RUST_LOG.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn entry_id(id: &str) -> EntryId {
    EntryId::new(id).expect("valid entry id")
}

/// Metadata that stays live until 2099.
pub fn live_metadata(id: &str) -> EntryMetadata {
    EntryMetadata::new(
        entry_id(id),
        Filename::new(format!("{id}.bin")),
        datetime!(2024-01-01 00:00:00 UTC),
        datetime!(2099-01-01 00:00:00 UTC),
    )
}

/// Metadata that expired an hour ago.
pub fn expired_metadata(id: &str) -> EntryMetadata {
    let now = OffsetDateTime::now_utc();
    EntryMetadata::new(
        entry_id(id),
        Filename::new(format!("{id}.bin")),
        now - time::Duration::days(2),
        now - time::Duration::hours(1),
    )
}

/// Deterministic pseudo-random payload.
pub fn random_bytes(len: usize, seed: u64) -> Vec<u8> {
    let mut data = vec![0u8; len];
    StdRng::seed_from_u64(seed).fill_bytes(&mut data);
    data
}

/// Reader that serves `data` and then fails instead of reporting end of stream.
pub struct FailingReader {
    data: Vec<u8>,
    pos: usize,
}

impl FailingReader {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data, pos: 0 }
    }
}

impl AsyncRead for FailingReader {
    fn poll_read(
        mut self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        if self.pos >= self.data.len() {
            return Poll::Ready(Err(io::Error::new(
                io::ErrorKind::ConnectionReset,
                "upload interrupted",
            )));
        }
        let n = buf.remaining().min(self.data.len() - self.pos);
        let start = self.pos;
        buf.put_slice(&self.data[start..start + n]);
        self.pos += n;
        Poll::Ready(Ok(()))
    }
}
