//! Full-size scenario with the default 32 MiB chunk size.

mod common;

use blobshelf_core::{DEFAULT_CHUNK_SIZE, EntryMetadata, Filename};
use blobshelf_store::{ChunkRepo, EntryRepo};
use common::{TestStore, entry_id, random_bytes};
use time::macros::datetime;
use tokio::io::AsyncReadExt;

const MIB: usize = 1024 * 1024;

#[tokio::test]
async fn test_fifty_mib_upload_splits_into_two_chunks() {
    let ts = TestStore::new(DEFAULT_CHUNK_SIZE)
        .await
        .expect("Failed to create store");
    let store = &ts.store;

    let data = random_bytes(50 * MIB, 42);
    let meta = EntryMetadata::new(
        entry_id("abc"),
        Filename::new("notes.txt"),
        datetime!(2024-01-01 00:00:00 UTC),
        datetime!(2099-01-01 00:00:00 UTC),
    );

    let mut src = &data[..];
    store
        .insert_entry(&mut src, &meta)
        .await
        .expect("Insert entry failed");

    assert_eq!(
        store.chunk_sizes(&entry_id("abc")).await.unwrap(),
        vec![32 * MIB as u64, 18 * MIB as u64]
    );

    let mut entry = store.get_entry(&entry_id("abc")).await.unwrap();
    assert_eq!(entry.metadata.size, Some(50 * MIB as u64));

    // Read in modest pieces, the way a response body would be produced.
    let mut out = Vec::with_capacity(data.len());
    let mut buf = vec![0u8; 256 * 1024];
    loop {
        let n = entry.reader.read(&mut buf).await.unwrap();
        if n == 0 {
            break;
        }
        out.extend_from_slice(&buf[..n]);
    }
    assert_eq!(out.len(), data.len());
    assert!(out == data, "content mismatch");
}
