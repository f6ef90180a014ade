//! Entry store trait and the SQLite implementation.

use crate::error::{StoreError, StoreResult};
use crate::models::{ChunkRow, Entry, EntryRow};
use crate::reader::ChunkReader;
use crate::repos::{ChunkRepo, EntryRepo};
use async_trait::async_trait;
use blobshelf_core::{EntryId, EntryMetadata, StoreConfig, format_timestamp};
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteSynchronous,
};
use sqlx::{Pool, Sqlite, Transaction};
use std::str::FromStr;
use time::OffsetDateTime;
use tokio::io::{AsyncRead, AsyncReadExt};
use tracing::instrument;

/// Combined store trait consumed by the application layer.
#[async_trait]
pub trait EntryStore: EntryRepo + ChunkRepo + Send + Sync {
    /// Create the schema if it does not exist yet.
    async fn migrate(&self) -> StoreResult<()>;

    /// Check database connectivity.
    async fn health_check(&self) -> StoreResult<()>;

    /// Maximum bytes per chunk row.
    fn chunk_size(&self) -> u64;
}

/// SQLite-backed chunked entry store.
pub struct SqliteStore {
    pool: Pool<Sqlite>,
    chunk_size: usize,
}

impl SqliteStore {
    /// Open (creating if needed) the database described by `config` and
    /// initialize its schema.
    ///
    /// A schema failure is returned as [`StoreError::Schema`]; the store
    /// cannot operate without its tables, so callers should treat it as fatal.
    pub async fn open(config: &StoreConfig) -> StoreResult<Self> {
        config.check()?;
        let in_memory = config.is_in_memory();

        let opts = if in_memory {
            SqliteConnectOptions::from_str("sqlite::memory:")?
        } else {
            if let Some(parent) = config.path.parent() {
                if !parent.as_os_str().is_empty() {
                    std::fs::create_dir_all(parent)?;
                }
            }
            SqliteConnectOptions::new()
                .filename(&config.path)
                .create_if_missing(true)
                .journal_mode(SqliteJournalMode::Wal)
        };
        let opts = opts
            .synchronous(SqliteSynchronous::Normal)
            .foreign_keys(true)
            .busy_timeout(config.busy_timeout());

        let pool_opts = if in_memory {
            // Each connection to :memory: is a separate database, so the pool
            // must hold exactly one connection for the store's whole lifetime.
            // An open write transaction therefore blocks every reader.
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
        } else {
            SqlitePoolOptions::new().max_connections(config.max_connections)
        };
        let pool = pool_opts.connect_with(opts).await?;

        tracing::info!(
            path = %config.path.display(),
            chunk_size = config.chunk_size,
            "opened entry store"
        );

        let store = Self {
            pool,
            chunk_size: config.chunk_len(),
        };
        store.migrate().await?;
        Ok(store)
    }

    /// Get a reference to the connection pool.
    pub fn pool(&self) -> &Pool<Sqlite> {
        &self.pool
    }
}

#[async_trait]
impl EntryStore for SqliteStore {
    async fn migrate(&self) -> StoreResult<()> {
        for stmt in SCHEMA_STATEMENTS {
            sqlx::query(stmt).execute(&self.pool).await.map_err(|e| {
                tracing::error!(error = %e, "failed to initialize schema");
                StoreError::Schema(e)
            })?;
        }
        Ok(())
    }

    async fn health_check(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }

    fn chunk_size(&self) -> u64 {
        self.chunk_size as u64
    }
}

/// Totals for one committed upload.
#[derive(Debug, Clone, Copy, Default)]
struct WriteStats {
    chunks: u64,
    bytes: u64,
}

/// Current time in the persisted format. Expiry comparisons run on the raw
/// text column, which sorts chronologically.
fn now_timestamp() -> StoreResult<String> {
    Ok(format_timestamp(OffsetDateTime::now_utc())?)
}

/// An entry's timestamps rendered for the `entries` row.
struct RowTimes {
    uploaded: String,
    expires: String,
}

impl RowTimes {
    fn of(metadata: &EntryMetadata) -> StoreResult<Self> {
        Ok(Self {
            uploaded: format_timestamp(metadata.uploaded)?,
            expires: format_timestamp(metadata.expires)?,
        })
    }
}

fn map_insert_error(err: sqlx::Error, id: &EntryId) -> StoreError {
    match &err {
        sqlx::Error::Database(db) if db.is_unique_violation() => {
            StoreError::AlreadyExists(id.clone())
        }
        _ => StoreError::Database(err),
    }
}

/// Roll back after a failed write and hand the original error back.
async fn abort(tx: Transaction<'_, Sqlite>, err: StoreError) -> StoreError {
    if let Err(rollback_err) = tx.rollback().await {
        tracing::warn!(error = %rollback_err, "rollback failed");
    }
    err
}

/// Read from `reader` until `buf` is full or the stream ends.
async fn fill_chunk(
    reader: &mut (dyn AsyncRead + Unpin + Send),
    buf: &mut [u8],
) -> std::io::Result<usize> {
    let mut filled = 0;
    while filled < buf.len() {
        match reader.read(&mut buf[filled..]).await? {
            0 => break,
            n => filled += n,
        }
    }
    Ok(filled)
}

async fn write_entry(
    tx: &mut Transaction<'_, Sqlite>,
    reader: &mut (dyn AsyncRead + Unpin + Send),
    metadata: &EntryMetadata,
    times: &RowTimes,
    chunk_size: usize,
) -> StoreResult<WriteStats> {
    sqlx::query(
        "INSERT INTO entries (id, filename, upload_time, expiration_time) VALUES (?, ?, ?, ?)",
    )
    .bind(metadata.id.as_str())
    .bind(metadata.filename.as_str())
    .bind(times.uploaded.as_str())
    .bind(times.expires.as_str())
    .execute(&mut **tx)
    .await
    .map_err(|e| map_insert_error(e, &metadata.id))?;

    let mut buf = vec![0u8; chunk_size];
    let mut stats = WriteStats::default();
    loop {
        let n = fill_chunk(reader, &mut buf).await?;
        if n == 0 {
            break;
        }

        tracing::debug!(
            entry_id = %metadata.id,
            chunk_index = stats.chunks,
            bytes = n,
            offset = stats.bytes,
            "writing chunk"
        );
        sqlx::query("INSERT INTO entries_data (id, chunk_index, chunk_bytes) VALUES (?, ?, ?)")
            .bind(metadata.id.as_str())
            .bind(stats.chunks as i64)
            .bind(&buf[..n])
            .execute(&mut **tx)
            .await?;

        stats.chunks += 1;
        stats.bytes += n as u64;
        if n < buf.len() {
            break;
        }
    }
    Ok(stats)
}

async fn delete_rows(tx: &mut Transaction<'_, Sqlite>, id: &EntryId) -> StoreResult<(u64, u64)> {
    // Chunks first: entries_data references entries.
    let chunks = sqlx::query("DELETE FROM entries_data WHERE id = ?")
        .bind(id.as_str())
        .execute(&mut **tx)
        .await?;
    let entries = sqlx::query("DELETE FROM entries WHERE id = ?")
        .bind(id.as_str())
        .execute(&mut **tx)
        .await?;
    Ok((entries.rows_affected(), chunks.rows_affected()))
}

async fn purge_rows(tx: &mut Transaction<'_, Sqlite>, cutoff: &str) -> StoreResult<(u64, u64)> {
    let chunks = sqlx::query(
        "DELETE FROM entries_data WHERE id IN (SELECT id FROM entries WHERE expiration_time < ?)",
    )
    .bind(cutoff)
    .execute(&mut **tx)
    .await?;
    let entries = sqlx::query("DELETE FROM entries WHERE expiration_time < ?")
        .bind(cutoff)
        .execute(&mut **tx)
        .await?;
    Ok((entries.rows_affected(), chunks.rows_affected()))
}

#[async_trait]
impl EntryRepo for SqliteStore {
    async fn list_entries_metadata(&self) -> StoreResult<Vec<EntryMetadata>> {
        let rows = sqlx::query_as::<_, EntryRow>(
            r#"
            SELECT
                e.id,
                e.filename,
                e.upload_time,
                e.expiration_time,
                COALESCE(
                    (SELECT SUM(LENGTH(d.chunk_bytes)) FROM entries_data d WHERE d.id = e.id),
                    0
                ) AS size_bytes
            FROM entries e
            ORDER BY e.upload_time, e.id
            "#,
        )
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(EntryRow::into_metadata).collect()
    }

    #[instrument(skip(self, id), fields(entry_id = %id))]
    async fn get_entry(&self, id: &EntryId) -> StoreResult<Entry> {
        let row = sqlx::query_as::<_, EntryRow>(
            r#"
            SELECT
                e.id,
                e.filename,
                e.upload_time,
                e.expiration_time,
                COALESCE(
                    (SELECT SUM(LENGTH(d.chunk_bytes)) FROM entries_data d WHERE d.id = e.id),
                    0
                ) AS size_bytes
            FROM entries e
            WHERE e.id = ? AND e.expiration_time >= ?
            "#,
        )
        .bind(id.as_str())
        .bind(now_timestamp()?)
        .fetch_optional(&self.pool)
        .await?;

        let Some(row) = row else {
            return Err(StoreError::EntryNotFound { id: id.clone() });
        };
        let metadata = row.into_metadata()?;
        let reader = ChunkReader::new(self.pool.clone(), id.clone());
        Ok(Entry::new(metadata, reader))
    }

    #[instrument(skip(self, reader, metadata), fields(entry_id = %metadata.id))]
    async fn insert_entry(
        &self,
        reader: &mut (dyn AsyncRead + Unpin + Send),
        metadata: &EntryMetadata,
    ) -> StoreResult<()> {
        tracing::info!(filename = %metadata.filename, "saving new entry");
        // Rejected before BEGIN: a row that cannot be parsed back would break
        // every later listing.
        let times = RowTimes::of(metadata)?;

        let mut tx = self.pool.begin().await?;
        match write_entry(&mut tx, reader, metadata, &times, self.chunk_size).await {
            Ok(stats) => {
                tx.commit().await?;
                tracing::info!(chunks = stats.chunks, bytes = stats.bytes, "entry saved");
                Ok(())
            }
            Err(e) => {
                tracing::warn!(error = %e, "entry write failed, rolling back");
                Err(abort(tx, e).await)
            }
        }
    }

    #[instrument(skip(self, id), fields(entry_id = %id))]
    async fn delete_entry(&self, id: &EntryId) -> StoreResult<()> {
        tracing::info!("deleting entry");

        let mut tx = self.pool.begin().await?;
        match delete_rows(&mut tx, id).await {
            Ok((entries, chunks)) => {
                tx.commit().await?;
                tracing::debug!(entries, chunks, "entry deleted");
                Ok(())
            }
            Err(e) => Err(abort(tx, e).await),
        }
    }

    #[instrument(skip(self))]
    async fn purge_expired(&self) -> StoreResult<u64> {
        let cutoff = now_timestamp()?;

        let mut tx = self.pool.begin().await?;
        match purge_rows(&mut tx, &cutoff).await {
            Ok((entries, chunks)) => {
                tx.commit().await?;
                tracing::info!(entries, chunks, cutoff = %cutoff, "purged expired entries");
                Ok(entries)
            }
            Err(e) => Err(abort(tx, e).await),
        }
    }
}

#[async_trait]
impl ChunkRepo for SqliteStore {
    async fn get_chunk(&self, id: &EntryId, chunk_index: u64) -> StoreResult<Option<ChunkRow>> {
        let Ok(chunk_index) = i64::try_from(chunk_index) else {
            return Ok(None);
        };
        let row = sqlx::query_as::<_, ChunkRow>(
            "SELECT id, chunk_index, chunk_bytes FROM entries_data WHERE id = ? AND chunk_index = ?",
        )
        .bind(id.as_str())
        .bind(chunk_index)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row)
    }

    async fn chunk_count(&self, id: &EntryId) -> StoreResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM entries_data WHERE id = ?")
            .bind(id.as_str())
            .fetch_one(&self.pool)
            .await?;
        Ok(count as u64)
    }

    async fn chunk_sizes(&self, id: &EntryId) -> StoreResult<Vec<u64>> {
        let sizes: Vec<i64> = sqlx::query_scalar(
            "SELECT LENGTH(chunk_bytes) FROM entries_data WHERE id = ? ORDER BY chunk_index",
        )
        .bind(id.as_str())
        .fetch_all(&self.pool)
        .await?;
        Ok(sizes.into_iter().map(|s| s as u64).collect())
    }
}

/// Schema statements, applied in order on every open.
const SCHEMA_STATEMENTS: [&str; 3] = [
    r#"
    CREATE TABLE IF NOT EXISTS entries (
        id TEXT PRIMARY KEY,
        filename TEXT NOT NULL,
        upload_time TEXT NOT NULL,
        expiration_time TEXT NOT NULL
    )
    "#,
    r#"
    CREATE TABLE IF NOT EXISTS entries_data (
        id TEXT NOT NULL,
        chunk_index INTEGER NOT NULL,
        chunk_bytes BLOB NOT NULL,
        FOREIGN KEY(id) REFERENCES entries(id)
    )
    "#,
    "CREATE UNIQUE INDEX IF NOT EXISTS idx_entries_data_chunk ON entries_data(id, chunk_index)",
];
