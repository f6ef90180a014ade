//! Store configuration.

use crate::{DEFAULT_CHUNK_SIZE, MAX_CHUNK_SIZE, MIN_CHUNK_SIZE};
use figment::Figment;
use figment::providers::{Env, Format, Serialized, Toml};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Environment variable prefix for configuration overrides.
pub const ENV_PREFIX: &str = "BLOBSHELF_";

/// SQLite path that selects an in-memory database.
pub const IN_MEMORY_PATH: &str = ":memory:";

/// Chunked blob store configuration.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct StoreConfig {
    /// Database file path (`:memory:` for a throwaway in-memory database).
    #[serde(default = "default_path")]
    pub path: PathBuf,
    /// Maximum bytes per chunk row.
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u64,
    /// Maximum pooled connections. In-memory databases always use one,
    /// since every SQLite connection to `:memory:` opens a separate database.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    /// How long a connection waits on a locked database before failing.
    #[serde(default = "default_busy_timeout_secs")]
    pub busy_timeout_secs: u64,
}

fn default_path() -> PathBuf {
    PathBuf::from("./data/blobshelf.db")
}

fn default_chunk_size() -> u64 {
    DEFAULT_CHUNK_SIZE
}

fn default_max_connections() -> u32 {
    4
}

fn default_busy_timeout_secs() -> u64 {
    5
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: default_path(),
            chunk_size: default_chunk_size(),
            max_connections: default_max_connections(),
            busy_timeout_secs: default_busy_timeout_secs(),
        }
    }
}

impl StoreConfig {
    /// Configuration for a database file at `path` with default settings.
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }

    /// Configuration for a private in-memory database.
    ///
    /// The store holds a single connection for this database, so every
    /// operation is serialized. An upload whose source is a reader from the
    /// same in-memory store waits on that connection until the pool acquire
    /// timeout and fails; copy the bytes out first or use a file-backed
    /// database.
    pub fn in_memory() -> Self {
        Self::at(IN_MEMORY_PATH)
    }

    /// Override the chunk size.
    pub fn with_chunk_size(mut self, chunk_size: u64) -> Self {
        self.chunk_size = chunk_size;
        self
    }

    /// Load configuration from defaults, an optional TOML file and
    /// `BLOBSHELF_`-prefixed environment variables, in increasing priority.
    pub fn load(file: Option<&Path>) -> crate::Result<Self> {
        let mut figment = Figment::from(Serialized::defaults(Self::default()));
        if let Some(file) = file {
            figment = figment.merge(Toml::file(file));
        }
        let config: Self = figment
            .merge(Env::prefixed(ENV_PREFIX))
            .extract()
            .map_err(|e| crate::Error::Config(e.to_string()))?;
        config.check()?;
        Ok(config)
    }

    /// Validate configuration invariants.
    pub fn validate(&self) -> Result<(), String> {
        if !(MIN_CHUNK_SIZE..=MAX_CHUNK_SIZE).contains(&self.chunk_size) {
            return Err(format!(
                "chunk_size {} must be between {} and {}",
                self.chunk_size, MIN_CHUNK_SIZE, MAX_CHUNK_SIZE
            ));
        }
        if self.max_connections == 0 {
            return Err("max_connections cannot be 0".to_string());
        }
        if self.path.as_os_str().is_empty() {
            return Err("path cannot be empty".to_string());
        }
        Ok(())
    }

    /// Like [`validate`](Self::validate), with a typed error.
    pub fn check(&self) -> crate::Result<()> {
        if !(MIN_CHUNK_SIZE..=MAX_CHUNK_SIZE).contains(&self.chunk_size) {
            return Err(crate::Error::InvalidChunkSize {
                size: self.chunk_size,
                min: MIN_CHUNK_SIZE,
                max: MAX_CHUNK_SIZE,
            });
        }
        self.validate().map_err(crate::Error::Config)
    }

    /// Whether the path selects an in-memory database.
    pub fn is_in_memory(&self) -> bool {
        self.path.as_os_str() == IN_MEMORY_PATH
    }

    /// Chunk size as a buffer length.
    pub fn chunk_len(&self) -> usize {
        usize::try_from(self.chunk_size).unwrap_or(usize::MAX)
    }

    /// Busy timeout as a Duration.
    pub fn busy_timeout(&self) -> Duration {
        Duration::from_secs(self.busy_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StoreConfig::default();
        assert_eq!(config.chunk_size, 32 * 1024 * 1024);
        assert_eq!(config.max_connections, 4);
        assert!(!config.is_in_memory());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_deserialize_partial_uses_defaults() {
        let config: StoreConfig = serde_json::from_str(r#"{"path": "/tmp/x.db"}"#).unwrap();
        assert_eq!(config.path, PathBuf::from("/tmp/x.db"));
        assert_eq!(config.chunk_size, DEFAULT_CHUNK_SIZE);
        assert_eq!(config.busy_timeout(), Duration::from_secs(5));
    }

    #[test]
    fn test_chunk_size_bounds() {
        let zero = StoreConfig::in_memory().with_chunk_size(0);
        assert!(zero.validate().is_err());
        assert!(matches!(
            zero.check(),
            Err(crate::Error::InvalidChunkSize { size: 0, .. })
        ));

        let huge = StoreConfig::in_memory().with_chunk_size(MAX_CHUNK_SIZE + 1);
        assert!(huge.check().is_err());

        let tiny = StoreConfig::in_memory().with_chunk_size(1);
        assert!(tiny.check().is_ok());
        assert!(tiny.is_in_memory());
    }

    #[test]
    fn test_zero_connections_rejected() {
        let mut config = StoreConfig::in_memory();
        config.max_connections = 0;
        assert!(matches!(config.check(), Err(crate::Error::Config(_))));
    }

    #[test]
    fn test_load_layers_file_and_env() {
        figment::Jail::expect_with(|jail| {
            jail.create_file(
                "blobshelf.toml",
                r#"
                path = "/var/lib/blobshelf/store.db"
                chunk_size = 1048576
                "#,
            )?;
            jail.set_env("BLOBSHELF_MAX_CONNECTIONS", "2");

            let config = StoreConfig::load(Some(Path::new("blobshelf.toml")))
                .map_err(|e| e.to_string())?;
            assert_eq!(config.path, PathBuf::from("/var/lib/blobshelf/store.db"));
            assert_eq!(config.chunk_size, 1024 * 1024);
            assert_eq!(config.max_connections, 2);
            assert_eq!(config.busy_timeout_secs, 5);
            Ok(())
        });
    }

    #[test]
    fn test_load_rejects_invalid_chunk_size() {
        figment::Jail::expect_with(|jail| {
            jail.set_env("BLOBSHELF_CHUNK_SIZE", "0");
            assert!(matches!(
                StoreConfig::load(None),
                Err(crate::Error::InvalidChunkSize { .. })
            ));
            Ok(())
        });
    }
}
