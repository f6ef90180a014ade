//! Entry identifiers and metadata.

use serde::{Deserialize, Serialize};
use std::fmt;
use time::OffsetDateTime;

/// Opaque identifier of an uploaded entry.
#[derive(Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntryId(String);

impl EntryId {
    /// Create from a string. The identifier must be non-empty.
    pub fn new(id: impl Into<String>) -> crate::Result<Self> {
        let id = id.into();
        if id.is_empty() {
            return Err(crate::Error::InvalidEntryId(
                "entry id must not be empty".to_string(),
            ));
        }
        Ok(Self(id))
    }

    /// Get the identifier string.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for EntryId {
    type Error = crate::Error;

    fn try_from(value: String) -> crate::Result<Self> {
        Self::new(value)
    }
}

impl From<EntryId> for String {
    fn from(id: EntryId) -> Self {
        id.0
    }
}

impl fmt::Debug for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "EntryId({})", self.0)
    }
}

impl fmt::Display for EntryId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Display name of an uploaded file.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Filename(String);

impl Filename {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Filename {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Filename({:?})", self.0)
    }
}

impl fmt::Display for Filename {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Metadata describing an uploaded entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryMetadata {
    /// Unique entry identifier.
    pub id: EntryId,
    /// Display name of the upload.
    pub filename: Filename,
    /// When the entry was uploaded.
    #[serde(with = "time::serde::rfc3339")]
    pub uploaded: OffsetDateTime,
    /// When the entry stops being served.
    #[serde(with = "time::serde::rfc3339")]
    pub expires: OffsetDateTime,
    /// Total content length in bytes.
    ///
    /// Not persisted with the metadata row. `None` on caller-built metadata;
    /// the store fills it from the chunk rows when metadata is read back.
    pub size: Option<u64>,
}

impl EntryMetadata {
    /// Create metadata for a new upload with an unknown size.
    pub fn new(
        id: EntryId,
        filename: Filename,
        uploaded: OffsetDateTime,
        expires: OffsetDateTime,
    ) -> Self {
        Self {
            id,
            filename,
            uploaded,
            expires,
            size: None,
        }
    }

    /// Check whether the entry is expired at the given time.
    ///
    /// An entry expiring exactly at `now` is still live.
    pub fn is_expired_at(&self, now: OffsetDateTime) -> bool {
        self.expires < now
    }
}
