//! Persisted timestamp format.
//!
//! Timestamps are stored as text in UTC with second precision and a `Z`
//! suffix (`2024-01-01T00:00:00Z`). The fixed width makes the textual order
//! match the chronological order, so SQL comparisons on the raw column are
//! meaningful. Sub-second precision is dropped on write.

use crate::error::{Error, Result};
use std::ops::RangeInclusive;
use time::format_description::FormatItem;
use time::format_description::well_known::Rfc3339;
use time::macros::format_description;
use time::{Duration, OffsetDateTime, UtcOffset};

const PERSISTED_FORMAT: &[FormatItem<'static>] =
    format_description!("[year]-[month]-[day]T[hour]:[minute]:[second]Z");

/// Years that fit the fixed four-digit field.
pub const SUPPORTED_YEARS: RangeInclusive<i32> = 0..=9999;

/// Render a point in time in the persisted format.
///
/// Fails with [`Error::TimestampOutOfRange`] when the UTC year falls
/// outside [`SUPPORTED_YEARS`].
pub fn format_timestamp(t: OffsetDateTime) -> Result<String> {
    let t = t.to_offset(UtcOffset::UTC);
    if !SUPPORTED_YEARS.contains(&t.year()) {
        return Err(Error::TimestampOutOfRange {
            value: t.to_string(),
        });
    }
    t.format(PERSISTED_FORMAT)
        .map_err(|e| Error::MalformedTimestamp {
            value: t.to_string(),
            reason: e.to_string(),
        })
}

/// Parse a persisted timestamp.
///
/// Any RFC 3339 string is accepted; the result is normalized to UTC.
pub fn parse_timestamp(s: &str) -> Result<OffsetDateTime> {
    OffsetDateTime::parse(s, &Rfc3339)
        .map(|t| t.to_offset(UtcOffset::UTC))
        .map_err(|e| Error::MalformedTimestamp {
            value: s.to_string(),
            reason: e.to_string(),
        })
}

/// Drop the sub-second component, matching what survives a round-trip
/// through the persisted format.
pub fn truncate_to_seconds(t: OffsetDateTime) -> OffsetDateTime {
    t - Duration::nanoseconds(i64::from(t.nanosecond()))
}
