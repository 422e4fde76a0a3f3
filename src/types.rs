//! Core type definitions: entity ids and timestamps.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Generates a collision-resistant, unique entity id.
///
/// Ids are UUID v7 (time-ordered) rendered as their canonical hyphenated
/// hex string, so two ids generated moments apart also sort lexicographically
/// in roughly creation order — convenient for collections whose on-disk
/// mapping keys are entity ids.
///
/// # Example
/// ```
/// use proseql::generate_id;
///
/// let id = generate_id();
/// assert_eq!(id.len(), 36);
/// ```
#[inline]
pub fn generate_id() -> String {
    Uuid::now_v7().to_string()
}

/// A point in time, serialized as RFC 3339 text.
///
/// Collections that declare `createdAt`/`updatedAt` fields store them as
/// `Timestamp` so a saved file stays human-readable (`"2026-07-26T12:00:00Z"`)
/// rather than an opaque integer.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Timestamp(DateTime<Utc>);

impl Timestamp {
    /// Creates a timestamp for the current moment.
    #[inline]
    pub fn now() -> Self {
        Self(Utc::now())
    }

    /// Parses an RFC 3339 string into a timestamp.
    pub fn parse(s: &str) -> Option<Self> {
        DateTime::parse_from_rfc3339(s)
            .ok()
            .map(|dt| Self(dt.with_timezone(&Utc)))
    }

    /// Renders the timestamp as RFC 3339 text.
    pub fn to_rfc3339(&self) -> String {
        self.0.to_rfc3339()
    }

    /// Returns the underlying `chrono` value.
    pub fn as_datetime(&self) -> DateTime<Utc> {
        self.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_rfc3339())
    }
}
