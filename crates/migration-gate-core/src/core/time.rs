// crates/migration-gate-core/src/core/time.rs
// ============================================================================
// Module: Migration Gate Timestamps
// Description: ISO-8601 timestamp newtype shared by every persisted entity.
// Purpose: Keep wire and on-disk timestamps in one canonical textual form.
// Dependencies: serde, time
// ============================================================================

//! ## Overview
//! All timestamps on the wire and on disk are ISO-8601 strings. This module
//! wraps `time::OffsetDateTime` so comparisons, arithmetic, and serialization
//! stay in one place instead of being re-derived at every call site.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

// ============================================================================
// SECTION: Timestamp
// ============================================================================

/// A UTC instant serialized as an ISO-8601 / RFC 3339 string.
///
/// # Invariants
/// - Always round-trips through its `Display`/`parse` form without loss of
///   precision relevant to ordering.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct Timestamp(OffsetDateTime);

impl Timestamp {
    /// Wraps an existing offset date-time, normalized to UTC.
    #[must_use]
    pub fn from_offset(dt: OffsetDateTime) -> Self {
        Self(dt.to_offset(time::UtcOffset::UTC))
    }

    /// Returns the underlying offset date-time.
    #[must_use]
    pub const fn as_offset(&self) -> OffsetDateTime {
        self.0
    }

    /// Parses a timestamp from its RFC 3339 string form.
    ///
    /// # Errors
    ///
    /// Returns [`time::error::Parse`] when `raw` is not valid RFC 3339.
    pub fn parse(raw: &str) -> Result<Self, time::error::Parse> {
        OffsetDateTime::parse(raw, &Rfc3339).map(Self::from_offset)
    }

    /// Returns whether `self` is at or after `other`.
    #[must_use]
    pub fn is_at_or_after(&self, other: &Self) -> bool {
        self.0 >= other.0
    }
}

impl fmt::Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let formatted = self.0.format(&Rfc3339).map_err(|_| fmt::Error)?;
        f.write_str(&formatted)
    }
}

impl Serialize for Timestamp {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Timestamp {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Self::parse(&raw).map_err(serde::de::Error::custom)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, reason = "test-only assertions")]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_display_and_parse() {
        let now = Timestamp::from_offset(OffsetDateTime::UNIX_EPOCH);
        let parsed = Timestamp::parse(&now.to_string()).unwrap();
        assert_eq!(now, parsed);
    }

    #[test]
    fn orders_by_instant() {
        let earlier = Timestamp::from_offset(OffsetDateTime::UNIX_EPOCH);
        let later =
            Timestamp::from_offset(OffsetDateTime::UNIX_EPOCH + time::Duration::seconds(1));
        assert!(later.is_at_or_after(&earlier));
        assert!(!earlier.is_at_or_after(&later));
    }

    #[test]
    fn serializes_as_a_plain_rfc3339_string() {
        let ts = Timestamp::from_offset(OffsetDateTime::UNIX_EPOCH);
        let json = serde_json::to_string(&ts).unwrap();
        assert_eq!(json, format!("\"{ts}\""));
    }
}
