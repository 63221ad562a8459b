// crates/migration-gate-core/src/core/identifiers.rs
// ============================================================================
// Module: Migration Gate Identifiers
// Description: Canonical opaque identifiers for jobs, runs, and artifacts.
// Purpose: Provide strongly typed, serializable identifiers with stable wire forms.
// Dependencies: serde, uuid
// ============================================================================

//! ## Overview
//! Identifiers are opaque UUIDs that serialize as strings on the wire. They
//! are never constructed from untrusted raw strings without validation.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

// ============================================================================
// SECTION: Macro: opaque UUID identifier
// ============================================================================

macro_rules! uuid_identifier {
    ($name:ident, $doc:literal) => {
        #[doc = $doc]
        ///
        /// # Invariants
        /// - Wraps a v4 UUID; stable for equality, hashing, and serialization.
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            /// Generates a new random identifier.
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            /// Wraps an existing UUID value.
            #[must_use]
            pub const fn from_uuid(id: Uuid) -> Self {
                Self(id)
            }

            /// Returns the underlying UUID value.
            #[must_use]
            pub const fn as_uuid(&self) -> Uuid {
                self.0
            }

            /// Parses an identifier from its canonical string form.
            ///
            /// # Errors
            ///
            /// Returns [`uuid::Error`] when `raw` is not a valid UUID.
            pub fn parse(raw: &str) -> Result<Self, uuid::Error> {
                Uuid::parse_str(raw).map(Self)
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }
    };
}

uuid_identifier!(JobId, "Identifier for a `ComparisonJob`.");
uuid_identifier!(RunId, "Identifier for a `Run`.");
uuid_identifier!(ArtifactId, "Identifier for a `RunArtifact`.");

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, reason = "test-only assertions")]
mod tests {
    use proptest::prelude::*;

    use super::*;

    #[test]
    fn round_trips_through_display_and_parse() {
        let id = JobId::new();
        let parsed = JobId::parse(&id.to_string()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn serializes_as_a_plain_string() {
        let id = RunId::new();
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, format!("\"{id}\""));
    }

    #[test]
    fn distinct_ids_are_not_equal() {
        assert_ne!(ArtifactId::new(), ArtifactId::new());
    }

    proptest! {
        #[test]
        fn parse_round_trips_for_any_uuid_bytes(bytes: [u8; 16]) {
            let id = RunId::from_uuid(Uuid::from_bytes(bytes));
            let parsed = RunId::parse(&id.to_string()).unwrap();
            prop_assert_eq!(id, parsed);
        }

        #[test]
        fn parse_rejects_non_uuid_strings(raw in "[^-0-9a-fA-F]{1,32}") {
            prop_assert!(RunId::parse(&raw).is_err());
        }
    }
}
