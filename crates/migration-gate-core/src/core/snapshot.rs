// crates/migration-gate-core/src/core/snapshot.rs
// ============================================================================
// Module: Storage Snapshot
// Description: The durable top-level aggregate owning every persisted entity.
// Purpose: Give the storage layer one serializable unit with clear ownership.
// Dependencies: crate::core::{job, run, time}, serde
// ============================================================================

//! ## Overview
//! `StorageSnapshot` exclusively owns every `ComparisonJob`, `Run`, and
//! `RunArtifact` in the system. Stages and services only ever hold
//! short-lived borrowed views derived from a loaded snapshot.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::job::ComparisonJob;
use crate::core::run::Run;
use crate::core::run::RunArtifact;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Current on-disk snapshot format version. Bump and add a migration rule
/// whenever a breaking shape change is introduced.
pub const CURRENT_SNAPSHOT_VERSION: u32 = 1;

// ============================================================================
// SECTION: Metadata
// ============================================================================

/// Free-form bookkeeping carried alongside the snapshot's entities.
///
/// # Invariants
/// - `legacy_shape_summary` is populated only when a migration ran.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SnapshotMetadata {
    /// Timestamp of the most recent migration, if any has ever run.
    #[serde(default)]
    pub last_migration: Option<Timestamp>,
    /// Human-readable summary of the legacy shape the last migration
    /// consumed, kept so the old shape is never silently discarded.
    #[serde(default)]
    pub notes: Vec<String>,
}

// ============================================================================
// SECTION: Storage Snapshot
// ============================================================================

/// The durable top-level aggregate.
///
/// # Invariants
/// - `comparison_jobs` keys are unique on id, in insertion order.
/// - Every `runs[i].job_id` refers to an entry in `comparison_jobs`, except
///   transiently while a migration is converting legacy shapes in-place.
/// - Every `artifacts[i].run_id` refers to an entry in `runs`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageSnapshot {
    /// Snapshot format version this value was produced at.
    pub version: u32,
    /// Jobs, insertion order preserved.
    #[serde(default)]
    pub comparison_jobs: Vec<ComparisonJob>,
    /// Runs across all jobs.
    #[serde(default)]
    pub runs: Vec<Run>,
    /// Artifacts across all runs.
    #[serde(default)]
    pub artifacts: Vec<RunArtifact>,
    /// Migration and diagnostic metadata.
    #[serde(default)]
    pub metadata: SnapshotMetadata,
}

impl StorageSnapshot {
    /// Builds an empty snapshot at the current version.
    #[must_use]
    pub fn empty() -> Self {
        Self {
            version: CURRENT_SNAPSHOT_VERSION,
            comparison_jobs: Vec::new(),
            runs: Vec::new(),
            artifacts: Vec::new(),
            metadata: SnapshotMetadata::default(),
        }
    }

    /// Returns whether every `Run` refers to a known job and every
    /// `RunArtifact` refers to a known run. Used by tests and by the storage
    /// layer's post-migration consistency check.
    #[must_use]
    pub fn referential_integrity_holds(&self) -> bool {
        let job_ids: std::collections::HashSet<_> =
            self.comparison_jobs.iter().map(|job| job.id).collect();
        let run_ids: std::collections::HashSet<_> = self.runs.iter().map(|run| run.id).collect();
        self.runs.iter().all(|run| job_ids.contains(&run.job_id))
            && self
                .artifacts
                .iter()
                .all(|artifact| run_ids.contains(&artifact.run_id))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, reason = "test-only assertions")]
mod tests {
    use super::*;
    use crate::core::identifiers::JobId;

    #[test]
    fn empty_snapshot_is_at_current_version_and_consistent() {
        let snapshot = StorageSnapshot::empty();
        assert_eq!(snapshot.version, CURRENT_SNAPSHOT_VERSION);
        assert!(snapshot.referential_integrity_holds());
    }

    #[test]
    fn referential_integrity_detects_dangling_run() {
        let mut snapshot = StorageSnapshot::empty();
        snapshot.runs.push(Run::new_queued(
            JobId::new(),
            "api",
            Timestamp::parse("1970-01-01T00:00:00Z").unwrap(),
        ));
        assert!(!snapshot.referential_integrity_holds());
    }
}
