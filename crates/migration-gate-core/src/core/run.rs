// crates/migration-gate-core/src/core/run.rs
// ============================================================================
// Module: Run & Artifact
// Description: One execution of a job, and the artifacts it commits.
// Purpose: Model run lifecycle and the artifact registry's row shape.
// Dependencies: crate::core::{identifiers, time}, serde
// ============================================================================

//! ## Overview
//! A `Run` is one execution of a `ComparisonJob`; it advances at most once
//! through its lifecycle and is never re-executed. A `RunArtifact` is an
//! append-only, typed reference to a file the run produced.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

use crate::core::identifiers::ArtifactId;
use crate::core::identifiers::JobId;
use crate::core::identifiers::RunId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Run Status
// ============================================================================

/// Run lifecycle status.
///
/// # Invariants
/// - Advances at most once: `queued -> running -> {completed, failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    /// Enqueued, not yet picked up by the orchestrator.
    Queued,
    /// Stages are executing.
    Running,
    /// All required stages completed without a fatal error.
    Completed,
    /// A fatal stage error, cancellation, or timeout ended the run.
    Failed,
}

impl RunStatus {
    /// Returns whether this status is one of the two terminal states.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

// ============================================================================
// SECTION: Run
// ============================================================================

/// One execution of a `ComparisonJob`.
///
/// # Invariants
/// - `completed_at` is present if and only if `status` is terminal, and when
///   present is at or after `triggered_at`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Run {
    /// Stable identifier.
    pub id: RunId,
    /// Job this run executes.
    pub job_id: JobId,
    /// Lifecycle status.
    pub status: RunStatus,
    /// Free-form description of what triggered the run (e.g. `"api"`).
    pub triggered_by: String,
    /// Enqueue timestamp.
    pub triggered_at: Timestamp,
    /// Terminal timestamp, set once the run leaves `running`.
    #[serde(default)]
    pub completed_at: Option<Timestamp>,
}

impl Run {
    /// Creates a new run in the `queued` state.
    #[must_use]
    pub fn new_queued(job_id: JobId, triggered_by: impl Into<String>, now: Timestamp) -> Self {
        Self {
            id: RunId::new(),
            job_id,
            status: RunStatus::Queued,
            triggered_by: triggered_by.into(),
            triggered_at: now,
            completed_at: None,
        }
    }

    /// Returns whether the run's terminal-timestamp invariant currently
    /// holds for its own fields.
    #[must_use]
    pub fn satisfies_terminal_invariant(&self) -> bool {
        match (self.status.is_terminal(), self.completed_at) {
            (false, None) => true,
            (true, Some(completed_at)) => completed_at.is_at_or_after(&self.triggered_at),
            _ => false,
        }
    }
}

// ============================================================================
// SECTION: Artifact Kind
// ============================================================================

/// Classification of a `RunArtifact`'s content.
///
/// # Invariants
/// - Variants are stable for serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtifactKind {
    /// A stage error or informational log entry.
    Log,
    /// A captured or derived image (screenshot, diff, heatmap).
    Screenshot,
    /// A synthesized report document.
    Report,
    /// Anything not covered by the other kinds (HAR, raw snapshots, …).
    Other,
}

// ============================================================================
// SECTION: Run Artifact
// ============================================================================

/// A typed, labeled reference to a file produced during a run.
///
/// # Invariants
/// - `path` lies under `data/artifacts/{run_id}/…`.
/// - A backing file exists at the time the artifact is registered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunArtifact {
    /// Stable identifier.
    pub id: ArtifactId,
    /// Owning run.
    pub run_id: RunId,
    /// Content classification.
    #[serde(rename = "type")]
    pub kind: ArtifactKind,
    /// Human-readable label, e.g. `"Capture Error"`.
    pub label: String,
    /// Path relative to the artifact root.
    pub path: String,
    /// Registration timestamp.
    pub created_at: Timestamp,
}

impl RunArtifact {
    /// Returns whether `path` is rooted under the run's own artifact subtree.
    #[must_use]
    pub fn path_is_scoped_to_run(&self) -> bool {
        self.path
            .starts_with(&format!("data/artifacts/{}/", self.run_id))
    }
}
