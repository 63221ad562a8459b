// crates/migration-gate-core/src/errors.rs
// ============================================================================
// Module: Core Error Taxonomy
// Description: The kinds shared across storage, pipeline, and API crates.
// Purpose: Give every crate one small, composable error vocabulary instead of
// a new ad-hoc enum per boundary.
// Dependencies: thiserror
// ============================================================================

//! ## Overview
//! `CoreError` names kinds, not implementations: each downstream crate wraps
//! its own leaf errors in `thiserror` enums and converts into this one at its
//! public boundary, the way `SqliteStoreError` converts into `StoreError` in
//! the store this crate split off from.

// ============================================================================
// SECTION: Imports
// ============================================================================

use thiserror::Error;

// ============================================================================
// SECTION: Core Error
// ============================================================================

/// The error kinds recognized across the job service, storage layer, and
/// pipeline orchestrator.
///
/// # Invariants
/// - `InvalidInput` is never recorded as an incident; it is a client mistake.
/// - `StorageCorruption` must stop process startup; it is never recovered
///   from automatically.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A request failed a data-model invariant.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// An identifier did not resolve to an existing entity.
    #[error("not found: {0}")]
    NotFound(String),
    /// A stage's I/O failed in a way the run can continue past.
    #[error("stage transient failure in {stage}: {message}")]
    StageTransient {
        /// Name of the stage that failed.
        stage: String,
        /// Failure description.
        message: String,
    },
    /// Crawl, Capture, or Report failed hard; the run ends `failed`.
    #[error("stage fatal failure in {stage}: {message}")]
    StageFatal {
        /// Name of the stage that failed.
        stage: String,
        /// Failure description.
        message: String,
    },
    /// The snapshot could not be parsed or migrated; refuse to start.
    #[error("storage corruption: {0}")]
    StorageCorruption(String),
    /// Explicit cancellation or a timeout ended the run.
    #[error("cancelled: {0}")]
    Cancelled(String),
}

impl CoreError {
    /// Returns whether this error should ever be recorded as an operational
    /// incident. `InvalidInput` is a client mistake, not an incident.
    #[must_use]
    pub const fn is_incident(&self) -> bool {
        !matches!(self, Self::InvalidInput(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invalid_input_is_never_an_incident() {
        let err = CoreError::InvalidInput("baselineUrl missing".into());
        assert!(!err.is_incident());
    }

    #[test]
    fn storage_corruption_is_an_incident() {
        let err = CoreError::StorageCorruption("unreadable snapshot.json".into());
        assert!(err.is_incident());
    }
}
