// crates/migration-gate-api/src/state.rs
// ============================================================================
// Module: API State
// Description: Shared handles every route handler needs.
// Purpose: One `Arc`-cloneable bundle threaded through axum's `State` extractor.
// Dependencies: migration-gate-storage, migration-gate-pipeline
// ============================================================================

use std::sync::Arc;

use migration_gate_pipeline::Orchestrator;
use migration_gate_storage::FileSnapshotStore;

/// Shared application state, cheaply cloned into every request.
#[derive(Clone)]
pub struct AppState {
    /// The durable snapshot store, shared with the orchestrator.
    pub store: Arc<FileSnapshotStore>,
    /// Drives enqueued runs to completion.
    pub orchestrator: Arc<Orchestrator>,
}

impl AppState {
    /// Builds state from an already-constructed store and orchestrator.
    #[must_use]
    pub fn new(store: Arc<FileSnapshotStore>, orchestrator: Arc<Orchestrator>) -> Self {
        Self { store, orchestrator }
    }
}
