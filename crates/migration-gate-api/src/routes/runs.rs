// crates/migration-gate-api/src/routes/runs.rs
// ============================================================================
// Module: Run Routes
// Description: Read-only handlers over Run and RunArtifact.
// Purpose: Expose run listing, a single run, and its artifacts.
// Dependencies: axum, migration-gate-core
// ============================================================================

use axum::Json;
use axum::extract::Path;
use axum::extract::State;
use migration_gate_core::CoreError;
use migration_gate_core::Run;
use migration_gate_core::RunArtifact;
use migration_gate_core::RunId;

use crate::error::ApiError;
use crate::state::AppState;

fn parse_run_id(raw: &str) -> Result<RunId, ApiError> {
    RunId::parse(raw).map_err(|_| ApiError::Core(CoreError::NotFound(format!("run {raw}"))))
}

/// `GET /api/runs`.
///
/// # Errors
///
/// Returns [`ApiError`] on a storage read failure.
pub async fn list_runs(State(state): State<AppState>) -> Result<Json<Vec<Run>>, ApiError> {
    Ok(Json(state.store.load()?.runs))
}

/// `GET /api/runs/:id`.
///
/// # Errors
///
/// Returns [`ApiError`] wrapping [`CoreError::NotFound`] when `id` does not
/// resolve.
pub async fn get_run(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<Run>, ApiError> {
    let run_id = parse_run_id(&id)?;
    let snapshot = state.store.load()?;
    snapshot
        .runs
        .into_iter()
        .find(|run| run.id == run_id)
        .map(Json)
        .ok_or_else(|| ApiError::Core(CoreError::NotFound(format!("run {run_id}"))))
}

/// `GET /api/runs/:id/artifacts`. Returns an empty list, rather than a 404,
/// for a run id that does not resolve — the artifact registry has nothing
/// to say about a run it never saw, which is what an empty list already
/// means.
///
/// # Errors
///
/// Returns [`ApiError`] on a storage read failure.
pub async fn list_run_artifacts(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Vec<RunArtifact>>, ApiError> {
    let Ok(run_id) = RunId::parse(&id) else {
        return Ok(Json(Vec::new()));
    };
    let snapshot = state.store.load()?;
    Ok(Json(snapshot.artifacts.into_iter().filter(|artifact| artifact.run_id == run_id).collect()))
}
