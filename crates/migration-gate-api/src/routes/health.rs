// crates/migration-gate-api/src/routes/health.rs
// ============================================================================
// Module: Health Route
// Description: Liveness probe, with store readiness folded into the status
// field rather than a distinct endpoint.
// ============================================================================

use axum::Json;
use axum::extract::State;
use serde::Serialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::state::AppState;

#[derive(Debug, Serialize)]
pub struct HealthBody {
    status: &'static str,
    timestamp: String,
}

pub async fn health(State(state): State<AppState>) -> Json<HealthBody> {
    let status = if state.store.readiness().is_ok() { "ok" } else { "degraded" };
    let timestamp = OffsetDateTime::now_utc().format(&Rfc3339).unwrap_or_default();
    Json(HealthBody { status, timestamp })
}
