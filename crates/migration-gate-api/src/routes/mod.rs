// crates/migration-gate-api/src/routes/mod.rs
// ============================================================================
// Module: Routes
// Description: Route table wiring every handler to its method and path.
// ============================================================================

pub mod health;
pub mod jobs;
pub mod runs;

use axum::Router;
use axum::routing::get;
use axum::routing::post;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

/// Builds the full route table against `state`. `cors` is permissive by
/// default in development; pass a restrictive [`CorsLayer`] in production.
#[must_use]
pub fn build_router(state: AppState, cors: CorsLayer) -> Router {
    Router::new()
        .route("/health", get(health::health))
        .route("/api/jobs", post(jobs::create_job).get(jobs::list_jobs))
        .route("/api/jobs/migrate", post(jobs::migrate_jobs))
        .route(
            "/api/jobs/{id}",
            get(jobs::get_job).put(jobs::update_job).delete(jobs::delete_job),
        )
        .route("/api/jobs/{id}/run", post(jobs::run_job))
        .route("/api/runs", get(runs::list_runs))
        .route("/api/runs/{id}", get(runs::get_run))
        .route("/api/runs/{id}/artifacts", get(runs::list_run_artifacts))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
