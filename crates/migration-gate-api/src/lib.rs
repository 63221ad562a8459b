// crates/migration-gate-api/src/lib.rs
// ============================================================================
// Crate: migration-gate-api
// Description: The REST boundary over the job service and pipeline
// orchestrator.
// ============================================================================

//! The HTTP surface: job CRUD, run enqueue (non-blocking, backed by a
//! spawned orchestrator task), run and artifact listing, and a liveness
//! probe. Route handlers are thin; all domain logic lives in
//! `migration-gate-pipeline`.

pub mod error;
pub mod routes;
pub mod state;

pub use error::ApiError;
pub use routes::build_router;
pub use state::AppState;
