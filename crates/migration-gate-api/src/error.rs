// crates/migration-gate-api/src/error.rs
// ============================================================================
// Module: API Error Mapping
// Description: Maps core/orchestrator/storage errors to HTTP responses.
// Purpose: One place that turns the error taxonomy into status codes and a
// short JSON `message` body, per the documented boundary contract.
// Dependencies: axum, migration-gate-core, migration-gate-pipeline, migration-gate-storage
// ============================================================================

//! ## Overview
//! `InvalidInput` is never an incident and always 400; `NotFound` is always
//! 404; everything else (storage corruption, a stage having gone fatal or
//! cancelled in a path that somehow surfaces here, a closed concurrency
//! limiter) is a 500 or 503, since none of those should ordinarily reach a
//! request handler — `StageTransient`/`StageFatal`/`Cancelled` are stage-
//! internal and are absorbed by the orchestrator before a `Run`'s terminal
//! status is ever read back through this boundary.

// ============================================================================
// SECTION: Imports
// ============================================================================

use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::response::Response;
use migration_gate_core::CoreError;
use migration_gate_pipeline::OrchestratorError;
use migration_gate_storage::FileStoreError;
use serde::Serialize;

// ============================================================================
// SECTION: Error Body
// ============================================================================

#[derive(Debug, Serialize)]
struct ErrorBody {
    message: String,
}

// ============================================================================
// SECTION: API Error
// ============================================================================

/// The error type every route handler returns on its `Err` path.
#[derive(Debug)]
pub enum ApiError {
    /// A core data-model or service error.
    Core(CoreError),
    /// An orchestrator bookkeeping error.
    Orchestrator(OrchestratorError),
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        Self::Core(err)
    }
}

impl From<OrchestratorError> for ApiError {
    fn from(err: OrchestratorError) -> Self {
        Self::Orchestrator(err)
    }
}

impl From<FileStoreError> for ApiError {
    fn from(err: FileStoreError) -> Self {
        Self::Core(err.into())
    }
}

fn status_and_message(err: &CoreError) -> (StatusCode, String) {
    match err {
        CoreError::InvalidInput(message) => (StatusCode::BAD_REQUEST, message.clone()),
        CoreError::NotFound(message) => (StatusCode::NOT_FOUND, message.clone()),
        CoreError::StorageCorruption(message) => (StatusCode::INTERNAL_SERVER_ERROR, message.clone()),
        CoreError::StageTransient { .. } | CoreError::StageFatal { .. } | CoreError::Cancelled(_) => {
            (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Core(err) => status_and_message(&err),
            Self::Orchestrator(OrchestratorError::Core(err)) => status_and_message(&err),
            Self::Orchestrator(OrchestratorError::Store(err)) => {
                (StatusCode::INTERNAL_SERVER_ERROR, err.to_string())
            }
            Self::Orchestrator(OrchestratorError::SemaphoreClosed) => {
                (StatusCode::SERVICE_UNAVAILABLE, "the run concurrency limiter is shutting down".to_string())
            }
        };
        (status, Json(ErrorBody { message })).into_response()
    }
}
