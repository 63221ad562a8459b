// crates/migration-gate-api/src/routes/jobs.rs
// ============================================================================
// Module: Job Routes
// Description: CRUD, run enqueue, and legacy-migrate handlers for
// ComparisonJob.
// Purpose: Translate HTTP requests into `JobService`/`Orchestrator` calls and
// back into the documented response shapes.
// Dependencies: axum, migration-gate-core, migration-gate-pipeline
// ============================================================================

// ============================================================================
// SECTION: Imports
// ============================================================================

use axum::Json;
use axum::extract::Path;
use axum::extract::State;
use axum::http::StatusCode;
use migration_gate_core::ComparisonJob;
use migration_gate_core::CoreError;
use migration_gate_core::CrawlConfig;
use migration_gate_core::JobId;
use migration_gate_core::JobStatus;
use migration_gate_core::PageMap;
use migration_gate_core::Run;
use migration_gate_core::TestMatrix;
use migration_gate_core::Timestamp;
use migration_gate_pipeline::CreateJobRequest;
use migration_gate_pipeline::JobService;
use migration_gate_pipeline::UpdateJobRequest;
use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;
use url::Url;

use crate::error::ApiError;
use crate::state::AppState;

fn now() -> Timestamp {
    Timestamp::from_offset(OffsetDateTime::now_utc())
}

fn parse_job_id(raw: &str) -> Result<JobId, ApiError> {
    JobId::parse(raw).map_err(|_| ApiError::Core(CoreError::NotFound(format!("job {raw}"))))
}

fn parse_url(raw: &str, field: &str) -> Result<Url, ApiError> {
    Url::parse(raw).map_err(|_| ApiError::Core(CoreError::InvalidInput(format!("{field} is not an absolute URI"))))
}

// ============================================================================
// SECTION: Request Bodies
// ============================================================================

/// `POST /api/jobs` request body.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateJobBody {
    name: String,
    #[serde(default)]
    description: Option<String>,
    baseline_url: String,
    candidate_url: String,
    #[serde(default)]
    crawl_config: Option<CrawlConfig>,
    #[serde(default)]
    page_map: Option<PageMap>,
    #[serde(default)]
    test_matrix: Option<TestMatrix>,
}

/// `PUT /api/jobs/:id` request body. Present fields replace; absent fields
/// are left untouched. Clearing `description`/`pageMap` to null is not
/// exposed through this boundary — delete and recreate the job instead.
#[derive(Debug, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct UpdateJobBody {
    #[serde(default)]
    name: Option<String>,
    #[serde(default)]
    description: Option<String>,
    #[serde(default)]
    baseline_url: Option<String>,
    #[serde(default)]
    candidate_url: Option<String>,
    #[serde(default)]
    crawl_config: Option<CrawlConfig>,
    #[serde(default)]
    page_map: Option<PageMap>,
    #[serde(default)]
    test_matrix: Option<TestMatrix>,
    #[serde(default)]
    status: Option<JobStatus>,
}

#[derive(Debug, Serialize)]
pub struct MigrateBody {
    count: usize,
}

// ============================================================================
// SECTION: Handlers
// ============================================================================

/// `POST /api/jobs`.
///
/// # Errors
///
/// Returns [`ApiError`] wrapping [`CoreError::InvalidInput`] on a malformed
/// URL pair or any other §3 invariant breach.
pub async fn create_job(
    State(state): State<AppState>,
    Json(body): Json<CreateJobBody>,
) -> Result<(StatusCode, Json<ComparisonJob>), ApiError> {
    let request = CreateJobRequest {
        name: body.name,
        description: body.description,
        baseline_url: parse_url(&body.baseline_url, "baselineUrl")?,
        candidate_url: parse_url(&body.candidate_url, "candidateUrl")?,
        crawl_config: body.crawl_config,
        page_map: body.page_map,
        test_matrix: body.test_matrix,
    };
    let service = JobService::new(&state.store);
    let job = service.create(request, now())?;
    Ok((StatusCode::CREATED, Json(job)))
}

/// `GET /api/jobs`.
///
/// # Errors
///
/// Returns [`ApiError`] on a storage read failure.
pub async fn list_jobs(State(state): State<AppState>) -> Result<Json<Vec<ComparisonJob>>, ApiError> {
    let service = JobService::new(&state.store);
    Ok(Json(service.list()?))
}

/// `GET /api/jobs/:id`.
///
/// # Errors
///
/// Returns [`ApiError`] wrapping [`CoreError::NotFound`] when `id` does not
/// resolve.
pub async fn get_job(State(state): State<AppState>, Path(id): Path<String>) -> Result<Json<ComparisonJob>, ApiError> {
    let job_id = parse_job_id(&id)?;
    let service = JobService::new(&state.store);
    Ok(Json(service.get(job_id)?))
}

/// `PUT /api/jobs/:id`.
///
/// # Errors
///
/// Returns [`ApiError`] wrapping [`CoreError::NotFound`] or
/// [`CoreError::InvalidInput`].
pub async fn update_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(body): Json<UpdateJobBody>,
) -> Result<Json<ComparisonJob>, ApiError> {
    let job_id = parse_job_id(&id)?;
    let baseline_url = body.baseline_url.map(|raw| parse_url(&raw, "baselineUrl")).transpose()?;
    let candidate_url = body.candidate_url.map(|raw| parse_url(&raw, "candidateUrl")).transpose()?;
    let request = UpdateJobRequest {
        name: body.name,
        description: body.description.map(Some),
        baseline_url,
        candidate_url,
        crawl_config: body.crawl_config,
        page_map: body.page_map.map(Some),
        test_matrix: body.test_matrix,
        status: body.status,
    };
    let service = JobService::new(&state.store);
    Ok(Json(service.update(job_id, request, now())?))
}

/// `DELETE /api/jobs/:id`.
///
/// # Errors
///
/// Returns [`ApiError`] wrapping [`CoreError::NotFound`] when `id` does not
/// resolve.
pub async fn delete_job(State(state): State<AppState>, Path(id): Path<String>) -> Result<StatusCode, ApiError> {
    let job_id = parse_job_id(&id)?;
    let service = JobService::new(&state.store);
    service.delete(job_id)?;
    Ok(StatusCode::NO_CONTENT)
}

/// `POST /api/jobs/:id/run`. Enqueues a run and returns it immediately in
/// `queued` status; execution happens on a spawned background task so this
/// handler never blocks on the pipeline.
///
/// # Errors
///
/// Returns [`ApiError`] wrapping [`CoreError::NotFound`] when `id` does not
/// resolve.
pub async fn run_job(State(state): State<AppState>, Path(id): Path<String>) -> Result<(StatusCode, Json<Run>), ApiError> {
    let job_id = parse_job_id(&id)?;
    let run = state.orchestrator.enqueue(job_id, "api", now())?;

    let orchestrator = state.orchestrator.clone();
    let run_id = run.id;
    tokio::spawn(async move {
        let _ = orchestrator.execute(run_id, now()).await;
    });

    Ok((StatusCode::ACCEPTED, Json(run)))
}

/// `POST /api/jobs/migrate`.
///
/// # Errors
///
/// Returns [`ApiError`] wrapping [`CoreError::StorageCorruption`] when the
/// snapshot cannot be read or written.
pub async fn migrate_jobs(State(state): State<AppState>) -> Result<Json<MigrateBody>, ApiError> {
    let service = JobService::new(&state.store);
    let count = service.migrate_legacy()?;
    Ok(Json(MigrateBody { count }))
}
