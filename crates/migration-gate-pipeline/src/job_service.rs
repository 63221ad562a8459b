// crates/migration-gate-pipeline/src/job_service.rs
// ============================================================================
// Module: Job Service
// Description: CRUD and cascade-delete operations over ComparisonJob.
// Purpose: Validate and mediate every mutation of job state through the
// storage layer so the pipeline and the REST boundary share one rulebook.
// Dependencies: migration-gate-core, migration-gate-storage
// ============================================================================

//! ## Overview
//! The job service is the only writer of `ComparisonJob` rows. It enforces
//! the §3 invariants on create and update and performs the cascade delete
//! that removes a job's runs and artifacts together.

// ============================================================================
// SECTION: Imports
// ============================================================================

use migration_gate_core::ComparisonJob;
use migration_gate_core::CoreError;
use migration_gate_core::CrawlConfig;
use migration_gate_core::JobId;
use migration_gate_core::JobStatus;
use migration_gate_core::PageMap;
use migration_gate_core::TestMatrix;
use migration_gate_core::Timestamp;
use migration_gate_core::CURRENT_SNAPSHOT_VERSION;
use migration_gate_storage::FileSnapshotStore;
use url::Url;

// ============================================================================
// SECTION: Request Shapes
// ============================================================================

/// Input to [`JobService::create`].
#[derive(Debug, Clone)]
pub struct CreateJobRequest {
    /// Human-readable name.
    pub name: String,
    /// Optional free-form description.
    pub description: Option<String>,
    /// Production site URL.
    pub baseline_url: Url,
    /// Migrated site URL under evaluation.
    pub candidate_url: Url,
    /// Crawl bounds, defaulted by the caller if absent.
    pub crawl_config: Option<CrawlConfig>,
    /// Explicit page pairing overrides.
    pub page_map: Option<PageMap>,
    /// Diff stage selector, defaulted by the caller if absent.
    pub test_matrix: Option<TestMatrix>,
}

/// Partial update applied by [`JobService::update`]. `None` fields are left
/// untouched.
#[derive(Debug, Clone, Default)]
pub struct UpdateJobRequest {
    /// New name, if present.
    pub name: Option<String>,
    /// New description, if present. `Some(None)` clears it.
    pub description: Option<Option<String>>,
    /// New baseline URL, if present.
    pub baseline_url: Option<Url>,
    /// New candidate URL, if present.
    pub candidate_url: Option<Url>,
    /// New crawl config, if present.
    pub crawl_config: Option<CrawlConfig>,
    /// New page map, if present. `Some(None)` clears it.
    pub page_map: Option<Option<PageMap>>,
    /// New test matrix, if present.
    pub test_matrix: Option<TestMatrix>,
    /// New job status, if present.
    pub status: Option<JobStatus>,
}

// ============================================================================
// SECTION: Validation
// ============================================================================

fn validate_url_pair(baseline: &Url, candidate: &Url) -> Result<(), CoreError> {
    if baseline == candidate {
        return Err(CoreError::InvalidInput(
            "baselineUrl and candidateUrl must not be equal".into(),
        ));
    }
    Ok(())
}

fn validate_name(name: &str) -> Result<(), CoreError> {
    if name.trim().is_empty() {
        return Err(CoreError::InvalidInput("name must not be empty".into()));
    }
    Ok(())
}

fn validate_crawl_config(config: &CrawlConfig) -> Result<(), CoreError> {
    if config.max_pages < 1 {
        return Err(CoreError::InvalidInput(
            "crawlConfig.maxPages must be at least 1".into(),
        ));
    }
    Ok(())
}

// ============================================================================
// SECTION: Job Service
// ============================================================================

/// Mediates every read and write of `ComparisonJob` state through a
/// [`FileSnapshotStore`].
pub struct JobService<'a> {
    store: &'a FileSnapshotStore,
}

impl<'a> JobService<'a> {
    /// Builds a service bound to `store`.
    #[must_use]
    pub fn new(store: &'a FileSnapshotStore) -> Self {
        Self { store }
    }

    /// Creates a job, defaulting `CrawlConfig`/`TestMatrix` when omitted.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::InvalidInput`] on a §3 invariant breach, or a
    /// storage error wrapped as [`CoreError::StorageCorruption`].
    pub fn create(&self, request: CreateJobRequest, now: Timestamp) -> Result<ComparisonJob, CoreError> {
        validate_name(&request.name)?;
        validate_url_pair(&request.baseline_url, &request.candidate_url)?;
        let crawl_config = request.crawl_config.unwrap_or_else(CrawlConfig::default_bounds);
        validate_crawl_config(&crawl_config)?;

        let job = ComparisonJob {
            id: JobId::new(),
            name: request.name,
            description: request.description,
            baseline_url: request.baseline_url,
            candidate_url: request.candidate_url,
            crawl_config,
            page_map: request.page_map,
            test_matrix: request.test_matrix.unwrap_or_default(),
            status: JobStatus::Pending,
            created_at: now,
            updated_at: now,
            migrated_from: None,
            snapshot_version: CURRENT_SNAPSHOT_VERSION,
        };

        let mut snapshot = self.store.load()?;
        snapshot.comparison_jobs.push(job.clone());
        self.store.save(&snapshot)?;
        Ok(job)
    }

    /// Returns a single job by id.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] when `id` does not resolve.
    pub fn get(&self, id: JobId) -> Result<ComparisonJob, CoreError> {
        let snapshot = self.store.load()?;
        snapshot
            .comparison_jobs
            .into_iter()
            .find(|job| job.id == id)
            .ok_or_else(|| CoreError::NotFound(format!("job {id}")))
    }

    /// Returns every job, insertion order preserved.
    ///
    /// # Errors
    ///
    /// Returns a storage error wrapped as [`CoreError::StorageCorruption`].
    pub fn list(&self) -> Result<Vec<ComparisonJob>, CoreError> {
        Ok(self.store.load()?.comparison_jobs)
    }

    /// Applies a partial update, re-validating touched fields.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] when `id` does not resolve, or
    /// [`CoreError::InvalidInput`] on a §3 invariant breach.
    pub fn update(
        &self,
        id: JobId,
        request: UpdateJobRequest,
        now: Timestamp,
    ) -> Result<ComparisonJob, CoreError> {
        let mut snapshot = self.store.load()?;
        let job = snapshot
            .comparison_jobs
            .iter_mut()
            .find(|job| job.id == id)
            .ok_or_else(|| CoreError::NotFound(format!("job {id}")))?;

        if let Some(name) = request.name {
            validate_name(&name)?;
            job.name = name;
        }
        if let Some(description) = request.description {
            job.description = description;
        }
        if let Some(baseline_url) = request.baseline_url {
            job.baseline_url = baseline_url;
        }
        if let Some(candidate_url) = request.candidate_url {
            job.candidate_url = candidate_url;
        }
        validate_url_pair(&job.baseline_url, &job.candidate_url)?;

        if let Some(crawl_config) = request.crawl_config {
            validate_crawl_config(&crawl_config)?;
            job.crawl_config = crawl_config;
        }
        if let Some(page_map) = request.page_map {
            job.page_map = page_map;
        }
        if let Some(test_matrix) = request.test_matrix {
            job.test_matrix = test_matrix;
        }
        if let Some(status) = request.status {
            job.status = status;
        }
        job.updated_at = now;

        let updated = job.clone();
        self.store.save(&snapshot)?;
        Ok(updated)
    }

    /// Deletes a job and cascades to its runs and their artifacts.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] when `id` does not resolve.
    pub fn delete(&self, id: JobId) -> Result<(), CoreError> {
        let mut snapshot = self.store.load()?;
        let existed = snapshot.comparison_jobs.iter().any(|job| job.id == id);
        if !existed {
            return Err(CoreError::NotFound(format!("job {id}")));
        }

        let doomed_runs: Vec<_> = snapshot
            .runs
            .iter()
            .filter(|run| run.job_id == id)
            .map(|run| run.id)
            .collect();

        snapshot.comparison_jobs.retain(|job| job.id != id);
        snapshot.runs.retain(|run| run.job_id != id);
        snapshot
            .artifacts
            .retain(|artifact| !doomed_runs.contains(&artifact.run_id));

        self.store.save(&snapshot)?;

        for run_id in doomed_runs {
            let _ = std::fs::remove_dir_all(self.store.run_artifact_dir(run_id));
        }
        Ok(())
    }

    /// Runs the explicit migrate-legacy operation.
    ///
    /// # Errors
    ///
    /// Returns a storage error wrapped as [`CoreError::StorageCorruption`].
    pub fn migrate_legacy(&self) -> Result<usize, CoreError> {
        Ok(self.store.migrate_legacy()?)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, reason = "test-only assertions")]
mod tests {
    use super::*;

    fn ts() -> Timestamp {
        Timestamp::parse("2026-01-01T00:00:00Z").unwrap()
    }

    fn request(baseline: &str, candidate: &str) -> CreateJobRequest {
        CreateJobRequest {
            name: "Test".into(),
            description: None,
            baseline_url: Url::parse(baseline).unwrap(),
            candidate_url: Url::parse(candidate).unwrap(),
            crawl_config: None,
            page_map: None,
            test_matrix: None,
        }
    }

    #[test]
    fn create_defaults_crawl_config_and_test_matrix() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::open(dir.path()).unwrap();
        let service = JobService::new(&store);

        let job = service
            .create(request("https://a.test", "https://b.test"), ts())
            .unwrap();
        assert_eq!(job.crawl_config.max_pages, 10);
        assert!(job.test_matrix.visual);
        assert_eq!(job.status, JobStatus::Pending);
    }

    #[test]
    fn create_rejects_equal_urls() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::open(dir.path()).unwrap();
        let service = JobService::new(&store);

        let result = service.create(request("https://a.test", "https://a.test"), ts());
        assert!(matches!(result, Err(CoreError::InvalidInput(_))));
    }

    #[test]
    fn update_rejects_making_urls_equal() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::open(dir.path()).unwrap();
        let service = JobService::new(&store);
        let job = service
            .create(request("https://a.test", "https://b.test"), ts())
            .unwrap();

        let result = service.update(
            job.id,
            UpdateJobRequest {
                candidate_url: Some(Url::parse("https://a.test").unwrap()),
                ..Default::default()
            },
            ts(),
        );
        assert!(matches!(result, Err(CoreError::InvalidInput(_))));
    }

    #[test]
    fn delete_cascades_to_runs_and_artifacts() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::open(dir.path()).unwrap();
        let service = JobService::new(&store);
        let job = service
            .create(request("https://a.test", "https://b.test"), ts())
            .unwrap();

        let mut snapshot = store.load().unwrap();
        let run = migration_gate_core::Run::new_queued(job.id, "api", ts());
        snapshot.runs.push(run);
        store.save(&snapshot).unwrap();

        service.delete(job.id).unwrap();
        let snapshot = store.load().unwrap();
        assert!(snapshot.comparison_jobs.is_empty());
        assert!(snapshot.runs.is_empty());
    }

    #[test]
    fn delete_unknown_job_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::open(dir.path()).unwrap();
        let service = JobService::new(&store);
        let result = service.delete(JobId::new());
        assert!(matches!(result, Err(CoreError::NotFound(_))));
    }
}
