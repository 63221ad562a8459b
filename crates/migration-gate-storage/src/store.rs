// crates/migration-gate-storage/src/store.rs
// ============================================================================
// Module: File Snapshot Store
// Description: Durable StorageSnapshot persistence and the artifact registry.
// Purpose: Give the job service and pipeline one crash-safe home for every
// persisted entity and the files stages produce.
// Dependencies: migration-gate-core, serde_json, thiserror
// ============================================================================

//! ## Overview
//! The store owns exactly one file, `snapshot.json`, written with a
//! temp-file-then-rename so a crash mid-write can never leave a partial
//! file in place, and exactly one directory tree, `artifacts/`, where every
//! stage writes its own files. Writes are serialized by an internal mutex so
//! snapshot transitions are linearizable even under concurrent saves.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs;
use std::io;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Mutex;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering;

use migration_gate_core::ArtifactId;
use migration_gate_core::ArtifactKind;
use migration_gate_core::JobId;
use migration_gate_core::Run;
use migration_gate_core::RunArtifact;
use migration_gate_core::RunId;
use migration_gate_core::RunStatus;
use migration_gate_core::StorageSnapshot;
use migration_gate_core::Timestamp;
use migration_gate_core::CURRENT_SNAPSHOT_VERSION;
use thiserror::Error;

use crate::migration::MigrationError;
use crate::migration::migrate_legacy_jobs;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors the file store may return.
///
/// # Invariants
/// - `Corrupt` and `VersionMismatch` must stop process startup; callers must
///   not paper over them with a fresh empty snapshot.
#[derive(Debug, Error)]
pub enum FileStoreError {
    /// Filesystem I/O failed.
    #[error("storage io error: {0}")]
    Io(String),
    /// The on-disk snapshot could not be parsed as JSON.
    #[error("storage corruption: snapshot.json is not valid JSON: {0}")]
    Corrupt(String),
    /// A legacy-jobs migration could not be applied.
    #[error("storage corruption: migration failed: {0}")]
    VersionMismatch(String),
    /// An artifact registration referenced a file that does not exist, or a
    /// path outside the run's artifact subtree.
    #[error("invalid artifact registration: {0}")]
    InvalidArtifact(String),
}

impl From<io::Error> for FileStoreError {
    fn from(err: io::Error) -> Self {
        Self::Io(err.to_string())
    }
}

impl From<MigrationError> for FileStoreError {
    fn from(err: MigrationError) -> Self {
        Self::VersionMismatch(err.to_string())
    }
}

impl From<FileStoreError> for migration_gate_core::CoreError {
    fn from(err: FileStoreError) -> Self {
        Self::StorageCorruption(err.to_string())
    }
}

// ============================================================================
// SECTION: Run Summary
// ============================================================================

/// A lightweight row for `GET /api/runs`, avoiding a full snapshot load by
/// callers that only need the listing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RunSummary {
    /// Run identifier.
    pub id: RunId,
    /// Owning job.
    pub job_id: JobId,
    /// Lifecycle status.
    pub status: RunStatus,
    /// Enqueue timestamp.
    pub triggered_at: Timestamp,
}

impl From<&Run> for RunSummary {
    fn from(run: &Run) -> Self {
        Self {
            id: run.id,
            job_id: run.job_id,
            status: run.status,
            triggered_at: run.triggered_at,
        }
    }
}

// ============================================================================
// SECTION: Op Counters
// ============================================================================

/// Lightweight diagnostic counters, the file-store counterpart to a
/// SQL store's perf-stats snapshot, scaled to what a single-process file
/// store needs.
#[derive(Debug, Default)]
pub struct StorageOpCounts {
    /// Total `load()` calls.
    pub loads: AtomicU64,
    /// Total `save()` calls.
    pub saves: AtomicU64,
    /// Total artifact registrations.
    pub registrations: AtomicU64,
}

/// A point-in-time copy of [`StorageOpCounts`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageOpCountsSnapshot {
    /// Total `load()` calls observed so far.
    pub loads: u64,
    /// Total `save()` calls observed so far.
    pub saves: u64,
    /// Total artifact registrations observed so far.
    pub registrations: u64,
}

// ============================================================================
// SECTION: File Snapshot Store
// ============================================================================

/// Durable, process-crash-safe home for the `StorageSnapshot` and its
/// artifact file tree.
pub struct FileSnapshotStore {
    data_dir: PathBuf,
    write_lock: Mutex<()>,
    counts: StorageOpCounts,
}

impl FileSnapshotStore {
    /// Opens (creating if absent) the store rooted at `data_dir`.
    ///
    /// # Errors
    ///
    /// Returns [`FileStoreError::Io`] when the directory tree cannot be
    /// created.
    pub fn open(data_dir: impl Into<PathBuf>) -> Result<Self, FileStoreError> {
        let data_dir = data_dir.into();
        fs::create_dir_all(&data_dir)?;
        fs::create_dir_all(data_dir.join("artifacts"))?;
        Ok(Self {
            data_dir,
            write_lock: Mutex::new(()),
            counts: StorageOpCounts::default(),
        })
    }

    fn snapshot_path(&self) -> PathBuf {
        self.data_dir.join("snapshot.json")
    }

    /// Returns the root directory under which every run's artifact subtree
    /// lives.
    #[must_use]
    pub fn artifact_root(&self) -> PathBuf {
        self.data_dir.join("artifacts")
    }

    /// Returns the directory a given run's artifacts are written under.
    #[must_use]
    pub fn run_artifact_dir(&self, run_id: RunId) -> PathBuf {
        self.artifact_root().join(run_id.to_string())
    }

    /// Reports whether the store's data directory is writable and the
    /// current on-disk snapshot (if any) is parseable, for `GET /health`.
    ///
    /// # Errors
    ///
    /// Returns [`FileStoreError`] when the directory is unwritable or the
    /// snapshot is corrupt.
    pub fn readiness(&self) -> Result<(), FileStoreError> {
        let probe = self.data_dir.join(".readiness-probe");
        fs::write(&probe, b"ok")?;
        fs::remove_file(&probe)?;
        self.load().map(|_| ())
    }

    /// Returns a point-in-time snapshot of the store's operation counters.
    #[must_use]
    pub fn op_counts(&self) -> StorageOpCountsSnapshot {
        StorageOpCountsSnapshot {
            loads: self.counts.loads.load(Ordering::Relaxed),
            saves: self.counts.saves.load(Ordering::Relaxed),
            registrations: self.counts.registrations.load(Ordering::Relaxed),
        }
    }

    /// Loads the snapshot, migrating and persisting it first if it carries a
    /// legacy shape. Returns the number of legacy jobs migrated during this
    /// call (always `0` once the snapshot is current).
    ///
    /// # Errors
    ///
    /// Returns [`FileStoreError::Corrupt`] when `snapshot.json` exists but is
    /// not valid JSON, and [`FileStoreError::VersionMismatch`] when a legacy
    /// entry cannot be migrated.
    pub fn load_with_migration_count(&self) -> Result<(StorageSnapshot, usize), FileStoreError> {
        self.counts.loads.fetch_add(1, Ordering::Relaxed);
        let path = self.snapshot_path();
        if !path.exists() {
            return Ok((StorageSnapshot::empty(), 0));
        }

        let raw_bytes = fs::read(&path)?;
        let mut raw: serde_json::Value = serde_json::from_slice(&raw_bytes)
            .map_err(|err| FileStoreError::Corrupt(err.to_string()))?;

        let legacy_jobs = raw.get("jobs").cloned();
        let Some(legacy_jobs) = legacy_jobs else {
            let snapshot: StorageSnapshot = serde_json::from_value(raw)
                .map_err(|err| FileStoreError::Corrupt(err.to_string()))?;
            return Ok((snapshot, 0));
        };

        let now = Timestamp::from_offset(time::OffsetDateTime::now_utc());
        let (migrated, skipped) = migrate_legacy_jobs(&legacy_jobs, now)?;
        let migrated_count = migrated.len();

        let mut snapshot: StorageSnapshot = {
            let object = raw
                .as_object_mut()
                .ok_or_else(|| FileStoreError::Corrupt("snapshot root is not an object".into()))?;
            object.remove("jobs");
            if !object.contains_key("comparisonJobs") {
                object.insert("comparisonJobs".into(), serde_json::json!([]));
            }
            if !object.contains_key("runs") {
                object.insert("runs".into(), serde_json::json!([]));
            }
            if !object.contains_key("artifacts") {
                object.insert("artifacts".into(), serde_json::json!([]));
            }
            if !object.contains_key("version") {
                object.insert("version".into(), serde_json::json!(CURRENT_SNAPSHOT_VERSION));
            }
            serde_json::from_value(raw).map_err(|err| FileStoreError::Corrupt(err.to_string()))?
        };

        snapshot.comparison_jobs.extend(migrated);
        snapshot.version = CURRENT_SNAPSHOT_VERSION;
        snapshot.metadata.last_migration = Some(now);
        snapshot.metadata.notes.push(format!(
            "migrated {migrated_count} legacy job(s) at {now}; {} skipped",
            skipped.len()
        ));
        snapshot.metadata.notes.extend(skipped);

        self.save(&snapshot)?;
        Ok((snapshot, migrated_count))
    }

    /// Loads the snapshot, migrating it first if needed. See
    /// [`Self::load_with_migration_count`] for the migration-count variant
    /// used by the explicit migrate-legacy operation.
    ///
    /// # Errors
    ///
    /// See [`Self::load_with_migration_count`].
    pub fn load(&self) -> Result<StorageSnapshot, FileStoreError> {
        self.load_with_migration_count().map(|(snapshot, _)| snapshot)
    }

    /// Atomically persists `snapshot`: write to a sibling temp file, flush,
    /// then rename over the target. Concurrent saves are serialized by an
    /// internal mutex so snapshot transitions are linearizable.
    ///
    /// # Errors
    ///
    /// Returns [`FileStoreError::Io`] when the write, flush, or rename fails.
    pub fn save(&self, snapshot: &StorageSnapshot) -> Result<(), FileStoreError> {
        use std::io::Write;

        let _guard = self
            .write_lock
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);

        let path = self.snapshot_path();
        let tmp_path = path.with_extension("json.tmp");
        let body = serde_json::to_vec_pretty(snapshot)
            .map_err(|err| FileStoreError::Io(err.to_string()))?;

        {
            let mut file = fs::File::create(&tmp_path)?;
            file.write_all(&body)?;
            file.flush()?;
            file.sync_all()?;
        }
        fs::rename(&tmp_path, &path)?;

        self.counts.saves.fetch_add(1, Ordering::Relaxed);
        Ok(())
    }

    /// Runs the explicit migrate-legacy operation. Idempotent: the second
    /// call in a row against an already-migrated snapshot returns `0`.
    ///
    /// # Errors
    ///
    /// See [`Self::load_with_migration_count`].
    pub fn migrate_legacy(&self) -> Result<usize, FileStoreError> {
        self.load_with_migration_count().map(|(_, count)| count)
    }

    /// Returns lightweight run summaries, optionally filtered to one job,
    /// most-recently-triggered first.
    ///
    /// # Errors
    ///
    /// See [`Self::load`].
    pub fn list_runs(&self, job_id: Option<JobId>) -> Result<Vec<RunSummary>, FileStoreError> {
        let snapshot = self.load()?;
        let mut summaries: Vec<RunSummary> = snapshot
            .runs
            .iter()
            .filter(|run| job_id.is_none_or(|wanted| run.job_id == wanted))
            .map(RunSummary::from)
            .collect();
        summaries.sort_by(|a, b| b.triggered_at.cmp(&a.triggered_at));
        Ok(summaries)
    }

    /// Registers a new artifact after verifying its backing file exists
    /// under `artifactRoot/{runId}/…`. Part of the same snapshot save that
    /// commits the owning stage, so a crash between file write and
    /// registration leaves at worst an orphan file, never a dangling
    /// registry entry.
    ///
    /// # Errors
    ///
    /// Returns [`FileStoreError::InvalidArtifact`] when the file is missing
    /// or the path escapes the run's artifact subtree, and any error
    /// [`Self::load`] or [`Self::save`] can return.
    pub fn register_artifact(
        &self,
        run_id: RunId,
        kind: ArtifactKind,
        label: impl Into<String>,
        relative_path: impl Into<String>,
        now: Timestamp,
    ) -> Result<ArtifactId, FileStoreError> {
        let relative_path = relative_path.into();
        let expected_prefix = format!("data/artifacts/{run_id}/");
        if !relative_path.starts_with(&expected_prefix) {
            return Err(FileStoreError::InvalidArtifact(format!(
                "path {relative_path} is not under {expected_prefix}"
            )));
        }

        let suffix = relative_path
            .strip_prefix("data/artifacts/")
            .expect("checked prefix above");
        let absolute_path = self.data_dir.join("artifacts").join(suffix);
        if !absolute_path.is_file() {
            return Err(FileStoreError::InvalidArtifact(format!(
                "no file at {}",
                absolute_path.display()
            )));
        }

        let mut snapshot = self.load()?;
        if !snapshot.runs.iter().any(|run| run.id == run_id) {
            return Err(FileStoreError::InvalidArtifact(format!(
                "unknown run {run_id}"
            )));
        }

        let artifact = RunArtifact {
            id: ArtifactId::new(),
            run_id,
            kind,
            label: label.into(),
            path: relative_path,
            created_at: now,
        };
        let artifact_id = artifact.id;
        snapshot.artifacts.push(artifact);
        self.save(&snapshot)?;
        self.counts.registrations.fetch_add(1, Ordering::Relaxed);
        Ok(artifact_id)
    }

    /// Returns the filesystem path an artifact under `run_id` should be
    /// written at, creating parent directories as needed.
    ///
    /// # Errors
    ///
    /// Returns [`FileStoreError::Io`] when the directories cannot be
    /// created.
    pub fn prepare_artifact_path(
        &self,
        run_id: RunId,
        relative_under_run: &Path,
    ) -> Result<PathBuf, FileStoreError> {
        let full = self.run_artifact_dir(run_id).join(relative_under_run);
        if let Some(parent) = full.parent() {
            fs::create_dir_all(parent)?;
        }
        Ok(full)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, reason = "test-only assertions")]
mod tests {
    use super::*;
    use migration_gate_core::ComparisonJob;
    use migration_gate_core::CrawlConfig;
    use migration_gate_core::JobStatus;
    use migration_gate_core::TestMatrix;
    use url::Url;

    fn ts() -> Timestamp {
        Timestamp::parse("2026-01-01T00:00:00Z").unwrap()
    }

    fn job(id: JobId) -> ComparisonJob {
        ComparisonJob {
            id,
            name: "Test".into(),
            description: None,
            baseline_url: Url::parse("https://a.test").unwrap(),
            candidate_url: Url::parse("https://b.test").unwrap(),
            crawl_config: CrawlConfig::default_bounds(),
            page_map: None,
            test_matrix: TestMatrix::default(),
            status: JobStatus::Pending,
            created_at: ts(),
            updated_at: ts(),
            migrated_from: None,
            snapshot_version: CURRENT_SNAPSHOT_VERSION,
        }
    }

    #[test]
    fn load_on_empty_directory_returns_empty_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::open(dir.path()).unwrap();
        let snapshot = store.load().unwrap();
        assert_eq!(snapshot.version, CURRENT_SNAPSHOT_VERSION);
        assert!(snapshot.comparison_jobs.is_empty());
    }

    #[test]
    fn save_then_load_round_trips() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::open(dir.path()).unwrap();
        let mut snapshot = StorageSnapshot::empty();
        snapshot.comparison_jobs.push(job(JobId::new()));
        store.save(&snapshot).unwrap();

        let reloaded = store.load().unwrap();
        assert_eq!(reloaded.comparison_jobs.len(), 1);
        assert_eq!(store.op_counts().saves, 1);
    }

    #[test]
    fn migrates_legacy_jobs_key_on_load_and_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::open(dir.path()).unwrap();
        let raw = serde_json::json!({
            "version": 0,
            "jobs": [{"id": "j1", "sourceUrl": "https://a.test", "targetUrl": "https://b.test"}]
        });
        fs::write(
            dir.path().join("snapshot.json"),
            serde_json::to_vec(&raw).unwrap(),
        )
        .unwrap();

        let first_count = store.migrate_legacy().unwrap();
        assert_eq!(first_count, 1);

        let snapshot = store.load().unwrap();
        assert_eq!(snapshot.comparison_jobs.len(), 1);
        assert_eq!(
            snapshot.comparison_jobs[0].migrated_from.as_deref(),
            Some("j1")
        );

        let second_count = store.migrate_legacy().unwrap();
        assert_eq!(second_count, 0);
    }

    #[test]
    fn register_artifact_rejects_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::open(dir.path()).unwrap();
        let mut snapshot = StorageSnapshot::empty();
        let job_id = JobId::new();
        snapshot.comparison_jobs.push(job(job_id));
        let run = Run::new_queued(job_id, "api", ts());
        let run_id = run.id;
        snapshot.runs.push(run);
        store.save(&snapshot).unwrap();

        let result = store.register_artifact(
            run_id,
            ArtifactKind::Log,
            "Capture Error",
            format!("data/artifacts/{run_id}/capture.log"),
            ts(),
        );
        assert!(result.is_err());
    }

    #[test]
    fn register_artifact_succeeds_once_file_exists() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::open(dir.path()).unwrap();
        let mut snapshot = StorageSnapshot::empty();
        let job_id = JobId::new();
        snapshot.comparison_jobs.push(job(job_id));
        let run = Run::new_queued(job_id, "api", ts());
        let run_id = run.id;
        snapshot.runs.push(run);
        store.save(&snapshot).unwrap();

        let path = store
            .prepare_artifact_path(run_id, Path::new("capture.log"))
            .unwrap();
        fs::write(&path, b"boom").unwrap();

        let artifact_id = store
            .register_artifact(
                run_id,
                ArtifactKind::Log,
                "Capture Error",
                format!("data/artifacts/{run_id}/capture.log"),
                ts(),
            )
            .unwrap();

        let snapshot = store.load().unwrap();
        assert!(snapshot.artifacts.iter().any(|a| a.id == artifact_id));
        assert_eq!(store.op_counts().registrations, 1);
    }

    #[test]
    fn list_runs_filters_by_job_and_sorts_by_recency() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileSnapshotStore::open(dir.path()).unwrap();
        let mut snapshot = StorageSnapshot::empty();
        let job_a = JobId::new();
        let job_b = JobId::new();
        snapshot.comparison_jobs.push(job(job_a));
        snapshot.comparison_jobs.push(job(job_b));
        snapshot.runs.push(Run::new_queued(job_a, "api", ts()));
        snapshot.runs.push(Run::new_queued(job_b, "api", ts()));
        store.save(&snapshot).unwrap();

        let only_a = store.list_runs(Some(job_a)).unwrap();
        assert_eq!(only_a.len(), 1);
        assert_eq!(only_a[0].job_id, job_a);

        let all = store.list_runs(None).unwrap();
        assert_eq!(all.len(), 2);
    }
}
