// crates/migration-gate-storage/tests/snapshot_invariants.rs
// ============================================================================
// Storage-level invariant tests: atomic persistence, artifact path scoping,
// run listing, and legacy migration idempotency.
// ============================================================================

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, reason = "Test-only output and panic-based assertions are permitted.")]

mod common;

use migration_gate_core::ArtifactKind;
use migration_gate_core::Run;
use migration_gate_core::RunStatus;
use migration_gate_storage::FileSnapshotStore;
use migration_gate_storage::FileStoreError;

#[test]
fn save_then_reload_round_trips_a_snapshot_exactly() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = common::open_store(&dir);
    let now = common::ts(0);

    let mut snapshot = store.load().expect("load empty snapshot");
    let job = common::sample_job("Round Trip", now);
    let run = Run::new_queued(job.id, "api", now);
    snapshot.comparison_jobs.push(job);
    snapshot.runs.push(run);
    store.save(&snapshot).expect("save");

    // A fresh store instance over the same directory must see the same state.
    let reopened = FileSnapshotStore::open(dir.path()).expect("reopen store");
    let reloaded = reopened.load().expect("load after reopen");
    assert_eq!(reloaded, snapshot);
}

#[test]
fn register_artifact_rejects_a_path_outside_the_runs_subtree() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = common::open_store(&dir);
    let now = common::ts(0);

    let mut snapshot = store.load().expect("load");
    let job = common::sample_job("Scoped", now);
    let run = Run::new_queued(job.id, "api", now);
    let run_id = run.id;
    snapshot.comparison_jobs.push(job);
    snapshot.runs.push(run);
    store.save(&snapshot).expect("save");

    let other_run_id = migration_gate_core::RunId::new();
    let result = store.register_artifact(
        run_id,
        ArtifactKind::Log,
        "Misplaced",
        format!("data/artifacts/{other_run_id}/log.txt"),
        now,
    );
    assert!(matches!(result, Err(FileStoreError::InvalidArtifact(_))));
}

#[test]
fn register_artifact_accepts_a_path_prepared_for_its_own_run() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = common::open_store(&dir);
    let now = common::ts(0);

    let mut snapshot = store.load().expect("load");
    let job = common::sample_job("Prepared Path", now);
    let run = Run::new_queued(job.id, "api", now);
    let run_id = run.id;
    snapshot.comparison_jobs.push(job);
    snapshot.runs.push(run);
    store.save(&snapshot).expect("save");

    let relative = std::path::Path::new("logs").join("stage.log");
    let full_path = store.prepare_artifact_path(run_id, &relative).expect("prepare path");
    std::fs::write(&full_path, b"log body").expect("write artifact file");

    let artifact_id = store
        .register_artifact(
            run_id,
            ArtifactKind::Log,
            "Stage Log",
            format!("data/artifacts/{run_id}/{}", relative.display()),
            now,
        )
        .expect("register artifact");

    let snapshot = store.load().expect("reload");
    let artifact = snapshot.artifacts.iter().find(|a| a.id == artifact_id).expect("artifact present");
    assert!(artifact.path_is_scoped_to_run());
}

#[test]
fn list_runs_filters_by_job_and_orders_most_recent_first() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = common::open_store(&dir);
    let now = common::ts(0);

    let mut snapshot = store.load().expect("load");
    let job_a = common::sample_job("Job A", now);
    let job_b = common::sample_job("Job B", now);
    let run_a1 = Run::new_queued(job_a.id, "api", common::ts(1));
    let run_a2 = Run::new_queued(job_a.id, "api", common::ts(5));
    let run_b1 = Run::new_queued(job_b.id, "api", common::ts(3));
    snapshot.comparison_jobs.push(job_a.clone());
    snapshot.comparison_jobs.push(job_b);
    snapshot.runs.push(run_a1.clone());
    snapshot.runs.push(run_a2.clone());
    snapshot.runs.push(run_b1);
    store.save(&snapshot).expect("save");

    let runs_for_a = store.list_runs(Some(job_a.id)).expect("list runs for job a");
    assert_eq!(runs_for_a.len(), 2);
    assert_eq!(runs_for_a[0].id, run_a2.id, "most recently triggered run must come first");
    assert_eq!(runs_for_a[1].id, run_a1.id);

    let all_runs = store.list_runs(None).expect("list all runs");
    assert_eq!(all_runs.len(), 3);
}

#[test]
fn run_terminal_invariant_holds_after_a_round_trip() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = common::open_store(&dir);
    let now = common::ts(0);

    let mut snapshot = store.load().expect("load");
    let job = common::sample_job("Terminal", now);
    let mut run = Run::new_queued(job.id, "api", now);
    run.status = RunStatus::Completed;
    run.completed_at = Some(common::ts(10));
    snapshot.comparison_jobs.push(job);
    snapshot.runs.push(run.clone());
    store.save(&snapshot).expect("save");

    let reloaded = store.load().expect("reload");
    let reloaded_run = reloaded.runs.iter().find(|r| r.id == run.id).expect("run present");
    assert!(reloaded_run.satisfies_terminal_invariant());
}

#[test]
fn legacy_migration_is_idempotent_at_the_store_level() {
    let dir = tempfile::tempdir().expect("tempdir");
    let legacy = serde_json::json!({
        "jobs": [
            {"id": "legacy-a", "name": "Legacy A", "sourceUrl": "https://a.test", "targetUrl": "https://b.test"},
            {"id": "legacy-b", "sourceUrl": "not-a-url", "targetUrl": "https://d.test"}
        ]
    });
    std::fs::write(dir.path().join("snapshot.json"), serde_json::to_vec_pretty(&legacy).unwrap()).expect("write legacy snapshot");

    let store = FileSnapshotStore::open(dir.path()).expect("open store");
    let (snapshot, migrated_count) = store.load_with_migration_count().expect("load with migration");
    assert_eq!(migrated_count, 1, "the malformed legacy entry must be skipped, not fatal");
    assert_eq!(snapshot.comparison_jobs.len(), 1);
    assert!(!snapshot.metadata.notes.is_empty());
    assert!(snapshot.referential_integrity_holds());

    let (_, migrated_again) = store.load_with_migration_count().expect("load again");
    assert_eq!(migrated_again, 0);
}
