// crates/migration-gate-pipeline/tests/pipeline_scenarios.rs
// ============================================================================
// End-to-end pipeline scenario tests driving a real Orchestrator against
// local HTTP fixtures.
// ============================================================================

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, reason = "Test-only output and panic-based assertions are permitted.")]

mod common;

use std::sync::Arc;

use migration_gate_core::ArtifactKind;
use migration_gate_core::ComparisonReport;
use migration_gate_core::GoNoGo;
use migration_gate_core::Run;
use migration_gate_core::RunStatus;

const PAGE_HTML: &str = "<html><head><title>Home</title></head><body><p>Hello</p></body></html>";

fn report_for(store: &migration_gate_storage::FileSnapshotStore, run_id: migration_gate_core::RunId) -> ComparisonReport {
    let snapshot = store.load().expect("load snapshot");
    let artifact = snapshot
        .artifacts
        .iter()
        .find(|artifact| artifact.run_id == run_id && artifact.label == "Comparison Report (JSON)")
        .expect("report artifact registered");
    let path = store.artifact_root().join(artifact.path.strip_prefix("data/artifacts/").expect("scoped path"));
    let body = std::fs::read(path).expect("read report json");
    serde_json::from_slice(&body).expect("parse report json")
}

#[tokio::test]
async fn zero_diff_run_completes_with_a_go_decision() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = Arc::new(common::open_store(&dir));
    let (baseline_url, baseline_handle) = common::spawn_fixed_content_server(PAGE_HTML, 5);
    let (candidate_url, candidate_handle) = common::spawn_fixed_content_server(PAGE_HTML, 5);

    let now = common::ts(0);
    let job = common::create_single_page_job(&store, &baseline_url, &candidate_url, now);

    let orchestrator = common::build_orchestrator(store.clone());
    let run = orchestrator.enqueue(job.id, "test", now).expect("enqueue");
    let finished = orchestrator.execute(run.id, common::ts(1)).await.expect("execute");

    baseline_handle.join().expect("baseline server thread");
    candidate_handle.join().expect("candidate server thread");

    assert_eq!(finished.status, RunStatus::Completed);

    let report = report_for(&store, run.id);
    assert_eq!(report.executive_summary.go_no_go, GoNoGo::Go);
    assert_eq!(report.risk.overall, 0);
    assert_eq!(report.executive_summary.key_metrics.pages_tested, 1);
    assert_eq!(report.executive_summary.key_metrics.issues_found, 0);
}

#[tokio::test]
async fn unreachable_candidate_site_fails_the_run_with_a_crawl_error_artifact() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = Arc::new(common::open_store(&dir));
    let (baseline_url, baseline_handle) = common::spawn_fixed_content_server(PAGE_HTML, 5);

    // Bind then drop a listener to obtain a port nothing is listening on.
    let reserved = std::net::TcpListener::bind("127.0.0.1:0").expect("reserve a port");
    let unreachable_addr = reserved.local_addr().expect("local addr");
    drop(reserved);
    let candidate_url = format!("http://{unreachable_addr}/");

    let now = common::ts(0);
    let job = common::create_single_page_job(&store, &baseline_url, &candidate_url, now);

    let orchestrator = common::build_orchestrator(store.clone());
    let run = orchestrator.enqueue(job.id, "test", now).expect("enqueue");
    let finished = orchestrator.execute(run.id, common::ts(1)).await.expect("execute");

    baseline_handle.join().expect("baseline server thread");

    assert_eq!(finished.status, RunStatus::Failed);

    let snapshot = store.load().expect("load snapshot");
    let has_crawl_error = snapshot
        .artifacts
        .iter()
        .any(|artifact| artifact.run_id == run.id && artifact.kind == ArtifactKind::Log && artifact.label == "crawl Error");
    assert!(has_crawl_error, "expected a crawl-stage error log artifact");

    let has_report = snapshot
        .artifacts
        .iter()
        .any(|artifact| artifact.run_id == run.id && artifact.label.starts_with("Comparison Report"));
    assert!(!has_report, "a fatally-failed run must not produce a comparison report");
}

#[tokio::test]
async fn crash_recovery_fails_a_running_run_and_records_why() {
    let dir = tempfile::tempdir().expect("tempdir");
    let store = Arc::new(common::open_store(&dir));

    let now = common::ts(0);
    let job = common::create_single_page_job(&store, "https://baseline.test", "https://candidate.test", now);

    let orchestrator = common::build_orchestrator(store.clone());
    let run = orchestrator.enqueue(job.id, "test", now).expect("enqueue");

    let mut snapshot = store.load().expect("load snapshot");
    for entry in &mut snapshot.runs {
        if entry.id == run.id {
            entry.status = RunStatus::Running;
        }
    }
    store.save(&snapshot).expect("save running state");

    let recovered = orchestrator.recover_crashed_runs(common::ts(2)).expect("recover");
    assert_eq!(recovered, 1);

    let snapshot = store.load().expect("load snapshot");
    let recovered_run: &Run = snapshot.runs.iter().find(|entry| entry.id == run.id).expect("run present");
    assert_eq!(recovered_run.status, RunStatus::Failed);
    assert!(recovered_run.satisfies_terminal_invariant());

    let has_abort_artifact = snapshot
        .artifacts
        .iter()
        .any(|artifact| artifact.run_id == run.id && artifact.label == "aborted-on-restart");
    assert!(has_abort_artifact);

    // Recovery is not repeated against an already-terminal run.
    let recovered_again = orchestrator.recover_crashed_runs(common::ts(3)).expect("recover again");
    assert_eq!(recovered_again, 0);
}

#[tokio::test]
async fn legacy_snapshot_migrates_once_and_is_idempotent() {
    let dir = tempfile::tempdir().expect("tempdir");
    let legacy = serde_json::json!({
        "jobs": [
            {"id": "legacy-1", "name": "Old Job", "sourceUrl": "https://old-a.test", "targetUrl": "https://old-b.test"}
        ]
    });
    std::fs::write(dir.path().join("snapshot.json"), serde_json::to_vec_pretty(&legacy).unwrap()).expect("write legacy snapshot");

    let store = migration_gate_storage::FileSnapshotStore::open(dir.path()).expect("open store");
    let migrated_count = store.migrate_legacy().expect("migrate");
    assert_eq!(migrated_count, 1);

    let snapshot = store.load().expect("load migrated snapshot");
    assert_eq!(snapshot.comparison_jobs.len(), 1);
    let job = &snapshot.comparison_jobs[0];
    assert_eq!(job.name, "Old Job");
    assert_eq!(job.migrated_from.as_deref(), Some("legacy-1"));
    assert_eq!(job.crawl_config.depth, 1);
    assert_eq!(job.crawl_config.max_pages, 10);
    assert!(job.test_matrix.visual && job.test_matrix.functional && job.test_matrix.data);
    assert!(snapshot.referential_integrity_holds());

    let migrated_again = store.migrate_legacy().expect("migrate again");
    assert_eq!(migrated_again, 0, "migration must be idempotent");
}
