// crates/migration-gate-pipeline/tests/common/mod.rs
// ============================================================================
// Shared test helpers for pipeline scenario tests.
// ============================================================================

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, reason = "Test-only output and panic-based assertions are permitted.")]

use std::sync::Arc;
use std::time::Duration;

use migration_gate_core::ComparisonJob;
use migration_gate_core::Timestamp;
use migration_gate_pipeline::CreateJobRequest;
use migration_gate_pipeline::JobService;
use migration_gate_pipeline::NoopMetrics;
use migration_gate_pipeline::Orchestrator;
use migration_gate_pipeline::OrchestratorConfig;
use migration_gate_providers::FetchBrowserDriver;
use migration_gate_providers::RuleBasedReasoner;
use migration_gate_storage::FileSnapshotStore;
use url::Url;

// ============================================================================
// SECTION: Time
// ============================================================================

pub fn ts(seconds: i64) -> Timestamp {
    Timestamp::from_offset(time::OffsetDateTime::UNIX_EPOCH + time::Duration::seconds(seconds))
}

// ============================================================================
// SECTION: Store & Orchestrator
// ============================================================================

pub fn open_store(dir: &tempfile::TempDir) -> FileSnapshotStore {
    FileSnapshotStore::open(dir.path()).expect("open store")
}

pub fn build_orchestrator(store: Arc<FileSnapshotStore>) -> Orchestrator {
    Orchestrator::new(
        store,
        Arc::new(FetchBrowserDriver::new()),
        Arc::new(RuleBasedReasoner),
        Arc::new(NoopMetrics),
        OrchestratorConfig::default(),
    )
}

/// Creates a job whose crawl is bounded to the seed page only, so a test
/// server only has to answer a fixed, small number of requests.
pub fn create_single_page_job(store: &FileSnapshotStore, baseline: &str, candidate: &str, now: Timestamp) -> ComparisonJob {
    let service = JobService::new(store);
    let mut crawl_config = migration_gate_core::CrawlConfig::default_bounds();
    crawl_config.depth = 0;
    crawl_config.max_pages = 1;

    service
        .create(
            CreateJobRequest {
                name: "scenario".into(),
                description: None,
                baseline_url: Url::parse(baseline).expect("baseline url"),
                candidate_url: Url::parse(candidate).expect("candidate url"),
                crawl_config: Some(crawl_config),
                page_map: None,
                test_matrix: None,
            },
            now,
        )
        .expect("create job")
}

// ============================================================================
// SECTION: Fixed-Content Test Server
// ============================================================================

/// Spawns a local HTTP server that answers `request_count` requests with the
/// same HTML body, then stops. Returns the base URL and a join handle the
/// caller must `join` after the run completes.
pub fn spawn_fixed_content_server(html: &'static str, request_count: usize) -> (String, std::thread::JoinHandle<()>) {
    let server = tiny_http::Server::http("127.0.0.1:0").expect("bind test server");
    let addr = server.server_addr().to_string();
    let url = format!("http://{addr}/");

    let handle = std::thread::spawn(move || {
        for _ in 0..request_count {
            if let Ok(Some(request)) = server.recv_timeout(Duration::from_secs(5)) {
                let response = tiny_http::Response::from_string(html).with_header(
                    tiny_http::Header::from_bytes(&b"Content-Type"[..], &b"text/html"[..]).expect("header"),
                );
                let _ = request.respond(response);
            }
        }
    });

    (url, handle)
}
