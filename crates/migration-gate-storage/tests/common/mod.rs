// crates/migration-gate-storage/tests/common/mod.rs
// ============================================================================
// Shared test helpers for storage invariant tests.
// ============================================================================

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic, reason = "Test-only output and panic-based assertions are permitted.")]

use migration_gate_core::ComparisonJob;
use migration_gate_core::CrawlConfig;
use migration_gate_core::JobId;
use migration_gate_core::JobStatus;
use migration_gate_core::TestMatrix;
use migration_gate_core::Timestamp;
use migration_gate_storage::FileSnapshotStore;
use url::Url;

pub fn ts(seconds: i64) -> Timestamp {
    Timestamp::from_offset(time::OffsetDateTime::UNIX_EPOCH + time::Duration::seconds(seconds))
}

pub fn open_store(dir: &tempfile::TempDir) -> FileSnapshotStore {
    FileSnapshotStore::open(dir.path()).expect("open store")
}

pub fn sample_job(name: &str, now: Timestamp) -> ComparisonJob {
    ComparisonJob {
        id: JobId::new(),
        name: name.into(),
        description: None,
        baseline_url: Url::parse("https://baseline.test").expect("baseline url"),
        candidate_url: Url::parse("https://candidate.test").expect("candidate url"),
        crawl_config: CrawlConfig::default_bounds(),
        page_map: None,
        test_matrix: TestMatrix::all_enabled(),
        status: JobStatus::Pending,
        created_at: now,
        updated_at: now,
        migrated_from: None,
        snapshot_version: migration_gate_core::CURRENT_SNAPSHOT_VERSION,
    }
}
