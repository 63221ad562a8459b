// crates/migration-gate-storage/src/migration.rs
// ============================================================================
// Module: Legacy Snapshot Migration
// Description: Converts legacy `jobs` entries into `ComparisonJob`s in place.
// Purpose: Keep migration rules explicit, total, and idempotent, isolated
// from the store's load/save mechanics.
// Dependencies: migration-gate-core, serde_json, thiserror
// ============================================================================

//! ## Overview
//! The only migration rule defined today converts a legacy job shape
//! (`sourceUrl`/`targetUrl`) into a `ComparisonJob`. The rule is total: every
//! legacy job produces a job, defaulting `CrawlConfig` and `TestMatrix`
//! rather than rejecting incomplete legacy data. Running it twice on an
//! already-migrated snapshot is a no-op that returns `count = 0`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use migration_gate_core::ComparisonJob;
use migration_gate_core::CrawlConfig;
use migration_gate_core::JobId;
use migration_gate_core::JobStatus;
use migration_gate_core::TestMatrix;
use migration_gate_core::Timestamp;
use serde::Deserialize;
use thiserror::Error;
use url::Url;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Migration-specific errors.
///
/// # Invariants
/// - `LegacyJobInvalid` never aborts the whole migration; the offending
///   entry is skipped and the reason is kept in the snapshot's metadata.
#[derive(Debug, Error)]
pub enum MigrationError {
    /// The `jobs` array was present but not a JSON array.
    #[error("legacy `jobs` key is not an array")]
    LegacyJobsNotAnArray,
    /// One legacy job entry could not be parsed into the expected shape.
    #[error("legacy job is malformed: {0}")]
    LegacyJobInvalid(String),
}

// ============================================================================
// SECTION: Legacy Shape
// ============================================================================

/// The pre-migration job shape tolerated on read.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LegacyJob {
    id: String,
    #[serde(default)]
    name: Option<String>,
    source_url: String,
    target_url: String,
}

// ============================================================================
// SECTION: Migration Rule
// ============================================================================

/// Converts one legacy job into a `ComparisonJob`, defaulting `CrawlConfig`
/// to `{depth: 1, maxPages: 10, followExternal: false}` and `TestMatrix` to
/// all-true, per the documented migration rule.
///
/// # Errors
///
/// Returns [`MigrationError::LegacyJobInvalid`] when `source_url` or
/// `target_url` is not an absolute URL.
fn migrate_one(legacy: LegacyJob, now: Timestamp) -> Result<ComparisonJob, MigrationError> {
    let baseline_url = Url::parse(&legacy.source_url)
        .map_err(|err| MigrationError::LegacyJobInvalid(format!("sourceUrl: {err}")))?;
    let candidate_url = Url::parse(&legacy.target_url)
        .map_err(|err| MigrationError::LegacyJobInvalid(format!("targetUrl: {err}")))?;
    Ok(ComparisonJob {
        id: JobId::new(),
        name: legacy.name.unwrap_or_else(|| legacy.id.clone()),
        description: None,
        baseline_url,
        candidate_url,
        crawl_config: CrawlConfig::default_bounds(),
        page_map: None,
        test_matrix: TestMatrix::all_enabled(),
        status: JobStatus::Pending,
        created_at: now,
        updated_at: now,
        migrated_from: Some(legacy.id),
        snapshot_version: migration_gate_core::CURRENT_SNAPSHOT_VERSION,
    })
}

/// Parses and migrates every entry in a legacy `jobs` JSON array.
///
/// Malformed entries are skipped and described in the returned `skipped`
/// list rather than aborting the whole migration; the rule must be total.
///
/// # Errors
///
/// Returns [`MigrationError::LegacyJobsNotAnArray`] when `raw_jobs` is not a
/// JSON array.
pub fn migrate_legacy_jobs(
    raw_jobs: &serde_json::Value,
    now: Timestamp,
) -> Result<(Vec<ComparisonJob>, Vec<String>), MigrationError> {
    let entries = raw_jobs
        .as_array()
        .ok_or(MigrationError::LegacyJobsNotAnArray)?;

    let mut migrated = Vec::with_capacity(entries.len());
    let mut skipped = Vec::new();

    for entry in entries {
        let legacy: LegacyJob = match serde_json::from_value(entry.clone()) {
            Ok(legacy) => legacy,
            Err(err) => {
                skipped.push(format!("unparseable legacy job: {err}"));
                continue;
            }
        };
        let legacy_id = legacy.id.clone();
        match migrate_one(legacy, now) {
            Ok(job) => migrated.push(job),
            Err(err) => skipped.push(format!("job {legacy_id}: {err}")),
        }
    }

    Ok((migrated, skipped))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, reason = "test-only assertions")]
mod tests {
    use super::*;
    use serde_json::json;

    fn ts() -> Timestamp {
        Timestamp::parse("2026-01-01T00:00:00Z").unwrap()
    }

    #[test]
    fn migrates_a_well_formed_legacy_job() {
        let raw = json!([
            {"id": "j1", "sourceUrl": "https://a.test", "targetUrl": "https://b.test"}
        ]);
        let (migrated, skipped) = migrate_legacy_jobs(&raw, ts()).unwrap();
        assert!(skipped.is_empty());
        assert_eq!(migrated.len(), 1);
        let job = &migrated[0];
        assert_eq!(job.baseline_url.as_str(), "https://a.test/");
        assert_eq!(job.candidate_url.as_str(), "https://b.test/");
        assert_eq!(job.migrated_from.as_deref(), Some("j1"));
        assert_eq!(job.crawl_config.depth, 1);
        assert_eq!(job.crawl_config.max_pages, 10);
        assert!(job.test_matrix.visual && job.test_matrix.seo);
    }

    #[test]
    fn skips_malformed_entries_without_aborting() {
        let raw = json!([
            {"id": "j1", "sourceUrl": "not-a-url", "targetUrl": "https://b.test"},
            {"id": "j2", "sourceUrl": "https://a.test", "targetUrl": "https://b.test"},
        ]);
        let (migrated, skipped) = migrate_legacy_jobs(&raw, ts()).unwrap();
        assert_eq!(migrated.len(), 1);
        assert_eq!(skipped.len(), 1);
    }

    #[test]
    fn rejects_a_non_array_jobs_value() {
        let raw = json!({"not": "an array"});
        assert!(migrate_legacy_jobs(&raw, ts()).is_err());
    }
}
