// crates/migration-gate-core/src/core/job.rs
// ============================================================================
// Module: Comparison Job
// Description: User-declared migration comparison intent and its value types.
// Purpose: Model the job a run executes against, independent of run history.
// Dependencies: crate::core::{identifiers, time}, serde, url
// ============================================================================

//! ## Overview
//! A `ComparisonJob` is the durable configuration describing what to compare
//! and how. It is mutable until deleted; deleting it cascades to its runs.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use url::Url;

use crate::core::identifiers::JobId;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Crawl Configuration
// ============================================================================

/// Bounds and filters for the crawl stage.
///
/// # Invariants
/// - `max_pages` is at least 1.
/// - Exclude patterns take precedence over include patterns.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CrawlConfig {
    /// Maximum BFS depth from the seed URL. 0 means only the seed page.
    pub depth: u32,
    /// Glob-style allow-list over URL paths. Empty means no restriction.
    #[serde(default)]
    pub include_patterns: Vec<String>,
    /// Glob-style deny-list over URL paths, checked before include patterns.
    #[serde(default)]
    pub exclude_patterns: Vec<String>,
    /// Maximum number of pages to crawl per site.
    pub max_pages: u32,
    /// Whether external-origin links are followed as frontier entries.
    #[serde(default)]
    pub follow_external: bool,
}

impl CrawlConfig {
    /// Returns the default crawl bounds used when a job omits one.
    #[must_use]
    pub fn default_bounds() -> Self {
        Self {
            depth: 1,
            include_patterns: Vec::new(),
            exclude_patterns: Vec::new(),
            max_pages: 10,
            follow_external: false,
        }
    }
}

// ============================================================================
// SECTION: Page Map
// ============================================================================

/// One explicit baseline/candidate path pairing supplied by a user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageMapEntry {
    /// Path on the baseline site, e.g. `/about`.
    pub baseline_path: String,
    /// Path on the candidate site.
    pub candidate_path: String,
    /// Free-form note explaining the pairing.
    #[serde(default)]
    pub notes: Option<String>,
}

/// Ordered sequence of explicit page pairings overriding automatic matching.
///
/// # Invariants
/// - Every listed pair is treated as a confidence-1.0 match ahead of any
///   automatic rule.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PageMap {
    /// Explicit pairings, in declaration order.
    pub entries: Vec<PageMapEntry>,
}

// ============================================================================
// SECTION: Test Matrix
// ============================================================================

/// Selects which diff stages run for a job.
///
/// # Invariants
/// - `seo` is a reserved slot; no stage currently consumes it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TestMatrix {
    /// Run the visual diff stage.
    pub visual: bool,
    /// Run the functional QA stage.
    pub functional: bool,
    /// Run the data integrity stage.
    pub data: bool,
    /// Reserved SEO stage slot; currently unused.
    pub seo: bool,
}

impl TestMatrix {
    /// Returns a matrix with every stage enabled.
    #[must_use]
    pub const fn all_enabled() -> Self {
        Self {
            visual: true,
            functional: true,
            data: true,
            seo: true,
        }
    }
}

impl Default for TestMatrix {
    fn default() -> Self {
        Self::all_enabled()
    }
}

// ============================================================================
// SECTION: Job Status
// ============================================================================

/// Job lifecycle status.
///
/// # Invariants
/// - Variants are stable for serialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    /// Created, never run.
    Pending,
    /// At least one run is in progress or has run.
    Active,
    /// Terminal success state set by an external process; the core never
    /// assigns this automatically from run outcomes.
    Completed,
    /// Terminal failure state set by an external process.
    Failed,
}

// ============================================================================
// SECTION: Comparison Job
// ============================================================================

/// The user-declared intent: what to compare, and how.
///
/// # Invariants
/// - `baseline_url` and `candidate_url` are both absolute and not equal.
/// - `created_at` never changes after creation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonJob {
    /// Stable identifier.
    pub id: JobId,
    /// Human-readable name.
    pub name: String,
    /// Optional free-form description.
    #[serde(default)]
    pub description: Option<String>,
    /// Production site URL.
    pub baseline_url: Url,
    /// Migrated site URL under evaluation.
    pub candidate_url: Url,
    /// Crawl bounds and filters.
    pub crawl_config: CrawlConfig,
    /// Optional explicit page pairing overrides.
    #[serde(default)]
    pub page_map: Option<PageMap>,
    /// Diff stage selector.
    pub test_matrix: TestMatrix,
    /// Lifecycle status.
    pub status: JobStatus,
    /// Creation timestamp.
    pub created_at: Timestamp,
    /// Last-update timestamp.
    pub updated_at: Timestamp,
    /// Identifier of the legacy job this was migrated from, if any.
    #[serde(default)]
    pub migrated_from: Option<String>,
    /// Snapshot-format version this job was last written at.
    pub snapshot_version: u32,
}

impl ComparisonJob {
    /// Returns whether the baseline/candidate pair satisfies the job's
    /// steady-state URL invariant.
    #[must_use]
    pub fn urls_are_valid(&self) -> bool {
        self.baseline_url != self.candidate_url
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_crawl_bounds_match_the_documented_defaults() {
        let bounds = CrawlConfig::default_bounds();
        assert_eq!(bounds.depth, 1);
        assert_eq!(bounds.max_pages, 10);
        assert!(!bounds.follow_external);
    }

    #[test]
    fn default_test_matrix_enables_every_stage() {
        let matrix = TestMatrix::default();
        assert!(matrix.visual && matrix.functional && matrix.data && matrix.seo);
    }

    #[test]
    fn urls_are_valid_rejects_equal_pair() {
        let job = ComparisonJob {
            id: JobId::new(),
            name: "dup".into(),
            description: None,
            baseline_url: Url::parse("https://a.test").unwrap(),
            candidate_url: Url::parse("https://a.test").unwrap(),
            crawl_config: CrawlConfig::default_bounds(),
            page_map: None,
            test_matrix: TestMatrix::default(),
            status: JobStatus::Pending,
            created_at: Timestamp::parse("1970-01-01T00:00:00Z").unwrap(),
            updated_at: Timestamp::parse("1970-01-01T00:00:00Z").unwrap(),
            migrated_from: None,
            snapshot_version: 1,
        };
        assert!(!job.urls_are_valid());
    }
}
