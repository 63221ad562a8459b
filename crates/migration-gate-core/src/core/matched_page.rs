// crates/migration-gate-core/src/core/matched_page.rs
// ============================================================================
// Module: Matched Page
// Description: A baseline/candidate page pairing produced by the crawl stage.
// Purpose: Give later stages a deterministic, serializable pairing to diff.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! A `MatchedPage` is ephemeral within a run but serialized as an artifact so
//! later stages consume the same pairing deterministically, without
//! recomputing the matching algorithm.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Page Descriptor
// ============================================================================

/// A single crawled page on one side of the comparison.
///
/// # Invariants
/// - `path` is normalized per the crawl stage's URL normalization rules.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageDescriptor {
    /// Normalized path, e.g. `/about`.
    pub path: String,
    /// Fully resolved URL the page was fetched at.
    pub url: String,
    /// Page title at fetch time.
    pub title: String,
    /// HTTP status observed during crawl.
    pub status: u16,
    /// A bounded set of metadata tags: `description`, `keywords`,
    /// `og:title`, `og:description`, keyed by tag name.
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    /// Links discovered on the page, as found in the document (not
    /// normalized or deduplicated).
    #[serde(default)]
    pub links: Vec<String>,
}

// ============================================================================
// SECTION: Match Reason
// ============================================================================

/// Why a pairing was produced.
///
/// # Invariants
/// - Variants are stable for serialization and ordered by descending
///   confidence when applied by the matching algorithm.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchReason {
    /// Supplied directly in the job's `PageMap`.
    Explicit,
    /// Exact normalized-path equality across sides.
    Path,
    /// Exact case-insensitive, trimmed title equality across sides.
    Title,
}

impl MatchReason {
    /// Returns the fixed confidence value the matching algorithm assigns to
    /// pairings produced by this reason.
    #[must_use]
    pub const fn confidence(self) -> f64 {
        match self {
            Self::Explicit => 1.0,
            Self::Path => 0.9,
            Self::Title => 0.7,
        }
    }
}

// ============================================================================
// SECTION: Matched Page
// ============================================================================

/// A `(baseline, candidate)` page pair treated as equivalent comparison
/// targets.
///
/// # Invariants
/// - `confidence` is in `[0, 1]` and equals `reason.confidence()` for pairs
///   produced by the automatic matcher (explicit `PageMap` entries also use
///   `1.0`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MatchedPage {
    /// Baseline-side page descriptor.
    pub baseline: PageDescriptor,
    /// Candidate-side page descriptor.
    pub candidate: PageDescriptor,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
    /// Why this pairing was produced.
    pub reason: MatchReason,
}

impl MatchedPage {
    /// Builds a matched pair at `reason`'s canonical confidence.
    #[must_use]
    pub fn new(baseline: PageDescriptor, candidate: PageDescriptor, reason: MatchReason) -> Self {
        Self {
            baseline,
            candidate,
            confidence: reason.confidence(),
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn page(path: &str, title: &str) -> PageDescriptor {
        PageDescriptor {
            path: path.into(),
            url: format!("https://example.test{path}"),
            title: title.into(),
            status: 200,
            metadata: BTreeMap::new(),
            links: Vec::new(),
        }
    }

    #[test]
    fn reason_confidence_matches_the_documented_table() {
        assert_eq!(MatchReason::Explicit.confidence(), 1.0);
        assert_eq!(MatchReason::Path.confidence(), 0.9);
        assert_eq!(MatchReason::Title.confidence(), 0.7);
    }

    #[test]
    fn new_assigns_confidence_from_reason() {
        let matched = MatchedPage::new(page("/a", "A"), page("/a", "A"), MatchReason::Path);
        assert_eq!(matched.confidence, 0.9);
    }
}
