// crates/migration-gate-core/src/core/analysis.rs
// ============================================================================
// Module: Diff Summaries, Reasoning, and Report Value Types
// Description: The shapes passed from the diff stages into reasoning, and
// from reasoning into the report synthesizer.
// Purpose: Give every Reasoner implementation and the report stage one fixed
// contract to produce and consume.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! The three middle diff stages each produce a per-run summary. Reasoning
//! consumes all three (any of which may be `Unavailable` when its stage
//! failed non-fatally) and produces a severity-tagged analysis. The report
//! stage turns that analysis, plus the raw diff summaries, into a risk score
//! and a Go/No-Go recommendation.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Severity
// ============================================================================

/// Five-level classification used by diff and reasoning outputs.
///
/// # Invariants
/// - Ordered from least to most severe; `Ord` reflects that order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    /// No detected issue.
    None,
    /// Minor, likely cosmetic issue.
    Low,
    /// Noticeable issue.
    Medium,
    /// Significant issue.
    High,
    /// Blocking issue.
    Critical,
}

impl Severity {
    /// Maps severity to the 0/25/50/75/100 risk-score scale.
    #[must_use]
    pub const fn risk_score(self) -> u8 {
        match self {
            Self::None => 0,
            Self::Low => 25,
            Self::Medium => 50,
            Self::High => 75,
            Self::Critical => 100,
        }
    }
}

// ============================================================================
// SECTION: Stage Slot
// ============================================================================

/// A diff stage's contribution to the reasoning input: either its summary,
/// or a marker that the stage failed non-fatally and was skipped.
///
/// # Invariants
/// - `Unavailable` is produced only when the owning stage recorded a
///   `StageTransient` error.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum StageSlot<T> {
    /// The stage ran and produced a summary.
    Available(T),
    /// The stage failed non-fatally; its slot carries no data.
    Unavailable,
}

impl<T> StageSlot<T> {
    /// Returns the summary, if the slot is available.
    #[must_use]
    pub const fn as_available(&self) -> Option<&T> {
        match self {
            Self::Available(value) => Some(value),
            Self::Unavailable => None,
        }
    }
}

// ============================================================================
// SECTION: Diff Summaries
// ============================================================================

/// Per-run summary the visual diff stage hands to reasoning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VisualSummary {
    /// Pages with at least one non-zero diff.
    pub pages_with_diffs: u32,
    /// Count of pages at each severity level (indices match `Severity`'s
    /// declaration order).
    pub severity_counts: [u32; 5],
    /// Average diff percentage across all compared pairs.
    pub average_diff_percent: f64,
}

/// Per-run summary the functional QA stage hands to reasoning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FunctionalSummary {
    /// Pages with a navigation issue on either side.
    pub pages_with_navigation_issues: u32,
    /// Pages with at least one form submission issue.
    pub pages_with_form_issues: u32,
    /// Total broken links detected across both sides.
    pub total_broken_links: u32,
    /// Total JS errors observed across both sides.
    pub total_js_errors: u32,
    /// Pages with at least one JS error.
    pub pages_with_js_errors: u32,
}

/// Per-run summary the data integrity stage hands to reasoning.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DataIntegritySummary {
    /// Pages whose status is `mismatch`.
    pub pages_with_mismatches: u32,
    /// Pages missing data on one side entirely.
    pub missing_data_pages: u32,
    /// Total field-level diffs across all compared pages.
    pub total_field_diffs: u32,
    /// Field diffs classified as critical (e.g. price or JSON value changes).
    pub critical_mismatches: u32,
}

/// The compact, three-category summary reasoning consumes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DiffSummaryInput {
    /// Visual diff stage output, if it ran.
    pub visual: StageSlot<VisualSummary>,
    /// Functional QA stage output, if it ran.
    pub functional: StageSlot<FunctionalSummary>,
    /// Data integrity stage output, if it ran.
    pub data: StageSlot<DataIntegritySummary>,
}

// ============================================================================
// SECTION: Reasoning Output
// ============================================================================

/// Diff category a `CategoryAnalysis` applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DiffCategory {
    /// Visual diff stage.
    Visual,
    /// Functional QA stage.
    Functional,
    /// Data integrity stage.
    Data,
}

/// Reasoning's per-category verdict.
///
/// # Invariants
/// - `confidence` is in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CategoryAnalysis {
    /// Category this verdict covers.
    pub category: DiffCategory,
    /// Severity assessed for this category.
    pub severity: Severity,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
    /// Whether this category passes.
    pub pass: bool,
    /// Human-readable explanation.
    pub explanation: String,
    /// Notable findings supporting the verdict.
    #[serde(default)]
    pub key_findings: Vec<String>,
    /// Findings judged likely false positives.
    #[serde(default)]
    pub false_positives: Vec<String>,
    /// Findings judged expected/benign migration changes.
    #[serde(default)]
    pub expected_changes: Vec<String>,
}

/// Reasoning's overall verdict across all present categories.
///
/// # Invariants
/// - `confidence` is in `[0, 1]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OverallAnalysis {
    /// Overall severity.
    pub severity: Severity,
    /// Confidence in `[0, 1]`.
    pub confidence: f64,
    /// Whether the run passes overall.
    pub pass: bool,
    /// Human-readable explanation.
    pub explanation: String,
    /// Suggested next steps.
    #[serde(default)]
    pub recommendations: Vec<String>,
}

/// Full reasoning output: every implementation must produce this shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReasoningAnalysis {
    /// One entry per category present in the input.
    pub categories: Vec<CategoryAnalysis>,
    /// Overall verdict.
    pub overall: OverallAnalysis,
}

// ============================================================================
// SECTION: Report
// ============================================================================

/// Per-category and overall risk score on a 0–100 scale.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RiskScore {
    /// Per-category scores, present for categories reasoning covered.
    pub per_category: Vec<(DiffCategory, u8)>,
    /// Mean across present categories.
    pub overall: u8,
}

/// One technical finding surfaced for a failing category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TechnicalFinding {
    /// Short title.
    pub title: String,
    /// Severity of the finding.
    pub severity: Severity,
    /// Plain-language description of the impact.
    pub impact: String,
    /// Suggested remediation.
    pub recommendation: String,
    /// Affected page paths.
    pub affected_pages: Vec<String>,
    /// Supporting evidence description (e.g. an artifact reference).
    pub evidence: String,
}

/// Deployment recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GoNoGo {
    /// Safe to cut over.
    Go,
    /// Conditional on review of findings.
    Conditional,
    /// Not safe to cut over.
    NoGo,
}

/// Key metrics surfaced in the executive summary.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ReportKeyMetrics {
    /// Number of matched pages evaluated.
    pub pages_tested: u32,
    /// Total issues found across categories.
    pub issues_found: u32,
    /// Count of critical-severity issues.
    pub critical_issues: u32,
    /// Fraction of pages with no issues, in `[0, 1]`.
    pub pass_rate: f64,
}

/// The executive-facing rollup of a run's report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExecutiveSummary {
    /// Key metrics.
    pub key_metrics: ReportKeyMetrics,
    /// Deployment recommendation.
    pub go_no_go: GoNoGo,
    /// Short human-readable paragraph derived from the totals.
    pub narrative: String,
}

/// The full synthesized report.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ComparisonReport {
    /// Risk score.
    pub risk: RiskScore,
    /// Technical findings, one per failing category.
    pub findings: Vec<TechnicalFinding>,
    /// Executive summary.
    pub executive_summary: ExecutiveSummary,
    /// The reasoning analysis the report was derived from.
    pub reasoning: ReasoningAnalysis,
}

impl ComparisonReport {
    /// Computes the Go/No-Go decision per the documented rule: `no-go` when
    /// overall risk is at least 75 or reasoning's overall pass is false;
    /// `go` when overall risk is under 50 and there is no critical finding;
    /// `conditional` otherwise.
    #[must_use]
    pub fn go_no_go_for(overall_risk: u8, reasoning_pass: bool, has_critical: bool) -> GoNoGo {
        if overall_risk >= 75 || !reasoning_pass {
            GoNoGo::NoGo
        } else if overall_risk < 50 && !has_critical {
            GoNoGo::Go
        } else {
            GoNoGo::Conditional
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn severity_risk_scores_follow_the_documented_scale() {
        assert_eq!(Severity::None.risk_score(), 0);
        assert_eq!(Severity::Low.risk_score(), 25);
        assert_eq!(Severity::Medium.risk_score(), 50);
        assert_eq!(Severity::High.risk_score(), 75);
        assert_eq!(Severity::Critical.risk_score(), 100);
    }

    #[test]
    fn go_no_go_is_no_go_when_overall_risk_at_least_75() {
        assert_eq!(
            ComparisonReport::go_no_go_for(75, true, false),
            GoNoGo::NoGo
        );
    }

    #[test]
    fn go_no_go_is_no_go_when_reasoning_fails_regardless_of_score() {
        assert_eq!(ComparisonReport::go_no_go_for(10, false, false), GoNoGo::NoGo);
    }

    #[test]
    fn go_no_go_is_go_only_under_50_and_without_critical_findings() {
        assert_eq!(ComparisonReport::go_no_go_for(49, true, false), GoNoGo::Go);
        assert_eq!(
            ComparisonReport::go_no_go_for(49, true, true),
            GoNoGo::Conditional
        );
    }

    #[test]
    fn stage_slot_as_available_reflects_variant() {
        let available = StageSlot::Available(42);
        let unavailable: StageSlot<i32> = StageSlot::Unavailable;
        assert_eq!(available.as_available(), Some(&42));
        assert_eq!(unavailable.as_available(), None);
    }
}
