// crates/migration-gate-providers/src/rule_based.rs
// ============================================================================
// Module: Rule-Based Reasoner
// Description: Deterministic severity classification from diff summary
// thresholds, used when no LLM is configured or the LLM reasoner fails.
// Purpose: Guarantee reasoning always produces the shared output shape.
// Dependencies: migration-gate-core, async-trait
// ============================================================================

//! ## Overview
//! Every threshold here is a fixed constant rather than configuration,
//! mirroring the source's documented behavior. Confidence is a constant in
//! `[0.7, 0.8]`, reflecting that a threshold rule is never as confident as a
//! model that actually read the evidence.

// ============================================================================
// SECTION: Imports
// ============================================================================

use async_trait::async_trait;
use migration_gate_core::CategoryAnalysis;
use migration_gate_core::DiffCategory;
use migration_gate_core::DiffSummaryInput;
use migration_gate_core::OverallAnalysis;
use migration_gate_core::Reasoner;
use migration_gate_core::ReasoningAnalysis;
use migration_gate_core::ReasoningError;
use migration_gate_core::Severity;
use migration_gate_core::StageSlot;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Confidence assigned to every category and overall verdict.
const RULE_BASED_CONFIDENCE: f64 = 0.75;

// ============================================================================
// SECTION: Category Rules
// ============================================================================

fn visual_severity(summary: &migration_gate_core::core::analysis::VisualSummary) -> Severity {
    if summary.severity_counts[Severity::Critical as usize] > 0 {
        return Severity::Critical;
    }
    match summary.average_diff_percent {
        p if p > 30.0 => Severity::High,
        p if p > 10.0 => Severity::Medium,
        p if p > 5.0 => Severity::Low,
        _ => Severity::None,
    }
}

fn functional_severity(
    summary: &migration_gate_core::core::analysis::FunctionalSummary,
) -> Severity {
    let total = summary.total_broken_links + summary.total_js_errors;
    match total {
        0 => Severity::None,
        1..=4 => Severity::Low,
        5..=9 => Severity::Medium,
        10..=19 => Severity::High,
        _ => Severity::Critical,
    }
}

fn data_severity(summary: &migration_gate_core::core::analysis::DataIntegritySummary) -> Severity {
    if summary.critical_mismatches > 0 || summary.total_field_diffs >= 50 {
        Severity::High
    } else if summary.total_field_diffs >= 20 {
        Severity::Medium
    } else {
        Severity::None
    }
}

fn category_analysis(category: DiffCategory, severity: Severity, explanation: String) -> CategoryAnalysis {
    CategoryAnalysis {
        category,
        severity,
        confidence: RULE_BASED_CONFIDENCE,
        pass: severity <= Severity::Low,
        explanation,
        key_findings: Vec::new(),
        false_positives: Vec::new(),
        expected_changes: Vec::new(),
    }
}

// ============================================================================
// SECTION: Reasoner
// ============================================================================

/// Deterministic severity classification from the diff summary's counts and
/// averages. Always succeeds; never calls out to any external service.
#[derive(Debug, Clone, Copy, Default)]
pub struct RuleBasedReasoner;

#[async_trait]
impl Reasoner for RuleBasedReasoner {
    async fn analyze(&self, input: &DiffSummaryInput) -> Result<ReasoningAnalysis, ReasoningError> {
        let mut categories = Vec::new();

        if let StageSlot::Available(visual) = &input.visual {
            categories.push(category_analysis(
                DiffCategory::Visual,
                visual_severity(visual),
                format!(
                    "{} page(s) with visual diffs, average diff {:.1}%",
                    visual.pages_with_diffs, visual.average_diff_percent
                ),
            ));
        }
        if let StageSlot::Available(functional) = &input.functional {
            categories.push(category_analysis(
                DiffCategory::Functional,
                functional_severity(functional),
                format!(
                    "{} broken link(s), {} JS error(s)",
                    functional.total_broken_links, functional.total_js_errors
                ),
            ));
        }
        if let StageSlot::Available(data) = &input.data {
            categories.push(category_analysis(
                DiffCategory::Data,
                data_severity(data),
                format!(
                    "{} field diff(s), {} critical mismatch(es)",
                    data.total_field_diffs, data.critical_mismatches
                ),
            ));
        }

        let overall_severity = categories
            .iter()
            .map(|category| category.severity)
            .max()
            .unwrap_or(Severity::None);
        let overall_pass = categories.iter().all(|category| category.pass);

        Ok(ReasoningAnalysis {
            categories,
            overall: OverallAnalysis {
                severity: overall_severity,
                confidence: RULE_BASED_CONFIDENCE,
                pass: overall_pass,
                explanation: format!("overall severity {overall_severity:?} by threshold rule"),
                recommendations: Vec::new(),
            },
        })
    }
}
