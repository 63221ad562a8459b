// crates/migration-gate-pipeline/src/stages/report.rs
// ============================================================================
// Module: Report Synthesis Stage
// Description: Turns a ReasoningAnalysis plus the raw diff summaries into a
// risk score, technical findings, and an executive summary.
// Purpose: Produce the run's final JSON and Markdown report documents.
// Dependencies: migration-gate-core
// ============================================================================

//! ## Overview
//! Report failure is fatal, but the synthesis itself is a pure function of
//! its inputs — there is no I/O here beyond what the caller does with the
//! returned [`ComparisonReport`], so the only failure mode this stage
//! reports is malformed input, which should not occur given a well-formed
//! `ReasoningAnalysis`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use migration_gate_core::CategoryAnalysis;
use migration_gate_core::ComparisonReport;
use migration_gate_core::DiffCategory;
use migration_gate_core::ExecutiveSummary;
use migration_gate_core::GoNoGo;
use migration_gate_core::ReasoningAnalysis;
use migration_gate_core::ReportKeyMetrics;
use migration_gate_core::RiskScore;
use migration_gate_core::Severity;
use migration_gate_core::TechnicalFinding;

fn category_label(category: DiffCategory) -> &'static str {
    match category {
        DiffCategory::Visual => "Visual",
        DiffCategory::Functional => "Functional",
        DiffCategory::Data => "Data Integrity",
    }
}

fn risk_score(analysis: &ReasoningAnalysis) -> RiskScore {
    let per_category: Vec<(DiffCategory, u8)> = analysis
        .categories
        .iter()
        .map(|category| (category.category, category.severity.risk_score()))
        .collect();
    let overall = if per_category.is_empty() {
        0
    } else {
        (per_category.iter().map(|(_, score)| u32::from(*score)).sum::<u32>() / per_category.len() as u32) as u8
    };
    RiskScore { per_category, overall }
}

fn technical_finding(category: &CategoryAnalysis) -> TechnicalFinding {
    TechnicalFinding {
        title: format!("{} regression detected", category_label(category.category)),
        severity: category.severity,
        impact: category.explanation.clone(),
        recommendation: category
            .expected_changes
            .first()
            .cloned()
            .unwrap_or_else(|| "Review the findings and confirm intent before cutover.".into()),
        affected_pages: category.key_findings.clone(),
        evidence: format!("{:?} stage analysis, confidence {:.2}", category.category, category.confidence),
    }
}

fn narrative(metrics: &ReportKeyMetrics, go_no_go: GoNoGo) -> String {
    let decision = match go_no_go {
        GoNoGo::Go => "is ready to proceed",
        GoNoGo::Conditional => "requires review before proceeding",
        GoNoGo::NoGo => "is not ready to proceed",
    };
    format!(
        "Tested {} pages, found {} issues ({} critical). This migration {decision}.",
        metrics.pages_tested, metrics.issues_found, metrics.critical_issues
    )
}

/// Synthesizes the full report from a reasoning analysis and the basic
/// run-level counts the orchestrator already has on hand.
#[must_use]
pub fn synthesize(analysis: ReasoningAnalysis, pages_tested: u32) -> ComparisonReport {
    let risk = risk_score(&analysis);
    let findings: Vec<TechnicalFinding> = analysis
        .categories
        .iter()
        .filter(|category| !category.pass)
        .map(technical_finding)
        .collect();

    let critical_issues = analysis
        .categories
        .iter()
        .filter(|category| category.severity == Severity::Critical)
        .count() as u32;
    let issues_found = findings.len() as u32;
    let passing_pages = if pages_tested == 0 {
        0
    } else {
        pages_tested.saturating_sub(issues_found.min(pages_tested))
    };
    let pass_rate = if pages_tested == 0 {
        1.0
    } else {
        f64::from(passing_pages) / f64::from(pages_tested)
    };

    let has_critical = critical_issues > 0;
    let go_no_go = ComparisonReport::go_no_go_for(risk.overall, analysis.overall.pass, has_critical);

    let key_metrics = ReportKeyMetrics {
        pages_tested,
        issues_found,
        critical_issues,
        pass_rate,
    };
    let executive_summary = ExecutiveSummary {
        narrative: narrative(&key_metrics, go_no_go),
        key_metrics,
        go_no_go,
    };

    ComparisonReport {
        risk,
        findings,
        executive_summary,
        reasoning: analysis,
    }
}

/// Renders the report as a short Markdown document, the sibling of the JSON
/// artifact under `data/artifacts/{runId}/reports/`.
#[must_use]
pub fn render_markdown(report: &ComparisonReport) -> String {
    let mut out = String::new();
    out.push_str("# Migration Comparison Report\n\n");
    out.push_str(&format!(
        "**Go/No-Go:** {:?}\n\n**Overall risk:** {}/100\n\n",
        report.executive_summary.go_no_go, report.risk.overall
    ));
    out.push_str(&format!("{}\n\n", report.executive_summary.narrative));
    out.push_str("## Findings\n\n");
    if report.findings.is_empty() {
        out.push_str("No failing categories.\n");
    }
    for finding in &report.findings {
        out.push_str(&format!(
            "- **{}** ({:?}): {}\n",
            finding.title, finding.severity, finding.impact
        ));
    }
    out
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, reason = "test-only assertions")]
mod tests {
    use super::*;
    use migration_gate_core::OverallAnalysis;

    fn category(category: DiffCategory, severity: Severity, pass: bool) -> CategoryAnalysis {
        CategoryAnalysis {
            category,
            severity,
            confidence: 0.8,
            pass,
            explanation: "explanation".into(),
            key_findings: vec!["/page".into()],
            false_positives: Vec::new(),
            expected_changes: Vec::new(),
        }
    }

    #[test]
    fn risk_score_is_mean_across_present_categories() {
        let analysis = ReasoningAnalysis {
            categories: vec![
                category(DiffCategory::Visual, Severity::Low, true),
                category(DiffCategory::Functional, Severity::High, false),
            ],
            overall: OverallAnalysis {
                severity: Severity::High,
                confidence: 0.8,
                pass: false,
                explanation: "x".into(),
                recommendations: Vec::new(),
            },
        };
        let report = synthesize(analysis, 10);
        assert_eq!(report.risk.overall, 50);
        assert_eq!(report.findings.len(), 1);
    }

    #[test]
    fn go_no_go_is_no_go_when_reasoning_overall_fails() {
        let analysis = ReasoningAnalysis {
            categories: vec![category(DiffCategory::Visual, Severity::None, true)],
            overall: OverallAnalysis {
                severity: Severity::None,
                confidence: 0.8,
                pass: false,
                explanation: "x".into(),
                recommendations: Vec::new(),
            },
        };
        let report = synthesize(analysis, 5);
        assert_eq!(report.executive_summary.go_no_go, GoNoGo::NoGo);
    }

    #[test]
    fn markdown_render_includes_go_no_go_and_findings() {
        let analysis = ReasoningAnalysis {
            categories: vec![category(DiffCategory::Data, Severity::Critical, false)],
            overall: OverallAnalysis {
                severity: Severity::Critical,
                confidence: 0.9,
                pass: false,
                explanation: "x".into(),
                recommendations: Vec::new(),
            },
        };
        let report = synthesize(analysis, 3);
        let markdown = render_markdown(&report);
        assert!(markdown.contains("Go/No-Go"));
        assert!(markdown.contains("regression detected"));
    }
}
