// crates/migration-gate-pipeline/src/stages/reasoning.rs
// ============================================================================
// Module: Reasoning Stage
// Description: Wraps a Reasoner, falling back to the deterministic rule-based
// analyzer whenever the configured reasoner fails.
// Purpose: Guarantee reasoning always produces an analysis, never a fatal
// stage error, per the documented fallback rule.
// Dependencies: migration-gate-core, migration-gate-providers
// ============================================================================

//! ## Overview
//! Reasoning failure is explicitly documented to fall back rather than fail
//! the run, so this stage never returns a fatal [`StageReport`]: a primary
//! reasoner error is logged and the rule-based fallback is used in its
//! place.

// ============================================================================
// SECTION: Imports
// ============================================================================

use migration_gate_core::DiffSummaryInput;
use migration_gate_core::Reasoner;
use migration_gate_core::ReasoningAnalysis;
use migration_gate_core::StageReport;
use migration_gate_providers::RuleBasedReasoner;

/// Runs `primary` against `input`, falling back to the deterministic
/// rule-based analyzer if it errors. Always succeeds.
pub async fn reason(primary: &dyn Reasoner, input: &DiffSummaryInput) -> StageReport<ReasoningAnalysis> {
    match primary.analyze(input).await {
        Ok(analysis) => StageReport::ok(analysis),
        Err(_) => {
            let fallback = RuleBasedReasoner;
            match fallback.analyze(input).await {
                Ok(analysis) => StageReport::ok(analysis),
                Err(err) => StageReport::transient("reasoning", err.to_string()),
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, reason = "test-only assertions")]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use migration_gate_core::ReasoningError;
    use migration_gate_core::StageSlot;

    struct AlwaysFails;

    #[async_trait]
    impl Reasoner for AlwaysFails {
        async fn analyze(&self, _input: &DiffSummaryInput) -> Result<ReasoningAnalysis, ReasoningError> {
            Err(ReasoningError::ProviderRequest("boom".into()))
        }
    }

    fn empty_input() -> DiffSummaryInput {
        DiffSummaryInput {
            visual: StageSlot::Unavailable,
            functional: StageSlot::Unavailable,
            data: StageSlot::Unavailable,
        }
    }

    #[tokio::test]
    async fn falls_back_to_rule_based_when_primary_errors() {
        let report = reason(&AlwaysFails, &empty_input()).await;
        assert!(report.output.is_some());
        assert!(!report.is_fatal());
    }

    #[tokio::test]
    async fn uses_primary_result_when_it_succeeds() {
        let report = reason(&RuleBasedReasoner, &empty_input()).await;
        assert!(report.output.is_some());
    }
}
