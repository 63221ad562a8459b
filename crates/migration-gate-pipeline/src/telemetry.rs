// crates/migration-gate-pipeline/src/telemetry.rs
// ============================================================================
// Module: Orchestrator Telemetry
// Description: Observability hooks for run and stage lifecycle events.
// Purpose: Provide metric events without a hard logging-crate dependency.
// Dependencies: migration-gate-core
// ============================================================================

//! ## Overview
//! This module exposes a thin metrics interface for stage and run counters
//! and latency observations. It is intentionally dependency-light so a
//! deployment can plug in Prometheus or OpenTelemetry without redesign. The
//! primary observability mechanism for *failures* is not this trait but the
//! log artifact every stage issue is committed as; this trait covers the
//! cross-cutting counters a dashboard would want.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use migration_gate_core::RunStatus;

// ============================================================================
// SECTION: Metric Labels
// ============================================================================

/// Pipeline stage classification for telemetry labeling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageName {
    /// Crawl and page-matching stage.
    Crawl,
    /// Capture stage.
    Capture,
    /// Visual diff stage.
    Visual,
    /// Functional QA stage.
    Functional,
    /// Data integrity stage.
    Data,
    /// Reasoning stage.
    Reasoning,
    /// Report synthesis stage.
    Report,
}

impl StageName {
    /// Returns a stable label for the stage.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Crawl => "crawl",
            Self::Capture => "capture",
            Self::Visual => "visual",
            Self::Functional => "functional",
            Self::Data => "data",
            Self::Reasoning => "reasoning",
            Self::Report => "report",
        }
    }
}

/// A single stage-completion event.
#[derive(Debug, Clone)]
pub struct StageEvent {
    /// Stage that completed.
    pub stage: StageName,
    /// Whether the stage produced output without an issue.
    pub succeeded: bool,
}

/// A single run-completion event.
#[derive(Debug, Clone)]
pub struct RunEvent {
    /// Terminal status the run reached.
    pub status: RunStatus,
}

// ============================================================================
// SECTION: Trait
// ============================================================================

/// Metrics sink for orchestrator and stage lifecycle events.
pub trait OrchestratorMetrics: Send + Sync {
    /// Records a stage completing, successfully or not.
    fn record_stage(&self, event: StageEvent);
    /// Records a stage's wall-clock duration.
    fn record_stage_latency(&self, stage: StageName, latency: Duration);
    /// Records a run reaching a terminal state.
    fn record_run(&self, event: RunEvent);
}

/// No-op metrics sink, the default when no sink is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct NoopMetrics;

impl OrchestratorMetrics for NoopMetrics {
    fn record_stage(&self, _event: StageEvent) {}
    fn record_stage_latency(&self, _stage: StageName, _latency: Duration) {}
    fn record_run(&self, _event: RunEvent) {}
}
