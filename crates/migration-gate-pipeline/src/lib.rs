// crates/migration-gate-pipeline/src/lib.rs
// ============================================================================
// Crate: migration-gate-pipeline
// Description: Job CRUD mediation, the run orchestrator, and the seven
// comparison-pipeline stages (crawl, capture, visual, functional, data
// integrity, reasoning, report).
// ============================================================================

//! Everything between a `ComparisonJob` and a finished `ComparisonReport`:
//! job validation and cascade delete, the fixed stage order a run is driven
//! through, and the stage implementations themselves.

pub mod job_service;
pub mod orchestrator;
pub mod stages;
pub mod telemetry;

pub use job_service::CreateJobRequest;
pub use job_service::JobService;
pub use job_service::UpdateJobRequest;
pub use orchestrator::CancellationToken;
pub use orchestrator::ConcurrencyLimits;
pub use orchestrator::Orchestrator;
pub use orchestrator::OrchestratorConfig;
pub use orchestrator::OrchestratorError;
pub use telemetry::NoopMetrics;
pub use telemetry::OrchestratorMetrics;
pub use telemetry::RunEvent;
pub use telemetry::StageEvent;
pub use telemetry::StageName;
