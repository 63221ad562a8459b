// crates/migration-gate-core/src/lib.rs
// ============================================================================
// Crate: migration-gate-core
// Description: Data model, identifiers, and capability traits shared by every
// other crate in the workspace.
// ============================================================================

//! Data model, time, identifiers, and capability traits for the migration
//! comparison pipeline. This crate has no knowledge of HTTP, the filesystem,
//! or any concrete browser/LLM backend; it only defines the shapes those
//! things must produce and consume.

pub mod core;
pub mod errors;
pub mod interfaces;

pub use core::analysis::CategoryAnalysis;
pub use core::analysis::ComparisonReport;
pub use core::analysis::DataIntegritySummary;
pub use core::analysis::DiffCategory;
pub use core::analysis::DiffSummaryInput;
pub use core::analysis::ExecutiveSummary;
pub use core::analysis::FunctionalSummary;
pub use core::analysis::GoNoGo;
pub use core::analysis::OverallAnalysis;
pub use core::analysis::ReasoningAnalysis;
pub use core::analysis::ReportKeyMetrics;
pub use core::analysis::RiskScore;
pub use core::analysis::Severity;
pub use core::analysis::StageSlot;
pub use core::analysis::TechnicalFinding;
pub use core::analysis::VisualSummary;
pub use core::identifiers::ArtifactId;
pub use core::identifiers::JobId;
pub use core::identifiers::RunId;
pub use core::job::ComparisonJob;
pub use core::job::CrawlConfig;
pub use core::job::JobStatus;
pub use core::job::PageMap;
pub use core::job::PageMapEntry;
pub use core::job::TestMatrix;
pub use core::matched_page::MatchReason;
pub use core::matched_page::MatchedPage;
pub use core::matched_page::PageDescriptor;
pub use core::run::ArtifactKind;
pub use core::run::Run;
pub use core::run::RunArtifact;
pub use core::run::RunStatus;
pub use core::snapshot::CURRENT_SNAPSHOT_VERSION;
pub use core::snapshot::SnapshotMetadata;
pub use core::snapshot::StorageSnapshot;
pub use core::time::Timestamp;
pub use errors::CoreError;
pub use interfaces::BrowserContextId;
pub use interfaces::BrowserDriver;
pub use interfaces::BrowserError;
pub use interfaces::ConsoleMessage;
pub use interfaces::DomSnapshot;
pub use interfaces::FormField;
pub use interfaces::FormSubmission;
pub use interfaces::NavigationOutcome;
pub use interfaces::NetworkEvent;
pub use interfaces::Reasoner;
pub use interfaces::ReasoningError;
pub use interfaces::StageIssue;
pub use interfaces::StageReport;
pub use interfaces::StageSeverity;
pub use interfaces::Viewport;
