// crates/migration-gate-core/src/interfaces/mod.rs
// ============================================================================
// Module: Migration Gate Interfaces
// Description: Backend-agnostic capability traits consumed by the pipeline.
// Purpose: Define the contract surfaces external collaborators must satisfy.
// Dependencies: crate::core, async-trait
// ============================================================================

//! ## Overview
//! Interfaces define how the pipeline integrates with a real headless
//! browser and a real LLM provider without embedding either's details in the
//! orchestrator or the stages. Implementations must fail closed: an error
//! never panics across this boundary, it is returned as a typed value.

// ============================================================================
// SECTION: Imports
// ============================================================================

use async_trait::async_trait;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use url::Url;
use uuid::Uuid;

use crate::core::analysis::DiffSummaryInput;
use crate::core::analysis::ReasoningAnalysis;
use crate::core::time::Timestamp;

// ============================================================================
// SECTION: Browser Driver
// ============================================================================

/// Opaque handle to a live browser context. Obtained from
/// [`BrowserDriver::open_context`] and valid until passed to
/// [`BrowserDriver::close_context`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct BrowserContextId(Uuid);

impl BrowserContextId {
    /// Mints a new context handle.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for BrowserContextId {
    fn default() -> Self {
        Self::new()
    }
}

/// Fixed viewport presets plus an escape hatch for configuration overrides.
///
/// # Invariants
/// - Width and height are both positive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Viewport {
    /// Human-readable label, e.g. `"desktop"`.
    pub label: &'static str,
    /// Width in CSS pixels.
    pub width: u32,
    /// Height in CSS pixels.
    pub height: u32,
}

impl Viewport {
    /// 1920x1080 desktop preset.
    pub const DESKTOP: Self = Self {
        label: "desktop",
        width: 1920,
        height: 1080,
    };
    /// 768x1024 tablet preset.
    pub const TABLET: Self = Self {
        label: "tablet",
        width: 768,
        height: 1024,
    };
    /// 375x667 mobile preset.
    pub const MOBILE: Self = Self {
        label: "mobile",
        width: 375,
        height: 667,
    };

    /// Returns the three fixed viewports captured by default.
    #[must_use]
    pub const fn default_set() -> [Self; 3] {
        [Self::DESKTOP, Self::TABLET, Self::MOBILE]
    }
}

/// A single console message observed during a page's lifetime.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsoleMessage {
    /// Console method, e.g. `"log"`, `"error"`, `"warn"`.
    pub message_type: String,
    /// Message text.
    pub text: String,
    /// Timestamp the message was observed.
    pub time: Timestamp,
}

/// A single network request/response pair, or a failure in lieu of one.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NetworkEvent {
    /// Request URL.
    pub url: String,
    /// HTTP method.
    pub method: String,
    /// Timestamp the request was issued.
    pub time: Timestamp,
    /// Response status, when the request resolved.
    #[serde(default)]
    pub status: Option<u16>,
    /// Response status text, when the request resolved.
    #[serde(default)]
    pub status_text: Option<String>,
    /// A bounded set of response headers.
    #[serde(default)]
    pub response_headers: Vec<(String, String)>,
    /// Populated when the request never resolved.
    #[serde(default)]
    pub failure: Option<String>,
}

/// Outcome of navigating a context to a URL.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NavigationOutcome {
    /// URL after redirects.
    pub final_url: String,
    /// HTTP status of the final response.
    pub status: u16,
    /// Wall-clock load time in milliseconds.
    pub load_time_ms: u64,
}

/// Parsed DOM snapshot used by the capture and data-integrity stages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DomSnapshot {
    /// Full HTML document.
    pub html: String,
    /// Visible text, scripts and hidden nodes excluded.
    pub visible_text: String,
}

/// A single field to fill before submitting a form, keyed by the element's
/// `name` or `id` attribute.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormField {
    /// The field's `name` or `id` attribute.
    pub selector: String,
    /// The value to fill into the field.
    pub value: String,
}

/// Outcome of filling and submitting a form.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FormSubmission {
    /// HTTP status of the submission response, when one was received.
    #[serde(default)]
    pub status: Option<u16>,
    /// Populated when the submission never resolved.
    #[serde(default)]
    pub failure: Option<String>,
}

/// Errors a [`BrowserDriver`] implementation may return.
///
/// # Invariants
/// - Variants are stable for stage-level transient/fatal classification.
#[derive(Debug, Error)]
pub enum BrowserError {
    /// Navigation did not complete within its timeout.
    #[error("navigation to {url} timed out after {timeout_secs}s")]
    NavigationTimeout {
        /// URL that timed out.
        url: String,
        /// Timeout that was exceeded, in seconds.
        timeout_secs: u64,
    },
    /// Navigation failed outright (DNS, connection refused, TLS, …).
    #[error("navigation to {url} failed: {message}")]
    NavigationFailed {
        /// URL that failed.
        url: String,
        /// Underlying failure description.
        message: String,
    },
    /// The context handle passed in does not refer to a live context.
    #[error("unknown browser context")]
    UnknownContext,
    /// Any other driver-level failure.
    #[error("browser driver error: {0}")]
    Driver(String),
}

/// Capability for driving a headless browser across both sides of a
/// comparison. The in-repo reference implementation is deterministic and
/// built on plain HTTP fetch plus HTML parsing; a production deployment
/// plugs in a real browser automation backend behind the same contract.
#[async_trait]
pub trait BrowserDriver: Send + Sync {
    /// Opens a new context at the given viewport and returns its handle.
    ///
    /// # Errors
    ///
    /// Returns [`BrowserError`] when the context cannot be created.
    async fn open_context(&self, viewport: Viewport) -> Result<BrowserContextId, BrowserError>;

    /// Navigates the context to `url`, waiting up to `timeout_secs`.
    ///
    /// # Errors
    ///
    /// Returns [`BrowserError`] on timeout, navigation failure, or an
    /// unknown context.
    async fn navigate(
        &self,
        ctx: BrowserContextId,
        url: &Url,
        timeout_secs: u64,
    ) -> Result<NavigationOutcome, BrowserError>;

    /// Captures a full-page PNG screenshot of the context's current page.
    ///
    /// # Errors
    ///
    /// Returns [`BrowserError`] when capture fails.
    async fn screenshot_png(&self, ctx: BrowserContextId) -> Result<Vec<u8>, BrowserError>;

    /// Captures the current DOM as HTML plus extracted visible text.
    ///
    /// # Errors
    ///
    /// Returns [`BrowserError`] when the snapshot cannot be taken.
    async fn snapshot_dom(&self, ctx: BrowserContextId) -> Result<DomSnapshot, BrowserError>;

    /// Drains console messages observed since the last call.
    async fn drain_console_messages(&self, ctx: BrowserContextId) -> Vec<ConsoleMessage>;

    /// Drains network events observed since the last call.
    async fn drain_network_events(&self, ctx: BrowserContextId) -> Vec<NetworkEvent>;

    /// Navigates the browser's history back one entry, used to restore page
    /// state after a broken-link probe.
    ///
    /// # Errors
    ///
    /// Returns [`BrowserError`] when the context cannot go back.
    async fn go_back(&self, ctx: BrowserContextId) -> Result<(), BrowserError>;

    /// Fills `fields` into the form at `action_url` (the form's resolved
    /// `action` target) using `method`, then submits it.
    ///
    /// # Errors
    ///
    /// Returns [`BrowserError`] when the context is unknown. A submission
    /// that reaches the server but fails is reported through
    /// [`FormSubmission::failure`], not this `Result`.
    async fn submit_form(
        &self,
        ctx: BrowserContextId,
        action_url: &Url,
        method: &str,
        fields: &[FormField],
    ) -> Result<FormSubmission, BrowserError>;

    /// Closes the context, releasing any held resources. Idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`BrowserError`] when the underlying close fails.
    async fn close_context(&self, ctx: BrowserContextId) -> Result<(), BrowserError>;
}

// ============================================================================
// SECTION: Reasoner
// ============================================================================

/// Errors a [`Reasoner`] implementation may return.
#[derive(Debug, Error)]
pub enum ReasoningError {
    /// The provider request failed (network, auth, rate limit).
    #[error("reasoning provider request failed: {0}")]
    ProviderRequest(String),
    /// The provider's response could not be parsed into the expected shape.
    #[error("reasoning provider response was not valid: {0}")]
    InvalidResponse(String),
}

/// Capability for turning a diff summary into a severity-tagged analysis.
/// Two implementations share this contract: an LLM-backed reasoner and a
/// deterministic rule-based fallback used when no LLM is configured, or when
/// the LLM reasoner fails.
#[async_trait]
pub trait Reasoner: Send + Sync {
    /// Produces a reasoning analysis for the given diff summary.
    ///
    /// # Errors
    ///
    /// Returns [`ReasoningError`] when the analysis cannot be produced. The
    /// rule-based fallback is infallible in practice but still returns this
    /// type to satisfy the shared contract.
    async fn analyze(&self, input: &DiffSummaryInput) -> Result<ReasoningAnalysis, ReasoningError>;
}

// ============================================================================
// SECTION: Stage
// ============================================================================

/// Why a stage issue was recorded, controlling how the orchestrator reacts.
///
/// # Invariants
/// - `Fatal` ends the run; `Transient` marks the stage's reasoning slot
///   `unavailable` and the run continues.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageSeverity {
    /// Non-fatal: the run continues without this stage's output.
    Transient,
    /// Fatal: the run ends `failed`.
    Fatal,
}

/// A stage-level issue, always committed as a log artifact.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StageIssue {
    /// Stage name the issue originated from.
    pub stage: String,
    /// Human-readable message, written verbatim into the log artifact.
    pub message: String,
    /// Severity classification.
    #[serde(skip)]
    pub severity: StageSeverity,
}

impl Default for StageSeverity {
    fn default() -> Self {
        Self::Transient
    }
}

/// A stage's outcome: its output (if it produced one) and an optional issue.
/// Stages never propagate errors as exceptions across this boundary; the
/// orchestrator inspects `issue` to decide whether to continue or fail the
/// run.
///
/// # Invariants
/// - `output` is `None` whenever `issue.severity` is `Fatal`.
#[derive(Debug, Clone)]
pub struct StageReport<T> {
    /// The stage's output, when it produced one.
    pub output: Option<T>,
    /// An issue to record as a log artifact, when one occurred.
    pub issue: Option<StageIssue>,
}

impl<T> StageReport<T> {
    /// Builds a clean success report.
    #[must_use]
    pub fn ok(output: T) -> Self {
        Self {
            output: Some(output),
            issue: None,
        }
    }

    /// Builds a non-fatal failure report: no output, a transient issue.
    #[must_use]
    pub fn transient(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            output: None,
            issue: Some(StageIssue {
                stage: stage.into(),
                message: message.into(),
                severity: StageSeverity::Transient,
            }),
        }
    }

    /// Builds a fatal failure report: no output, a fatal issue.
    #[must_use]
    pub fn fatal(stage: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            output: None,
            issue: Some(StageIssue {
                stage: stage.into(),
                message: message.into(),
                severity: StageSeverity::Fatal,
            }),
        }
    }

    /// Returns whether this report carries a fatal issue.
    #[must_use]
    pub fn is_fatal(&self) -> bool {
        matches!(
            &self.issue,
            Some(issue) if issue.severity == StageSeverity::Fatal
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ok_report_has_no_issue() {
        let report = StageReport::ok(42);
        assert_eq!(report.output, Some(42));
        assert!(!report.is_fatal());
    }

    #[test]
    fn fatal_report_has_no_output_and_is_fatal() {
        let report: StageReport<i32> = StageReport::fatal("capture", "dns failure");
        assert!(report.output.is_none());
        assert!(report.is_fatal());
    }

    #[test]
    fn transient_report_is_not_fatal() {
        let report: StageReport<i32> = StageReport::transient("visual", "diff failed");
        assert!(!report.is_fatal());
    }

    #[test]
    fn default_viewport_set_matches_the_three_documented_presets() {
        let set = Viewport::default_set();
        assert_eq!(set.len(), 3);
        assert_eq!(set[0].width, 1920);
        assert_eq!(set[2].width, 375);
    }
}
