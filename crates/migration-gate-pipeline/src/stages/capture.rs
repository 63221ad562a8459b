// crates/migration-gate-pipeline/src/stages/capture.rs
// ============================================================================
// Module: Capture Stage
// Description: Dual-site evidence capture (screenshot, HTML, visible text,
// console, network, metadata) for every matched page at every viewport.
// Purpose: Produce the artifact tree later diff stages read from.
// Dependencies: migration-gate-core, migration-gate-storage
// ============================================================================

//! ## Overview
//! Capture is fatal on failure: a diff stage has nothing to compare without
//! it. Evidence is written baseline-first, then candidate, per page, so
//! artifacts are byte-stable across re-runs given identical inputs. The two
//! browser contexts opened here (one per site, reused across viewports) are
//! handed back to the orchestrator for the middle stages to share.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;

use migration_gate_core::ArtifactKind;
use migration_gate_core::BrowserContextId;
use migration_gate_core::BrowserDriver;
use migration_gate_core::ConsoleMessage;
use migration_gate_core::MatchedPage;
use migration_gate_core::NetworkEvent;
use migration_gate_core::RunId;
use migration_gate_core::StageReport;
use migration_gate_core::Timestamp;
use migration_gate_core::Viewport;
use migration_gate_storage::FileSnapshotStore;
use serde::Deserialize;
use serde::Serialize;
use url::Url;

const NAVIGATION_TIMEOUT_SECS: u64 = 30;

// ============================================================================
// SECTION: Path Sanitization
// ============================================================================

/// Maps `/` to `-`, replaces non-`[A-Za-z0-9_-]` with `_`, collapses repeats,
/// and falls back to `"index"` when empty.
#[must_use]
pub fn sanitize_path(path: &str) -> String {
    let mapped: String = path
        .chars()
        .map(|c| if c == '/' { '-' } else { c })
        .map(|c| if c.is_ascii_alphanumeric() || c == '_' || c == '-' { c } else { '_' })
        .collect();

    let mut collapsed = String::with_capacity(mapped.len());
    let mut last: Option<char> = None;
    for c in mapped.chars() {
        if (c == '-' || c == '_') && last == Some(c) {
            continue;
        }
        collapsed.push(c);
        last = Some(c);
    }
    let trimmed = collapsed.trim_matches(['-', '_']).to_string();
    if trimmed.is_empty() {
        "index".into()
    } else {
        trimmed
    }
}

// ============================================================================
// SECTION: Evidence Shapes
// ============================================================================

/// One viewport's captured evidence for a single page on a single side.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewportEvidence {
    /// Viewport this evidence was captured at.
    pub viewport: Viewport,
    /// Full HTML document.
    pub html: String,
    /// Visible text, scripts and hidden nodes excluded.
    pub visible_text: String,
    /// Console messages observed during this page's lifetime.
    pub console_messages: Vec<ConsoleMessage>,
    /// Network requests/responses observed during this page's lifetime.
    pub network_events: Vec<NetworkEvent>,
    /// Final URL after redirects.
    pub final_url: String,
    /// HTTP status of the final response.
    pub status: u16,
    /// Wall-clock load time in milliseconds.
    pub load_time_ms: u64,
}

/// All captured evidence for one matched page, both sides.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageCapture {
    /// Sanitized path segment used for the artifact subtree.
    pub sanitized_path: String,
    /// Original matched page this capture covers.
    pub matched: MatchedPage,
    /// Baseline-side evidence, one entry per viewport.
    pub baseline: Vec<ViewportEvidence>,
    /// Candidate-side evidence, one entry per viewport.
    pub candidate: Vec<ViewportEvidence>,
    /// Baseline-side screenshot PNG bytes, one entry per viewport, in the
    /// same order as `baseline`.
    #[serde(skip)]
    pub baseline_screenshots: Vec<Vec<u8>>,
    /// Candidate-side screenshot PNG bytes, one entry per viewport, in the
    /// same order as `candidate`.
    #[serde(skip)]
    pub candidate_screenshots: Vec<Vec<u8>>,
}

/// The full capture stage output: per-page evidence plus the two live
/// browser contexts for later stages to reuse.
pub struct CaptureOutput {
    /// Per-page captured evidence.
    pub pages: Vec<PageCapture>,
    /// Live baseline-side browser context, reused by later stages.
    pub baseline_context: BrowserContextId,
    /// Live candidate-side browser context, reused by later stages.
    pub candidate_context: BrowserContextId,
    /// Kind, label, and artifact-relative path for every HTML/metadata/
    /// screenshot file written by this stage, ready for the orchestrator to
    /// register against the run.
    pub artifacts: Vec<(ArtifactKind, String, String)>,
}

// ============================================================================
// SECTION: Capture
// ============================================================================

async fn capture_side(
    driver: &dyn BrowserDriver,
    ctx: BrowserContextId,
    url: &Url,
) -> Option<(ViewportEvidence, Vec<u8>)> {
    let outcome = driver.navigate(ctx, url, NAVIGATION_TIMEOUT_SECS).await.ok()?;
    let dom = driver.snapshot_dom(ctx).await.ok()?;
    let screenshot = driver.screenshot_png(ctx).await.unwrap_or_default();
    let console_messages = driver.drain_console_messages(ctx).await;
    let network_events = driver.drain_network_events(ctx).await;
    Some((
        ViewportEvidence {
            viewport: Viewport::DESKTOP,
            html: dom.html,
            visible_text: dom.visible_text,
            console_messages,
            network_events,
            final_url: outcome.final_url,
            status: outcome.status,
            load_time_ms: outcome.load_time_ms,
        },
        screenshot,
    ))
}

fn write_page_artifacts(
    store: &FileSnapshotStore,
    run_id: RunId,
    side: &str,
    sanitized_path: &str,
    evidence: &[ViewportEvidence],
    screenshots: &[Vec<u8>],
) -> std::io::Result<Vec<(ArtifactKind, String, String)>> {
    let mut written = Vec::new();
    for (entry, screenshot) in evidence.iter().zip(screenshots.iter()) {
        let viewport_label = entry.viewport.label;

        let relative = Path::new(side).join(sanitized_path).join(format!("{viewport_label}.html"));
        let full_path = store
            .prepare_artifact_path(run_id, &relative)
            .map_err(|err| std::io::Error::other(err.to_string()))?;
        std::fs::write(&full_path, &entry.html)?;
        written.push((
            ArtifactKind::Other,
            format!("{sanitized_path} {side} {viewport_label} HTML"),
            format!("data/artifacts/{run_id}/{}", relative.display()),
        ));

        let metadata_relative = Path::new(side).join(sanitized_path).join(format!("{viewport_label}.json"));
        let metadata_path = store
            .prepare_artifact_path(run_id, &metadata_relative)
            .map_err(|err| std::io::Error::other(err.to_string()))?;
        let body = serde_json::to_vec_pretty(entry).unwrap_or_default();
        std::fs::write(&metadata_path, body)?;
        written.push((
            ArtifactKind::Other,
            format!("{sanitized_path} {side} {viewport_label} metadata"),
            format!("data/artifacts/{run_id}/{}", metadata_relative.display()),
        ));

        let screenshot_relative = Path::new(side).join(sanitized_path).join(format!("{viewport_label}.png"));
        let screenshot_path = store
            .prepare_artifact_path(run_id, &screenshot_relative)
            .map_err(|err| std::io::Error::other(err.to_string()))?;
        std::fs::write(&screenshot_path, screenshot)?;
        written.push((
            ArtifactKind::Screenshot,
            format!("{sanitized_path} {side} {viewport_label} screenshot"),
            format!("data/artifacts/{run_id}/{}", screenshot_relative.display()),
        ));
    }
    Ok(written)
}

/// Runs the capture stage for every matched page, baseline first then
/// candidate, across the fixed viewport set. Screenshot bytes are captured
/// separately via `screenshot_png` and written alongside the HTML/metadata
/// artifacts this function returns paths for.
///
/// # Errors
///
/// Returns a fatal [`StageReport`] when neither browser context can be
/// opened; per-page failures are recorded as skipped pages, not a fatal
/// error, since Capture's own contract only requires *some* evidence for the
/// run to proceed to diffing.
pub async fn capture_pages(
    driver: &dyn BrowserDriver,
    store: &FileSnapshotStore,
    run_id: RunId,
    matched_pages: &[MatchedPage],
    viewports: &[Viewport],
) -> StageReport<CaptureOutput> {
    let Ok(baseline_context) = driver.open_context(viewports[0]).await else {
        return StageReport::fatal("capture", "failed to open baseline browser context");
    };
    let Ok(candidate_context) = driver.open_context(viewports[0]).await else {
        let _ = driver.close_context(baseline_context).await;
        return StageReport::fatal("capture", "failed to open candidate browser context");
    };

    let mut pages = Vec::new();
    let mut artifacts = Vec::new();
    for matched in matched_pages {
        let Ok(baseline_url) = Url::parse(&matched.baseline.url) else {
            continue;
        };
        let Ok(candidate_url) = Url::parse(&matched.candidate.url) else {
            continue;
        };

        let mut baseline_evidence = Vec::new();
        let mut baseline_screenshots = Vec::new();
        let mut candidate_evidence = Vec::new();
        let mut candidate_screenshots = Vec::new();
        for viewport in viewports {
            if let Some((mut evidence, screenshot)) = capture_side(driver, baseline_context, &baseline_url).await {
                evidence.viewport = *viewport;
                baseline_evidence.push(evidence);
                baseline_screenshots.push(screenshot);
            }
        }
        for viewport in viewports {
            if let Some((mut evidence, screenshot)) = capture_side(driver, candidate_context, &candidate_url).await {
                evidence.viewport = *viewport;
                candidate_evidence.push(evidence);
                candidate_screenshots.push(screenshot);
            }
        }

        if baseline_evidence.is_empty() && candidate_evidence.is_empty() {
            continue;
        }

        let sanitized_path = sanitize_path(&matched.baseline.path);
        if let Ok(written) = write_page_artifacts(
            store,
            run_id,
            "baseline",
            &sanitized_path,
            &baseline_evidence,
            &baseline_screenshots,
        ) {
            artifacts.extend(written);
        }
        if let Ok(written) = write_page_artifacts(
            store,
            run_id,
            "candidate",
            &sanitized_path,
            &candidate_evidence,
            &candidate_screenshots,
        ) {
            artifacts.extend(written);
        }

        pages.push(PageCapture {
            sanitized_path,
            matched: matched.clone(),
            baseline: baseline_evidence,
            candidate: candidate_evidence,
            baseline_screenshots,
            candidate_screenshots,
        });
    }

    if pages.is_empty() && !matched_pages.is_empty() {
        let _ = driver.close_context(baseline_context).await;
        let _ = driver.close_context(candidate_context).await;
        return StageReport::fatal("capture", "no matched page could be captured on either side");
    }

    StageReport::ok(CaptureOutput {
        pages,
        baseline_context,
        candidate_context,
        artifacts,
    })
}

/// Writes a single run-scoped log artifact and registers it.
///
/// # Errors
///
/// Returns an I/O error when the log file cannot be written, or a storage
/// error wrapped as a plain string when registration fails.
pub fn write_log_artifact(
    store: &FileSnapshotStore,
    run_id: RunId,
    label: &str,
    message: &str,
    now: Timestamp,
) -> Result<(), String> {
    let relative = Path::new(format!("{}.log", sanitize_path(label)).as_str()).to_path_buf();
    let full_path = store
        .prepare_artifact_path(run_id, &relative)
        .map_err(|err| err.to_string())?;
    std::fs::write(&full_path, message).map_err(|err| err.to_string())?;
    store
        .register_artifact(
            run_id,
            ArtifactKind::Log,
            label,
            format!("data/artifacts/{run_id}/{}", relative.display()),
            now,
        )
        .map_err(|err| err.to_string())?;
    Ok(())
}
