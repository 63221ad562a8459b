// crates/migration-gate-pipeline/src/orchestrator.rs
// ============================================================================
// Module: Pipeline Orchestrator
// Description: Drives a single run through the fixed stage order, persisting
// the run state machine write-ahead of every side effect that depends on it.
// Purpose: The one place that advances a `Run` from `queued` to a terminal
// state, owning concurrency limits, per-stage timeouts, scoped browser
// context lifetime, and cancellation.
// Dependencies: migration-gate-core, migration-gate-storage, tokio
// ============================================================================

//! ## Overview
//! Stage invocation order is fixed: Crawl, then Capture, then Visual,
//! Functional, and Data concurrently (gated by the job's test matrix), then
//! Reasoning, then Report. Crawl, Capture, and Report failures are fatal;
//! a diff stage failure marks its reasoning slot unavailable and the run
//! continues; Reasoning never fails outward since it already falls back to
//! the rule-based analyzer. A stage timeout or an explicit cancellation ends
//! the run the same way regardless of which stage it interrupts.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::future::Future;
use std::path::Path;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::sync::atomic::AtomicBool;
use std::sync::atomic::Ordering;
use std::time::Duration;

use migration_gate_core::ArtifactKind;
use migration_gate_core::BrowserDriver;
use migration_gate_core::ComparisonJob;
use migration_gate_core::CoreError;
use migration_gate_core::DiffSummaryInput;
use migration_gate_core::JobId;
use migration_gate_core::Reasoner;
use migration_gate_core::Run;
use migration_gate_core::RunId;
use migration_gate_core::RunStatus;
use migration_gate_core::Severity;
use migration_gate_core::StageReport;
use migration_gate_core::StageSlot;
use migration_gate_core::Timestamp;
use migration_gate_core::Viewport;
use migration_gate_storage::FileSnapshotStore;
use migration_gate_storage::FileStoreError;
use thiserror::Error;
use tokio::sync::Semaphore;
use url::Url;

use crate::stages::capture;
use crate::stages::capture::CaptureOutput;
use crate::stages::crawl;
use crate::stages::data_integrity;
use crate::stages::functional;
use crate::stages::functional::PageFunctionalResult;
use crate::stages::reasoning;
use crate::stages::report;
use crate::stages::visual;
use crate::telemetry::OrchestratorMetrics;
use crate::telemetry::RunEvent;
use crate::telemetry::StageEvent;
use crate::telemetry::StageName;

// ============================================================================
// SECTION: Cancellation
// ============================================================================

/// A cheaply-cloned, run-scoped cancellation flag. Hand-rolled rather than
/// pulled from `tokio-util`, since this workspace does not depend on it.
#[derive(Debug, Clone)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    /// Builds a fresh, uncancelled token.
    #[must_use]
    pub fn new() -> Self {
        Self {
            cancelled: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Marks the token cancelled. Idempotent.
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    /// Returns whether `cancel` has been called.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }
}

impl Default for CancellationToken {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Per-job and global caps on concurrently-running runs.
#[derive(Debug, Clone, Copy)]
pub struct ConcurrencyLimits {
    /// Maximum runs of the same job executing at once.
    pub per_job: usize,
    /// Maximum runs executing at once across all jobs.
    pub global: usize,
}

impl Default for ConcurrencyLimits {
    fn default() -> Self {
        Self { per_job: 1, global: 4 }
    }
}

/// Orchestrator-wide tuning: viewport set, per-stage timeout, concurrency.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Viewports every captured and visually-diffed page is evaluated at.
    pub viewports: Vec<Viewport>,
    /// Wall-clock budget for any single stage invocation.
    pub stage_timeout: Duration,
    /// Concurrency caps.
    pub concurrency: ConcurrencyLimits,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            viewports: Viewport::default_set().to_vec(),
            stage_timeout: Duration::from_secs(600),
            concurrency: ConcurrencyLimits::default(),
        }
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors the orchestrator's own bookkeeping can return. Stage failures are
/// folded into [`CoreError`] before they reach here.
#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// A core-level failure: invalid state, missing entity, or a fatal or
    /// cancelled stage outcome.
    #[error(transparent)]
    Core(#[from] CoreError),
    /// The storage layer failed outside of a stage's own error path.
    #[error(transparent)]
    Store(#[from] FileStoreError),
    /// A concurrency semaphore was closed while a run was waiting on it.
    #[error("concurrency limiter closed while a run was waiting")]
    SemaphoreClosed,
}

// ============================================================================
// SECTION: Stage Outcome
// ============================================================================

/// The three ways a bounded stage invocation can resolve.
enum StageOutcome<T> {
    /// The stage produced output.
    Ok(T),
    /// The stage reported an issue without output.
    Issue { stage: String, message: String },
    /// The stage was cancelled or exceeded its timeout. Always ends the run,
    /// regardless of which stage it was.
    Aborted(String),
}

// ============================================================================
// SECTION: Orchestrator
// ============================================================================

/// Drives runs through the comparison pipeline.
pub struct Orchestrator {
    store: Arc<FileSnapshotStore>,
    driver: Arc<dyn BrowserDriver>,
    reasoner: Arc<dyn Reasoner>,
    metrics: Arc<dyn OrchestratorMetrics>,
    config: OrchestratorConfig,
    global_semaphore: Arc<Semaphore>,
    job_semaphores: Mutex<HashMap<JobId, Arc<Semaphore>>>,
    run_tokens: Mutex<HashMap<RunId, CancellationToken>>,
}

impl Orchestrator {
    /// Builds an orchestrator bound to the given store, driver, reasoner,
    /// and metrics sink.
    #[must_use]
    pub fn new(
        store: Arc<FileSnapshotStore>,
        driver: Arc<dyn BrowserDriver>,
        reasoner: Arc<dyn Reasoner>,
        metrics: Arc<dyn OrchestratorMetrics>,
        config: OrchestratorConfig,
    ) -> Self {
        let global_semaphore = Arc::new(Semaphore::new(config.concurrency.global.max(1)));
        Self {
            store,
            driver,
            reasoner,
            metrics,
            config,
            global_semaphore,
            job_semaphores: Mutex::new(HashMap::new()),
            run_tokens: Mutex::new(HashMap::new()),
        }
    }

    /// Creates a queued run for `job_id`. Execution is a separate step
    /// (`execute`) so the caller controls whether to run it inline or spawn
    /// it onto a background task.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] when `job_id` does not resolve, or a
    /// storage error.
    pub fn enqueue(
        &self,
        job_id: JobId,
        triggered_by: impl Into<String>,
        now: Timestamp,
    ) -> Result<Run, OrchestratorError> {
        let mut snapshot = self.store.load()?;
        if !snapshot.comparison_jobs.iter().any(|job| job.id == job_id) {
            return Err(CoreError::NotFound(format!("job {job_id}")).into());
        }
        let run = Run::new_queued(job_id, triggered_by, now);
        snapshot.runs.push(run.clone());
        self.store.save(&snapshot)?;
        Ok(run)
    }

    /// Requests cancellation of a currently-executing run. Returns `false`
    /// when the run is not (or is no longer) executing.
    pub fn cancel_run(&self, run_id: RunId) -> bool {
        let tokens = self.run_tokens.lock().unwrap_or_else(PoisonError::into_inner);
        match tokens.get(&run_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// On process startup, marks any run left `running` by a prior crash as
    /// `failed`, committing an `"aborted-on-restart"` log artifact. The
    /// orchestrator never resumes a partially-executed run.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the snapshot cannot be read or written.
    pub fn recover_crashed_runs(&self, now: Timestamp) -> Result<usize, OrchestratorError> {
        let mut snapshot = self.store.load()?;
        let stuck: Vec<RunId> = snapshot
            .runs
            .iter()
            .filter(|run| run.status == RunStatus::Running)
            .map(|run| run.id)
            .collect();

        for run in &mut snapshot.runs {
            if run.status == RunStatus::Running {
                run.status = RunStatus::Failed;
                run.completed_at = Some(now);
            }
        }
        self.store.save(&snapshot)?;

        for run_id in &stuck {
            let _ = capture::write_log_artifact(
                &self.store,
                *run_id,
                "aborted-on-restart",
                "process restarted while this run was executing; it was not resumed",
                now,
            );
        }
        Ok(stuck.len())
    }

    fn job_semaphore(&self, job_id: JobId) -> Arc<Semaphore> {
        let mut semaphores = self.job_semaphores.lock().unwrap_or_else(PoisonError::into_inner);
        semaphores
            .entry(job_id)
            .or_insert_with(|| Arc::new(Semaphore::new(self.config.concurrency.per_job.max(1))))
            .clone()
    }

    /// Executes a queued run to completion, respecting the configured
    /// concurrency limits. Returns the run in its terminal state.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::NotFound`] when the run or its job does not
    /// resolve, [`CoreError::InvalidInput`] when the run is not queued, or
    /// an [`OrchestratorError::SemaphoreClosed`] if the concurrency limiter
    /// was torn down while this run waited on it.
    pub async fn execute(&self, run_id: RunId, now: Timestamp) -> Result<Run, OrchestratorError> {
        let snapshot = self.store.load()?;
        let run = snapshot
            .runs
            .iter()
            .find(|run| run.id == run_id)
            .cloned()
            .ok_or_else(|| CoreError::NotFound(format!("run {run_id}")))?;
        if run.status != RunStatus::Queued {
            return Err(CoreError::InvalidInput(format!("run {run_id} is not queued")).into());
        }
        let job = snapshot
            .comparison_jobs
            .iter()
            .find(|job| job.id == run.job_id)
            .cloned()
            .ok_or_else(|| CoreError::NotFound(format!("job {}", run.job_id)))?;

        let _global_permit = Arc::clone(&self.global_semaphore)
            .acquire_owned()
            .await
            .map_err(|_| OrchestratorError::SemaphoreClosed)?;
        let job_semaphore = self.job_semaphore(job.id);
        let _job_permit = job_semaphore
            .acquire_owned()
            .await
            .map_err(|_| OrchestratorError::SemaphoreClosed)?;

        let token = CancellationToken::new();
        self.run_tokens
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(run_id, token.clone());

        self.transition_running(run_id, now)?;
        let pipeline_result = self.run_pipeline(&job, run_id, &token, now).await;
        self.run_tokens.lock().unwrap_or_else(PoisonError::into_inner).remove(&run_id);

        let final_status = if pipeline_result.is_ok() {
            RunStatus::Completed
        } else {
            RunStatus::Failed
        };
        self.metrics.record_run(RunEvent { status: final_status });
        let final_run = self.transition_terminal(run_id, final_status, now)?;
        pipeline_result.map(|()| final_run).or(Ok(final_run))
    }

    fn transition_running(&self, run_id: RunId, now: Timestamp) -> Result<(), OrchestratorError> {
        let mut snapshot = self.store.load()?;
        let run = snapshot
            .runs
            .iter_mut()
            .find(|run| run.id == run_id)
            .ok_or_else(|| CoreError::NotFound(format!("run {run_id}")))?;
        run.status = RunStatus::Running;
        self.store.save(&snapshot)?;
        let _ = now;
        Ok(())
    }

    fn transition_terminal(&self, run_id: RunId, status: RunStatus, now: Timestamp) -> Result<Run, OrchestratorError> {
        let mut snapshot = self.store.load()?;
        let run = snapshot
            .runs
            .iter_mut()
            .find(|run| run.id == run_id)
            .ok_or_else(|| CoreError::NotFound(format!("run {run_id}")))?;
        run.status = status;
        run.completed_at = Some(now);
        let updated = run.clone();
        self.store.save(&snapshot)?;
        Ok(updated)
    }

    async fn run_stage<T>(&self, token: &CancellationToken, fut: impl Future<Output = StageReport<T>>) -> StageOutcome<T> {
        if token.is_cancelled() {
            return StageOutcome::Aborted("run was cancelled".into());
        }
        match tokio::time::timeout(self.config.stage_timeout, fut).await {
            Ok(report) => match report.output {
                Some(output) => StageOutcome::Ok(output),
                None => match report.issue {
                    Some(issue) => StageOutcome::Issue {
                        stage: issue.stage,
                        message: issue.message,
                    },
                    None => StageOutcome::Aborted("stage produced neither output nor issue".into()),
                },
            },
            Err(_) => StageOutcome::Aborted(format!(
                "stage exceeded the {}s timeout",
                self.config.stage_timeout.as_secs()
            )),
        }
    }

    /// Turns a fatal-stage outcome (Crawl, Capture, Report) into a `Result`,
    /// committing a log artifact for any non-success outcome.
    fn require_fatal<T>(&self, run_id: RunId, stage: &str, outcome: StageOutcome<T>, now: Timestamp) -> Result<T, CoreError> {
        match outcome {
            StageOutcome::Ok(value) => Ok(value),
            StageOutcome::Issue { stage: issue_stage, message } => {
                let _ = capture::write_log_artifact(&self.store, run_id, &format!("{issue_stage} Error"), &message, now);
                Err(CoreError::StageFatal {
                    stage: stage.to_string(),
                    message,
                })
            }
            StageOutcome::Aborted(reason) => {
                let _ = capture::write_log_artifact(&self.store, run_id, &format!("{stage} Aborted"), &reason, now);
                Err(CoreError::Cancelled(reason))
            }
        }
    }

    /// Turns a soft-stage outcome (Visual, Functional, Data) into a
    /// [`StageSlot`], committing a log artifact when the stage failed
    /// non-fatally. A timeout or cancellation still ends the run, per the
    /// documented override.
    fn require_soft<T>(
        &self,
        run_id: RunId,
        stage: &str,
        outcome: Option<StageOutcome<T>>,
        now: Timestamp,
    ) -> Result<StageSlot<T>, CoreError> {
        match outcome {
            None => Ok(StageSlot::Unavailable),
            Some(StageOutcome::Ok(value)) => Ok(StageSlot::Available(value)),
            Some(StageOutcome::Issue { stage: issue_stage, message }) => {
                let _ = capture::write_log_artifact(&self.store, run_id, &format!("{issue_stage} Error"), &message, now);
                Ok(StageSlot::Unavailable)
            }
            Some(StageOutcome::Aborted(reason)) => {
                let _ = capture::write_log_artifact(&self.store, run_id, &format!("{stage} Aborted"), &reason, now);
                Err(CoreError::Cancelled(reason))
            }
        }
    }

    #[allow(clippy::too_many_lines, reason = "sequential stage wiring reads linearly; splitting it obscures the fixed stage order")]
    async fn run_pipeline(&self, job: &ComparisonJob, run_id: RunId, token: &CancellationToken, now: Timestamp) -> Result<(), CoreError> {
        let driver = self.driver.as_ref();
        let crawl_viewport = self.config.viewports.first().copied().unwrap_or(Viewport::DESKTOP);

        let (baseline_outcome, candidate_outcome) = tokio::join!(
            self.run_stage(token, crawl::crawl_site(driver, &job.baseline_url, &job.crawl_config, crawl_viewport)),
            self.run_stage(token, crawl::crawl_site(driver, &job.candidate_url, &job.crawl_config, crawl_viewport)),
        );
        let crawl_succeeded = matches!(baseline_outcome, StageOutcome::Ok(_)) && matches!(candidate_outcome, StageOutcome::Ok(_));
        self.metrics.record_stage(StageEvent {
            stage: StageName::Crawl,
            succeeded: crawl_succeeded,
        });
        let (baseline_pages, baseline_log) = self.require_fatal(run_id, "crawl", baseline_outcome, now)?;
        let (candidate_pages, candidate_log) = self.require_fatal(run_id, "crawl", candidate_outcome, now)?;
        let crawl_log = format!("{}\n{}", baseline_log.join("\n"), candidate_log.join("\n"));
        let _ = capture::write_log_artifact(&self.store, run_id, "Crawl Log", &crawl_log, now);

        let (matched_pages, match_log) = crawl::match_pages(baseline_pages, candidate_pages, job.page_map.as_ref());
        let _ = capture::write_log_artifact(&self.store, run_id, "Page Match Log", &match_log.join("\n"), now);

        let capture_outcome = self
            .run_stage(
                token,
                capture::capture_pages(driver, &self.store, run_id, &matched_pages, &self.config.viewports),
            )
            .await;
        self.metrics.record_stage(StageEvent {
            stage: StageName::Capture,
            succeeded: matches!(capture_outcome, StageOutcome::Ok(_)),
        });
        let captured = self.require_fatal(run_id, "capture", capture_outcome, now)?;
        for (kind, label, path) in &captured.artifacts {
            let _ = self.store.register_artifact(run_id, *kind, label.clone(), path.clone(), now);
        }
        let baseline_ctx = captured.baseline_context;
        let candidate_ctx = captured.candidate_context;
        let pages_tested = captured.pages.len() as u32;

        let result = self.run_diff_reasoning_and_report(job, run_id, token, &captured, pages_tested, now).await;

        let _ = driver.close_context(baseline_ctx).await;
        let _ = driver.close_context(candidate_ctx).await;

        result
    }

    async fn run_diff_reasoning_and_report(
        &self,
        job: &ComparisonJob,
        run_id: RunId,
        token: &CancellationToken,
        captured: &CaptureOutput,
        pages_tested: u32,
        now: Timestamp,
    ) -> Result<(), CoreError> {
        let driver = self.driver.as_ref();

        let (visual_outcome, functional_outcome, data_outcome) = tokio::join!(
            async {
                if job.test_matrix.visual {
                    Some(self.run_stage(token, run_visual_stage(&self.store, run_id, captured)).await)
                } else {
                    None
                }
            },
            async {
                if job.test_matrix.functional {
                    Some(self.run_stage(token, run_functional_stage(driver, &self.store, run_id, captured)).await)
                } else {
                    None
                }
            },
            async {
                if job.test_matrix.data {
                    Some(self.run_stage(token, run_data_stage(captured)).await)
                } else {
                    None
                }
            },
        );

        if let Some(outcome) = &visual_outcome {
            self.metrics.record_stage(StageEvent {
                stage: StageName::Visual,
                succeeded: matches!(outcome, StageOutcome::Ok(_)),
            });
        }
        if let Some(outcome) = &functional_outcome {
            self.metrics.record_stage(StageEvent {
                stage: StageName::Functional,
                succeeded: matches!(outcome, StageOutcome::Ok(_)),
            });
        }
        if let Some(outcome) = &data_outcome {
            self.metrics.record_stage(StageEvent {
                stage: StageName::Data,
                succeeded: matches!(outcome, StageOutcome::Ok(_)),
            });
        }

        let visual_slot = self.require_soft(run_id, "visual", visual_outcome, now)?;
        let functional_slot = self.require_soft(run_id, "functional", functional_outcome, now)?;
        let data_slot = self.require_soft(run_id, "data", data_outcome, now)?;

        for (label, artifacts) in [
            ("visual", visual_slot.as_available().map(|(_, artifacts)| artifacts)),
            ("functional", functional_slot.as_available().map(|(_, artifacts)| artifacts)),
            ("data", data_slot.as_available().map(|(_, artifacts)| artifacts)),
        ] {
            if let Some(artifacts) = artifacts {
                for (kind, artifact_label, path) in artifacts {
                    let _ = self.store.register_artifact(run_id, *kind, artifact_label.clone(), path.clone(), now);
                }
            }
            let _ = label;
        }

        let diff_input = DiffSummaryInput {
            visual: map_slot(visual_slot),
            functional: map_slot(functional_slot),
            data: map_slot(data_slot),
        };

        let reasoning_outcome = self.run_stage(token, reasoning::reason(self.reasoner.as_ref(), &diff_input)).await;
        self.metrics.record_stage(StageEvent {
            stage: StageName::Reasoning,
            succeeded: matches!(reasoning_outcome, StageOutcome::Ok(_)),
        });
        let analysis = match reasoning_outcome {
            StageOutcome::Ok(analysis) => analysis,
            StageOutcome::Issue { message, .. } => {
                let _ = capture::write_log_artifact(&self.store, run_id, "Reasoning Error", &message, now);
                fail_safe_analysis(&message)
            }
            StageOutcome::Aborted(reason) => {
                let _ = capture::write_log_artifact(&self.store, run_id, "Reasoning Aborted", &reason, now);
                return Err(CoreError::Cancelled(reason));
            }
        };

        let comparison_report = report::synthesize(analysis, pages_tested);
        let report_json = serde_json::to_vec_pretty(&comparison_report).unwrap_or_default();
        let markdown = report::render_markdown(&comparison_report);
        match write_report_artifacts(&self.store, run_id, &report_json, &markdown, now) {
            Ok(()) => {
                self.metrics.record_stage(StageEvent {
                    stage: StageName::Report,
                    succeeded: true,
                });
                Ok(())
            }
            Err(message) => {
                self.metrics.record_stage(StageEvent {
                    stage: StageName::Report,
                    succeeded: false,
                });
                let _ = capture::write_log_artifact(&self.store, run_id, "Report Error", &message, now);
                Err(CoreError::StageFatal {
                    stage: "report".into(),
                    message,
                })
            }
        }
    }
}

fn map_slot<T>(slot: StageSlot<(T, Vec<(ArtifactKind, String, String)>)>) -> StageSlot<T> {
    match slot {
        StageSlot::Available((value, _)) => StageSlot::Available(value),
        StageSlot::Unavailable => StageSlot::Unavailable,
    }
}

/// A conservative placeholder analysis used only when reasoning's own
/// rule-based fallback also fails to produce an analysis: it never signals
/// `pass`, so the report stage never understates risk on a reasoning outage.
fn fail_safe_analysis(reason: &str) -> migration_gate_core::ReasoningAnalysis {
    use migration_gate_core::CategoryAnalysis;
    use migration_gate_core::DiffCategory;
    use migration_gate_core::OverallAnalysis;
    use migration_gate_core::ReasoningAnalysis;

    let category = |category: DiffCategory| CategoryAnalysis {
        category,
        severity: Severity::High,
        confidence: 0.0,
        pass: false,
        explanation: format!("reasoning unavailable: {reason}"),
        key_findings: Vec::new(),
        false_positives: Vec::new(),
        expected_changes: Vec::new(),
    };

    ReasoningAnalysis {
        categories: vec![
            category(DiffCategory::Visual),
            category(DiffCategory::Functional),
            category(DiffCategory::Data),
        ],
        overall: OverallAnalysis {
            severity: Severity::High,
            confidence: 0.0,
            pass: false,
            explanation: format!("reasoning unavailable: {reason}"),
            recommendations: vec!["Re-run reasoning once the provider is reachable.".into()],
        },
    }
}

fn write_report_artifacts(store: &FileSnapshotStore, run_id: RunId, json: &[u8], markdown: &str, now: Timestamp) -> Result<(), String> {
    let json_relative = Path::new("reports").join("report.json");
    let json_path = store.prepare_artifact_path(run_id, &json_relative).map_err(|err| err.to_string())?;
    std::fs::write(&json_path, json).map_err(|err| err.to_string())?;
    store
        .register_artifact(
            run_id,
            ArtifactKind::Report,
            "Comparison Report (JSON)",
            format!("data/artifacts/{run_id}/{}", json_relative.display()),
            now,
        )
        .map_err(|err| err.to_string())?;

    let markdown_relative = Path::new("reports").join("report.md");
    let markdown_path = store.prepare_artifact_path(run_id, &markdown_relative).map_err(|err| err.to_string())?;
    std::fs::write(&markdown_path, markdown).map_err(|err| err.to_string())?;
    store
        .register_artifact(
            run_id,
            ArtifactKind::Report,
            "Comparison Report (Markdown)",
            format!("data/artifacts/{run_id}/{}", markdown_relative.display()),
            now,
        )
        .map_err(|err| err.to_string())?;
    Ok(())
}

// ============================================================================
// SECTION: Visual Stage Integration
// ============================================================================

async fn run_visual_stage(
    store: &FileSnapshotStore,
    run_id: RunId,
    captured: &CaptureOutput,
) -> StageReport<(migration_gate_core::VisualSummary, Vec<(ArtifactKind, String, String)>)> {
    let mut per_page_severity = Vec::new();
    let mut diff_ratios = Vec::new();
    let mut artifacts = Vec::new();

    for page in &captured.pages {
        let mut page_severity = Severity::None;
        let pairs = page.baseline_screenshots.len().min(page.candidate_screenshots.len());
        for index in 0..pairs {
            let Ok(baseline_image) = image::load_from_memory(&page.baseline_screenshots[index]) else {
                continue;
            };
            let Ok(candidate_image) = image::load_from_memory(&page.candidate_screenshots[index]) else {
                continue;
            };
            let (diff_image, result) = visual::diff_pair(&baseline_image.to_rgba8(), &candidate_image.to_rgba8());
            diff_ratios.push(result.diff_ratio);
            if result.severity > page_severity {
                page_severity = result.severity;
            }

            let viewport_label = page
                .baseline
                .get(index)
                .map(|evidence| evidence.viewport.label)
                .unwrap_or("viewport");
            let heatmap = visual::render_heatmap(&diff_image);

            if let Some(path) = save_visual_artifact(store, run_id, &page.sanitized_path, viewport_label, "diff", &diff_image) {
                artifacts.push((ArtifactKind::Screenshot, format!("{} {viewport_label} diff", page.sanitized_path), path));
            }
            if let Some(path) = save_visual_artifact(store, run_id, &page.sanitized_path, viewport_label, "heatmap", &heatmap) {
                artifacts.push((ArtifactKind::Screenshot, format!("{} {viewport_label} heatmap", page.sanitized_path), path));
            }
        }
        per_page_severity.push(page_severity);
    }

    let summary = visual::summarize(&per_page_severity, &diff_ratios);
    StageReport::ok((summary, artifacts))
}

fn save_visual_artifact(
    store: &FileSnapshotStore,
    run_id: RunId,
    sanitized_path: &str,
    viewport_label: &str,
    kind: &str,
    image: &image::RgbaImage,
) -> Option<String> {
    let relative = Path::new("visual-diffs")
        .join(sanitized_path)
        .join(format!("{viewport_label}-{kind}.png"));
    let full_path = store.prepare_artifact_path(run_id, &relative).ok()?;
    image.save(&full_path).ok()?;
    Some(format!("data/artifacts/{run_id}/{}", relative.display()))
}

// ============================================================================
// SECTION: Functional Stage Integration
// ============================================================================

async fn run_functional_stage(
    driver: &dyn BrowserDriver,
    store: &FileSnapshotStore,
    run_id: RunId,
    captured: &CaptureOutput,
) -> StageReport<(migration_gate_core::FunctionalSummary, Vec<(ArtifactKind, String, String)>)> {
    let mut results = Vec::new();
    let mut artifacts = Vec::new();

    for page in &captured.pages {
        if let Some(evidence) = page.baseline.first() {
            results.push(functional_result_for(driver, captured.baseline_context, evidence).await);
            if let Some(path) = save_har_artifact(store, run_id, &page.sanitized_path, "baseline", evidence) {
                artifacts.push((ArtifactKind::Other, format!("{} baseline HAR", page.sanitized_path), path));
            }
        }
        if let Some(evidence) = page.candidate.first() {
            results.push(functional_result_for(driver, captured.candidate_context, evidence).await);
            if let Some(path) = save_har_artifact(store, run_id, &page.sanitized_path, "candidate", evidence) {
                artifacts.push((ArtifactKind::Other, format!("{} candidate HAR", page.sanitized_path), path));
            }
        }
    }

    let summary = functional::summarize(&results);
    StageReport::ok((summary, artifacts))
}

fn save_har_artifact(
    store: &FileSnapshotStore,
    run_id: RunId,
    sanitized_path: &str,
    side: &str,
    evidence: &capture::ViewportEvidence,
) -> Option<String> {
    let relative = Path::new("har").join(side).join(format!("{sanitized_path}.har"));
    let full_path = store.prepare_artifact_path(run_id, &relative).ok()?;
    let har = functional::build_har(&evidence.final_url, &evidence.network_events);
    let body = serde_json::to_vec_pretty(&har).ok()?;
    std::fs::write(&full_path, body).ok()?;
    Some(format!("data/artifacts/{run_id}/{}", relative.display()))
}

async fn functional_result_for(
    driver: &dyn BrowserDriver,
    ctx: migration_gate_core::BrowserContextId,
    evidence: &capture::ViewportEvidence,
) -> PageFunctionalResult {
    let navigation_issue = evidence.status >= 400;
    let js_errors = functional::extract_js_errors(&evidence.console_messages);
    let page_url = Url::parse(&evidence.final_url).ok();

    let broken_links = match &page_url {
        Some(page_url) => functional::probe_broken_links(driver, ctx, &evidence.html, page_url).await,
        None => Vec::new(),
    };

    let form_issue = match &page_url {
        Some(page_url) => match functional::extract_form_submission(&evidence.html, page_url) {
            Some(form) => match driver.submit_form(ctx, &form.action_url, &form.method, &form.fields).await {
                Ok(submission) => functional::submission_indicates_issue(&submission),
                Err(_) => true,
            },
            None => false,
        },
        None => false,
    };

    PageFunctionalResult {
        navigation_issue,
        form_issue,
        broken_links,
        js_errors,
    }
}

// ============================================================================
// SECTION: Data Integrity Stage Integration
// ============================================================================

async fn run_data_stage(
    captured: &CaptureOutput,
) -> StageReport<(migration_gate_core::DataIntegritySummary, Vec<(ArtifactKind, String, String)>)> {
    let mut statuses = Vec::new();
    let mut missing_data_pages = 0u32;
    let mut total_field_diffs = 0u32;
    let mut critical_mismatches = 0u32;

    for page in &captured.pages {
        let (Some(baseline_evidence), Some(candidate_evidence)) = (page.baseline.first(), page.candidate.first()) else {
            missing_data_pages += 1;
            continue;
        };

        let baseline_content = data_integrity::extract_content(&baseline_evidence.html, &baseline_evidence.visible_text);
        let candidate_content = data_integrity::extract_content(&candidate_evidence.html, &candidate_evidence.visible_text);
        let (similarity, _added, _removed) =
            data_integrity::text_similarity(&baseline_content.visible_text, &candidate_content.visible_text);

        let mut has_structured_diffs = baseline_content.tables.len() != candidate_content.tables.len();
        let mut field_diffs = 0u32;

        for (baseline_table, candidate_table) in baseline_content.tables.iter().zip(candidate_content.tables.iter()) {
            let (header_mismatch, cell_statuses) = data_integrity::compare_tables(baseline_table, candidate_table);
            has_structured_diffs |= header_mismatch;
            let mismatches = cell_statuses
                .iter()
                .filter(|status| !matches!(status, data_integrity::CellStatus::Match))
                .count() as u32;
            if mismatches > 0 {
                has_structured_diffs = true;
            }
            field_diffs += mismatches;
        }

        for (baseline_price, candidate_price) in baseline_content.pricing.iter().zip(candidate_content.pricing.iter()) {
            if baseline_price.amount != candidate_price.amount || baseline_price.currency != candidate_price.currency {
                has_structured_diffs = true;
                field_diffs += 1;
                if let (Some(baseline_amount), Some(candidate_amount)) = (baseline_price.amount, candidate_price.amount) {
                    if baseline_amount > 0.0 && ((candidate_amount - baseline_amount).abs() / baseline_amount) > 0.2 {
                        critical_mismatches += 1;
                    }
                }
            }
        }

        for (baseline_json, candidate_json) in baseline_content.structured_json.iter().zip(candidate_content.structured_json.iter()) {
            let entries = data_integrity::diff_json(baseline_json, candidate_json, "$");
            if !entries.is_empty() {
                has_structured_diffs = true;
                field_diffs += entries.len() as u32;
            }
        }

        total_field_diffs += field_diffs;
        statuses.push(data_integrity::classify_page_status(similarity, has_structured_diffs));
    }

    let summary = data_integrity::summarize(&statuses, missing_data_pages, total_field_diffs, critical_mismatches);
    StageReport::ok((summary, Vec::new()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, reason = "test-only assertions")]
mod tests {
    use super::*;

    #[test]
    fn cancellation_token_reports_cancelled_after_cancel() {
        let token = CancellationToken::new();
        assert!(!token.is_cancelled());
        token.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn cloned_cancellation_token_shares_state() {
        let token = CancellationToken::new();
        let clone = token.clone();
        clone.cancel();
        assert!(token.is_cancelled());
    }

    #[test]
    fn default_concurrency_limits_allow_at_least_one_run_per_job() {
        let limits = ConcurrencyLimits::default();
        assert_eq!(limits.per_job, 1);
        assert!(limits.global >= 1);
    }
}
