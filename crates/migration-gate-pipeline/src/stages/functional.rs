// crates/migration-gate-pipeline/src/stages/functional.rs
// ============================================================================
// Module: Functional QA Stage
// Description: Navigation, form-fill, broken-link probing, JS-error capture,
// and HAR generation for every matched page on both sides.
// Purpose: Surface functional regressions a visual or data diff would miss.
// Dependencies: migration-gate-core, scraper, url
// ============================================================================

//! ## Overview
//! Forms are filled by a small field-name heuristic and submitted; broken
//! links are probed same-origin only by default, skipping `mailto:`,
//! `tel:`, `javascript:`, and fragment-only anchors, per the decided open
//! question. Each probe restores page state with a back-navigation so later
//! probes on the same page start from a known state.

// ============================================================================
// SECTION: Imports
// ============================================================================

use migration_gate_core::BrowserContextId;
use migration_gate_core::BrowserDriver;
use migration_gate_core::FunctionalSummary;
use migration_gate_core::Timestamp;
use scraper::Html;
use scraper::Selector;
use serde::Deserialize;
use serde::Serialize;
use url::Url;

const BROKEN_LINK_TIMEOUT_SECS: u64 = 10;

// ============================================================================
// SECTION: Form Fill Heuristic
// ============================================================================

fn fill_value_for(field_name: &str, field_type: &str) -> &'static str {
    let lowered = field_name.to_ascii_lowercase();
    if field_type == "email" || lowered.contains("email") {
        "test@example.com"
    } else if lowered.contains("name") {
        "Test User"
    } else if lowered.contains("message") || lowered.contains("comment") {
        "Test message"
    } else {
        "test"
    }
}

/// The first form found on a page, filled per the field-name heuristic and
/// ready to submit.
#[derive(Debug, Clone)]
pub struct FormDescriptor {
    /// The form's resolved `action` target.
    pub action_url: Url,
    /// The form's `method` attribute, lowercased (`"get"` when absent).
    pub method: String,
    /// Fields to fill before submitting.
    pub fields: Vec<migration_gate_core::FormField>,
}

/// Finds the first `<form>` on `html` and builds a fillable descriptor for
/// it, resolving a relative `action` against `page_url`.
///
/// Returns `None` when the page has no form, or its `action` does not
/// resolve to a valid URL.
#[must_use]
pub fn extract_form_submission(html: &str, page_url: &Url) -> Option<FormDescriptor> {
    let document = Html::parse_document(html);
    let form_selector = Selector::parse("form").ok()?;
    let form = document.select(&form_selector).next()?;

    let action = form.value().attr("action").unwrap_or("");
    let action_url = if action.is_empty() {
        page_url.clone()
    } else {
        page_url.join(action).ok()?
    };
    let method = form
        .value()
        .attr("method")
        .unwrap_or("get")
        .to_ascii_lowercase();

    let field_selector = Selector::parse("input[name], textarea[name]").ok()?;
    let fields = form
        .select(&field_selector)
        .filter(|el| {
            let input_type = el.value().attr("type").unwrap_or("text");
            !matches!(input_type, "submit" | "button" | "reset" | "image" | "hidden")
        })
        .filter_map(|el| {
            let name = el.value().attr("name")?;
            let field_type = el.value().attr("type").unwrap_or("text");
            Some(migration_gate_core::FormField {
                selector: name.to_string(),
                value: fill_value_for(name, field_type).to_string(),
            })
        })
        .collect();

    Some(FormDescriptor {
        action_url,
        method,
        fields,
    })
}

/// Whether a form submission outcome should be reported as a functional
/// issue: it never resolved, or it resolved with an error status.
#[must_use]
pub fn submission_indicates_issue(submission: &migration_gate_core::FormSubmission) -> bool {
    submission.failure.is_some() || submission.status.is_none_or(|status| status >= 400)
}

// ============================================================================
// SECTION: Broken Link Detection
// ============================================================================

fn is_probeable(href: &str) -> bool {
    let lowered = href.trim().to_ascii_lowercase();
    if lowered.starts_with('#') || lowered.is_empty() {
        return false;
    }
    !(lowered.starts_with("mailto:") || lowered.starts_with("tel:") || lowered.starts_with("javascript:"))
}

fn same_origin_anchors(html: &str, page_url: &Url) -> Vec<Url> {
    let document = Html::parse_document(html);
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };
    document
        .select(&selector)
        .filter_map(|el| el.value().attr("href"))
        .filter(|href| is_probeable(href))
        .filter_map(|href| page_url.join(href).ok())
        .filter(|url| url.host_str() == page_url.host_str() && url.scheme() == page_url.scheme())
        .collect()
}

/// One broken-link finding.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BrokenLink {
    /// The link that failed to resolve.
    pub url: String,
    /// Observed status, when the navigation resolved.
    pub status: Option<u16>,
}

/// Probes every same-origin anchor on `html`, restoring the page between
/// probes. External links are skipped per the default policy.
///
/// # Errors
///
/// Never returns an error; unresolvable individual links are reported as
/// [`BrokenLink`] entries rather than failing the whole probe.
pub async fn probe_broken_links(
    driver: &dyn BrowserDriver,
    ctx: BrowserContextId,
    html: &str,
    page_url: &Url,
) -> Vec<BrokenLink> {
    let mut broken = Vec::new();
    for link in same_origin_anchors(html, page_url) {
        match driver.navigate(ctx, &link, BROKEN_LINK_TIMEOUT_SECS).await {
            Ok(outcome) if outcome.status >= 400 => {
                broken.push(BrokenLink {
                    url: link.to_string(),
                    status: Some(outcome.status),
                });
            }
            Err(_) => {
                broken.push(BrokenLink {
                    url: link.to_string(),
                    status: None,
                });
            }
            Ok(_) => {}
        }
        let _ = driver.go_back(ctx).await;
    }
    broken
}

// ============================================================================
// SECTION: JS Errors
// ============================================================================

/// One JS-error-like console message, classified by method.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JsError {
    /// Source description (the stage emits `"console"` since the reference
    /// driver cannot execute page JavaScript).
    pub source: String,
    /// Error message text.
    pub message: String,
    /// Timestamp the error was observed.
    pub time: Timestamp,
}

/// Filters console messages down to error-level entries.
#[must_use]
pub fn extract_js_errors(messages: &[migration_gate_core::ConsoleMessage]) -> Vec<JsError> {
    messages
        .iter()
        .filter(|message| message.message_type == "error")
        .map(|message| JsError {
            source: "console".into(),
            message: message.text.clone(),
            time: message.time,
        })
        .collect()
}

// ============================================================================
// SECTION: HAR
// ============================================================================

/// A minimal HAR-1.2-shaped document: page timings plus observed network
/// entries. Falls back to an empty-entries document when given no events.
#[must_use]
pub fn build_har(page_url: &str, events: &[migration_gate_core::NetworkEvent]) -> serde_json::Value {
    let entries: Vec<serde_json::Value> = events
        .iter()
        .map(|event| {
            serde_json::json!({
                "startedDateTime": event.time.to_string(),
                "request": {"method": event.method, "url": event.url},
                "response": {
                    "status": event.status.unwrap_or(0),
                    "statusText": event.status_text.clone().unwrap_or_default(),
                },
                "_failure": event.failure,
            })
        })
        .collect();

    serde_json::json!({
        "log": {
            "version": "1.2",
            "creator": {"name": "migration-gate", "version": "1"},
            "pages": [{"id": "page_1", "title": page_url}],
            "entries": entries,
        }
    })
}

// ============================================================================
// SECTION: Per-Side Result & Summary
// ============================================================================

/// One page's functional findings on one side.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PageFunctionalResult {
    /// Whether the final navigation status was an error.
    pub navigation_issue: bool,
    /// Whether any form submission did not succeed cleanly.
    pub form_issue: bool,
    /// Broken links discovered on this page.
    pub broken_links: Vec<BrokenLink>,
    /// JS errors observed on this page.
    pub js_errors: Vec<JsError>,
}

/// Builds the per-side summary counts from a set of per-page results.
#[must_use]
pub fn summarize(results: &[PageFunctionalResult]) -> FunctionalSummary {
    let pages_with_navigation_issues = results.iter().filter(|r| r.navigation_issue).count() as u32;
    let pages_with_form_issues = results.iter().filter(|r| r.form_issue).count() as u32;
    let total_broken_links = results.iter().map(|r| r.broken_links.len() as u32).sum();
    let total_js_errors = results.iter().map(|r| r.js_errors.len() as u32).sum();
    let pages_with_js_errors = results.iter().filter(|r| !r.js_errors.is_empty()).count() as u32;

    FunctionalSummary {
        pages_with_navigation_issues,
        pages_with_form_issues,
        total_broken_links,
        total_js_errors,
        pages_with_js_errors,
    }
}

/// Picks the fill value a form's text input should receive, per the
/// documented heuristic (email field, name-like, message-like, else
/// `"test"`).
#[must_use]
pub fn fill_value(field_name: &str, field_type: &str) -> &'static str {
    fill_value_for(field_name, field_type)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, reason = "test-only assertions")]
mod tests {
    use super::*;

    #[test]
    fn fill_heuristic_matches_email_and_name_fields() {
        assert_eq!(fill_value("user_email", "text"), "test@example.com");
        assert_eq!(fill_value("full_name", "text"), "Test User");
        assert_eq!(fill_value("comment", "text"), "Test message");
        assert_eq!(fill_value("subject", "text"), "test");
        assert_eq!(fill_value("anything", "email"), "test@example.com");
    }

    #[test]
    fn mailto_and_fragment_links_are_not_probeable() {
        assert!(!is_probeable("mailto:a@b.test"));
        assert!(!is_probeable("#section"));
        assert!(!is_probeable("tel:+1234"));
        assert!(!is_probeable("javascript:void(0)"));
        assert!(is_probeable("/about"));
    }

    #[test]
    fn same_origin_anchors_excludes_external_links() {
        let html = r#"<a href="/local">Local</a><a href="https://other.test/x">External</a>"#;
        let page_url = Url::parse("https://example.test/").unwrap();
        let anchors = same_origin_anchors(html, &page_url);
        assert_eq!(anchors.len(), 1);
        assert_eq!(anchors[0].path(), "/local");
    }

    #[test]
    fn extract_form_submission_fills_fields_and_resolves_action() {
        let html = r#"<form action="/contact" method="post">
            <input name="user_email" type="email">
            <input name="full_name" type="text">
            <input name="csrf" type="hidden" value="abc">
            <button type="submit">Send</button>
        </form>"#;
        let page_url = Url::parse("https://example.test/page").unwrap();
        let form = extract_form_submission(html, &page_url).unwrap();
        assert_eq!(form.action_url.as_str(), "https://example.test/contact");
        assert_eq!(form.method, "post");
        assert_eq!(form.fields.len(), 2);
        assert!(form.fields.iter().any(|f| f.selector == "user_email" && f.value == "test@example.com"));
    }

    #[test]
    fn extract_form_submission_is_none_without_a_form() {
        let page_url = Url::parse("https://example.test/page").unwrap();
        assert!(extract_form_submission("<p>no form here</p>", &page_url).is_none());
    }

    #[test]
    fn submission_issue_detection_covers_failure_and_error_status() {
        assert!(submission_indicates_issue(&migration_gate_core::FormSubmission {
            status: None,
            failure: Some("timeout".into()),
        }));
        assert!(submission_indicates_issue(&migration_gate_core::FormSubmission {
            status: Some(500),
            failure: None,
        }));
        assert!(!submission_indicates_issue(&migration_gate_core::FormSubmission {
            status: Some(200),
            failure: None,
        }));
    }

    #[test]
    fn har_falls_back_to_empty_entries_with_no_events() {
        let har = build_har("https://example.test", &[]);
        assert_eq!(har["log"]["entries"].as_array().unwrap().len(), 0);
    }

    #[test]
    fn summary_aggregates_across_pages() {
        let results = vec![
            PageFunctionalResult {
                navigation_issue: true,
                form_issue: false,
                broken_links: vec![BrokenLink {
                    url: "https://example.test/dead".into(),
                    status: Some(404),
                }],
                js_errors: Vec::new(),
            },
            PageFunctionalResult {
                navigation_issue: false,
                form_issue: true,
                broken_links: Vec::new(),
                js_errors: vec![JsError {
                    source: "console".into(),
                    message: "boom".into(),
                    time: Timestamp::parse("2026-01-01T00:00:00Z").unwrap(),
                }],
            },
        ];
        let summary = summarize(&results);
        assert_eq!(summary.pages_with_navigation_issues, 1);
        assert_eq!(summary.pages_with_form_issues, 1);
        assert_eq!(summary.total_broken_links, 1);
        assert_eq!(summary.pages_with_js_errors, 1);
    }
}
