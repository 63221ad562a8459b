// crates/migration-gate-providers/src/fetch_driver.rs
// ============================================================================
// Module: Fetch-Based Browser Driver
// Description: A deterministic BrowserDriver built on plain HTTP fetch and
// HTML parsing, standing in for a real headless browser.
// Purpose: Satisfy the BrowserDriver contract well enough to drive and test
// the pipeline without a real browser dependency.
// Dependencies: migration-gate-core, reqwest, scraper, image, tokio
// ============================================================================

//! ## Overview
//! This driver cannot execute page JavaScript, so it never observes console
//! messages or runtime network activity beyond the documents it fetches
//! itself. What it does guarantee: navigation is real HTTP (redirects,
//! status codes, timeouts all genuine), and two navigations to
//! byte-identical content always produce byte-identical screenshots and DOM
//! snapshots, which is what the zero-diff and determinism properties need.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::HashMap;
use std::collections::hash_map::DefaultHasher;
use std::hash::Hash;
use std::hash::Hasher;
use std::io::Cursor;
use std::sync::Mutex;
use std::time::Duration;
use std::time::Instant;

use migration_gate_core::BrowserContextId;
use migration_gate_core::BrowserDriver;
use migration_gate_core::BrowserError;
use migration_gate_core::ConsoleMessage;
use migration_gate_core::DomSnapshot;
use migration_gate_core::FormField;
use migration_gate_core::FormSubmission;
use migration_gate_core::NavigationOutcome;
use migration_gate_core::NetworkEvent;
use migration_gate_core::Timestamp;
use migration_gate_core::Viewport;
use scraper::Html;
use scraper::Selector;
use url::Url;

// ============================================================================
// SECTION: Context State
// ============================================================================

struct ContextState {
    viewport: Viewport,
    history: Vec<String>,
    last_html: Option<String>,
    network: Vec<NetworkEvent>,
}

impl ContextState {
    fn new(viewport: Viewport) -> Self {
        Self {
            viewport,
            history: Vec::new(),
            last_html: None,
            network: Vec::new(),
        }
    }
}

// ============================================================================
// SECTION: Driver
// ============================================================================

/// A `BrowserDriver` implementation backed by `reqwest` and `scraper`.
pub struct FetchBrowserDriver {
    client: reqwest::Client,
    contexts: Mutex<HashMap<BrowserContextId, ContextState>>,
}

impl FetchBrowserDriver {
    /// Builds a driver with redirect-following enabled, matching "standard
    /// HTTP(S) with standard redirect following".
    #[must_use]
    pub fn new() -> Self {
        Self {
            client: reqwest::Client::builder()
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            contexts: Mutex::new(HashMap::new()),
        }
    }

    fn with_context<R>(
        &self,
        ctx: BrowserContextId,
        op: impl FnOnce(&mut ContextState) -> R,
    ) -> Result<R, BrowserError> {
        let mut contexts = self
            .contexts
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        let state = contexts.get_mut(&ctx).ok_or(BrowserError::UnknownContext)?;
        Ok(op(state))
    }
}

impl Default for FetchBrowserDriver {
    fn default() -> Self {
        Self::new()
    }
}

fn visible_text(document: &Html) -> String {
    let hidden_ids: std::collections::HashSet<_> = Selector::parse(
        "script, style, \
         [style*=\"display:none\"], [style*=\"display: none\"], \
         [style*=\"visibility:hidden\"], [style*=\"visibility: hidden\"]",
    )
    .map(|hidden| document.select(&hidden).map(|el| el.id()).collect())
    .unwrap_or_default();

    let mut text = String::new();
    for node in document.root_element().descendants() {
        let Some(fragment) = node.value().as_text() else {
            continue;
        };
        let under_hidden = node
            .ancestors()
            .any(|ancestor| hidden_ids.contains(&ancestor.id()));
        if !under_hidden {
            text.push_str(fragment);
            text.push(' ');
        }
    }
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn synthetic_screenshot(html: &str, viewport: Viewport) -> Vec<u8> {
    let mut hasher = DefaultHasher::new();
    html.hash(&mut hasher);
    let digest = hasher.finish().to_le_bytes();
    let [r, g, b, ..] = digest else {
        unreachable!("u64 always yields 8 bytes")
    };

    let image = image::RgbImage::from_fn(viewport.width, viewport.height, |_, _| {
        image::Rgb([r, g, b])
    });

    let mut bytes = Vec::new();
    image::DynamicImage::ImageRgb8(image)
        .write_to(&mut Cursor::new(&mut bytes), image::ImageFormat::Png)
        .unwrap_or_default();
    bytes
}

#[async_trait::async_trait]
impl BrowserDriver for FetchBrowserDriver {
    async fn open_context(&self, viewport: Viewport) -> Result<BrowserContextId, BrowserError> {
        let id = BrowserContextId::new();
        self.contexts
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(id, ContextState::new(viewport));
        Ok(id)
    }

    async fn navigate(
        &self,
        ctx: BrowserContextId,
        url: &Url,
        timeout_secs: u64,
    ) -> Result<NavigationOutcome, BrowserError> {
        let started = Instant::now();
        let request = self.client.get(url.clone()).send();
        let result = tokio::time::timeout(Duration::from_secs(timeout_secs), request).await;

        let now = Timestamp::from_offset(time::OffsetDateTime::now_utc());
        let response = match result {
            Err(_) => {
                self.with_context(ctx, |state| {
                    state.network.push(NetworkEvent {
                        url: url.to_string(),
                        method: "GET".into(),
                        time: now,
                        status: None,
                        status_text: None,
                        response_headers: Vec::new(),
                        failure: Some("timeout".into()),
                    });
                })?;
                return Err(BrowserError::NavigationTimeout {
                    url: url.to_string(),
                    timeout_secs,
                });
            }
            Ok(Err(err)) => {
                self.with_context(ctx, |state| {
                    state.network.push(NetworkEvent {
                        url: url.to_string(),
                        method: "GET".into(),
                        time: now,
                        status: None,
                        status_text: None,
                        response_headers: Vec::new(),
                        failure: Some(err.to_string()),
                    });
                })?;
                return Err(BrowserError::NavigationFailed {
                    url: url.to_string(),
                    message: err.to_string(),
                });
            }
            Ok(Ok(response)) => response,
        };

        let final_url = response.url().to_string();
        let status = response.status().as_u16();
        let status_text = response
            .status()
            .canonical_reason()
            .unwrap_or_default()
            .to_string();
        let headers = response
            .headers()
            .iter()
            .map(|(name, value)| {
                (
                    name.to_string(),
                    value.to_str().unwrap_or_default().to_string(),
                )
            })
            .collect();
        let body = response
            .text()
            .await
            .map_err(|err| BrowserError::NavigationFailed {
                url: url.to_string(),
                message: err.to_string(),
            })?;
        let load_time_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        self.with_context(ctx, |state| {
            state.last_html = Some(body);
            state.history.push(final_url.clone());
            state.network.push(NetworkEvent {
                url: url.to_string(),
                method: "GET".into(),
                time: now,
                status: Some(status),
                status_text: Some(status_text),
                response_headers: headers,
                failure: None,
            });
        })?;

        Ok(NavigationOutcome {
            final_url,
            status,
            load_time_ms,
        })
    }

    async fn screenshot_png(&self, ctx: BrowserContextId) -> Result<Vec<u8>, BrowserError> {
        self.with_context(ctx, |state| {
            let html = state.last_html.clone().unwrap_or_default();
            synthetic_screenshot(&html, state.viewport)
        })
    }

    async fn snapshot_dom(&self, ctx: BrowserContextId) -> Result<DomSnapshot, BrowserError> {
        self.with_context(ctx, |state| {
            let html = state.last_html.clone().unwrap_or_default();
            let document = Html::parse_document(&html);
            DomSnapshot {
                visible_text: visible_text(&document),
                html,
            }
        })
    }

    async fn drain_console_messages(&self, _ctx: BrowserContextId) -> Vec<ConsoleMessage> {
        Vec::new()
    }

    async fn drain_network_events(&self, ctx: BrowserContextId) -> Vec<NetworkEvent> {
        self.with_context(ctx, |state| std::mem::take(&mut state.network))
            .unwrap_or_default()
    }

    async fn go_back(&self, ctx: BrowserContextId) -> Result<(), BrowserError> {
        self.with_context(ctx, |state| {
            state.history.pop();
        })
    }

    async fn submit_form(
        &self,
        ctx: BrowserContextId,
        action_url: &Url,
        method: &str,
        fields: &[FormField],
    ) -> Result<FormSubmission, BrowserError> {
        self.with_context(ctx, |_| ())?;

        let form: Vec<(&str, &str)> = fields
            .iter()
            .map(|field| (field.selector.as_str(), field.value.as_str()))
            .collect();

        let request = if method.eq_ignore_ascii_case("get") {
            self.client.get(action_url.clone()).query(&form)
        } else {
            self.client.post(action_url.clone()).form(&form)
        };

        let now = Timestamp::from_offset(time::OffsetDateTime::now_utc());
        let response = match request.send().await {
            Ok(response) => response,
            Err(err) => {
                self.with_context(ctx, |state| {
                    state.network.push(NetworkEvent {
                        url: action_url.to_string(),
                        method: method.to_ascii_uppercase(),
                        time: now,
                        status: None,
                        status_text: None,
                        response_headers: Vec::new(),
                        failure: Some(err.to_string()),
                    });
                })?;
                return Ok(FormSubmission {
                    status: None,
                    failure: Some(err.to_string()),
                });
            }
        };

        let status = response.status().as_u16();
        self.with_context(ctx, |state| {
            state.network.push(NetworkEvent {
                url: action_url.to_string(),
                method: method.to_ascii_uppercase(),
                time: now,
                status: Some(status),
                status_text: response
                    .status()
                    .canonical_reason()
                    .map(ToString::to_string),
                response_headers: Vec::new(),
                failure: None,
            });
        })?;

        Ok(FormSubmission {
            status: Some(status),
            failure: None,
        })
    }

    async fn close_context(&self, ctx: BrowserContextId) -> Result<(), BrowserError> {
        self.contexts
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .remove(&ctx);
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used, reason = "test-only assertions")]
mod tests {
    use super::*;

    fn fake_server() -> (tiny_http::Server, String) {
        let server = tiny_http::Server::http("127.0.0.1:0").unwrap();
        let addr = server.server_addr().to_string();
        let url = format!("http://{addr}/");
        (server, url)
    }

    #[tokio::test]
    async fn navigate_to_unknown_context_is_an_error() {
        let driver = FetchBrowserDriver::new();
        let result = driver
            .navigate(
                BrowserContextId::new(),
                &Url::parse("https://example.test").unwrap(),
                1,
            )
            .await;
        assert!(matches!(result, Err(BrowserError::UnknownContext)));
    }

    #[tokio::test]
    async fn identical_html_produces_identical_screenshots() {
        let driver = FetchBrowserDriver::new();
        let ctx_a = driver.open_context(Viewport::DESKTOP).await.unwrap();
        let ctx_b = driver.open_context(Viewport::DESKTOP).await.unwrap();

        driver
            .with_context(ctx_a, |state| {
                state.last_html = Some("<html><body>hello</body></html>".into());
            })
            .unwrap();
        driver
            .with_context(ctx_b, |state| {
                state.last_html = Some("<html><body>hello</body></html>".into());
            })
            .unwrap();

        let shot_a = driver.screenshot_png(ctx_a).await.unwrap();
        let shot_b = driver.screenshot_png(ctx_b).await.unwrap();
        assert_eq!(shot_a, shot_b);
    }

    #[tokio::test]
    async fn snapshot_dom_excludes_script_and_style_text() {
        let driver = FetchBrowserDriver::new();
        let ctx = driver.open_context(Viewport::DESKTOP).await.unwrap();
        driver
            .with_context(ctx, |state| {
                state.last_html = Some(
                    "<html><body><script>var x = 1;</script><p>Visible</p></body></html>".into(),
                );
            })
            .unwrap();

        let snapshot = driver.snapshot_dom(ctx).await.unwrap();
        assert!(!snapshot.visible_text.contains("var x"));
        assert!(snapshot.visible_text.contains("Visible"));
    }

    #[tokio::test]
    async fn fetches_a_real_page_over_http() {
        let (server, url) = fake_server();
        let handle = std::thread::spawn(move || {
            if let Ok(Some(mut request)) = server.recv_timeout(Duration::from_secs(2)) {
                let response = tiny_http::Response::from_string("<html><body>hi</body></html>");
                let _ = request.respond(response);
            }
        });

        let driver = FetchBrowserDriver::new();
        let ctx = driver.open_context(Viewport::DESKTOP).await.unwrap();
        let outcome = driver
            .navigate(ctx, &Url::parse(&url).unwrap(), 5)
            .await
            .unwrap();
        assert_eq!(outcome.status, 200);
        handle.join().unwrap();
    }

    #[tokio::test]
    async fn submit_form_records_the_response_status() {
        let (server, url) = fake_server();
        let handle = std::thread::spawn(move || {
            if let Ok(Some(mut request)) = server.recv_timeout(Duration::from_secs(2)) {
                let response = tiny_http::Response::from_string("thanks").with_status_code(200);
                let _ = request.respond(response);
            }
        });

        let driver = FetchBrowserDriver::new();
        let ctx = driver.open_context(Viewport::DESKTOP).await.unwrap();
        let submission = driver
            .submit_form(
                ctx,
                &Url::parse(&url).unwrap(),
                "post",
                &[FormField {
                    selector: "email".into(),
                    value: "test@example.com".into(),
                }],
            )
            .await
            .unwrap();
        assert_eq!(submission.status, Some(200));
        assert!(submission.failure.is_none());
        handle.join().unwrap();
    }

    #[tokio::test]
    async fn submit_form_on_unknown_context_is_an_error() {
        let driver = FetchBrowserDriver::new();
        let result = driver
            .submit_form(
                BrowserContextId::new(),
                &Url::parse("https://example.test").unwrap(),
                "post",
                &[],
            )
            .await;
        assert!(matches!(result, Err(BrowserError::UnknownContext)));
    }
}
