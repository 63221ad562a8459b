// crates/migration-gate-providers/src/llm.rs
// ============================================================================
// Module: LLM Reasoner
// Description: Reasoner backed by a chat-completions-shaped LLM endpoint.
// Purpose: Turn a diff summary into the shared reasoning output shape via a
// structured prompt and lenient JSON extraction.
// Dependencies: migration-gate-core, async-trait, reqwest, serde_json
// ============================================================================

//! ## Overview
//! The prompt asks for exactly one JSON object matching `ReasoningAnalysis`.
//! Providers are not always well-behaved: some wrap the object in prose or
//! a Markdown code fence, so the response is parsed by extracting the first
//! balanced `{...}` span before deserializing.

// ============================================================================
// SECTION: Imports
// ============================================================================

use async_trait::async_trait;
use migration_gate_core::DiffSummaryInput;
use migration_gate_core::Reasoner;
use migration_gate_core::ReasoningAnalysis;
use migration_gate_core::ReasoningError;
use url::Url;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Upper bound on sampling temperature, per the documented requirement that
/// the LLM reasoner run at low temperature.
const MAX_TEMPERATURE: f64 = 0.3;

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Connection details for an LLM chat-completions endpoint.
#[derive(Debug, Clone)]
pub struct LlmReasonerConfig {
    /// Full URL of the chat-completions endpoint.
    pub endpoint: Url,
    /// Bearer token for the provider.
    pub api_key: String,
    /// Deployment or model name sent in the request body.
    pub deployment_name: String,
    /// Sampling temperature; clamped to `MAX_TEMPERATURE` if higher.
    pub temperature: f64,
}

impl LlmReasonerConfig {
    /// Builds a config with the documented low-temperature default (0.2).
    #[must_use]
    pub fn new(endpoint: Url, api_key: impl Into<String>, deployment_name: impl Into<String>) -> Self {
        Self {
            endpoint,
            api_key: api_key.into(),
            deployment_name: deployment_name.into(),
            temperature: 0.2,
        }
    }

    fn clamped_temperature(&self) -> f64 {
        self.temperature.min(MAX_TEMPERATURE)
    }
}

// ============================================================================
// SECTION: Prompt
// ============================================================================

fn build_prompt(input: &DiffSummaryInput) -> String {
    let summary_json = serde_json::to_string_pretty(input).unwrap_or_default();
    format!(
        "You are assessing a website migration. Given the diff summary below, \
         respond with exactly one JSON object matching this shape and nothing else: \
         {{\"categories\":[{{\"category\":\"visual|functional|data\",\"severity\":\"none|low|medium|high|critical\",\
         \"confidence\":0.0,\"pass\":true,\"explanation\":\"...\",\"keyFindings\":[],\
         \"falsePositives\":[],\"expectedChanges\":[]}}],\"overall\":{{\"severity\":\"...\",\
         \"confidence\":0.0,\"pass\":true,\"explanation\":\"...\",\"recommendations\":[]}}}}.\n\n\
         Diff summary:\n{summary_json}"
    )
}

/// Scans `text` for the first balanced `{...}` span, tolerating quoted
/// braces and escaped quotes, and returns its contents.
#[must_use]
pub fn extract_first_balanced_json_object(text: &str) -> Option<&str> {
    let bytes = text.as_bytes();
    let start = text.find('{')?;
    let mut depth = 0i32;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, &byte) in bytes.iter().enumerate().skip(start) {
        if in_string {
            if escaped {
                escaped = false;
            } else if byte == b'\\' {
                escaped = true;
            } else if byte == b'"' {
                in_string = false;
            }
            continue;
        }
        match byte {
            b'"' => in_string = true,
            b'{' => depth += 1,
            b'}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..=offset]);
                }
            }
            _ => {}
        }
    }
    None
}

// ============================================================================
// SECTION: Reasoner
// ============================================================================

/// Reasoner backed by a real chat-completions-shaped LLM endpoint.
pub struct LlmReasoner {
    client: reqwest::Client,
    config: LlmReasonerConfig,
}

impl LlmReasoner {
    /// Builds a reasoner against `config`.
    #[must_use]
    pub fn new(config: LlmReasonerConfig) -> Self {
        Self {
            client: reqwest::Client::new(),
            config,
        }
    }
}

#[async_trait]
impl Reasoner for LlmReasoner {
    async fn analyze(&self, input: &DiffSummaryInput) -> Result<ReasoningAnalysis, ReasoningError> {
        let body = serde_json::json!({
            "model": self.config.deployment_name,
            "temperature": self.config.clamped_temperature(),
            "messages": [{"role": "user", "content": build_prompt(input)}],
            "response_format": {"type": "json_object"},
        });

        let response = self
            .client
            .post(self.config.endpoint.clone())
            .bearer_auth(&self.config.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|err| ReasoningError::ProviderRequest(err.to_string()))?
            .error_for_status()
            .map_err(|err| ReasoningError::ProviderRequest(err.to_string()))?;

        let raw_text = response
            .text()
            .await
            .map_err(|err| ReasoningError::ProviderRequest(err.to_string()))?;

        let content = extract_message_content(&raw_text).unwrap_or(raw_text.as_str());
        let json_object = extract_first_balanced_json_object(content).ok_or_else(|| {
            ReasoningError::InvalidResponse("no JSON object found in provider response".into())
        })?;

        serde_json::from_str(json_object)
            .map_err(|err| ReasoningError::InvalidResponse(err.to_string()))
    }
}

/// Unwraps a chat-completions envelope (`choices[0].message.content`) if the
/// response is shaped that way; otherwise returns `None` so the caller falls
/// back to scanning the raw body.
fn extract_message_content(raw_text: &str) -> Option<&str> {
    let envelope: serde_json::Value = serde_json::from_str(raw_text).ok()?;
    let content = envelope
        .get("choices")?
        .get(0)?
        .get("message")?
        .get("content")?
        .as_str()?;
    let start = raw_text.find(content)?;
    Some(&raw_text[start..start + content.len()])
}
