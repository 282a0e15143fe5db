//! Text completion with an offline fallback.
//!
//! [`CompletionClient`] is the seam to a remote model. [`Responder`] wraps
//! an optional client and always produces an answer: when no client is
//! configured, or the call fails or times out, it summarizes the prompt
//! locally with [`fallback_response`].
//!
//! # Providers
//!
//! | `llm.provider` | Client |
//! |----------------|--------|
//! | `"openai"` (with API key) | [`OpenAiClient`] |
//! | `"openai"` (no API key) | none, fallback only |
//! | `"disabled"` | none, fallback only |

use async_trait::async_trait;
use std::time::Duration;
use tracing::{debug, warn};

use crate::config::LlmConfig;
use crate::error::{Error, Result};

/// Maximum width of an item echoed by the fallback summarizer.
pub const ITEM_WIDTH: usize = 120;
const PLACEHOLDER: &str = " [...]";
const ITEMS_PER_SECTION: usize = 2;

pub const EMPTY_FALLBACK: &str = "No stored knowledge or tasks yet; add notes with add-note.";

/// A remote text-completion service.
#[async_trait]
pub trait CompletionClient: Send + Sync {
    async fn complete(&self, system: &str, user: &str) -> Result<String>;
}

// ============ OpenAI Responses API ============

/// Client for `POST {base_url}/responses`.
pub struct OpenAiClient {
    http: reqwest::Client,
    base_url: String,
    model: String,
    api_key: String,
    temperature: f32,
}

impl OpenAiClient {
    pub fn new(config: &LlmConfig, api_key: impl Into<String>) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self {
            http,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            model: config.model.clone(),
            api_key: api_key.into(),
            temperature: config.temperature,
        })
    }
}

#[async_trait]
impl CompletionClient for OpenAiClient {
    async fn complete(&self, system: &str, user: &str) -> Result<String> {
        let body = serde_json::json!({
            "model": self.model,
            "input": [
                { "role": "system", "content": system },
                { "role": "user", "content": user },
            ],
            "temperature": self.temperature,
        });

        let response = self
            .http
            .post(format!("{}/responses", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body_text = response.text().await.unwrap_or_default();
            return Err(Error::Completion(format!(
                "OpenAI API error {}: {}",
                status, body_text
            )));
        }

        let json: serde_json::Value = response.json().await?;
        parse_response_text(&json)
    }
}

/// Pull the reply text out of a Responses API payload.
///
/// Prefers the first `output_text` part of the first `message` output
/// item, then the top-level `output_text` convenience field.
pub fn parse_response_text(json: &serde_json::Value) -> Result<String> {
    let from_output = json
        .get("output")
        .and_then(|o| o.as_array())
        .and_then(|items| {
            items
                .iter()
                .find(|item| item.get("type").and_then(|t| t.as_str()) == Some("message"))
        })
        .and_then(|message| message.get("content"))
        .and_then(|c| c.as_array())
        .and_then(|parts| {
            parts
                .iter()
                .find(|part| part.get("type").and_then(|t| t.as_str()) == Some("output_text"))
        })
        .and_then(|part| part.get("text"))
        .and_then(|t| t.as_str());

    from_output
        .or_else(|| json.get("output_text").and_then(|t| t.as_str()))
        .map(str::to_string)
        .ok_or_else(|| Error::Completion("Invalid OpenAI response: no output text".to_string()))
}

/// Build the remote client described by `config`, if it can be used.
pub fn build_client(config: &LlmConfig) -> Option<Box<dyn CompletionClient>> {
    if !config.has_credentials() {
        debug!(provider = %config.provider, "no completion credentials; using fallback");
        return None;
    }
    let api_key = config.api_key.clone()?;
    match OpenAiClient::new(config, api_key) {
        Ok(client) => Some(Box::new(client)),
        Err(e) => {
            warn!(error = %e, "unable to initialize completion client");
            None
        }
    }
}

// ============ Responder ============

/// Completion front end that never fails.
pub struct Responder {
    client: Option<Box<dyn CompletionClient>>,
    timeout: Duration,
}

impl Responder {
    pub fn new(client: Option<Box<dyn CompletionClient>>, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    pub fn from_config(config: &LlmConfig) -> Self {
        Self::new(build_client(config), Duration::from_secs(config.timeout_secs))
    }

    /// Responder that always answers locally.
    pub fn offline() -> Self {
        Self::new(None, Duration::from_secs(1))
    }

    pub fn has_client(&self) -> bool {
        self.client.is_some()
    }

    pub async fn respond(&self, system: &str, user: &str) -> String {
        if let Some(client) = &self.client {
            let outcome = tokio::time::timeout(self.timeout, client.complete(system, user))
                .await
                .unwrap_or_else(|_| Err(Error::Timeout(self.timeout)));
            match outcome {
                Ok(text) => return text,
                Err(e) => {
                    warn!(error = %e, "completion failed, falling back to local summary");
                }
            }
        }
        fallback_response(user)
    }
}

// ============ Local fallback ============

/// Deterministic summary of a composed prompt.
pub fn fallback_response(prompt: &str) -> String {
    let (knowledge, tasks) = extract_sections(prompt);
    let mut parts = Vec::new();
    if !knowledge.is_empty() {
        let items: Vec<&str> = knowledge.iter().take(ITEMS_PER_SECTION).map(String::as_str).collect();
        parts.push(format!("Knowledge insights: {}.", items.join(", ")));
    }
    if !tasks.is_empty() {
        let items: Vec<&str> = tasks.iter().take(ITEMS_PER_SECTION).map(String::as_str).collect();
        parts.push(format!("Suggested tasks: {}.", items.join(", ")));
    }
    if parts.is_empty() {
        return EMPTY_FALLBACK.to_string();
    }
    parts.join(" ")
}

#[derive(Clone, Copy, PartialEq)]
enum Section {
    Knowledge,
    Tasks,
}

/// Collect the `- ` items under the `Knowledge entries` and `Tasks:`
/// headings, each shortened to [`ITEM_WIDTH`].
///
/// Lines are matched by prefix only. A multi-line note whose content has a
/// line starting with `- ` is read as extra items, and a line starting with
/// `Tasks:` switches the section.
pub fn extract_sections(prompt: &str) -> (Vec<String>, Vec<String>) {
    let mut knowledge = Vec::new();
    let mut tasks = Vec::new();
    let mut current = None;

    for line in prompt.lines().map(str::trim).filter(|l| !l.is_empty()) {
        let lower = line.to_lowercase();
        if lower.starts_with("knowledge entries") {
            current = Some(Section::Knowledge);
            continue;
        }
        if lower.starts_with("tasks:") {
            current = Some(Section::Tasks);
            continue;
        }
        if let Some(item) = line.strip_prefix("- ") {
            match current {
                Some(Section::Knowledge) => knowledge.push(shorten(item, ITEM_WIDTH)),
                Some(Section::Tasks) => tasks.push(shorten(item, ITEM_WIDTH)),
                None => {}
            }
        }
    }

    (knowledge, tasks)
}

/// Collapse whitespace and cut `text` at a word boundary so the result,
/// including the ` [...]` placeholder, fits in `width` characters.
pub fn shorten(text: &str, width: usize) -> String {
    let words: Vec<&str> = text.split_whitespace().collect();
    let collapsed = words.join(" ");
    if collapsed.chars().count() <= width {
        return collapsed;
    }

    let budget = width.saturating_sub(PLACEHOLDER.chars().count());
    let mut out = String::new();
    for word in words {
        let extra = if out.is_empty() { 0 } else { 1 } + word.chars().count();
        if out.chars().count() + extra > budget {
            break;
        }
        if !out.is_empty() {
            out.push(' ');
        }
        out.push_str(word);
    }
    if out.is_empty() {
        return PLACEHOLDER.trim_start().to_string();
    }
    out.push_str(PLACEHOLDER);
    out
}
