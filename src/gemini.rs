//! Minimal Gemini client for our use-cases.
//!
//! We only call `models/{model}:generateContent` and request either plain text or
//! schema-constrained JSON. Calls are instrumented and log model name, latency and
//! response size (not contents).
//!
//! Failures are classified into `BackendErrorKind` here, at the adapter boundary,
//! from the HTTP status and the Google RPC status in the error body.
//!
//! NOTE: We never log the API key.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{CONTENT_TYPE, USER_AGENT};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{info, instrument, warn};

use crate::error::{BackendError, BackendErrorKind};
use crate::prompt::GenerationPrompt;

/// Outbound "generate content" call. Implementations translate their transport
/// signals into `BackendError` kinds.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
  async fn generate_content(&self, prompt: &GenerationPrompt) -> Result<String, BackendError>;
}

#[derive(Clone)]
pub struct Gemini {
  pub client: reqwest::Client,
  pub api_key: String,
  pub base_url: String,
  pub model: String,
}

impl Gemini {
  pub fn new(api_key: String, base_url: String, model: String) -> Result<Self, BackendError> {
    // Per-attempt deadlines are enforced by the executor; this only bounds a stuck socket.
    let client = reqwest::Client::builder()
      .timeout(Duration::from_secs(600))
      .build()
      .map_err(|e| BackendError::new(BackendErrorKind::Transport, e.to_string()))?;
    Ok(Self { client, api_key, base_url: base_url.trim_end_matches('/').to_string(), model })
  }

  /// Construct the client if we find GEMINI_API_KEY; otherwise return None.
  pub fn from_env() -> Option<Self> {
    let api_key = std::env::var("GEMINI_API_KEY").ok().filter(|k| !k.trim().is_empty())?;
    let base_url = std::env::var("GEMINI_BASE_URL")
      .unwrap_or_else(|_| "https://generativelanguage.googleapis.com/v1beta".into());
    let model = std::env::var("GEMINI_MODEL").unwrap_or_else(|_| "gemini-2.5-flash".into());
    Self::new(api_key.trim().to_string(), base_url, model).ok()
  }

  fn build_request(&self, prompt: &GenerationPrompt) -> GenerateContentRequest {
    let json_mode = prompt.config.response_schema.is_some();
    GenerateContentRequest {
      contents: vec![Content { parts: vec![Part { text: prompt.text.clone() }] }],
      generation_config: GenerationConfig {
        temperature: prompt.config.temperature,
        response_mime_type: json_mode.then(|| "application/json".to_string()),
        response_schema: prompt.config.response_schema.clone(),
        thinking_config: prompt.config.thinking_budget.map(|thinking_budget| ThinkingConfig { thinking_budget }),
      },
    }
  }
}

#[async_trait]
impl GenerationBackend for Gemini {
  #[instrument(level = "info", skip(self, prompt), fields(model = %self.model, prompt_len = prompt.text.len(), json = prompt.config.response_schema.is_some()))]
  async fn generate_content(&self, prompt: &GenerationPrompt) -> Result<String, BackendError> {
    let url = format!("{}/models/{}:generateContent", self.base_url, self.model);
    let req = self.build_request(prompt);

    let start = std::time::Instant::now();
    let res = self.client.post(&url)
      .header(USER_AGENT, "teachgen-backend/0.1")
      .header(CONTENT_TYPE, "application/json")
      .header("x-goog-api-key", &self.api_key)
      .json(&req).send().await.map_err(classify_transport)?;

    if !res.status().is_success() {
      let status = res.status().as_u16();
      let body = res.text().await.unwrap_or_default();
      return Err(classify_http_failure(status, &body));
    }

    let body: GenerateContentResponse = res.json().await.map_err(|e| {
      BackendError::new(BackendErrorKind::Unparseable, format!("response envelope: {e}"))
    })?;
    if let Some(usage) = &body.usage_metadata {
      info!(prompt_tokens = ?usage.prompt_token_count, candidates_tokens = ?usage.candidates_token_count, thoughts_tokens = ?usage.thoughts_token_count, "Gemini usage");
    }

    let text = body.text();
    info!(elapsed = ?start.elapsed(), response_len = text.len(), "Gemini response received");
    if text.is_empty() {
      // The call itself succeeded; an empty body is judged by the caller's output parsing.
      let reason = body.candidates.first().and_then(|c| c.finish_reason.clone()).unwrap_or_else(|| "no candidates".into());
      warn!(%reason, "Gemini returned empty text");
    }
    Ok(text)
  }
}

// --- Classification ---

fn classify_transport(e: reqwest::Error) -> BackendError {
  let kind = if e.is_timeout() { BackendErrorKind::Timeout } else { BackendErrorKind::Transport };
  BackendError::new(kind, e.to_string())
}

/// Map an HTTP failure (status + Google error body) to a taxonomy kind.
pub fn classify_http_failure(status: u16, body: &str) -> BackendError {
  let parsed = extract_google_error(body);
  let rpc_status = parsed.as_ref().and_then(|e| e.status.clone()).unwrap_or_default();
  let message = parsed.map(|e| e.message).filter(|m| !m.is_empty()).unwrap_or_else(|| body.trim().to_string());

  let kind = match (status, rpc_status.as_str()) {
    (503, _) | (_, "UNAVAILABLE") => BackendErrorKind::Overloaded,
    (504, _) | (_, "DEADLINE_EXCEEDED") => BackendErrorKind::Timeout,
    (401 | 403, _) | (_, "PERMISSION_DENIED" | "UNAUTHENTICATED") => BackendErrorKind::PermissionDenied,
    (429, _) | (_, "RESOURCE_EXHAUSTED") => BackendErrorKind::QuotaExceeded,
    (400 | 404 | 413 | 422, _) | (_, "INVALID_ARGUMENT" | "FAILED_PRECONDITION" | "NOT_FOUND") => BackendErrorKind::InvalidRequest,
    _ => BackendErrorKind::Other,
  };
  BackendError { kind, status: Some(status), message }
}

#[derive(Deserialize)]
struct GoogleErrorObj {
  #[serde(default)] message: String,
  #[serde(default)] status: Option<String>,
}

/// Try to extract a clean error object from a Google API error body.
fn extract_google_error(body: &str) -> Option<GoogleErrorObj> {
  #[derive(Deserialize)]
  struct EWrap { error: GoogleErrorObj }
  serde_json::from_str::<EWrap>(body).ok().map(|w| w.error)
}

// --- Wire DTOs ---

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentRequest {
  contents: Vec<Content>,
  generation_config: GenerationConfig,
}

#[derive(Serialize)]
struct Content { parts: Vec<Part> }

#[derive(Serialize)]
struct Part { text: String }

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct GenerationConfig {
  temperature: f32,
  #[serde(skip_serializing_if = "Option::is_none")]
  response_mime_type: Option<String>,
  #[serde(skip_serializing_if = "Option::is_none")]
  response_schema: Option<Value>,
  #[serde(skip_serializing_if = "Option::is_none")]
  thinking_config: Option<ThinkingConfig>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct ThinkingConfig { thinking_budget: u32 }

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct GenerateContentResponse {
  #[serde(default)] candidates: Vec<Candidate>,
  #[serde(default)] usage_metadata: Option<UsageMetadata>,
}

impl GenerateContentResponse {
  /// Concatenate the text parts of the first candidate, skipping thought parts.
  fn text(&self) -> String {
    self.candidates
      .first()
      .and_then(|c| c.content.as_ref())
      .map(|c| {
        c.parts.iter()
          .filter(|p| !p.thought)
          .filter_map(|p| p.text.as_deref())
          .collect::<String>()
      })
      .unwrap_or_default()
  }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct Candidate {
  #[serde(default)] content: Option<CandidateContent>,
  #[serde(default)] finish_reason: Option<String>,
}

#[derive(Deserialize)]
struct CandidateContent { #[serde(default)] parts: Vec<CandidatePart> }

#[derive(Deserialize)]
struct CandidatePart {
  #[serde(default)] text: Option<String>,
  #[serde(default)] thought: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct UsageMetadata {
  #[serde(default)] prompt_token_count: Option<u32>,
  #[serde(default)] candidates_token_count: Option<u32>,
  #[serde(default)] thoughts_token_count: Option<u32>,
}
