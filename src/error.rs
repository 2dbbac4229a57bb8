//! Error taxonomy for the generation pipeline.
//!
//! The backend adapter classifies transport/HTTP failures into a `BackendErrorKind`
//! at the boundary; the retry policy only ever looks at the kind.

use serde::Serialize;
use thiserror::Error;

/// Classified failure signal from the generation backend.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendErrorKind {
  /// 503 / UNAVAILABLE / "overloaded" signal.
  Overloaded,
  /// A single attempt exceeded its deadline.
  Timeout,
  PermissionDenied,
  QuotaExceeded,
  InvalidRequest,
  /// Connection-level failure (DNS, refused, reset).
  Transport,
  /// The backend answered 2xx but the envelope had no text.
  Unparseable,
  Other,
}

impl BackendErrorKind {
  /// Only these kinds are worth sleeping and reissuing for.
  pub fn is_transient(self) -> bool {
    matches!(self, BackendErrorKind::Overloaded | BackendErrorKind::Timeout)
  }
}

#[derive(Clone, Debug, Error, PartialEq)]
#[error("{kind:?}{}: {message}", fmt_status(.status))]
pub struct BackendError {
  pub kind: BackendErrorKind,
  pub status: Option<u16>,
  pub message: String,
}

fn fmt_status(status: &Option<u16>) -> String {
  status.map(|s| format!(" (HTTP {s})")).unwrap_or_default()
}

impl BackendError {
  pub fn new(kind: BackendErrorKind, message: impl Into<String>) -> Self {
    Self { kind, status: None, message: message.into() }
  }

  pub fn with_status(mut self, status: u16) -> Self {
    self.status = Some(status);
    self
  }

  pub fn is_transient(&self) -> bool {
    self.kind.is_transient()
  }
}

/// Local precondition failure, raised before any network activity.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
  #[error("select at least one question type with a count above zero, or supply sections")]
  NothingToGenerate,
  #[error("{family} is selected but its question count is zero")]
  EmptyFamily { family: &'static str },
  #[error("section '{label}' must ask for at least one question")]
  EmptySection { label: String },
  #[error("question counts are too large to number")]
  TooManyQuestions,
}

/// The raw response could not be recovered into any parseable structure.
/// `raw` is kept for diagnostics only and is not part of the Display output.
#[derive(Clone, Debug, Error, PartialEq, Eq)]
#[error("unusable generation result: {reason}")]
pub struct FormatError {
  pub reason: String,
  pub raw: String,
}

impl FormatError {
  pub fn new(reason: impl Into<String>, raw: &str) -> Self {
    Self { reason: reason.into(), raw: raw.to_string() }
  }
}

#[derive(Debug, Error)]
pub enum GenerateError {
  #[error(transparent)]
  Validation(#[from] ValidationError),

  #[error("generation service is busy after {attempts} attempts, try again later")]
  ServiceBusy {
    attempts: u32,
    #[source]
    source: BackendError,
  },

  #[error("generation backend error: {0}")]
  Backend(BackendError),

  #[error("generation produced an unusable result, please retry")]
  Format(#[from] FormatError),

  #[error("generation cancelled")]
  Cancelled,

  #[error("generation backend is not configured (GEMINI_API_KEY missing)")]
  NotConfigured,
}

impl GenerateError {
  /// Short machine-readable tag used by the HTTP/WS surface.
  pub fn code(&self) -> &'static str {
    match self {
      GenerateError::Validation(_) => "validation",
      GenerateError::ServiceBusy { .. } => "service_busy",
      GenerateError::Backend(e) if e.kind == BackendErrorKind::PermissionDenied => "permission_denied",
      GenerateError::Backend(_) => "backend",
      GenerateError::Format(_) => "format",
      GenerateError::Cancelled => "cancelled",
      GenerateError::NotConfigured => "not_configured",
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn only_overload_and_timeout_are_transient() {
    assert!(BackendErrorKind::Overloaded.is_transient());
    assert!(BackendErrorKind::Timeout.is_transient());
    for k in [
      BackendErrorKind::PermissionDenied,
      BackendErrorKind::QuotaExceeded,
      BackendErrorKind::InvalidRequest,
      BackendErrorKind::Transport,
      BackendErrorKind::Unparseable,
      BackendErrorKind::Other,
    ] {
      assert!(!k.is_transient(), "{k:?}");
    }
  }

  #[test]
  fn format_error_display_hides_raw_text() {
    let e = GenerateError::from(FormatError::new("no JSON span", "secret model babble"));
    let shown = e.to_string();
    assert!(!shown.contains("secret model babble"));
    assert_eq!(e.code(), "format");
  }

  #[test]
  fn backend_error_display_includes_status() {
    let e = BackendError::new(BackendErrorKind::Overloaded, "model overloaded").with_status(503);
    assert_eq!(e.to_string(), "Overloaded (HTTP 503): model overloaded");
  }
}
