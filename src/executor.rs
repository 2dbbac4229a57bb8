//! Resilient request execution: one backend call, retried with exponential
//! backoff while the backend reports transient overload.
//!
//! Attempts are strictly sequential. A cancelled token stops the current attempt
//! and any pending backoff sleep.

use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::config::GenerationSettings;
use crate::error::{BackendError, BackendErrorKind, GenerateError};
use crate::gemini::GenerationBackend;
use crate::prompt::GenerationPrompt;

#[derive(Clone, Debug, PartialEq)]
pub struct RetryPolicy {
  pub max_retries: u32,
  pub initial_backoff: Duration,
  pub attempt_timeout: Option<Duration>,
}

impl Default for RetryPolicy {
  fn default() -> Self {
    Self { max_retries: 3, initial_backoff: Duration::from_millis(2000), attempt_timeout: None }
  }
}

impl From<&GenerationSettings> for RetryPolicy {
  fn from(s: &GenerationSettings) -> Self {
    Self {
      max_retries: s.max_retries,
      initial_backoff: s.initial_backoff(),
      attempt_timeout: s.attempt_timeout(),
    }
  }
}

impl RetryPolicy {
  /// Delay before retry number `retry` (1-based): initial, 2x, 4x, ...
  pub fn backoff_for(&self, retry: u32) -> Duration {
    self.initial_backoff.saturating_mul(1u32 << (retry.saturating_sub(1)).min(16))
  }
}

/// Run one attempt under the optional per-attempt deadline.
async fn attempt(
  backend: &dyn GenerationBackend,
  prompt: &GenerationPrompt,
  timeout: Option<Duration>,
) -> Result<String, BackendError> {
  match timeout {
    Some(limit) => match tokio::time::timeout(limit, backend.generate_content(prompt)).await {
      Ok(r) => r,
      Err(_) => Err(BackendError::new(BackendErrorKind::Timeout, format!("attempt exceeded {limit:?}"))),
    },
    None => backend.generate_content(prompt).await,
  }
}

/// Send `prompt` to the backend, retrying transient failures per `policy`.
///
/// Non-transient failures surface immediately as `GenerateError::Backend`; a
/// transient failure that survives every retry surfaces as
/// `GenerateError::ServiceBusy` carrying the last backend error unchanged.
#[instrument(level = "info", skip_all, fields(module = ?prompt.module, max_retries = policy.max_retries))]
pub async fn execute(
  backend: &dyn GenerationBackend,
  prompt: &GenerationPrompt,
  policy: &RetryPolicy,
  cancel: &CancellationToken,
) -> Result<String, GenerateError> {
  let mut retries = 0u32;
  loop {
    if cancel.is_cancelled() {
      return Err(GenerateError::Cancelled);
    }

    let outcome = tokio::select! {
      _ = cancel.cancelled() => return Err(GenerateError::Cancelled),
      r = attempt(backend, prompt, policy.attempt_timeout) => r,
    };

    let err = match outcome {
      Ok(text) => {
        debug!(target: "generation", attempts = retries + 1, "Backend call succeeded");
        return Ok(text);
      }
      Err(e) => e,
    };

    if !err.is_transient() {
      warn!(target: "generation", kind = ?err.kind, status = ?err.status, error = %err, "Backend call failed (not retryable)");
      return Err(GenerateError::Backend(err));
    }
    if retries >= policy.max_retries {
      warn!(target: "generation", attempts = retries + 1, error = %err, "Backend still overloaded; giving up");
      return Err(GenerateError::ServiceBusy { attempts: retries + 1, source: err });
    }

    retries += 1;
    let delay = policy.backoff_for(retries);
    warn!(target: "generation", retry = retries, remaining = policy.max_retries - retries, ?delay, kind = ?err.kind, "Backend overloaded; retrying");
    tokio::select! {
      _ = cancel.cancelled() => return Err(GenerateError::Cancelled),
      _ = tokio::time::sleep(delay) => {}
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::collections::VecDeque;
  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::sync::Mutex;

  use async_trait::async_trait;
  use tokio::time::Instant;

  /// Returns scripted results in order; repeats the last one when exhausted.
  struct Scripted {
    calls: AtomicUsize,
    script: Mutex<VecDeque<Result<String, BackendError>>>,
    last: Result<String, BackendError>,
  }

  impl Scripted {
    fn new(script: Vec<Result<String, BackendError>>) -> Self {
      let last = script.last().cloned().unwrap_or_else(|| Ok(String::new()));
      Self { calls: AtomicUsize::new(0), script: Mutex::new(script.into()), last }
    }
    fn calls(&self) -> usize { self.calls.load(Ordering::SeqCst) }
  }

  #[async_trait]
  impl GenerationBackend for Scripted {
    async fn generate_content(&self, _prompt: &GenerationPrompt) -> Result<String, BackendError> {
      self.calls.fetch_add(1, Ordering::SeqCst);
      let next = self.script.lock().unwrap().pop_front();
      next.unwrap_or_else(|| self.last.clone())
    }
  }

  /// Never answers.
  struct Hanging;

  #[async_trait]
  impl GenerationBackend for Hanging {
    async fn generate_content(&self, _prompt: &GenerationPrompt) -> Result<String, BackendError> {
      std::future::pending().await
    }
  }

  fn overloaded() -> Result<String, BackendError> {
    Err(BackendError::new(BackendErrorKind::Overloaded, "model overloaded").with_status(503))
  }

  fn prompt() -> GenerationPrompt {
    GenerationPrompt::plain("p".into(), 0.5)
  }

  #[test]
  fn backoff_doubles_from_initial_delay() {
    let p = RetryPolicy::default();
    assert_eq!(p.backoff_for(1), Duration::from_secs(2));
    assert_eq!(p.backoff_for(2), Duration::from_secs(4));
    assert_eq!(p.backoff_for(3), Duration::from_secs(8));
  }

  #[tokio::test(start_paused = true)]
  async fn always_overloaded_makes_four_calls_then_gives_up() {
    let backend = Scripted::new(vec![overloaded()]);
    let started = Instant::now();
    let err = execute(&backend, &prompt(), &RetryPolicy::default(), &CancellationToken::new()).await.unwrap_err();
    assert_eq!(backend.calls(), 4);
    match err {
      GenerateError::ServiceBusy { attempts, source } => {
        assert_eq!(attempts, 4);
        assert_eq!(source.kind, BackendErrorKind::Overloaded);
        assert_eq!(source.message, "model overloaded");
      }
      other => panic!("unexpected {other:?}"),
    }
    // 2s + 4s + 8s of backoff
    assert!(started.elapsed() >= Duration::from_secs(14));
  }

  #[tokio::test(start_paused = true)]
  async fn non_transient_error_is_not_retried() {
    let backend = Scripted::new(vec![Err(BackendError::new(BackendErrorKind::PermissionDenied, "denied").with_status(403))]);
    let err = execute(&backend, &prompt(), &RetryPolicy::default(), &CancellationToken::new()).await.unwrap_err();
    assert_eq!(backend.calls(), 1);
    assert!(matches!(err, GenerateError::Backend(ref e) if e.kind == BackendErrorKind::PermissionDenied));
  }

  #[tokio::test(start_paused = true)]
  async fn recovers_after_transient_failures() {
    let backend = Scripted::new(vec![overloaded(), overloaded(), Ok("done".into())]);
    let text = execute(&backend, &prompt(), &RetryPolicy::default(), &CancellationToken::new()).await.unwrap();
    assert_eq!(text, "done");
    assert_eq!(backend.calls(), 3);
  }

  #[tokio::test(start_paused = true)]
  async fn attempt_timeout_counts_as_transient() {
    let policy = RetryPolicy { max_retries: 2, attempt_timeout: Some(Duration::from_secs(5)), ..Default::default() };
    let err = execute(&Hanging, &prompt(), &policy, &CancellationToken::new()).await.unwrap_err();
    match err {
      GenerateError::ServiceBusy { attempts, source } => {
        assert_eq!(attempts, 3);
        assert_eq!(source.kind, BackendErrorKind::Timeout);
      }
      other => panic!("unexpected {other:?}"),
    }
  }

  #[tokio::test(start_paused = true)]
  async fn cancellation_stops_further_retries() {
    let backend = std::sync::Arc::new(Scripted::new(vec![overloaded()]));
    let cancel = CancellationToken::new();
    let task = {
      let backend = backend.clone();
      let cancel = cancel.clone();
      tokio::spawn(async move { execute(backend.as_ref(), &prompt(), &RetryPolicy::default(), &cancel).await })
    };
    // First attempt fails immediately, then the executor sleeps 2s.
    tokio::time::sleep(Duration::from_millis(500)).await;
    cancel.cancel();
    let err = task.await.unwrap().unwrap_err();
    assert!(matches!(err, GenerateError::Cancelled));
    assert_eq!(backend.calls(), 1);
  }

  #[tokio::test]
  async fn already_cancelled_token_makes_no_call() {
    let backend = Scripted::new(vec![Ok("x".into())]);
    let cancel = CancellationToken::new();
    cancel.cancel();
    let err = execute(&backend, &prompt(), &RetryPolicy::default(), &cancel).await.unwrap_err();
    assert!(matches!(err, GenerateError::Cancelled));
    assert_eq!(backend.calls(), 0);
  }
}
