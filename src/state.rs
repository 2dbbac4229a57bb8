//! Application state: generator configuration and the optional generator.
//!
//! Generation needs GEMINI_API_KEY. Without it the service still starts (health
//! and static files work) and generation endpoints answer `not_configured`.

use std::sync::Arc;

use tracing::{info, instrument, warn};

use crate::config::load_generator_config_from_env;
use crate::error::GenerateError;
use crate::gemini::Gemini;
use crate::pipeline::Generator;

#[derive(Clone)]
pub struct AppState {
  pub generator: Option<Generator>,
}

impl AppState {
  /// Build state from env: load TOML config, init the Gemini client.
  #[instrument(level = "info", skip_all)]
  pub fn from_env() -> Self {
    let config = load_generator_config_from_env().unwrap_or_default();
    info!(
      target: "teachgen_backend",
      max_retries = config.generation.max_retries,
      initial_backoff_ms = config.generation.initial_backoff_ms,
      attempt_timeout_secs = config.generation.attempt_timeout_secs,
      classical_language = %config.language.classical_language,
      "Generator settings"
    );

    let generator = match Gemini::from_env() {
      Some(gemini) => {
        info!(target: "teachgen_backend", base_url = %gemini.base_url, model = %gemini.model, "Gemini enabled.");
        Some(Generator::new(Arc::new(gemini), config))
      }
      None => {
        warn!(target: "teachgen_backend", "Gemini disabled (no GEMINI_API_KEY). Generation endpoints will answer not_configured.");
        None
      }
    };
    Self { generator }
  }

  pub fn with_generator(generator: Generator) -> Self {
    Self { generator: Some(generator) }
  }

  pub fn generator(&self) -> Result<&Generator, GenerateError> {
    self.generator.as_ref().ok_or(GenerateError::NotConfigured)
  }

  pub fn unconfigured() -> Self {
    Self { generator: None }
  }
}
