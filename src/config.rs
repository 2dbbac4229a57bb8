//! Loading generator configuration (prompt framing, model settings, language rules) from TOML.
//!
//! See `GeneratorConfig` for the expected schema. Every field has a default, so an
//! empty file (or no file at all) yields a working configuration.

use std::time::Duration;

use serde::Deserialize;
use tracing::{error, info};

use crate::domain::Module;

#[derive(Clone, Debug, Deserialize, Default)]
pub struct GeneratorConfig {
  #[serde(default)]
  pub prompts: Prompts,
  #[serde(default)]
  pub generation: GenerationSettings,
  #[serde(default)]
  pub language: LanguageRules,
}

/// Framing templates used by the prompt composer. `{placeholder}` values are
/// substituted with `util::fill_template`.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Prompts {
  // Administrative package
  pub admin_role: String,
  // Question bank
  pub question_bank_role: String,
  // E-course
  pub ecourse_role: String,
  // Shared formatting rules
  pub html_quote_rule: String,
  pub classical_diacritics_rule: String,
  pub classical_direction_rule: String,
  pub application_focus_rule: String,
  // Suggestions
  pub curriculum_suggestion_template: String,
  pub topic_suggestion_template: String,
}

impl Default for Prompts {
  fn default() -> Self {
    Self {
      admin_role: "You are an expert assistant for school teachers. Build a complete set of teacher administration documents for the national curriculum.".into(),
      question_bank_role: "You are an expert exam author. Build a complete assessment package from the data below.".into(),
      ecourse_role: "You are an expert instructional designer. Design and write a complete e-course from the data below.".into(),
      html_quote_rule: "Use single quotes (') for every HTML attribute (for example <div class='my-class'>) so the JSON stays valid.".into(),
      classical_diacritics_rule: "IMPORTANT: ALL {language} TEXT (questions, answer options, quotations and material) MUST carry FULL diacritical marks so it cannot be misread.".into(),
      classical_direction_rule: "Direction rule: ONLY spans written in {language} get right-to-left styling (inside table cells use <div style='text-align:right; direction:rtl;'>). Section titles and all other text MUST stay left-to-right.".into(),
      application_focus_rule: "Subject focus ({subject}): items must test the APPLICATION of grammar rules when composing sentences or answering, NOT the theory itself.".into(),
      curriculum_suggestion_template: "List the curriculum learning-outcome elements for the subject {subject}, level {level}, grade {grade}, phase {phase}. Present them as a Markdown bullet list.".into(),
      topic_suggestion_template: "Suggest relevant learning topics for the subject {subject}, level {level}, grade {grade}, phase {phase}, semester {semester}. Present them as a Markdown bullet list.".into(),
    }
  }
}

/// Model call settings.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct GenerationSettings {
  pub admin_temperature: f32,
  pub question_bank_temperature: f32,
  pub ecourse_temperature: f32,
  pub suggestion_temperature: f32,
  /// Extended-reasoning budgets, used only when a request asks for it.
  pub admin_thinking_budget: u32,
  pub question_bank_thinking_budget: u32,
  pub ecourse_thinking_budget: u32,
  pub max_retries: u32,
  pub initial_backoff_ms: u64,
  /// Per-attempt deadline; 0 disables it.
  pub attempt_timeout_secs: u64,
}

impl Default for GenerationSettings {
  fn default() -> Self {
    Self {
      admin_temperature: 0.7,
      question_bank_temperature: 0.5,
      ecourse_temperature: 0.7,
      suggestion_temperature: 0.7,
      admin_thinking_budget: 8192,
      question_bank_thinking_budget: 8192,
      ecourse_thinking_budget: 16384,
      max_retries: 3,
      initial_backoff_ms: 2000,
      attempt_timeout_secs: 180,
    }
  }
}

impl GenerationSettings {
  pub fn temperature(&self, module: Module) -> f32 {
    match module {
      Module::Admin => self.admin_temperature,
      Module::QuestionBank => self.question_bank_temperature,
      Module::Ecourse => self.ecourse_temperature,
    }
  }

  pub fn thinking_budget(&self, module: Module) -> u32 {
    match module {
      Module::Admin => self.admin_thinking_budget,
      Module::QuestionBank => self.question_bank_thinking_budget,
      Module::Ecourse => self.ecourse_thinking_budget,
    }
  }

  pub fn initial_backoff(&self) -> Duration {
    Duration::from_millis(self.initial_backoff_ms)
  }

  pub fn attempt_timeout(&self) -> Option<Duration> {
    (self.attempt_timeout_secs > 0).then(|| Duration::from_secs(self.attempt_timeout_secs))
  }
}

/// Script/language rules applied by the composer.
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct LanguageRules {
  /// The classical/liturgical language that needs full diacritics and RTL spans.
  pub classical_language: String,
  /// Subjects (compared case-insensitively) whose items must test application.
  pub application_focus_subjects: Vec<String>,
}

impl Default for LanguageRules {
  fn default() -> Self {
    Self {
      classical_language: "Arabic".into(),
      application_focus_subjects: vec!["INSYA".into()],
    }
  }
}

impl LanguageRules {
  pub fn is_classical(&self, language: &str) -> bool {
    let lang = language.trim();
    !lang.is_empty() && lang.eq_ignore_ascii_case(self.classical_language.trim())
  }

  pub fn is_application_focus(&self, subject: &str) -> bool {
    let subject = subject.trim();
    self.application_focus_subjects.iter().any(|s| s.trim().eq_ignore_ascii_case(subject))
  }
}

/// Parse a TOML document into a `GeneratorConfig`.
pub fn parse_config(src: &str) -> Result<GeneratorConfig, toml::de::Error> {
  toml::from_str::<GeneratorConfig>(src)
}

/// Attempt to load `GeneratorConfig` from GENERATOR_CONFIG_PATH. On any parsing/IO error, returns None.
pub fn load_generator_config_from_env() -> Option<GeneratorConfig> {
  let path = std::env::var("GENERATOR_CONFIG_PATH").ok()?;
  match std::fs::read_to_string(&path) {
    Ok(s) => match parse_config(&s) {
      Ok(cfg) => {
        info!(target: "teachgen_backend", %path, "Loaded generator config (TOML)");
        Some(cfg)
      }
      Err(e) => {
        error!(target: "teachgen_backend", %path, error = %e, "Failed to parse TOML config");
        None
      }
    },
    Err(e) => {
      error!(target: "teachgen_backend", %path, error = %e, "Failed to read TOML config file");
      None
    }
  }
}
