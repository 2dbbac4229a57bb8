//! The generation pipeline: the inbound operations used by HTTP and WebSocket handlers.
//!
//! request -> counts::resolve -> prompt::compose_* -> executor::execute
//!         -> recovery::parse -> postprocess -> ordered sections
//!
//! Each call is independent; nothing here is shared or mutated across requests.

use std::sync::Arc;

use serde::Serialize;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use crate::config::GeneratorConfig;
use crate::counts;
use crate::domain::{
  AdminRequest, ECourseRequest, GeneratedSection, GenerationRequest, Module, QuestionBankRequest, Semester,
  SubjectMeta,
};
use crate::error::{FormatError, GenerateError};
use crate::executor::{execute, RetryPolicy};
use crate::gemini::GenerationBackend;
use crate::postprocess::postprocess;
use crate::prompt::{self, GenerationPrompt};
use crate::recovery::{self, ShapeWarning};

/// Ordered sections plus any non-fatal shape problems found while reading them.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct Generation {
  pub sections: Vec<GeneratedSection>,
  pub warnings: Vec<ShapeWarning>,
}

#[derive(Clone)]
pub struct Generator {
  backend: Arc<dyn GenerationBackend>,
  config: GeneratorConfig,
  policy: RetryPolicy,
}

impl Generator {
  pub fn new(backend: Arc<dyn GenerationBackend>, config: GeneratorConfig) -> Self {
    let policy = RetryPolicy::from(&config.generation);
    Self { backend, config, policy }
  }

  /// Override the retry policy derived from configuration.
  pub fn with_policy(mut self, policy: RetryPolicy) -> Self {
    self.policy = policy;
    self
  }

  pub fn config(&self) -> &GeneratorConfig {
    &self.config
  }

  /// Dispatch on the request's module.
  pub async fn generate(&self, req: &GenerationRequest, cancel: &CancellationToken) -> Result<Generation, GenerateError> {
    match req {
      GenerationRequest::Admin(r) => self.generate_admin_content(r, cancel).await,
      GenerationRequest::QuestionBank(r) => self.generate_question_bank_content(r, cancel).await,
      GenerationRequest::Ecourse(r) => self.generate_ecourse_content(r, cancel).await,
    }
  }

  #[instrument(level = "info", skip_all, fields(subject = %req.meta.subject, grade = %req.meta.grade))]
  pub async fn generate_admin_content(&self, req: &AdminRequest, cancel: &CancellationToken) -> Result<Generation, GenerateError> {
    let prompt = prompt::compose_admin(req, &self.config);
    self.run_structured(prompt, Module::Admin, cancel).await
  }

  /// Validation happens before any backend call.
  #[instrument(level = "info", skip_all, fields(subject = %req.meta.subject, topic = %req.topic))]
  pub async fn generate_question_bank_content(
    &self,
    req: &QuestionBankRequest,
    cancel: &CancellationToken,
  ) -> Result<Generation, GenerateError> {
    let breakdown = counts::resolve(&req.questions).map_err(|e| {
      warn!(target: "generation", error = %e, "Question-bank request rejected");
      e
    })?;
    let prompt = prompt::compose_question_bank(req, &breakdown, &self.config);
    self.run_structured(prompt, Module::QuestionBank, cancel).await
  }

  #[instrument(level = "info", skip_all, fields(topic = %req.topic, meetings = req.meeting_count))]
  pub async fn generate_ecourse_content(&self, req: &ECourseRequest, cancel: &CancellationToken) -> Result<Generation, GenerateError> {
    let prompt = prompt::compose_ecourse(req, &self.config);
    self.run_structured(prompt, Module::Ecourse, cancel).await
  }

  /// Plain-text list of curriculum elements for a subject.
  #[instrument(level = "info", skip_all, fields(subject = %meta.subject))]
  pub async fn suggest_curriculum_elements(&self, meta: &SubjectMeta, cancel: &CancellationToken) -> Result<String, GenerateError> {
    let prompt = prompt::compose_curriculum_suggestion(meta, &self.config);
    self.run_plain(prompt, cancel).await
  }

  /// Plain-text list of topics for a subject and semester.
  #[instrument(level = "info", skip_all, fields(subject = %meta.subject, ?semester))]
  pub async fn suggest_topics(&self, meta: &SubjectMeta, semester: Semester, cancel: &CancellationToken) -> Result<String, GenerateError> {
    let prompt = prompt::compose_topic_suggestion(meta, semester.label(), &self.config);
    self.run_plain(prompt, cancel).await
  }

  async fn run_structured(
    &self,
    prompt: GenerationPrompt,
    module: Module,
    cancel: &CancellationToken,
  ) -> Result<Generation, GenerateError> {
    let raw = execute(self.backend.as_ref(), &prompt, &self.policy, cancel).await?;
    let recovered = recovery::parse(&raw)?;

    let mut warnings = recovered.warnings;
    let missing = missing_sections(&prompt.expected_ids, &recovered.sections);
    if !missing.is_empty() {
      warn!(target: "generation", module = module.as_str(), ?missing, "Response is missing expected sections");
    }
    warnings.extend(missing.into_iter().map(|id| ShapeWarning::MissingSection { id }));

    let sections = postprocess(recovered.sections, module);
    info!(target: "generation", module = module.as_str(), sections = sections.len(), warnings = warnings.len(), "Generation complete");
    Ok(Generation { sections, warnings })
  }

  async fn run_plain(&self, prompt: GenerationPrompt, cancel: &CancellationToken) -> Result<String, GenerateError> {
    let raw = execute(self.backend.as_ref(), &prompt, &self.policy, cancel).await?;
    let text = raw.trim();
    if text.is_empty() {
      return Err(FormatError::new("empty response", &raw).into());
    }
    Ok(text.to_string())
  }
}

/// Expected ids absent from `sections`, in expected order.
fn missing_sections(expected: &[String], sections: &[GeneratedSection]) -> Vec<String> {
  expected
    .iter()
    .filter(|id| !sections.iter().any(|s| &s.id == *id))
    .cloned()
    .collect()
}
