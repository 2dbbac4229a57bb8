//! Public protocol structs for WebSocket and HTTP endpoints (serde ready).
//! Keep this small and stable to evolve backend and frontend independently.

use serde::{Deserialize, Serialize};

use crate::domain::{GeneratedSection, GenerationRequest, Module, Semester, SubjectMeta};
use crate::error::GenerateError;
use crate::pipeline::Generation;
use crate::recovery::ShapeWarning;

/// Messages the client can send over WebSocket.
#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientWsMessage {
  Ping,
  Generate { request: GenerationRequest },
  /// Cancel the in-flight generation, if any.
  Cancel,
}

/// Messages the server sends back over WebSocket.
#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ServerWsMessage {
  Pong,
  Started {
    #[serde(rename = "generationId")]
    generation_id: String,
    module: Module,
  },
  Generated(GenerateOut),
  Cancelled {
    #[serde(rename = "generationId")]
    generation_id: String,
  },
  /// `generationId` is set when the error belongs to a generation.
  Error {
    #[serde(rename = "generationId", skip_serializing_if = "Option::is_none")]
    generation_id: Option<String>,
    #[serde(flatten)]
    error: ErrorOut,
  },
}

impl ServerWsMessage {
  /// Error not tied to any generation (bad frame, missing backend).
  pub fn error(error: ErrorOut) -> Self {
    ServerWsMessage::Error { generation_id: None, error }
  }

  pub fn generation_error(generation_id: impl Into<String>, error: ErrorOut) -> Self {
    ServerWsMessage::Error { generation_id: Some(generation_id.into()), error }
  }
}

#[derive(Debug, Serialize)]
pub struct HealthOut {
  pub ok: bool,
  #[serde(rename = "generationEnabled")]
  pub generation_enabled: bool,
}

#[derive(Debug, Serialize)]
pub struct GenerateOut {
  #[serde(rename = "generationId")]
  pub generation_id: String,
  pub module: Module,
  pub sections: Vec<GeneratedSection>,
  pub warnings: Vec<ShapeWarning>,
}

impl GenerateOut {
  pub fn new(generation_id: String, module: Module, generation: Generation) -> Self {
    Self { generation_id, module, sections: generation.sections, warnings: generation.warnings }
  }
}

#[derive(Debug, Deserialize)]
pub struct CurriculumSuggestionIn {
  pub meta: SubjectMeta,
}

#[derive(Debug, Deserialize)]
pub struct TopicSuggestionIn {
  pub meta: SubjectMeta,
  #[serde(default)]
  pub semester: Semester,
}

#[derive(Debug, Serialize)]
pub struct SuggestionOut {
  pub text: String,
}

/// Error body shared by HTTP and WebSocket. Never carries raw model output.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct ErrorOut {
  pub code: &'static str,
  pub message: String,
}

impl From<&GenerateError> for ErrorOut {
  fn from(e: &GenerateError) -> Self {
    Self { code: e.code(), message: e.to_string() }
  }
}
