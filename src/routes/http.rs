//! HTTP endpoint handlers. These are thin wrappers that forward to the generator.
//! Each handler is instrumented and logs basic request and result info.

use std::sync::Arc;

use axum::{
  extract::State,
  http::StatusCode,
  response::{IntoResponse, Response},
  Json,
};
use tokio_util::sync::CancellationToken;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

use crate::domain::{AdminRequest, ECourseRequest, GenerationRequest, QuestionBankRequest};
use crate::error::GenerateError;
use crate::protocol::*;
use crate::state::AppState;

/// `GenerateError` rendered as a JSON error body with a matching status.
pub struct ApiError(pub GenerateError);

impl From<GenerateError> for ApiError {
  fn from(e: GenerateError) -> Self {
    Self(e)
  }
}

pub fn status_for(e: &GenerateError) -> StatusCode {
  match e {
    GenerateError::Validation(_) => StatusCode::BAD_REQUEST,
    GenerateError::ServiceBusy { .. } | GenerateError::Cancelled | GenerateError::NotConfigured => {
      StatusCode::SERVICE_UNAVAILABLE
    }
    GenerateError::Backend(_) | GenerateError::Format(_) => StatusCode::BAD_GATEWAY,
  }
}

impl IntoResponse for ApiError {
  fn into_response(self) -> Response {
    let status = status_for(&self.0);
    if status.is_server_error() {
      error!(target: "generation", code = self.0.code(), error = %self.0, "Generation failed");
    } else {
      warn!(target: "generation", code = self.0.code(), error = %self.0, "Generation request rejected");
    }
    (status, Json(ErrorOut::from(&self.0))).into_response()
  }
}

#[instrument(level = "info", skip(state))]
pub async fn http_health(State(state): State<Arc<AppState>>) -> impl IntoResponse {
  Json(HealthOut { ok: true, generation_enabled: state.generator.is_some() })
}

/// Run one generation to completion. An HTTP request has no cancel channel, so the
/// token only exists to satisfy the pipeline contract.
async fn run_generation(state: &AppState, req: &GenerationRequest) -> Result<Json<GenerateOut>, ApiError> {
  let generator = state.generator()?;
  let generation_id = Uuid::new_v4().to_string();
  let module = req.module();
  let generation = generator.generate(req, &CancellationToken::new()).await?;
  info!(target: "generation", %generation_id, module = module.as_str(), sections = generation.sections.len(), "HTTP generation served");
  Ok(Json(GenerateOut::new(generation_id, module, generation)))
}

#[instrument(level = "info", skip(state, body), fields(module = body.module().as_str()))]
pub async fn http_post_generate(
  State(state): State<Arc<AppState>>,
  Json(body): Json<GenerationRequest>,
) -> Result<Json<GenerateOut>, ApiError> {
  run_generation(&state, &body).await
}

#[instrument(level = "info", skip(state, body), fields(subject = %body.meta.subject))]
pub async fn http_post_generate_admin(
  State(state): State<Arc<AppState>>,
  Json(body): Json<AdminRequest>,
) -> Result<Json<GenerateOut>, ApiError> {
  run_generation(&state, &GenerationRequest::Admin(body)).await
}

#[instrument(level = "info", skip(state, body), fields(subject = %body.meta.subject, topic = %body.topic))]
pub async fn http_post_generate_question_bank(
  State(state): State<Arc<AppState>>,
  Json(body): Json<QuestionBankRequest>,
) -> Result<Json<GenerateOut>, ApiError> {
  run_generation(&state, &GenerationRequest::QuestionBank(body)).await
}

#[instrument(level = "info", skip(state, body), fields(topic = %body.topic))]
pub async fn http_post_generate_ecourse(
  State(state): State<Arc<AppState>>,
  Json(body): Json<ECourseRequest>,
) -> Result<Json<GenerateOut>, ApiError> {
  run_generation(&state, &GenerationRequest::Ecourse(body)).await
}

#[instrument(level = "info", skip(state, body), fields(subject = %body.meta.subject))]
pub async fn http_post_suggest_curriculum(
  State(state): State<Arc<AppState>>,
  Json(body): Json<CurriculumSuggestionIn>,
) -> Result<Json<SuggestionOut>, ApiError> {
  let text = state.generator()?.suggest_curriculum_elements(&body.meta, &CancellationToken::new()).await?;
  Ok(Json(SuggestionOut { text }))
}

#[instrument(level = "info", skip(state, body), fields(subject = %body.meta.subject, semester = ?body.semester))]
pub async fn http_post_suggest_topics(
  State(state): State<Arc<AppState>>,
  Json(body): Json<TopicSuggestionIn>,
) -> Result<Json<SuggestionOut>, ApiError> {
  let text = state.generator()?.suggest_topics(&body.meta, body.semester, &CancellationToken::new()).await?;
  Ok(Json(SuggestionOut { text }))
}
