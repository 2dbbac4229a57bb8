//! End-to-end pipeline scenarios with an in-memory backend, plus the HTTP surface.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tower::ServiceExt;

use teachgen_backend::config::GeneratorConfig;
use teachgen_backend::counts::{resolve, Family, NumberRange};
use teachgen_backend::domain::{
  CustomSection, FamilyMix, FamilySelection, GeneratedSection, QuestionBankRequest, QuestionSelection, Semester,
  SubjectMeta, SupplementaryPool,
};
use teachgen_backend::error::{BackendError, GenerateError};
use teachgen_backend::gemini::GenerationBackend;
use teachgen_backend::pipeline::Generator;
use teachgen_backend::prompt::GenerationPrompt;
use teachgen_backend::routes::build_router;
use teachgen_backend::state::AppState;

/// Answers with a fixed text, counting calls and keeping the prompts it received.
struct Recording {
  reply: String,
  calls: AtomicUsize,
  prompts: Mutex<Vec<String>>,
}

impl Recording {
  fn new(reply: impl Into<String>) -> Arc<Self> {
    Arc::new(Self { reply: reply.into(), calls: AtomicUsize::new(0), prompts: Mutex::new(Vec::new()) })
  }
  fn calls(&self) -> usize {
    self.calls.load(Ordering::SeqCst)
  }
}

#[async_trait]
impl GenerationBackend for Recording {
  async fn generate_content(&self, prompt: &GenerationPrompt) -> Result<String, BackendError> {
    self.calls.fetch_add(1, Ordering::SeqCst);
    self.prompts.lock().unwrap().push(prompt.text.clone());
    Ok(self.reply.clone())
  }
}

fn six_sections() -> Vec<GeneratedSection> {
  [
    ("naskah_soal", "1. Item Bank (Exam Paper)"),
    ("kunci_jawaban", "2. Answer Key & Discussion"),
    ("kisi_kisi", "3. Item Specification Table"),
    ("rubrik_penilaian", "4. Scoring Rubric"),
    ("analisis_kualitatif", "5. Qualitative Item Analysis"),
    ("ringkasan_materi", "6. Material Summary"),
  ]
  .iter()
  .enumerate()
  .map(|(i, (id, title))| GeneratedSection {
    id: id.to_string(),
    title: title.to_string(),
    content: format!("<table><tr><td>part {i}</td></tr></table>"),
  })
  .collect()
}

fn question_bank(questions: QuestionSelection) -> QuestionBankRequest {
  QuestionBankRequest {
    meta: SubjectMeta {
      level: "SMP".into(),
      grade: "8".into(),
      subject: "Science".into(),
      language: "English".into(),
      phase: "D".into(),
    },
    topic: "Ecosystems".into(),
    difficulty: "medium".into(),
    teacher_name: "R. Wulandari".into(),
    academic_year: "2025/2026".into(),
    semester: Semester::Odd,
    questions,
    header: None,
    extended_reasoning: false,
  }
}

fn mc_ten_plus_five() -> QuestionSelection {
  QuestionSelection::Families(FamilyMix {
    multiple_choice: FamilySelection { selected: true, count: 10 },
    supplementary_multiple_choice: SupplementaryPool { enabled: true, count: 5 },
    ..Default::default()
  })
}

#[tokio::test]
async fn multiple_choice_with_supplementary_pool_end_to_end() {
  let questions = mc_ten_plus_five();
  let breakdown = resolve(&questions).unwrap();
  let mc = breakdown.family(Family::MultipleChoice).unwrap();
  assert_eq!(mc.total, 15);
  assert_eq!(mc.range, NumberRange { start: 1, end: 15 });
  assert_eq!(mc.base_range, Some(NumberRange { start: 1, end: 10 }));
  assert_eq!(mc.supplementary_range, Some(NumberRange { start: 11, end: 15 }));

  let expected = six_sections();
  let backend = Recording::new(json!({ "sections": expected }).to_string());
  let generator = Generator::new(backend.clone(), GeneratorConfig::default());
  let out = generator
    .generate_question_bank_content(&question_bank(questions), &CancellationToken::new())
    .await
    .unwrap();

  assert_eq!(backend.calls(), 1);
  let prompt = backend.prompts.lock().unwrap()[0].clone();
  assert!(prompt.contains("MULTIPLE CHOICE (Total 15 questions)"), "{prompt}");
  assert!(prompt.contains("Numbers 1 to 10: 10 regular Science questions."), "{prompt}");
  assert!(prompt.contains("Numbers 11 to 15: 5 supplementary questions."), "{prompt}");
  assert!(prompt.contains("GRAND TOTAL: 15 questions."), "{prompt}");

  assert_eq!(out.sections, expected);
  assert!(out.warnings.is_empty());
}

#[tokio::test]
async fn empty_selection_never_reaches_the_backend() {
  let backend = Recording::new("{}");
  let generator = Generator::new(backend.clone(), GeneratorConfig::default());

  for questions in [
    QuestionSelection::Families(FamilyMix::default()),
    QuestionSelection::Families(FamilyMix {
      open_ended: FamilySelection { selected: false, count: 7 },
      ..Default::default()
    }),
    QuestionSelection::Sectioned { sections: vec![] },
  ] {
    let err = generator
      .generate_question_bank_content(&question_bank(questions), &CancellationToken::new())
      .await
      .unwrap_err();
    assert!(matches!(err, GenerateError::Validation(_)), "{err:?}");
  }
  assert_eq!(backend.calls(), 0);
}

#[tokio::test]
async fn sectioned_layout_lists_parts_in_order() {
  let backend = Recording::new(json!({ "sections": six_sections() }).to_string());
  let generator = Generator::new(backend.clone(), GeneratorConfig::default());
  let questions = QuestionSelection::Sectioned {
    sections: vec![
      CustomSection { label: "A".into(), instruction: "Choose the correct answer".into(), count: 20 },
      CustomSection { label: "B".into(), instruction: "Translate the sentences".into(), count: 5 },
    ],
  };
  generator
    .generate_question_bank_content(&question_bank(questions), &CancellationToken::new())
    .await
    .unwrap();

  let prompt = backend.prompts.lock().unwrap()[0].clone();
  let a = prompt.find("- Part A: 20 questions.").unwrap();
  let b = prompt.find("- Part B: 5 questions.").unwrap();
  assert!(a < b);
}

// --- HTTP surface ---

async fn post_json(app: axum::Router, uri: &str, body: Value) -> (StatusCode, Value) {
  let res = app
    .oneshot(
      Request::post(uri)
        .header("content-type", "application/json")
        .body(Body::from(body.to_string()))
        .unwrap(),
    )
    .await
    .unwrap();
  let status = res.status();
  let bytes = axum::body::to_bytes(res.into_body(), usize::MAX).await.unwrap();
  (status, serde_json::from_slice(&bytes).unwrap_or(Value::Null))
}

fn qb_body() -> Value {
  json!({
    "module": "question_bank",
    "meta": { "level": "SMP", "grade": "8", "subject": "Science" },
    "topic": "Ecosystems",
    "questions": {
      "layout": "families",
      "multiple_choice": { "selected": true, "count": 10 },
      "supplementary_multiple_choice": { "enabled": true, "count": 5 }
    }
  })
}

#[tokio::test]
async fn http_generate_returns_sections_with_generation_id() {
  let backend = Recording::new(json!({ "sections": six_sections() }).to_string());
  let state = Arc::new(AppState::with_generator(Generator::new(backend, GeneratorConfig::default())));
  let (status, body) = post_json(build_router(state), "/api/v1/generate", qb_body()).await;

  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["module"], "question_bank");
  assert_eq!(body["sections"].as_array().unwrap().len(), 6);
  assert_eq!(body["sections"][0]["id"], "naskah_soal");
  assert_eq!(body["generationId"].as_str().unwrap().len(), 36);
}

#[tokio::test]
async fn http_validation_error_is_bad_request() {
  let backend = Recording::new("{}");
  let state = Arc::new(AppState::with_generator(Generator::new(backend.clone(), GeneratorConfig::default())));
  let mut body = qb_body();
  body["questions"] = json!({ "layout": "sectioned", "sections": [] });
  let (status, body) = post_json(build_router(state), "/api/v1/generate", body).await;

  assert_eq!(status, StatusCode::BAD_REQUEST);
  assert_eq!(body["code"], "validation");
  assert_eq!(backend.calls(), 0);
}

#[tokio::test]
async fn http_unusable_output_hides_raw_text() {
  let backend = Recording::new("I am unable to produce that document.");
  let state = Arc::new(AppState::with_generator(Generator::new(backend, GeneratorConfig::default())));
  let (status, body) = post_json(build_router(state), "/api/v1/generate", qb_body()).await;

  assert_eq!(status, StatusCode::BAD_GATEWAY);
  assert_eq!(body["code"], "format");
  assert!(!body.to_string().contains("unable to produce"));
}

#[tokio::test]
async fn http_without_backend_is_not_configured() {
  let state = Arc::new(AppState::unconfigured());
  let (status, body) = post_json(build_router(state), "/api/v1/generate/ecourse", json!({ "topic": "Fractions" })).await;
  assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
  assert_eq!(body["code"], "not_configured");
}

#[tokio::test]
async fn http_topic_suggestions_return_text() {
  let backend = Recording::new("  - Food chains\n- Energy pyramids  ");
  let state = Arc::new(AppState::with_generator(Generator::new(backend.clone(), GeneratorConfig::default())));
  let (status, body) = post_json(
    build_router(state),
    "/api/v1/suggestions/topics",
    json!({ "meta": { "level": "SMP", "grade": "8", "subject": "Science" }, "semester": "even" }),
  )
  .await;

  assert_eq!(status, StatusCode::OK);
  assert_eq!(body["text"], "- Food chains\n- Energy pyramids");
  assert!(backend.prompts.lock().unwrap()[0].contains("Even (2)"));
}
