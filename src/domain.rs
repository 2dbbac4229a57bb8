//! Domain models: the tagged generation request, subject metadata, question
//! families, and the generated section unit returned to callers.

use serde::{Deserialize, Serialize};

/// Which generation module a request targets.
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Module {
  Admin,
  QuestionBank,
  Ecourse,
}

impl Module {
  pub fn as_str(self) -> &'static str {
    match self {
      Module::Admin => "admin",
      Module::QuestionBank => "question_bank",
      Module::Ecourse => "ecourse",
    }
  }
}

/// Subject metadata shared by all modules.
#[derive(Clone, Debug, Serialize, Deserialize, Default, PartialEq)]
pub struct SubjectMeta {
  pub level: String,   // school level, e.g. "SMP", "Pesantren"
  pub grade: String,
  pub subject: String,
  #[serde(default)] pub language: String,
  #[serde(default)] pub phase: String,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum Semester {
  #[default]
  Odd,
  Even,
}

impl Semester {
  pub fn label(self) -> &'static str {
    match self {
      Semester::Odd => "Odd (1)",
      Semester::Even => "Even (2)",
    }
  }
}

/// Caller-supplied request descriptor, one variant per module.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "module", rename_all = "snake_case")]
pub enum GenerationRequest {
  Admin(AdminRequest),
  QuestionBank(QuestionBankRequest),
  Ecourse(ECourseRequest),
}

impl GenerationRequest {
  pub fn module(&self) -> Module {
    match self {
      GenerationRequest::Admin(_) => Module::Admin,
      GenerationRequest::QuestionBank(_) => Module::QuestionBank,
      GenerationRequest::Ecourse(_) => Module::Ecourse,
    }
  }
}

/// Administrative teaching package (curriculum analysis, yearly/semester plans, ...).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
pub struct AdminRequest {
  pub meta: SubjectMeta,
  #[serde(default)] pub curriculum_elements: String,
  #[serde(default)] pub time_allocation: String,
  #[serde(default = "one")] pub teaching_module_count: u32,
  #[serde(default)] pub school: String,
  #[serde(default)] pub teacher_name: String,
  #[serde(default)] pub academic_year: String,
  #[serde(default)] pub semester: Semester,
  #[serde(default)] pub extended_reasoning: bool,
}

/// Upper bound for teaching modules and e-course meetings in one request.
pub const MAX_MODULES: u32 = 20;

impl AdminRequest {
  /// Requested module count, clamped to `1..=MAX_MODULES`.
  pub fn module_count(&self) -> u32 {
    self.teaching_module_count.clamp(1, MAX_MODULES)
  }
}

/// Question bank (assessment package).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct QuestionBankRequest {
  pub meta: SubjectMeta,
  #[serde(default)] pub topic: String,
  #[serde(default)] pub difficulty: String,
  #[serde(default)] pub teacher_name: String,
  #[serde(default)] pub academic_year: String,
  #[serde(default)] pub semester: Semester,
  pub questions: QuestionSelection,
  #[serde(default)] pub header: Option<ExamHeader>,
  #[serde(default)] pub extended_reasoning: bool,
}

/// Either the three fixed families, or an explicit list of labeled sections.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(tag = "layout", rename_all = "snake_case")]
pub enum QuestionSelection {
  Families(FamilyMix),
  Sectioned { sections: Vec<CustomSection> },
}

#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
pub struct FamilyMix {
  #[serde(default)] pub multiple_choice: FamilySelection,
  #[serde(default)] pub open_ended: FamilySelection,
  #[serde(default)] pub short_answer: FamilySelection,
  #[serde(default)] pub supplementary_multiple_choice: SupplementaryPool,
  #[serde(default)] pub supplementary_open_ended: SupplementaryPool,
  /// Grouping tag for the supplementary pools (e.g. "science", "social").
  #[serde(default)] pub supplementary_group: String,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct FamilySelection {
  #[serde(default)] pub selected: bool,
  #[serde(default)] pub count: u32,
}

#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Default)]
pub struct SupplementaryPool {
  #[serde(default)] pub enabled: bool,
  #[serde(default)] pub count: u32,
}

/// One caller-labeled part of a sectioned question bank.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct CustomSection {
  pub label: String,
  pub instruction: String,
  pub count: u32,
}

/// Optional letterhead details embedded at the top of the item bank.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
pub struct ExamHeader {
  #[serde(default)] pub foundation: String,
  #[serde(default)] pub school: String,
  #[serde(default)] pub address: String,
  #[serde(default)] pub assessment_title: String,
  #[serde(default)] pub exam_date: String,
  #[serde(default)] pub period: String,
  #[serde(default)] pub duration: String,
}

/// E-course package (syllabus, per-meeting material, slide block).
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Default)]
pub struct ECourseRequest {
  #[serde(default)] pub meta: SubjectMeta,
  pub topic: String,
  #[serde(default = "one")] pub meeting_count: u32,
  #[serde(default)] pub teacher_name: String,
  #[serde(default)] pub extended_reasoning: bool,
}

impl ECourseRequest {
  /// Requested meeting count, clamped to `1..=MAX_MODULES`.
  pub fn meetings(&self) -> u32 {
    self.meeting_count.clamp(1, MAX_MODULES)
  }
}

fn one() -> u32 { 1 }

/// Pipeline output unit.
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
pub struct GeneratedSection {
  pub id: String,
  pub title: String,
  pub content: String,
}
