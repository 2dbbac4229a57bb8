//! Prompt composition for the three generation modules.
//!
//! Each composer produces one `GenerationPrompt`: the instruction text, the call
//! configuration (schema, temperature, optional reasoning budget) and the section
//! ids the module expects back. Composition is pure; every table it reads comes
//! from `GeneratorConfig`.

use std::fmt::Write as _;

use serde::Serialize;
use serde_json::{json, Value};

use crate::config::GeneratorConfig;
use crate::counts::{CountBreakdown, FamilyCount};
use crate::domain::{AdminRequest, ECourseRequest, ExamHeader, Module, QuestionBankRequest, SubjectMeta};
use crate::util::fill_template;

pub const SLIDE_START_MARKER: &str = "<!-- SLIDE_CONTENT_START -->";
pub const SLIDE_END_MARKER: &str = "<!-- SLIDE_CONTENT_END -->";

/// A required output document: stable id, display title, per-document instruction.
pub struct SectionSpec {
  pub id: &'static str,
  pub title: &'static str,
  pub instruction: &'static str,
}

pub const ADMIN_SECTIONS: [SectionSpec; 6] = [
  SectionSpec {
    id: "atp",
    title: "Learning Outcome, Objective and Objective-Flow Analysis",
    instruction: "Build an ordered objective-flow table with columns: Element, Learning Outcome, Learning Objective, Objective Flow, Core Material, Time Allocation, Student Profile Dimensions.",
  },
  SectionSpec { id: "prota", title: "Annual Program", instruction: "Build a complete annual program table." },
  SectionSpec { id: "promes", title: "Semester Program", instruction: "Build a complete semester program table for this semester." },
  SectionSpec {
    id: "modul_ajar",
    title: "Teaching Modules",
    instruction: "Write {module_count} complete teaching module(s). Every part (General Information, Core Components, Attachments) must be a clear table.",
  },
  SectionSpec {
    id: "kktp",
    title: "Objective Achievement Criteria",
    instruction: "Build a criteria table with score intervals and criterion descriptions.",
  },
  SectionSpec {
    id: "jurnal",
    title: "Teacher Daily Journal",
    instruction: "Build a ready-to-fill daily journal table (Day/Date, Period, Material, Activities, Assessment, Attendance, Notes).",
  },
];

pub const QUESTION_BANK_SECTIONS: [SectionSpec; 6] = [
  SectionSpec {
    id: "naskah_soal",
    title: "1. Item Bank (Exam Paper)",
    instruction: "Write the full exam paper. FOLLOW THE QUESTION STRUCTURE AND COUNTS ABOVE EXACTLY. Merge regular and supplementary items of the same type into one part.",
  },
  SectionSpec {
    id: "kunci_jawaban",
    title: "2. Answer Key & Discussion",
    instruction: "Give the answer key for ALL questions (matching the counts above) with DETAILED discussion.",
  },
  SectionSpec {
    id: "kisi_kisi",
    title: "3. Item Specification Table",
    instruction: "Build a specification table for ALL questions (matching the counts and numbers above). Columns: No, Learning Outcome, Material, Indicator, Cognitive Level, Item Form.",
  },
  SectionSpec {
    id: "rubrik_penilaian",
    title: "4. Scoring Rubric",
    instruction: "Build a detailed scoring rubric: scores for multiple choice and an analytic rubric for open-ended items.",
  },
  SectionSpec {
    id: "analisis_kualitatif",
    title: "5. Qualitative Item Analysis",
    instruction: "Build a qualitative analysis table: Item No, Material/Construction/Language aspect, Meets/Does not meet.",
  },
  SectionSpec {
    id: "ringkasan_materi",
    title: "6. Material Summary",
    instruction: "Write a dense, clear summary covering every topic tested by the questions.",
  },
];

pub const ECOURSE_SECTION_ID: &str = "ecourse_package";

/// Call configuration sent with the prompt.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct CallConfig {
  /// Declared output schema; `None` for plain-text calls.
  pub response_schema: Option<Value>,
  pub temperature: f32,
  pub thinking_budget: Option<u32>,
}

/// Built once, sent once (barring retries), never mutated.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct GenerationPrompt {
  pub module: Option<Module>,
  pub text: String,
  pub config: CallConfig,
  /// Section ids the module requires, in order. Empty for plain-text calls.
  pub expected_ids: Vec<String>,
}

impl GenerationPrompt {
  /// Plain-text prompt (suggestions): no schema, no expected sections.
  pub fn plain(text: String, temperature: f32) -> Self {
    Self {
      module: None,
      text,
      config: CallConfig { response_schema: None, temperature, thinking_budget: None },
      expected_ids: Vec::new(),
    }
  }
}

/// `{ sections: [{ id, title, content }] }`, in the backend's schema dialect.
pub fn sections_schema() -> Value {
  json!({
    "type": "OBJECT",
    "properties": {
      "sections": {
        "type": "ARRAY",
        "description": "An array of generated document sections.",
        "items": {
          "type": "OBJECT",
          "properties": {
            "id": { "type": "STRING", "description": "Unique identifier for the section (e.g. 'atp', 'naskah_soal')." },
            "title": { "type": "STRING", "description": "The title of the generated section." },
            "content": { "type": "STRING", "description": "The full HTML content of the section." }
          },
          "required": ["id", "title", "content"]
        }
      }
    },
    "required": ["sections"]
  })
}

fn call_config(cfg: &GeneratorConfig, module: Module, extended_reasoning: bool) -> CallConfig {
  CallConfig {
    response_schema: Some(sections_schema()),
    temperature: cfg.generation.temperature(module),
    thinking_budget: extended_reasoning.then(|| cfg.generation.thinking_budget(module)),
  }
}

/// Diacritics + direction directives, only for the designated classical language.
pub fn language_directives(cfg: &GeneratorConfig, language: &str) -> Vec<String> {
  if !cfg.language.is_classical(language) {
    return Vec::new();
  }
  let lang = cfg.language.classical_language.as_str();
  vec![
    fill_template(&cfg.prompts.classical_diacritics_rule, &[("language", lang)]),
    fill_template(&cfg.prompts.classical_direction_rule, &[("language", lang)]),
  ]
}

fn quoted_ids(specs: &[SectionSpec]) -> String {
  specs.iter().map(|s| format!("\"{}\"", s.id)).collect::<Vec<_>>().join(", ")
}

fn push_rules(out: &mut String, rules: &[String]) {
  for r in rules.iter().filter(|r| !r.trim().is_empty()) {
    let _ = writeln!(out, "- {r}");
  }
}

// ---------------- Administrative package ----------------

pub fn compose_admin(req: &AdminRequest, cfg: &GeneratorConfig) -> GenerationPrompt {
  let m = &req.meta;
  let module_count = req.module_count().to_string();
  let mut text = String::new();

  let _ = writeln!(text, "{}", cfg.prompts.admin_role);
  let _ = writeln!(text, "\n**Data:**");
  let _ = writeln!(text, "- Level: {}", m.level);
  let _ = writeln!(text, "- Grade: {}", m.grade);
  let _ = writeln!(text, "- Phase: {}", m.phase);
  let _ = writeln!(text, "- Subject: {}", m.subject);
  let _ = writeln!(text, "- Curriculum elements: {}", req.curriculum_elements);
  let _ = writeln!(text, "- Time allocation: {}", req.time_allocation);
  let _ = writeln!(text, "- Number of teaching modules: {module_count}");
  let _ = writeln!(text, "- School: {}", req.school);
  let _ = writeln!(text, "- Teacher: {}", req.teacher_name);
  let _ = writeln!(text, "- Academic year: {}", req.academic_year);
  let _ = writeln!(text, "- Semester: {}", req.semester.label());
  let _ = writeln!(text, "- Language: {}", m.language);

  let _ = writeln!(
    text,
    "\n**Task:**\nGenerate an administration package that MUST contain these **6 (SIX) COMPLETE DOCUMENTS** as JSON. Do not skip any.\n"
  );
  for (i, s) in ADMIN_SECTIONS.iter().enumerate() {
    let instruction = fill_template(s.instruction, &[("module_count", &module_count)]);
    let _ = writeln!(text, "{}. **{}** (id \"{}\"): {}", i + 1, s.title, s.id, instruction);
  }

  let _ = writeln!(text, "\n**Format rules:**");
  let mut rules = vec![
    "ALL CONTENT of every section must be inside '<table>' tags. Use table structure (<table>, <thead>, <tbody>, <tr>, <th>, <td>) extensively.".to_string(),
    "The root object must have a \"sections\" property holding an array.".to_string(),
    format!(
      "Every section object must have: \"id\" (one of {}), \"title\" (document title), \"content\" (HTML string).",
      quoted_ids(&ADMIN_SECTIONS)
    ),
    cfg.prompts.html_quote_rule.clone(),
  ];
  rules.extend(language_directives(cfg, &m.language));
  push_rules(&mut text, &rules);

  GenerationPrompt {
    module: Some(Module::Admin),
    text,
    config: call_config(cfg, Module::Admin, req.extended_reasoning),
    expected_ids: ADMIN_SECTIONS.iter().map(|s| s.id.to_string()).collect(),
  }
}

// ---------------- Question bank ----------------

fn family_block(f: &FamilyCount, subject: &str, group: &str) -> String {
  let mut block = format!(
    "{}. {} (Total {} questions)",
    f.family.letter(),
    f.family.label().to_uppercase(),
    f.total
  );
  if let Some(r) = f.base_range {
    let _ = write!(block, "\n   - Numbers {} to {}: {} regular {} questions.", r.start, r.end, f.base, subject);
  }
  if let Some(r) = f.supplementary_range {
    let group = if group.is_empty() { String::new() } else { format!(" - group {group}") };
    let _ = write!(block, "\n   - Numbers {} to {}: {} supplementary questions{}.", r.start, r.end, f.supplementary, group);
  }
  block
}

/// Human-readable numbered checklist embedded in the question-bank prompt.
pub fn breakdown_checklist(breakdown: &CountBreakdown, subject: &str) -> String {
  let mut out = String::from("**REQUIRED QUESTION STRUCTURE AND COUNTS (DO NOT DEVIATE):**\n\n");
  match breakdown {
    CountBreakdown::Families { families, group, grand_total } => {
      let blocks: Vec<String> = families.iter().map(|f| family_block(f, subject, group)).collect();
      out.push_str(&blocks.join("\n\n"));
      let _ = write!(out, "\n\nGRAND TOTAL: {grand_total} questions.");
    }
    CountBreakdown::Sectioned { sections } => {
      let lines: Vec<String> = sections
        .iter()
        .map(|s| format!("- Part {}: {} questions. Instruction: \"{}\"", s.label, s.count, s.instruction))
        .collect();
      out.push_str(&lines.join("\n"));
      out.push_str("\n\nGRAND TOTAL: as specified per part above.");
    }
  }
  out.push_str("\nNumbering continues across parts (do not restart at 1 in later parts unless told otherwise).");
  out
}

/// Letterhead block for the exam paper.
pub fn exam_header_html(header: &ExamHeader, meta: &SubjectMeta, req: &QuestionBankRequest) -> String {
  let cell = "style='border: none; padding: 2px;'";
  format!(
    "<div style='text-align: center; font-family: Times New Roman, serif; border-bottom: 3px solid black; padding-bottom: 5px; margin-bottom: 10px;'>\
<h3 style='margin: 0; font-size: 14pt; font-weight: bold;'>{foundation}</h3>\
<h2 style='margin: 0; font-size: 18pt; font-weight: bold;'>{school}</h2>\
<p style='margin: 0; font-size: 10pt;'>{address}</p></div>\
<h3 style='text-align: center; font-family: Times New Roman, serif; font-weight: bold; margin-top: 20px;'>{title}</h3>\
<table style='width: 100%; border-collapse: collapse; font-family: Times New Roman, serif; margin-top: 15px; font-size: 11pt;'><tbody>\
<tr><td {cell}>Subject</td><td {cell}>:</td><td {cell}>{subject}</td><td {cell}>Date</td><td {cell}>:</td><td {cell}>{date}</td></tr>\
<tr><td {cell}>Grade/Semester</td><td {cell}>:</td><td {cell}>{grade} / {semester}</td><td {cell}>Period</td><td {cell}>:</td><td {cell}>{period}</td></tr>\
<tr><td {cell}>Academic year</td><td {cell}>:</td><td {cell}>{year}</td><td {cell}>Duration</td><td {cell}>:</td><td {cell}>{duration}</td></tr>\
</tbody></table>",
    foundation = header.foundation,
    school = header.school,
    address = header.address,
    title = header.assessment_title,
    subject = meta.subject,
    date = header.exam_date,
    grade = meta.grade,
    semester = req.semester.label(),
    period = header.period,
    year = req.academic_year,
    duration = header.duration,
  )
}

pub fn signature_block_html(teacher_name: &str) -> String {
  format!(
    "<div style='margin-top: 40px; overflow: auto;'><div style='float: right; text-align: center; width: 250px;'>\
<p>Subject Teacher</p><br/><br/><br/><p style='font-weight: bold; text-decoration: underline;'>{teacher_name}</p></div></div>"
  )
}

pub fn compose_question_bank(
  req: &QuestionBankRequest,
  breakdown: &CountBreakdown,
  cfg: &GeneratorConfig,
) -> GenerationPrompt {
  let m = &req.meta;
  let mut text = String::new();

  let _ = writeln!(text, "{}", cfg.prompts.question_bank_role);
  let _ = writeln!(text, "\n**Data:**");
  let _ = writeln!(text, "- Level: {}", m.level);
  let _ = writeln!(text, "- Grade: {}", m.grade);
  let _ = writeln!(text, "- Subject: {}", m.subject);
  let _ = writeln!(text, "- Topic/Material: {}", req.topic);
  let _ = writeln!(text, "- Difficulty: {}", req.difficulty);
  let _ = writeln!(text, "- Language: {}", m.language);

  let _ = writeln!(text, "\n{}\n", breakdown_checklist(breakdown, &m.subject));

  let mut directives = Vec::new();
  if cfg.language.is_application_focus(&m.subject) {
    directives.push(fill_template(&cfg.prompts.application_focus_rule, &[("subject", &m.subject)]));
  }
  directives.extend(language_directives(cfg, &m.language));
  for d in &directives {
    let _ = writeln!(text, "**{d}**");
  }

  let _ = writeln!(
    text,
    "\n**Main task:**\nGenerate an assessment package that MUST contain these **6 (SIX) COMPLETE FILES/SECTIONS** as JSON, in this order:\n"
  );
  for (i, s) in QUESTION_BANK_SECTIONS.iter().enumerate() {
    let _ = writeln!(text, "DOCUMENT {}: **{}**\nInstruction: {}\n", i + 1, s.title, s.instruction);
  }

  let _ = writeln!(text, "**Format rules:**");
  let rules = vec![
    "DO NOT SKIP ANY SECTION. The user needs all 6 files.".to_string(),
    "Numbering rule: use NUMBERS (1, 2, 3, ...) to number every question in sequence.".to_string(),
    "The root object must have a \"sections\" property holding an array.".to_string(),
    format!(
      "Every section object must have: \"id\" (one of {}), \"title\" (string), \"content\" (HTML string).",
      quoted_ids(&QUESTION_BANK_SECTIONS)
    ),
    "Use standard HTML tags (<ol>, <li>, <table>).".to_string(),
    cfg.prompts.html_quote_rule.clone(),
  ];
  push_rules(&mut text, &rules);

  if let Some(header) = &req.header {
    let _ = writeln!(
      text,
      "\n**Exam header (place at the start of the item bank content):**\n```html\n{}\n```",
      exam_header_html(header, m, req)
    );
  }
  if !req.teacher_name.trim().is_empty() {
    let _ = writeln!(
      text,
      "\n**Signature block (for every document except the item bank):**\n```html\n{}\n```",
      signature_block_html(&req.teacher_name)
    );
  }

  GenerationPrompt {
    module: Some(Module::QuestionBank),
    text,
    config: call_config(cfg, Module::QuestionBank, req.extended_reasoning),
    expected_ids: QUESTION_BANK_SECTIONS.iter().map(|s| s.id.to_string()).collect(),
  }
}

// ---------------- E-course ----------------

pub fn compose_ecourse(req: &ECourseRequest, cfg: &GeneratorConfig) -> GenerationPrompt {
  let meetings = req.meetings();
  let mut text = String::new();

  let _ = writeln!(text, "{}", cfg.prompts.ecourse_role);
  let _ = writeln!(text, "\n**E-course data:**");
  let _ = writeln!(text, "- Main topic: \"{}\"", req.topic);
  let _ = writeln!(text, "- Number of meetings/modules: {meetings}");
  let _ = writeln!(text, "- Instructor: {}", req.teacher_name);
  if !req.meta.subject.is_empty() {
    let _ = writeln!(text, "- Subject: {} (level {}, grade {})", req.meta.subject, req.meta.level, req.meta.grade);
  }
  if !req.meta.language.is_empty() {
    let _ = writeln!(text, "- Language: {}", req.meta.language);
  }

  let _ = writeln!(
    text,
    "\n**Task:**\nGenerate a comprehensive e-course package as JSON. The root object must have a \"sections\" property holding an array with EXACTLY ONE object. That object must have: \"id\" (string: \"{ECOURSE_SECTION_ID}\"), \"title\" (string: \"Complete E-Course Package: [Main topic]\") and \"content\" (HTML string)."
  );
  let _ = writeln!(text, "\n**HTML structure of \"content\":**");
  let _ = writeln!(text, "1. **Syllabus & Learning Path**: title, short description, general objectives, target audience, and a plan table (meeting number, material title, activities, estimated time).");
  let _ = writeln!(text, "2. **Material per meeting**: an <h3> per meeting (e.g. \"<h3>Meeting 1: Title</h3>\") with specific objectives (<ul>), main material, an exercise or case study, and a short quiz.");
  let _ = writeln!(
    text,
    "3. **Presentation slide content**: a block that starts with `{SLIDE_START_MARKER}` and ends with `{SLIDE_END_MARKER}`. Inside it, write each slide as `<div class='ppt-slide'><h4 class='slide-title'>Slide title</h4><div class='slide-content'>...</div></div>`, covering a summary of all meetings."
  );

  let _ = writeln!(text, "\n**Important rules:**");
  let mut rules = vec![
    "Use standard HTML tags (<h1>, <h2>, <h3>, <p>, <ul>, <li>, <table>, <strong>).".to_string(),
    cfg.prompts.html_quote_rule.clone(),
    "The entire output must be one valid HTML string inside the \"content\" property.".to_string(),
  ];
  rules.extend(language_directives(cfg, &req.meta.language));
  push_rules(&mut text, &rules);

  GenerationPrompt {
    module: Some(Module::Ecourse),
    text,
    config: call_config(cfg, Module::Ecourse, req.extended_reasoning),
    expected_ids: vec![ECOURSE_SECTION_ID.to_string()],
  }
}

// ---------------- Suggestions ----------------

pub fn compose_curriculum_suggestion(meta: &SubjectMeta, cfg: &GeneratorConfig) -> GenerationPrompt {
  let text = fill_template(
    &cfg.prompts.curriculum_suggestion_template,
    &[("subject", &meta.subject), ("level", &meta.level), ("grade", &meta.grade), ("phase", &meta.phase)],
  );
  GenerationPrompt::plain(text, cfg.generation.suggestion_temperature)
}

pub fn compose_topic_suggestion(meta: &SubjectMeta, semester: &str, cfg: &GeneratorConfig) -> GenerationPrompt {
  let text = fill_template(
    &cfg.prompts.topic_suggestion_template,
    &[
      ("subject", &meta.subject),
      ("level", &meta.level),
      ("grade", &meta.grade),
      ("phase", &meta.phase),
      ("semester", semester),
    ],
  );
  GenerationPrompt::plain(text, cfg.generation.suggestion_temperature)
}
