//! Recovering a section document from raw model text.
//!
//! The model is asked for schema-conformant JSON but may wrap it in code fences or
//! prose. Recovery runs in explicit phases:
//!   0. strict-parse the trimmed text; well-formed input is returned untouched,
//!   1. strip an outer code fence (opening fence line, closing fence),
//!   2. slice the object span (first `{` .. last `}`), else the array span
//!      (first `[` .. last `]`),
//!   3. strict-parse the slice.
//!
//! Fences inside string values are content and are never removed.
//!
//! A parsed document with the wrong shape is not repaired: whatever sections can be
//! read are returned with `ShapeWarning`s so the caller sees the gaps.

use serde::Serialize;
use serde_json::Value;
use tracing::{error, instrument, warn};

use crate::domain::GeneratedSection;
use crate::error::FormatError;
use crate::util::trunc_for_log;

/// Non-fatal shape problem in a successfully parsed document.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ShapeWarning {
  /// Object without a `sections` array.
  MissingSectionsArray,
  /// Top-level array used as the section list.
  BareArray,
  /// Element at `index` is not an object and was skipped.
  NotAnObject { index: usize },
  /// Element at `index` lacks a string `field`; it was left empty.
  MissingField { index: usize, field: &'static str },
  /// A section id the module asked for did not come back.
  MissingSection { id: String },
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Recovered {
  pub sections: Vec<GeneratedSection>,
  pub warnings: Vec<ShapeWarning>,
}

/// Remove an outer Markdown code fence: a leading "```lang" line and a trailing "```".
/// Text that does not start or end with a fence is only trimmed.
pub fn strip_code_fences(text: &str) -> &str {
  let mut t = text.trim();
  if let Some(rest) = t.strip_prefix("```") {
    t = match rest.split_once('\n') {
      Some((_, body)) => body,
      None => rest.trim_start_matches(|c: char| c.is_ascii_alphanumeric()),
    };
  }
  if let Some(rest) = t.trim_end().strip_suffix("```") {
    t = rest;
  }
  t.trim()
}

fn slice_between(text: &str, open: char, close: char) -> Option<&str> {
  let start = text.find(open)?;
  let end = text.rfind(close)?;
  (start < end).then(|| &text[start..=end])
}

/// Object-shape phase: first `{` through last `}`.
pub fn slice_object_span(text: &str) -> Option<&str> {
  slice_between(text, '{', '}')
}

/// Array-shape phase: first `[` through last `]`.
pub fn slice_array_span(text: &str) -> Option<&str> {
  slice_between(text, '[', ']')
}

/// Phases 0–3: produce a strictly parsed JSON value or a `FormatError`.
pub fn recover_json(raw: &str) -> Result<Value, FormatError> {
  if raw.trim().is_empty() {
    return Err(FormatError::new("empty response", raw));
  }
  if let Ok(doc) = serde_json::from_str::<Value>(raw.trim()) {
    return Ok(doc);
  }
  let cleaned = strip_code_fences(raw);
  let span = slice_object_span(cleaned)
    .or_else(|| slice_array_span(cleaned))
    .ok_or_else(|| FormatError::new("no JSON object or array found", raw))?;
  serde_json::from_str::<Value>(span).map_err(|e| FormatError::new(format!("invalid JSON: {e}"), raw))
}

fn string_field(obj: &serde_json::Map<String, Value>, field: &'static str, index: usize, warnings: &mut Vec<ShapeWarning>) -> String {
  match obj.get(field) {
    Some(Value::String(s)) => s.clone(),
    _ => {
      warnings.push(ShapeWarning::MissingField { index, field });
      String::new()
    }
  }
}

/// Read sections out of a parsed document, recording shape warnings.
pub fn extract_sections(doc: &Value) -> Recovered {
  let mut warnings = Vec::new();
  let items: &[Value] = match doc {
    Value::Object(map) => match map.get("sections") {
      Some(Value::Array(items)) => items.as_slice(),
      _ => {
        warnings.push(ShapeWarning::MissingSectionsArray);
        &[]
      }
    },
    Value::Array(items) => {
      warnings.push(ShapeWarning::BareArray);
      items.as_slice()
    }
    _ => {
      warnings.push(ShapeWarning::MissingSectionsArray);
      &[]
    }
  };

  let mut sections = Vec::with_capacity(items.len());
  for (index, item) in items.iter().enumerate() {
    let Value::Object(obj) = item else {
      warnings.push(ShapeWarning::NotAnObject { index });
      continue;
    };
    sections.push(GeneratedSection {
      id: string_field(obj, "id", index, &mut warnings),
      title: string_field(obj, "title", index, &mut warnings),
      content: string_field(obj, "content", index, &mut warnings),
    });
  }
  Recovered { sections, warnings }
}

/// Parse raw model text into ordered sections.
#[instrument(level = "debug", skip(raw), fields(raw_len = raw.len()))]
pub fn parse(raw: &str) -> Result<Recovered, FormatError> {
  let doc = recover_json(raw).map_err(|e| {
    error!(target: "generation", reason = %e.reason, raw = %trunc_for_log(raw, 2000), "Could not recover JSON from model output");
    e
  })?;
  let recovered = extract_sections(&doc);
  if !recovered.warnings.is_empty() {
    warn!(target: "generation", warnings = ?recovered.warnings, sections = recovered.sections.len(), "Model output has shape problems");
  }
  Ok(recovered)
}
