//! Question-count resolution.
//!
//! Turns a question-bank selection into exact per-family totals and a numbering
//! plan that continues across families (multiple choice, then open ended, then
//! short answer). A family with a zero total takes no numbers.
//!
//! Resolution is pure and runs before any backend call, so an empty request is
//! rejected without touching the network.

use serde::Serialize;

use crate::domain::{CustomSection, FamilyMix, QuestionSelection};
use crate::error::ValidationError;

#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Family {
  MultipleChoice,
  OpenEnded,
  ShortAnswer,
}

impl Family {
  /// Fixed processing order for numbering.
  pub const ORDER: [Family; 3] = [Family::MultipleChoice, Family::OpenEnded, Family::ShortAnswer];

  pub fn label(self) -> &'static str {
    match self {
      Family::MultipleChoice => "Multiple choice",
      Family::OpenEnded => "Open ended",
      Family::ShortAnswer => "Short answer",
    }
  }

  /// Part letter used in the generated checklist.
  pub fn letter(self) -> char {
    match self {
      Family::MultipleChoice => 'A',
      Family::OpenEnded => 'B',
      Family::ShortAnswer => 'C',
    }
  }
}

/// Inclusive numbering range.
#[derive(Clone, Copy, Debug, Serialize, PartialEq, Eq)]
pub struct NumberRange {
  pub start: u32,
  pub end: u32,
}

impl NumberRange {
  /// Range of `len` numbers beginning at `start`; `None` when `len` is zero
  /// or the range would run past `u32::MAX`.
  pub fn span(start: u32, len: u32) -> Option<Self> {
    let end = start.checked_add(len.checked_sub(1)?)?;
    Some(Self { start, end })
  }

  pub fn width(&self) -> u32 {
    self.end - self.start + 1
  }
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct FamilyCount {
  pub family: Family,
  pub base: u32,
  pub supplementary: u32,
  pub total: u32,
  pub range: NumberRange,
  pub base_range: Option<NumberRange>,
  pub supplementary_range: Option<NumberRange>,
}

#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
pub struct SectionCount {
  pub label: String,
  pub instruction: String,
  pub count: u32,
}

/// Derived once per request, read by the prompt composer, then dropped.
#[derive(Clone, Debug, Serialize, PartialEq, Eq)]
#[serde(tag = "layout", rename_all = "snake_case")]
pub enum CountBreakdown {
  Families {
    /// Only families with a non-zero total, in processing order.
    families: Vec<FamilyCount>,
    /// Supplementary pool grouping tag, if any.
    group: String,
    grand_total: u32,
  },
  Sectioned { sections: Vec<SectionCount> },
}

impl CountBreakdown {
  pub fn family(&self, family: Family) -> Option<&FamilyCount> {
    match self {
      CountBreakdown::Families { families, .. } => families.iter().find(|f| f.family == family),
      CountBreakdown::Sectioned { .. } => None,
    }
  }
}

/// Resolve a question-bank selection into a `CountBreakdown`.
pub fn resolve(selection: &QuestionSelection) -> Result<CountBreakdown, ValidationError> {
  match selection {
    QuestionSelection::Families(mix) => resolve_families(mix),
    QuestionSelection::Sectioned { sections } => resolve_sections(sections),
  }
}

fn family_inputs(mix: &FamilyMix, family: Family) -> (bool, u32, u32) {
  let (sel, pool) = match family {
    Family::MultipleChoice => (mix.multiple_choice, Some(mix.supplementary_multiple_choice)),
    Family::OpenEnded => (mix.open_ended, Some(mix.supplementary_open_ended)),
    Family::ShortAnswer => (mix.short_answer, None),
  };
  let base = if sel.selected { sel.count } else { 0 };
  let supplementary = pool.filter(|p| p.enabled).map(|p| p.count).unwrap_or(0);
  (sel.selected, base, supplementary)
}

fn resolve_families(mix: &FamilyMix) -> Result<CountBreakdown, ValidationError> {
  let mut families = Vec::new();
  let mut next = 1u32;

  for family in Family::ORDER {
    let (selected, base, supplementary) = family_inputs(mix, family);
    let total = base.checked_add(supplementary).ok_or(ValidationError::TooManyQuestions)?;
    if selected && total == 0 {
      return Err(ValidationError::EmptyFamily { family: family.label() });
    }
    if total == 0 {
      continue;
    }
    let after = next.checked_add(total).ok_or(ValidationError::TooManyQuestions)?;
    let range = NumberRange { start: next, end: after - 1 };
    families.push(FamilyCount {
      family,
      base,
      supplementary,
      total,
      range,
      base_range: NumberRange::span(next, base),
      supplementary_range: NumberRange::span(next + base, supplementary),
    });
    next = after;
  }

  if families.is_empty() {
    return Err(ValidationError::NothingToGenerate);
  }

  let grand_total = families.iter().map(|f| f.total).sum();
  Ok(CountBreakdown::Families { families, group: mix.supplementary_group.trim().to_string(), grand_total })
}

fn resolve_sections(sections: &[CustomSection]) -> Result<CountBreakdown, ValidationError> {
  if sections.is_empty() {
    return Err(ValidationError::NothingToGenerate);
  }
  if let Some(s) = sections.iter().find(|s| s.count == 0) {
    return Err(ValidationError::EmptySection { label: s.label.clone() });
  }
  let sections = sections
    .iter()
    .map(|s| SectionCount { label: s.label.clone(), instruction: s.instruction.clone(), count: s.count })
    .collect();
  Ok(CountBreakdown::Sectioned { sections })
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::domain::{FamilySelection, SupplementaryPool};

  fn pick(count: u32) -> FamilySelection { FamilySelection { selected: true, count } }
  fn pool(count: u32) -> SupplementaryPool { SupplementaryPool { enabled: true, count } }

  fn families(b: &CountBreakdown) -> &[FamilyCount] {
    match b {
      CountBreakdown::Families { families, .. } => families,
      other => panic!("expected families, got {other:?}"),
    }
  }

  #[test]
  fn oversized_counts_are_rejected() {
    let mix = FamilyMix { multiple_choice: pick(u32::MAX), supplementary_multiple_choice: pool(1), ..Default::default() };
    assert_eq!(resolve(&QuestionSelection::Families(mix)), Err(ValidationError::TooManyQuestions));

    let mix = FamilyMix { multiple_choice: pick(u32::MAX - 5), short_answer: pick(10), ..Default::default() };
    assert_eq!(resolve(&QuestionSelection::Families(mix)), Err(ValidationError::TooManyQuestions));

    assert_eq!(NumberRange::span(u32::MAX, 2), None);
    assert_eq!(NumberRange::span(u32::MAX, 1), Some(NumberRange { start: u32::MAX, end: u32::MAX }));
  }

  #[test]
  fn multiple_choice_with_supplementary_pool() {
    let mix = FamilyMix {
      multiple_choice: pick(10),
      supplementary_multiple_choice: pool(5),
      ..Default::default()
    };
    let b = resolve(&QuestionSelection::Families(mix)).unwrap();
    let mc = b.family(Family::MultipleChoice).unwrap();
    assert_eq!(mc.total, 15);
    assert_eq!(mc.range, NumberRange { start: 1, end: 15 });
    assert_eq!(mc.base_range, Some(NumberRange { start: 1, end: 10 }));
    assert_eq!(mc.supplementary_range, Some(NumberRange { start: 11, end: 15 }));
    assert_eq!(families(&b).len(), 1);
  }

  #[test]
  fn ranges_are_contiguous_and_conserve_totals() {
    let cases = [
      (pick(30), pick(4), pick(0), pool(10), pool(2)),
      (pick(1), FamilySelection::default(), pick(7), pool(0), SupplementaryPool::default()),
      (FamilySelection::default(), pick(5), pick(3), SupplementaryPool::default(), pool(5)),
      (pick(12), pick(12), FamilySelection::default(), SupplementaryPool::default(), SupplementaryPool::default()),
    ];
    for (mc, oe, sa, smc, soe) in cases {
      // A selected short-answer family with a zero count is rejected separately.
      let sa = if sa.count == 0 { FamilySelection::default() } else { sa };
      let smc = if smc.count == 0 { SupplementaryPool::default() } else { smc };
      let mix = FamilyMix {
        multiple_choice: mc,
        open_ended: oe,
        short_answer: sa,
        supplementary_multiple_choice: smc,
        supplementary_open_ended: soe,
        supplementary_group: String::new(),
      };
      let b = resolve(&QuestionSelection::Families(mix)).unwrap();
      let fs = families(&b);
      let mut expected_start = 1;
      let mut width_sum = 0;
      for f in fs {
        assert_eq!(f.range.start, expected_start, "{f:?}");
        assert_eq!(f.range.width(), f.total);
        assert_eq!(f.base + f.supplementary, f.total);
        expected_start = f.range.end + 1;
        width_sum += f.range.width();
      }
      let CountBreakdown::Families { grand_total, .. } = &b else { unreachable!() };
      assert_eq!(width_sum, *grand_total);
    }
  }

  #[test]
  fn zero_width_families_are_skipped() {
    let mix = FamilyMix { open_ended: pick(3), short_answer: pick(2), ..Default::default() };
    let b = resolve(&QuestionSelection::Families(mix)).unwrap();
    assert!(b.family(Family::MultipleChoice).is_none());
    assert_eq!(b.family(Family::OpenEnded).unwrap().range, NumberRange { start: 1, end: 3 });
    assert_eq!(b.family(Family::ShortAnswer).unwrap().range, NumberRange { start: 4, end: 5 });
  }

  #[test]
  fn supplementary_pool_counts_without_base_selection() {
    let mix = FamilyMix { supplementary_open_ended: pool(4), ..Default::default() };
    let b = resolve(&QuestionSelection::Families(mix)).unwrap();
    let oe = b.family(Family::OpenEnded).unwrap();
    assert_eq!(oe.base_range, None);
    assert_eq!(oe.supplementary_range, Some(NumberRange { start: 1, end: 4 }));
  }

  #[test]
  fn disabled_pool_is_ignored() {
    let mix = FamilyMix {
      multiple_choice: pick(5),
      supplementary_multiple_choice: SupplementaryPool { enabled: false, count: 20 },
      ..Default::default()
    };
    let b = resolve(&QuestionSelection::Families(mix)).unwrap();
    assert_eq!(b.family(Family::MultipleChoice).unwrap().total, 5);
  }

  #[test]
  fn empty_selection_is_rejected() {
    let err = resolve(&QuestionSelection::Families(FamilyMix::default())).unwrap_err();
    assert_eq!(err, ValidationError::NothingToGenerate);

    let err = resolve(&QuestionSelection::Sectioned { sections: vec![] }).unwrap_err();
    assert_eq!(err, ValidationError::NothingToGenerate);
  }

  #[test]
  fn selected_family_with_zero_total_is_rejected() {
    let mix = FamilyMix { multiple_choice: pick(10), short_answer: pick(0), ..Default::default() };
    let err = resolve(&QuestionSelection::Families(mix)).unwrap_err();
    assert_eq!(err, ValidationError::EmptyFamily { family: "Short answer" });
  }

  #[test]
  fn sections_pass_through_verbatim() {
    let sections = vec![
      CustomSection { label: "Alif".into(), instruction: "Translate the sentences".into(), count: 5 },
      CustomSection { label: "Ba".into(), instruction: "Fill in the harakat".into(), count: 3 },
    ];
    let b = resolve(&QuestionSelection::Sectioned { sections: sections.clone() }).unwrap();
    let CountBreakdown::Sectioned { sections: out } = b else { panic!("expected sectioned") };
    assert_eq!(out.len(), 2);
    assert_eq!(out[0].label, "Alif");
    assert_eq!(out[1].instruction, "Fill in the harakat");
    assert_eq!(out[1].count, 3);
  }
}
