//! Module-specific structural transforms applied to recovered sections.
//!
//! Only the e-course module has one: the delimited slide block inside its single
//! section is wrapped in a presentation container. Everything else passes through.

use crate::domain::{GeneratedSection, Module};
use crate::prompt::{SLIDE_END_MARKER, SLIDE_START_MARKER};

const SLIDE_CONTAINER_OPEN: &str = "<div class=\"ppt-container\"><h2>Presentation Slides</h2>";
const SLIDE_CONTAINER_CLOSE: &str = "</div>";

/// Replace the first `START..END` slide block with a wrapped copy of its inner
/// span. Returns `None` when either marker is missing or they are out of order.
pub fn wrap_slide_block(content: &str) -> Option<String> {
  let start = content.find(SLIDE_START_MARKER)?;
  let inner_start = start + SLIDE_START_MARKER.len();
  let inner_len = content[inner_start..].find(SLIDE_END_MARKER)?;
  let inner_end = inner_start + inner_len;
  let after = inner_end + SLIDE_END_MARKER.len();

  let mut out = String::with_capacity(content.len() + SLIDE_CONTAINER_OPEN.len());
  out.push_str(&content[..start]);
  out.push_str(SLIDE_CONTAINER_OPEN);
  out.push_str(&content[inner_start..inner_end]);
  out.push_str(SLIDE_CONTAINER_CLOSE);
  out.push_str(&content[after..]);
  Some(out)
}

/// Never fails; sections keep their order.
pub fn postprocess(mut sections: Vec<GeneratedSection>, module: Module) -> Vec<GeneratedSection> {
  if module == Module::Ecourse {
    if let Some(first) = sections.first_mut() {
      if let Some(wrapped) = wrap_slide_block(&first.content) {
        first.content = wrapped;
      }
    }
  }
  sections
}
