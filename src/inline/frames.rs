//! Embed local iframe documents through `srcdoc`.

use std::path::Path;

use anyhow::Result;

use super::{DocumentPass, ScriptInliner, replace_matches};
use crate::asset_paths::{Resolver, read_text_file};
use crate::markup::{find_attribute, iframe_tags, splice};
use crate::models::{Bundle, Document, Outcome, Reference, SkipReason, TagKind};

/// Replaces `<iframe src>` with `srcdoc` holding the sub-document, whose own scripts are
/// inlined first.
#[derive(Debug, Clone)]
pub struct FrameInliner {
  resolver: Resolver,
  scripts: ScriptInliner,
}

impl FrameInliner {
  /// Create the pass for a project resolver.
  pub fn new(resolver: Resolver) -> Self {
    Self {
      scripts: ScriptInliner::new(resolver.clone()),
      resolver,
    }
  }

  fn inline_frame(&self, tag: &str, base_dir: &Path) -> (Option<Reference>, Outcome<String>) {
    let Some(src) = find_attribute(tag, "src") else {
      return (None, Outcome::Skip(SkipReason::NoReference));
    };
    let reference = Reference::new(TagKind::Frame, "src", src.value);

    let outcome = self
      .resolver
      .locate(src.value, base_dir)
      .and_then(read_text_file)
      .map(|(path, content)| {
        let frame_dir = path.parent().unwrap_or(base_dir);
        let (content, _) = self.scripts.inline_html(&content, frame_dir);
        splice(tag, src.range.clone(), &format!("srcdoc=\"{}\"", escape_srcdoc(&content)))
      });
    (Some(reference), outcome)
  }
}

impl DocumentPass for FrameInliner {
  fn name(&self) -> &'static str {
    "frames"
  }

  fn apply(&self, document: Document, _bundle: &mut Bundle) -> Result<Document> {
    let (html, count) = replace_matches(self.name(), iframe_tags(), &document.html, |caps| {
      self.inline_frame(&caps[0], document.base_dir())
    });
    if count > 0 {
      tracing::info!("embedded {count} iframe document(s)");
    }
    Ok(document.with_html(html))
  }
}

/// Escape text for a double-quoted attribute. `&` goes first so entities are not doubled.
fn escape_srcdoc(content: &str) -> String {
  content.replace('&', "&amp;").replace('"', "&quot;")
}
