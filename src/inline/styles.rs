//! Replace `<link rel="stylesheet">` tags with inline `<style>` blocks.

use std::path::Path;

use anyhow::Result;

use super::{DocumentPass, replace_matches};
use crate::asset_paths::Resolver;
use crate::markup::{find_attribute, link_tags, rel_tokens};
use crate::models::{Bundle, Document, Outcome, Reference, SkipReason, TagKind};

/// Inlines local stylesheets verbatim.
#[derive(Debug, Clone)]
pub struct StylesheetInliner {
  resolver: Resolver,
}

impl StylesheetInliner {
  /// Create the pass for a project resolver.
  pub fn new(resolver: Resolver) -> Self {
    Self { resolver }
  }

  fn inline_tag(&self, tag: &str, base_dir: &Path) -> (Option<Reference>, Outcome<String>) {
    if !rel_tokens(tag).iter().any(|token| token == "stylesheet") {
      return (None, Outcome::Skip(SkipReason::NoReference));
    }
    let Some(href) = find_attribute(tag, "href") else {
      return (None, Outcome::Skip(SkipReason::NoReference));
    };

    let reference = Reference::new(TagKind::Stylesheet, "href", href.value);
    let outcome = self
      .resolver
      .read_text(href.value, base_dir)
      .map(|(_, css)| format!("<style>{css}</style>"));
    (Some(reference), outcome)
  }
}

impl DocumentPass for StylesheetInliner {
  fn name(&self) -> &'static str {
    "stylesheets"
  }

  fn apply(&self, document: Document, _bundle: &mut Bundle) -> Result<Document> {
    let base_dir = document.base_dir().to_path_buf();
    let (html, count) = replace_matches(self.name(), link_tags(), &document.html, |caps| {
      self.inline_tag(&caps[0], &base_dir)
    });
    if count > 0 {
      tracing::info!("inlined {count} stylesheet(s)");
    }
    Ok(document.with_html(html))
  }
}
