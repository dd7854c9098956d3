//! Replace the web-app manifest reference with a base64 JSON `data:` URI.

use std::path::Path;

use anyhow::Result;

use super::{DocumentPass, replace_matches};
use crate::asset_paths::{Resolver, data_url};
use crate::markup::{find_attribute, link_tags, rel_tokens, splice};
use crate::models::{Bundle, Document, Outcome, Reference, SkipReason, TagKind};

/// Inlines `<link rel="manifest">` targets.
#[derive(Debug, Clone)]
pub struct ManifestInliner {
  resolver: Resolver,
}

impl ManifestInliner {
  /// Create the pass for a project resolver.
  pub fn new(resolver: Resolver) -> Self {
    Self { resolver }
  }

  fn inline_tag(&self, tag: &str, base_dir: &Path) -> (Option<Reference>, Outcome<String>) {
    if !rel_tokens(tag).iter().any(|token| token == "manifest") {
      return (None, Outcome::Skip(SkipReason::NoReference));
    }
    let Some(href) = find_attribute(tag, "href") else {
      return (None, Outcome::Skip(SkipReason::NoReference));
    };

    let reference = Reference::new(TagKind::Manifest, "href", href.value);
    let outcome = self.resolver.read_text(href.value, base_dir).map(|(_, json)| {
      let data = data_url("application/json", json.as_bytes());
      splice(tag, href.range.clone(), &format!("href=\"{data}\""))
    });
    (Some(reference), outcome)
  }
}

impl DocumentPass for ManifestInliner {
  fn name(&self) -> &'static str {
    "manifest"
  }

  fn apply(&self, document: Document, _bundle: &mut Bundle) -> Result<Document> {
    let base_dir = document.base_dir().to_path_buf();
    let (html, count) = replace_matches(self.name(), link_tags(), &document.html, |caps| {
      self.inline_tag(&caps[0], &base_dir)
    });
    if count > 0 {
      tracing::info!("inlined {count} manifest file(s)");
    }
    Ok(document.with_html(html))
  }
}
