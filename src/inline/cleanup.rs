//! Inline leftover `./` references that still point into the output set.

use std::collections::BTreeMap;

use anyhow::Result;

use super::{DocumentPass, Stage, replace_matches};
use crate::asset_paths::{data_url, mime_for_reference, strip_query};
use crate::markup::dot_relative_attributes;
use crate::models::{Bundle, Document, Outcome, OutputKind, Reference, SkipReason, TagKind};

/// Final pass over the generated document. Asset entries it inlines are dropped from the
/// output set; documents and chunks are never inlined here.
#[derive(Debug, Clone, Copy, Default)]
pub struct BundleCleanup;

impl BundleCleanup {
  /// Resolve a reference to an asset entry and its `data:` URI, memoized per entry so
  /// repeated references share one encoding.
  fn inline_entry(
    &self,
    value: &str,
    bundle: &Bundle,
    inlined: &mut BTreeMap<String, String>,
  ) -> Outcome<String> {
    let Some(name) = bundle.find_for_reference(strip_query(value)) else {
      return Outcome::Skip(SkipReason::NoReference);
    };
    if let Some(data) = inlined.get(name) {
      return Outcome::Inlined(data.clone());
    }
    match bundle.get(name) {
      Some(file) if file.kind == OutputKind::Asset => {
        let data = data_url(mime_for_reference(name), &file.source);
        inlined.insert(name.to_string(), data.clone());
        Outcome::Inlined(data)
      }
      _ => Outcome::Skip(SkipReason::NoReference),
    }
  }
}

impl DocumentPass for BundleCleanup {
  fn name(&self) -> &'static str {
    "cleanup"
  }

  fn stage(&self) -> Stage {
    Stage::PreWrite
  }

  fn apply(&self, document: Document, bundle: &mut Bundle) -> Result<Document> {
    let mut inlined = BTreeMap::new();
    let entries: &Bundle = bundle;
    let (html, count) = replace_matches(self.name(), dot_relative_attributes(), &document.html, |caps| {
      let prefix = &caps[1];
      let quote = &caps[2];
      let value = &caps[3];
      let attribute = if prefix.to_ascii_lowercase().contains("href") {
        "href"
      } else {
        "src"
      };
      let reference = Reference::new(TagKind::Other, attribute, value);
      let outcome = self
        .inline_entry(value, entries, &mut inlined)
        .map(|data| format!("{prefix}{quote}{data}{quote}"));
      (Some(reference), outcome)
    });

    // Entries leave the output set only once every reference to them is rewritten.
    for name in inlined.keys() {
      bundle.remove(name);
      tracing::debug!("cleanup: inlined output entry {name}");
    }
    if count > 0 {
      tracing::info!("inlined {count} leftover reference(s) from {} output file(s)", inlined.len());
    }
    Ok(document.with_html(html))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn run(html: &str, bundle: &mut Bundle) -> String {
    BundleCleanup
      .apply(Document::new(html, "/site/dist/index.html"), bundle)
      .unwrap()
      .html
  }

  #[test]
  fn inlines_renamed_assets_and_drops_them() {
    let mut bundle = Bundle::new();
    bundle.insert("logo-a1b2c3d4.png", b"png".to_vec());
    bundle.insert("favicon.ico", b"ico".to_vec());

    let html = run(r#"<img src="./logo.png"><link rel="icon" href='./favicon.ico'>"#, &mut bundle);

    assert_eq!(
      html,
      r#"<img src="data:image/png;base64,cG5n"><link rel="icon" href='data:image/x-icon;base64,aWNv'>"#
    );
    assert!(bundle.is_empty());
  }

  #[test]
  fn repeated_references_share_one_entry() {
    let mut bundle = Bundle::new();
    bundle.insert("logo.png", b"png".to_vec());

    let html = run(r#"<img src="./logo.png"><img src="./logo.png?v=2">"#, &mut bundle);

    assert_eq!(
      html,
      r#"<img src="data:image/png;base64,cG5n"><img src="data:image/png;base64,cG5n">"#
    );
    assert!(!bundle.contains("logo.png"));
  }

  #[test]
  fn never_inlines_documents_or_chunks() {
    let mut bundle = Bundle::new();
    bundle.insert("panel.html", b"<p></p>".to_vec());
    bundle.insert("worker.js", b"self.x=1".to_vec());
    let original = r#"<a href="./panel.html"></a><script src="./worker.js"></script>"#;

    assert_eq!(run(original, &mut bundle), original);
    assert_eq!(bundle.len(), 2);
  }

  #[test]
  fn references_without_an_entry_are_kept() {
    let mut bundle = Bundle::new();
    let original = r#"<img src="./ghost.png"><img src="/abs.png">"#;
    assert_eq!(run(original, &mut bundle), original);
  }
}
