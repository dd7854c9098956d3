//! Replace external `<script src>` references with inline script bodies.

use std::path::Path;

use anyhow::Result;

use super::{DocumentPass, replace_matches};
use crate::asset_paths::Resolver;
use crate::markup::{empty_script_tags, find_attribute, has_attribute, has_data_attribute, opening_tag};
use crate::models::{Bundle, Document, Outcome, Reference, SkipReason, TagKind};

/// Inlines local scripts, keeping `defer`/`async` and leaving third-party embeds alone.
#[derive(Debug, Clone)]
pub struct ScriptInliner {
  resolver: Resolver,
}

impl ScriptInliner {
  /// Create the pass for a project resolver.
  pub fn new(resolver: Resolver) -> Self {
    Self { resolver }
  }

  /// Inline every local script referenced from `html`, resolving `./` references
  /// against `base_dir`. Returns the new markup and the number of scripts inlined.
  pub fn inline_html(&self, html: &str, base_dir: &Path) -> (String, usize) {
    replace_matches(self.name(), empty_script_tags(), html, |caps| {
      self.inline_tag(&caps[0], base_dir)
    })
  }

  fn inline_tag(&self, element: &str, base_dir: &Path) -> (Option<Reference>, Outcome<String>) {
    let tag = opening_tag(element);
    let Some(src) = find_attribute(tag, "src") else {
      return (None, Outcome::Skip(SkipReason::NoReference));
    };
    let reference = Reference::new(TagKind::Script, "src", src.value);

    if has_data_attribute(tag) {
      return (Some(reference), Outcome::Skip(SkipReason::ThirdPartyEmbed));
    }

    let mut attributes = String::new();
    if has_attribute(tag, "defer") {
      attributes.push_str(" defer");
    }
    if has_attribute(tag, "async") {
      attributes.push_str(" async");
    }

    let outcome = self
      .resolver
      .read_text(src.value, base_dir)
      .map(|(_, body)| format!("<script{attributes}>{body}</script>"));
    (Some(reference), outcome)
  }
}

impl DocumentPass for ScriptInliner {
  fn name(&self) -> &'static str {
    "scripts"
  }

  fn apply(&self, document: Document, _bundle: &mut Bundle) -> Result<Document> {
    let (html, count) = self.inline_html(&document.html, document.base_dir());
    if count > 0 {
      tracing::info!("inlined {count} script file(s)");
    }
    Ok(document.with_html(html))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use std::fs;
  use tempfile::tempdir;

  fn run(root: &Path, html: &str) -> String {
    let pass = ScriptInliner::new(Resolver::new(root));
    let mut bundle = Bundle::new();
    pass
      .apply(Document::new(html, root.join("index.html")), &mut bundle)
      .unwrap()
      .html
  }

  #[test]
  fn inlines_local_script_without_src() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("app.js"), "console.log(1)").unwrap();

    let html = run(dir.path(), r#"<body><script src="./app.js"></script></body>"#);
    assert_eq!(html, "<body><script>console.log(1)</script></body>");
  }

  #[test]
  fn keeps_defer_and_async_with_exact_source() {
    let dir = tempdir().unwrap();
    let source = "const a = \"<b>\";\nwindow.x = a;\n";
    fs::write(dir.path().join("lib.js"), source).unwrap();

    let html = run(dir.path(), r#"<script src="lib.js?v=4" defer async></script>"#);
    assert_eq!(html, format!("<script defer async>{source}</script>"));
  }

  #[test]
  fn preserves_third_party_embeds_byte_for_byte() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("script.js"), "tracking()").unwrap();
    let original =
      r#"<script defer src="./script.js" data-website-id="0c1d"></script>"#;

    assert_eq!(run(dir.path(), original), original);
  }

  #[test]
  fn leaves_external_and_data_sources_alone() {
    let dir = tempdir().unwrap();
    let original = concat!(
      r#"<script src="https://cdn.example.com/lib.js"></script>"#,
      r#"<script src="//cdn.example.com/lib.js"></script>"#,
      r#"<script src="data:text/javascript,alert(1)"></script>"#
    );
    assert_eq!(run(dir.path(), original), original);
  }

  #[test]
  fn missing_script_leaves_document_identical() {
    let dir = tempdir().unwrap();
    let original = r#"<script src="./missing.js" defer></script><script>inline()</script>"#;
    assert_eq!(run(dir.path(), original), original);
  }

  #[test]
  fn resolves_relative_to_given_base_dir() {
    let dir = tempdir().unwrap();
    let nested = dir.path().join("frames");
    fs::create_dir_all(&nested).unwrap();
    fs::write(nested.join("panel.js"), "panel()").unwrap();
    fs::write(dir.path().join("shared.js"), "shared()").unwrap();

    let pass = ScriptInliner::new(Resolver::new(dir.path()));
    let (html, count) = pass.inline_html(
      r#"<script src="./panel.js"></script><script src="shared.js"></script>"#,
      &nested,
    );
    assert_eq!(count, 2);
    assert_eq!(html, "<script>panel()</script><script>shared()</script>");
  }
}
