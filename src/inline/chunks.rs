//! Fold compiled chunks from the bundler output set into the entry document.

use anyhow::Result;

use super::{DocumentPass, Stage, replace_matches};
use crate::asset_paths::{ReferenceClass, classify_reference, strip_query};
use crate::markup::{empty_script_tags, find_attribute, link_tags, opening_tag, rel_tokens};
use crate::models::{Bundle, Document, Outcome, OutputKind, Reference, SkipReason, TagKind};

/// Whole-bundle inliner: every script or stylesheet the document still references and
/// that the bundler emitted as a chunk is moved into the document and dropped from the
/// output set.
#[derive(Debug, Clone, Copy, Default)]
pub struct ChunkInliner;

impl ChunkInliner {
  fn take_chunk(&self, value: &str, bundle: &mut Bundle) -> Outcome<String> {
    match classify_reference(value) {
      ReferenceClass::External => return Outcome::Skip(SkipReason::External),
      ReferenceClass::AlreadyInlined => return Outcome::Skip(SkipReason::AlreadyInlined),
      ReferenceClass::Local => {}
    }

    let name = chunk_name(value);
    match bundle.get(name) {
      Some(file) if file.kind == OutputKind::Chunk => {}
      _ => return Outcome::Skip(SkipReason::NoReference),
    }
    match bundle.remove(name) {
      Some(file) => Outcome::Inlined(String::from_utf8_lossy(&file.source).into_owned()),
      None => Outcome::Skip(SkipReason::NoReference),
    }
  }

  fn inline_script(&self, element: &str, bundle: &mut Bundle) -> (Option<Reference>, Outcome<String>) {
    let tag = opening_tag(element);
    let Some(src) = find_attribute(tag, "src") else {
      return (None, Outcome::Skip(SkipReason::NoReference));
    };
    let reference = Reference::new(TagKind::Script, "src", src.value);
    let is_module = find_attribute(tag, "type")
      .is_some_and(|kind| kind.value.trim().eq_ignore_ascii_case("module"));

    let outcome = self.take_chunk(src.value, bundle).map(|code| {
      if is_module {
        format!("<script type=\"module\">{code}</script>")
      } else {
        format!("<script>{code}</script>")
      }
    });
    (Some(reference), outcome)
  }

  fn inline_stylesheet(&self, tag: &str, bundle: &mut Bundle) -> (Option<Reference>, Outcome<String>) {
    let is_stylesheet = rel_tokens(tag).iter().any(|token| token == "stylesheet");
    let Some(href) = find_attribute(tag, "href").filter(|_| is_stylesheet) else {
      return (None, Outcome::Skip(SkipReason::NoReference));
    };
    let reference = Reference::new(TagKind::Stylesheet, "href", href.value);
    let outcome = self
      .take_chunk(href.value, bundle)
      .map(|css| format!("<style>{css}</style>"));
    (Some(reference), outcome)
  }
}

impl DocumentPass for ChunkInliner {
  fn name(&self) -> &'static str {
    "chunks"
  }

  fn stage(&self) -> Stage {
    Stage::PostBundle
  }

  fn apply(&self, document: Document, bundle: &mut Bundle) -> Result<Document> {
    let (html, scripts) = replace_matches(self.name(), empty_script_tags(), &document.html, |caps| {
      self.inline_script(&caps[0], bundle)
    });
    let (html, styles) = replace_matches(self.name(), link_tags(), &html, |caps| {
      self.inline_stylesheet(&caps[0], bundle)
    });

    if scripts + styles > 0 {
      tracing::info!("folded {} bundle chunk(s) into the document", scripts + styles);
    }
    Ok(document.with_html(html))
  }
}

/// Output-set name a reference points at.
fn chunk_name(value: &str) -> &str {
  strip_query(value.trim())
    .trim_start_matches("./")
    .trim_start_matches('/')
}

#[cfg(test)]
mod tests {
  use super::*;

  fn run(html: &str, bundle: &mut Bundle) -> String {
    ChunkInliner
      .apply(Document::new(html, "/site/dist/index.html"), bundle)
      .unwrap()
      .html
  }

  #[test]
  fn folds_module_scripts_and_styles_and_consumes_them() {
    let mut bundle = Bundle::new();
    bundle.insert("assets/index-Dk3a.js", b"import('x')".to_vec());
    bundle.insert("assets/index-Q1w2.css", b"p{margin:0}".to_vec());
    bundle.insert("assets/logo.png", vec![1, 2]);

    let html = run(
      concat!(
        r#"<script type="module" crossorigin src="/assets/index-Dk3a.js"></script>"#,
        r#"<link rel="stylesheet" crossorigin href="/assets/index-Q1w2.css">"#
      ),
      &mut bundle,
    );

    assert_eq!(
      html,
      r#"<script type="module">import('x')</script><style>p{margin:0}</style>"#
    );
    assert_eq!(bundle.names(), vec![String::from("assets/logo.png")]);
  }

  #[test]
  fn classic_scripts_stay_classic() {
    let mut bundle = Bundle::new();
    bundle.insert("legacy.js", b"var a=1".to_vec());
    assert_eq!(
      run(r#"<script src="./legacy.js?v=1"></script>"#, &mut bundle),
      "<script>var a=1</script>"
    );
    assert!(bundle.is_empty());
  }

  #[test]
  fn references_outside_the_output_set_are_kept() {
    let mut bundle = Bundle::new();
    bundle.insert("data.png", vec![0]);
    let original = concat!(
      r#"<script src="./other.js"></script>"#,
      r#"<script src="https://cdn.example.com/a.js"></script>"#,
      r#"<link rel="stylesheet" href="data.png">"#,
      r#"<link rel="preload" href="data.png">"#
    );
    assert_eq!(run(original, &mut bundle), original);
    assert!(bundle.contains("data.png"));
  }
}
