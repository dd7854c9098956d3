//! Replace image and icon references with base64 `data:` URIs.

use std::path::{Path, PathBuf};

use anyhow::Result;

use super::{DocumentPass, replace_matches};
use crate::asset_paths::{
  ReferenceClass, Resolver, classify_reference, data_url, looks_hashed, mime_for_reference,
  read_bytes_file, strip_query,
};
use crate::markup::{find_attribute, image_attributes, link_tags, rel_tokens, splice};
use crate::models::{Bundle, Document, Outcome, Reference, SkipReason, TagKind};

const ICON_RELS: [&str; 4] = ["icon", "apple-touch-icon", "apple-touch-icon-precomposed", "mask-icon"];

/// Inlines static images and PWA icons.
///
/// Hashed file names are produced by the upstream bundler, so they are looked up in the
/// output set and the output directory before falling back to the source tree.
#[derive(Debug, Clone)]
pub struct StaticAssetInliner {
  resolver: Resolver,
  output_dir: PathBuf,
}

impl StaticAssetInliner {
  /// Create the pass for a project resolver and build output directory.
  pub fn new(resolver: Resolver, output_dir: impl Into<PathBuf>) -> Self {
    Self {
      resolver,
      output_dir: output_dir.into(),
    }
  }

  /// Resolve a reference to a `data:` URI.
  pub fn inline_value(&self, value: &str, base_dir: &Path, bundle: &Bundle) -> Outcome<String> {
    self
      .load(value, base_dir, bundle)
      .map(|bytes| data_url(mime_for_reference(value), &bytes))
  }

  fn load(&self, value: &str, base_dir: &Path, bundle: &Bundle) -> Outcome<Vec<u8>> {
    match classify_reference(value) {
      ReferenceClass::External => return Outcome::Skip(SkipReason::External),
      ReferenceClass::AlreadyInlined => return Outcome::Skip(SkipReason::AlreadyInlined),
      ReferenceClass::Local => {}
    }

    if looks_hashed(value) {
      let name = strip_query(value.trim())
        .trim_start_matches("./")
        .trim_start_matches('/');
      if let Some(file) = bundle.get(name) {
        return Outcome::Inlined(file.source.clone());
      }
      let built = self.output_dir.join(name);
      if built.is_file() {
        return read_bytes_file(built).map(|(_, bytes)| bytes);
      }
    }

    self
      .resolver
      .read_bytes(value, base_dir)
      .map(|(_, bytes)| bytes)
  }

  fn inline_icon_link(
    &self,
    tag: &str,
    base_dir: &Path,
    bundle: &Bundle,
  ) -> (Option<Reference>, Outcome<String>) {
    let is_icon = rel_tokens(tag)
      .iter()
      .any(|token| ICON_RELS.contains(&token.as_str()));
    let Some(href) = find_attribute(tag, "href").filter(|_| is_icon) else {
      return (None, Outcome::Skip(SkipReason::NoReference));
    };

    let reference = Reference::new(TagKind::Icon, "href", href.value);
    let outcome = self
      .inline_value(href.value, base_dir, bundle)
      .map(|data| splice(tag, href.range.clone(), &format!("href=\"{data}\"")));
    (Some(reference), outcome)
  }
}

impl DocumentPass for StaticAssetInliner {
  fn name(&self) -> &'static str {
    "static-assets"
  }

  fn apply(&self, document: Document, bundle: &mut Bundle) -> Result<Document> {
    let base_dir = document.base_dir().to_path_buf();
    let bundle: &Bundle = bundle;

    let (html, images) = replace_matches(self.name(), image_attributes(), &document.html, |caps| {
      let value = &caps[2];
      let reference = Reference::new(TagKind::Image, "src", value);
      let outcome = self
        .inline_value(value, &base_dir, bundle)
        .map(|data| format!("{}{}{}", &caps[1], data, &caps[3]));
      (Some(reference), outcome)
    });

    let (html, icons) = replace_matches(self.name(), link_tags(), &html, |caps| {
      self.inline_icon_link(&caps[0], &base_dir, bundle)
    });

    if images + icons > 0 {
      tracing::info!("inlined {} static asset(s)", images + icons);
    }
    Ok(document.with_html(html))
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use base64::{Engine as _, engine::general_purpose};
  use std::fs;
  use tempfile::tempdir;

  fn pass(root: &Path) -> StaticAssetInliner {
    StaticAssetInliner::new(Resolver::new(root), root.join("dist"))
  }

  fn run(root: &Path, html: &str, bundle: &mut Bundle) -> String {
    pass(root)
      .apply(Document::new(html, root.join("index.html")), bundle)
      .unwrap()
      .html
  }

  #[test]
  fn inlined_payload_decodes_to_original_bytes() {
    let dir = tempdir().unwrap();
    let bytes: Vec<u8> = (0..=255u8).collect();
    fs::write(dir.path().join("logo.png"), &bytes).unwrap();

    let html = run(dir.path(), r#"<img src="./logo.png">"#, &mut Bundle::new());
    let payload = html
      .strip_prefix(r#"<img src="data:image/png;base64,"#)
      .and_then(|rest| rest.strip_suffix(r#"">"#))
      .unwrap();
    assert_eq!(general_purpose::STANDARD.decode(payload).unwrap(), bytes);
  }

  #[test]
  fn inlines_icon_links_regardless_of_extension_match() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("touch"), b"icon").unwrap();

    let html = run(
      dir.path(),
      r#"<link rel="apple-touch-icon" href="touch">"#,
      &mut Bundle::new(),
    );
    assert_eq!(
      html,
      r#"<link rel="apple-touch-icon" href="data:application/octet-stream;base64,aWNvbg==">"#
    );
  }

  #[test]
  fn query_strings_do_not_hide_the_extension() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("a.svg"), b"<svg/>").unwrap();

    let html = run(dir.path(), r#"<img src='a.svg?v=2'>"#, &mut Bundle::new());
    assert!(html.starts_with("<img src='data:image/svg+xml;base64,"));
    assert!(html.ends_with("'>"));
  }

  #[test]
  fn hashed_names_are_read_from_the_build_output() {
    let dir = tempdir().unwrap();
    fs::create_dir_all(dir.path().join("dist/assets")).unwrap();
    fs::write(dir.path().join("dist/assets/logo-BxK2a9Qz.png"), b"built").unwrap();

    let html = run(
      dir.path(),
      r#"<img src="./assets/logo-BxK2a9Qz.png">"#,
      &mut Bundle::new(),
    );
    assert_eq!(html, r#"<img src="data:image/png;base64,YnVpbHQ=">"#);
  }

  #[test]
  fn hashed_names_prefer_the_output_set() {
    let dir = tempdir().unwrap();
    let mut bundle = Bundle::new();
    bundle.insert("icon-a1b2c3d4e5.ico", b"set".to_vec());

    let html = run(dir.path(), r#"<link rel="icon" href="/icon-a1b2c3d4e5.ico">"#, &mut bundle);
    assert_eq!(html, r#"<link rel="icon" href="data:image/x-icon;base64,c2V0">"#);
  }

  #[test]
  fn external_data_and_missing_references_are_untouched() {
    let dir = tempdir().unwrap();
    let original = concat!(
      r#"<img src="https://example.com/a.png">"#,
      r#"<img src="data:image/png;base64,AAAA">"#,
      r#"<link rel="icon" href="./missing.ico">"#,
      r#"<img src="./missing.png">"#
    );
    assert_eq!(run(dir.path(), original, &mut Bundle::new()), original);
  }

  #[test]
  fn data_attributes_are_not_mistaken_for_src() {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("lazy.png"), b"x").unwrap();
    let original = r#"<img data-src="lazy.png">"#;
    assert_eq!(run(dir.path(), original, &mut Bundle::new()), original);
  }
}
