//! Data structures shared by the inlining passes and the build orchestrator.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

/// HTML markup plus the on-disk location it was loaded from.
///
/// The location is the base for references written with an explicit relative
/// marker (`./`, `../`).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Document {
  /// Current markup buffer.
  pub html: String,
  /// Location of the document on disk.
  pub path: PathBuf,
}

impl Document {
  /// Create a document from markup and the path it conceptually lives at.
  pub fn new(html: impl Into<String>, path: impl Into<PathBuf>) -> Self {
    Self {
      html: html.into(),
      path: path.into(),
    }
  }

  /// Read a document from disk.
  pub fn load(path: &Path) -> Result<Self> {
    let html = fs::read_to_string(path)
      .with_context(|| format!("failed to read {}", path.display()))?;
    Ok(Self::new(html, path))
  }

  /// Directory relative references are resolved against.
  pub fn base_dir(&self) -> &Path {
    self.path.parent().unwrap_or_else(|| Path::new(""))
  }

  /// Replace the markup while keeping the location.
  pub fn with_html(self, html: String) -> Self {
    Self { html, ..self }
  }
}

/// Kind of tag a reference was extracted from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TagKind {
  /// `<script src>`
  Script,
  /// `<link rel="stylesheet">`
  Stylesheet,
  /// `<link rel="icon">` and friends.
  Icon,
  /// `<link rel="manifest">`
  Manifest,
  /// Any `href`/`src` pointing at an image.
  Image,
  /// `<iframe src>`
  Frame,
  /// Any other tag carrying an `href` or `src`.
  Other,
}

/// A `(tag, attribute, value)` triple found in markup.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reference {
  /// Tag family the reference was found on.
  pub tag: TagKind,
  /// Attribute that carried the value.
  pub attribute: &'static str,
  /// Raw attribute value, unmodified.
  pub value: String,
}

impl Reference {
  /// Build a reference from its parts.
  pub fn new(tag: TagKind, attribute: &'static str, value: impl Into<String>) -> Self {
    Self {
      tag,
      attribute,
      value: value.into(),
    }
  }
}

/// Result of trying to inline a single reference.
///
/// A skip is an expected outcome and always leaves the markup untouched; fatal
/// problems travel separately as `anyhow::Error`.
#[derive(Debug)]
pub enum Outcome<T> {
  /// The reference was resolved and its replacement produced.
  Inlined(T),
  /// The reference must be left as written.
  Skip(SkipReason),
}

impl<T> Outcome<T> {
  /// Map the inlined value, passing skips through.
  pub fn map<U>(self, f: impl FnOnce(T) -> U) -> Outcome<U> {
    match self {
      Self::Inlined(value) => Outcome::Inlined(f(value)),
      Self::Skip(reason) => Outcome::Skip(reason),
    }
  }

  /// Chain another fallible step onto an inlined value.
  pub fn and_then<U>(self, f: impl FnOnce(T) -> Outcome<U>) -> Outcome<U> {
    match self {
      Self::Inlined(value) => f(value),
      Self::Skip(reason) => Outcome::Skip(reason),
    }
  }
}

/// Why a reference was left unmodified.
#[derive(Debug)]
pub enum SkipReason {
  /// Network URL or protocol-relative reference.
  External,
  /// Value is already a `data:` URI.
  AlreadyInlined,
  /// Script tag carries `data-*` attributes of a third-party embed.
  ThirdPartyEmbed,
  /// The tag carries no usable reference attribute.
  NoReference,
  /// Resolved path does not exist.
  Missing(PathBuf),
  /// File exists but could not be read.
  Unreadable {
    /// Path that failed.
    path: PathBuf,
    /// Source I/O error.
    source: std::io::Error,
  },
}

impl std::fmt::Display for SkipReason {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    match self {
      Self::External => write!(f, "external reference"),
      Self::AlreadyInlined => write!(f, "already inlined"),
      Self::ThirdPartyEmbed => write!(f, "third-party embed"),
      Self::NoReference => write!(f, "no reference attribute"),
      Self::Missing(path) => write!(f, "{} does not exist", path.display()),
      Self::Unreadable { path, source } => {
        write!(f, "failed to read {}: {}", path.display(), source)
      }
    }
  }
}

/// Role of a file emitted by the upstream bundler.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputKind {
  /// Plain static asset (images, fonts, JSON, ...).
  Asset,
  /// Compiled script or stylesheet chunk.
  Chunk,
  /// Another HTML document.
  Document,
}

impl OutputKind {
  /// Classify an output file by its name.
  pub fn from_file_name(name: &str) -> Self {
    let lower = name.to_ascii_lowercase();
    let extension = lower.rsplit_once('.').map(|(_, ext)| ext).unwrap_or("");
    match extension {
      "js" | "mjs" | "css" => Self::Chunk,
      "html" | "htm" => Self::Document,
      _ => Self::Asset,
    }
  }
}

/// One file in the bundle output set.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputFile {
  /// Role of the file.
  pub kind: OutputKind,
  /// Raw file content.
  pub source: Vec<u8>,
}

impl OutputFile {
  /// Create an output file, classifying it by name.
  pub fn new(name: &str, source: impl Into<Vec<u8>>) -> Self {
    Self {
      kind: OutputKind::from_file_name(name),
      source: source.into(),
    }
  }
}

/// Output file set produced by the upstream bundler, keyed by `/`-separated
/// name relative to the output directory.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bundle {
  files: BTreeMap<String, OutputFile>,
}

impl Bundle {
  /// Create an empty bundle.
  pub fn new() -> Self {
    Self::default()
  }

  /// Insert a file, classifying it by name.
  pub fn insert(&mut self, name: impl Into<String>, source: impl Into<Vec<u8>>) {
    let name = name.into();
    let file = OutputFile::new(&name, source);
    self.files.insert(name, file);
  }

  /// Look up a file by exact name.
  pub fn get(&self, name: &str) -> Option<&OutputFile> {
    self.files.get(name)
  }

  /// Remove a file from the set, returning it.
  pub fn remove(&mut self, name: &str) -> Option<OutputFile> {
    self.files.remove(name)
  }

  /// Whether the named file is part of the set.
  pub fn contains(&self, name: &str) -> bool {
    self.files.contains_key(name)
  }

  /// Iterate over the files in name order.
  pub fn iter(&self) -> impl Iterator<Item = (&str, &OutputFile)> {
    self.files.iter().map(|(name, file)| (name.as_str(), file))
  }

  /// Names of every file in the set.
  pub fn names(&self) -> Vec<String> {
    self.files.keys().cloned().collect()
  }

  /// Number of files in the set.
  pub fn len(&self) -> usize {
    self.files.len()
  }

  /// Whether the set is empty.
  pub fn is_empty(&self) -> bool {
    self.files.is_empty()
  }

  /// Find the entry a relative reference points at.
  ///
  /// An exact name wins; otherwise the first entry whose name starts with the
  /// reference's leading dot-delimited segment is returned, which catches
  /// outputs renamed with a content hash.
  pub fn find_for_reference(&self, reference: &str) -> Option<&str> {
    if let Some((name, _)) = self.files.get_key_value(reference) {
      return Some(name.as_str());
    }

    let stem = reference.split('.').next().unwrap_or("");
    if stem.is_empty() {
      return None;
    }

    self
      .files
      .keys()
      .find(|name| name.starts_with(stem))
      .map(String::as_str)
  }

  /// Load every file below `dir`, skipping the names in `exclude`.
  ///
  /// A missing directory yields an empty bundle.
  pub fn load_dir(dir: &Path, exclude: &[&str]) -> Result<Self> {
    let mut bundle = Self::new();
    if !dir.is_dir() {
      return Ok(bundle);
    }
    load_dir_recursive(dir, Path::new(""), exclude, &mut bundle)?;
    Ok(bundle)
  }
}

fn load_dir_recursive(
  root: &Path,
  relative: &Path,
  exclude: &[&str],
  bundle: &mut Bundle,
) -> Result<()> {
  let current = root.join(relative);
  let entries =
    fs::read_dir(&current).with_context(|| format!("failed to read {}", current.display()))?;

  for entry in entries {
    let entry = entry?;
    let child_relative = relative.join(entry.file_name());
    let file_type = entry.file_type()?;
    if file_type.is_dir() {
      load_dir_recursive(root, &child_relative, exclude, bundle)?;
    } else if file_type.is_file() {
      let name = child_relative.to_string_lossy().replace('\\', "/");
      if exclude.contains(&name.as_str()) {
        continue;
      }
      let source = fs::read(entry.path())
        .with_context(|| format!("failed to read {}", entry.path().display()))?;
      bundle.insert(name, source);
    }
  }

  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::tempdir;

  #[test]
  fn classifies_outputs_by_extension() {
    assert_eq!(OutputKind::from_file_name("index.js"), OutputKind::Chunk);
    assert_eq!(OutputKind::from_file_name("style.CSS"), OutputKind::Chunk);
    assert_eq!(OutputKind::from_file_name("panel.html"), OutputKind::Document);
    assert_eq!(OutputKind::from_file_name("logo.png"), OutputKind::Asset);
    assert_eq!(OutputKind::from_file_name("LICENSE"), OutputKind::Asset);
  }

  #[test]
  fn finds_exact_then_prefix_matches() {
    let mut bundle = Bundle::new();
    bundle.insert("favicon.ico", b"ico".to_vec());
    bundle.insert("logo-a1b2c3d4.png", b"png".to_vec());

    assert_eq!(bundle.find_for_reference("favicon.ico"), Some("favicon.ico"));
    assert_eq!(bundle.find_for_reference("logo.png"), Some("logo-a1b2c3d4.png"));
    assert_eq!(bundle.find_for_reference("missing.png"), None);
    assert_eq!(bundle.find_for_reference(".hidden"), None);
  }

  #[test]
  fn loads_nested_output_directory() {
    let dir = tempdir().unwrap();
    fs::create_dir_all(dir.path().join("assets")).unwrap();
    fs::write(dir.path().join("index.html"), "<html></html>").unwrap();
    fs::write(dir.path().join("assets/app.js"), "console.log(1)").unwrap();
    fs::write(dir.path().join("icon.png"), [1u8, 2, 3]).unwrap();

    let bundle = Bundle::load_dir(dir.path(), &["index.html"]).unwrap();

    assert_eq!(bundle.names(), vec![
      String::from("assets/app.js"),
      String::from("icon.png")
    ]);
    assert_eq!(bundle.get("assets/app.js").unwrap().kind, OutputKind::Chunk);
  }

  #[test]
  fn missing_output_directory_is_empty() {
    let dir = tempdir().unwrap();
    let bundle = Bundle::load_dir(&dir.path().join("dist"), &[]).unwrap();
    assert!(bundle.is_empty());
  }

  #[test]
  fn document_base_dir_is_parent() {
    let document = Document::new("", "/site/pages/panel.html");
    assert_eq!(document.base_dir(), Path::new("/site/pages"));
  }
}
