//! Filesystem layout of a project being folded into a single document.

use std::path::{Path, PathBuf};

use crate::mode::BuildMode;

/// Comment that introduces the offline-worker monitoring block in inline scripts.
pub const DEFAULT_MONITOR_MARKER: &str = "// 🔥 监听来自 Service Worker 的缓存清理消息";

/// Markers recognised in addition to the configured one.
pub const BUILTIN_MONITOR_MARKERS: [&str; 2] = [
  DEFAULT_MONITOR_MARKER,
  "// Listen for cache-clear messages from the Service Worker",
];

/// Resolved project layout used by the passes and the builder.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectLayout {
  /// Project root; bare references resolve against it.
  pub root: PathBuf,
  /// Entry document file name, relative to the root.
  pub entry_html: String,
  /// Output directory, relative to the root.
  pub output_dir: String,
  /// Offline-worker script file name, relative to the root.
  pub worker_file: String,
  /// External bundler command line; empty when no bundler is run.
  pub bundler_command: Vec<String>,
  /// Whether a timestamped copy of the output document is written.
  pub timestamp: bool,
  /// Comment marker introducing the worker monitoring block.
  pub monitor_marker: String,
}

impl ProjectLayout {
  /// Layout with default file names rooted at `root`.
  pub fn new(root: impl Into<PathBuf>) -> Self {
    Self {
      root: root.into(),
      entry_html: "index.html".into(),
      output_dir: "dist".into(),
      worker_file: "service-worker.js".into(),
      bundler_command: Vec::new(),
      timestamp: true,
      monitor_marker: DEFAULT_MONITOR_MARKER.into(),
    }
  }

  /// Absolute path of the source entry document.
  pub fn entry_path(&self) -> PathBuf {
    self.root.join(&self.entry_html)
  }

  /// Absolute path of the output directory.
  pub fn output_path(&self) -> PathBuf {
    self.root.join(&self.output_dir)
  }

  /// Where the final single document is written.
  pub fn output_entry_path(&self) -> PathBuf {
    self.output_path().join(&self.entry_html)
  }

  /// Source location of the offline-worker script.
  pub fn worker_source(&self) -> PathBuf {
    self.root.join(&self.worker_file)
  }

  /// Destination of the offline-worker script in `pwa` builds.
  pub fn worker_destination(&self) -> PathBuf {
    let name = Path::new(&self.worker_file)
      .file_name()
      .map(PathBuf::from)
      .unwrap_or_else(|| PathBuf::from(&self.worker_file));
    self.output_path().join(name)
  }

  /// Stem of the entry document, used to recognise timestamped copies.
  pub fn entry_stem(&self) -> &str {
    Path::new(&self.entry_html)
      .file_stem()
      .and_then(|stem| stem.to_str())
      .unwrap_or("index")
  }
}

/// Everything a single build invocation needs.
#[derive(Debug, Clone)]
pub struct BuildContext {
  /// Project layout.
  pub layout: ProjectLayout,
  /// Build mode, fixed for the lifetime of the build.
  pub mode: BuildMode,
}

impl BuildContext {
  /// Bundle a layout with the selected mode.
  pub fn new(layout: ProjectLayout, mode: BuildMode) -> Self {
    Self { layout, mode }
  }
}
