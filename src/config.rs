//! Project configuration loader describing the single-file build layout.

use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::mode::BuildMode;
use crate::project::{DEFAULT_MONITOR_MARKER, ProjectLayout};

/// File name searched for in the project root.
pub const DEFAULT_CONFIG_FILE: &str = "singlefile.config.json";

/// Discoverable project configuration describing inputs and outputs.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ProjectConfig {
  /// Entry HTML document, relative to the project root.
  pub entry_html: String,
  /// Directory the bundler writes to and the single document lands in.
  pub output_dir: String,
  /// Offline-worker script copied in `pwa` builds.
  pub worker_file: String,
  /// Command line of the upstream bundler. Empty disables the bundling step.
  pub bundler_command: Vec<String>,
  /// Write a timestamped copy next to the output document.
  pub timestamp: bool,
  /// Comment marker that introduces the worker monitoring block.
  pub monitor_marker: String,
  /// Mode used when neither the command line nor `BUILD_MODE` picks one.
  pub mode: Option<BuildMode>,
}

impl Default for ProjectConfig {
  fn default() -> Self {
    Self {
      entry_html: "index.html".into(),
      output_dir: "dist".into(),
      worker_file: "service-worker.js".into(),
      bundler_command: Vec::new(),
      timestamp: true,
      monitor_marker: DEFAULT_MONITOR_MARKER.into(),
      mode: None,
    }
  }
}

impl ProjectConfig {
  /// Attempt to load configuration from the provided project root.
  ///
  /// When the configuration file does not exist or fails to parse we fall back to default
  /// values so a bare project still builds.
  pub fn discover(root: &Path) -> Self {
    let candidate = root.join(DEFAULT_CONFIG_FILE);
    Self::from_path(&candidate).unwrap_or_default()
  }

  /// Read configuration from a specific JSON file.
  pub fn from_path(path: &Path) -> Option<Self> {
    let content = fs::read_to_string(path).ok()?;
    match serde_json::from_str(&content) {
      Ok(config) => Some(config),
      Err(err) => {
        tracing::warn!("ignoring malformed {}: {}", path.display(), err);
        None
      }
    }
  }

  /// Convert the configuration into a layout rooted at `root`.
  pub fn into_layout(self, root: &Path) -> ProjectLayout {
    ProjectLayout {
      root: root.to_path_buf(),
      entry_html: self.entry_html,
      output_dir: self.output_dir,
      worker_file: self.worker_file,
      bundler_command: self.bundler_command,
      timestamp: self.timestamp,
      monitor_marker: self.monitor_marker,
    }
  }
}
