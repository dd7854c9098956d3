//! Build-mode selector controlling offline-worker support and output trimming.

use std::str::FromStr;

use serde::Deserialize;

/// Value passed to an external bundler through its environment.
pub const BUILD_MODE_ENV: &str = "BUILD_MODE";

/// How the single-file build treats the offline worker and sibling files.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum BuildMode {
  /// Disable the offline worker, keep the basic web-app files.
  #[default]
  Default,
  /// Disable the offline worker and keep nothing but the entry document.
  PureSingle,
  /// Keep full offline-worker functionality.
  Pwa,
}

impl BuildMode {
  /// Every mode in declaration order.
  pub const ALL: [BuildMode; 3] = [Self::Default, Self::PureSingle, Self::Pwa];

  /// Canonical string form.
  pub fn as_str(self) -> &'static str {
    match self {
      Self::Default => "default",
      Self::PureSingle => "pure-single",
      Self::Pwa => "pwa",
    }
  }

  /// Whether offline-worker registration code must survive the build.
  pub fn preserves_worker(self) -> bool {
    matches!(self, Self::Pwa)
  }

  /// Whether the output directory is reduced to the entry document.
  pub fn is_pure_single(self) -> bool {
    matches!(self, Self::PureSingle)
  }

  /// Human readable summary shown by the CLI.
  pub fn description(self) -> &'static str {
    match self {
      Self::Default => "default mode (offline worker disabled, basic web-app files kept)",
      Self::PureSingle => "pure single-file mode (only the entry document is kept)",
      Self::Pwa => "PWA mode (offline worker, manifest and icons kept)",
    }
  }
}

impl std::fmt::Display for BuildMode {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.write_str(self.as_str())
  }
}

/// Error returned when a build-mode string is not recognised.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParseBuildModeError {
  value: String,
}

impl std::fmt::Display for ParseBuildModeError {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    write!(
      f,
      "unknown build mode `{}` (expected one of: default, pure-single, pwa)",
      self.value
    )
  }
}

impl std::error::Error for ParseBuildModeError {}

impl FromStr for BuildMode {
  type Err = ParseBuildModeError;

  fn from_str(value: &str) -> Result<Self, Self::Err> {
    let normalised = value.trim().to_ascii_lowercase();
    match normalised.as_str() {
      "" | "default" => Ok(Self::Default),
      "pure-single" | "pure" => Ok(Self::PureSingle),
      "pwa" => Ok(Self::Pwa),
      _ => Err(ParseBuildModeError {
        value: value.to_string(),
      }),
    }
  }
}
