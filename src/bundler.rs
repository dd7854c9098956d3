//! Invocation of the upstream bundler that produces the multi-file output set.

use std::process::Command;

use anyhow::{Context, Result, anyhow};

use crate::mode::{BUILD_MODE_ENV, BuildMode};
use crate::project::ProjectLayout;

/// Run the configured bundler command in the project root with the build mode in its
/// environment.
///
/// Returns `Ok(false)` when no command is configured. A spawn failure or non-zero exit
/// aborts the build.
pub fn run_bundler_command(layout: &ProjectLayout, mode: BuildMode) -> Result<bool> {
  let Some((program, args)) = layout.bundler_command.split_first() else {
    return Ok(false);
  };

  tracing::info!("running bundler `{}`", layout.bundler_command.join(" "));
  let status = Command::new(program)
    .args(args)
    .current_dir(&layout.root)
    .env(BUILD_MODE_ENV, mode.as_str())
    .status()
    .with_context(|| format!("failed to run bundler `{program}`"))?;

  if !status.success() {
    return Err(anyhow!("bundler `{program}` failed with status {status}"));
  }
  Ok(true)
}

#[cfg(all(test, unix))]
mod tests {
  use super::*;
  use std::fs;
  use tempfile::tempdir;

  fn layout_with(root: &std::path::Path, command: &[&str]) -> ProjectLayout {
    let mut layout = ProjectLayout::new(root);
    layout.bundler_command = command.iter().map(|part| part.to_string()).collect();
    layout
  }

  #[test]
  fn no_command_is_not_an_error() {
    let dir = tempdir().unwrap();
    assert!(!run_bundler_command(&layout_with(dir.path(), &[]), BuildMode::Default).unwrap());
  }

  #[test]
  fn passes_build_mode_through_the_environment() {
    let dir = tempdir().unwrap();
    let layout = layout_with(dir.path(), &["sh", "-c", "printf %s \"$BUILD_MODE\" > mode.txt"]);

    assert!(run_bundler_command(&layout, BuildMode::PureSingle).unwrap());
    assert_eq!(fs::read_to_string(dir.path().join("mode.txt")).unwrap(), "pure-single");
  }

  #[test]
  fn failing_bundler_aborts() {
    let dir = tempdir().unwrap();
    let err = run_bundler_command(&layout_with(dir.path(), &["sh", "-c", "exit 3"]), BuildMode::Pwa)
      .unwrap_err();
    assert!(err.to_string().contains("failed with status"));

    let missing = layout_with(dir.path(), &["definitely-not-a-real-bundler-binary"]);
    assert!(run_bundler_command(&missing, BuildMode::Default).is_err());
  }
}
