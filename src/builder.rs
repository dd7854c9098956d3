//! Single-file build orchestrator: bundler, inlining pipeline, output writing and
//! post-build trimming.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use anyhow::Context;
use chrono::{DateTime, Utc};
use same_file::is_same_file;

use crate::bundler::run_bundler_command;
use crate::inline::Pipeline;
use crate::models::{Bundle, Document};
use crate::project::{BuildContext, ProjectLayout};

/// Generic build result type used across the crate.
pub type BuildResult<T> = anyhow::Result<T>;

/// What a finished build produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildReport {
  /// Location of the single output document.
  pub output_path: PathBuf,
  /// Output entries folded into the document and deleted from disk.
  pub inlined_outputs: Vec<String>,
  /// Files removed by the `pure-single` prune, relative to the output directory.
  pub pruned_files: Vec<PathBuf>,
  /// Offline-worker copy written in `pwa` mode.
  pub worker_copied: Option<PathBuf>,
  /// Timestamped copy of the output document.
  pub timestamp_copy: Option<PathBuf>,
}

/// Runs one single-file build for a project.
pub struct SingleFileBuilder {
  context: BuildContext,
  pipeline: Pipeline,
}

impl SingleFileBuilder {
  /// Create a builder running the standard pipeline.
  pub fn new(context: BuildContext) -> Self {
    let pipeline = Pipeline::standard(&context.layout, context.mode);
    Self { context, pipeline }
  }

  /// Replace the pass pipeline.
  pub fn with_pipeline(mut self, pipeline: Pipeline) -> Self {
    self.pipeline = pipeline;
    self
  }

  /// Build context the builder was created with.
  pub fn context(&self) -> &BuildContext {
    &self.context
  }

  /// Run the bundler, fold everything into the entry document and write the result.
  pub fn build(&self) -> BuildResult<BuildReport> {
    let layout = &self.context.layout;
    let mode = self.context.mode;
    tracing::info!("building {} in {} mode", layout.entry_html, mode);

    let bundled = run_bundler_command(layout, mode)?;
    let document = self.load_entry(bundled)?;

    let output_dir = layout.output_path();
    let mut bundle = Bundle::load_dir(&output_dir, &[layout.entry_html.as_str()])?;
    let emitted = bundle.names();

    let document = self.pipeline.run(document, &mut bundle)?;

    let output_path = layout.output_entry_path();
    if let Some(parent) = output_path.parent() {
      fs::create_dir_all(parent)
        .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(&output_path, &document.html)
      .with_context(|| format!("failed to write {}", output_path.display()))?;
    tracing::info!("wrote {}", output_path.display());

    let inlined_outputs = remove_consumed_outputs(&output_dir, &emitted, &bundle)?;

    let timestamp_copy = if layout.timestamp {
      write_timestamp_copy(layout, &output_path, Utc::now())
    } else {
      None
    };

    let pruned_files = if mode.is_pure_single() {
      let pruned = prune_output_tree(&output_dir, |relative| keeps_in_pure_single(layout, relative))
        .with_context(|| format!("failed to prune {}", output_dir.display()))?;
      tracing::info!("pure-single: removed {} file(s) besides the entry", pruned.len());
      pruned
    } else {
      Vec::new()
    };

    let worker_copied = if mode.preserves_worker() {
      copy_offline_worker(layout)?
    } else {
      None
    };

    Ok(BuildReport {
      output_path,
      inlined_outputs,
      pruned_files,
      worker_copied,
      timestamp_copy,
    })
  }

  /// The bundler's emitted entry wins over the source entry when a bundler ran.
  fn load_entry(&self, bundled: bool) -> BuildResult<Document> {
    let layout = &self.context.layout;
    let emitted = layout.output_entry_path();
    if bundled && emitted.is_file() {
      return Document::load(&emitted);
    }
    Document::load(&layout.entry_path())
  }
}

/// Delete output entries the pipeline consumed. Returns their names.
fn remove_consumed_outputs(
  output_dir: &Path,
  emitted: &[String],
  remaining: &Bundle,
) -> BuildResult<Vec<String>> {
  let mut removed = Vec::new();
  for name in emitted.iter().filter(|name| !remaining.contains(name)) {
    let path = output_dir.join(name);
    match fs::remove_file(&path) {
      Ok(()) => {}
      Err(err) if err.kind() == ErrorKind::NotFound => {}
      Err(err) => {
        return Err(err).with_context(|| format!("failed to remove {}", path.display()));
      }
    }
    tracing::debug!("removed inlined output {name}");
    removed.push(name.clone());
  }
  Ok(removed)
}

/// File name of a timestamped copy, e.g. `index-2024-05-01T10-20-30.html`.
fn timestamped_name(layout: &ProjectLayout, time: DateTime<Utc>) -> String {
  let extension = Path::new(&layout.entry_html)
    .extension()
    .and_then(|ext| ext.to_str())
    .unwrap_or("html");
  format!(
    "{}-{}.{}",
    layout.entry_stem(),
    time.format("%Y-%m-%dT%H-%M-%S"),
    extension
  )
}

/// Copy the output document next to itself under a timestamped name. Failure only warns.
fn write_timestamp_copy(
  layout: &ProjectLayout,
  output_path: &Path,
  time: DateTime<Utc>,
) -> Option<PathBuf> {
  let destination = layout.output_path().join(timestamped_name(layout, time));
  match fs::copy(output_path, &destination) {
    Ok(_) => {
      tracing::info!("timestamped copy: {}", destination.display());
      Some(destination)
    }
    Err(err) => {
      tracing::warn!("could not write timestamped copy {}: {}", destination.display(), err);
      None
    }
  }
}

/// In `pure-single` builds only the entry document and its timestamped copies survive.
fn keeps_in_pure_single(layout: &ProjectLayout, relative: &Path) -> bool {
  if relative.parent().is_some_and(|parent| !parent.as_os_str().is_empty()) {
    return false;
  }
  let Some(name) = relative.to_str() else {
    return false;
  };
  name == layout.entry_html || name.starts_with(&format!("{}-", layout.entry_stem()))
}

/// Delete every file below `root` the predicate rejects, dropping emptied directories.
/// Returns the removed files relative to `root`.
fn prune_output_tree<F>(root: &Path, keep: F) -> std::io::Result<Vec<PathBuf>>
where
  F: Fn(&Path) -> bool,
{
  let mut removed = Vec::new();
  if !root.exists() {
    return Ok(removed);
  }

  prune_output_subtree(root, Path::new(""), &keep, &mut removed)?;
  Ok(removed)
}

fn prune_output_subtree<F>(
  root: &Path,
  relative: &Path,
  keep: &F,
  removed: &mut Vec<PathBuf>,
) -> std::io::Result<bool>
where
  F: Fn(&Path) -> bool,
{
  let current_path = root.join(relative);
  let mut has_required_descendants = false;
  let entries = match fs::read_dir(&current_path) {
    Ok(entries) => entries,
    Err(err) if err.kind() == ErrorKind::NotFound => return Ok(true),
    Err(err) => return Err(err),
  };

  for entry in entries {
    let entry = entry?;
    let child_relative = relative.join(entry.file_name());
    let entry_path = entry.path();

    if entry.file_type()?.is_dir() {
      if prune_output_subtree(root, &child_relative, keep, removed)? {
        fs::remove_dir_all(&entry_path)?;
      } else {
        has_required_descendants = true;
      }
    } else if keep(&child_relative) {
      has_required_descendants = true;
    } else {
      fs::remove_file(&entry_path)?;
      removed.push(child_relative);
    }
  }

  Ok(!has_required_descendants && !relative.as_os_str().is_empty())
}

/// Put the offline-worker script into the output directory. A missing source is ignored.
fn copy_offline_worker(layout: &ProjectLayout) -> BuildResult<Option<PathBuf>> {
  let source = layout.worker_source();
  if !source.is_file() {
    tracing::debug!("no offline worker at {}", source.display());
    return Ok(None);
  }

  let destination = layout.worker_destination();
  install_worker_file(&source, &destination).with_context(|| {
    format!(
      "failed to copy {} to {}",
      source.display(),
      destination.display()
    )
  })?;
  tracing::info!("pwa: copied offline worker to {}", destination.display());
  Ok(Some(destination))
}

fn install_worker_file(source: &Path, destination: &Path) -> std::io::Result<()> {
  if let Some(parent) = destination.parent() {
    fs::create_dir_all(parent)?;
  }
  if destination.exists() {
    if is_same_file(source, destination)? {
      return Ok(());
    }
    fs::remove_file(destination)?;
  }

  match fs::hard_link(source, destination) {
    Ok(_) => Ok(()),
    Err(err) => {
      if err.kind() == ErrorKind::AlreadyExists {
        Ok(())
      } else {
        fs::copy(source, destination).map(|_| ())
      }
    }
  }
}
