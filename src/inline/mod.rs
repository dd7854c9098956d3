//! Document passes that fold external resources back into the entry document.
//!
//! Each pass consumes the current [`Document`] and returns a new one. Per-reference
//! misses surface as [`Outcome::Skip`] and leave the markup untouched; only an `Err`
//! aborts the build.

pub mod assets;
pub mod chunks;
pub mod cleanup;
pub mod frames;
pub mod manifest;
pub mod scripts;
pub mod service_worker;
pub mod styles;

use anyhow::Result;
use regex::{Captures, Regex};

use crate::asset_paths::Resolver;
use crate::mode::BuildMode;
use crate::models::{Bundle, Document, Outcome, Reference};
use crate::project::ProjectLayout;

pub use assets::StaticAssetInliner;
pub use chunks::ChunkInliner;
pub use cleanup::BundleCleanup;
pub use frames::FrameInliner;
pub use manifest::ManifestInliner;
pub use scripts::ScriptInliner;
pub use service_worker::{WorkerNeutralizer, neutralize_script};
pub use styles::StylesheetInliner;

/// Extension point of the upstream bundler a pass hooks into.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Stage {
  /// Right after the entry document is emitted.
  PostEmit,
  /// After the bundler has produced its output set.
  PostBundle,
  /// Immediately before the final document is written.
  PreWrite,
}

/// A single text transform over the entry document.
pub trait DocumentPass {
  /// Short name used in logs.
  fn name(&self) -> &'static str;

  /// Stage the pass runs in.
  fn stage(&self) -> Stage {
    Stage::PostEmit
  }

  /// Transform the document. Passes that do not care about the output set ignore `bundle`.
  fn apply(&self, document: Document, bundle: &mut Bundle) -> Result<Document>;
}

/// Ordered collection of passes.
#[derive(Default)]
pub struct Pipeline {
  passes: Vec<Box<dyn DocumentPass>>,
}

impl Pipeline {
  /// Create an empty pipeline.
  pub fn new() -> Self {
    Self::default()
  }

  /// Append a pass. Passes keep insertion order within their stage.
  pub fn with_pass(mut self, pass: impl DocumentPass + 'static) -> Self {
    self.passes.push(Box::new(pass));
    self
  }

  /// The full single-file pipeline for a project.
  pub fn standard(layout: &ProjectLayout, mode: BuildMode) -> Self {
    let resolver = Resolver::new(&layout.root);
    Self::new()
      .with_pass(ScriptInliner::new(resolver.clone()))
      .with_pass(StaticAssetInliner::new(resolver.clone(), layout.output_path()))
      .with_pass(ManifestInliner::new(resolver.clone()))
      .with_pass(StylesheetInliner::new(resolver.clone()))
      .with_pass(WorkerNeutralizer::new(mode, layout.monitor_marker.clone()))
      .with_pass(FrameInliner::new(resolver))
      .with_pass(ChunkInliner)
      .with_pass(BundleCleanup)
  }

  /// Pass names in execution order.
  pub fn pass_names(&self) -> Vec<&'static str> {
    self.ordered().map(|pass| pass.name()).collect()
  }

  /// Run every pass, stage by stage.
  pub fn run(&self, mut document: Document, bundle: &mut Bundle) -> Result<Document> {
    for pass in self.ordered() {
      tracing::debug!("running {} pass", pass.name());
      document = pass.apply(document, bundle)?;
    }
    Ok(document)
  }

  /// Run only the passes registered for `stage`.
  pub fn run_stage(
    &self,
    stage: Stage,
    mut document: Document,
    bundle: &mut Bundle,
  ) -> Result<Document> {
    for pass in self.ordered().filter(|pass| pass.stage() == stage) {
      document = pass.apply(document, bundle)?;
    }
    Ok(document)
  }

  fn ordered(&self) -> impl Iterator<Item = &dyn DocumentPass> {
    let mut passes: Vec<&dyn DocumentPass> = self.passes.iter().map(|pass| pass.as_ref()).collect();
    passes.sort_by_key(|pass| pass.stage());
    passes.into_iter()
  }
}

/// Replace every match of `pattern` whose handler yields [`Outcome::Inlined`], leaving
/// skipped matches byte-identical. Returns the new text and the number of replacements.
pub(crate) fn replace_matches<F>(pass: &str, pattern: &Regex, text: &str, mut handler: F) -> (String, usize)
where
  F: FnMut(&Captures<'_>) -> (Option<Reference>, Outcome<String>),
{
  let mut count = 0;
  let result = pattern
    .replace_all(text, |caps: &Captures<'_>| {
      let (reference, outcome) = handler(caps);
      match outcome {
        Outcome::Inlined(replacement) => {
          count += 1;
          replacement
        }
        Outcome::Skip(reason) => {
          match reference {
            Some(reference) => {
              tracing::debug!("{pass}: leaving {:?} `{}`: {reason}", reference.tag, reference.value)
            }
            None => tracing::debug!("{pass}: leaving `{}`: {reason}", &caps[0]),
          }
          caps[0].to_string()
        }
      }
    })
    .into_owned();
  (result, count)
}
