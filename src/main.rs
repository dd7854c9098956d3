//! `singlefile` command: fold a static web app into one HTML document.

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use singlefile_bundler::config::ProjectConfig;
use singlefile_bundler::mode::{BUILD_MODE_ENV, BuildMode};
use singlefile_bundler::{BuildContext, BuildReport, SingleFileBuilder};

#[derive(Parser)]
#[command(name = "singlefile")]
#[command(author, version, about = "Build a single self-contained HTML document", long_about = None)]
struct Cli {
  /// Project root containing the entry document
  #[arg(long, default_value = ".")]
  root: PathBuf,

  /// Build mode: default, pure-single or pwa
  #[arg(short, long, conflicts_with_all = ["pure_single", "keep_pwa"])]
  mode: Option<BuildMode>,

  /// Shorthand for `--mode pure-single`
  #[arg(long, conflicts_with = "keep_pwa")]
  pure_single: bool,

  /// Shorthand for `--mode pwa`
  #[arg(long)]
  keep_pwa: bool,

  /// Entry HTML document, relative to the root
  #[arg(long)]
  entry: Option<String>,

  /// Output directory, relative to the root
  #[arg(long)]
  out: Option<String>,

  /// Skip the timestamped copy of the output document
  #[arg(long)]
  no_timestamp: bool,

  /// Configuration file path
  #[arg(short, long)]
  config: Option<PathBuf>,

  /// Verbose output
  #[arg(short, long)]
  verbose: bool,
}

impl Cli {
  fn build_mode(&self, config: &ProjectConfig) -> Result<BuildMode> {
    if self.pure_single {
      return Ok(BuildMode::PureSingle);
    }
    if self.keep_pwa {
      return Ok(BuildMode::Pwa);
    }
    if let Some(mode) = self.mode {
      return Ok(mode);
    }
    match std::env::var(BUILD_MODE_ENV) {
      Ok(value) => value
        .parse::<BuildMode>()
        .with_context(|| format!("invalid {BUILD_MODE_ENV} environment value")),
      Err(_) => Ok(config.mode.unwrap_or_default()),
    }
  }

  fn load_config(&self) -> Result<ProjectConfig> {
    let mut config = match &self.config {
      Some(path) => ProjectConfig::from_path(path)
        .with_context(|| format!("failed to load configuration {}", path.display()))?,
      None => ProjectConfig::discover(&self.root),
    };

    if let Some(entry) = &self.entry {
      config.entry_html = entry.clone();
    }
    if let Some(out) = &self.out {
      config.output_dir = out.clone();
    }
    if self.no_timestamp {
      config.timestamp = false;
    }
    Ok(config)
  }
}

fn main() -> Result<()> {
  let cli = Cli::parse();

  let default_filter = if cli.verbose { "debug" } else { "info" };
  tracing_subscriber::fmt()
    .with_env_filter(
      tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
    )
    .with_writer(std::io::stderr)
    .init();

  let config = cli.load_config()?;
  let mode = cli.build_mode(&config)?;
  let layout = config.into_layout(&cli.root);
  println!("Building single-file HTML ({mode}): {}", mode.description());

  let report = SingleFileBuilder::new(BuildContext::new(layout, mode)).build()?;
  print_report(&report);
  Ok(())
}

fn print_report(report: &BuildReport) {
  println!("Output: {}", report.output_path.display());
  if !report.inlined_outputs.is_empty() {
    println!("Inlined {} bundle file(s):", report.inlined_outputs.len());
    for name in &report.inlined_outputs {
      println!("  {name}");
    }
  }
  if !report.pruned_files.is_empty() {
    println!("Removed {} file(s) for pure single-file output", report.pruned_files.len());
  }
  if let Some(worker) = &report.worker_copied {
    println!("Offline worker: {}", worker.display());
  }
  if let Some(copy) = &report.timestamp_copy {
    println!("Timestamped copy: {}", copy.display());
  }
}
