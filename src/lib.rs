#![doc = include_str!("../README.md")]
#![warn(missing_docs)]

pub mod asset_paths;
pub mod builder;
pub mod bundler;
pub mod config;
pub mod inline;
pub mod markup;
pub mod mode;
pub mod models;
pub mod project;

pub use builder::{BuildReport, BuildResult, SingleFileBuilder};
pub use inline::{DocumentPass, Pipeline, Stage};
pub use mode::BuildMode;
pub use models::{Bundle, Document, Outcome, SkipReason};
pub use project::{BuildContext, ProjectLayout};
