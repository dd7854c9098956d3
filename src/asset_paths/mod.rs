//! Helpers for classifying, resolving and typing resource references found in markup.
//!
//! `filters` decides whether a reference is local at all, `resolve` finds the file it names
//! under the source root or the output set, and `mime` turns the file name into a media type
//! for `data:` URIs.

mod filters;
mod mime;
mod resolve;

pub use filters::{ReferenceClass, classify_reference};
pub use mime::{data_url, extension_of, looks_hashed, mime_for_extension, mime_for_reference};
pub use resolve::{Resolution, Resolver, strip_query};
pub(crate) use resolve::{read_bytes_file, read_text_file};
