use std::fs;
use std::path::{Component, Path, PathBuf};

use super::filters::{ReferenceClass, classify_reference};
use crate::models::{Outcome, SkipReason};

/// Where a reference points once resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Absolute on-disk path; the file may or may not exist.
    Local(PathBuf),
    /// Network or non-file reference.
    External,
    /// Already a `data:` URI.
    AlreadyInlined,
}

/// Drop a cache-busting query string or fragment from a reference.
pub fn strip_query(value: &str) -> &str {
    let end = value.find(['?', '#']).unwrap_or(value.len());
    &value[..end]
}

/// Maps reference strings to filesystem locations.
///
/// Values starting with `./` or `../` resolve against the referencing document's
/// directory; every other local value resolves against the project root, with a
/// leading `/` treated as root-relative.
#[derive(Debug, Clone)]
pub struct Resolver {
    root: PathBuf,
}

impl Resolver {
    /// Create a resolver for the given project root.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Project root bare references resolve against.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Resolve a reference found in a document living in `base_dir`.
    pub fn resolve(&self, value: &str, base_dir: &Path) -> Resolution {
        match classify_reference(value) {
            ReferenceClass::External => return Resolution::External,
            ReferenceClass::AlreadyInlined => return Resolution::AlreadyInlined,
            ReferenceClass::Local => {}
        }

        let clean = strip_query(value.trim());
        let joined = if clean.starts_with("./") || clean.starts_with("../") {
            base_dir.join(clean)
        } else {
            self.root.join(clean.trim_start_matches('/'))
        };
        Resolution::Local(normalize(&joined))
    }

    /// Resolve a reference to an existing file path.
    pub fn locate(&self, value: &str, base_dir: &Path) -> Outcome<PathBuf> {
        if strip_query(value.trim()).is_empty() {
            return Outcome::Skip(SkipReason::NoReference);
        }

        match self.resolve(value, base_dir) {
            Resolution::External => Outcome::Skip(SkipReason::External),
            Resolution::AlreadyInlined => Outcome::Skip(SkipReason::AlreadyInlined),
            Resolution::Local(path) if path.is_file() => Outcome::Inlined(path),
            Resolution::Local(path) => Outcome::Skip(SkipReason::Missing(path)),
        }
    }

    /// Resolve and read a reference as UTF-8 text.
    pub fn read_text(&self, value: &str, base_dir: &Path) -> Outcome<(PathBuf, String)> {
        self.locate(value, base_dir).and_then(read_text_file)
    }

    /// Resolve and read a reference as raw bytes.
    pub fn read_bytes(&self, value: &str, base_dir: &Path) -> Outcome<(PathBuf, Vec<u8>)> {
        self.locate(value, base_dir).and_then(read_bytes_file)
    }
}

/// Read an existing file as text, turning I/O and encoding errors into skips.
pub(crate) fn read_text_file(path: PathBuf) -> Outcome<(PathBuf, String)> {
    match fs::read_to_string(&path) {
        Ok(text) => Outcome::Inlined((path, text)),
        Err(source) => Outcome::Skip(SkipReason::Unreadable { path, source }),
    }
}

/// Read an existing file as bytes, turning I/O errors into skips.
pub(crate) fn read_bytes_file(path: PathBuf) -> Outcome<(PathBuf, Vec<u8>)> {
    match fs::read(&path) {
        Ok(bytes) => Outcome::Inlined((path, bytes)),
        Err(source) => Outcome::Skip(SkipReason::Unreadable { path, source }),
    }
}

/// Lexically collapse `.` and `..` components.
fn normalize(path: &Path) -> PathBuf {
    let mut result = PathBuf::new();
    for component in path.components() {
        match component {
            Component::CurDir => {}
            Component::ParentDir => {
                if !result.pop() {
                    result.push(component);
                }
            }
            other => result.push(other),
        }
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn relative_marker_resolves_against_document_dir() {
        let resolver = Resolver::new("/project");
        assert_eq!(
            resolver.resolve("./app.js", Path::new("/project/pages")),
            Resolution::Local(PathBuf::from("/project/pages/app.js"))
        );
        assert_eq!(
            resolver.resolve("../shared/a.css", Path::new("/project/pages")),
            Resolution::Local(PathBuf::from("/project/shared/a.css"))
        );
    }

    #[test]
    fn bare_and_rooted_values_resolve_against_project_root() {
        let resolver = Resolver::new("/project");
        let base = Path::new("/project/pages");
        assert_eq!(
            resolver.resolve("js/app.js?v=12", base),
            Resolution::Local(PathBuf::from("/project/js/app.js"))
        );
        assert_eq!(
            resolver.resolve("/assets/logo.png", base),
            Resolution::Local(PathBuf::from("/project/assets/logo.png"))
        );
    }

    #[test]
    fn external_and_inlined_values_are_not_resolved() {
        let resolver = Resolver::new("/project");
        let base = Path::new("/project");
        assert_eq!(resolver.resolve("https://cdn/x.js", base), Resolution::External);
        assert_eq!(resolver.resolve("data:text/plain,hi", base), Resolution::AlreadyInlined);
    }

    #[test]
    fn missing_files_are_skipped() {
        let dir = tempdir().unwrap();
        let resolver = Resolver::new(dir.path());
        match resolver.read_text("./missing.js", dir.path()) {
            Outcome::Skip(SkipReason::Missing(path)) => {
                assert_eq!(path, dir.path().join("missing.js"))
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn reads_existing_files_and_strips_queries() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("app.js"), "console.log(1)").unwrap();
        let resolver = Resolver::new(dir.path());

        match resolver.read_text("app.js?v=2", dir.path()) {
            Outcome::Inlined((path, text)) => {
                assert_eq!(path, dir.path().join("app.js"));
                assert_eq!(text, "console.log(1)");
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
    }

    #[test]
    fn non_utf8_text_is_unreadable() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("bad.css"), [0xffu8, 0xfe, 0x00]).unwrap();
        let resolver = Resolver::new(dir.path());

        assert!(matches!(
            resolver.read_text("./bad.css", dir.path()),
            Outcome::Skip(SkipReason::Unreadable { .. })
        ));
    }

    #[test]
    fn empty_values_have_no_reference() {
        let resolver = Resolver::new("/project");
        assert!(matches!(
            resolver.locate("  ", Path::new("/project")),
            Outcome::Skip(SkipReason::NoReference)
        ));
    }
}
