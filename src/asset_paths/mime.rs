use base64::{Engine as _, engine::general_purpose};
use regex::Regex;

use super::resolve::strip_query;

/// Media type for a lowercase file extension.
pub fn mime_for_extension(extension: &str) -> &'static str {
    match extension {
        "png" => "image/png",
        "jpg" | "jpeg" => "image/jpeg",
        "gif" => "image/gif",
        "svg" => "image/svg+xml",
        "ico" => "image/x-icon",
        "json" => "application/json",
        _ => "application/octet-stream",
    }
}

/// Recover the extension of a reference, tolerating query strings and hashed names.
///
/// The last dot-delimited segment of the file name is split again on `-`, so a
/// name such as `icon.png-3f9a` still yields `png`. Names carrying a hyphen after
/// their last dot are misread.
pub fn extension_of(reference: &str) -> String {
    let path = strip_query(reference);
    let file_name = path.rsplit('/').next().unwrap_or(path);
    match file_name.rsplit_once('.') {
        Some((_, extension)) => extension
            .split('-')
            .next()
            .unwrap_or("")
            .to_ascii_lowercase(),
        None => String::new(),
    }
}

/// Media type for a reference based on its extension.
pub fn mime_for_reference(reference: &str) -> &'static str {
    mime_for_extension(&extension_of(reference))
}

fn hashed_name_pattern() -> &'static Regex {
    use std::sync::OnceLock;

    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"[.-][A-Za-z0-9_]{8,}\.[A-Za-z0-9]+$").expect("invalid hashed name regex")
    })
}

/// Whether a reference looks like a bundler output carrying a content hash.
pub fn looks_hashed(reference: &str) -> bool {
    let path = strip_query(reference);
    let file_name = path.rsplit('/').next().unwrap_or(path);
    file_name.contains('-') && hashed_name_pattern().is_match(file_name)
}

/// Encode bytes as a base64 `data:` URI.
pub fn data_url(mime: &str, bytes: &[u8]) -> String {
    format!("data:{};base64,{}", mime, general_purpose::STANDARD.encode(bytes))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_known_extensions() {
        assert_eq!(mime_for_reference("logo.PNG"), "image/png");
        assert_eq!(mime_for_reference("photo.jpeg"), "image/jpeg");
        assert_eq!(mime_for_reference("icon.svg"), "image/svg+xml");
        assert_eq!(mime_for_reference("favicon.ico"), "image/x-icon");
        assert_eq!(mime_for_reference("manifest.json"), "application/json");
        assert_eq!(mime_for_reference("font.woff2"), "application/octet-stream");
    }

    #[test]
    fn strips_query_before_reading_extension() {
        assert_eq!(extension_of("./img/logo.png?v=3"), "png");
        assert_eq!(extension_of("logo.gif#frame"), "gif");
    }

    #[test]
    fn splits_hashed_suffix_off_extension() {
        assert_eq!(extension_of("assets/icon.png-3f9a"), "png");
        assert_eq!(extension_of("./dir.v2/README"), "");
    }

    #[test]
    fn detects_hashed_file_names() {
        assert!(looks_hashed("./assets/logo-BxK2a9Qz.png"));
        assert!(looks_hashed("icon-192.a1b2c3d4e5.png"));
        assert!(!looks_hashed("./logo.png"));
        assert!(!looks_hashed("apple-touch-icon.png"));
    }

    #[test]
    fn encodes_data_urls() {
        assert_eq!(data_url("image/png", b"abc"), "data:image/png;base64,YWJj");
    }
}
