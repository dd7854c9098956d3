use regex::Regex;

fn external_reference_patterns() -> &'static [Regex] {
    use std::sync::OnceLock;

    static PATTERNS: OnceLock<Vec<Regex>> = OnceLock::new();
    PATTERNS
        .get_or_init(|| {
            vec![
                Regex::new(r"(?i)^https?:").expect("invalid http(s) regex"),
                Regex::new(r"^//").expect("invalid protocol-relative regex"),
                Regex::new(r"(?i)^(?:mailto|tel|blob|javascript|about):")
                    .expect("invalid scheme regex"),
            ]
        })
        .as_slice()
}

fn inlined_reference_pattern() -> &'static Regex {
    use std::sync::OnceLock;

    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| Regex::new(r"(?i)^data:").expect("invalid data URI regex"))
}

/// How a raw attribute value relates to the local filesystem.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReferenceClass {
    /// Network URL, protocol-relative URL or non-file scheme.
    External,
    /// Value is a `data:` URI.
    AlreadyInlined,
    /// Candidate for on-disk resolution.
    Local,
}

/// Classify a reference value before any filesystem lookup.
pub fn classify_reference(value: &str) -> ReferenceClass {
    let value = value.trim();
    if inlined_reference_pattern().is_match(value) {
        ReferenceClass::AlreadyInlined
    } else if external_reference_patterns()
        .iter()
        .any(|pattern| pattern.is_match(value))
    {
        ReferenceClass::External
    } else {
        ReferenceClass::Local
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ignores_http_urls() {
        assert_eq!(
            classify_reference("https://example.com/app.js"),
            ReferenceClass::External
        );
        assert_eq!(classify_reference("HTTP://example.com"), ReferenceClass::External);
    }

    #[test]
    fn ignores_protocol_relative_urls() {
        assert_eq!(
            classify_reference("//cdn.example.com/lib.js"),
            ReferenceClass::External
        );
    }

    #[test]
    fn recognises_data_uris() {
        assert_eq!(
            classify_reference("data:image/png;base64,abc"),
            ReferenceClass::AlreadyInlined
        );
    }

    #[test]
    fn keeps_relative_and_rooted_paths() {
        assert_eq!(classify_reference("./app.js"), ReferenceClass::Local);
        assert_eq!(classify_reference("../shared/a.css"), ReferenceClass::Local);
        assert_eq!(classify_reference("/assets/logo.png"), ReferenceClass::Local);
        assert_eq!(classify_reference("http-client.js"), ReferenceClass::Local);
    }
}
