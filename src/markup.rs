//! Text-pattern matching for the tags and attributes the inlining passes care about.
//!
//! Passes never look at raw markup directly; they ask this module for tag matches and
//! attribute spans so the matching strategy can change without touching pass contracts.

use std::ops::Range;
use std::sync::OnceLock;

use regex::Regex;

/// Script elements with an empty body, i.e. the ones that can carry a `src`.
pub fn empty_script_tags() -> &'static Regex {
  static PATTERN: OnceLock<Regex> = OnceLock::new();
  PATTERN.get_or_init(|| {
    Regex::new(r"(?i)<script\b[^>]*>\s*</script\s*>").expect("invalid script tag regex")
  })
}

/// Script elements together with their bodies. Group 1 holds the attribute text,
/// group 2 the body.
pub fn script_blocks() -> &'static Regex {
  static PATTERN: OnceLock<Regex> = OnceLock::new();
  PATTERN.get_or_init(|| {
    Regex::new(r"(?is)<script\b([^>]*)>(.*?)</script\s*>").expect("invalid script block regex")
  })
}

/// Opening `<link>` tags.
pub fn link_tags() -> &'static Regex {
  static PATTERN: OnceLock<Regex> = OnceLock::new();
  PATTERN.get_or_init(|| Regex::new(r"(?i)<link\b[^>]*>").expect("invalid link tag regex"))
}

/// Opening `<iframe>` tags.
pub fn iframe_tags() -> &'static Regex {
  static PATTERN: OnceLock<Regex> = OnceLock::new();
  PATTERN.get_or_init(|| Regex::new(r"(?i)<iframe\b[^>]*>").expect("invalid iframe tag regex"))
}

/// `href`/`src` attributes whose value names an image file. Group 1 is everything up to
/// and including the opening quote, group 2 the value, group 3 the closing quote.
pub fn image_attributes() -> &'static Regex {
  static PATTERN: OnceLock<Regex> = OnceLock::new();
  PATTERN.get_or_init(|| {
    Regex::new(
      r#"(?i)(\s(?:href|src)\s*=\s*["'])([^"']*?\.(?:png|jpe?g|gif|svg|ico)(?:[?#][^"']*)?)(["'])"#,
    )
    .expect("invalid image attribute regex")
  })
}

/// `href`/`src` attributes holding a `./`-relative value. Group 1 is the attribute
/// prefix, group 2 the opening quote, group 3 the value without the `./` marker.
pub fn dot_relative_attributes() -> &'static Regex {
  static PATTERN: OnceLock<Regex> = OnceLock::new();
  PATTERN.get_or_init(|| {
    Regex::new(r#"(?i)(\s(?:href|src)\s*=\s*)(["'])\./([^"']*)["']"#)
      .expect("invalid relative attribute regex")
  })
}

fn data_attribute_pattern() -> &'static Regex {
  static PATTERN: OnceLock<Regex> = OnceLock::new();
  PATTERN.get_or_init(|| {
    Regex::new(r"(?i)\sdata-[^=\s>]*\s*=").expect("invalid data attribute regex")
  })
}

/// Span and value of an attribute inside a tag.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AttributeMatch<'a> {
  /// Byte range of the whole `name=value` text within the tag.
  pub range: Range<usize>,
  /// Attribute value without quotes.
  pub value: &'a str,
}

/// The opening tag of an element match, up to and including the first `>`.
pub fn opening_tag(element: &str) -> &str {
  match element.find('>') {
    Some(end) => &element[..=end],
    None => element,
  }
}

/// Locate an attribute by (lowercase) name. The name must be preceded by whitespace,
/// so `data-src` never matches `src` and `srcdoc` never matches either.
pub fn find_attribute<'a>(tag: &'a str, name: &str) -> Option<AttributeMatch<'a>> {
  let lower = tag.to_ascii_lowercase();
  let bytes = lower.as_bytes();
  let mut search = 0;

  while let Some(found) = lower[search..].find(name) {
    let start = search + found;
    search = start + name.len();
    if start == 0 || !bytes[start - 1].is_ascii_whitespace() {
      continue;
    }

    let mut cursor = skip_whitespace(bytes, start + name.len());
    if bytes.get(cursor) != Some(&b'=') {
      continue;
    }
    cursor = skip_whitespace(bytes, cursor + 1);

    match bytes.get(cursor) {
      Some(&quote) if quote == b'"' || quote == b'\'' => {
        let close = cursor + 1 + lower[cursor + 1..].find(quote as char)?;
        return Some(AttributeMatch {
          range: start..close + 1,
          value: &tag[cursor + 1..close],
        });
      }
      Some(_) => {
        let end = bytes[cursor..]
          .iter()
          .position(|b| b.is_ascii_whitespace() || *b == b'>')
          .map_or(bytes.len(), |offset| cursor + offset);
        let end = if end > cursor && bytes[end - 1] == b'/' && bytes.get(end) == Some(&b'>') {
          end - 1
        } else {
          end
        };
        return Some(AttributeMatch {
          range: start..end,
          value: &tag[cursor..end],
        });
      }
      None => return None,
    }
  }

  None
}

/// Whether a boolean (or valued) attribute is present on the tag.
pub fn has_attribute(tag: &str, name: &str) -> bool {
  let lower = tag.to_ascii_lowercase();
  let bytes = lower.as_bytes();
  let mut search = 0;

  while let Some(found) = lower[search..].find(name) {
    let start = search + found;
    let end = start + name.len();
    search = end;
    let preceded = start > 0 && bytes[start - 1].is_ascii_whitespace();
    let followed = match bytes.get(end) {
      None => true,
      Some(b) => b.is_ascii_whitespace() || matches!(b, b'=' | b'>' | b'/'),
    };
    if preceded && followed {
      return true;
    }
  }

  false
}

/// Whether the tag carries any `data-*` attribute.
pub fn has_data_attribute(tag: &str) -> bool {
  data_attribute_pattern().is_match(tag)
}

/// Lowercased whitespace-separated tokens of the tag's `rel` attribute.
pub fn rel_tokens(tag: &str) -> Vec<String> {
  find_attribute(tag, "rel")
    .map(|attr| {
      attr
        .value
        .split_whitespace()
        .map(|token| token.to_ascii_lowercase())
        .collect()
    })
    .unwrap_or_default()
}

/// Replace a byte range of `tag` with `replacement`.
pub fn splice(tag: &str, range: Range<usize>, replacement: &str) -> String {
  let mut result = String::with_capacity(tag.len() + replacement.len());
  result.push_str(&tag[..range.start]);
  result.push_str(replacement);
  result.push_str(&tag[range.end..]);
  result
}

fn skip_whitespace(bytes: &[u8], mut cursor: usize) -> usize {
  while bytes.get(cursor).is_some_and(|b| b.is_ascii_whitespace()) {
    cursor += 1;
  }
  cursor
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn finds_double_single_and_unquoted_values() {
    let tag = r#"<img alt='a' SRC="./logo.png" width=20>"#;
    let src = find_attribute(tag, "src").unwrap();
    assert_eq!(src.value, "./logo.png");
    assert_eq!(&tag[src.range.clone()], r#"SRC="./logo.png""#);

    assert_eq!(find_attribute(tag, "alt").unwrap().value, "a");
    assert_eq!(find_attribute(tag, "width").unwrap().value, "20");
  }

  #[test]
  fn unquoted_value_stops_before_self_closing_slash() {
    let tag = "<link rel=icon href=favicon.ico/>";
    assert_eq!(find_attribute(tag, "href").unwrap().value, "favicon.ico");
  }

  #[test]
  fn does_not_confuse_prefixed_attribute_names() {
    let tag = r#"<img data-src="lazy.png" srcdoc="x">"#;
    assert!(find_attribute(tag, "src").is_none());
  }

  #[test]
  fn detects_boolean_attributes() {
    assert!(has_attribute(r#"<script src="a.js" defer>"#, "defer"));
    assert!(has_attribute(r#"<script async src="a.js">"#, "async"));
    assert!(!has_attribute(r#"<script src="deferred.js">"#, "defer"));
    assert!(!has_attribute(r#"<script data-defer="1">"#, "defer"));
  }

  #[test]
  fn detects_data_attributes() {
    assert!(has_data_attribute(
      r#"<script defer src="https://x/script.js" data-website-id="abc">"#
    ));
    assert!(!has_data_attribute(r#"<script src="./app.js">"#));
  }

  #[test]
  fn splits_rel_tokens() {
    assert_eq!(rel_tokens(r#"<link rel="Shortcut Icon" href="f.ico">"#), vec![
      String::from("shortcut"),
      String::from("icon")
    ]);
    assert!(rel_tokens("<link href=x>").is_empty());
  }

  #[test]
  fn opening_tag_stops_at_first_angle() {
    assert_eq!(opening_tag(r#"<script src="a.js"></script>"#), r#"<script src="a.js">"#);
  }

  #[test]
  fn empty_script_pattern_ignores_inline_bodies() {
    let html = r#"<script src="a.js"></script><script>run()</script>"#;
    let matches: Vec<&str> = empty_script_tags()
      .find_iter(html)
      .map(|m| m.as_str())
      .collect();
    assert_eq!(matches, vec![r#"<script src="a.js"></script>"#]);
  }
}
