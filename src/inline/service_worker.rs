//! Neutralize offline-worker registration inside inline scripts.
//!
//! Recognition is pattern based. Every rewrite needs a balanced bracket extent, found by
//! a scanner that steps over string literals and comments; when the extent cannot be
//! established the code is left as written. Rewrites never produce text that a later
//! round would match differently, and the script is rewritten until it stops changing,
//! so applying the pass twice gives the same result as applying it once.

use std::sync::OnceLock;

use anyhow::Result;
use regex::{Captures, Regex};

use super::DocumentPass;
use crate::markup::{find_attribute, script_blocks};
use crate::mode::BuildMode;
use crate::models::{Bundle, Document};
use crate::project::BUILTIN_MONITOR_MARKERS;

/// Statement that stands in for a removed registration block.
pub const DISABLED_NOTICE: &str = "console.log('ServiceWorker disabled in single-file mode');";

const LISTENER_NOTICE: &str = "console.log('ServiceWorker event listener disabled in single-file mode')";
const MONITOR_NOTICE: &str = "// ServiceWorker monitoring disabled in single-file mode\n";
const FAILURE_MESSAGE: &str = "ServiceWorker registration failed:";
const FAILURE_REPLACEMENT: &str = "ServiceWorker disabled in single-file mode:";
const MAX_ROUNDS: usize = 16;

fn feature_detection() -> &'static Regex {
  static PATTERN: OnceLock<Regex> = OnceLock::new();
  PATTERN.get_or_init(|| {
    Regex::new(r#"\bif\s*\(\s*['"]serviceWorker['"]\s+in\s+navigator\s*\)\s*\{"#)
      .expect("invalid feature detection regex")
  })
}

fn registration_function() -> &'static Regex {
  static PATTERN: OnceLock<Regex> = OnceLock::new();
  PATTERN.get_or_init(|| {
    Regex::new(r"\bfunction\s+registerServiceWorker\s*\(\s*\)\s*\{")
      .expect("invalid registration function regex")
  })
}

fn controller_listener() -> &'static Regex {
  static PATTERN: OnceLock<Regex> = OnceLock::new();
  PATTERN.get_or_init(|| {
    Regex::new(
      r"(?:window\s*\.\s*)?navigator\s*\.\s*serviceWorker(?:\s*\.\s*controller)?\s*\.\s*addEventListener\s*\(",
    )
    .expect("invalid listener regex")
  })
}

fn helper_registration() -> &'static Regex {
  static PATTERN: OnceLock<Regex> = OnceLock::new();
  PATTERN.get_or_init(|| {
    Regex::new(r"(?:window\.)?([A-Z][A-Za-z0-9_$]*)\.registerServiceWorker\(\s*\)")
      .expect("invalid helper registration regex")
  })
}

/// Rewrites or removes offline-worker registration depending on the build mode.
#[derive(Debug, Clone)]
pub struct WorkerNeutralizer {
  mode: BuildMode,
  monitor_marker: String,
}

impl WorkerNeutralizer {
  /// Create the pass for a build mode and monitoring-block marker.
  pub fn new(mode: BuildMode, monitor_marker: impl Into<String>) -> Self {
    Self {
      mode,
      monitor_marker: monitor_marker.into(),
    }
  }

  /// Neutralize every inline script of `html`. Identity when the mode keeps the worker.
  pub fn neutralize_html(&self, html: &str) -> String {
    if self.mode.preserves_worker() {
      return html.to_string();
    }

    script_blocks()
      .replace_all(html, |caps: &Captures<'_>| {
        let attributes = &caps[1];
        let body = &caps[2];
        if !is_inline_javascript(attributes) {
          return caps[0].to_string();
        }
        let neutralized = neutralize_script(body, &self.monitor_marker);
        if neutralized == body {
          caps[0].to_string()
        } else {
          format!("<script{attributes}>{neutralized}</script>")
        }
      })
      .into_owned()
  }
}

impl DocumentPass for WorkerNeutralizer {
  fn name(&self) -> &'static str {
    "service-worker"
  }

  fn apply(&self, document: Document, _bundle: &mut Bundle) -> Result<Document> {
    if self.mode.preserves_worker() {
      tracing::info!("{} mode: keeping offline worker registration", self.mode);
      return Ok(document);
    }

    let html = self.neutralize_html(&document.html);
    if html != document.html {
      tracing::info!("{} mode: offline worker registration disabled", self.mode);
    }
    Ok(document.with_html(html))
  }
}

fn is_inline_javascript(attributes: &str) -> bool {
  let tag = format!("<script{attributes}>");
  if find_attribute(&tag, "src").is_some() {
    return false;
  }
  match find_attribute(&tag, "type") {
    None => true,
    Some(kind) => {
      let kind = kind.value.trim().to_ascii_lowercase();
      kind.is_empty() || kind == "module" || kind.contains("javascript") || kind.contains("ecmascript")
    }
  }
}

/// Neutralize offline-worker registration in a script body.
pub fn neutralize_script(script: &str, monitor_marker: &str) -> String {
  let mut current = script.to_string();
  for _ in 0..MAX_ROUNDS {
    let next = neutralize_round(&current, monitor_marker);
    if next == current {
      break;
    }
    current = next;
  }
  current
}

fn neutralize_round(script: &str, monitor_marker: &str) -> String {
  let text = replace_feature_detection(script);
  let text = replace_registration_functions(&text);
  let text = replace_listeners(&text);
  let text = replace_helper_calls(&text);
  let text = text.replace(FAILURE_MESSAGE, FAILURE_REPLACEMENT);
  BUILTIN_MONITOR_MARKERS
    .into_iter()
    .filter(|marker| *marker != monitor_marker)
    .fold(replace_monitor_blocks(&text, monitor_marker), |text, marker| {
      replace_monitor_blocks(&text, marker)
    })
}

fn replace_feature_detection(text: &str) -> String {
  splice_matches(text, feature_detection(), |head| {
    let end = balanced_end(text, head.end() - 1)?;
    if text[end..].trim_start().starts_with("else") {
      return None;
    }
    Some((end, DISABLED_NOTICE.to_string()))
  })
}

fn replace_registration_functions(text: &str) -> String {
  splice_matches(text, registration_function(), |head| {
    let end = balanced_end(text, head.end() - 1)?;
    Some((
      end,
      format!("function registerServiceWorker() {{\n  {DISABLED_NOTICE}\n}}"),
    ))
  })
}

fn replace_listeners(text: &str) -> String {
  splice_matches(text, controller_listener(), |head| {
    if !is_expression_start(text, head.start()) {
      return None;
    }
    let end = balanced_end(text, head.end() - 1)?;
    Some((end, LISTENER_NOTICE.to_string()))
  })
}

fn replace_helper_calls(text: &str) -> String {
  let mut result = String::with_capacity(text.len());
  let mut cursor = 0;
  for caps in helper_registration().captures_iter(text) {
    let Some(whole) = caps.get(0) else {
      continue;
    };
    if whole.start() < cursor
      || !is_expression_start(text, whole.start())
      || !is_code_at(text, whole.start())
    {
      continue;
    }
    result.push_str(&text[cursor..whole.start()]);
    result.push_str(&format!(
      "console.log('{}.registerServiceWorker disabled in single-file mode')",
      &caps[1]
    ));
    cursor = whole.end();
  }
  result.push_str(&text[cursor..]);
  result
}

fn replace_monitor_blocks(text: &str, marker: &str) -> String {
  if marker.is_empty() {
    return text.to_string();
  }

  let mut result = String::with_capacity(text.len());
  let mut cursor = 0;
  while let Some(found) = text[cursor..].find(marker) {
    let start = cursor + found;
    let body_start = start + marker.len();
    let end = monitor_block_end(text, body_start);
    result.push_str(&text[cursor..start]);
    if is_balanced(&text[body_start..end]) {
      result.push_str(MONITOR_NOTICE);
      cursor = end;
    } else {
      result.push_str(marker);
      cursor = body_start;
    }
  }
  result.push_str(&text[cursor..]);
  result
}

/// The monitoring block runs until the next line comment, the next `function`, or the
/// trailing whitespace of the script.
fn monitor_block_end(text: &str, from: usize) -> usize {
  let rest = &text[from..];
  [rest.find("//"), rest.find("function"), Some(rest.trim_end().len())]
    .into_iter()
    .flatten()
    .min()
    .map_or(text.len(), |offset| from + offset)
}

/// Replace non-overlapping matches for which `extent` returns the end of the construct
/// and its replacement. Matches without an extent are kept.
fn splice_matches<F>(text: &str, pattern: &Regex, mut extent: F) -> String
where
  F: FnMut(regex::Match<'_>) -> Option<(usize, String)>,
{
  let mut result = String::with_capacity(text.len());
  let mut cursor = 0;
  for head in pattern.find_iter(text) {
    if head.start() < cursor || !is_code_at(text, head.start()) {
      continue;
    }
    let Some((end, replacement)) = extent(head) else {
      continue;
    };
    result.push_str(&text[cursor..head.start()]);
    result.push_str(&replacement);
    cursor = end;
  }
  result.push_str(&text[cursor..]);
  result
}

/// A call expression can be swapped for another expression unless it is a member of
/// something else.
fn is_expression_start(text: &str, index: usize) -> bool {
  match text[..index].chars().next_back() {
    None => true,
    Some(c) => !(c == '.' || c == '$' || c == '_' || c.is_alphanumeric()),
  }
}

/// Whether `index` lies in code rather than inside a comment or string literal.
/// Anything after an unterminated literal or comment counts as not code.
fn is_code_at(text: &str, index: usize) -> bool {
  let bytes = text.as_bytes();
  let mut i = 0;

  while i < index {
    let skipped = match bytes[i] {
      b'\'' | b'"' | b'`' => skip_string(bytes, i),
      b'/' if bytes.get(i + 1) == Some(&b'/') => Some(
        bytes[i..]
          .iter()
          .position(|&b| b == b'\n')
          .map_or(bytes.len(), |offset| i + offset),
      ),
      b'/' if bytes.get(i + 1) == Some(&b'*') => {
        text[i + 2..].find("*/").map(|offset| i + 2 + offset + 2)
      }
      _ => {
        i += 1;
        continue;
      }
    };
    match skipped {
      Some(end) if end <= index => i = end,
      _ => return false,
    }
  }

  true
}

/// Index just past the bracket closing the one at `open`.
fn balanced_end(text: &str, open: usize) -> Option<usize> {
  scan_brackets(text, open, true)
}

fn is_balanced(text: &str) -> bool {
  scan_brackets(text, 0, false).is_some()
}

/// Track `()[]{}` nesting from `start`, stepping over string literals and comments.
///
/// With `stop_when_closed`, returns the index just past the bracket that brings nesting
/// back to zero. Otherwise walks to the end and returns its length when every bracket
/// closed. Mismatched brackets and unterminated literals yield `None`.
fn scan_brackets(text: &str, start: usize, stop_when_closed: bool) -> Option<usize> {
  let bytes = text.as_bytes();
  let mut stack: Vec<u8> = Vec::new();
  let mut i = start;

  while i < bytes.len() {
    match bytes[i] {
      b'\'' | b'"' | b'`' => {
        i = skip_string(bytes, i)?;
        continue;
      }
      b'/' if bytes.get(i + 1) == Some(&b'/') => {
        i = bytes[i..]
          .iter()
          .position(|&b| b == b'\n')
          .map_or(bytes.len(), |offset| i + offset);
        continue;
      }
      b'/' if bytes.get(i + 1) == Some(&b'*') => {
        i = text[i + 2..].find("*/").map(|offset| i + 2 + offset + 2)?;
        continue;
      }
      b'(' => stack.push(b')'),
      b'[' => stack.push(b']'),
      b'{' => stack.push(b'}'),
      close @ (b')' | b']' | b'}') => {
        if stack.pop()? != close {
          return None;
        }
        if stop_when_closed && stack.is_empty() {
          return Some(i + 1);
        }
      }
      _ => {}
    }
    i += 1;
  }

  (!stop_when_closed && stack.is_empty()).then_some(bytes.len())
}

/// Index just past the literal opened at `open`.
fn skip_string(bytes: &[u8], open: usize) -> Option<usize> {
  let quote = bytes[open];
  let mut i = open + 1;
  while i < bytes.len() {
    match bytes[i] {
      b'\\' => i += 2,
      b'\n' if quote != b'`' => return None,
      b if b == quote => return Some(i + 1),
      _ => i += 1,
    }
  }
  None
}
