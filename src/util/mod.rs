//! Utility functions: tracing setup and display helpers.

use std::borrow::Cow;
use tracing_subscriber::{EnvFilter, fmt};

/// Appended to text cut short for display.
pub const TRUNCATION_MARKER: &str = "...(truncated)";

/// Initialize pretty CLI logging.
pub fn init_tracing() {
  let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
  fmt()
    .with_env_filter(filter)
    .with_target(false)
    .pretty()
    .init();
}

/// Cut `s` to at most `max` characters, appending the truncation marker when
/// anything was dropped.
pub fn truncate_chars(s: &str, max: usize) -> Cow<'_, str> {
  match s.char_indices().nth(max) {
    None => Cow::Borrowed(s),
    Some((idx, _)) => Cow::Owned(format!("{}{}", &s[..idx], TRUNCATION_MARKER)),
  }
}

/// Shorten a single-line field for tabular output (`...` suffix).
pub fn ellipsize(s: &str, max: usize) -> String {
  match s.char_indices().nth(max) {
    None => s.to_string(),
    Some((idx, _)) => format!("{}...", &s[..idx]),
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn truncate_keeps_short_text_borrowed() {
    assert!(matches!(truncate_chars("hello", 5), Cow::Borrowed("hello")));
    assert_eq!(truncate_chars("", 0), "");
  }

  #[test]
  fn truncate_appends_marker() {
    assert_eq!(truncate_chars("hello!", 5), format!("hello{TRUNCATION_MARKER}"));
    assert_eq!(truncate_chars("日本語テキスト", 3), format!("日本語{TRUNCATION_MARKER}"));
  }

  #[test]
  fn ellipsize_short_and_long() {
    assert_eq!(ellipsize("abc", 3), "abc");
    assert_eq!(ellipsize("abcd", 3), "abc...");
  }
}
