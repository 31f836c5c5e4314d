//! Structured content pulled out of a raw MIME message.

use crate::{models::attachment::attachment_meta::AttachmentMeta, util::truncate_chars};
use std::borrow::Cow;

/// Maximum characters shown for a body in summaries.
pub const SUMMARY_LIMIT: usize = 1000;

/// Subject used when the message carries none.
pub const NO_SUBJECT: &str = "(no subject)";

/// Decoded view of a message. Bodies are kept whole; only the summary
/// accessors truncate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractedContent {
  pub subject: String,
  pub text_body: String,
  pub html_body: String,
  pub attachments: Vec<AttachmentMeta>,
  pub raw_size: usize,
}

impl ExtractedContent {
  pub fn new(subject: Option<String>, raw_size: usize) -> Self {
    let subject = subject
      .map(|s| s.trim().to_string())
      .filter(|s| !s.is_empty())
      .unwrap_or_else(|| NO_SUBJECT.to_string());
    Self {
      subject,
      text_body: String::new(),
      html_body: String::new(),
      attachments: Vec::new(),
      raw_size,
    }
  }

  pub fn text_summary(&self) -> Cow<'_, str> {
    truncate_chars(&self.text_body, SUMMARY_LIMIT)
  }

  pub fn html_summary(&self) -> Cow<'_, str> {
    truncate_chars(&self.html_body, SUMMARY_LIMIT)
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::util::TRUNCATION_MARKER;

  #[test]
  fn blank_subject_gets_placeholder() {
    assert_eq!(ExtractedContent::new(None, 0).subject, NO_SUBJECT);
    assert_eq!(ExtractedContent::new(Some("   ".into()), 0).subject, NO_SUBJECT);
    assert_eq!(ExtractedContent::new(Some(" Hi ".into()), 0).subject, "Hi");
  }

  #[test]
  fn summary_truncates_at_limit() {
    let mut c = ExtractedContent::new(None, 0);
    c.text_body = "a".repeat(SUMMARY_LIMIT);
    assert_eq!(c.text_summary().len(), SUMMARY_LIMIT);
    assert!(!c.text_summary().ends_with(TRUNCATION_MARKER));

    c.text_body.push('b');
    let s = c.text_summary();
    assert!(s.ends_with(TRUNCATION_MARKER));
    assert_eq!(s.chars().count(), SUMMARY_LIMIT + TRUNCATION_MARKER.chars().count());
    assert!(!s.contains('b'));
    // the stored body itself is untouched
    assert_eq!(c.text_body.len(), SUMMARY_LIMIT + 1);
  }

  #[test]
  fn summary_counts_characters_not_bytes() {
    let mut c = ExtractedContent::new(None, 0);
    c.html_body = "é".repeat(SUMMARY_LIMIT);
    assert_eq!(c.html_summary(), c.html_body.as_str());
  }
}
