//! Message about to be committed to the store.

use crate::models::{
  attachment::attachment_meta::AttachmentMeta, content::extracted_content::ExtractedContent,
  envelope::inbound_envelope::InboundEnvelope,
};
use chrono::{DateTime, Utc};

#[derive(Debug, Clone)]
pub struct NewMessage {
  pub received_at: DateTime<Utc>,
  pub sender_ip: String,
  pub mail_from: String,
  pub recipients: Vec<String>,
  pub subject: String,
  pub text_body: Option<String>,
  pub html_body: Option<String>,
  pub attachments: Vec<AttachmentMeta>,
  pub raw: Vec<u8>,
}

impl NewMessage {
  /// Combine a completed envelope with its decoded content. Empty bodies are
  /// stored as NULL.
  pub fn new(
    envelope: &InboundEnvelope,
    content: ExtractedContent,
    received_at: DateTime<Utc>,
  ) -> Self {
    let non_empty = |s: String| if s.is_empty() { None } else { Some(s) };
    NewMessage {
      received_at,
      sender_ip: envelope.sender_ip(),
      mail_from: envelope.mail_from.clone(),
      recipients: envelope.recipients.clone(),
      subject: content.subject,
      text_body: non_empty(content.text_body),
      html_body: non_empty(content.html_body),
      attachments: content.attachments,
      raw: envelope.raw.clone(),
    }
  }

  /// Epoch seconds with microsecond precision.
  pub fn timestamp(&self) -> f64 {
    epoch_seconds(&self.received_at)
  }

  pub fn raw_size(&self) -> i64 {
    self.raw.len() as i64
  }
}

pub fn epoch_seconds(t: &DateTime<Utc>) -> f64 {
  t.timestamp_micros() as f64 / 1_000_000.0
}
