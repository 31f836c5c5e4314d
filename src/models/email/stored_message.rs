//! A persisted message reassembled with its recipients and attachments.

use super::message_row::MessageRow;
use crate::models::attachment::attachment_row::AttachmentRow;
use chrono::{DateTime, Utc};
use serde::Serialize;

#[derive(Debug, Serialize)]
pub struct StoredMessage {
  pub id: i64,
  pub timestamp: f64,
  pub received_at: DateTime<Utc>,
  pub sender_ip: Option<String>,
  pub from: String,
  pub to: Vec<String>,
  pub subject: Option<String>,
  pub plaintext_body: Option<String>,
  pub html_body: Option<String>,
  pub attachments: Vec<AttachmentRow>,
  pub raw_size: i64,
}

impl StoredMessage {
  pub fn assemble(row: MessageRow, to: Vec<String>, attachments: Vec<AttachmentRow>) -> Self {
    StoredMessage {
      id: row.id,
      timestamp: row.timestamp,
      received_at: row.received_at,
      sender_ip: row.sender_ip,
      from: row.mail_from,
      to,
      subject: row.subject,
      plaintext_body: row.text_body,
      html_body: row.html_body,
      attachments,
      raw_size: row.raw_size,
    }
  }
}
