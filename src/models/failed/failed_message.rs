//! Messages that could not be stored as structured records.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

/// Fallback record written when extraction or the structured commit fails.
#[derive(Debug, Clone)]
pub struct NewFailedMessage {
  pub received_at: DateTime<Utc>,
  pub sender_ip: String,
  pub mail_from: Option<String>,
  pub raw: Vec<u8>,
  pub error_message: String,
}

#[derive(Debug, Serialize, FromRow)]
pub struct FailedMessageRow {
  pub id: i64,
  pub timestamp: f64,
  pub received_at: DateTime<Utc>,
  pub sender_ip: Option<String>,
  pub mail_from: Option<String>,
  pub raw_size: i64,
  pub error_message: Option<String>,
}
