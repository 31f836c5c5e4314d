//! Persisted attachment row.

use serde::Serialize;
use sqlx::FromRow;

#[derive(Debug, Clone, Serialize, FromRow)]
pub struct AttachmentRow {
  pub id: i64,
  pub message_id: i64,
  pub filename: String,
  pub content_type: Option<String>,
  pub size: i64,
}
