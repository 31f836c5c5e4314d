//! Attachment metadata found while walking a MIME tree.

use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AttachmentMeta {
  pub filename: String,
  pub content_type: String,
  pub size: i64,
}
