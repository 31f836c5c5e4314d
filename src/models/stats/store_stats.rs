//! Aggregate counts over the store.

use serde::Serialize;

#[derive(Debug, Default, Serialize, PartialEq)]
pub struct StoreStats {
  pub total_messages: i64,
  pub failed_messages: i64,
  pub total_attachments: i64,
  pub unique_recipients: i64,
  pub latest_timestamp: Option<f64>,
  pub received_today: i64,
}
