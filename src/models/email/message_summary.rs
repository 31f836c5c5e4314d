//! One line of a message listing.

use chrono::{DateTime, Utc};
use serde::Serialize;
use sqlx::FromRow;

#[derive(Debug, Serialize, FromRow)]
pub struct MessageSummary {
    pub id: i64,
    pub timestamp: f64,
    pub received_at: DateTime<Utc>,
    pub mail_from: String,
    pub subject: Option<String>,
    pub attachment_count: i64,
}
