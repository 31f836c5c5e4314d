//! Database row for a message (raw content excluded).

use chrono::{DateTime, Utc};
use sqlx::FromRow;

#[derive(Debug, FromRow)]
pub struct MessageRow {
    pub id: i64,
    pub timestamp: f64,
    pub received_at: DateTime<Utc>,
    pub sender_ip: Option<String>,
    pub mail_from: String,
    pub subject: Option<String>,
    pub text_body: Option<String>,
    pub html_body: Option<String>,
    pub raw_size: i64,
}
