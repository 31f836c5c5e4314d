//! Message store: atomic commits, the failed-message log and read queries.

use crate::{
    error::StoreError,
    models::{
        attachment::attachment_row::AttachmentRow,
        email::{
            message_row::MessageRow,
            message_summary::MessageSummary,
            new_message::{NewMessage, epoch_seconds},
            stored_message::StoredMessage,
        },
        failed::failed_message::{FailedMessageRow, NewFailedMessage},
        stats::store_stats::StoreStats,
    },
};
use chrono::{Local, TimeZone};
use sqlx::SqlitePool;
use tracing::{info, warn};

const SUMMARY_COLUMNS: &str = "m.id, m.timestamp, m.received_at, m.mail_from, m.subject, \
    (SELECT COUNT(*) FROM attachments a WHERE a.message_id = m.id) AS attachment_count";

const SEARCH_LIMIT: i64 = 50;

/// Columns a substring search can target.
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum SearchField {
    All,
    From,
    Subject,
    Recipient,
}

/// Handle to the message database. Cheap to clone; clones share the pool.
#[derive(Clone)]
pub struct MailStore {
    pool: SqlitePool,
}

impl MailStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &SqlitePool {
        &self.pool
    }

    /// Insert a message with its recipients and attachments in one transaction.
    ///
    /// The transaction rolls back when dropped, so an early `?` leaves no rows behind.
    pub async fn commit(&self, msg: &NewMessage) -> Result<i64, StoreError> {
        let mut tx = self.pool.begin().await?;

        let id = sqlx::query(
            "INSERT INTO messages (timestamp, received_at, sender_ip, mail_from, subject, text_body, html_body, raw_content, raw_size) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(msg.timestamp())
        .bind(msg.received_at)
        .bind(&msg.sender_ip)
        .bind(&msg.mail_from)
        .bind(&msg.subject)
        .bind(&msg.text_body)
        .bind(&msg.html_body)
        .bind(&msg.raw)
        .bind(msg.raw_size())
        .execute(&mut *tx)
        .await?
        .last_insert_rowid();

        for address in &msg.recipients {
            sqlx::query("INSERT INTO recipients (message_id, address) VALUES (?, ?)")
                .bind(id)
                .bind(address)
                .execute(&mut *tx)
                .await?;
        }

        for att in &msg.attachments {
            sqlx::query(
                "INSERT INTO attachments (message_id, filename, content_type, size) VALUES (?, ?, ?, ?)",
            )
            .bind(id)
            .bind(&att.filename)
            .bind(&att.content_type)
            .bind(att.size)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        info!(
            "stored message {} ({} recipients, {} attachments)",
            id,
            msg.recipients.len(),
            msg.attachments.len()
        );
        Ok(id)
    }

    /// Record a message that could not be stored structurally.
    pub async fn commit_failure(&self, failed: &NewFailedMessage) -> Result<i64, StoreError> {
        let id = sqlx::query(
            "INSERT INTO failed_messages (timestamp, received_at, sender_ip, mail_from, raw_content, error_message) VALUES (?, ?, ?, ?, ?, ?)",
        )
        .bind(epoch_seconds(&failed.received_at))
        .bind(failed.received_at)
        .bind(&failed.sender_ip)
        .bind(&failed.mail_from)
        .bind(&failed.raw)
        .bind(&failed.error_message)
        .execute(&self.pool)
        .await?
        .last_insert_rowid();
        warn!("recorded failed message {}: {}", id, failed.error_message);
        Ok(id)
    }

    /// Message by id with its recipients and attachments.
    pub async fn get_message(&self, id: i64) -> Result<Option<StoredMessage>, StoreError> {
        let row = sqlx::query_as::<_, MessageRow>(
            "SELECT id, timestamp, received_at, sender_ip, mail_from, subject, text_body, html_body, raw_size FROM messages WHERE id = ?",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;
        let Some(row) = row else {
            return Ok(None);
        };

        let recipients: Vec<String> =
            sqlx::query_scalar("SELECT address FROM recipients WHERE message_id = ? ORDER BY id")
                .bind(id)
                .fetch_all(&self.pool)
                .await?;
        let attachments: Vec<AttachmentRow> = sqlx::query_as(
            "SELECT id, message_id, filename, content_type, size FROM attachments WHERE message_id = ? ORDER BY id",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(StoredMessage::assemble(row, recipients, attachments)))
    }

    /// Raw message bytes as received, for EML export.
    pub async fn raw_content(&self, id: i64) -> Result<Option<Vec<u8>>, StoreError> {
        let raw: Option<Option<Vec<u8>>> =
            sqlx::query_scalar("SELECT raw_content FROM messages WHERE id = ?")
                .bind(id)
                .fetch_optional(&self.pool)
                .await?;
        Ok(raw.flatten())
    }

    /// Newest messages first. Ids follow commit order, so the listing stays
    /// stable when the wall clock steps back.
    pub async fn list_messages(
        &self,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<MessageSummary>, StoreError> {
        let sql = format!(
            "SELECT {SUMMARY_COLUMNS} FROM messages m ORDER BY m.id DESC LIMIT ? OFFSET ?"
        );
        let rows = sqlx::query_as::<_, MessageSummary>(&sql)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Messages delivered to an exact recipient address, newest first.
    pub async fn messages_by_recipient(
        &self,
        address: &str,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<MessageSummary>, StoreError> {
        let sql = format!(
            "SELECT {SUMMARY_COLUMNS} FROM messages m WHERE m.id IN (SELECT DISTINCT message_id FROM recipients WHERE address = ?) ORDER BY m.id DESC LIMIT ? OFFSET ?"
        );
        let rows = sqlx::query_as::<_, MessageSummary>(&sql)
            .bind(address)
            .bind(limit)
            .bind(offset)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Substring search over the chosen field.
    pub async fn search(
        &self,
        query: &str,
        field: SearchField,
    ) -> Result<Vec<MessageSummary>, StoreError> {
        let like = format!("%{}%", query.trim());
        let filter = match field {
            SearchField::All => {
                "coalesce(m.mail_from,'') LIKE ?1 OR coalesce(m.subject,'') LIKE ?1 OR coalesce(m.text_body,'') LIKE ?1 OR coalesce(m.html_body,'') LIKE ?1"
            }
            SearchField::From => "m.mail_from LIKE ?1",
            SearchField::Subject => "coalesce(m.subject,'') LIKE ?1",
            SearchField::Recipient => {
                "m.id IN (SELECT message_id FROM recipients WHERE address LIKE ?1)"
            }
        };
        let sql = format!(
            "SELECT {SUMMARY_COLUMNS} FROM messages m WHERE {filter} ORDER BY m.id DESC LIMIT ?2"
        );
        let rows = sqlx::query_as::<_, MessageSummary>(&sql)
            .bind(like)
            .bind(SEARCH_LIMIT)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows)
    }

    /// Delete a message; recipients and attachments go with it.
    pub async fn delete_message(&self, id: i64) -> Result<bool, StoreError> {
        let done = sqlx::query("DELETE FROM messages WHERE id = ?")
            .bind(id)
            .execute(&self.pool)
            .await?;
        if done.rows_affected() > 0 {
            info!("deleted message {}", id);
            Ok(true)
        } else {
            warn!("message {} does not exist", id);
            Ok(false)
        }
    }

    /// Newest failed records first.
    pub async fn list_failed(&self, limit: i64) -> Result<Vec<FailedMessageRow>, StoreError> {
        let rows = sqlx::query_as::<_, FailedMessageRow>(
            "SELECT id, timestamp, received_at, sender_ip, mail_from, coalesce(length(raw_content), 0) AS raw_size, error_message FROM failed_messages ORDER BY id DESC LIMIT ?",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows)
    }

    async fn count(&self, sql: &str) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar(sql).fetch_one(&self.pool).await
    }

    pub async fn stats(&self) -> Result<StoreStats, StoreError> {
        let total_messages = self.count("SELECT COUNT(*) FROM messages").await?;
        let failed_messages = self.count("SELECT COUNT(*) FROM failed_messages").await?;
        let total_attachments = self.count("SELECT COUNT(*) FROM attachments").await?;
        let unique_recipients = self
            .count("SELECT COUNT(DISTINCT address) FROM recipients")
            .await?;

        let latest_timestamp: Option<f64> = sqlx::query_scalar("SELECT MAX(timestamp) FROM messages")
            .fetch_one(&self.pool)
            .await?;

        let midnight = Local::now()
            .date_naive()
            .and_hms_opt(0, 0, 0)
            .and_then(|t| Local.from_local_datetime(&t).earliest())
            .map(|t| t.timestamp() as f64)
            .unwrap_or(0.0);
        let received_today: i64 =
            sqlx::query_scalar("SELECT COUNT(*) FROM messages WHERE timestamp >= ?")
                .bind(midnight)
                .fetch_one(&self.pool)
                .await?;

        Ok(StoreStats {
            total_messages,
            failed_messages,
            total_attachments,
            unique_recipients,
            latest_timestamp,
            received_today,
        })
    }
}

