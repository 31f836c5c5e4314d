//! Turns a completed envelope into exactly one stored record.
//!
//! Extraction succeeded: structured commit. Extraction failed, or the
//! structured commit was refused by the database: failed-message record.
//! Nothing written (store unreachable, or the failure record refused too):
//! the client is told to retry.

use super::reply::Reply;
use crate::{
    db::store::MailStore,
    error::StoreError,
    mime,
    models::{
        email::new_message::NewMessage, envelope::inbound_envelope::InboundEnvelope,
        failed::failed_message::NewFailedMessage,
    },
    util::ellipsize,
};
use chrono::{DateTime, Utc};
use tracing::{error, info, warn};

/// Where an accepted message ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivered {
    Stored(i64),
    Recorded(i64),
}

/// Extract and persist one message.
pub async fn deliver(store: &MailStore, envelope: InboundEnvelope) -> Result<Delivered, StoreError> {
    let received_at = Utc::now();
    match mime::extract(&envelope.raw) {
        Ok(content) => {
            info!(
                from = %envelope.mail_from,
                to = %envelope.recipients.join(", "),
                subject = %content.subject,
                attachments = content.attachments.len(),
                size = content.raw_size,
                preview = %ellipsize(&content.text_summary(), 100),
                "received message"
            );
            let msg = NewMessage::new(&envelope, content, received_at);
            match store.commit(&msg).await {
                Ok(id) => Ok(Delivered::Stored(id)),
                Err(e) if e.is_unavailable() => Err(e),
                Err(e) => {
                    warn!("structured commit failed, recording as failed: {e}");
                    record_failure(store, envelope, received_at, e.to_string()).await
                }
            }
        }
        Err(e) => {
            warn!("could not extract message from {}: {}", envelope.sender_ip(), e.cause);
            record_failure(store, envelope, received_at, e.to_string()).await
        }
    }
}

async fn record_failure(
    store: &MailStore,
    envelope: InboundEnvelope,
    received_at: DateTime<Utc>,
    error_message: String,
) -> Result<Delivered, StoreError> {
    let failed = NewFailedMessage {
        received_at,
        sender_ip: envelope.sender_ip(),
        mail_from: Some(envelope.mail_from).filter(|s| !s.is_empty()),
        raw: envelope.raw,
        error_message,
    };
    store.commit_failure(&failed).await.map(Delivered::Recorded)
}

/// Map a delivery result onto the final DATA reply.
pub fn reply_for(result: &Result<Delivered, StoreError>) -> Reply {
    match result {
        Ok(Delivered::Stored(id)) => {
            Reply::new(250, format!("Message accepted for delivery (id {id})"))
        }
        Ok(Delivered::Recorded(id)) => Reply::new(
            250,
            format!("Message accepted for delivery (unparsed, ref {id})"),
        ),
        Err(e) if e.is_unavailable() => {
            error!("store unavailable, message deferred: {e}");
            Reply::store_unavailable()
        }
        Err(e) => {
            error!("message neither stored nor recorded, deferred: {e}");
            Reply::store_unavailable()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn replies_by_outcome() {
        assert_eq!(reply_for(&Ok(Delivered::Stored(7))).code, 250);
        assert_eq!(reply_for(&Ok(Delivered::Recorded(7))).code, 250);
        assert_eq!(reply_for(&Err(StoreError::from(sqlx::Error::PoolClosed))).code, 451);
        assert_eq!(reply_for(&Err(StoreError::from(sqlx::Error::RowNotFound))).code, 451);
    }
}
