//! Error types shared across the policy, MIME and storage layers.

use thiserror::Error;

/// Recipient address could not be evaluated against the domain policy.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PolicyError {
    #[error("malformed address (expected local@domain): {0}")]
    Malformed(String),
}

/// MIME structure could not be parsed.
///
/// Carries the untouched raw bytes so the message can still be recorded as failed.
#[derive(Error, Debug, Clone)]
#[error("message extraction failed: {cause}")]
pub struct ExtractionError {
    pub cause: String,
    pub raw: Vec<u8>,
}

impl ExtractionError {
    pub fn new(cause: impl Into<String>, raw: &[u8]) -> Self {
        Self {
            cause: cause.into(),
            raw: raw.to_vec(),
        }
    }
}

/// Persistence failures, split by whether the store itself is reachable.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store unavailable: {0}")]
    Unavailable(#[source] sqlx::Error),

    #[error("store error: {0}")]
    Query(#[source] sqlx::Error),
}

impl StoreError {
    pub fn is_unavailable(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

/// SQLite primary result codes that mean the database cannot take writes right
/// now: BUSY, LOCKED, READONLY, IOERR, FULL, CANTOPEN.
const UNAVAILABLE_SQLITE_CODES: [i32; 6] = [5, 6, 8, 10, 13, 14];

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        if store_unreachable(&e) {
            StoreError::Unavailable(e)
        } else {
            StoreError::Query(e)
        }
    }
}

fn store_unreachable(e: &sqlx::Error) -> bool {
    match e {
        sqlx::Error::PoolClosed
        | sqlx::Error::PoolTimedOut
        | sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::WorkerCrashed => true,
        // extended codes carry the primary code in the low byte
        sqlx::Error::Database(db) => db
            .code()
            .and_then(|code| code.parse::<i32>().ok())
            .is_some_and(|code| UNAVAILABLE_SQLITE_CODES.contains(&(code & 0xff))),
        _ => false,
    }
}

/// Invalid value in the process environment.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value}")]
    Invalid { key: &'static str, value: String },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pool_closed_is_unavailable() {
        let err = StoreError::from(sqlx::Error::PoolClosed);
        assert!(err.is_unavailable());
        assert!(err.to_string().starts_with("store unavailable"));
    }

    #[test]
    fn row_not_found_is_query_error() {
        let err = StoreError::from(sqlx::Error::RowNotFound);
        assert!(!err.is_unavailable());
    }

    #[tokio::test]
    async fn sql_error_is_query_error() {
        let pool = crate::db::connect("sqlite://:memory:", 1).await.unwrap();
        let err = sqlx::query("SELECT * FROM no_such_table")
            .execute(&pool)
            .await
            .unwrap_err();
        assert!(!StoreError::from(err).is_unavailable());
    }
}
