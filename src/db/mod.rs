//! Database helpers: connection, migrations and path handling.

pub mod store;

use sqlx::{
    SqlitePool,
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
};
use std::{path::Path, str::FromStr};

/// Open a pool with foreign keys enforced on every connection.
pub async fn connect(db_url: &str, max_connections: u32) -> Result<SqlitePool, sqlx::Error> {
    let db_url = ensure_sqlite_path(db_url);
    let options = SqliteConnectOptions::from_str(&db_url)?
        .create_if_missing(true)
        .foreign_keys(true);
    SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await
}

/// Run SQLite migrations to create tables if absent.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), sqlx::Error> {
    sqlx::query(
        r#"CREATE TABLE IF NOT EXISTS messages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            timestamp REAL NOT NULL,
            received_at TEXT NOT NULL,
            sender_ip TEXT NULL,
            mail_from TEXT NOT NULL,
            subject TEXT NULL,
            text_body TEXT NULL,
            html_body TEXT NULL,
            raw_content BLOB NULL,
            raw_size INTEGER NOT NULL DEFAULT 0
        )"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"CREATE TABLE IF NOT EXISTS recipients (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            message_id INTEGER NOT NULL REFERENCES messages (id) ON DELETE CASCADE,
            address TEXT NOT NULL
        )"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"CREATE TABLE IF NOT EXISTS attachments (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            message_id INTEGER NOT NULL REFERENCES messages (id) ON DELETE CASCADE,
            filename TEXT NOT NULL,
            content_type TEXT NULL,
            size INTEGER NOT NULL DEFAULT 0
        )"#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        r#"CREATE TABLE IF NOT EXISTS failed_messages (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            timestamp REAL NOT NULL,
            received_at TEXT NOT NULL,
            sender_ip TEXT NULL,
            mail_from TEXT NULL,
            raw_content BLOB NULL,
            error_message TEXT NULL
        )"#,
    )
    .execute(pool)
    .await?;

    for index in [
        "CREATE INDEX IF NOT EXISTS idx_messages_timestamp ON messages (timestamp)",
        "CREATE INDEX IF NOT EXISTS idx_messages_mail_from ON messages (mail_from)",
        "CREATE INDEX IF NOT EXISTS idx_recipients_message ON recipients (message_id)",
        "CREATE INDEX IF NOT EXISTS idx_recipients_address ON recipients (address)",
        "CREATE INDEX IF NOT EXISTS idx_attachments_message ON attachments (message_id)",
        "CREATE INDEX IF NOT EXISTS idx_failed_timestamp ON failed_messages (timestamp)",
    ] {
        sqlx::query(index).execute(pool).await?;
    }
    Ok(())
}

/// Ensure the parent folder of a SQLite database file exists.
pub fn ensure_sqlite_path(db_url: &str) -> String {
    if !db_url.starts_with("sqlite:") {
        return db_url.to_string();
    }
    let path_part = db_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("sqlite:");
    if path_part.is_empty() || path_part.contains(":memory:") {
        return db_url.to_string();
    }
    let path_only = match path_part.split_once('?') {
        Some((p, _)) => p,
        None => path_part,
    };
    if let Some(parent) = Path::new(path_only).parent() {
        if !parent.as_os_str().is_empty() {
            let _ = std::fs::create_dir_all(parent);
        }
    }
    db_url.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn memory_urls_pass_through() {
        assert_eq!(ensure_sqlite_path("sqlite://:memory:"), "sqlite://:memory:");
        assert_eq!(ensure_sqlite_path("sqlite::memory:"), "sqlite::memory:");
    }

    #[test]
    fn creates_parent_directory() {
        let dir = std::env::temp_dir().join(format!("tempmail-{}", uuid::Uuid::new_v4()));
        let url = format!("sqlite://{}/nested/mail.db?mode=rwc", dir.display());
        assert_eq!(ensure_sqlite_path(&url), url);
        assert!(dir.join("nested").is_dir());
        let _ = std::fs::remove_dir_all(dir);
    }
}
