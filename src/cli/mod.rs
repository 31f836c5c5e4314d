//! Command line: run the listener or query the message store.

use crate::{
  app,
  config::Config,
  db::store::{MailStore, SearchField},
  models::{
    email::{message_summary::MessageSummary, stored_message::StoredMessage},
    failed::failed_message::FailedMessageRow,
    stats::store_stats::StoreStats,
  },
  util::{ellipsize, truncate_chars},
};
use chrono::{DateTime, Local, TimeZone, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use std::{fmt::Write as _, path::PathBuf};

type CliResult = Result<(), Box<dyn std::error::Error + Send + Sync>>;

const SHOW_TEXT_LIMIT: usize = 1000;
const SHOW_HTML_LIMIT: usize = 500;

#[derive(Debug, Parser)]
#[command(name = "tempmail", version, about = "Inbound SMTP sink and message store")]
pub struct Cli {
  /// Database URL
  #[arg(long, global = true, env = "TEMPMAIL_DATABASE")]
  pub database: Option<String>,

  #[command(subcommand)]
  pub command: Option<Commands>,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
  /// Run the SMTP listener (default)
  Serve,
  /// List stored messages, newest first
  List {
    /// Only messages delivered to this address
    #[arg(short, long)]
    recipient: Option<String>,
    #[arg(short, long, default_value_t = 20)]
    limit: i64,
    #[arg(short, long, default_value_t = 0)]
    offset: i64,
  },
  /// Show one message in full
  Show { id: i64 },
  /// Substring search
  Search {
    query: String,
    #[arg(short, long, value_enum, default_value_t = SearchField::All)]
    field: SearchField,
  },
  /// Write a message to disk as JSON or as raw EML
  Export {
    id: i64,
    #[arg(short, long, value_enum, default_value_t = ExportFormat::Json)]
    format: ExportFormat,
    /// Output path (default: email_<id>_<timestamp>.<ext>)
    #[arg(short = 'O', long)]
    output: Option<PathBuf>,
  },
  /// Aggregate counts
  Stats,
  /// Messages that could not be parsed or stored structurally
  Failed {
    #[arg(short, long, default_value_t = 20)]
    limit: i64,
  },
  /// Delete a message with its recipients and attachments
  Delete { id: i64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum ExportFormat {
  Json,
  Eml,
}

impl ExportFormat {
  fn extension(self) -> &'static str {
    match self {
      ExportFormat::Json => "json",
      ExportFormat::Eml => "eml",
    }
  }
}

pub async fn run(cli: Cli, mut config: Config) -> CliResult {
  if let Some(url) = cli.database {
    config.store.url = url;
  }
  let command = cli.command.unwrap_or(Commands::Serve);
  if let Commands::Serve = command {
    return app::run(config).await;
  }

  let store = app::open_store(&config).await?;
  let out = execute(&store, command).await?;
  print!("{out}");
  Ok(())
}

/// Run a query command and return what it prints.
pub async fn execute(
  store: &MailStore,
  command: Commands,
) -> Result<String, Box<dyn std::error::Error + Send + Sync>> {
  let mut out = String::new();
  match command {
    Commands::Serve => return Err("serve is not a query command".into()),
    Commands::List {
      recipient,
      limit,
      offset,
    } => {
      let rows = match &recipient {
        Some(r) => store.messages_by_recipient(r, limit, offset).await?,
        None => store.list_messages(limit, offset).await?,
      };
      if let Some(r) = &recipient {
        writeln!(out, "recipient: {r}")?;
      }
      out.push_str(&render_table(&rows));
      writeln!(out, "\n{} messages (offset {})", rows.len(), offset)?;
    }
    Commands::Show { id } => match store.get_message(id).await? {
      Some(m) => out.push_str(&render_message(&m)),
      None => writeln!(out, "message {id} not found")?,
    },
    Commands::Search { query, field } => {
      let rows = store.search(&query, field).await?;
      if rows.is_empty() {
        writeln!(out, "no messages match '{query}'")?;
      } else {
        writeln!(out, "results for '{query}' (field: {field:?})")?;
        out.push_str(&render_table(&rows));
        writeln!(out, "\n{} matching messages", rows.len())?;
      }
    }
    Commands::Export { id, format, output } => {
      let Some(message) = store.get_message(id).await? else {
        writeln!(out, "message {id} not found")?;
        return Ok(out);
      };
      let path = output.unwrap_or_else(|| {
        PathBuf::from(format!(
          "email_{}_{}.{}",
          id,
          message.timestamp as i64,
          format.extension()
        ))
      });
      match format {
        ExportFormat::Json => {
          tokio::fs::write(&path, serde_json::to_string_pretty(&message)?).await?;
        }
        ExportFormat::Eml => match store.raw_content(id).await? {
          Some(raw) => tokio::fs::write(&path, raw).await?,
          None => {
            writeln!(out, "message {id} has no raw content")?;
            return Ok(out);
          }
        },
      }
      writeln!(out, "exported message {} to {}", id, path.display())?;
    }
    Commands::Stats => out.push_str(&render_stats(&store.stats().await?)),
    Commands::Failed { limit } => {
      let rows = store.list_failed(limit).await?;
      if rows.is_empty() {
        writeln!(out, "no failed messages")?;
      }
      for row in &rows {
        out.push_str(&render_failed(row));
      }
    }
    Commands::Delete { id } => {
      if store.delete_message(id).await? {
        writeln!(out, "deleted message {id}")?;
      } else {
        writeln!(out, "message {id} not found")?;
      }
    }
  }
  Ok(out)
}

fn local_time(t: &DateTime<Utc>, fmt: &str) -> String {
  t.with_timezone(&Local).format(fmt).to_string()
}

pub fn render_table(rows: &[MessageSummary]) -> String {
  let mut out = format!(
    "{:<6} | {:<16} | {:<32} | {:<4} | subject\n{}\n",
    "id",
    "received",
    "from",
    "att",
    "-".repeat(100)
  );
  for m in rows {
    let subject = m.subject.as_deref().unwrap_or("(no subject)");
    out.push_str(&format!(
      "{:>6} | {:<16} | {:<32} | {:>4} | {}\n",
      m.id,
      local_time(&m.received_at, "%Y-%m-%d %H:%M"),
      ellipsize(&m.mail_from, 30),
      m.attachment_count,
      ellipsize(subject, 50)
    ));
  }
  out
}

pub fn render_message(m: &StoredMessage) -> String {
  let mut out = String::new();
  let rule = "=".repeat(80);
  let _ = writeln!(out, "{rule}\nmessage {}\n{rule}", m.id);
  let _ = writeln!(out, "received:   {}", local_time(&m.received_at, "%Y-%m-%d %H:%M:%S"));
  let _ = writeln!(out, "from:       {}", m.from);
  let _ = writeln!(out, "to:         {}", m.to.join(", "));
  let _ = writeln!(
    out,
    "subject:    {}",
    m.subject.as_deref().unwrap_or("(no subject)")
  );
  let _ = writeln!(out, "sender ip:  {}", m.sender_ip.as_deref().unwrap_or("unknown"));
  let _ = writeln!(out, "size:       {} bytes", m.raw_size);
  if !m.attachments.is_empty() {
    let _ = writeln!(out, "attachments: {}", m.attachments.len());
    for a in &m.attachments {
      let _ = writeln!(
        out,
        "  - {} ({} bytes, {})",
        a.filename,
        a.size,
        a.content_type.as_deref().unwrap_or("unknown")
      );
    }
  }
  let _ = writeln!(out, "\n--- plain text ---");
  match m.plaintext_body.as_deref() {
    Some(text) => {
      let _ = writeln!(out, "{}", truncate_chars(text, SHOW_TEXT_LIMIT));
    }
    None => {
      let _ = writeln!(out, "(no plain text)");
    }
  }
  if let Some(html) = m.html_body.as_deref() {
    let _ = writeln!(out, "\n--- html ---");
    let _ = writeln!(out, "{}", truncate_chars(html, SHOW_HTML_LIMIT));
  }
  let _ = writeln!(out, "{rule}");
  out
}

pub fn render_stats(s: &StoreStats) -> String {
  let mut out = String::new();
  let _ = writeln!(out, "messages:          {}", s.total_messages);
  let _ = writeln!(out, "failed messages:   {}", s.failed_messages);
  let _ = writeln!(out, "attachments:       {}", s.total_attachments);
  let _ = writeln!(out, "unique recipients: {}", s.unique_recipients);
  if let Some(latest) = s
    .latest_timestamp
    .and_then(|ts| Local.timestamp_opt(ts as i64, 0).single())
  {
    let _ = writeln!(out, "latest message:    {}", latest.format("%Y-%m-%d %H:%M:%S"));
  }
  let _ = writeln!(out, "received today:    {}", s.received_today);
  out
}

fn render_failed(f: &FailedMessageRow) -> String {
  format!(
    "{:>6} | {} | {} | {} | {} bytes | {}\n",
    f.id,
    local_time(&f.received_at, "%Y-%m-%d %H:%M"),
    f.sender_ip.as_deref().unwrap_or("unknown"),
    f.mail_from.as_deref().unwrap_or("(unknown sender)"),
    f.raw_size,
    f.error_message.as_deref().unwrap_or("")
  )
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::models::attachment::attachment_row::AttachmentRow;

  #[test]
  fn parses_subcommands() {
    let cli = Cli::try_parse_from(["tempmail", "list", "-r", "a@example.com", "-l", "5"]).unwrap();
    match cli.command {
      Some(Commands::List {
        recipient, limit, ..
      }) => {
        assert_eq!(recipient.as_deref(), Some("a@example.com"));
        assert_eq!(limit, 5);
      }
      other => panic!("unexpected {other:?}"),
    }

    let cli = Cli::try_parse_from(["tempmail", "search", "hello", "--field", "subject"]).unwrap();
    assert!(matches!(
      cli.command,
      Some(Commands::Search {
        field: SearchField::Subject,
        ..
      })
    ));

    let cli = Cli::try_parse_from(["tempmail", "--database", "sqlite::memory:"]).unwrap();
    assert!(cli.command.is_none());
    assert_eq!(cli.database.as_deref(), Some("sqlite::memory:"));

    assert!(Cli::try_parse_from(["tempmail", "export", "1", "--format", "pdf"]).is_err());
  }

  fn stored(text: &str) -> StoredMessage {
    StoredMessage {
      id: 3,
      timestamp: 1_700_000_000.0,
      received_at: Utc.timestamp_opt(1_700_000_000, 0).unwrap(),
      sender_ip: Some("192.0.2.1".into()),
      from: "dev@example.test".into(),
      to: vec!["a@example.com".into(), "b@example.com".into()],
      subject: None,
      plaintext_body: Some(text.into()),
      html_body: None,
      attachments: vec![AttachmentRow {
        id: 1,
        message_id: 3,
        filename: "a.txt".into(),
        content_type: Some("text/csv".into()),
        size: 6,
      }],
      raw_size: 120,
    }
  }

  #[test]
  fn show_truncates_long_text() {
    let out = render_message(&stored(&"x".repeat(SHOW_TEXT_LIMIT + 1)));
    assert!(out.contains("a@example.com, b@example.com"));
    assert!(out.contains("(no subject)"));
    assert!(out.contains("a.txt (6 bytes, text/csv)"));
    assert!(out.contains(crate::util::TRUNCATION_MARKER));
  }

  #[test]
  fn show_keeps_short_text() {
    let out = render_message(&stored("short body"));
    assert!(out.contains("short body"));
    assert!(!out.contains(crate::util::TRUNCATION_MARKER));
  }
}
