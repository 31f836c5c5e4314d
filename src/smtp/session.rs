//! Per-connection SMTP state machine.
//!
//! The session only decides replies and tracks the envelope; reading the
//! socket and running delivery happen in the listener.

use super::reply::Reply;
use crate::{
    error::PolicyError, models::envelope::inbound_envelope::InboundEnvelope,
    policy::DomainPolicy,
};
use std::{net::SocketAddr, sync::Arc};
use tracing::{info, warn};

/// Upper bound on accepted recipients per transaction.
pub const MAX_RECIPIENTS: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// No transaction open.
    Connected,
    /// MAIL FROM accepted.
    SenderIdentified,
    /// At least one RCPT TO accepted.
    RecipientsAccepted,
    /// Message body received, delivery in progress.
    DataReceived,
    /// Delivery finished; the next transaction starts from `Connected`.
    Completed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Helo(String),
    Ehlo(String),
    /// Reverse path and the declared `SIZE=` parameter, if any.
    MailFrom(String, Option<usize>),
    RcptTo(String),
    Data,
    Rset,
    Noop,
    Quit,
    Vrfy,
    NotImplemented(String),
    Invalid(&'static str),
    Unknown(String),
}

impl Command {
    pub fn parse(line: &str) -> Command {
        let line = line.trim_end_matches(['\r', '\n']).trim_start();
        let (verb, rest) = match line.split_once(' ') {
            Some((v, r)) => (v, r.trim()),
            None => (line, ""),
        };
        match verb.to_ascii_uppercase().as_str() {
            "HELO" => Command::Helo(rest.to_string()),
            "EHLO" => Command::Ehlo(rest.to_string()),
            "MAIL" => match (path_arg(rest, "FROM:"), size_param(rest)) {
                (Some(path), Ok(size)) => Command::MailFrom(path, size),
                _ => Command::Invalid("MAIL FROM:<address> [SIZE=n]"),
            },
            "RCPT" => match path_arg(rest, "TO:") {
                Some(path) if !path.is_empty() => Command::RcptTo(path),
                _ => Command::Invalid("RCPT TO:<address>"),
            },
            "DATA" => Command::Data,
            "RSET" => Command::Rset,
            "NOOP" => Command::Noop,
            "QUIT" => Command::Quit,
            "VRFY" => Command::Vrfy,
            "AUTH" | "STARTTLS" | "EXPN" | "TURN" | "ETRN" => {
                Command::NotImplemented(verb.to_ascii_uppercase())
            }
            _ => Command::Unknown(verb.to_string()),
        }
    }
}

/// Extract the path from `FROM:<a@b> PARAMS` / `TO: a@b`.
fn path_arg(rest: &str, keyword: &str) -> Option<String> {
    let head = rest.get(..keyword.len())?;
    if !head.eq_ignore_ascii_case(keyword) {
        return None;
    }
    let arg = rest[keyword.len()..].trim_start();
    let path = if let Some(stripped) = arg.strip_prefix('<') {
        stripped.split_once('>')?.0
    } else {
        arg.split_whitespace().next().unwrap_or("")
    };
    Some(path.trim().to_string())
}

/// Value of a `SIZE=n` mail parameter. Other parameters are ignored.
fn size_param(rest: &str) -> Result<Option<usize>, std::num::ParseIntError> {
    for param in rest.split_whitespace() {
        if let Some((key, value)) = param.split_once('=') {
            if key.eq_ignore_ascii_case("SIZE") {
                return value.parse().map(Some);
            }
        }
    }
    Ok(None)
}

/// What the listener should do after a command.
#[derive(Debug, PartialEq, Eq)]
pub enum Step {
    Reply(Reply),
    /// Send the 354 reply and start reading the message body.
    Data(Reply),
    Quit(Reply),
}

pub struct Session {
    state: SessionState,
    peer: SocketAddr,
    hostname: String,
    policy: Arc<DomainPolicy>,
    max_message_size: usize,
    helo: Option<String>,
    mail_from: Option<String>,
    recipients: Vec<String>,
}

impl Session {
    pub fn new(
        peer: SocketAddr,
        hostname: impl Into<String>,
        policy: Arc<DomainPolicy>,
        max_message_size: usize,
    ) -> Self {
        Self {
            state: SessionState::Connected,
            peer,
            hostname: hostname.into(),
            policy,
            max_message_size,
            helo: None,
            mail_from: None,
            recipients: Vec::new(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn recipients(&self) -> &[String] {
        &self.recipients
    }

    pub fn greeting(&self) -> Reply {
        Reply::new(220, format!("{} ESMTP tempmail", self.hostname))
    }

    pub fn handle(&mut self, cmd: Command) -> Step {
        match cmd {
            Command::Helo(domain) | Command::Ehlo(domain) if domain.is_empty() => {
                Step::Reply(Reply::syntax("HELO/EHLO requires a domain"))
            }
            Command::Helo(domain) => {
                self.reset_transaction();
                let reply = Reply::new(250, format!("{} Hello {}", self.hostname, domain));
                self.helo = Some(domain);
                Step::Reply(reply)
            }
            Command::Ehlo(domain) => {
                self.reset_transaction();
                let reply = Reply::multiline(
                    250,
                    vec![
                        format!("{} Hello {}", self.hostname, domain),
                        format!("SIZE {}", self.max_message_size),
                        "8BITMIME".to_string(),
                    ],
                );
                self.helo = Some(domain);
                Step::Reply(reply)
            }
            Command::MailFrom(sender, size) => Step::Reply(self.mail_from(sender, size)),
            Command::RcptTo(address) => Step::Reply(self.rcpt_to(address)),
            Command::Data => match self.state {
                SessionState::RecipientsAccepted => Step::Data(Reply::start_data()),
                SessionState::SenderIdentified => {
                    Step::Reply(Reply::bad_sequence("need RCPT command"))
                }
                _ => Step::Reply(Reply::bad_sequence("need MAIL command")),
            },
            Command::Rset => {
                self.reset_transaction();
                Step::Reply(Reply::ok())
            }
            Command::Noop => Step::Reply(Reply::ok()),
            Command::Quit => Step::Quit(Reply::bye()),
            Command::Vrfy => Step::Reply(Reply::new(252, "Cannot VRFY user")),
            Command::NotImplemented(verb) => {
                Step::Reply(Reply::new(502, format!("{verb} not implemented")))
            }
            Command::Invalid(usage) => Step::Reply(Reply::syntax(usage)),
            Command::Unknown(verb) if verb.is_empty() => {
                Step::Reply(Reply::new(500, "Error: bad syntax"))
            }
            Command::Unknown(verb) => {
                Step::Reply(Reply::new(500, format!("Command \"{verb}\" not recognized")))
            }
        }
    }

    fn mail_from(&mut self, sender: String, size: Option<usize>) -> Reply {
        if self.state != SessionState::Connected {
            return Reply::bad_sequence("nested MAIL command");
        }
        if let Some(n) = size.filter(|n| *n > self.max_message_size) {
            warn!("sender {} declared SIZE={} over the limit", sender, n);
            return Reply::new(552, "Message size exceeds fixed maximum message size");
        }
        info!(
            "mail from <{}> (helo {})",
            sender,
            self.helo.as_deref().unwrap_or("-")
        );
        self.mail_from = Some(sender);
        self.state = SessionState::SenderIdentified;
        Reply::ok()
    }

    fn rcpt_to(&mut self, address: String) -> Reply {
        if !matches!(
            self.state,
            SessionState::SenderIdentified | SessionState::RecipientsAccepted
        ) {
            return Reply::bad_sequence("need MAIL before RCPT");
        }
        if self.recipients.len() >= MAX_RECIPIENTS {
            return Reply::new(452, "Too many recipients");
        }
        match self.policy.accepts(&address) {
            Ok(true) => {
                info!("accepted recipient {}", address);
                self.recipients.push(address);
                self.state = SessionState::RecipientsAccepted;
                Reply::ok()
            }
            Ok(false) => {
                warn!("rejected recipient {}: domain not allowed", address);
                Reply::new(550, "Domain not allowed")
            }
            Err(PolicyError::Malformed(addr)) => {
                warn!("rejected malformed recipient {:?}", addr);
                Reply::new(501, "Malformed recipient address")
            }
        }
    }

    /// Hand over the envelope once the body is read.
    pub fn take_envelope(&mut self, raw: Vec<u8>) -> InboundEnvelope {
        self.state = SessionState::DataReceived;
        InboundEnvelope {
            mail_from: self.mail_from.take().unwrap_or_default(),
            recipients: std::mem::take(&mut self.recipients),
            peer: self.peer,
            raw,
        }
    }

    /// Finish the current transaction and get ready for the next one.
    pub fn complete(&mut self) {
        self.state = SessionState::Completed;
        self.reset_transaction();
    }

    pub fn reset_transaction(&mut self) {
        self.mail_from = None;
        self.recipients.clear();
        self.state = SessionState::Connected;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session(entries: &[&str], accept_all: bool) -> Session {
        let policy = DomainPolicy::new(entries.iter().copied(), accept_all);
        Session::new(
            "192.0.2.7:40000".parse().unwrap(),
            "mx.test",
            Arc::new(policy),
            1024,
        )
    }

    fn code(step: Step) -> u16 {
        match step {
            Step::Reply(r) | Step::Data(r) | Step::Quit(r) => r.code,
        }
    }

    fn send(s: &mut Session, line: &str) -> u16 {
        code(s.handle(Command::parse(line)))
    }

    #[test]
    fn parses_paths() {
        assert_eq!(
            Command::parse("MAIL FROM:<a@b.c> SIZE=100\r\n"),
            Command::MailFrom("a@b.c".into(), Some(100))
        );
        assert_eq!(
            Command::parse("mail from: a@b.c BODY=8BITMIME"),
            Command::MailFrom("a@b.c".into(), None)
        );
        assert_eq!(Command::parse("MAIL FROM:<>"), Command::MailFrom(String::new(), None));
        assert!(matches!(Command::parse("MAIL FROM:<a@b.c> SIZE=lots"), Command::Invalid(_)));
        assert_eq!(Command::parse("RCPT TO:<x@y.z>"), Command::RcptTo("x@y.z".into()));
        assert!(matches!(Command::parse("RCPT TO:<>"), Command::Invalid(_)));
        assert!(matches!(Command::parse("MAIL <a@b>"), Command::Invalid(_)));
        assert_eq!(Command::parse("data"), Command::Data);
        assert_eq!(Command::parse("STARTTLS"), Command::NotImplemented("STARTTLS".into()));
    }

    #[test]
    fn full_transaction_walks_states() {
        let mut s = session(&["example.com"], false);
        assert_eq!(s.state(), SessionState::Connected);
        assert_eq!(send(&mut s, "EHLO client"), 250);
        assert_eq!(send(&mut s, "MAIL FROM:<from@anywhere.net>"), 250);
        assert_eq!(s.state(), SessionState::SenderIdentified);
        assert_eq!(send(&mut s, "RCPT TO:<user@example.com>"), 250);
        assert_eq!(send(&mut s, "RCPT TO:<second@example.com>"), 250);
        assert_eq!(s.state(), SessionState::RecipientsAccepted);
        assert_eq!(send(&mut s, "DATA"), 354);

        let env = s.take_envelope(b"Subject: x\r\n\r\nhi\r\n".to_vec());
        assert_eq!(s.state(), SessionState::DataReceived);
        assert_eq!(env.mail_from, "from@anywhere.net");
        assert_eq!(env.recipients, vec!["user@example.com", "second@example.com"]);
        assert_eq!(env.sender_ip(), "192.0.2.7");

        s.complete();
        assert_eq!(s.state(), SessionState::Connected);
        assert!(s.recipients().is_empty());
        // a new transaction on the same connection
        assert_eq!(send(&mut s, "MAIL FROM:<again@anywhere.net>"), 250);
    }

    #[test]
    fn rejected_recipient_keeps_session_open() {
        let mut s = session(&["example.com"], false);
        send(&mut s, "MAIL FROM:<a@b.c>");
        assert_eq!(send(&mut s, "RCPT TO:<user@other.com>"), 550);
        assert_eq!(s.state(), SessionState::SenderIdentified);
        assert_eq!(send(&mut s, "DATA"), 503);
        assert_eq!(send(&mut s, "RCPT TO:<user@example.com>"), 250);
        assert_eq!(send(&mut s, "DATA"), 354);
        assert_eq!(s.recipients(), ["user@example.com"]);
    }

    #[test]
    fn override_accepts_any_domain() {
        let mut s = session(&["example.com"], true);
        send(&mut s, "MAIL FROM:<a@b.c>");
        assert_eq!(send(&mut s, "RCPT TO:<user@example.com>"), 250);
        assert_eq!(send(&mut s, "RCPT TO:<user@other.com>"), 250);
    }

    #[test]
    fn malformed_recipient_is_syntax_error() {
        let mut s = session(&[], true);
        send(&mut s, "MAIL FROM:<a@b.c>");
        assert_eq!(send(&mut s, "RCPT TO:<no-at-sign>"), 501);
        assert!(s.recipients().is_empty());
    }

    #[test]
    fn sequencing_errors() {
        let mut s = session(&["example.com"], false);
        assert_eq!(send(&mut s, "DATA"), 503);
        assert_eq!(send(&mut s, "RCPT TO:<user@example.com>"), 503);
        assert_eq!(s.state(), SessionState::Connected);
        send(&mut s, "MAIL FROM:<a@b.c>");
        assert_eq!(send(&mut s, "MAIL FROM:<a@b.c>"), 503);
        assert_eq!(send(&mut s, "RSET"), 250);
        assert_eq!(s.state(), SessionState::Connected);
    }

    #[test]
    fn misc_commands() {
        let mut s = session(&[], false);
        assert_eq!(send(&mut s, "HELO"), 501);
        assert_eq!(send(&mut s, "NOOP"), 250);
        assert_eq!(send(&mut s, "VRFY user"), 252);
        assert_eq!(send(&mut s, "AUTH PLAIN abc"), 502);
        assert_eq!(send(&mut s, "FOO"), 500);
        assert_eq!(send(&mut s, ""), 500);
        assert!(matches!(s.handle(Command::Quit), Step::Quit(_)));
    }

    #[test]
    fn declared_size_over_limit_is_refused() {
        let mut s = session(&[], true);
        assert_eq!(send(&mut s, "EHLO client"), 250);
        assert_eq!(send(&mut s, "MAIL FROM:<a@b.c> SIZE=2048"), 552);
        assert_eq!(s.state(), SessionState::Connected);
        assert_eq!(send(&mut s, "MAIL FROM:<a@b.c> SIZE=1024"), 250);
        assert_eq!(s.state(), SessionState::SenderIdentified);
    }

    #[test]
    fn recipient_limit() {
        let mut s = session(&[], true);
        send(&mut s, "MAIL FROM:<a@b.c>");
        for i in 0..MAX_RECIPIENTS {
            assert_eq!(send(&mut s, &format!("RCPT TO:<u{i}@x.org>")), 250);
        }
        assert_eq!(send(&mut s, "RCPT TO:<one-more@x.org>"), 452);
    }
}
