//! Envelope of a single SMTP transaction.

use std::net::SocketAddr;

#[derive(Debug, Clone)]
pub struct InboundEnvelope {
  pub mail_from: String,
  pub recipients: Vec<String>,
  pub peer: SocketAddr,
  pub raw: Vec<u8>,
}

impl InboundEnvelope {
  pub fn sender_ip(&self) -> String {
    self.peer.ip().to_string()
  }
}
