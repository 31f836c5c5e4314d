//! Typed records used across the SMTP, MIME and storage layers.

pub mod attachment;
pub mod content;
pub mod email;
pub mod envelope;
pub mod failed;
pub mod stats;
