//! tempmail library entrypoint.
//!
//! Modules:
//! - `app`: startup and shared state
//! - `cli`: command line for the listener and store queries
//! - `config`: environment configuration
//! - `db`: migrations and the message store
//! - `error`: error types
//! - `mime`: MIME content extraction
//! - `models`: typed records used across layers
//! - `policy`: recipient domain allow-list
//! - `smtp`: inbound SMTP listener and session state machine
//! - `util`: tracing and display helpers

pub mod app;
pub mod cli;
pub mod config;
pub mod db;
pub mod error;
pub mod mime;
pub mod models;
pub mod policy;
pub mod smtp;
pub mod util;
