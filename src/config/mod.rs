//! Process configuration, read once from the environment at startup.

use crate::{error::ConfigError, policy::DomainPolicy};
use std::{net::SocketAddr, time::Duration};

pub const DEFAULT_SMTP_ADDR: &str = "127.0.0.1:2525";
pub const DEFAULT_DATABASE: &str = "sqlite://tempmail.db";
pub const DEFAULT_ALLOWED_DOMAINS: &str = "example.com,test.com";
pub const DEFAULT_MAX_MESSAGE_SIZE: usize = 10 * 1024 * 1024;

/// SMTP listener settings.
#[derive(Debug, Clone)]
pub struct SmtpConfig {
    pub addr: SocketAddr,
    pub hostname: String,
    pub idle_timeout: Duration,
    pub max_message_size: usize,
}

impl Default for SmtpConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([127, 0, 0, 1], 2525)),
            hostname: "tempmail".to_string(),
            idle_timeout: Duration::from_secs(300),
            max_message_size: DEFAULT_MAX_MESSAGE_SIZE,
        }
    }
}

/// Database connection settings.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub url: String,
    pub max_connections: u32,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub smtp: SmtpConfig,
    pub store: StoreConfig,
    pub allowed_domains: Vec<String>,
    pub accept_all: bool,
}

impl Config {
    /// Build from `TEMPMAIL_*` variables, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let addr_raw = get("TEMPMAIL_SMTP_ADDR", DEFAULT_SMTP_ADDR);
        let addr = addr_raw.parse().map_err(|_| ConfigError::Invalid {
            key: "TEMPMAIL_SMTP_ADDR",
            value: addr_raw.clone(),
        })?;

        let defaults = SmtpConfig::default();
        let smtp = SmtpConfig {
            addr,
            hostname: get("TEMPMAIL_HOSTNAME", &defaults.hostname),
            idle_timeout: Duration::from_secs(parse_num(
                "TEMPMAIL_IDLE_TIMEOUT_SECS",
                lookup("TEMPMAIL_IDLE_TIMEOUT_SECS"),
                defaults.idle_timeout.as_secs(),
            )?),
            max_message_size: parse_num(
                "TEMPMAIL_MAX_MESSAGE_SIZE",
                lookup("TEMPMAIL_MAX_MESSAGE_SIZE"),
                defaults.max_message_size,
            )?,
        };

        let store = StoreConfig {
            url: get("TEMPMAIL_DATABASE", DEFAULT_DATABASE),
            max_connections: parse_num(
                "TEMPMAIL_DB_MAX_CONNECTIONS",
                lookup("TEMPMAIL_DB_MAX_CONNECTIONS"),
                5,
            )?,
        };

        let allowed_domains = get("TEMPMAIL_ALLOWED_DOMAINS", DEFAULT_ALLOWED_DOMAINS)
            .split(',')
            .map(|d| d.trim().to_string())
            .filter(|d| !d.is_empty())
            .collect();

        let accept_all = match lookup("TEMPMAIL_ACCEPT_ALL") {
            None => false,
            Some(v) => parse_bool(&v).ok_or(ConfigError::Invalid {
                key: "TEMPMAIL_ACCEPT_ALL",
                value: v,
            })?,
        };

        Ok(Config {
            smtp,
            store,
            allowed_domains,
            accept_all,
        })
    }

    pub fn domain_policy(&self) -> DomainPolicy {
        DomainPolicy::new(&self.allowed_domains, self.accept_all)
    }
}

fn parse_num<T: std::str::FromStr>(
    key: &'static str,
    value: Option<String>,
    default: T,
) -> Result<T, ConfigError> {
    match value {
        None => Ok(default),
        Some(v) => v
            .trim()
            .parse()
            .map_err(|_| ConfigError::Invalid { key, value: v }),
    }
}

fn parse_bool(v: &str) -> Option<bool> {
    match v.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" | "" => Some(false),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn config(vars: &[(&str, &str)]) -> Result<Config, ConfigError> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|k| map.get(k).cloned())
    }

    #[test]
    fn defaults_apply() {
        let c = config(&[]).unwrap();
        assert_eq!(c.smtp.addr.to_string(), DEFAULT_SMTP_ADDR);
        assert_eq!(c.store.url, DEFAULT_DATABASE);
        assert_eq!(c.store.max_connections, 5);
        assert_eq!(c.allowed_domains, vec!["example.com", "test.com"]);
        assert!(!c.accept_all);
        assert_eq!(c.smtp.max_message_size, DEFAULT_MAX_MESSAGE_SIZE);
    }

    #[test]
    fn overrides_are_parsed() {
        let c = config(&[
            ("TEMPMAIL_SMTP_ADDR", "0.0.0.0:25"),
            ("TEMPMAIL_ALLOWED_DOMAINS", " a.com, *.b.org ,,"),
            ("TEMPMAIL_ACCEPT_ALL", "Yes"),
            ("TEMPMAIL_IDLE_TIMEOUT_SECS", "30"),
        ])
        .unwrap();
        assert_eq!(c.smtp.addr.port(), 25);
        assert_eq!(c.allowed_domains, vec!["a.com", "*.b.org"]);
        assert!(c.accept_all);
        assert_eq!(c.smtp.idle_timeout, Duration::from_secs(30));
        assert!(c.domain_policy().accept_all());
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(config(&[("TEMPMAIL_SMTP_ADDR", "nowhere")]).is_err());
        assert!(config(&[("TEMPMAIL_ACCEPT_ALL", "maybe")]).is_err());
        let err = config(&[("TEMPMAIL_MAX_MESSAGE_SIZE", "big")]).unwrap_err();
        assert!(err.to_string().contains("TEMPMAIL_MAX_MESSAGE_SIZE"));
    }
}
