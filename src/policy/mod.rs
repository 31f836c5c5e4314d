//! Recipient domain allow-list.
//!
//! Entries are either exact domains (`example.com`) or suffix wildcards
//! (`*.example.com`). Matching is a plain case-insensitive suffix test, so
//! `*.example.com` also covers `a.b.example.com`.

use crate::error::PolicyError;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DomainRule {
  Exact(String),
  Suffix(String),
}

impl DomainRule {
  /// Parse a configured entry. A leading `*` makes it a suffix rule.
  pub fn parse(entry: &str) -> Option<Self> {
    let entry = entry.trim().to_ascii_lowercase();
    if entry.is_empty() {
      return None;
    }
    match entry.strip_prefix('*') {
      Some(suffix) => Some(DomainRule::Suffix(suffix.to_string())),
      None => Some(DomainRule::Exact(entry)),
    }
  }

  fn matches(&self, domain: &str) -> bool {
    match self {
      DomainRule::Exact(d) => domain == d,
      DomainRule::Suffix(s) => domain.ends_with(s.as_str()),
    }
  }
}

/// Ordered allow-list plus the accept-everything override.
#[derive(Debug, Clone, Default)]
pub struct DomainPolicy {
  rules: Vec<DomainRule>,
  accept_all: bool,
}

impl DomainPolicy {
  pub fn new<I, S>(entries: I, accept_all: bool) -> Self
  where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
  {
    let rules = entries
      .into_iter()
      .filter_map(|e| DomainRule::parse(e.as_ref()))
      .collect();
    Self { rules, accept_all }
  }

  pub fn accept_all(&self) -> bool {
    self.accept_all
  }

  /// Decide whether mail for `address` is accepted.
  ///
  /// Addresses are checked for `local@domain` shape before the override is
  /// consulted, so a malformed envelope is always reported as such.
  pub fn accepts(&self, address: &str) -> Result<bool, PolicyError> {
    let domain = domain_of(address)?;
    if self.accept_all {
      return Ok(true);
    }
    Ok(self.rules.iter().any(|r| r.matches(&domain)))
  }
}

/// Lower-cased domain part of `local@domain`.
pub fn domain_of(address: &str) -> Result<String, PolicyError> {
  let address = address.trim();
  match address.rsplit_once('@') {
    Some((local, domain)) if !local.is_empty() && !domain.is_empty() => {
      Ok(domain.to_ascii_lowercase())
    }
    _ => Err(PolicyError::Malformed(address.to_string())),
  }
}
