//! Application setup and runtime.

use crate::{
  config::{Config, SmtpConfig},
  db::{self, store::MailStore},
  policy::DomainPolicy,
  smtp,
};
use std::sync::Arc;
use tracing::info;

/// Shared application state, cloned into every connection task.
#[derive(Clone)]
pub struct AppState {
  pub store: MailStore,
  pub policy: Arc<DomainPolicy>,
  pub smtp: Arc<SmtpConfig>,
}

impl AppState {
  pub fn new(store: MailStore, policy: DomainPolicy, smtp: SmtpConfig) -> Self {
    Self {
      store,
      policy: Arc::new(policy),
      smtp: Arc::new(smtp),
    }
  }
}

/// Open (and migrate) the configured store.
pub async fn open_store(config: &Config) -> Result<MailStore, sqlx::Error> {
  let pool = db::connect(&config.store.url, config.store.max_connections).await?;
  db::run_migrations(&pool).await?;
  info!("database ready: {}", config.store.url);
  Ok(MailStore::new(pool))
}

/// Start the SMTP listener with the given configuration.
pub async fn run(config: Config) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
  crate::util::init_tracing();

  let store = open_store(&config).await?;
  let policy = config.domain_policy();
  if policy.accept_all() {
    info!("accepting mail for all domains");
  } else {
    info!("allowed domains: {}", config.allowed_domains.join(", "));
  }

  let state = AppState::new(store, policy, config.smtp.clone());
  smtp::start_smtp(state).await
}
