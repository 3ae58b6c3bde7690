use crate::auth::repo::{CredentialStore, SqliteCredentialStore};
use crate::auth::services::{AccountService, ResetPolicy};
use crate::clock::{Clock, SystemClock};
use crate::config::AppConfig;
use crate::contacts::services::ContactService;
use crate::db;
use sqlx::SqlitePool;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub db: SqlitePool,
    pub config: Arc<AppConfig>,
    pub accounts: AccountService,
    pub contacts: ContactService,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);
        let db = db::connect(&config.database_url).await?;
        Ok(Self::from_parts(db, config, Arc::new(SystemClock)))
    }

    pub fn from_parts(db: SqlitePool, config: Arc<AppConfig>, clock: Arc<dyn Clock>) -> Self {
        let store = Arc::new(SqliteCredentialStore::new(db.clone())) as Arc<dyn CredentialStore>;
        let accounts = AccountService::new(store, clock.clone(), ResetPolicy::from(&config.reset));
        let contacts = ContactService::new(db.clone(), clock);
        Self {
            db,
            config,
            accounts,
            contacts,
        }
    }

    /// In-memory database with a fixed test configuration.
    #[cfg(test)]
    pub async fn fake(expose_reset_links: bool) -> Self {
        let config = Arc::new(AppConfig {
            database_url: "sqlite::memory:".into(),
            session: crate::config::SessionConfig {
                secret: "test".into(),
                issuer: "test-issuer".into(),
                audience: "test-aud".into(),
                ttl_minutes: 5,
            },
            reset: crate::config::ResetConfig {
                ttl_hours: 24,
                enforce_password_rules: true,
                expose_links: expose_reset_links,
                public_base_url: "http://shop.test".into(),
            },
        });
        Self::from_parts(db::memory_pool().await, config, Arc::new(SystemClock))
    }
}
