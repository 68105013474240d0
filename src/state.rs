use crate::auth::{repo::PgUserStore, services::AuthService};
use crate::config::AppConfig;
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
    pub auth: Arc<AuthService>,
}

impl AppState {
    /// Connect to PostgreSQL and build the service from the environment.
    pub async fn init() -> anyhow::Result<(Self, sqlx::PgPool)> {
        let config = AppConfig::from_env()?;

        let db = sqlx::postgres::PgPoolOptions::new()
            .max_connections(10)
            .acquire_timeout(config.store_timeout())
            .connect(&config.database_url)
            .await?;

        let store = Arc::new(PgUserStore::new(db.clone()));
        let auth = Arc::new(AuthService::from_config(store, &config)?);
        Ok((Self { auth }, db))
    }

    /// In-memory state with cheap hashing.
    #[cfg(test)]
    pub(crate) fn fake(store: crate::auth::memory::MemoryUserStore) -> Self {
        let auth = crate::auth::services::test_service(Arc::new(store));
        Self {
            auth: Arc::new(auth),
        }
    }
}
