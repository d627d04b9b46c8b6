use std::sync::Arc;
use std::time::Duration;

use sqlx::{postgres::PgPoolOptions, PgPool};
use thiserror::Error;
use tracing::info;

use crate::config::{DatabaseConfig, StorageBackend};
use crate::database::memory::MemoryProductStore;
use crate::database::postgres::PgProductStore;
use crate::database::store::ProductStore;

/// Errors from the storage layer
#[derive(Debug, Error)]
pub enum DatabaseError {
    #[error("Missing configuration: {0}")]
    ConfigMissing(&'static str),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Builds the configured product store
pub struct DatabaseManager;

impl DatabaseManager {
    pub async fn connect(config: &DatabaseConfig) -> Result<Arc<dyn ProductStore>, DatabaseError> {
        match config.backend {
            StorageBackend::Memory => {
                info!("Using in-memory product store");
                Ok(Arc::new(MemoryProductStore::new()))
            }
            StorageBackend::Postgres => {
                let pool = Self::pool(config).await?;
                let store = PgProductStore::new(pool);
                if config.ensure_schema {
                    store.ensure_schema().await?;
                }
                Ok(Arc::new(store))
            }
        }
    }

    /// Open a Postgres pool from config
    pub async fn pool(config: &DatabaseConfig) -> Result<PgPool, DatabaseError> {
        let url = config
            .url
            .as_ref()
            .ok_or(DatabaseError::ConfigMissing("DATABASE_URL"))?;

        let pool = PgPoolOptions::new()
            .max_connections(config.max_connections)
            .acquire_timeout(Duration::from_secs(config.connection_timeout))
            .connect(url.expose())
            .await?;

        info!(
            "Created database pool for: {}",
            config.redacted_url().unwrap_or_else(|| "<unparsable url>".to_string())
        );
        Ok(pool)
    }
}
