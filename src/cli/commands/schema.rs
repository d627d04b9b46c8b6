use clap::Subcommand;
use serde_json::json;

use crate::cli::utils::output_success;
use crate::cli::OutputFormat;
use crate::config::{AppConfig, StorageBackend};
use crate::database::{DatabaseManager, PgProductStore, ProductStore};

#[derive(Subcommand)]
pub enum SchemaCommands {
    #[command(about = "Create the products table if it does not exist")]
    Init,
}

pub async fn handle(cmd: SchemaCommands, output_format: OutputFormat) -> anyhow::Result<()> {
    match cmd {
        SchemaCommands::Init => {
            let config = AppConfig::from_env()?;
            if config.database.backend != StorageBackend::Postgres {
                anyhow::bail!("schema init requires PRODUCT_STORE=postgres");
            }

            let pool = DatabaseManager::pool(&config.database).await?;
            let store = PgProductStore::new(pool);
            store.ensure_schema().await?;
            store.close().await;

            output_success(
                output_format,
                "Products table is ready",
                Some(json!({ "database": config.database.redacted_url() })),
            )
        }
    }
}
