//! CLI command implementations.

pub mod migrate;
pub mod orders;
pub mod seed;

use sqlx::PgPool;

use stes_storefront::config::{ConfigError, database_url_from_env};
use stes_storefront::db;

/// Connect to the storefront database named by the environment.
///
/// # Errors
///
/// Returns an error if no database URL is configured or the connection fails.
pub async fn connect() -> Result<PgPool, ConnectError> {
    dotenvy::dotenv().ok();

    let database_url = database_url_from_env()?;

    tracing::info!("Connecting to storefront database...");
    Ok(db::create_pool(&database_url).await?)
}

#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Database connection error: {0}")]
    Database(#[from] sqlx::Error),
}
