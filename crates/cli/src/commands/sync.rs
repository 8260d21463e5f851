//! One-off Shopify sync.
//!
//! Uses the same configuration as the server (`DATABASE_URL`,
//! `SHOPIFY_ENCRYPTION_KEY`, `SHOPIFY_API_VERSION`).

use lumen_admin::config::{AppConfig, ConfigError};
use lumen_admin::crypto::{CipherError, TokenCipher};
use lumen_admin::services::{SyncError, SyncService};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SyncCommandError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error(transparent)]
    Cipher(#[from] CipherError),

    #[error(transparent)]
    Sync(#[from] SyncError),
}

/// Run a single incremental sync and report how many orders were stored.
pub async fn run() -> Result<(), SyncCommandError> {
    let config = AppConfig::from_env()?;
    let pool = lumen_admin::db::create_pool(&config.database_url).await?;
    let cipher = TokenCipher::from_base64_key(&config.encryption_key)?;

    let service = SyncService::new(pool, cipher, config.shopify);
    let outcome = service.sync_once().await?;

    tracing::info!(
        since_id = ?outcome.since_id,
        orders_synced = outcome.orders_synced,
        "Sync complete"
    );
    Ok(())
}
