//! Single-row Shopify connection and sync bookkeeping.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use super::RepositoryError;
use crate::models::{ShopifyConfig, SyncState, SyncStatus};

#[derive(Debug, sqlx::FromRow)]
struct ConfigRow {
    shop_domain: String,
    access_token_encrypted: String,
    updated_at: DateTime<Utc>,
}

impl From<ConfigRow> for ShopifyConfig {
    fn from(row: ConfigRow) -> Self {
        Self {
            shop_domain: row.shop_domain,
            access_token_encrypted: row.access_token_encrypted,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct SyncStatusRow {
    last_sync: Option<DateTime<Utc>>,
    orders_synced: i32,
    status: String,
    error_message: Option<String>,
}

impl From<SyncStatusRow> for SyncStatus {
    fn from(row: SyncStatusRow) -> Self {
        Self {
            last_sync: row.last_sync,
            orders_synced: row.orders_synced,
            status: SyncState::from_db(&row.status),
            error_message: row.error_message,
        }
    }
}

// =============================================================================
// Config
// =============================================================================

/// Repository for the stored store connection.
pub struct ShopifyConfigRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> ShopifyConfigRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// The stored connection, if any.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self) -> Result<Option<ShopifyConfig>, RepositoryError> {
        let row = sqlx::query_as::<_, ConfigRow>(
            "SELECT shop_domain, access_token_encrypted, updated_at FROM shopify_config",
        )
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Create or replace the stored connection.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn save(
        &self,
        shop_domain: &str,
        access_token_encrypted: &str,
    ) -> Result<ShopifyConfig, RepositoryError> {
        let row = sqlx::query_as::<_, ConfigRow>(
            r"
            INSERT INTO shopify_config (singleton, shop_domain, access_token_encrypted, updated_at)
            VALUES (TRUE, $1, $2, NOW())
            ON CONFLICT (singleton) DO UPDATE SET
                shop_domain = EXCLUDED.shop_domain,
                access_token_encrypted = EXCLUDED.access_token_encrypted,
                updated_at = NOW()
            RETURNING shop_domain, access_token_encrypted, updated_at
            ",
        )
        .bind(shop_domain)
        .bind(access_token_encrypted)
        .fetch_one(self.pool)
        .await?;

        Ok(row.into())
    }

    /// Remove the stored connection together with the recorded sync status.
    /// Returns `false` if no connection was stored.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if either delete fails; neither
    /// is applied in that case.
    pub async fn delete(&self) -> Result<bool, RepositoryError> {
        let mut tx = self.pool.begin().await?;
        let result = sqlx::query("DELETE FROM shopify_config")
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM shopify_sync_status")
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(result.rows_affected() > 0)
    }
}

// =============================================================================
// Sync status
// =============================================================================

/// Repository for the `shopify_sync_status` row.
pub struct SyncStatusRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> SyncStatusRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Current status; `pending` with zero orders when no sync has run.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self) -> Result<SyncStatus, RepositoryError> {
        let row = sqlx::query_as::<_, SyncStatusRow>(
            "SELECT last_sync, orders_synced, status, error_message FROM shopify_sync_status",
        )
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into).unwrap_or_default())
    }

    /// Record a successful sync of `orders_synced` orders.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn record_success(&self, orders_synced: i32) -> Result<(), RepositoryError> {
        self.record(SyncState::Success, orders_synced, None).await
    }

    /// Record a failed sync.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn record_error(&self, message: &str) -> Result<(), RepositoryError> {
        self.record(SyncState::Error, 0, Some(message)).await
    }

    async fn record(
        &self,
        state: SyncState,
        orders_synced: i32,
        error_message: Option<&str>,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            r"
            INSERT INTO shopify_sync_status (singleton, last_sync, orders_synced, status, error_message)
            VALUES (TRUE, NOW(), $1, $2, $3)
            ON CONFLICT (singleton) DO UPDATE SET
                last_sync = NOW(),
                orders_synced = EXCLUDED.orders_synced,
                status = EXCLUDED.status,
                error_message = EXCLUDED.error_message
            ",
        )
        .bind(orders_synced)
        .bind(state.as_str())
        .bind(error_message)
        .execute(self.pool)
        .await?;

        Ok(())
    }
}
