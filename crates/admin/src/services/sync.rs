//! Shopify order sync.
//!
//! A background loop polls Shopify for orders newer than the newest stored
//! one and upserts them. Manual syncs from the API go through the same
//! service and share its lock, so two syncs never interleave.

use std::sync::Arc;
use std::time::Duration;

use secrecy::SecretString;
use serde::Serialize;
use sqlx::PgPool;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, instrument};

use crate::config::ShopifySettings;
use crate::crypto::{CipherError, TokenCipher};
use crate::db::{OrderRepository, RepositoryError, ShopifyConfigRepository, SyncStatusRepository};
use crate::models::OrderUpsert;
use crate::shopify::{MAX_ORDERS_PER_PAGE, OrdersQuery, ShopifyClient, ShopifyError, ShopifyOrder};

/// Upper bound on pages fetched by a full sync.
pub const MAX_FULL_SYNC_BATCHES: usize = 50;

#[derive(Debug, Error)]
pub enum SyncError {
    /// No store connection has been saved yet.
    #[error("Shopify is not configured")]
    NotConfigured,

    #[error(transparent)]
    Shopify(#[from] ShopifyError),

    #[error(transparent)]
    Cipher(#[from] CipherError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),
}

/// Result of an incremental sync.
#[derive(Debug, Clone)]
pub struct SyncOutcome {
    /// Marker the fetch started after.
    pub since_id: Option<i64>,
    pub orders_synced: usize,
    /// The fetched orders, oldest first as returned by Shopify.
    pub orders: Vec<ShopifyOrder>,
}

/// Result of a paginated backfill.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct FullSyncOutcome {
    pub batches: usize,
    pub orders_synced: usize,
    /// `false` when the batch cap stopped the backfill early.
    pub complete: bool,
}

/// Owns the sync loop and the lock shared with manual syncs.
#[derive(Clone)]
pub struct SyncService {
    inner: Arc<SyncServiceInner>,
}

struct SyncServiceInner {
    pool: PgPool,
    cipher: TokenCipher,
    settings: ShopifySettings,
    lock: Mutex<()>,
}

impl SyncService {
    #[must_use]
    pub fn new(pool: PgPool, cipher: TokenCipher, settings: ShopifySettings) -> Self {
        Self {
            inner: Arc::new(SyncServiceInner {
                pool,
                cipher,
                settings,
                lock: Mutex::new(()),
            }),
        }
    }

    #[must_use]
    pub fn settings(&self) -> &ShopifySettings {
        &self.inner.settings
    }

    /// Start the background poller.
    pub fn spawn(&self) -> JoinHandle<()> {
        let service = self.clone();
        tokio::spawn(async move { service.run().await })
    }

    async fn run(self) {
        info!(
            interval = ?self.inner.settings.sync_interval,
            retry = ?self.inner.settings.sync_retry,
            "Starting Shopify order sync"
        );

        loop {
            let result = self.sync_once().await;
            match &result {
                Ok(outcome) => info!(orders = outcome.orders_synced, "Shopify sync complete"),
                Err(SyncError::NotConfigured) => debug!("Shopify not configured, skipping sync"),
                Err(e) => error!(error = %e, "Shopify sync failed"),
            }

            tokio::time::sleep(next_delay(&result, &self.inner.settings)).await;
        }
    }

    /// Run one incremental sync in the background.
    pub fn trigger(&self) -> JoinHandle<()> {
        let service = self.clone();
        tokio::spawn(async move {
            match service.sync_once().await {
                Ok(outcome) => info!(orders = outcome.orders_synced, "Manual Shopify sync complete"),
                Err(e) => error!(error = %e, "Manual Shopify sync failed"),
            }
        })
    }

    /// Build a client from the stored connection.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::NotConfigured` when nothing is stored, or a cipher
    /// or Shopify error if the stored values are unusable.
    pub async fn stored_client(&self) -> Result<ShopifyClient, SyncError> {
        let config = ShopifyConfigRepository::new(&self.inner.pool)
            .get()
            .await?
            .ok_or(SyncError::NotConfigured)?;
        let token: SecretString = self.inner.cipher.decrypt(&config.access_token_encrypted)?;

        Ok(ShopifyClient::new(
            &config.shop_domain,
            token,
            &self.inner.settings.api_version,
        )?)
    }

    /// Fetch and store orders newer than the newest stored order.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::NotConfigured` (without touching the status row)
    /// when no store is connected. Any other failure, including an unusable
    /// stored connection, is recorded in the status row and returned.
    #[instrument(skip(self))]
    pub async fn sync_once(&self) -> Result<SyncOutcome, SyncError> {
        let _guard = self.inner.lock.lock().await;
        let store = PgSyncStore::new(&self.inner.pool);
        incremental_sync(&store, self.stored_client().await).await
    }

    /// Backfill every order, page by page from the first.
    ///
    /// # Errors
    ///
    /// Same as [`SyncService::sync_once`].
    #[instrument(skip(self))]
    pub async fn full_sync(&self) -> Result<FullSyncOutcome, SyncError> {
        let _guard = self.inner.lock.lock().await;
        let store = PgSyncStore::new(&self.inner.pool);
        let outcome = paginated_sync(&store, self.stored_client().await).await?;

        info!(
            batches = outcome.batches,
            orders = outcome.orders_synced,
            complete = outcome.complete,
            "Full Shopify sync finished"
        );
        Ok(outcome)
    }

    /// Remove the stored connection and its sync status. Waits for any
    /// running sync. Returns `false` if nothing was stored.
    ///
    /// # Errors
    ///
    /// Returns `SyncError::Repository` if the delete fails.
    #[instrument(skip(self))]
    pub async fn disconnect(&self) -> Result<bool, SyncError> {
        let _guard = self.inner.lock.lock().await;
        Ok(ShopifyConfigRepository::new(&self.inner.pool).delete().await?)
    }
}

// =============================================================================
// Storage seam
// =============================================================================

/// Where synced orders and the sync outcome are written.
pub trait SyncStore: Send + Sync {
    /// Shopify ID of the newest stored order.
    fn newest_shopify_id(&self)
    -> impl Future<Output = Result<Option<i64>, RepositoryError>> + Send;

    /// Insert or refresh orders; returns how many were written.
    fn upsert_orders(
        &self,
        orders: &[OrderUpsert],
    ) -> impl Future<Output = Result<usize, RepositoryError>> + Send;

    fn record_success(
        &self,
        orders_synced: i32,
    ) -> impl Future<Output = Result<(), RepositoryError>> + Send;

    fn record_error(&self, message: &str)
    -> impl Future<Output = Result<(), RepositoryError>> + Send;
}

/// [`SyncStore`] backed by the order and sync status tables.
pub struct PgSyncStore<'a> {
    pool: &'a PgPool,
}

impl<'a> PgSyncStore<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }
}

impl SyncStore for PgSyncStore<'_> {
    async fn newest_shopify_id(&self) -> Result<Option<i64>, RepositoryError> {
        OrderRepository::new(self.pool).newest_shopify_id().await
    }

    async fn upsert_orders(&self, orders: &[OrderUpsert]) -> Result<usize, RepositoryError> {
        OrderRepository::new(self.pool).upsert_many(orders).await
    }

    async fn record_success(&self, orders_synced: i32) -> Result<(), RepositoryError> {
        SyncStatusRepository::new(self.pool)
            .record_success(orders_synced)
            .await
    }

    async fn record_error(&self, message: &str) -> Result<(), RepositoryError> {
        SyncStatusRepository::new(self.pool).record_error(message).await
    }
}

// =============================================================================
// Sync runs
// =============================================================================

/// Incremental sync against `client`, recording the outcome in `store`.
///
/// # Errors
///
/// Returns the client or sync error unchanged. A failure to write the status
/// row is logged and does not replace it.
pub async fn incremental_sync<S: SyncStore>(
    store: &S,
    client: Result<ShopifyClient, SyncError>,
) -> Result<SyncOutcome, SyncError> {
    let result = match client {
        Ok(client) => fetch_and_store(store, &client).await,
        Err(e) => Err(e),
    };
    record_outcome(store, result.as_ref().map(|o| o.orders_synced)).await;
    result
}

/// Paginated backfill against `client`, recording the outcome in `store`.
///
/// # Errors
///
/// Same as [`incremental_sync`].
pub async fn paginated_sync<S: SyncStore>(
    store: &S,
    client: Result<ShopifyClient, SyncError>,
) -> Result<FullSyncOutcome, SyncError> {
    let result = match client {
        Ok(client) => backfill(store, &client).await,
        Err(e) => Err(e),
    };
    record_outcome(store, result.as_ref().map(|o| o.orders_synced)).await;
    result
}

/// Write the status row for a finished run. `NotConfigured` leaves it alone.
async fn record_outcome<S: SyncStore>(store: &S, result: Result<usize, &SyncError>) {
    let written = match result {
        Ok(count) => store.record_success(count_i32(count)).await,
        Err(SyncError::NotConfigured) => return,
        Err(e) => store.record_error(&e.to_string()).await,
    };

    if let Err(e) = written {
        error!(error = %e, "Failed to record Shopify sync status");
    }
}

async fn fetch_and_store<S: SyncStore>(
    store: &S,
    client: &ShopifyClient,
) -> Result<SyncOutcome, SyncError> {
    let since_id = store.newest_shopify_id().await?;
    debug!(?since_id, "Fetching orders");

    let orders = client.orders(OrdersQuery::since(since_id)).await?;
    if orders.is_empty() {
        return Ok(SyncOutcome {
            since_id,
            orders_synced: 0,
            orders,
        });
    }

    let upserts: Vec<OrderUpsert> = orders.iter().map(OrderUpsert::from).collect();
    let orders_synced = store.upsert_orders(&upserts).await?;

    Ok(SyncOutcome {
        since_id,
        orders_synced,
        orders,
    })
}

async fn backfill<S: SyncStore>(
    store: &S,
    client: &ShopifyClient,
) -> Result<FullSyncOutcome, SyncError> {
    let mut since_id = 0;
    let mut outcome = FullSyncOutcome {
        batches: 0,
        orders_synced: 0,
        complete: false,
    };

    while outcome.batches < MAX_FULL_SYNC_BATCHES {
        let batch = client.orders(OrdersQuery::since(Some(since_id))).await?;
        outcome.batches += 1;

        let upserts: Vec<OrderUpsert> = batch.iter().map(OrderUpsert::from).collect();
        outcome.orders_synced += store.upsert_orders(&upserts).await?;

        match next_since_id(&batch) {
            Some(next) if !is_last_batch(batch.len()) => since_id = next,
            _ => {
                outcome.complete = true;
                break;
            }
        }
    }

    Ok(outcome)
}

/// Pause before the next loop iteration.
fn next_delay<T>(result: &Result<T, SyncError>, settings: &ShopifySettings) -> Duration {
    match result {
        Ok(_) | Err(SyncError::NotConfigured) => settings.sync_interval,
        Err(_) => settings.sync_retry,
    }
}

/// Marker for the page after `batch`: its largest order ID.
fn next_since_id(batch: &[ShopifyOrder]) -> Option<i64> {
    batch.iter().map(|o| o.id).max()
}

fn is_last_batch(len: usize) -> bool {
    len < MAX_ORDERS_PER_PAGE as usize
}

fn count_i32(n: usize) -> i32 {
    i32::try_from(n).unwrap_or(i32::MAX)
}
