//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::config::AppConfig;
use crate::crypto::TokenCipher;
use crate::services::SyncService;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: AppConfig,
    pool: PgPool,
    cipher: TokenCipher,
    sync: SyncService,
}

impl AppState {
    /// Build state; the sync service shares the pool and cipher.
    #[must_use]
    pub fn new(config: AppConfig, pool: PgPool, cipher: TokenCipher) -> Self {
        let sync = SyncService::new(pool.clone(), cipher.clone(), config.shopify.clone());
        Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                cipher,
                sync,
            }),
        }
    }

    #[must_use]
    pub fn config(&self) -> &AppConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Cipher for stored Shopify access tokens.
    #[must_use]
    pub fn cipher(&self) -> &TokenCipher {
        &self.inner.cipher
    }

    #[must_use]
    pub fn sync(&self) -> &SyncService {
        &self.inner.sync
    }
}
