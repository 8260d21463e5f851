//! Stored Shopify credentials and sync bookkeeping.

use chrono::{DateTime, Utc};
use serde::Serialize;

/// The single stored store connection.
#[derive(Clone)]
pub struct ShopifyConfig {
    pub shop_domain: String,
    /// `base64(nonce || ciphertext)` of the Admin API access token.
    pub access_token_encrypted: String,
    pub updated_at: DateTime<Utc>,
}

impl std::fmt::Debug for ShopifyConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShopifyConfig")
            .field("shop_domain", &self.shop_domain)
            .field("access_token_encrypted", &"[REDACTED]")
            .field("updated_at", &self.updated_at)
            .finish()
    }
}

/// Outcome of the most recent sync.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncState {
    #[default]
    Pending,
    Success,
    Error,
}

impl SyncState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Success => "success",
            Self::Error => "error",
        }
    }

    /// Parse the stored text; anything unrecognised reads as pending.
    #[must_use]
    pub fn from_db(raw: &str) -> Self {
        match raw {
            "success" => Self::Success,
            "error" => Self::Error,
            _ => Self::Pending,
        }
    }
}

/// The `shopify_sync_status` row.
#[derive(Debug, Clone, Default, Serialize)]
pub struct SyncStatus {
    pub last_sync: Option<DateTime<Utc>>,
    pub orders_synced: i32,
    pub status: SyncState,
    pub error_message: Option<String>,
}
