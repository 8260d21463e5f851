//! Shopify Admin REST API client.
//!
//! The store domain and access token are entered by an administrator at
//! runtime and stored encrypted; a client is built per use from that stored
//! configuration.
//!
//! # Example
//!
//! ```rust,ignore
//! use lumen_admin::shopify::{OrdersQuery, ShopifyClient};
//!
//! let client = ShopifyClient::new("eraya-store", token, "2023-10")?;
//! let shop = client.shop().await?;
//! let orders = client.orders(OrdersQuery::since(Some(5_120_000_001))).await?;
//! ```

mod client;
pub mod types;

pub use client::{MAX_ORDERS_PER_PAGE, OrdersQuery, ShopifyClient};
pub use types::*;

use thiserror::Error;

/// Errors that can occur when interacting with the Shopify Admin API.
#[derive(Debug, Error)]
pub enum ShopifyError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// JSON parsing failed.
    #[error("JSON parse error: {0}")]
    Parse(#[from] serde_json::Error),

    /// Non-success response not covered by a more specific variant.
    #[error("Shopify API returned {status}: {message}")]
    Api { status: u16, message: String },

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Rate limited by Shopify after all retries.
    #[error("Rate limited, retry after {0} seconds")]
    RateLimited(u64),

    /// The access token was rejected.
    #[error("Invalid or expired access token")]
    Unauthorized,

    /// The shop domain could not be understood.
    #[error("Invalid shop domain: {0:?}")]
    InvalidDomain(String),
}

const MYSHOPIFY_SUFFIX: &str = ".myshopify.com";

/// Normalize user input into a bare `*.myshopify.com` host.
///
/// Accepts `eraya`, `Eraya.myshopify.com`, `https://eraya.myshopify.com/admin`
/// and similar forms.
///
/// # Errors
///
/// Returns `ShopifyError::InvalidDomain` if nothing usable remains or the
/// host contains characters that cannot appear in a domain.
pub fn normalize_shop_domain(raw: &str) -> Result<String, ShopifyError> {
    let trimmed = raw.trim();
    let lower = trimmed.to_ascii_lowercase();
    let without_scheme = lower
        .strip_prefix("https://")
        .or_else(|| lower.strip_prefix("http://"))
        .unwrap_or(&lower);
    let host = without_scheme
        .split(['/', '?', '#'])
        .next()
        .unwrap_or_default()
        .trim_end_matches('.');

    let valid_chars = host
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '.');
    if host.is_empty() || !valid_chars || host.starts_with('.') {
        return Err(ShopifyError::InvalidDomain(trimmed.to_string()));
    }

    if host.ends_with(MYSHOPIFY_SUFFIX) {
        Ok(host.to_string())
    } else {
        Ok(format!("{host}{MYSHOPIFY_SUFFIX}"))
    }
}
