//! HTTP plumbing for the Shopify Admin REST API.

use std::sync::Arc;
use std::time::Duration;

use reqwest::StatusCode;
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use tracing::{instrument, warn};
use url::Url;

use super::types::{
    ConnectionTest, CountEnvelope, OrdersEnvelope, ShopEnvelope, ShopInfo, ShopifyOrder,
};
use super::{ShopifyError, normalize_shop_domain};

/// Shopify caps list endpoints at 250 rows per page.
pub const MAX_ORDERS_PER_PAGE: u32 = 250;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_ATTEMPTS: u32 = 3;
const DEFAULT_RETRY_AFTER_SECS: u64 = 2;
const MAX_RETRY_AFTER_SECS: u64 = 10;
const MAX_ERROR_BODY_CHARS: usize = 300;

/// Parameters for `orders.json`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrdersQuery {
    /// Page size, capped at [`MAX_ORDERS_PER_PAGE`].
    pub limit: u32,
    /// Only return orders with a larger ID.
    pub since_id: Option<i64>,
}

impl OrdersQuery {
    /// A full page of orders after `since_id`.
    #[must_use]
    pub const fn since(since_id: Option<i64>) -> Self {
        Self {
            limit: MAX_ORDERS_PER_PAGE,
            since_id,
        }
    }
}

impl Default for OrdersQuery {
    fn default() -> Self {
        Self::since(None)
    }
}

/// Shopify Admin REST client bound to one store and access token.
#[derive(Clone)]
pub struct ShopifyClient {
    inner: Arc<ShopifyClientInner>,
}

struct ShopifyClientInner {
    http: reqwest::Client,
    base_url: Url,
    api_version: String,
    access_token: SecretString,
}

impl std::fmt::Debug for ShopifyClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ShopifyClient")
            .field("base_url", &self.inner.base_url.as_str())
            .field("api_version", &self.inner.api_version)
            .field("access_token", &"[REDACTED]")
            .finish()
    }
}

impl ShopifyClient {
    /// Create a client for `shop_domain` (normalized to `*.myshopify.com`).
    ///
    /// # Errors
    ///
    /// Returns `ShopifyError::InvalidDomain` for an unusable domain and
    /// `ShopifyError::Http` if the HTTP client cannot be built.
    pub fn new(
        shop_domain: &str,
        access_token: SecretString,
        api_version: &str,
    ) -> Result<Self, ShopifyError> {
        let domain = normalize_shop_domain(shop_domain)?;
        let base_url = Url::parse(&format!("https://{domain}/"))
            .map_err(|_| ShopifyError::InvalidDomain(domain.clone()))?;
        Self::with_base_url(base_url, access_token, api_version)
    }

    /// Create a client against an explicit base URL (e.g. a local stub).
    ///
    /// # Errors
    ///
    /// Returns `ShopifyError::Http` if the HTTP client cannot be built.
    pub fn with_base_url(
        base_url: Url,
        access_token: SecretString,
        api_version: &str,
    ) -> Result<Self, ShopifyError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()?;

        Ok(Self {
            inner: Arc::new(ShopifyClientInner {
                http,
                base_url,
                api_version: api_version.to_string(),
                access_token,
            }),
        })
    }

    /// Host this client talks to.
    #[must_use]
    pub fn host(&self) -> &str {
        self.inner.base_url.host_str().unwrap_or_default()
    }

    // =========================================================================
    // Endpoints
    // =========================================================================

    /// Fetch store details.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response is malformed.
    #[instrument(skip(self), fields(shop = %self.host()))]
    pub async fn shop(&self) -> Result<ShopInfo, ShopifyError> {
        let envelope: ShopEnvelope = self.get_json("shop", &[]).await?;
        Ok(envelope.shop)
    }

    /// Fetch one page of orders of any status.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response is malformed.
    #[instrument(skip(self), fields(shop = %self.host()))]
    pub async fn orders(&self, query: OrdersQuery) -> Result<Vec<ShopifyOrder>, ShopifyError> {
        let mut params = vec![
            ("limit", query.limit.clamp(1, MAX_ORDERS_PER_PAGE).to_string()),
            ("status", "any".to_string()),
        ];
        if let Some(since_id) = query.since_id {
            params.push(("since_id", since_id.to_string()));
        }

        let envelope: OrdersEnvelope = self.get_json("orders", &params).await?;
        Ok(envelope.orders)
    }

    /// Number of products in the store.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response is malformed.
    pub async fn product_count(&self) -> Result<i64, ShopifyError> {
        let envelope: CountEnvelope = self.get_json("products/count", &[]).await?;
        Ok(envelope.count)
    }

    /// Number of orders of any status.
    ///
    /// # Errors
    ///
    /// Returns an error if the request fails or the response is malformed.
    pub async fn order_count(&self) -> Result<i64, ShopifyError> {
        let params = [("status", "any".to_string())];
        let envelope: CountEnvelope = self.get_json("orders/count", &params).await?;
        Ok(envelope.count)
    }

    /// Check that the credentials work. Never fails; the outcome is reported
    /// in the returned value.
    pub async fn test_connection(&self) -> ConnectionTest {
        match self.shop().await {
            Ok(shop) => ConnectionTest {
                success: true,
                shop: Some(shop),
                error: None,
            },
            Err(e) => ConnectionTest {
                success: false,
                shop: None,
                error: Some(e.to_string()),
            },
        }
    }

    // =========================================================================
    // Request execution
    // =========================================================================

    fn endpoint_url(&self, endpoint: &str, params: &[(&str, String)]) -> Result<Url, ShopifyError> {
        let path = format!("admin/api/{}/{endpoint}.json", self.inner.api_version);
        let mut url = self
            .inner
            .base_url
            .join(&path)
            .map_err(|_| ShopifyError::InvalidDomain(self.inner.base_url.to_string()))?;
        if !params.is_empty() {
            let mut pairs = url.query_pairs_mut();
            for (key, value) in params {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    /// GET an endpoint, retrying on 429 up to [`MAX_ATTEMPTS`] times.
    async fn get_json<T: DeserializeOwned>(
        &self,
        endpoint: &str,
        params: &[(&str, String)],
    ) -> Result<T, ShopifyError> {
        let url = self.endpoint_url(endpoint, params)?;
        let mut attempt = 1;

        loop {
            let response = self
                .inner
                .http
                .get(url.clone())
                .header("X-Shopify-Access-Token", self.inner.access_token.expose_secret())
                .header("Accept", "application/json")
                .send()
                .await?;

            let status = response.status();

            if status == StatusCode::TOO_MANY_REQUESTS {
                let wait = retry_after_secs(response.headers());
                if attempt >= MAX_ATTEMPTS {
                    return Err(ShopifyError::RateLimited(wait));
                }
                warn!(endpoint, attempt, wait_secs = wait, "Shopify rate limit hit, retrying");
                tokio::time::sleep(Duration::from_secs(wait)).await;
                attempt += 1;
                continue;
            }

            if status == StatusCode::UNAUTHORIZED || status == StatusCode::FORBIDDEN {
                return Err(ShopifyError::Unauthorized);
            }

            if status == StatusCode::NOT_FOUND {
                return Err(ShopifyError::NotFound(endpoint.to_string()));
            }

            if !status.is_success() {
                let body = response.text().await.unwrap_or_default();
                return Err(ShopifyError::Api {
                    status: status.as_u16(),
                    message: body.chars().take(MAX_ERROR_BODY_CHARS).collect(),
                });
            }

            let bytes = response.bytes().await?;
            return Ok(serde_json::from_slice(&bytes)?);
        }
    }
}

/// Seconds to wait from a `Retry-After` header, defaulted and capped.
fn retry_after_secs(headers: &reqwest::header::HeaderMap) -> u64 {
    let parsed = headers
        .get(reqwest::header::RETRY_AFTER)
        .and_then(|v| v.to_str().ok())
        .and_then(|s| s.trim().parse::<f64>().ok())
        .filter(|secs| secs.is_finite() && *secs >= 0.0);

    #[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)] // finite and non-negative
    let secs = parsed.map_or(DEFAULT_RETRY_AFTER_SECS, |secs| secs.ceil() as u64);
    secs.min(MAX_RETRY_AFTER_SECS)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use axum::extract::{Query, State};
    use axum::http::{HeaderMap, StatusCode as AxumStatus};
    use axum::response::IntoResponse;
    use axum::routing::get;
    use axum::{Json, Router};
    use serde_json::json;

    use super::*;

    #[derive(Clone, Default)]
    struct Stub {
        hits: Arc<AtomicUsize>,
    }

    async fn serve(router: Router) -> Url {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, router).await.unwrap();
        });
        Url::parse(&format!("http://{addr}/")).unwrap()
    }

    fn client(base: Url, token: &str) -> ShopifyClient {
        ShopifyClient::with_base_url(base, SecretString::from(token), "2023-10").unwrap()
    }

    async fn shop_handler(headers: HeaderMap) -> impl IntoResponse {
        if headers
            .get("X-Shopify-Access-Token")
            .and_then(|v| v.to_str().ok())
            != Some("shpat_good")
        {
            return (AxumStatus::UNAUTHORIZED, Json(json!({"errors": "bad token"})));
        }
        (
            AxumStatus::OK,
            Json(json!({"shop": {"name": "Eraya", "domain": "eraya.in", "currency": "INR"}})),
        )
    }

    async fn orders_handler(
        Query(params): Query<std::collections::HashMap<String, String>>,
    ) -> Json<serde_json::Value> {
        let since: i64 = params
            .get("since_id")
            .and_then(|s| s.parse().ok())
            .unwrap_or(0);
        assert_eq!(params.get("status").map(String::as_str), Some("any"));
        let orders: Vec<_> = (since + 1..=since + 2)
            .map(|id| {
                json!({
                    "id": id,
                    "order_number": 1000 + id,
                    "created_at": "2024-03-01T10:00:00Z",
                    "financial_status": "paid"
                })
            })
            .collect();
        Json(json!({ "orders": orders }))
    }

    #[test]
    fn test_client_is_clone_send_sync() {
        fn assert_traits<T: Clone + Send + Sync>() {}
        assert_traits::<ShopifyClient>();
    }

    #[test]
    fn test_new_normalizes_domain() {
        let c = ShopifyClient::new("Eraya", SecretString::from("t"), "2023-10").unwrap();
        assert_eq!(c.host(), "eraya.myshopify.com");
        assert!(ShopifyClient::new("", SecretString::from("t"), "2023-10").is_err());
    }

    #[test]
    fn test_debug_redacts_token() {
        let c = ShopifyClient::new("eraya", SecretString::from("shpat_secret"), "2023-10").unwrap();
        let out = format!("{c:?}");
        assert!(!out.contains("shpat_secret"));
        assert!(out.contains("[REDACTED]"));
    }

    #[test]
    fn test_endpoint_url() {
        let c = ShopifyClient::new("eraya", SecretString::from("t"), "2023-10").unwrap();
        let url = c
            .endpoint_url("orders", &[("limit", "250".to_string()), ("since_id", "9".to_string())])
            .unwrap();
        assert_eq!(
            url.as_str(),
            "https://eraya.myshopify.com/admin/api/2023-10/orders.json?limit=250&since_id=9"
        );
    }

    #[test]
    fn test_retry_after_parsing() {
        let mut headers = reqwest::header::HeaderMap::new();
        assert_eq!(retry_after_secs(&headers), DEFAULT_RETRY_AFTER_SECS);

        headers.insert(reqwest::header::RETRY_AFTER, "1.5".parse().unwrap());
        assert_eq!(retry_after_secs(&headers), 2);

        headers.insert(reqwest::header::RETRY_AFTER, "120".parse().unwrap());
        assert_eq!(retry_after_secs(&headers), MAX_RETRY_AFTER_SECS);

        headers.insert(reqwest::header::RETRY_AFTER, "soon".parse().unwrap());
        assert_eq!(retry_after_secs(&headers), DEFAULT_RETRY_AFTER_SECS);
    }

    #[tokio::test]
    async fn test_shop_and_connection_check() {
        let base = serve(Router::new().route("/admin/api/{version}/shop.json", get(shop_handler))).await;

        let shop = client(base.clone(), "shpat_good").shop().await.unwrap();
        assert_eq!(shop.name, "Eraya");
        assert_eq!(shop.currency, "INR");

        let bad = client(base, "shpat_bad").test_connection().await;
        assert!(!bad.success);
        assert_eq!(bad.error.as_deref(), Some("Invalid or expired access token"));
    }

    #[tokio::test]
    async fn test_orders_pass_since_id() {
        let base =
            serve(Router::new().route("/admin/api/{version}/orders.json", get(orders_handler))).await;

        let orders = client(base, "t").orders(OrdersQuery::since(Some(40))).await.unwrap();
        let ids: Vec<i64> = orders.iter().map(|o| o.id).collect();
        assert_eq!(ids, vec![41, 42]);
    }

    #[tokio::test]
    async fn test_rate_limit_retries_then_succeeds() {
        async fn flaky(State(stub): State<Stub>) -> impl IntoResponse {
            if stub.hits.fetch_add(1, Ordering::SeqCst) == 0 {
                return (
                    AxumStatus::TOO_MANY_REQUESTS,
                    [("Retry-After", "0")],
                    Json(json!({})),
                );
            }
            (AxumStatus::OK, [("Retry-After", "0")], Json(json!({"count": 7})))
        }

        let stub = Stub::default();
        let router = Router::new()
            .route("/admin/api/{version}/products/count.json", get(flaky))
            .with_state(stub.clone());
        let base = serve(router).await;

        assert_eq!(client(base, "t").product_count().await.unwrap(), 7);
        assert_eq!(stub.hits.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_rate_limit_gives_up_after_three_attempts() {
        async fn always_limited(State(stub): State<Stub>) -> impl IntoResponse {
            stub.hits.fetch_add(1, Ordering::SeqCst);
            (AxumStatus::TOO_MANY_REQUESTS, [("Retry-After", "0")])
        }

        let stub = Stub::default();
        let router = Router::new()
            .route("/admin/api/{version}/orders/count.json", get(always_limited))
            .with_state(stub.clone());
        let base = serve(router).await;

        let err = client(base, "t").order_count().await.unwrap_err();
        assert!(matches!(err, ShopifyError::RateLimited(0)));
        assert_eq!(stub.hits.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_error_statuses() {
        async fn missing() -> AxumStatus {
            AxumStatus::NOT_FOUND
        }
        async fn broken() -> (AxumStatus, &'static str) {
            (AxumStatus::INTERNAL_SERVER_ERROR, "upstream exploded")
        }

        let router = Router::new()
            .route("/admin/api/{version}/shop.json", get(missing))
            .route("/admin/api/{version}/orders/count.json", get(broken));
        let base = serve(router).await;
        let c = client(base, "t");

        assert!(matches!(c.shop().await, Err(ShopifyError::NotFound(_))));
        match c.order_count().await {
            Err(ShopifyError::Api { status, message }) => {
                assert_eq!(status, 500);
                assert_eq!(message, "upstream exploded");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
