//! Shopify connection settings, manual syncs and synced-order views.

use std::collections::BTreeMap;

use axum::{
    Json, Router,
    extract::{Query, State},
    http::StatusCode,
    routing::{get, post},
};
use chrono::{DateTime, Duration, Utc};
use rust_decimal::Decimal;
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use lumen_core::pagination::{MAX_OFFSET, clamp_limit};
use lumen_core::types::money::{average, round_money};

use crate::db::{OrderRepository, ShopifyConfigRepository, SyncStatusRepository};
use crate::error::AppError;
use crate::middleware::{CurrentUser, RequireSupervisor, RequireUserManager};
use crate::models::{OrderView, SyncStatus};
use crate::services::FullSyncOutcome;
use crate::shopify::{
    ConnectionTest, ShopInfo, ShopifyClient, ShopifyOrder, StoreInfo, normalize_shop_domain,
};
use crate::state::AppState;

const INSTANT_SYNC_PREVIEW: usize = 5;
const ANALYTICS_RECENT_ORDERS: i64 = 10;
const DEFAULT_ANALYTICS_DAYS: i64 = 30;
const MAX_ANALYTICS_DAYS: i64 = 365;
const DEFAULT_ORDERS_PAGE: i64 = 50;
const MAX_ORDERS_PAGE: i64 = 250;

/// Build the Shopify router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route(
            "/api/shopify/config",
            get(get_config).post(save_config).delete(delete_config),
        )
        .route("/api/shopify/test", get(test_stored))
        .route("/api/shopify/test-connection", post(test_credentials))
        .route("/api/shopify/store-info", get(store_info))
        .route("/api/shopify/sync", post(sync))
        .route("/api/shopify/instant-sync", post(instant_sync))
        .route("/api/shopify/full-sync", post(full_sync))
        .route("/api/shopify/orders", get(orders))
        .route("/api/shopify/sync-status", get(sync_status))
        .route("/api/shopify/analytics", get(analytics))
}

// =============================================================================
// Request / response types
// =============================================================================

/// Store credentials as entered by an administrator.
#[derive(Deserialize)]
pub struct CredentialsRequest {
    #[serde(default)]
    pub shop_domain: String,
    #[serde(default)]
    pub access_token: String,
}

impl std::fmt::Debug for CredentialsRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialsRequest")
            .field("shop_domain", &self.shop_domain)
            .field("access_token", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug, Serialize)]
pub struct SaveConfigResponse {
    pub success: bool,
    pub message: String,
    pub shop_info: ShopInfo,
}

#[derive(Debug, Serialize)]
pub struct ConfigResponse {
    pub configured: bool,
    pub shop_domain: Option<String>,
    pub updated_at: Option<DateTime<Utc>>,
    pub has_token: bool,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

/// One row of the instant-sync preview.
#[derive(Debug, Serialize)]
pub struct OrderPreview {
    pub order_number: String,
    pub customer: String,
    pub total: Option<Decimal>,
    pub status: Option<String>,
    pub created: DateTime<Utc>,
}

impl From<&ShopifyOrder> for OrderPreview {
    fn from(order: &ShopifyOrder) -> Self {
        Self {
            order_number: order
                .order_number
                .map(|n| n.to_string())
                .or_else(|| order.name.clone())
                .unwrap_or_else(|| order.id.to_string()),
            customer: order.customer_first_name().unwrap_or("Unknown").to_string(),
            total: order.total_price,
            status: order.financial_status.clone(),
            created: order.created_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct InstantSyncResponse {
    pub success: bool,
    pub orders_synced: usize,
    pub latest_orders: Vec<OrderPreview>,
}

#[derive(Debug, Serialize)]
pub struct FullSyncResponse {
    pub success: bool,
    #[serde(flatten)]
    pub outcome: FullSyncOutcome,
}

#[derive(Debug, Deserialize)]
pub struct OrdersParams {
    pub limit: Option<i64>,
    pub offset: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct OrdersResponse {
    pub success: bool,
    pub orders: Vec<OrderView>,
    pub total: i64,
    pub limit: i64,
    pub offset: i64,
}

#[derive(Debug, Deserialize)]
pub struct AnalyticsParams {
    pub days: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct AnalyticsPeriod {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub days: i64,
}

#[derive(Debug, Serialize)]
pub struct AnalyticsTotals {
    pub orders: i64,
    pub revenue: Decimal,
    pub avg_order_value: Decimal,
}

#[derive(Debug, Serialize)]
pub struct AnalyticsResponse {
    pub period: AnalyticsPeriod,
    pub totals: AnalyticsTotals,
    pub status_breakdown: BTreeMap<String, i64>,
    pub recent_orders: Vec<OrderView>,
}

// =============================================================================
// Configuration
// =============================================================================

#[instrument(skip(_user, state))]
async fn get_config(
    CurrentUser(_user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<ConfigResponse>, AppError> {
    let config = ShopifyConfigRepository::new(state.pool()).get().await?;
    Ok(Json(match config {
        Some(c) => ConfigResponse {
            configured: true,
            has_token: !c.access_token_encrypted.is_empty(),
            shop_domain: Some(c.shop_domain),
            updated_at: Some(c.updated_at),
        },
        None => ConfigResponse {
            configured: false,
            shop_domain: None,
            updated_at: None,
            has_token: false,
        },
    }))
}

/// Verify and store credentials.
///
/// # Errors
///
/// 400 for missing fields, an unusable domain or a failed connection test.
#[instrument(skip(admin, state, body), fields(admin_id = %admin.id))]
async fn save_config(
    RequireUserManager(admin): RequireUserManager,
    State(state): State<AppState>,
    Json(body): Json<CredentialsRequest>,
) -> Result<Json<SaveConfigResponse>, AppError> {
    let (domain, client, token) = client_for(&state, &body)?;

    let shop_info = expect_connected(client.test_connection().await)?;
    let encrypted = state.cipher().encrypt(&token)?;
    ShopifyConfigRepository::new(state.pool())
        .save(&domain, &encrypted)
        .await?;

    tracing::info!(shop = %domain, "Shopify configuration saved");
    Ok(Json(SaveConfigResponse {
        success: true,
        message: "Shopify configuration saved successfully".to_string(),
        shop_info,
    }))
}

#[instrument(skip(admin, state), fields(admin_id = %admin.id))]
async fn delete_config(
    RequireUserManager(admin): RequireUserManager,
    State(state): State<AppState>,
) -> Result<Json<MessageResponse>, AppError> {
    let removed = state.sync().disconnect().await?;
    if !removed {
        return Err(AppError::NotFound(
            "No Shopify configuration found".to_string(),
        ));
    }

    tracing::info!("Shopify configuration removed");
    Ok(Json(MessageResponse {
        success: true,
        message: "Shopify configuration removed".to_string(),
    }))
}

/// Test the stored connection.
#[instrument(skip(_user, state))]
async fn test_stored(
    CurrentUser(_user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<ConnectionTest>, AppError> {
    let client = state.sync().stored_client().await?;
    Ok(Json(client.test_connection().await))
}

/// Test credentials without storing them.
#[instrument(skip(_admin, state, body))]
async fn test_credentials(
    RequireUserManager(_admin): RequireUserManager,
    State(state): State<AppState>,
    Json(body): Json<CredentialsRequest>,
) -> Result<Json<ConnectionTest>, AppError> {
    let (_, client, _) = client_for(&state, &body)?;
    Ok(Json(client.test_connection().await))
}

#[instrument(skip(_user, state))]
async fn store_info(
    CurrentUser(_user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<StoreInfo>, AppError> {
    let client = state.sync().stored_client().await?;
    let (shop, products, orders) =
        tokio::try_join!(client.shop(), client.product_count(), client.order_count())?;
    Ok(Json(StoreInfo::new(shop, products, orders)))
}

// =============================================================================
// Syncs
// =============================================================================

/// Start a background sync and return immediately.
#[instrument(skip(user, state), fields(user_id = %user.id))]
async fn sync(
    RequireSupervisor(user): RequireSupervisor,
    State(state): State<AppState>,
) -> Result<(StatusCode, Json<MessageResponse>), AppError> {
    state.sync().stored_client().await?;
    state.sync().trigger();

    Ok((
        StatusCode::ACCEPTED,
        Json(MessageResponse {
            success: true,
            message: "Sync started".to_string(),
        }),
    ))
}

#[instrument(skip(user, state), fields(user_id = %user.id))]
async fn instant_sync(
    RequireSupervisor(user): RequireSupervisor,
    State(state): State<AppState>,
) -> Result<Json<InstantSyncResponse>, AppError> {
    let outcome = state.sync().sync_once().await?;
    Ok(Json(InstantSyncResponse {
        success: true,
        orders_synced: outcome.orders_synced,
        latest_orders: preview(&outcome.orders),
    }))
}

#[instrument(skip(user, state), fields(user_id = %user.id))]
async fn full_sync(
    RequireSupervisor(user): RequireSupervisor,
    State(state): State<AppState>,
) -> Result<Json<FullSyncResponse>, AppError> {
    let outcome = state.sync().full_sync().await?;
    Ok(Json(FullSyncResponse {
        success: true,
        outcome,
    }))
}

#[instrument(skip(_user, state))]
async fn sync_status(
    CurrentUser(_user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<SyncStatus>, AppError> {
    Ok(Json(SyncStatusRepository::new(state.pool()).get().await?))
}

// =============================================================================
// Synced orders
// =============================================================================

#[instrument(skip(_user, state))]
async fn orders(
    CurrentUser(_user): CurrentUser,
    State(state): State<AppState>,
    Query(params): Query<OrdersParams>,
) -> Result<Json<OrdersResponse>, AppError> {
    let limit = clamp_limit(params.limit, DEFAULT_ORDERS_PAGE, MAX_ORDERS_PAGE);
    let offset = params.offset.unwrap_or(0).clamp(0, MAX_OFFSET);

    let repo = OrderRepository::new(state.pool());
    let orders = repo.newest(None, limit, offset).await?;
    let total = repo.totals(None, None).await?.orders;

    let now = Utc::now();
    Ok(Json(OrdersResponse {
        success: true,
        orders: orders.iter().map(|o| OrderView::new(o, now)).collect(),
        total,
        limit,
        offset,
    }))
}

#[instrument(skip(_user, state))]
async fn analytics(
    CurrentUser(_user): CurrentUser,
    State(state): State<AppState>,
    Query(params): Query<AnalyticsParams>,
) -> Result<Json<AnalyticsResponse>, AppError> {
    let days = analytics_days(params.days);
    let end = Utc::now();
    let start = end - Duration::days(days);

    let repo = OrderRepository::new(state.pool());
    let totals = repo.totals(Some(start), None).await?;
    let status_breakdown = repo.financial_breakdown(Some(start)).await?;
    let recent = repo
        .newest(Some(start), ANALYTICS_RECENT_ORDERS, 0)
        .await?;

    Ok(Json(AnalyticsResponse {
        period: AnalyticsPeriod { start, end, days },
        totals: AnalyticsTotals {
            orders: totals.orders,
            revenue: round_money(totals.revenue),
            avg_order_value: average(totals.revenue, totals.orders),
        },
        status_breakdown,
        recent_orders: recent.iter().map(|o| OrderView::new(o, end)).collect(),
    }))
}

// =============================================================================
// Helpers
// =============================================================================

/// Validate credentials and build a client for them.
fn client_for(
    state: &AppState,
    body: &CredentialsRequest,
) -> Result<(String, ShopifyClient, String), AppError> {
    let raw_domain = body.shop_domain.trim();
    let token = body.access_token.trim();
    if raw_domain.is_empty() || token.is_empty() {
        return Err(AppError::BadRequest(
            "Shop domain and access token are required".to_string(),
        ));
    }

    let domain = normalize_shop_domain(raw_domain)?;
    let client = ShopifyClient::new(
        &domain,
        SecretString::from(token.to_string()),
        &state.config().shopify.api_version,
    )?;
    Ok((domain, client, token.to_string()))
}

fn expect_connected(test: ConnectionTest) -> Result<ShopInfo, AppError> {
    match test {
        ConnectionTest {
            success: true,
            shop: Some(shop),
            ..
        } => Ok(shop),
        ConnectionTest { error, .. } => Err(AppError::BadRequest(format!(
            "Connection failed: {}",
            error.unwrap_or_else(|| "unknown error".to_string())
        ))),
    }
}

/// The newest orders of a sync, newest first.
fn preview(orders: &[ShopifyOrder]) -> Vec<OrderPreview> {
    let mut sorted: Vec<&ShopifyOrder> = orders.iter().collect();
    sorted.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
    sorted
        .into_iter()
        .take(INSTANT_SYNC_PREVIEW)
        .map(OrderPreview::from)
        .collect()
}

fn analytics_days(requested: Option<i64>) -> i64 {
    requested
        .unwrap_or(DEFAULT_ANALYTICS_DAYS)
        .clamp(1, MAX_ANALYTICS_DAYS)
}
