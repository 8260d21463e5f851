//! Order list, detail, metrics and manual workflow status.

use std::collections::BTreeMap;

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use chrono::Utc;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use lumen_core::pagination::{clamp_limit, next_cursor, parse_cursor};
use lumen_core::types::money::round_money;
use lumen_core::{OrderId, OrderStatus, PaymentMethod};

use crate::db::OrderRepository;
use crate::error::AppError;
use crate::middleware::{CurrentUser, RequireSupervisor};
use crate::models::{OrderDetail, OrderFilter, OrderView, WorkflowChange};
use crate::state::AppState;

use super::{date_range, non_empty};

const MAX_ORDERS_PER_PAGE: i64 = 250;
const RECENT_ORDERS: i64 = 5;
const MAX_NOTE_CHARS: usize = 500;

/// Build the orders router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/orders", get(list))
        .route("/api/orders/metrics", get(metrics))
        .route("/api/orders/analytics", get(analytics))
        .route("/api/orders/{id}", get(show))
        .route("/api/orders/{id}/update-status", post(update_status))
}

/// Query parameters for the order list.
#[derive(Debug, Default, Deserialize)]
pub struct OrderListParams {
    pub q: Option<String>,
    pub status: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub payment_method: Option<String>,
    pub cursor: Option<String>,
    pub limit: Option<i64>,
}

/// Filters echoed back to the client.
#[derive(Debug, Default, Serialize, PartialEq, Eq)]
pub struct AppliedFilters {
    pub q: Option<String>,
    pub status: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub payment_method: Option<PaymentMethod>,
}

#[derive(Debug, Serialize)]
pub struct OrderListResponse {
    pub orders: Vec<OrderView>,
    pub total: i64,
    pub next_cursor: Option<String>,
    pub filters: AppliedFilters,
}

#[derive(Debug, Serialize)]
pub struct OrderMetrics {
    pub total_orders: i64,
    pub total_revenue: Decimal,
    pub financial_status_breakdown: BTreeMap<String, i64>,
    pub recent_orders: Vec<OrderView>,
}

#[derive(Debug, Serialize)]
pub struct OrderAnalytics {
    pub status_breakdown: BTreeMap<String, i64>,
    pub fulfillment_breakdown: BTreeMap<String, i64>,
    pub sla_breached: usize,
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: String,
    /// Reason recorded with the change in the order's history.
    #[serde(default)]
    pub note: Option<String>,
}

impl OrderListParams {
    fn to_filter(&self) -> Result<(OrderFilter, AppliedFilters), AppError> {
        let (created_from, created_before) =
            date_range(self.start_date.as_deref(), self.end_date.as_deref())?;
        let payment_method = non_empty(self.payment_method.as_deref())
            .map(|raw| {
                raw.parse::<PaymentMethod>()
                    .map_err(|_| AppError::BadRequest("Invalid payment_method".to_string()))
            })
            .transpose()?;
        let search = non_empty(self.q.as_deref()).map(String::from);
        let financial_status = non_empty(self.status.as_deref()).map(str::to_ascii_lowercase);

        let filter = OrderFilter {
            search: search.clone(),
            financial_status: financial_status.clone(),
            created_from,
            created_before,
            payment_method,
            offset: parse_cursor(self.cursor.as_deref()),
            limit: clamp_limit(self.limit, MAX_ORDERS_PER_PAGE, MAX_ORDERS_PER_PAGE),
        };
        let applied = AppliedFilters {
            q: search,
            status: financial_status,
            start_date: non_empty(self.start_date.as_deref()).map(String::from),
            end_date: non_empty(self.end_date.as_deref()).map(String::from),
            payment_method,
        };
        Ok((filter, applied))
    }
}

/// Filtered order list, newest first, with an offset cursor.
#[instrument(skip(_user, state))]
async fn list(
    CurrentUser(_user): CurrentUser,
    State(state): State<AppState>,
    Query(params): Query<OrderListParams>,
) -> Result<Json<OrderListResponse>, AppError> {
    let (filter, filters) = params.to_filter()?;
    let (orders, total) = OrderRepository::new(state.pool()).list(&filter).await?;

    let now = Utc::now();
    Ok(Json(OrderListResponse {
        orders: orders.iter().map(|o| OrderView::new(o, now)).collect(),
        total,
        next_cursor: next_cursor(filter.offset, filter.limit, total),
        filters,
    }))
}

#[instrument(skip(_user, state))]
async fn metrics(
    CurrentUser(_user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<OrderMetrics>, AppError> {
    let repo = OrderRepository::new(state.pool());
    let totals = repo.totals(None, None).await?;
    let financial_status_breakdown = repo.financial_breakdown(None).await?;
    let recent = repo.newest(None, RECENT_ORDERS, 0).await?;

    let now = Utc::now();
    Ok(Json(OrderMetrics {
        total_orders: totals.orders,
        total_revenue: round_money(totals.revenue),
        financial_status_breakdown,
        recent_orders: recent.iter().map(|o| OrderView::new(o, now)).collect(),
    }))
}

#[instrument(skip(_user, state))]
async fn analytics(
    CurrentUser(_user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<OrderAnalytics>, AppError> {
    let repo = OrderRepository::new(state.pool());
    let status_breakdown = repo.status_breakdown().await?;
    let fulfillment_breakdown = repo.fulfillment_breakdown().await?;

    let now = Utc::now();
    let sla_breached = repo
        .in_flight()
        .await?
        .iter()
        .filter(|o| o.is_sla_breached(now))
        .count();

    Ok(Json(OrderAnalytics {
        status_breakdown,
        fulfillment_breakdown,
        sla_breached,
    }))
}

#[instrument(skip(_user, state))]
async fn show(
    CurrentUser(_user): CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<OrderDetail>, AppError> {
    let repo = OrderRepository::new(state.pool());
    let id = OrderId::new(id);
    let order = repo.get(id).await?.ok_or_else(order_not_found)?;
    let events = repo.events(id).await?;
    Ok(Json(OrderDetail::new(order, Utc::now()).with_events(events)))
}

/// Apply a manual workflow status.
///
/// # Errors
///
/// 422 when the status is unknown or not one staff may set by hand.
#[instrument(skip(user, state, body), fields(user_id = %user.id))]
async fn update_status(
    RequireSupervisor(user): RequireSupervisor,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(body): Json<UpdateStatusRequest>,
) -> Result<Json<OrderDetail>, AppError> {
    let status = parse_manual_status(&body.status)?;
    let note = parse_note(body.note.as_deref())?;
    let repo = OrderRepository::new(state.pool());
    let id = OrderId::new(id);
    let order = repo.get(id).await?.ok_or_else(order_not_found)?;

    let change = WorkflowChange {
        expected: order.status(),
        status,
        actor: user.id,
        note,
    };
    let order = repo.set_workflow_status(id, &change).await?;
    tracing::info!(order_id = %id, from = %change.expected, status = %status, "Workflow status updated");

    let events = repo.events(id).await?;
    Ok(Json(OrderDetail::new(order, Utc::now()).with_events(events)))
}

pub(crate) fn order_not_found() -> AppError {
    AppError::NotFound("Order not found".to_string())
}

fn parse_note(raw: Option<&str>) -> Result<Option<&str>, AppError> {
    let note = non_empty(raw);
    if note.is_some_and(|n| n.chars().count() > MAX_NOTE_CHARS) {
        return Err(AppError::Unprocessable(format!(
            "Note must be at most {MAX_NOTE_CHARS} characters"
        )));
    }
    Ok(note)
}

fn parse_manual_status(raw: &str) -> Result<OrderStatus, AppError> {
    let status: OrderStatus = raw
        .parse()
        .map_err(|_| AppError::Unprocessable(format!("Unknown status: {}", raw.trim())))?;
    if status.is_manual() {
        Ok(status)
    } else {
        Err(AppError::Unprocessable(format!(
            "Status {status} cannot be set manually"
        )))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_update_request_note_is_optional() {
        let body: UpdateStatusRequest = serde_json::from_str(r#"{"status": "on_hold"}"#).unwrap();
        assert!(body.note.is_none());

        let body: UpdateStatusRequest =
            serde_json::from_str(r#"{"status": "on_hold", "note": "Waiting on stock"}"#).unwrap();
        assert_eq!(body.note.as_deref(), Some("Waiting on stock"));
    }

    #[test]
    fn test_parse_note() {
        assert_eq!(parse_note(None).unwrap(), None);
        assert_eq!(parse_note(Some("   ")).unwrap(), None);
        assert_eq!(parse_note(Some(" Waiting on stock ")).unwrap(), Some("Waiting on stock"));

        let long = "x".repeat(MAX_NOTE_CHARS + 1);
        assert!(matches!(
            parse_note(Some(&long)),
            Err(AppError::Unprocessable(_))
        ));
    }

    #[test]
    fn test_list_params_defaults() {
        let (filter, applied) = OrderListParams::default().to_filter().unwrap();
        assert_eq!(filter.limit, 250);
        assert_eq!(filter.offset, 0);
        assert!(filter.created_from.is_none());
        assert_eq!(applied, AppliedFilters::default());
    }

    #[test]
    fn test_list_params_filters() {
        let params = OrderListParams {
            q: Some(" 1001 ".to_string()),
            status: Some("PAID".to_string()),
            start_date: Some("2024-03-01".to_string()),
            end_date: Some("2024-03-01".to_string()),
            payment_method: Some("cod".to_string()),
            cursor: Some("500".to_string()),
            limit: Some(1_000),
        };
        let (filter, applied) = params.to_filter().unwrap();
        assert_eq!(filter.search.as_deref(), Some("1001"));
        assert_eq!(filter.financial_status.as_deref(), Some("paid"));
        assert_eq!(filter.offset, 500);
        assert_eq!(filter.limit, 250);
        assert_eq!(filter.payment_method, Some(PaymentMethod::Cod));
        let span = filter.created_before.unwrap() - filter.created_from.unwrap();
        assert_eq!(span.num_hours(), 24);
        assert_eq!(applied.start_date.as_deref(), Some("2024-03-01"));
    }

    #[test]
    fn test_bad_cursor_restarts() {
        let params = OrderListParams {
            cursor: Some("abc".to_string()),
            ..OrderListParams::default()
        };
        assert_eq!(params.to_filter().unwrap().0.offset, 0);
    }

    #[test]
    fn test_max_cursor_is_capped() {
        let params = OrderListParams {
            cursor: Some(i64::MAX.to_string()),
            ..OrderListParams::default()
        };
        let (filter, _) = params.to_filter().unwrap();
        assert_eq!(filter.offset, lumen_core::pagination::MAX_OFFSET);
        assert_eq!(next_cursor(filter.offset, filter.limit, 10), None);
    }

    #[test]
    fn test_manual_status_parsing() {
        assert_eq!(parse_manual_status("on_hold").unwrap(), OrderStatus::OnHold);
        assert!(matches!(
            parse_manual_status("shipped"),
            Err(AppError::Unprocessable(_))
        ));
        assert!(matches!(
            parse_manual_status("teleported"),
            Err(AppError::Unprocessable(_))
        ));
    }
}
