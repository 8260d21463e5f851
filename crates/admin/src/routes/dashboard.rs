//! Home dashboard summary.

use axum::{Json, Router, extract::State, routing::get};
use chrono::{DateTime, Duration, NaiveTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::instrument;

use lumen_core::UserStatus;
use lumen_core::types::money::round_money;

use crate::db::{
    AttendanceRepository, OrderRepository, ShopifyConfigRepository, SyncStatusRepository,
    UserRepository,
};
use crate::error::AppError;
use crate::middleware::CurrentUser;
use crate::models::SyncStatus;
use crate::state::AppState;

/// Build the dashboard router.
pub fn router() -> Router<AppState> {
    Router::new().route("/api/dashboard/stats", get(stats))
}

#[derive(Debug, Serialize)]
pub struct DashboardStats {
    pub active_employees: usize,
    pub active_employee_names: Vec<String>,
    pub total_employees: i64,
    pub shopify_configured: bool,
    pub orders_today: i64,
    pub orders_week: i64,
    pub pending_orders: i64,
    pub revenue: RevenueTotals,
    pub last_sync: SyncStatus,
}

#[derive(Debug, Serialize)]
pub struct RevenueTotals {
    pub today: Decimal,
    pub week: Decimal,
    pub total: Decimal,
}

#[instrument(skip(user, state), fields(user_id = %user.id))]
async fn stats(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<DashboardStats>, AppError> {
    let pool = state.pool();
    let (today, week) = windows(Utc::now());

    let active = AttendanceRepository::new(pool).active().await?;
    let total_employees = UserRepository::new(pool)
        .count(Some(UserStatus::Active))
        .await?;
    let shopify_configured = ShopifyConfigRepository::new(pool).get().await?.is_some();

    let orders = OrderRepository::new(pool);
    let day_totals = orders.totals(Some(today), None).await?;
    let week_totals = orders.totals(Some(week), None).await?;
    let all_totals = orders.totals(None, None).await?;
    let pending_orders = orders.count_awaiting_payment().await?;
    let last_sync = SyncStatusRepository::new(pool).get().await?;

    Ok(Json(DashboardStats {
        active_employees: active.len(),
        active_employee_names: active.into_iter().map(|a| a.name).collect(),
        total_employees,
        shopify_configured,
        orders_today: day_totals.orders,
        orders_week: week_totals.orders,
        pending_orders,
        revenue: RevenueTotals {
            today: round_money(day_totals.revenue),
            week: round_money(week_totals.revenue),
            total: round_money(all_totals.revenue),
        },
        last_sync,
    }))
}

/// Start of today (UTC) and the start of the rolling seven-day window.
fn windows(now: DateTime<Utc>) -> (DateTime<Utc>, DateTime<Utc>) {
    let today = now.date_naive().and_time(NaiveTime::MIN).and_utc();
    (today, now - Duration::days(7))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_windows() {
        let now = Utc.with_ymd_and_hms(2024, 3, 8, 15, 30, 0).unwrap();
        let (today, week) = windows(now);
        assert_eq!(today, Utc.with_ymd_and_hms(2024, 3, 8, 0, 0, 0).unwrap());
        assert_eq!(week, Utc.with_ymd_and_hms(2024, 3, 1, 15, 30, 0).unwrap());
    }
}
