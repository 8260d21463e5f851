//! HTTP route handlers for the admin API.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                          - Liveness
//! GET  /health/ready                    - Readiness (database)
//!
//! # Users (owner/admin)
//! GET    /api/users                     - Paged, filtered list
//! POST   /api/users                     - Create
//! GET    /api/users/{id}                - Detail
//! PUT    /api/users/{id}                - Partial update (PATCH also accepted)
//! DELETE /api/users/{id}                - Delete
//!
//! # Orders
//! GET  /api/orders                      - Filtered list with offset cursor
//! GET  /api/orders/metrics              - Totals and recent orders
//! GET  /api/orders/analytics            - Status, fulfillment and SLA breakdown
//! GET  /api/orders/{id}                 - Detail
//! POST /api/orders/{id}/update-status   - Manual workflow status
//!
//! # Packing
//! GET  /api/packing/queue               - Ready-to-pack orders, oldest first
//! POST /api/packing/{id}/pack|hold|release
//!
//! # Shopify
//! GET|POST|DELETE /api/shopify/config
//! GET  /api/shopify/test, POST /api/shopify/test-connection
//! GET  /api/shopify/store-info
//! POST /api/shopify/sync|instant-sync|full-sync
//! GET  /api/shopify/orders|sync-status|analytics
//!
//! # Tasks
//! GET|POST /api/tasks, GET /api/tasks/board, GET /api/tasks/stats
//! GET|PATCH|DELETE /api/tasks/{id}
//! PATCH /api/tasks/{id}/move, POST /api/tasks/{id}/proof
//! GET|POST /api/tasks/{id}/comments, GET /api/tasks/{id}/activity
//! GET|POST /api/announcements
//! GET|POST /api/recurring-templates, POST /api/recurring-templates/run
//!
//! # Attendance
//! POST /api/attendance/check_in|check_out
//! GET  /api/attendance/records|report|overtime|active
//!
//! # Dashboard
//! GET  /api/dashboard/stats
//! ```

use axum::{Router, extract::State, http::StatusCode, routing::get};
use chrono::{DateTime, Days, NaiveDate, Utc};

use crate::error::AppError;
use crate::state::AppState;

pub mod announcements;
pub mod attendance;
pub mod dashboard;
pub mod orders;
pub mod packing;
pub mod recurring;
pub mod shopify;
pub mod tasks;
pub mod users;

/// Build the application router (without outer layers).
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health))
        .route("/health/ready", get(readiness))
        .merge(users::router())
        .merge(orders::router())
        .merge(packing::router())
        .merge(shopify::router())
        .merge(tasks::router())
        .merge(announcements::router())
        .merge(recurring::router())
        .merge(attendance::router())
        .merge(dashboard::router())
}

/// Liveness health check endpoint.
///
/// Returns "ok" if the server is running. Does not check dependencies.
async fn health() -> &'static str {
    "ok"
}

/// Readiness health check endpoint.
///
/// Returns 503 Service Unavailable if the database is not reachable.
async fn readiness(State(state): State<AppState>) -> StatusCode {
    match sqlx::query("SELECT 1").fetch_one(state.pool()).await {
        Ok(_) => StatusCode::OK,
        Err(_) => StatusCode::SERVICE_UNAVAILABLE,
    }
}

// =============================================================================
// Shared query helpers
// =============================================================================

/// Parse a `YYYY-MM-DD` query value.
pub(crate) fn parse_date(field: &str, raw: &str) -> Result<NaiveDate, AppError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d")
        .map_err(|_| AppError::BadRequest(format!("Invalid {field}, expected YYYY-MM-DD")))
}

/// Half-open UTC range covering the inclusive dates `start..=end`.
pub(crate) fn day_range(
    start: Option<NaiveDate>,
    end: Option<NaiveDate>,
) -> (Option<DateTime<Utc>>, Option<DateTime<Utc>>) {
    let from = start.and_then(midnight);
    let before = end
        .and_then(|d| d.checked_add_days(Days::new(1)))
        .and_then(midnight);
    (from, before)
}

/// Parse optional `start_date` / `end_date` values into a UTC range.
pub(crate) fn date_range(
    start: Option<&str>,
    end: Option<&str>,
) -> Result<(Option<DateTime<Utc>>, Option<DateTime<Utc>>), AppError> {
    let start = non_empty(start)
        .map(|s| parse_date("start_date", s))
        .transpose()?;
    let end = non_empty(end).map(|s| parse_date("end_date", s)).transpose()?;
    Ok(day_range(start, end))
}

fn midnight(date: NaiveDate) -> Option<DateTime<Utc>> {
    date.and_hms_opt(0, 0, 0).map(|dt| dt.and_utc())
}

/// `None` for absent or blank values.
pub(crate) fn non_empty(raw: Option<&str>) -> Option<&str> {
    raw.map(str::trim).filter(|s| !s.is_empty())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    #[test]
    fn test_date_range_is_inclusive_of_end_day() {
        let (from, before) = date_range(Some("2024-03-01"), Some("2024-03-31")).unwrap();
        assert_eq!(from, Some(Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap()));
        assert_eq!(before, Some(Utc.with_ymd_and_hms(2024, 4, 1, 0, 0, 0).unwrap()));
    }

    #[test]
    fn test_date_range_blank_and_invalid() {
        assert_eq!(date_range(None, Some("  ")).unwrap(), (None, None));
        assert!(matches!(
            date_range(Some("03/01/2024"), None),
            Err(AppError::BadRequest(_))
        ));
    }

    #[test]
    fn test_non_empty() {
        assert_eq!(non_empty(Some(" x ")), Some("x"));
        assert_eq!(non_empty(Some("")), None);
        assert_eq!(non_empty(None), None);
    }
}
