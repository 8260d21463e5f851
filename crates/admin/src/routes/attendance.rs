//! Attendance: check in/out, records, hour reports and overtime.

use axum::{
    Json, Router,
    extract::{Query, State},
    routing::{get, post},
};
use serde::{Deserialize, Serialize};
use tracing::instrument;

use lumen_core::UserId;
use lumen_core::attendance::{DEFAULT_OVERTIME_THRESHOLD_HOURS, overtime_hours};

use crate::db::{AttendanceRepository, RepositoryError};
use crate::error::AppError;
use crate::middleware::{CurrentUser, RequireSupervisor};
use crate::models::{ActiveEmployee, AttendanceRecord, EmployeeHours, User};
use crate::state::AppState;

use super::{date_range, day_range, non_empty, parse_date};

/// Build the attendance router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/attendance/check_in", post(check_in))
        .route("/api/attendance/check_out", post(check_out))
        .route("/api/attendance/records", get(records))
        .route("/api/attendance/report", get(report))
        .route("/api/attendance/overtime", get(overtime))
        .route("/api/attendance/active", get(active))
}

/// Optional target employee; defaults to the caller.
#[derive(Debug, Default, Deserialize)]
pub struct CheckRequest {
    pub employee_id: Option<i32>,
}

#[derive(Debug, Default, Deserialize)]
pub struct RecordsParams {
    pub employee_id: Option<i32>,
    /// Single day, `YYYY-MM-DD`.
    pub date: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct ReportParams {
    pub employee_id: Option<i32>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
    pub threshold_hours: Option<f64>,
}

#[derive(Debug, Serialize)]
pub struct CheckResponse {
    pub message: &'static str,
    pub record: AttendanceRecord,
}

/// Hours of one employee with the part above the threshold.
#[derive(Debug, Serialize)]
pub struct OvertimeRow {
    #[serde(flatten)]
    pub hours: EmployeeHours,
    pub overtime_hours: f64,
    pub threshold_hours: f64,
}

// =============================================================================
// Check in / out
// =============================================================================

/// Open a new attendance record.
///
/// # Errors
///
/// 400 "Already checked in." when the latest record is still open.
#[instrument(skip(user, state, body), fields(user_id = %user.id))]
async fn check_in(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    body: Option<Json<CheckRequest>>,
) -> Result<Json<CheckResponse>, AppError> {
    let employee = target_employee(&user, body.and_then(|b| b.employee_id))?;
    let repo = AttendanceRepository::new(state.pool());

    if repo.latest(employee).await?.is_some_and(|r| r.is_open()) {
        return Err(already_checked_in());
    }
    let record = repo.check_in(employee).await.map_err(|e| match e {
        RepositoryError::Conflict(_) => already_checked_in(),
        other => other.into(),
    })?;

    tracing::info!(employee_id = %employee, "Checked in");
    Ok(Json(CheckResponse {
        message: "Checked in successfully.",
        record,
    }))
}

/// Close the latest attendance record.
///
/// # Errors
///
/// 400 "Not checked in yet." without any record and "Already checked
/// out." when the latest record is closed.
#[instrument(skip(user, state, body), fields(user_id = %user.id))]
async fn check_out(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    body: Option<Json<CheckRequest>>,
) -> Result<Json<CheckResponse>, AppError> {
    let employee = target_employee(&user, body.and_then(|b| b.employee_id))?;
    let repo = AttendanceRepository::new(state.pool());

    let latest = repo
        .latest(employee)
        .await?
        .ok_or_else(|| AppError::BadRequest("Not checked in yet.".to_string()))?;
    if !latest.is_open() {
        return Err(already_checked_out());
    }
    let record = repo.check_out(latest.id).await.map_err(|e| match e {
        RepositoryError::NotFound => already_checked_out(),
        other => other.into(),
    })?;

    tracing::info!(employee_id = %employee, hours = record.hours(), "Checked out");
    Ok(Json(CheckResponse {
        message: "Checked out successfully.",
        record,
    }))
}

// =============================================================================
// Reports
// =============================================================================

#[instrument(skip(user, state), fields(user_id = %user.id))]
async fn records(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Query(params): Query<RecordsParams>,
) -> Result<Json<Vec<AttendanceRecord>>, AppError> {
    let employee = report_scope(&user, params.employee_id)?;
    let day = non_empty(params.date.as_deref())
        .map(|d| parse_date("date", d))
        .transpose()?;
    let (from, before) = day_range(day, day);

    Ok(Json(
        AttendanceRepository::new(state.pool())
            .list(employee, from, before)
            .await?,
    ))
}

#[instrument(skip(user, state), fields(user_id = %user.id))]
async fn report(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Query(params): Query<ReportParams>,
) -> Result<Json<Vec<EmployeeHours>>, AppError> {
    Ok(Json(hours_for(&state, &user, &params).await?))
}

#[instrument(skip(user, state), fields(user_id = %user.id))]
async fn overtime(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Query(params): Query<ReportParams>,
) -> Result<Json<Vec<OvertimeRow>>, AppError> {
    let threshold = params
        .threshold_hours
        .unwrap_or(DEFAULT_OVERTIME_THRESHOLD_HOURS);
    if !threshold.is_finite() || threshold < 0.0 {
        return Err(AppError::BadRequest(
            "threshold_hours must be a non-negative number".to_string(),
        ));
    }

    let hours = hours_for(&state, &user, &params).await?;
    Ok(Json(overtime_rows(hours, threshold)))
}

#[instrument(skip(_user, state))]
async fn active(
    RequireSupervisor(_user): RequireSupervisor,
    State(state): State<AppState>,
) -> Result<Json<Vec<ActiveEmployee>>, AppError> {
    Ok(Json(AttendanceRepository::new(state.pool()).active().await?))
}

// =============================================================================
// Helpers
// =============================================================================

fn already_checked_in() -> AppError {
    AppError::BadRequest("Already checked in.".to_string())
}

fn already_checked_out() -> AppError {
    AppError::BadRequest("Already checked out.".to_string())
}

fn insufficient_permissions() -> AppError {
    AppError::Forbidden("Insufficient permissions".to_string())
}

/// Employee a check in/out applies to.
fn target_employee(user: &User, requested: Option<i32>) -> Result<UserId, AppError> {
    match requested.map(UserId::new) {
        None => Ok(user.id),
        Some(id) if id == user.id => Ok(id),
        Some(id) if user.role.is_supervisor() => Ok(id),
        Some(_) => Err(insufficient_permissions()),
    }
}

/// Employee filter for reports. Supervisors may see everyone; other staff
/// only themselves.
fn report_scope(user: &User, requested: Option<i32>) -> Result<Option<UserId>, AppError> {
    if user.role.is_supervisor() {
        return Ok(requested.map(UserId::new));
    }
    target_employee(user, requested).map(Some)
}

async fn hours_for(
    state: &AppState,
    user: &User,
    params: &ReportParams,
) -> Result<Vec<EmployeeHours>, AppError> {
    let employee = report_scope(user, params.employee_id)?;
    let (from, before) = date_range(params.start_date.as_deref(), params.end_date.as_deref())?;
    Ok(AttendanceRepository::new(state.pool())
        .hours_by_employee(employee, from, before)
        .await?)
}

fn overtime_rows(hours: Vec<EmployeeHours>, threshold: f64) -> Vec<OvertimeRow> {
    hours
        .into_iter()
        .map(|h| OvertimeRow {
            overtime_hours: overtime_hours(h.total_hours, threshold),
            threshold_hours: threshold,
            hours: h,
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use lumen_core::{Email, UserRole, UserStatus};

    use super::*;

    fn user(role: UserRole) -> User {
        User {
            id: UserId::new(5),
            name: "Meera".to_string(),
            email: Email::parse("meera@example.com").unwrap(),
            phone: None,
            role,
            status: UserStatus::Active,
            team: None,
            last_login: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_target_employee() {
        let employee = user(UserRole::Employee);
        assert_eq!(target_employee(&employee, None).unwrap(), UserId::new(5));
        assert_eq!(target_employee(&employee, Some(5)).unwrap(), UserId::new(5));
        let err = target_employee(&employee, Some(9)).unwrap_err();
        assert_eq!(err.to_string(), "Insufficient permissions");

        let manager = user(UserRole::Manager);
        assert_eq!(target_employee(&manager, Some(9)).unwrap(), UserId::new(9));
    }

    #[test]
    fn test_report_scope() {
        assert_eq!(report_scope(&user(UserRole::Admin), None).unwrap(), None);
        assert_eq!(
            report_scope(&user(UserRole::Packer), None).unwrap(),
            Some(UserId::new(5))
        );
        assert!(report_scope(&user(UserRole::Packer), Some(1)).is_err());
    }

    #[test]
    fn test_overtime_rows() {
        let rows = overtime_rows(
            vec![
                EmployeeHours {
                    employee_id: UserId::new(1),
                    name: "Asha".to_string(),
                    total_hours: 10.25,
                    records: 2,
                },
                EmployeeHours {
                    employee_id: UserId::new(2),
                    name: "Ravi".to_string(),
                    total_hours: 6.0,
                    records: 1,
                },
            ],
            8.0,
        );
        assert!((rows[0].overtime_hours - 2.25).abs() < 1e-9);
        assert!(rows[1].overtime_hours.abs() < 1e-9);
        assert_eq!(rows[0].hours.name, "Asha");

        let json = serde_json::to_value(&rows[0]).unwrap();
        assert_eq!(json["employee_id"], 1);
        assert_eq!(json["threshold_hours"], 8.0);
    }
}
