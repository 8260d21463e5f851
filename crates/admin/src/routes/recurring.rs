//! Recurring task templates and manual spawner runs (supervisors).

use axum::{
    Json, Router,
    extract::State,
    http::StatusCode,
    routing::{get, post},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use lumen_core::tasks::RecurrenceFrequency;
use lumen_core::{Board, TaskPriority, TaskStatus, UserId};

use crate::db::{RecurringTemplateRepository, UserRepository};
use crate::error::AppError;
use crate::middleware::RequireSupervisor;
use crate::models::{NewRecurringTemplate, RecurringTemplate};
use crate::services::spawn_due_tasks;
use crate::state::AppState;

use super::non_empty;

/// Build the recurring templates router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/recurring-templates", get(list).post(create))
        .route("/api/recurring-templates/run", post(run))
}

#[derive(Debug, Default, Deserialize)]
pub struct TemplateRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub board: Option<String>,
    pub default_status: Option<String>,
    pub priority: Option<String>,
    pub frequency: Option<String>,
    pub hour: Option<i32>,
    pub minute: Option<i32>,
    pub weekday: Option<i32>,
    pub assigned_to_id: Option<i32>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Serialize)]
pub struct RunResponse {
    pub spawned: usize,
}

#[instrument(skip(_user, state))]
async fn list(
    RequireSupervisor(_user): RequireSupervisor,
    State(state): State<AppState>,
) -> Result<Json<Vec<RecurringTemplate>>, AppError> {
    Ok(Json(RecurringTemplateRepository::new(state.pool()).list().await?))
}

#[instrument(skip(user, state, body), fields(user_id = %user.id))]
async fn create(
    RequireSupervisor(user): RequireSupervisor,
    State(state): State<AppState>,
    Json(body): Json<TemplateRequest>,
) -> Result<(StatusCode, Json<RecurringTemplate>), AppError> {
    let template = validate_template(body, user.id)?;
    if UserRepository::new(state.pool())
        .get(template.assigned_to_id)
        .await?
        .is_none()
    {
        return Err(AppError::Unprocessable("Assignee not found".to_string()));
    }

    let created = RecurringTemplateRepository::new(state.pool())
        .create(&template)
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// Spawn every template due right now, recording the caller as creator.
#[instrument(skip(user, state), fields(user_id = %user.id))]
async fn run(
    RequireSupervisor(user): RequireSupervisor,
    State(state): State<AppState>,
) -> Result<Json<RunResponse>, AppError> {
    let spawned = spawn_due_tasks(state.pool(), Utc::now(), Some(user.id)).await?;
    Ok(Json(RunResponse { spawned }))
}

fn unprocessable(msg: &str) -> AppError {
    AppError::Unprocessable(msg.to_string())
}

fn parse_frequency(raw: Option<&str>) -> Result<RecurrenceFrequency, AppError> {
    match non_empty(raw).map(str::to_ascii_uppercase).as_deref() {
        None | Some("DAILY") => Ok(RecurrenceFrequency::Daily),
        Some("WEEKLY") => Ok(RecurrenceFrequency::Weekly),
        Some(_) => Err(unprocessable("Invalid frequency")),
    }
}

fn validate_template(body: TemplateRequest, creator: UserId) -> Result<NewRecurringTemplate, AppError> {
    let title = non_empty(body.title.as_deref())
        .ok_or_else(|| AppError::BadRequest("Title is required".to_string()))?;
    let board = match non_empty(body.board.as_deref()) {
        Some(raw) => raw.parse::<Board>().map_err(|_| unprocessable("Invalid board"))?,
        None => Board::Daily,
    };
    let default_status = non_empty(body.default_status.as_deref())
        .map(|raw| {
            raw.parse::<TaskStatus>()
                .ok()
                .filter(|s| board.allows(*s))
                .ok_or_else(|| unprocessable("Invalid status for board"))
        })
        .transpose()?;
    let priority = non_empty(body.priority.as_deref())
        .map(|raw| raw.parse::<TaskPriority>().map_err(|_| unprocessable("Invalid priority")))
        .transpose()?
        .unwrap_or_default();
    let frequency = parse_frequency(body.frequency.as_deref())?;

    let hour = body.hour.unwrap_or(9);
    let minute = body.minute.unwrap_or(0);
    if !(0..24).contains(&hour) || !(0..60).contains(&minute) {
        return Err(unprocessable("Invalid time of day"));
    }
    let weekday = match frequency {
        RecurrenceFrequency::Weekly => Some(body.weekday.unwrap_or(1)),
        RecurrenceFrequency::Daily => body.weekday,
    };
    if weekday.is_some_and(|d| !(1..=7).contains(&d)) {
        return Err(unprocessable("Weekday must be 1 (Monday) to 7 (Sunday)"));
    }

    Ok(NewRecurringTemplate {
        title: title.to_string(),
        description: non_empty(body.description.as_deref()).map(String::from),
        board,
        default_status,
        priority,
        frequency,
        hour,
        minute,
        weekday,
        assigned_to_id: body.assigned_to_id.map_or(creator, UserId::new),
        created_by_id: creator,
        tags: body
            .tags
            .into_iter()
            .map(|t| t.trim().to_string())
            .filter(|t| !t.is_empty())
            .collect(),
    })
}
