//! Kanban tasks: listing, board view, edits, moves, proof, comments and
//! the activity log.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, patch, post},
};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tracing::instrument;

use lumen_core::tasks::{
    ActivityAction, EditScope, MoveContext, MoveError, MoveRequest, TaskStats, edit_scope,
    validate_move,
};
use lumen_core::{Board, TaskId, TaskPriority, TaskStatus, UserId, UserRole};

use crate::db::{TaskRepository, UserRepository};
use crate::error::AppError;
use crate::middleware::{CurrentUser, RequireSupervisor};
use crate::models::{Activity, Comment, NewTask, Task, TaskChanges, TaskFilter, User};
use crate::state::AppState;

use super::non_empty;

/// Build the tasks router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/tasks", get(list).post(create))
        .route("/api/tasks/board", get(board))
        .route("/api/tasks/stats", get(stats))
        .route(
            "/api/tasks/{id}",
            get(show).patch(update).delete(remove),
        )
        .route("/api/tasks/{id}/move", patch(move_task))
        .route("/api/tasks/{id}/proof", post(add_proof))
        .route(
            "/api/tasks/{id}/comments",
            get(comments).post(add_comment),
        )
        .route("/api/tasks/{id}/activity", get(activity))
}

// =============================================================================
// Request / response types
// =============================================================================

/// Listing scope and filters shared by list, board and stats.
#[derive(Debug, Default, Deserialize)]
pub struct TaskQuery {
    /// `my` (default) or `team`.
    pub scope: Option<String>,
    pub board: Option<String>,
    pub status: Option<String>,
    pub q: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct CreateTaskRequest {
    pub title: Option<String>,
    pub board: Option<String>,
    pub status: Option<String>,
    pub assigned_to_id: Option<i32>,
    pub description: Option<String>,
    pub priority: Option<String>,
    pub due_date: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tags: Vec<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateTaskRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<String>,
    pub tags: Option<Vec<String>>,
    pub due_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Deserialize)]
pub struct MoveTaskRequest {
    pub to_status: Option<String>,
    pub to_board: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct ProofRequest {
    #[serde(default)]
    pub proof_url: String,
}

#[derive(Debug, Deserialize)]
pub struct CommentRequest {
    #[serde(default)]
    pub content: String,
}

#[derive(Debug, Serialize)]
pub struct BoardColumn {
    pub status: TaskStatus,
    pub tasks: Vec<Task>,
}

#[derive(Debug, Serialize)]
pub struct BoardView {
    pub board: Board,
    pub columns: Vec<BoardColumn>,
}

// =============================================================================
// Listing
// =============================================================================

#[instrument(skip(user, state), fields(user_id = %user.id))]
async fn list(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Query(query): Query<TaskQuery>,
) -> Result<Json<Vec<Task>>, AppError> {
    let filter = task_filter(&user, &query)?;
    Ok(Json(TaskRepository::new(state.pool()).list(&filter).await?))
}

/// Tasks grouped into the columns of one board.
#[instrument(skip(user, state), fields(user_id = %user.id))]
async fn board(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Query(query): Query<TaskQuery>,
) -> Result<Json<BoardView>, AppError> {
    let mut filter = task_filter(&user, &query)?;
    let board = *filter.board.get_or_insert(Board::Daily);
    filter.status = None;

    let tasks = TaskRepository::new(state.pool()).list(&filter).await?;
    Ok(Json(group_by_column(board, tasks)))
}

#[instrument(skip(user, state), fields(user_id = %user.id))]
async fn stats(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Query(query): Query<TaskQuery>,
) -> Result<Json<TaskStats>, AppError> {
    let filter = task_filter(&user, &query)?;
    let tasks = TaskRepository::new(state.pool()).list(&filter).await?;
    Ok(Json(TaskStats::compute(
        tasks.iter().map(Task::facts),
        Utc::now(),
    )))
}

// =============================================================================
// Single task
// =============================================================================

/// Create a task (supervisors).
///
/// # Errors
///
/// 400 without a title, 422 for an unknown board, status, priority or
/// assignee.
#[instrument(skip(user, state, body), fields(user_id = %user.id))]
async fn create(
    RequireSupervisor(user): RequireSupervisor,
    State(state): State<AppState>,
    Json(body): Json<CreateTaskRequest>,
) -> Result<(StatusCode, Json<Task>), AppError> {
    let new_task = validate_new_task(body, user.id)?;
    if UserRepository::new(state.pool())
        .get(new_task.assigned_to_id)
        .await?
        .is_none()
    {
        return Err(AppError::Unprocessable("Assignee not found".to_string()));
    }

    let repo = TaskRepository::new(state.pool());
    let task = repo.create(&new_task).await?;
    repo.log_activity(
        task.id,
        user.id,
        ActivityAction::Create,
        &json!({ "title": task.title, "board": task.board }),
    )
    .await?;

    Ok((StatusCode::CREATED, Json(task)))
}

#[instrument(skip(user, state), fields(user_id = %user.id))]
async fn show(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<Task>, AppError> {
    let task = load_visible(&state, &user, id).await?;
    Ok(Json(task))
}

/// Edit task fields.
///
/// # Errors
///
/// 403 when the user may not edit the task or tries to rename it without
/// a supervisor role.
#[instrument(skip(user, state, body), fields(user_id = %user.id))]
async fn update(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(body): Json<UpdateTaskRequest>,
) -> Result<Json<Task>, AppError> {
    let task = load(&state, id).await?;
    let scope = edit_scope(user.role, task.assigned_to_id == user.id).ok_or_else(forbidden)?;
    let changes = validate_changes(body, scope)?;

    let repo = TaskRepository::new(state.pool());
    let updated = repo.update(task.id, &changes).await?;
    repo.log_activity(
        task.id,
        user.id,
        ActivityAction::Update,
        &json!({ "fields": changes.field_names() }),
    )
    .await?;

    Ok(Json(updated))
}

/// Move a task to another column or board.
///
/// # Errors
///
/// 422 with the rule that rejected the move.
#[instrument(skip(user, state, body), fields(user_id = %user.id))]
async fn move_task(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(body): Json<MoveTaskRequest>,
) -> Result<Json<Task>, AppError> {
    let task = load(&state, id).await?;
    edit_scope(user.role, task.assigned_to_id == user.id).ok_or_else(forbidden)?;

    let (board, status) = validate_move(
        MoveContext {
            board: task.board,
            tags: &task.tags,
            proof_url: task.proof_url.as_deref(),
        },
        MoveRequest {
            to_status: body.to_status.as_deref(),
            to_board: body.to_board.as_deref(),
        },
    )
    .map_err(move_rejected)?;

    let repo = TaskRepository::new(state.pool());
    let moved = repo.move_to(task.id, board, status).await?;
    repo.log_activity(
        task.id,
        user.id,
        ActivityAction::UpdateStatus,
        &json!({
            "from_status": task.status,
            "to_status": status,
            "to_board": board,
        }),
    )
    .await?;

    Ok(Json(moved))
}

#[instrument(skip(user, state, body), fields(user_id = %user.id))]
async fn add_proof(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(body): Json<ProofRequest>,
) -> Result<Json<Task>, AppError> {
    let proof_url = body.proof_url.trim();
    if proof_url.is_empty() {
        return Err(AppError::BadRequest("proof_url is required".to_string()));
    }

    let task = load(&state, id).await?;
    if !(user.role.is_supervisor() || task.assigned_to_id == user.id) {
        return Err(forbidden());
    }

    let repo = TaskRepository::new(state.pool());
    let updated = repo.set_proof(task.id, proof_url).await?;
    repo.log_activity(
        task.id,
        user.id,
        ActivityAction::AddProof,
        &json!({ "proof_url": proof_url }),
    )
    .await?;

    Ok(Json(updated))
}

/// Delete a task with its comments and activity (supervisor or creator).
#[instrument(skip(user, state), fields(user_id = %user.id))]
async fn remove(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<StatusCode, AppError> {
    let task = load(&state, id).await?;
    if !(user.role.is_supervisor() || task.created_by_id == user.id) {
        return Err(forbidden());
    }

    TaskRepository::new(state.pool()).delete(task.id).await?;
    tracing::info!(task_id = %task.id, "Task deleted");
    Ok(StatusCode::NO_CONTENT)
}

// =============================================================================
// Comments and activity
// =============================================================================

#[instrument(skip(user, state), fields(user_id = %user.id))]
async fn comments(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<Vec<Comment>>, AppError> {
    let task = load_visible(&state, &user, id).await?;
    Ok(Json(TaskRepository::new(state.pool()).comments(task.id).await?))
}

#[instrument(skip(user, state, body), fields(user_id = %user.id))]
async fn add_comment(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(body): Json<CommentRequest>,
) -> Result<(StatusCode, Json<Comment>), AppError> {
    let content = body.content.trim();
    if content.is_empty() {
        return Err(AppError::BadRequest("Comment cannot be empty".to_string()));
    }

    let task = load_visible(&state, &user, id).await?;
    let repo = TaskRepository::new(state.pool());
    let comment = repo.add_comment(task.id, user.id, content).await?;
    repo.log_activity(
        task.id,
        user.id,
        ActivityAction::AddComment,
        &json!({ "length": content.chars().count() }),
    )
    .await?;

    Ok((StatusCode::CREATED, Json(comment)))
}

#[instrument(skip(user, state), fields(user_id = %user.id))]
async fn activity(
    CurrentUser(user): CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<Vec<Activity>>, AppError> {
    let task = load_visible(&state, &user, id).await?;
    Ok(Json(TaskRepository::new(state.pool()).activity(task.id).await?))
}

// =============================================================================
// Helpers
// =============================================================================

fn forbidden() -> AppError {
    AppError::Forbidden("Insufficient permissions".to_string())
}

async fn load(state: &AppState, id: i32) -> Result<Task, AppError> {
    TaskRepository::new(state.pool())
        .get(TaskId::new(id))
        .await?
        .ok_or_else(|| AppError::NotFound("Task not found".to_string()))
}

/// Load a task the user may read: supervisors see every task, other staff
/// only tasks assigned to or created by them.
async fn load_visible(state: &AppState, user: &User, id: i32) -> Result<Task, AppError> {
    let task = load(state, id).await?;
    if can_view(user, &task) {
        Ok(task)
    } else {
        Err(forbidden())
    }
}

fn can_view(user: &User, task: &Task) -> bool {
    user.role.is_supervisor() || task.assigned_to_id == user.id || task.created_by_id == user.id
}

fn move_rejected(err: MoveError) -> AppError {
    AppError::Unprocessable(err.to_string())
}

/// Resolve a listing query into repository filters for `user`.
fn task_filter(user: &User, query: &TaskQuery) -> Result<TaskFilter, AppError> {
    let mut filter = TaskFilter {
        board: non_empty(query.board.as_deref())
            .map(|b| b.parse::<Board>().map_err(|_| move_rejected(MoveError::InvalidBoard)))
            .transpose()?,
        status: non_empty(query.status.as_deref())
            .map(|s| {
                s.parse::<TaskStatus>()
                    .map_err(|_| AppError::Unprocessable("Invalid status".to_string()))
            })
            .transpose()?,
        search: non_empty(query.q.as_deref()).map(String::from),
        ..TaskFilter::default()
    };

    match non_empty(query.scope.as_deref()).unwrap_or("my") {
        "team" => {
            if !user.role.is_supervisor() {
                return Err(forbidden());
            }
            if user.role == UserRole::Manager {
                filter.team = user.team.clone();
            }
        }
        "my" => filter.assignee = Some(user.id),
        other => {
            return Err(AppError::BadRequest(format!("Invalid scope: {other}")));
        }
    }

    Ok(filter)
}

fn group_by_column(board: Board, tasks: Vec<Task>) -> BoardView {
    let mut columns: Vec<BoardColumn> = board
        .statuses()
        .iter()
        .map(|&status| BoardColumn {
            status,
            tasks: Vec::new(),
        })
        .collect();

    for task in tasks {
        if let Some(column) = columns.iter_mut().find(|c| c.status == task.status) {
            column.tasks.push(task);
        }
    }

    BoardView { board, columns }
}

fn parse_priority(raw: Option<&str>) -> Result<Option<TaskPriority>, AppError> {
    non_empty(raw)
        .map(|p| {
            p.parse()
                .map_err(|_| AppError::Unprocessable("Invalid priority".to_string()))
        })
        .transpose()
}

fn clean_tags(tags: Vec<String>) -> Vec<String> {
    let mut cleaned: Vec<String> = Vec::with_capacity(tags.len());
    for tag in tags {
        let tag = tag.trim();
        if !tag.is_empty() && !cleaned.iter().any(|t| t == tag) {
            cleaned.push(tag.to_string());
        }
    }
    cleaned
}

fn validate_new_task(body: CreateTaskRequest, creator: UserId) -> Result<NewTask, AppError> {
    let title = non_empty(body.title.as_deref())
        .ok_or_else(|| AppError::BadRequest("Title is required".to_string()))?;
    let board = match non_empty(body.board.as_deref()) {
        Some(raw) => raw
            .parse::<Board>()
            .map_err(|_| move_rejected(MoveError::InvalidBoard))?,
        None => Board::Daily,
    };
    let status = match non_empty(body.status.as_deref()) {
        Some(raw) => raw
            .parse::<TaskStatus>()
            .ok()
            .filter(|s| board.allows(*s))
            .ok_or_else(|| move_rejected(MoveError::InvalidStatus))?,
        None => board.initial_status(),
    };

    Ok(NewTask {
        title: title.to_string(),
        description: non_empty(body.description.as_deref()).map(String::from),
        board,
        status,
        priority: parse_priority(body.priority.as_deref())?.unwrap_or_default(),
        due_date: body.due_date,
        is_recurring: false,
        tags: clean_tags(body.tags),
        created_by_id: creator,
        assigned_to_id: body.assigned_to_id.map_or(creator, UserId::new),
    })
}

fn validate_changes(body: UpdateTaskRequest, scope: EditScope) -> Result<TaskChanges, AppError> {
    let title = non_empty(body.title.as_deref()).map(String::from);
    if title.is_some() && scope == EditScope::WithoutTitle {
        return Err(AppError::Forbidden(
            "Only supervisors can change the title".to_string(),
        ));
    }

    let changes = TaskChanges {
        title,
        description: body.description.map(|d| d.trim().to_string()),
        priority: parse_priority(body.priority.as_deref())?,
        tags: body.tags.map(clean_tags),
        due_date: body.due_date,
    };
    if changes.is_empty() {
        return Err(AppError::BadRequest("No changes provided".to_string()));
    }
    Ok(changes)
}
