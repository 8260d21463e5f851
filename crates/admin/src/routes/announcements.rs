//! Staff announcements.

use axum::{Json, Router, extract::State, http::StatusCode, routing::get};
use serde::Deserialize;
use tracing::instrument;

use crate::db::AnnouncementRepository;
use crate::error::AppError;
use crate::middleware::{CurrentUser, RequireSupervisor};
use crate::models::Announcement;
use crate::state::AppState;

/// Build the announcements router.
pub fn router() -> Router<AppState> {
    Router::new().route("/api/announcements", get(list).post(create))
}

#[derive(Debug, Deserialize)]
pub struct AnnouncementRequest {
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub body: String,
}

#[instrument(skip(_user, state))]
async fn list(
    CurrentUser(_user): CurrentUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Announcement>>, AppError> {
    Ok(Json(AnnouncementRepository::new(state.pool()).list().await?))
}

#[instrument(skip(user, state, body), fields(user_id = %user.id))]
async fn create(
    RequireSupervisor(user): RequireSupervisor,
    State(state): State<AppState>,
    Json(body): Json<AnnouncementRequest>,
) -> Result<(StatusCode, Json<Announcement>), AppError> {
    let (title, text) = (body.title.trim(), body.body.trim());
    if title.is_empty() || text.is_empty() {
        return Err(AppError::BadRequest(
            "Title and body are required".to_string(),
        ));
    }

    let announcement = AnnouncementRepository::new(state.pool())
        .create(title, text, user.id)
        .await?;
    Ok((StatusCode::CREATED, Json(announcement)))
}
