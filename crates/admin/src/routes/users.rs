//! Staff account management (owner/admin only).

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};
use serde::Deserialize;
use tracing::instrument;

use lumen_core::pagination::{clamp_limit, page_offset};
use lumen_core::{Email, Page, UserId, UserRole, UserStatus};

use crate::db::{RepositoryError, UserRepository};
use crate::error::AppError;
use crate::middleware::RequireUserManager;
use crate::models::{NewUser, SortOrder, User, UserChanges, UserListQuery, UserSort};
use crate::services::hash_password;
use crate::state::AppState;

use super::non_empty;

const DEFAULT_PAGE_SIZE: i64 = 10;
const MAX_PAGE_SIZE: i64 = 100;

/// Build the users router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/users", get(list).post(create))
        .route(
            "/api/users/{id}",
            get(show).put(update).patch(update).delete(remove),
        )
}

/// Query parameters for the user list.
#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub query: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
    pub sort: Option<String>,
    pub order: Option<String>,
    pub role: Option<String>,
    pub status: Option<String>,
}

impl ListParams {
    fn to_query(&self) -> Result<(UserListQuery, i64), AppError> {
        let page = self.page.unwrap_or(1).max(1);
        let limit = clamp_limit(self.limit, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE);
        let query = UserListQuery {
            search: non_empty(self.query.as_deref()).map(String::from),
            role: parse_filter(self.role.as_deref(), "role")?,
            status: parse_filter(self.status.as_deref(), "status")?,
            sort: UserSort::from_param(self.sort.as_deref()),
            order: SortOrder::from_param(self.order.as_deref()),
            offset: page_offset(page, limit),
            limit,
        };
        Ok((query, page))
    }
}

/// Body for creating a user. Fields are optional so that missing values
/// produce a readable 400 instead of a deserialization error.
#[derive(Debug, Default, Deserialize)]
pub struct CreateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub phone: Option<String>,
    pub role: Option<String>,
    pub status: Option<String>,
    pub team: Option<String>,
}

/// Body for updating a user. Absent or blank fields are left unchanged.
#[derive(Debug, Default, Deserialize)]
pub struct UpdateUserRequest {
    pub name: Option<String>,
    pub email: Option<String>,
    pub password: Option<String>,
    pub phone: Option<String>,
    pub role: Option<String>,
    pub status: Option<String>,
    pub team: Option<String>,
}

/// List users with search, filters, sorting and paging.
#[instrument(skip(_admin, state))]
async fn list(
    RequireUserManager(_admin): RequireUserManager,
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Result<Response, AppError> {
    let (query, page) = params.to_query()?;
    let (users, total) = UserRepository::new(state.pool()).list(&query).await?;

    let mut response = Json(Page::new(users, total, page, query.limit)).into_response();
    response.headers_mut().insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-cache, no-store, must-revalidate"),
    );
    Ok(response)
}

#[instrument(skip(_admin, state))]
async fn show(
    RequireUserManager(_admin): RequireUserManager,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<User>, AppError> {
    UserRepository::new(state.pool())
        .get(UserId::new(id))
        .await?
        .map(Json)
        .ok_or_else(user_not_found)
}

/// Create a user.
///
/// # Errors
///
/// 400 for missing or invalid fields, 409 when the email is taken.
#[instrument(skip(admin, state, body), fields(admin_id = %admin.id))]
async fn create(
    RequireUserManager(admin): RequireUserManager,
    State(state): State<AppState>,
    Json(body): Json<CreateUserRequest>,
) -> Result<(StatusCode, Json<User>), AppError> {
    let new_user = validate_new_user(body)?;
    let user = UserRepository::new(state.pool()).create(&new_user).await?;

    tracing::info!(user_id = %user.id, role = %user.role, "User created");
    Ok((StatusCode::CREATED, Json(user)))
}

#[instrument(skip(admin, state, body), fields(admin_id = %admin.id))]
async fn update(
    RequireUserManager(admin): RequireUserManager,
    State(state): State<AppState>,
    Path(id): Path<i32>,
    Json(body): Json<UpdateUserRequest>,
) -> Result<Json<User>, AppError> {
    let changes = validate_changes(body)?;
    let user = UserRepository::new(state.pool())
        .update(UserId::new(id), &changes)
        .await
        .map_err(|e| match e {
            RepositoryError::NotFound => user_not_found(),
            other => other.into(),
        })?;
    Ok(Json(user))
}

#[instrument(skip(admin, state), fields(admin_id = %admin.id))]
async fn remove(
    RequireUserManager(admin): RequireUserManager,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<StatusCode, AppError> {
    if UserRepository::new(state.pool()).delete(UserId::new(id)).await? {
        tracing::info!(user_id = id, "User deleted");
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(user_not_found())
    }
}

// =============================================================================
// Validation
// =============================================================================

fn user_not_found() -> AppError {
    AppError::NotFound("User not found".to_string())
}

/// Parse a role/status filter where `all` (or blank) means no filter.
fn parse_filter<T: std::str::FromStr>(raw: Option<&str>, field: &str) -> Result<Option<T>, AppError> {
    match non_empty(raw) {
        None => Ok(None),
        Some(v) if v.eq_ignore_ascii_case("all") => Ok(None),
        Some(v) => v
            .parse()
            .map(Some)
            .map_err(|_| AppError::BadRequest(format!("Invalid {field}"))),
    }
}

fn parse_field<T: std::str::FromStr>(raw: Option<&str>, field: &str) -> Result<Option<T>, AppError> {
    non_empty(raw)
        .map(|v| {
            v.parse()
                .map_err(|_| AppError::BadRequest(format!("Invalid {field}")))
        })
        .transpose()
}

fn parse_email(raw: &str) -> Result<Email, AppError> {
    Email::parse(raw).map_err(|e| AppError::BadRequest(e.to_string()))
}

fn validate_new_user(body: CreateUserRequest) -> Result<NewUser, AppError> {
    let (Some(name), Some(email), Some(password)) = (
        non_empty(body.name.as_deref()),
        non_empty(body.email.as_deref()),
        non_empty(body.password.as_deref()),
    ) else {
        return Err(AppError::BadRequest(
            "Name, email and password are required".to_string(),
        ));
    };

    let password_hash =
        hash_password(password).map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(NewUser {
        name: name.to_string(),
        email: parse_email(email)?,
        phone: non_empty(body.phone.as_deref()).map(String::from),
        password_hash,
        role: parse_field(body.role.as_deref(), "role")?.unwrap_or(UserRole::Employee),
        status: parse_field(body.status.as_deref(), "status")?.unwrap_or(UserStatus::Active),
        team: non_empty(body.team.as_deref()).map(String::from),
    })
}

fn validate_changes(body: UpdateUserRequest) -> Result<UserChanges, AppError> {
    let password_hash = non_empty(body.password.as_deref())
        .map(hash_password)
        .transpose()
        .map_err(|e| AppError::Internal(e.to_string()))?;

    Ok(UserChanges {
        name: non_empty(body.name.as_deref()).map(String::from),
        email: non_empty(body.email.as_deref()).map(parse_email).transpose()?,
        phone: non_empty(body.phone.as_deref()).map(String::from),
        password_hash,
        role: parse_field(body.role.as_deref(), "role")?,
        status: parse_field(body.status.as_deref(), "status")?,
        team: non_empty(body.team.as_deref()).map(String::from),
    })
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_list_params_defaults() {
        let (query, page) = ListParams::default().to_query().unwrap();
        assert_eq!(page, 1);
        assert_eq!(query.limit, 10);
        assert_eq!(query.offset, 0);
        assert_eq!(query.sort, UserSort::CreatedAt);
        assert_eq!(query.order, SortOrder::Desc);
        assert!(query.role.is_none());
    }

    #[test]
    fn test_list_params_filters_and_paging() {
        let params = ListParams {
            query: Some("  asha ".to_string()),
            page: Some(3),
            limit: Some(500),
            role: Some("all".to_string()),
            status: Some("suspended".to_string()),
            sort: Some("email".to_string()),
            order: Some("ASC".to_string()),
        };
        let (query, page) = params.to_query().unwrap();
        assert_eq!(page, 3);
        assert_eq!(query.limit, 100);
        assert_eq!(query.offset, 200);
        assert_eq!(query.search.as_deref(), Some("asha"));
        assert!(query.role.is_none());
        assert_eq!(query.status, Some(UserStatus::Suspended));
        assert_eq!(query.order, SortOrder::Asc);
    }

    #[test]
    fn test_huge_page_does_not_overflow() {
        let params = ListParams {
            page: Some(i64::MAX),
            limit: Some(100),
            ..ListParams::default()
        };
        let (query, page) = params.to_query().unwrap();
        assert_eq!(page, i64::MAX);
        assert_eq!(query.offset, lumen_core::pagination::MAX_OFFSET);
    }

    #[test]
    fn test_invalid_role_filter_rejected() {
        let params = ListParams {
            role: Some("wizard".to_string()),
            ..ListParams::default()
        };
        assert!(matches!(params.to_query(), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_new_user_requires_fields() {
        let body = CreateUserRequest {
            name: Some("Asha".to_string()),
            email: Some("asha@example.com".to_string()),
            password: Some("   ".to_string()),
            ..CreateUserRequest::default()
        };
        let err = validate_new_user(body).unwrap_err();
        assert_eq!(err.to_string(), "Name, email and password are required");
    }

    #[test]
    fn test_new_user_defaults_and_trimming() {
        let body = CreateUserRequest {
            name: Some("  Asha  ".to_string()),
            email: Some(" Asha@Example.com ".to_string()),
            password: Some("correct horse".to_string()),
            team: Some("  ".to_string()),
            ..CreateUserRequest::default()
        };
        let user = validate_new_user(body).unwrap();
        assert_eq!(user.name, "Asha");
        assert_eq!(user.email.as_str(), "asha@example.com");
        assert_eq!(user.role, UserRole::Employee);
        assert_eq!(user.status, UserStatus::Active);
        assert!(user.team.is_none());
        assert_ne!(user.password_hash, "correct horse");
    }

    #[test]
    fn test_invalid_email_rejected() {
        let body = CreateUserRequest {
            name: Some("Asha".to_string()),
            email: Some("not-an-email".to_string()),
            password: Some("pw".to_string()),
            ..CreateUserRequest::default()
        };
        assert!(matches!(validate_new_user(body), Err(AppError::BadRequest(_))));
    }

    #[test]
    fn test_blank_password_keeps_existing_hash() {
        let changes = validate_changes(UpdateUserRequest {
            password: Some(String::new()),
            role: Some("manager".to_string()),
            ..UpdateUserRequest::default()
        })
        .unwrap();
        assert!(changes.password_hash.is_none());
        assert_eq!(changes.role, Some(UserRole::Manager));
    }
}
