//! Request identity.
//!
//! The admin server sits behind a gateway that authenticates staff and
//! forwards the account ID in [`USER_ID_HEADER`]. These extractors load that
//! account and enforce role requirements.

use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, request::Parts},
};

use lumen_core::UserId;

use crate::db::UserRepository;
use crate::error::{AppError, set_sentry_user};
use crate::models::User;
use crate::state::AppState;

/// Header carrying the acting staff member's ID.
pub const USER_ID_HEADER: &str = "x-user-id";

/// The active staff account making the request.
///
/// Rejects with 401 when the header is missing, malformed or names no
/// account, and with 403 when the account is not active.
///
/// # Example
///
/// ```rust,ignore
/// async fn handler(CurrentUser(user): CurrentUser) -> String {
///     format!("Hello, {}!", user.name)
/// }
/// ```
#[derive(Debug, Clone)]
pub struct CurrentUser(pub User);

impl CurrentUser {
    /// Owner, admin or manager.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Forbidden` otherwise.
    pub fn require_supervisor(&self) -> Result<(), AppError> {
        if self.0.role.is_supervisor() {
            Ok(())
        } else {
            Err(AppError::Forbidden("Insufficient permissions".to_string()))
        }
    }

    /// Owner or admin.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Forbidden` otherwise.
    pub fn require_user_manager(&self) -> Result<(), AppError> {
        if self.0.role.can_manage_users() {
            Ok(())
        } else {
            Err(AppError::Forbidden("Insufficient permissions".to_string()))
        }
    }
}

impl FromRequestParts<AppState> for CurrentUser {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let id = user_id_from_headers(&parts.headers)?;
        let user = UserRepository::new(state.pool())
            .get(id)
            .await?
            .ok_or_else(|| AppError::Unauthorized("Unknown user".to_string()))?;

        if !user.is_active() {
            return Err(AppError::Forbidden("Account is not active".to_string()));
        }

        set_sentry_user(user.id.as_i32());
        Ok(Self(user))
    }
}

/// Extractor that additionally requires a supervisor role.
pub struct RequireSupervisor(pub User);

impl FromRequestParts<AppState> for RequireSupervisor {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let current = CurrentUser::from_request_parts(parts, state).await?;
        current.require_supervisor()?;
        Ok(Self(current.0))
    }
}

/// Extractor that additionally requires the owner or admin role.
pub struct RequireUserManager(pub User);

impl FromRequestParts<AppState> for RequireUserManager {
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let current = CurrentUser::from_request_parts(parts, state).await?;
        current.require_user_manager()?;
        Ok(Self(current.0))
    }
}

fn user_id_from_headers(headers: &HeaderMap) -> Result<UserId, AppError> {
    let raw = headers
        .get(USER_ID_HEADER)
        .ok_or_else(|| AppError::Unauthorized("Missing user identity".to_string()))?;

    raw.to_str()
        .ok()
        .and_then(|s| s.trim().parse::<i32>().ok())
        .filter(|id| *id > 0)
        .map(UserId::new)
        .ok_or_else(|| AppError::Unauthorized("Invalid user identity".to_string()))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::HeaderValue;
    use chrono::Utc;
    use lumen_core::{Email, UserRole, UserStatus};

    use super::*;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(USER_ID_HEADER, HeaderValue::from_str(value).unwrap());
        headers
    }

    fn user(role: UserRole) -> CurrentUser {
        CurrentUser(User {
            id: UserId::new(1),
            name: "Asha".to_string(),
            email: Email::parse("asha@example.com").unwrap(),
            phone: None,
            role,
            status: UserStatus::Active,
            team: None,
            last_login: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        })
    }

    #[test]
    fn test_user_id_header_parsing() {
        assert_eq!(user_id_from_headers(&headers(" 42 ")).unwrap(), UserId::new(42));
        assert!(matches!(
            user_id_from_headers(&HeaderMap::new()),
            Err(AppError::Unauthorized(_))
        ));
        assert!(user_id_from_headers(&headers("abc")).is_err());
        assert!(user_id_from_headers(&headers("0")).is_err());
        assert!(user_id_from_headers(&headers("-3")).is_err());
    }

    #[test]
    fn test_role_requirements() {
        assert!(user(UserRole::Manager).require_supervisor().is_ok());
        assert!(matches!(
            user(UserRole::Manager).require_user_manager(),
            Err(AppError::Forbidden(_))
        ));
        assert!(user(UserRole::Admin).require_user_manager().is_ok());
        assert!(user(UserRole::Packer).require_supervisor().is_err());
        assert!(user(UserRole::Employee).require_supervisor().is_err());
    }
}
