//! Unified error handling for the HTTP API.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use crate::crypto::CipherError;
use crate::db::RepositoryError;
use crate::services::sync::SyncError;
use crate::shopify::ShopifyError;

/// Application-level error type returned by handlers.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Shopify API operation failed.
    #[error("Shopify error: {0}")]
    Shopify(#[from] ShopifyError),

    /// Stored credentials could not be encrypted or decrypted.
    #[error("Cipher error: {0}")]
    Cipher(#[from] CipherError),

    /// Resource not found.
    #[error("{0}")]
    NotFound(String),

    /// No usable identity on the request.
    #[error("{0}")]
    Unauthorized(String),

    /// User lacks permission.
    #[error("{0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("{0}")]
    BadRequest(String),

    /// Request conflicts with current state (duplicate, illegal transition).
    #[error("{0}")]
    Conflict(String),

    /// Well-formed request that breaks a business rule.
    #[error("{0}")]
    Unprocessable(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<SyncError> for AppError {
    fn from(err: SyncError) -> Self {
        match err {
            SyncError::NotConfigured => {
                Self::BadRequest("No Shopify configuration found".to_string())
            }
            SyncError::Shopify(e) => Self::Shopify(e),
            SyncError::Cipher(e) => Self::Cipher(e),
            SyncError::Repository(e) => Self::Database(e),
        }
    }
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            Self::Database(RepositoryError::NotFound) | Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Database(RepositoryError::Conflict(_)) | Self::Conflict(_) => {
                StatusCode::CONFLICT
            }
            Self::Database(_) | Self::Cipher(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Shopify(ShopifyError::InvalidDomain(_)) | Self::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Shopify(ShopifyError::RateLimited(_)) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Shopify(_) => StatusCode::BAD_GATEWAY,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
        }
    }

    fn detail(&self) -> String {
        match self {
            Self::Database(RepositoryError::NotFound) => "Not found".to_string(),
            Self::Database(RepositoryError::Conflict(msg)) => msg.clone(),
            // Don't expose internal error details to clients
            Self::Database(_) | Self::Cipher(_) | Self::Internal(_) => {
                "Internal server error".to_string()
            }
            Self::Shopify(ShopifyError::Http(_)) => "Could not reach Shopify".to_string(),
            _ => self.to_string(),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();

        if status.is_server_error() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        (status, Json(json!({ "detail": self.detail() }))).into_response()
    }
}

/// Sentry user context: the account ID only, no contact details.
#[must_use]
pub fn sentry_user(user_id: i32) -> sentry::User {
    sentry::User {
        id: Some(user_id.to_string()),
        ..Default::default()
    }
}

/// Set the Sentry user context for the current request.
pub fn set_sentry_user(user_id: i32) {
    sentry::configure_scope(|scope| scope.set_user(Some(sentry_user(user_id))));
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_sentry_user_carries_id_only() {
        let user = sentry_user(42);
        assert_eq!(user.id.as_deref(), Some("42"));
        assert!(user.email.is_none());
        assert!(user.username.is_none());
        assert!(user.ip_address.is_none());
    }

    fn get_status(err: AppError) -> StatusCode {
        err.into_response().status()
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("User not found".to_string());
        assert_eq!(err.to_string(), "User not found");

        let err = AppError::Unprocessable("Invalid board".to_string());
        assert_eq!(err.to_string(), "Invalid board");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            get_status(AppError::NotFound("test".to_string())),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Unauthorized("test".to_string())),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            get_status(AppError::Forbidden("test".to_string())),
            StatusCode::FORBIDDEN
        );
        assert_eq!(
            get_status(AppError::BadRequest("test".to_string())),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::Conflict("test".to_string())),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(AppError::Unprocessable("test".to_string())),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            get_status(AppError::Internal("test".to_string())),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_repository_errors_map_to_http() {
        assert_eq!(
            get_status(AppError::Database(RepositoryError::NotFound)),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            get_status(AppError::Database(RepositoryError::Conflict(
                "Email already exists".to_string()
            ))),
            StatusCode::CONFLICT
        );
        assert_eq!(
            get_status(AppError::Database(RepositoryError::DataCorruption(
                "bad row".to_string()
            ))),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_shopify_errors_map_to_http() {
        assert_eq!(
            get_status(AppError::Shopify(ShopifyError::Unauthorized)),
            StatusCode::BAD_GATEWAY
        );
        assert_eq!(
            get_status(AppError::Shopify(ShopifyError::InvalidDomain(String::new()))),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            get_status(AppError::Shopify(ShopifyError::RateLimited(2))),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_not_configured_is_bad_request() {
        let err = AppError::from(SyncError::NotConfigured);
        assert_eq!(err.to_string(), "No Shopify configuration found");
        assert_eq!(get_status(err), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_internal_details_hidden() {
        let err = AppError::Internal("pool exhausted at 10.0.0.3".to_string());
        assert_eq!(err.detail(), "Internal server error");

        let err = AppError::Database(RepositoryError::Conflict("Email already exists".into()));
        assert_eq!(err.detail(), "Email already exists");
    }
}
