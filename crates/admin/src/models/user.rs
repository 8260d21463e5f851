//! Staff account domain types.

use chrono::{DateTime, Utc};
use serde::Serialize;

use lumen_core::{Email, UserId, UserRole, UserStatus};

/// A staff account. The password hash never leaves the repository.
#[derive(Debug, Clone, Serialize)]
pub struct User {
    pub id: UserId,
    pub name: String,
    pub email: Email,
    pub phone: Option<String>,
    pub role: UserRole,
    pub status: UserStatus,
    pub team: Option<String>,
    pub last_login: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl User {
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.status == UserStatus::Active
    }
}

/// Data for inserting a user.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub name: String,
    pub email: Email,
    pub phone: Option<String>,
    pub password_hash: String,
    pub role: UserRole,
    pub status: UserStatus,
    pub team: Option<String>,
}

/// Partial update. `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub name: Option<String>,
    pub email: Option<Email>,
    pub phone: Option<String>,
    pub password_hash: Option<String>,
    pub role: Option<UserRole>,
    pub status: Option<UserStatus>,
    pub team: Option<String>,
}

/// Sortable user columns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum UserSort {
    Name,
    Email,
    Role,
    Status,
    #[default]
    CreatedAt,
    LastLogin,
}

impl UserSort {
    /// Parse a `sort` query parameter. Unknown columns fall back to
    /// `created_at`.
    #[must_use]
    pub fn from_param(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some("name") => Self::Name,
            Some("email") => Self::Email,
            Some("role") => Self::Role,
            Some("status") => Self::Status,
            Some("last_login") => Self::LastLogin,
            _ => Self::CreatedAt,
        }
    }

    /// Column name, safe to interpolate into SQL.
    #[must_use]
    pub const fn column(self) -> &'static str {
        match self {
            Self::Name => "name",
            Self::Email => "email",
            Self::Role => "role",
            Self::Status => "status",
            Self::CreatedAt => "created_at",
            Self::LastLogin => "last_login",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    Asc,
    #[default]
    Desc,
}

impl SortOrder {
    #[must_use]
    pub fn from_param(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("asc") => Self::Asc,
            _ => Self::Desc,
        }
    }

    #[must_use]
    pub const fn keyword(self) -> &'static str {
        match self {
            Self::Asc => "ASC",
            Self::Desc => "DESC",
        }
    }
}

/// Filters for the user list.
#[derive(Debug, Clone, Default)]
pub struct UserListQuery {
    /// Case-insensitive match on name, email or phone.
    pub search: Option<String>,
    pub role: Option<UserRole>,
    pub status: Option<UserStatus>,
    pub sort: UserSort,
    pub order: SortOrder,
    pub offset: i64,
    pub limit: i64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sort_whitelist() {
        assert_eq!(UserSort::from_param(Some("email")), UserSort::Email);
        assert_eq!(UserSort::from_param(Some("last_login")), UserSort::LastLogin);
        assert_eq!(
            UserSort::from_param(Some("password_hash; DROP TABLE users")),
            UserSort::CreatedAt
        );
        assert_eq!(UserSort::from_param(None).column(), "created_at");
    }

    #[test]
    fn test_sort_order() {
        assert_eq!(SortOrder::from_param(Some("ASC")), SortOrder::Asc);
        assert_eq!(SortOrder::from_param(Some("sideways")), SortOrder::Desc);
        assert_eq!(SortOrder::from_param(None).keyword(), "DESC");
    }
}
