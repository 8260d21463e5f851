//! Staff account repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use lumen_core::{Email, UserId, UserRole, UserStatus};

use super::{RepositoryError, conflict_on_unique, like_pattern};
use crate::models::{NewUser, User, UserChanges, UserListQuery};

const USER_COLUMNS: &str =
    "id, name, email, phone, role, status, team, last_login, created_at, updated_at";

const LIST_FILTER: &str = r"
    WHERE ($1::TEXT IS NULL
           OR name ILIKE $1
           OR email ILIKE $1
           OR COALESCE(phone, '') ILIKE $1)
      AND ($2::user_role IS NULL OR role = $2)
      AND ($3::user_status IS NULL OR status = $3)";

const DUPLICATE_EMAIL: &str = "Email already exists";

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct UserRow {
    id: i32,
    name: String,
    email: String,
    phone: Option<String>,
    role: UserRole,
    status: UserStatus,
    team: Option<String>,
    last_login: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<UserRow> for User {
    type Error = RepositoryError;

    fn try_from(row: UserRow) -> Result<Self, Self::Error> {
        let email = Email::parse(&row.email).map_err(|e| {
            RepositoryError::DataCorruption(format!("invalid email in database: {e}"))
        })?;

        Ok(Self {
            id: UserId::new(row.id),
            name: row.name,
            email,
            phone: row.phone,
            role: row.role,
            status: row.status,
            team: row.team,
            last_login: row.last_login,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for staff accounts.
pub struct UserRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> UserRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// One page of users plus the total matching the filters.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    /// Returns `RepositoryError::DataCorruption` if a row is invalid.
    pub async fn list(&self, query: &UserListQuery) -> Result<(Vec<User>, i64), RepositoryError> {
        let search = query
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(like_pattern);

        let total: i64 = sqlx::query_scalar(&format!("SELECT COUNT(*) FROM users {LIST_FILTER}"))
            .bind(&search)
            .bind(query.role)
            .bind(query.status)
            .fetch_one(self.pool)
            .await?;

        // Sort column and direction come from whitelisted enums.
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users {LIST_FILTER}
             ORDER BY {column} {direction} NULLS LAST, id {direction}
             LIMIT $4 OFFSET $5",
            column = query.sort.column(),
            direction = query.order.keyword(),
        );
        let rows = sqlx::query_as::<_, UserRow>(&sql)
            .bind(&search)
            .bind(query.role)
            .bind(query.status)
            .bind(query.limit)
            .bind(query.offset)
            .fetch_all(self.pool)
            .await?;

        let users = rows
            .into_iter()
            .map(TryInto::try_into)
            .collect::<Result<Vec<_>, _>>()?;
        Ok((users, total))
    }

    /// Get a user by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: UserId) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id.as_i32())
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Get a user by (normalized) email.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_by_email(&self, email: &Email) -> Result<Option<User>, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email.as_str())
        .fetch_optional(self.pool)
        .await?;

        row.map(TryInto::try_into).transpose()
    }

    /// Insert a user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the email already exists.
    pub async fn create(&self, user: &NewUser) -> Result<User, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "INSERT INTO users (name, email, phone, password_hash, role, status, team)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING {USER_COLUMNS}"
        ))
        .bind(&user.name)
        .bind(user.email.as_str())
        .bind(&user.phone)
        .bind(&user.password_hash)
        .bind(user.role)
        .bind(user.status)
        .bind(&user.team)
        .fetch_one(self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, DUPLICATE_EMAIL))?;

        row.try_into()
    }

    /// Apply a partial update.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the user does not exist.
    /// Returns `RepositoryError::Conflict` if the email belongs to another user.
    pub async fn update(&self, id: UserId, changes: &UserChanges) -> Result<User, RepositoryError> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "UPDATE users SET
                name = COALESCE($2, name),
                email = COALESCE($3, email),
                phone = COALESCE($4, phone),
                password_hash = COALESCE($5, password_hash),
                role = COALESCE($6, role),
                status = COALESCE($7, status),
                team = COALESCE($8, team),
                updated_at = NOW()
             WHERE id = $1
             RETURNING {USER_COLUMNS}"
        ))
        .bind(id.as_i32())
        .bind(&changes.name)
        .bind(changes.email.as_ref().map(Email::as_str))
        .bind(&changes.phone)
        .bind(&changes.password_hash)
        .bind(changes.role)
        .bind(changes.status)
        .bind(&changes.team)
        .fetch_optional(self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, DUPLICATE_EMAIL))?;

        row.ok_or(RepositoryError::NotFound)?.try_into()
    }

    /// Delete a user. Returns `false` if there was no such user.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete(&self, id: UserId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM users WHERE id = $1")
            .bind(id.as_i32())
            .execute(self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Number of accounts, optionally only those with `status`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count(&self, status: Option<UserStatus>) -> Result<i64, RepositoryError> {
        let count = sqlx::query_scalar(
            "SELECT COUNT(*) FROM users WHERE ($1::user_status IS NULL OR status = $1)",
        )
        .bind(status)
        .fetch_one(self.pool)
        .await?;

        Ok(count)
    }
}
