//! Database operations for the admin `PostgreSQL` database.
//!
//! ## Tables
//!
//! - `users` - Staff accounts
//! - `shopify_config` - Single-row store connection (token encrypted)
//! - `shopify_orders` - Orders synced from Shopify plus packing workflow columns
//! - `shopify_sync_status` - Single-row outcome of the latest sync
//! - `order_events` - Audit trail of order status changes
//! - `tasks`, `task_comments`, `task_activity` - Kanban board
//! - `announcements` - Team announcements
//! - `recurring_task_templates` - Templates spawned on a schedule
//! - `attendance_records` - Check-in / check-out rows
//!
//! Queries are built at runtime with `sqlx::query_as::<_, Row>`, so the
//! crate builds without a live database.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/admin/migrations/` and run via:
//! ```bash
//! cargo run -p lumen-cli -- migrate
//! ```

pub mod announcements;
pub mod attendance;
pub mod orders;
pub mod recurring;
pub mod shopify;
pub mod tasks;
pub mod users;

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub use announcements::AnnouncementRepository;
pub use attendance::AttendanceRepository;
pub use orders::{OrderRepository, WindowTotals};
pub use recurring::RecurringTemplateRepository;
pub use shopify::{ShopifyConfigRepository, SyncStatusRepository};
pub use tasks::TaskRepository;
pub use users::UserRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("{0}")]
    Conflict(String),
}

/// Map a unique-constraint violation to `Conflict(message)`.
pub(crate) fn conflict_on_unique(err: sqlx::Error, message: &str) -> RepositoryError {
    if let sqlx::Error::Database(ref db_err) = err
        && db_err.is_unique_violation()
    {
        return RepositoryError::Conflict(message.to_owned());
    }
    RepositoryError::Database(err)
}

/// `%term%` for `ILIKE`, with LIKE wildcards in `term` escaped.
pub(crate) fn like_pattern(term: &str) -> String {
    let escaped = term
        .replace('\\', "\\\\")
        .replace('%', "\\%")
        .replace('_', "\\_");
    format!("%{escaped}%")
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Arguments
///
/// * `database_url` - `PostgreSQL` connection string (wrapped in `SecretString`)
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_non_unique_errors_pass_through() {
        let err = conflict_on_unique(sqlx::Error::RowNotFound, "Email already exists");
        assert!(matches!(err, RepositoryError::Database(sqlx::Error::RowNotFound)));
    }

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("asha"), "%asha%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
    }

    #[test]
    fn test_conflict_message_is_displayed_verbatim() {
        let err = RepositoryError::Conflict("Email already exists".to_string());
        assert_eq!(err.to_string(), "Email already exists");
    }
}
