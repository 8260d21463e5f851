//! Team announcement repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use lumen_core::{AnnouncementId, UserId};

use super::RepositoryError;
use crate::models::Announcement;

#[derive(Debug, sqlx::FromRow)]
struct AnnouncementRow {
    id: i32,
    title: String,
    body: String,
    created_by_id: Option<i32>,
    created_at: DateTime<Utc>,
}

impl From<AnnouncementRow> for Announcement {
    fn from(row: AnnouncementRow) -> Self {
        Self {
            id: AnnouncementId::new(row.id),
            title: row.title,
            body: row.body,
            created_by_id: row.created_by_id.map(UserId::new),
            created_at: row.created_at,
        }
    }
}

pub struct AnnouncementRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AnnouncementRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// All announcements, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<Announcement>, RepositoryError> {
        let rows = sqlx::query_as::<_, AnnouncementRow>(
            r"
            SELECT id, title, body, created_by_id, created_at
            FROM announcements
            ORDER BY created_at DESC, id DESC
            ",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Post an announcement.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(
        &self,
        title: &str,
        body: &str,
        created_by: UserId,
    ) -> Result<Announcement, RepositoryError> {
        let row = sqlx::query_as::<_, AnnouncementRow>(
            r"
            INSERT INTO announcements (title, body, created_by_id)
            VALUES ($1, $2, $3)
            RETURNING id, title, body, created_by_id, created_at
            ",
        )
        .bind(title)
        .bind(body)
        .bind(created_by.as_i32())
        .fetch_one(self.pool)
        .await?;

        Ok(row.into())
    }
}
