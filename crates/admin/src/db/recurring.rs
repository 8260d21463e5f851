//! Recurring task template repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use lumen_core::tasks::RecurrenceFrequency;
use lumen_core::{Board, RecurringTemplateId, TaskPriority, TaskStatus, UserId};

use super::RepositoryError;
use crate::models::{NewRecurringTemplate, RecurringTemplate};

const TEMPLATE_COLUMNS: &str = "id, title, description, board, default_status, priority, \
     frequency, hour, minute, weekday, assigned_to_id, created_by_id, tags, created_at";

#[derive(Debug, sqlx::FromRow)]
struct TemplateRow {
    id: i32,
    title: String,
    description: Option<String>,
    board: Board,
    default_status: Option<TaskStatus>,
    priority: TaskPriority,
    frequency: RecurrenceFrequency,
    hour: i32,
    minute: i32,
    weekday: Option<i32>,
    assigned_to_id: i32,
    created_by_id: i32,
    tags: Vec<String>,
    created_at: DateTime<Utc>,
}

impl From<TemplateRow> for RecurringTemplate {
    fn from(row: TemplateRow) -> Self {
        Self {
            id: RecurringTemplateId::new(row.id),
            title: row.title,
            description: row.description,
            board: row.board,
            default_status: row.default_status,
            priority: row.priority,
            frequency: row.frequency,
            hour: row.hour,
            minute: row.minute,
            weekday: row.weekday,
            assigned_to_id: UserId::new(row.assigned_to_id),
            created_by_id: UserId::new(row.created_by_id),
            tags: row.tags,
            created_at: row.created_at,
        }
    }
}

pub struct RecurringTemplateRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> RecurringTemplateRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// All templates, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self) -> Result<Vec<RecurringTemplate>, RepositoryError> {
        let rows = sqlx::query_as::<_, TemplateRow>(&format!(
            "SELECT {TEMPLATE_COLUMNS} FROM recurring_task_templates ORDER BY id ASC"
        ))
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Insert a template.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails (including an
    /// out-of-range hour, minute or weekday).
    pub async fn create(
        &self,
        template: &NewRecurringTemplate,
    ) -> Result<RecurringTemplate, RepositoryError> {
        let row = sqlx::query_as::<_, TemplateRow>(&format!(
            "INSERT INTO recurring_task_templates (
                title, description, board, default_status, priority, frequency,
                hour, minute, weekday, assigned_to_id, created_by_id, tags
             )
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
             RETURNING {TEMPLATE_COLUMNS}"
        ))
        .bind(&template.title)
        .bind(&template.description)
        .bind(template.board)
        .bind(template.default_status)
        .bind(template.priority)
        .bind(template.frequency)
        .bind(template.hour)
        .bind(template.minute)
        .bind(template.weekday)
        .bind(template.assigned_to_id.as_i32())
        .bind(template.created_by_id.as_i32())
        .bind(&template.tags)
        .fetch_one(self.pool)
        .await?;

        Ok(row.into())
    }
}
