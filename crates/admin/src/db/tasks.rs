//! Kanban task repository, including comments and the activity log.

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::Value;
use sqlx::PgPool;

use lumen_core::tasks::ActivityAction;
use lumen_core::{
    ActivityId, Board, CommentId, RecurringTemplateId, TaskId, TaskPriority, TaskStatus, UserId,
};

use super::{RepositoryError, like_pattern};
use crate::models::{Activity, Comment, NewTask, Task, TaskChanges, TaskFilter};

const TASK_COLUMNS: &str = "t.id, t.title, t.description, t.board, t.status, t.priority, \
     t.due_date, t.is_recurring, t.tags, t.proof_url, t.created_by_id, t.assigned_to_id, \
     t.created_at, t.updated_at";

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct TaskRow {
    id: i32,
    title: String,
    description: Option<String>,
    board: Board,
    status: TaskStatus,
    priority: TaskPriority,
    due_date: Option<DateTime<Utc>>,
    is_recurring: bool,
    tags: Vec<String>,
    proof_url: Option<String>,
    created_by_id: i32,
    assigned_to_id: i32,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<TaskRow> for Task {
    fn from(row: TaskRow) -> Self {
        Self {
            id: TaskId::new(row.id),
            title: row.title,
            description: row.description,
            board: row.board,
            status: row.status,
            priority: row.priority,
            due_date: row.due_date,
            is_recurring: row.is_recurring,
            tags: row.tags,
            proof_url: row.proof_url,
            created_by_id: UserId::new(row.created_by_id),
            assigned_to_id: UserId::new(row.assigned_to_id),
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CommentRow {
    id: i32,
    task_id: i32,
    author_id: i32,
    author_name: String,
    content: String,
    created_at: DateTime<Utc>,
}

impl From<CommentRow> for Comment {
    fn from(row: CommentRow) -> Self {
        Self {
            id: CommentId::new(row.id),
            task_id: TaskId::new(row.task_id),
            author_id: UserId::new(row.author_id),
            author_name: row.author_name,
            content: row.content,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct ActivityRow {
    id: i32,
    task_id: i32,
    actor_id: i32,
    action: String,
    meta: Value,
    created_at: DateTime<Utc>,
}

impl From<ActivityRow> for Activity {
    fn from(row: ActivityRow) -> Self {
        Self {
            id: ActivityId::new(row.id),
            task_id: TaskId::new(row.task_id),
            actor_id: UserId::new(row.actor_id),
            action: row.action,
            meta: row.meta,
            created_at: row.created_at,
        }
    }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for kanban tasks.
pub struct TaskRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> TaskRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Tasks matching `filter`, most recently updated first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, filter: &TaskFilter) -> Result<Vec<Task>, RepositoryError> {
        let search = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(like_pattern);

        let rows = sqlx::query_as::<_, TaskRow>(&format!(
            "SELECT {TASK_COLUMNS}
             FROM tasks t
             JOIN users u ON u.id = t.assigned_to_id
             WHERE ($1::INTEGER IS NULL OR t.assigned_to_id = $1)
               AND ($2::TEXT IS NULL OR u.team = $2)
               AND ($3::task_board IS NULL OR t.board = $3)
               AND ($4::task_status IS NULL OR t.status = $4)
               AND ($5::TEXT IS NULL OR t.title ILIKE $5)
             ORDER BY t.updated_at DESC, t.id DESC"
        ))
        .bind(filter.assignee.map(|u| u.as_i32()))
        .bind(&filter.team)
        .bind(filter.board)
        .bind(filter.status)
        .bind(&search)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Get a task by ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: TaskId) -> Result<Option<Task>, RepositoryError> {
        let row = sqlx::query_as::<_, TaskRow>(&format!(
            "SELECT {TASK_COLUMNS} FROM tasks t WHERE t.id = $1"
        ))
        .bind(id.as_i32())
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Insert a task.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails (including an
    /// unknown assignee).
    pub async fn create(&self, task: &NewTask) -> Result<Task, RepositoryError> {
        let row = sqlx::query_as::<_, TaskRow>(&format!(
            "INSERT INTO tasks AS t (
                title, description, board, status, priority, due_date,
                is_recurring, tags, created_by_id, assigned_to_id
             )
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)
             RETURNING {TASK_COLUMNS}"
        ))
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.board)
        .bind(task.status)
        .bind(task.priority)
        .bind(task.due_date)
        .bind(task.is_recurring)
        .bind(&task.tags)
        .bind(task.created_by_id.as_i32())
        .bind(task.assigned_to_id.as_i32())
        .fetch_one(self.pool)
        .await?;

        Ok(row.into())
    }

    /// Apply editable field changes.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the task does not exist.
    pub async fn update(&self, id: TaskId, changes: &TaskChanges) -> Result<Task, RepositoryError> {
        let row = sqlx::query_as::<_, TaskRow>(&format!(
            "UPDATE tasks AS t SET
                title = COALESCE($2, t.title),
                description = COALESCE($3, t.description),
                priority = COALESCE($4, t.priority),
                tags = COALESCE($5, t.tags),
                due_date = COALESCE($6, t.due_date),
                updated_at = NOW()
             WHERE t.id = $1
             RETURNING {TASK_COLUMNS}"
        ))
        .bind(id.as_i32())
        .bind(&changes.title)
        .bind(&changes.description)
        .bind(changes.priority)
        .bind(&changes.tags)
        .bind(changes.due_date)
        .fetch_optional(self.pool)
        .await?;

        row.map(Into::into).ok_or(RepositoryError::NotFound)
    }

    /// Move a task to another column (and possibly board).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the task does not exist.
    pub async fn move_to(
        &self,
        id: TaskId,
        board: Board,
        status: TaskStatus,
    ) -> Result<Task, RepositoryError> {
        let row = sqlx::query_as::<_, TaskRow>(&format!(
            "UPDATE tasks AS t SET board = $2, status = $3, updated_at = NOW()
             WHERE t.id = $1
             RETURNING {TASK_COLUMNS}"
        ))
        .bind(id.as_i32())
        .bind(board)
        .bind(status)
        .fetch_optional(self.pool)
        .await?;

        row.map(Into::into).ok_or(RepositoryError::NotFound)
    }

    /// Attach a proof-of-completion URL.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the task does not exist.
    pub async fn set_proof(&self, id: TaskId, proof_url: &str) -> Result<Task, RepositoryError> {
        let row = sqlx::query_as::<_, TaskRow>(&format!(
            "UPDATE tasks AS t SET proof_url = $2, updated_at = NOW()
             WHERE t.id = $1
             RETURNING {TASK_COLUMNS}"
        ))
        .bind(id.as_i32())
        .bind(proof_url)
        .fetch_optional(self.pool)
        .await?;

        row.map(Into::into).ok_or(RepositoryError::NotFound)
    }

    /// Delete a task; comments and activity cascade.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn delete(&self, id: TaskId) -> Result<bool, RepositoryError> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = $1")
            .bind(id.as_i32())
            .execute(self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Create the task `template` spawns on `spawn_date`, unless that
    /// template already spawned one for the day. Returns `None` in that case.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create_spawned(
        &self,
        task: &NewTask,
        template: RecurringTemplateId,
        spawn_date: NaiveDate,
    ) -> Result<Option<Task>, RepositoryError> {
        let row = sqlx::query_as::<_, TaskRow>(&format!(
            "INSERT INTO tasks AS t (
                title, description, board, status, priority, due_date,
                is_recurring, tags, created_by_id, assigned_to_id, template_id, spawn_date
             )
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12)
             ON CONFLICT (template_id, spawn_date) DO NOTHING
             RETURNING {TASK_COLUMNS}"
        ))
        .bind(&task.title)
        .bind(&task.description)
        .bind(task.board)
        .bind(task.status)
        .bind(task.priority)
        .bind(task.due_date)
        .bind(task.is_recurring)
        .bind(&task.tags)
        .bind(task.created_by_id.as_i32())
        .bind(task.assigned_to_id.as_i32())
        .bind(template.as_i32())
        .bind(spawn_date)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    // -------------------------------------------------------------------------
    // Comments
    // -------------------------------------------------------------------------

    /// Comments on a task, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn comments(&self, task_id: TaskId) -> Result<Vec<Comment>, RepositoryError> {
        let rows = sqlx::query_as::<_, CommentRow>(
            r"
            SELECT c.id, c.task_id, c.author_id, u.name AS author_name, c.content, c.created_at
            FROM task_comments c
            JOIN users u ON u.id = c.author_id
            WHERE c.task_id = $1
            ORDER BY c.created_at ASC, c.id ASC
            ",
        )
        .bind(task_id.as_i32())
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Add a comment.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn add_comment(
        &self,
        task_id: TaskId,
        author_id: UserId,
        content: &str,
    ) -> Result<Comment, RepositoryError> {
        let row = sqlx::query_as::<_, CommentRow>(
            r"
            WITH c AS (
                INSERT INTO task_comments (task_id, author_id, content)
                VALUES ($1, $2, $3)
                RETURNING id, task_id, author_id, content, created_at
            )
            SELECT c.id, c.task_id, c.author_id, u.name AS author_name, c.content, c.created_at
            FROM c
            JOIN users u ON u.id = c.author_id
            ",
        )
        .bind(task_id.as_i32())
        .bind(author_id.as_i32())
        .bind(content)
        .fetch_one(self.pool)
        .await?;

        Ok(row.into())
    }

    // -------------------------------------------------------------------------
    // Activity
    // -------------------------------------------------------------------------

    /// Activity log of a task, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn activity(&self, task_id: TaskId) -> Result<Vec<Activity>, RepositoryError> {
        let rows = sqlx::query_as::<_, ActivityRow>(
            r"
            SELECT id, task_id, actor_id, action, meta, created_at
            FROM task_activity
            WHERE task_id = $1
            ORDER BY created_at DESC, id DESC
            ",
        )
        .bind(task_id.as_i32())
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Append an activity entry.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn log_activity(
        &self,
        task_id: TaskId,
        actor_id: UserId,
        action: ActivityAction,
        meta: &Value,
    ) -> Result<(), RepositoryError> {
        sqlx::query(
            "INSERT INTO task_activity (task_id, actor_id, action, meta) VALUES ($1, $2, $3, $4)",
        )
        .bind(task_id.as_i32())
        .bind(actor_id.as_i32())
        .bind(action.as_str())
        .bind(meta)
        .execute(self.pool)
        .await?;

        Ok(())
    }
}
