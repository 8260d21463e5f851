//! Kanban tasks, comments, activity, announcements and recurring templates.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use lumen_core::tasks::{Recurrence, RecurrenceFrequency, TaskFacts};
use lumen_core::{
    ActivityId, AnnouncementId, Board, CommentId, RecurringTemplateId, TaskId, TaskPriority,
    TaskStatus, UserId,
};

#[derive(Debug, Clone, Serialize)]
pub struct Task {
    pub id: TaskId,
    pub title: String,
    pub description: Option<String>,
    pub board: Board,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub due_date: Option<DateTime<Utc>>,
    pub is_recurring: bool,
    pub tags: Vec<String>,
    pub proof_url: Option<String>,
    pub created_by_id: UserId,
    pub assigned_to_id: UserId,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Task {
    #[must_use]
    pub fn facts(&self) -> TaskFacts {
        TaskFacts {
            status: self.status,
            priority: self.priority,
            due_date: self.due_date,
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewTask {
    pub title: String,
    pub description: Option<String>,
    pub board: Board,
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub due_date: Option<DateTime<Utc>>,
    pub is_recurring: bool,
    pub tags: Vec<String>,
    pub created_by_id: UserId,
    pub assigned_to_id: UserId,
}

/// Editable task fields. `None` leaves the column untouched.
#[derive(Debug, Clone, Default)]
pub struct TaskChanges {
    pub title: Option<String>,
    pub description: Option<String>,
    pub priority: Option<TaskPriority>,
    pub tags: Option<Vec<String>>,
    pub due_date: Option<DateTime<Utc>>,
}

impl TaskChanges {
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.priority.is_none()
            && self.tags.is_none()
            && self.due_date.is_none()
    }

    /// Names of the fields being changed, for the activity log.
    #[must_use]
    pub fn field_names(&self) -> Vec<&'static str> {
        [
            ("title", self.title.is_some()),
            ("description", self.description.is_some()),
            ("priority", self.priority.is_some()),
            ("tags", self.tags.is_some()),
            ("due_date", self.due_date.is_some()),
        ]
        .into_iter()
        .filter_map(|(name, set)| set.then_some(name))
        .collect()
    }
}

/// Which tasks a listing covers.
#[derive(Debug, Clone, Default)]
pub struct TaskFilter {
    /// Only tasks assigned to this user.
    pub assignee: Option<UserId>,
    /// Only tasks whose assignee is on this team.
    pub team: Option<String>,
    pub board: Option<Board>,
    pub status: Option<TaskStatus>,
    /// Case-insensitive title match.
    pub search: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Comment {
    pub id: CommentId,
    pub task_id: TaskId,
    pub author_id: UserId,
    pub author_name: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Activity {
    pub id: ActivityId,
    pub task_id: TaskId,
    pub actor_id: UserId,
    pub action: String,
    pub meta: Value,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct Announcement {
    pub id: AnnouncementId,
    pub title: String,
    pub body: String,
    pub created_by_id: Option<UserId>,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
pub struct RecurringTemplate {
    pub id: RecurringTemplateId,
    pub title: String,
    pub description: Option<String>,
    pub board: Board,
    pub default_status: Option<TaskStatus>,
    pub priority: TaskPriority,
    pub frequency: RecurrenceFrequency,
    pub hour: i32,
    pub minute: i32,
    pub weekday: Option<i32>,
    pub assigned_to_id: UserId,
    pub created_by_id: UserId,
    pub tags: Vec<String>,
    pub created_at: DateTime<Utc>,
}

impl RecurringTemplate {
    #[must_use]
    pub fn recurrence(&self) -> Recurrence {
        Recurrence {
            frequency: self.frequency,
            hour: u32::try_from(self.hour).unwrap_or_default(),
            minute: u32::try_from(self.minute).unwrap_or_default(),
            weekday: self.weekday.and_then(|d| u32::try_from(d).ok()),
        }
    }

    /// Status a spawned task starts in.
    #[must_use]
    pub fn initial_status(&self) -> TaskStatus {
        self.default_status
            .filter(|s| self.board.allows(*s))
            .unwrap_or_else(|| self.board.initial_status())
    }
}

#[derive(Debug, Clone)]
pub struct NewRecurringTemplate {
    pub title: String,
    pub description: Option<String>,
    pub board: Board,
    pub default_status: Option<TaskStatus>,
    pub priority: TaskPriority,
    pub frequency: RecurrenceFrequency,
    pub hour: i32,
    pub minute: i32,
    pub weekday: Option<i32>,
    pub assigned_to_id: UserId,
    pub created_by_id: UserId,
    pub tags: Vec<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn template(board: Board, default_status: Option<TaskStatus>) -> RecurringTemplate {
        RecurringTemplate {
            id: RecurringTemplateId::new(1),
            title: "Open shop".to_string(),
            description: None,
            board,
            default_status,
            priority: TaskPriority::Medium,
            frequency: RecurrenceFrequency::Daily,
            hour: 6,
            minute: 30,
            weekday: None,
            assigned_to_id: UserId::new(2),
            created_by_id: UserId::new(1),
            tags: Vec::new(),
            created_at: Utc::now(),
        }
    }

    #[test]
    fn test_template_initial_status() {
        assert_eq!(template(Board::Daily, None).initial_status(), TaskStatus::Todo);
        assert_eq!(
            template(Board::Other, Some(TaskStatus::Review)).initial_status(),
            TaskStatus::Review
        );
        // BACKLOG is not a DAILY column
        assert_eq!(
            template(Board::Daily, Some(TaskStatus::Backlog)).initial_status(),
            TaskStatus::Todo
        );
    }

    #[test]
    fn test_changes_field_names() {
        let changes = TaskChanges {
            priority: Some(TaskPriority::High),
            tags: Some(vec!["requireProof".to_string()]),
            ..TaskChanges::default()
        };
        assert!(!changes.is_empty());
        assert_eq!(changes.field_names(), vec!["priority", "tags"]);
        assert!(TaskChanges::default().is_empty());
    }
}
