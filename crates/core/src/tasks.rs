//! Kanban board rules.
//!
//! Two boards exist. `DAILY` holds short recurring chores and has a three
//! column flow; `OTHER` holds project work with a backlog and a review step.

use std::collections::BTreeMap;

use chrono::{DateTime, Datelike, Timelike, Utc};
use serde::{Deserialize, Serialize};

use crate::types::{ParseEnumError, UserRole};

/// Tag that makes a proof URL mandatory before a task can be completed.
pub const REQUIRE_PROOF_TAG: &str = "requireProof";

/// Board a task lives on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "task_board", rename_all = "UPPERCASE")
)]
#[serde(rename_all = "UPPERCASE")]
pub enum Board {
    Daily,
    Other,
}

/// Column a task sits in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "task_status", rename_all = "SCREAMING_SNAKE_CASE")
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TaskStatus {
    Backlog,
    Todo,
    InProgress,
    Review,
    Done,
}

/// Task urgency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "task_priority", rename_all = "UPPERCASE")
)]
#[serde(rename_all = "UPPERCASE")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
    Urgent,
}

/// Entry kinds in a task's activity log.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ActivityAction {
    Create,
    Update,
    UpdateStatus,
    AddComment,
    AddProof,
}

/// How often a recurring template spawns a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "recurrence_frequency", rename_all = "UPPERCASE")
)]
#[serde(rename_all = "UPPERCASE")]
pub enum RecurrenceFrequency {
    #[default]
    Daily,
    Weekly,
}

impl Board {
    pub const ALL: [Self; 2] = [Self::Daily, Self::Other];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Daily => "DAILY",
            Self::Other => "OTHER",
        }
    }

    /// Columns available on this board, in display order.
    #[must_use]
    pub const fn statuses(self) -> &'static [TaskStatus] {
        match self {
            Self::Daily => &[TaskStatus::Todo, TaskStatus::InProgress, TaskStatus::Done],
            Self::Other => &[
                TaskStatus::Backlog,
                TaskStatus::InProgress,
                TaskStatus::Review,
                TaskStatus::Done,
            ],
        }
    }

    /// Column a new task starts in.
    #[must_use]
    pub const fn initial_status(self) -> TaskStatus {
        match self {
            Self::Daily => TaskStatus::Todo,
            Self::Other => TaskStatus::Backlog,
        }
    }

    #[must_use]
    pub fn allows(self, status: TaskStatus) -> bool {
        self.statuses().contains(&status)
    }
}

impl TaskStatus {
    pub const ALL: [Self; 5] = [
        Self::Backlog,
        Self::Todo,
        Self::InProgress,
        Self::Review,
        Self::Done,
    ];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Backlog => "BACKLOG",
            Self::Todo => "TODO",
            Self::InProgress => "IN_PROGRESS",
            Self::Review => "REVIEW",
            Self::Done => "DONE",
        }
    }
}

impl TaskPriority {
    pub const ALL: [Self; 4] = [Self::Low, Self::Medium, Self::High, Self::Urgent];

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "LOW",
            Self::Medium => "MEDIUM",
            Self::High => "HIGH",
            Self::Urgent => "URGENT",
        }
    }
}

impl ActivityAction {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Create => "CREATE",
            Self::Update => "UPDATE",
            Self::UpdateStatus => "UPDATE_STATUS",
            Self::AddComment => "ADD_COMMENT",
            Self::AddProof => "ADD_PROOF",
        }
    }
}

macro_rules! upper_enum_text {
    ($ty:ty, $kind:literal) => {
        impl std::fmt::Display for $ty {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $ty {
            type Err = ParseEnumError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                let needle = s.trim().to_ascii_uppercase();
                Self::ALL
                    .into_iter()
                    .find(|v| v.as_str() == needle)
                    .ok_or_else(|| ParseEnumError::new($kind, s))
            }
        }
    };
}

upper_enum_text!(Board, "board");
upper_enum_text!(TaskStatus, "task status");
upper_enum_text!(TaskPriority, "priority");

// =============================================================================
// Moving tasks
// =============================================================================

/// Why a move was rejected. Messages are shown to staff verbatim.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum MoveError {
    #[error("Invalid board")]
    InvalidBoard,
    #[error("Invalid status for board")]
    InvalidStatus,
    #[error("Proof required to mark as DONE")]
    ProofRequired,
}

/// Requested move as received from the client.
#[derive(Debug, Clone, Copy, Default)]
pub struct MoveRequest<'a> {
    pub to_status: Option<&'a str>,
    pub to_board: Option<&'a str>,
}

/// Current state of the task being moved.
#[derive(Debug, Clone, Copy)]
pub struct MoveContext<'a> {
    pub board: Board,
    pub tags: &'a [String],
    pub proof_url: Option<&'a str>,
}

/// Validate a move and return the resulting board and status.
///
/// The target status is checked against the target board (the current
/// board when no board change is requested).
///
/// # Errors
///
/// Returns [`MoveError`] when the board or status is unknown, the status is
/// not a column of the board, or the task needs proof before completion.
pub fn validate_move(
    ctx: MoveContext<'_>,
    request: MoveRequest<'_>,
) -> Result<(Board, TaskStatus), MoveError> {
    let board = match request.to_board {
        Some(raw) => raw.parse::<Board>().map_err(|_| MoveError::InvalidBoard)?,
        None => ctx.board,
    };

    let status = request
        .to_status
        .and_then(|raw| raw.parse::<TaskStatus>().ok())
        .filter(|status| board.allows(*status))
        .ok_or(MoveError::InvalidStatus)?;

    let needs_proof = ctx.tags.iter().any(|t| t == REQUIRE_PROOF_TAG);
    let has_proof = ctx.proof_url.is_some_and(|url| !url.trim().is_empty());
    if status == TaskStatus::Done && needs_proof && !has_proof {
        return Err(MoveError::ProofRequired);
    }

    Ok((board, status))
}

// =============================================================================
// Edit permissions
// =============================================================================

/// Which fields a user may change on a task.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EditScope {
    /// Title, description, priority, tags and due date.
    Full,
    /// Everything except the title.
    WithoutTitle,
}

/// Edit rights of `role` on a task; `None` means no access at all.
///
/// Supervisors edit any task. Other staff may edit only tasks assigned to
/// them and cannot rename them.
#[must_use]
pub const fn edit_scope(role: UserRole, is_assignee: bool) -> Option<EditScope> {
    if role.is_supervisor() {
        Some(EditScope::Full)
    } else if is_assignee {
        Some(EditScope::WithoutTitle)
    } else {
        None
    }
}

// =============================================================================
// Recurring templates
// =============================================================================

/// Schedule of a recurring template.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Recurrence {
    pub frequency: RecurrenceFrequency,
    pub hour: u32,
    pub minute: u32,
    /// ISO weekday, 1 = Monday ... 7 = Sunday. Weekly templates default to
    /// Monday.
    pub weekday: Option<u32>,
}

impl Recurrence {
    /// Whether the template should fire at `now`.
    ///
    /// A template fires during its hour once the minute has been reached;
    /// callers make spawning idempotent per day.
    #[must_use]
    pub fn is_due(&self, now: DateTime<Utc>) -> bool {
        let in_window = now.hour() == self.hour && now.minute() >= self.minute;
        match self.frequency {
            RecurrenceFrequency::Daily => in_window,
            RecurrenceFrequency::Weekly => {
                now.weekday().number_from_monday() == self.weekday.unwrap_or(1) && in_window
            }
        }
    }
}

// =============================================================================
// Statistics
// =============================================================================

/// The facts about one task needed for board statistics.
#[derive(Debug, Clone, Copy)]
pub struct TaskFacts {
    pub status: TaskStatus,
    pub priority: TaskPriority,
    pub due_date: Option<DateTime<Utc>>,
}

/// Board statistics.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TaskStats {
    pub total: i64,
    pub by_status: BTreeMap<String, i64>,
    pub by_priority: BTreeMap<String, i64>,
    pub completed: i64,
    /// Percentage of completed tasks, one decimal place.
    pub completion_rate: f64,
    /// Tasks past their due date that are not done.
    pub overdue: i64,
}

impl TaskStats {
    /// Aggregate statistics for a set of tasks as of `now`.
    #[must_use]
    pub fn compute<I>(tasks: I, now: DateTime<Utc>) -> Self
    where
        I: IntoIterator<Item = TaskFacts>,
    {
        let mut stats = Self::default();
        for task in tasks {
            stats.total += 1;
            *stats
                .by_status
                .entry(task.status.as_str().to_owned())
                .or_insert(0) += 1;
            *stats
                .by_priority
                .entry(task.priority.as_str().to_owned())
                .or_insert(0) += 1;

            if task.status == TaskStatus::Done {
                stats.completed += 1;
            } else if task.due_date.is_some_and(|due| due < now) {
                stats.overdue += 1;
            }
        }

        if stats.total > 0 {
            #[allow(clippy::cast_precision_loss)] // task counts are small
            let rate = stats.completed as f64 / stats.total as f64 * 100.0;
            stats.completion_rate = (rate * 10.0).round() / 10.0;
        }
        stats
    }
}
