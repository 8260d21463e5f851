//! Spawns tasks from recurring templates.

use std::time::Duration;

use chrono::{DateTime, NaiveDate, Utc};
use serde_json::json;
use sqlx::PgPool;
use tokio::task::JoinHandle;
use tracing::{error, info, instrument};

use lumen_core::UserId;
use lumen_core::tasks::ActivityAction;

use crate::db::{RecurringTemplateRepository, RepositoryError, TaskRepository};
use crate::models::{NewTask, RecurringTemplate};

/// Create today's task for every template that is due at `now`.
///
/// A template spawns at most one task per UTC day, enforced by a unique
/// `(template_id, spawn_date)` key, so overlapping runs (the ticker and a
/// manual run) never duplicate a task. When `actor` is given (a manual run)
/// it is recorded as the creator instead of the template author.
///
/// Returns the number of tasks created by this run.
///
/// # Errors
///
/// Returns `RepositoryError` if a query fails. Tasks created before the
/// failure are kept.
#[instrument(skip(pool))]
pub async fn spawn_due_tasks(
    pool: &PgPool,
    now: DateTime<Utc>,
    actor: Option<UserId>,
) -> Result<usize, RepositoryError> {
    let templates = RecurringTemplateRepository::new(pool).list().await?;
    let tasks = TaskRepository::new(pool);
    let day = spawn_date(now);
    let mut spawned = 0;

    for template in templates.iter().filter(|t| t.recurrence().is_due(now)) {
        let creator = actor.unwrap_or(template.created_by_id);
        let new_task = task_from_template(template, creator);
        let Some(task) = tasks.create_spawned(&new_task, template.id, day).await? else {
            continue;
        };
        tasks
            .log_activity(
                task.id,
                creator,
                ActivityAction::Create,
                &json!({ "recurring": true }),
            )
            .await?;
        spawned += 1;
    }

    Ok(spawned)
}

/// Run [`spawn_due_tasks`] every `interval` in the background.
pub fn spawn_ticker(pool: PgPool, interval: Duration) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(?interval, "Starting recurring task spawner");
        let mut ticker = tokio::time::interval(interval);

        loop {
            ticker.tick().await;
            match spawn_due_tasks(&pool, Utc::now(), None).await {
                Ok(0) => {}
                Ok(spawned) => info!(spawned, "Spawned recurring tasks"),
                Err(e) => error!(error = %e, "Recurring task spawn failed"),
            }
        }
    })
}

fn task_from_template(template: &RecurringTemplate, creator: UserId) -> NewTask {
    NewTask {
        title: template.title.clone(),
        description: template.description.clone(),
        board: template.board,
        status: template.initial_status(),
        priority: template.priority,
        due_date: None,
        is_recurring: true,
        tags: template.tags.clone(),
        created_by_id: creator,
        assigned_to_id: template.assigned_to_id,
    }
}

/// UTC day a run at `now` spawns for.
fn spawn_date(now: DateTime<Utc>) -> NaiveDate {
    now.date_naive()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;
    use lumen_core::tasks::RecurrenceFrequency;
    use lumen_core::{Board, RecurringTemplateId, TaskPriority, TaskStatus};

    use super::*;

    #[test]
    fn test_runs_on_one_day_share_a_spawn_date() {
        let morning = Utc.with_ymd_and_hms(2024, 3, 5, 6, 30, 0).unwrap();
        let evening = Utc.with_ymd_and_hms(2024, 3, 5, 23, 59, 59).unwrap();
        let next_day = Utc.with_ymd_and_hms(2024, 3, 6, 0, 0, 0).unwrap();

        assert_eq!(spawn_date(morning), spawn_date(evening));
        assert_eq!(spawn_date(morning), NaiveDate::from_ymd_opt(2024, 3, 5).unwrap());
        assert_ne!(spawn_date(evening), spawn_date(next_day));
    }

    #[test]
    fn test_task_from_template() {
        let template = RecurringTemplate {
            id: RecurringTemplateId::new(3),
            title: "Count cash drawer".to_string(),
            description: Some("Before close".to_string()),
            board: Board::Daily,
            default_status: None,
            priority: TaskPriority::High,
            frequency: RecurrenceFrequency::Weekly,
            hour: 18,
            minute: 0,
            weekday: Some(5),
            assigned_to_id: UserId::new(8),
            created_by_id: UserId::new(1),
            tags: vec!["requireProof".to_string()],
            created_at: Utc::now(),
        };

        let task = task_from_template(&template, UserId::new(2));
        assert_eq!(task.status, TaskStatus::Todo);
        assert_eq!(task.priority, TaskPriority::High);
        assert!(task.is_recurring);
        assert_eq!(task.created_by_id, UserId::new(2));
        assert_eq!(task.assigned_to_id, UserId::new(8));
        assert_eq!(task.tags, vec!["requireProof".to_string()]);
    }
}
