//! Attendance record repository.

use chrono::{DateTime, Utc};
use sqlx::PgPool;

use lumen_core::attendance::total_hours;
use lumen_core::{AttendanceId, UserId};

use super::{RepositoryError, conflict_on_unique};
use crate::models::{ActiveEmployee, AttendanceRecord, EmployeeHours};

const RECORD_COLUMNS: &str = "id, user_id, check_in, check_out, created_at";

#[derive(Debug, sqlx::FromRow)]
struct RecordRow {
    id: i32,
    user_id: i32,
    check_in: DateTime<Utc>,
    check_out: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
}

impl From<RecordRow> for AttendanceRecord {
    fn from(row: RecordRow) -> Self {
        Self {
            id: AttendanceId::new(row.id),
            employee_id: UserId::new(row.user_id),
            check_in: row.check_in,
            check_out: row.check_out,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct NamedSpanRow {
    user_id: i32,
    name: String,
    check_in: DateTime<Utc>,
    check_out: Option<DateTime<Utc>>,
}

#[derive(Debug, sqlx::FromRow)]
struct ActiveRow {
    user_id: i32,
    name: String,
    check_in: DateTime<Utc>,
}

/// Group spans (already ordered by employee) into per-employee totals.
fn group_hours(rows: Vec<NamedSpanRow>) -> Vec<EmployeeHours> {
    let mut out: Vec<(i32, String, Vec<(DateTime<Utc>, Option<DateTime<Utc>>)>)> = Vec::new();
    for row in rows {
        match out.last_mut() {
            Some((id, _, spans)) if *id == row.user_id => spans.push((row.check_in, row.check_out)),
            _ => out.push((row.user_id, row.name, vec![(row.check_in, row.check_out)])),
        }
    }

    out.into_iter()
        .map(|(id, name, spans)| EmployeeHours {
            employee_id: UserId::new(id),
            name,
            records: i64::try_from(spans.len()).unwrap_or(i64::MAX),
            total_hours: total_hours(spans),
        })
        .collect()
}

pub struct AttendanceRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> AttendanceRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// The employee's most recent record.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn latest(&self, user: UserId) -> Result<Option<AttendanceRecord>, RepositoryError> {
        let row = sqlx::query_as::<_, RecordRow>(&format!(
            "SELECT {RECORD_COLUMNS} FROM attendance_records
             WHERE user_id = $1
             ORDER BY check_in DESC, id DESC
             LIMIT 1"
        ))
        .bind(user.as_i32())
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Open a record for `user` at the current time.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the user already has an open
    /// record.
    pub async fn check_in(&self, user: UserId) -> Result<AttendanceRecord, RepositoryError> {
        let row = sqlx::query_as::<_, RecordRow>(&format!(
            "INSERT INTO attendance_records (user_id) VALUES ($1) RETURNING {RECORD_COLUMNS}"
        ))
        .bind(user.as_i32())
        .fetch_one(self.pool)
        .await
        .map_err(|e| conflict_on_unique(e, "Already checked in."))?;

        Ok(row.into())
    }

    /// Close an open record at the current time.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the record does not exist or is
    /// already closed.
    pub async fn check_out(&self, id: AttendanceId) -> Result<AttendanceRecord, RepositoryError> {
        let row = sqlx::query_as::<_, RecordRow>(&format!(
            "UPDATE attendance_records SET check_out = NOW()
             WHERE id = $1 AND check_out IS NULL
             RETURNING {RECORD_COLUMNS}"
        ))
        .bind(id.as_i32())
        .fetch_optional(self.pool)
        .await?;

        row.map(Into::into).ok_or(RepositoryError::NotFound)
    }

    /// Records with `check_in` in `[from, before)`, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(
        &self,
        user: Option<UserId>,
        from: Option<DateTime<Utc>>,
        before: Option<DateTime<Utc>>,
    ) -> Result<Vec<AttendanceRecord>, RepositoryError> {
        let rows = sqlx::query_as::<_, RecordRow>(&format!(
            "SELECT {RECORD_COLUMNS} FROM attendance_records
             WHERE ($1::INTEGER IS NULL OR user_id = $1)
               AND ($2::TIMESTAMPTZ IS NULL OR check_in >= $2)
               AND ($3::TIMESTAMPTZ IS NULL OR check_in < $3)
             ORDER BY check_in DESC, id DESC"
        ))
        .bind(user.map(|u| u.as_i32()))
        .bind(from)
        .bind(before)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Total hours per employee for records with `check_in` in
    /// `[from, before)`. Open records count as zero hours.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn hours_by_employee(
        &self,
        user: Option<UserId>,
        from: Option<DateTime<Utc>>,
        before: Option<DateTime<Utc>>,
    ) -> Result<Vec<EmployeeHours>, RepositoryError> {
        let rows = sqlx::query_as::<_, NamedSpanRow>(
            r"
            SELECT a.user_id, u.name, a.check_in, a.check_out
            FROM attendance_records a
            JOIN users u ON u.id = a.user_id
            WHERE ($1::INTEGER IS NULL OR a.user_id = $1)
              AND ($2::TIMESTAMPTZ IS NULL OR a.check_in >= $2)
              AND ($3::TIMESTAMPTZ IS NULL OR a.check_in < $3)
            ORDER BY u.name ASC, a.user_id ASC, a.check_in ASC
            ",
        )
        .bind(user.map(|u| u.as_i32()))
        .bind(from)
        .bind(before)
        .fetch_all(self.pool)
        .await?;

        Ok(group_hours(rows))
    }

    /// Employees with an open record.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn active(&self) -> Result<Vec<ActiveEmployee>, RepositoryError> {
        let rows = sqlx::query_as::<_, ActiveRow>(
            r"
            SELECT a.user_id, u.name, a.check_in
            FROM attendance_records a
            JOIN users u ON u.id = a.user_id
            WHERE a.check_out IS NULL
            ORDER BY a.check_in ASC
            ",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|r| ActiveEmployee {
                employee_id: UserId::new(r.user_id),
                name: r.name,
                check_in: r.check_in,
            })
            .collect())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn span(user_id: i32, name: &str, start_hour: u32, end_hour: Option<u32>) -> NamedSpanRow {
        let day = |h| Utc.with_ymd_and_hms(2024, 3, 1, h, 0, 0).unwrap();
        NamedSpanRow {
            user_id,
            name: name.to_string(),
            check_in: day(start_hour),
            check_out: end_hour.map(day),
        }
    }

    #[test]
    fn test_group_hours_per_employee() {
        let grouped = group_hours(vec![
            span(1, "Asha", 9, Some(13)),
            span(1, "Asha", 14, Some(18)),
            span(2, "Ravi", 10, None),
        ]);

        assert_eq!(grouped.len(), 2);
        assert_eq!(grouped[0].employee_id, UserId::new(1));
        assert!((grouped[0].total_hours - 8.0).abs() < f64::EPSILON);
        assert_eq!(grouped[0].records, 2);
        assert_eq!(grouped[1].name, "Ravi");
        assert!(grouped[1].total_hours.abs() < f64::EPSILON);
    }

    #[test]
    fn test_group_hours_empty() {
        assert!(group_hours(Vec::new()).is_empty());
    }
}
