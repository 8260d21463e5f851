//! Attendance records and per-employee summaries.

use chrono::{DateTime, Utc};
use serde::Serialize;

use lumen_core::attendance::worked_hours;
use lumen_core::{AttendanceId, UserId};

#[derive(Debug, Clone, Serialize)]
pub struct AttendanceRecord {
    pub id: AttendanceId,
    pub employee_id: UserId,
    pub check_in: DateTime<Utc>,
    pub check_out: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
}

impl AttendanceRecord {
    #[must_use]
    pub const fn is_open(&self) -> bool {
        self.check_out.is_none()
    }

    /// Hours worked; open records count as zero.
    #[must_use]
    pub fn hours(&self) -> f64 {
        worked_hours(self.check_in, self.check_out)
    }
}

/// Hours worked by one employee over a range.
#[derive(Debug, Clone, Serialize)]
pub struct EmployeeHours {
    pub employee_id: UserId,
    pub name: String,
    pub total_hours: f64,
    pub records: i64,
}

/// An employee who is currently checked in.
#[derive(Debug, Clone, Serialize)]
pub struct ActiveEmployee {
    pub employee_id: UserId,
    pub name: String,
    pub check_in: DateTime<Utc>,
}
