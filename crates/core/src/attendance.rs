//! Working-hours arithmetic for attendance records.

use chrono::{DateTime, Utc};

/// Default daily threshold after which hours count as overtime.
pub const DEFAULT_OVERTIME_THRESHOLD_HOURS: f64 = 8.0;

/// Round to two decimal places.
#[must_use]
pub fn round_hours(hours: f64) -> f64 {
    (hours * 100.0).round() / 100.0
}

/// Hours between check-in and check-out. Open records count as zero.
#[must_use]
pub fn worked_hours(check_in: DateTime<Utc>, check_out: Option<DateTime<Utc>>) -> f64 {
    check_out.map_or(0.0, |out| {
        #[allow(clippy::cast_precision_loss)] // shift lengths fit easily in f64
        let secs = (out - check_in).num_seconds().max(0) as f64;
        secs / 3600.0
    })
}

/// Sum of worked hours over a set of records, rounded to two places.
#[must_use]
pub fn total_hours<I>(records: I) -> f64
where
    I: IntoIterator<Item = (DateTime<Utc>, Option<DateTime<Utc>>)>,
{
    round_hours(
        records
            .into_iter()
            .map(|(check_in, check_out)| worked_hours(check_in, check_out))
            .sum(),
    )
}

/// Hours above `threshold` within the reported range, never negative.
#[must_use]
pub fn overtime_hours(total: f64, threshold: f64) -> f64 {
    round_hours((total - threshold).max(0.0))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{Duration, TimeZone};

    use super::*;

    fn nine_am() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 4, 2, 9, 0, 0).unwrap()
    }

    fn close(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    #[test]
    fn test_worked_hours() {
        let out = nine_am() + Duration::minutes(8 * 60 + 30);
        assert!(close(worked_hours(nine_am(), Some(out)), 8.5));
        assert!(close(worked_hours(nine_am(), None), 0.0));
    }

    #[test]
    fn test_check_out_before_check_in_is_zero() {
        let out = nine_am() - Duration::hours(1);
        assert!(close(worked_hours(nine_am(), Some(out)), 0.0));
    }

    #[test]
    fn test_total_rounds_to_cents_of_an_hour() {
        let records = [
            (nine_am(), Some(nine_am() + Duration::minutes(20))),
            (nine_am(), Some(nine_am() + Duration::minutes(20))),
            (nine_am(), None),
        ];
        assert!(close(total_hours(records), 0.67));
    }

    #[test]
    fn test_overtime() {
        assert!(close(overtime_hours(9.254, DEFAULT_OVERTIME_THRESHOLD_HOURS), 1.25));
        assert!(close(overtime_hours(6.0, DEFAULT_OVERTIME_THRESHOLD_HOURS), 0.0));
        assert!(close(overtime_hours(12.0, 10.0), 2.0));
    }
}
