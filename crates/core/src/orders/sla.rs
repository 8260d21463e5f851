//! Service-level targets per order status.

use chrono::{DateTime, Duration, Utc};

use super::OrderStatus;

/// Extra time granted when an order needs engraving.
pub const ENGRAVING_EXTRA_HOURS: i64 = 24;

/// Hours allowed in a status before the order is late, without
/// adjustments. `None` means the status carries no target.
#[must_use]
pub const fn base_sla_hours(status: OrderStatus) -> Option<i64> {
    match status {
        OrderStatus::Pending | OrderStatus::ReadyToPack | OrderStatus::Packed => Some(24),
        OrderStatus::Confirmed => Some(48),
        OrderStatus::Processing => Some(72),
        OrderStatus::Shipped => Some(168),
        OrderStatus::Delivered
        | OrderStatus::Cancelled
        | OrderStatus::Refunded
        | OrderStatus::Returned
        | OrderStatus::OnHold
        | OrderStatus::Disputed
        | OrderStatus::Error => None,
    }
}

/// When the order becomes late in its current status.
#[must_use]
pub fn sla_due_at(
    created_at: DateTime<Utc>,
    status: OrderStatus,
    requires_engraving: bool,
) -> Option<DateTime<Utc>> {
    let mut hours = base_sla_hours(status)?;
    if requires_engraving {
        hours += ENGRAVING_EXTRA_HOURS;
    }
    Some(created_at + Duration::hours(hours))
}

/// Whether `now` is past the order's SLA deadline.
#[must_use]
pub fn is_sla_breached(
    now: DateTime<Utc>,
    created_at: DateTime<Utc>,
    status: OrderStatus,
    requires_engraving: bool,
) -> bool {
    sla_due_at(created_at, status, requires_engraving).is_some_and(|due| now > due)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::TimeZone;

    use super::*;

    fn created() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap()
    }

    #[test]
    fn test_due_at_uses_status_hours() {
        let due = sla_due_at(created(), OrderStatus::Processing, false).unwrap();
        assert_eq!(due, created() + Duration::hours(72));

        let due = sla_due_at(created(), OrderStatus::Shipped, false).unwrap();
        assert_eq!(due, created() + Duration::days(7));
    }

    #[test]
    fn test_engraving_adds_a_day() {
        let due = sla_due_at(created(), OrderStatus::ReadyToPack, true).unwrap();
        assert_eq!(due, created() + Duration::hours(48));
    }

    #[test]
    fn test_finished_orders_have_no_sla() {
        for status in [
            OrderStatus::Delivered,
            OrderStatus::Cancelled,
            OrderStatus::Refunded,
            OrderStatus::Returned,
        ] {
            assert!(sla_due_at(created(), status, true).is_none());
            assert!(!is_sla_breached(
                created() + Duration::days(365),
                created(),
                status,
                false
            ));
        }
    }

    #[test]
    fn test_breach_is_strictly_after_due() {
        let due = created() + Duration::hours(24);
        assert!(!is_sla_breached(due, created(), OrderStatus::Pending, false));
        assert!(is_sla_breached(
            due + Duration::seconds(1),
            created(),
            OrderStatus::Pending,
            false
        ));
    }
}
