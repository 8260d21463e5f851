//! Internal order status engine.
//!
//! Shopify describes an order with several loosely related fields
//! (financial status, fulfillment status, cancellation, refunds...). The
//! warehouse works with a single linear status instead, derived here.

use serde::{Deserialize, Serialize};

use crate::types::ParseEnumError;

/// Internal order status used by the packing workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "order_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Pending,
    Confirmed,
    Processing,
    ReadyToPack,
    Packed,
    Shipped,
    Delivered,
    Cancelled,
    Returned,
    Refunded,
    OnHold,
    Disputed,
    Error,
}

/// Display properties for a status badge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StatusDisplay {
    pub label: String,
    pub color: &'static str,
    pub icon: &'static str,
}

/// Facts about a Shopify order that drive [`compute_current_status`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OrderSignals {
    /// `cancelled_at` is set.
    pub cancelled: bool,
    /// `closed_at` is set.
    pub closed: bool,
    /// Number of refunds recorded on the order.
    pub refund_count: usize,
    /// At least one refund transaction succeeded.
    pub successful_refund: bool,
    /// Shopify fulfillment status (`fulfilled`, `partial`, ...).
    pub fulfillment_status: Option<String>,
    /// Shipment status of the most recent fulfillment.
    pub latest_shipment_status: Option<String>,
    /// Shopify financial status (`pending`, `paid`, `voided`, ...).
    pub financial_status: Option<String>,
    /// Any line item is flagged for engraving.
    pub requires_engraving: bool,
    /// The order has open disputes.
    pub has_disputes: bool,
}

/// Derive the internal status of an order from its Shopify state.
///
/// Rules are evaluated in order; the first match wins.
#[must_use]
pub fn compute_current_status(signals: &OrderSignals) -> OrderStatus {
    if signals.cancelled {
        return if signals.successful_refund {
            OrderStatus::Refunded
        } else {
            OrderStatus::Cancelled
        };
    }

    if signals.closed {
        return if signals.refund_count > 0 {
            OrderStatus::Refunded
        } else {
            OrderStatus::Delivered
        };
    }

    match signals.fulfillment_status.as_deref() {
        Some("fulfilled") => {
            return if signals.latest_shipment_status.as_deref() == Some("delivered") {
                OrderStatus::Delivered
            } else {
                OrderStatus::Shipped
            };
        }
        Some("partial") => return OrderStatus::Processing,
        _ => {}
    }

    match signals.financial_status.as_deref() {
        Some("pending") => return OrderStatus::Pending,
        Some("paid" | "partially_paid") => {
            return if signals.requires_engraving {
                OrderStatus::Processing
            } else {
                OrderStatus::ReadyToPack
            };
        }
        _ => {}
    }

    if signals.has_disputes {
        return OrderStatus::Disputed;
    }

    if signals.financial_status.as_deref() == Some("voided") {
        return OrderStatus::Error;
    }

    OrderStatus::Pending
}

/// Actions available at the packing station.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PackingAction {
    /// Mark a packable order as packed.
    Pack,
    /// Park an order (missing stock, customer query...).
    Hold,
    /// Return a held order to the packing queue.
    Release,
}

/// A status change that is not allowed from the current status.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("cannot {action:?} an order that is {from}")]
pub struct TransitionError {
    pub from: OrderStatus,
    pub action: PackingAction,
}

impl OrderStatus {
    /// Every status.
    pub const ALL: [Self; 13] = [
        Self::Pending,
        Self::Confirmed,
        Self::Processing,
        Self::ReadyToPack,
        Self::Packed,
        Self::Shipped,
        Self::Delivered,
        Self::Cancelled,
        Self::Returned,
        Self::Refunded,
        Self::OnHold,
        Self::Disputed,
        Self::Error,
    ];

    /// Snake-case wire/database name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Confirmed => "confirmed",
            Self::Processing => "processing",
            Self::ReadyToPack => "ready_to_pack",
            Self::Packed => "packed",
            Self::Shipped => "shipped",
            Self::Delivered => "delivered",
            Self::Cancelled => "cancelled",
            Self::Returned => "returned",
            Self::Refunded => "refunded",
            Self::OnHold => "on_hold",
            Self::Disputed => "disputed",
            Self::Error => "error",
        }
    }

    /// Statuses staff may set by hand.
    #[must_use]
    pub const fn is_manual(self) -> bool {
        matches!(
            self,
            Self::Confirmed
                | Self::Processing
                | Self::ReadyToPack
                | Self::Packed
                | Self::OnHold
                | Self::Returned
        )
    }

    /// Statuses driven by Shopify that a manual override cannot mask.
    #[must_use]
    pub const fn is_locked(self) -> bool {
        matches!(
            self,
            Self::Shipped
                | Self::Delivered
                | Self::Cancelled
                | Self::Refunded
                | Self::Disputed
                | Self::Error
        )
    }

    /// Badge label, color and icon.
    #[must_use]
    pub fn display(self) -> StatusDisplay {
        let (label, color, icon) = match self {
            Self::Pending => ("Pending", "gray", "⏳"),
            Self::Confirmed => ("Confirmed", "blue", "✅"),
            Self::Processing => ("Processing", "purple", "⚙️"),
            Self::ReadyToPack => ("Ready to Pack", "yellow", "📦"),
            Self::Packed => ("Packed", "green", "✨"),
            Self::Shipped => ("Shipped", "blue", "🚚"),
            Self::Delivered => ("Delivered", "green", "🎉"),
            Self::Cancelled => ("Cancelled", "red", "❌"),
            Self::Returned => ("Returned", "orange", "↩️"),
            Self::Refunded => ("Refunded", "red", "💰"),
            Self::OnHold => ("On Hold", "orange", "⏸️"),
            Self::Disputed => ("Disputed", "red", "⚠️"),
            Self::Error => ("Error", "red", "❗"),
        };
        StatusDisplay {
            label: label.to_owned(),
            color,
            icon,
        }
    }

    /// Resolve the status shown to staff from the Shopify-derived status
    /// and an optional manual override.
    #[must_use]
    pub fn effective(computed: Self, manual: Option<Self>) -> Self {
        match manual {
            Some(status) if !computed.is_locked() => status,
            _ => computed,
        }
    }

    /// Apply a packing-station action.
    ///
    /// # Errors
    ///
    /// Returns [`TransitionError`] when the action does not apply to the
    /// current status.
    pub fn apply(self, action: PackingAction) -> Result<Self, TransitionError> {
        let next = match (action, self) {
            (PackingAction::Pack, Self::ReadyToPack | Self::Processing) => Some(Self::Packed),
            (PackingAction::Hold, current)
                if !current.is_locked()
                    && !matches!(current, Self::OnHold | Self::Returned) =>
            {
                Some(Self::OnHold)
            }
            (PackingAction::Release, Self::OnHold) => Some(Self::ReadyToPack),
            _ => None,
        };
        next.ok_or(TransitionError { from: self, action })
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = ParseEnumError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let needle = s.trim().to_ascii_lowercase();
        Self::ALL
            .into_iter()
            .find(|status| status.as_str() == needle)
            .ok_or_else(|| ParseEnumError::new("order status", s))
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn paid() -> OrderSignals {
        OrderSignals {
            financial_status: Some("paid".to_owned()),
            ..OrderSignals::default()
        }
    }

    #[test]
    fn test_cancelled_with_successful_refund_is_refunded() {
        let signals = OrderSignals {
            cancelled: true,
            refund_count: 1,
            successful_refund: true,
            ..paid()
        };
        assert_eq!(compute_current_status(&signals), OrderStatus::Refunded);
    }

    #[test]
    fn test_cancelled_without_refund_is_cancelled() {
        let signals = OrderSignals {
            cancelled: true,
            refund_count: 1,
            ..paid()
        };
        assert_eq!(compute_current_status(&signals), OrderStatus::Cancelled);
    }

    #[test]
    fn test_closed_orders() {
        let closed = OrderSignals {
            closed: true,
            ..paid()
        };
        assert_eq!(compute_current_status(&closed), OrderStatus::Delivered);

        let refunded = OrderSignals {
            refund_count: 2,
            ..closed
        };
        assert_eq!(compute_current_status(&refunded), OrderStatus::Refunded);
    }

    #[test]
    fn test_fulfilled_orders() {
        let shipped = OrderSignals {
            fulfillment_status: Some("fulfilled".to_owned()),
            latest_shipment_status: Some("in_transit".to_owned()),
            ..paid()
        };
        assert_eq!(compute_current_status(&shipped), OrderStatus::Shipped);

        let delivered = OrderSignals {
            latest_shipment_status: Some("delivered".to_owned()),
            ..shipped
        };
        assert_eq!(compute_current_status(&delivered), OrderStatus::Delivered);
    }

    #[test]
    fn test_partial_fulfillment_is_processing() {
        let signals = OrderSignals {
            fulfillment_status: Some("partial".to_owned()),
            ..paid()
        };
        assert_eq!(compute_current_status(&signals), OrderStatus::Processing);
    }

    #[test]
    fn test_paid_orders_are_ready_unless_engraved() {
        assert_eq!(compute_current_status(&paid()), OrderStatus::ReadyToPack);

        let engraved = OrderSignals {
            requires_engraving: true,
            ..paid()
        };
        assert_eq!(compute_current_status(&engraved), OrderStatus::Processing);

        let partially = OrderSignals {
            financial_status: Some("partially_paid".to_owned()),
            ..OrderSignals::default()
        };
        assert_eq!(compute_current_status(&partially), OrderStatus::ReadyToPack);
    }

    #[test]
    fn test_disputes_voids_and_fallback() {
        let disputed = OrderSignals {
            financial_status: Some("refunded".to_owned()),
            has_disputes: true,
            ..OrderSignals::default()
        };
        assert_eq!(compute_current_status(&disputed), OrderStatus::Disputed);

        let voided = OrderSignals {
            financial_status: Some("voided".to_owned()),
            ..OrderSignals::default()
        };
        assert_eq!(compute_current_status(&voided), OrderStatus::Error);

        assert_eq!(
            compute_current_status(&OrderSignals::default()),
            OrderStatus::Pending
        );
    }

    #[test]
    fn test_effective_status_respects_locked_states() {
        assert_eq!(
            OrderStatus::effective(OrderStatus::ReadyToPack, Some(OrderStatus::Packed)),
            OrderStatus::Packed
        );
        assert_eq!(
            OrderStatus::effective(OrderStatus::Shipped, Some(OrderStatus::Packed)),
            OrderStatus::Shipped
        );
        assert_eq!(
            OrderStatus::effective(OrderStatus::Pending, None),
            OrderStatus::Pending
        );
    }

    #[test]
    fn test_packing_transitions() {
        assert_eq!(
            OrderStatus::ReadyToPack.apply(PackingAction::Pack),
            Ok(OrderStatus::Packed)
        );
        assert_eq!(
            OrderStatus::Processing.apply(PackingAction::Pack),
            Ok(OrderStatus::Packed)
        );
        assert_eq!(
            OrderStatus::Pending.apply(PackingAction::Hold),
            Ok(OrderStatus::OnHold)
        );
        assert_eq!(
            OrderStatus::OnHold.apply(PackingAction::Release),
            Ok(OrderStatus::ReadyToPack)
        );

        let err = OrderStatus::Shipped.apply(PackingAction::Pack).unwrap_err();
        assert_eq!(err.from, OrderStatus::Shipped);
        assert!(OrderStatus::Delivered.apply(PackingAction::Hold).is_err());
        assert!(OrderStatus::OnHold.apply(PackingAction::Hold).is_err());
        assert!(OrderStatus::Packed.apply(PackingAction::Release).is_err());
    }

    #[test]
    fn test_manual_statuses_are_never_locked() {
        for status in OrderStatus::ALL {
            assert!(!(status.is_manual() && status.is_locked()), "{status}");
        }
    }

    #[test]
    fn test_parse_and_display_agree() {
        for status in OrderStatus::ALL {
            assert_eq!(status.to_string().parse::<OrderStatus>().unwrap(), status);
            let json = serde_json::to_string(&status).unwrap();
            assert_eq!(json, format!("\"{status}\""));
        }
        assert!("teleported".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_display_labels() {
        assert_eq!(OrderStatus::ReadyToPack.display().label, "Ready to Pack");
        assert_eq!(OrderStatus::OnHold.display().color, "orange");
    }
}
