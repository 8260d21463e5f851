//! Synced Shopify orders and the views served to staff.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;

use lumen_core::orders::{
    compute_current_status, customer_name, financial_status_display, is_sla_breached, sla_due_at,
};
use lumen_core::types::money::{currency_or_default, round_money};
use lumen_core::{OrderEventId, OrderId, OrderStatus, PaymentMethod, StatusDisplay, UserId};

use crate::shopify::ShopifyOrder;

/// An order row as stored locally.
#[derive(Debug, Clone)]
pub struct Order {
    pub id: OrderId,
    pub shopify_id: i64,
    pub order_number: String,
    pub email: String,
    pub total_price: Decimal,
    pub currency: String,
    pub financial_status: String,
    pub fulfillment_status: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    /// Status derived from Shopify on the last sync.
    pub computed_status: OrderStatus,
    /// Manual override set by staff.
    pub workflow_status: Option<OrderStatus>,
    pub workflow_updated_at: Option<DateTime<Utc>>,
    pub packed_by: Option<UserId>,
    pub packed_at: Option<DateTime<Utc>>,
    pub requires_engraving: bool,
    pub customer: Value,
    pub line_items: Value,
    pub shipping_address: Value,
    pub billing_address: Value,
    pub tags: String,
    pub note: String,
    pub synced_at: DateTime<Utc>,
}

impl Order {
    /// Status staff see.
    #[must_use]
    pub fn status(&self) -> OrderStatus {
        OrderStatus::effective(self.computed_status, self.workflow_status)
    }

    #[must_use]
    pub fn payment_method(&self) -> PaymentMethod {
        PaymentMethod::from_tags(&self.tags)
    }

    #[must_use]
    pub fn customer_name(&self) -> String {
        customer_name(
            self.customer.get("first_name").and_then(Value::as_str),
            self.customer.get("last_name").and_then(Value::as_str),
        )
    }

    #[must_use]
    pub fn sla_due_at(&self) -> Option<DateTime<Utc>> {
        sla_due_at(self.created_at, self.status(), self.requires_engraving)
    }

    #[must_use]
    pub fn is_sla_breached(&self, now: DateTime<Utc>) -> bool {
        is_sla_breached(now, self.created_at, self.status(), self.requires_engraving)
    }
}

/// Column values written on every sync. Workflow columns are never part of
/// an upsert.
#[derive(Debug, Clone)]
pub struct OrderUpsert {
    pub shopify_id: i64,
    pub order_number: String,
    pub email: String,
    pub total_price: Decimal,
    pub currency: String,
    pub financial_status: String,
    pub fulfillment_status: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
    pub cancelled_at: Option<DateTime<Utc>>,
    pub closed_at: Option<DateTime<Utc>>,
    pub computed_status: OrderStatus,
    pub requires_engraving: bool,
    pub customer: Value,
    pub line_items: Value,
    pub shipping_address: Value,
    pub billing_address: Value,
    pub tags: String,
    pub note: String,
}

impl From<&ShopifyOrder> for OrderUpsert {
    fn from(order: &ShopifyOrder) -> Self {
        let order_number = order.order_number.map_or_else(
            || order.name.clone().unwrap_or_default(),
            |n| n.to_string(),
        );
        let object_or_empty =
            |v: &Option<Value>| v.clone().unwrap_or_else(|| Value::Object(serde_json::Map::new()));

        Self {
            shopify_id: order.id,
            order_number,
            email: order.email.clone().unwrap_or_default(),
            total_price: round_money(order.total_price.unwrap_or_default()),
            currency: currency_or_default(order.currency.as_deref()),
            financial_status: order.financial_status.clone().unwrap_or_default(),
            fulfillment_status: order.fulfillment_status.clone(),
            created_at: order.created_at,
            updated_at: order.updated_at,
            cancelled_at: order.cancelled_at,
            closed_at: order.closed_at,
            computed_status: compute_current_status(&order.signals()),
            requires_engraving: order.requires_engraving(),
            customer: object_or_empty(&order.customer),
            line_items: Value::Array(order.line_items.clone()),
            shipping_address: object_or_empty(&order.shipping_address),
            billing_address: object_or_empty(&order.billing_address),
            tags: order.tags.clone().unwrap_or_default(),
            note: order.note.clone().unwrap_or_default(),
        }
    }
}

/// Filters for `GET /api/orders`.
#[derive(Debug, Clone, Default)]
pub struct OrderFilter {
    /// Matches order number or email.
    pub search: Option<String>,
    /// Shopify financial status.
    pub financial_status: Option<String>,
    /// Inclusive lower bound on `created_at`.
    pub created_from: Option<DateTime<Utc>>,
    /// Exclusive upper bound on `created_at`.
    pub created_before: Option<DateTime<Utc>>,
    pub payment_method: Option<PaymentMethod>,
    pub offset: i64,
    pub limit: i64,
}

/// An order formatted for list and detail responses.
#[derive(Debug, Clone, Serialize)]
pub struct OrderView {
    pub id: OrderId,
    pub shopify_id: i64,
    pub order_number: String,
    pub email: String,
    pub customer_name: String,
    pub total_price: Decimal,
    pub currency: String,
    pub financial_status: String,
    pub financial_status_display: StatusDisplay,
    pub fulfillment_status: Option<String>,
    pub status: OrderStatus,
    pub status_display: StatusDisplay,
    pub payment_method: PaymentMethod,
    pub requires_engraving: bool,
    pub tags: String,
    pub created_at: DateTime<Utc>,
    pub sla_due_at: Option<DateTime<Utc>>,
    pub sla_breached: bool,
    pub packed_by: Option<UserId>,
    pub packed_at: Option<DateTime<Utc>>,
}

impl OrderView {
    #[must_use]
    pub fn new(order: &Order, now: DateTime<Utc>) -> Self {
        let status = order.status();
        Self {
            id: order.id,
            shopify_id: order.shopify_id,
            order_number: order.order_number.clone(),
            email: order.email.clone(),
            customer_name: order.customer_name(),
            total_price: order.total_price,
            currency: order.currency.clone(),
            financial_status: order.financial_status.clone(),
            financial_status_display: financial_status_display(&order.financial_status),
            fulfillment_status: order.fulfillment_status.clone(),
            status,
            status_display: status.display(),
            payment_method: order.payment_method(),
            requires_engraving: order.requires_engraving,
            tags: order.tags.clone(),
            created_at: order.created_at,
            sla_due_at: order.sla_due_at(),
            sla_breached: order.is_sla_breached(now),
            packed_by: order.packed_by,
            packed_at: order.packed_at,
        }
    }
}

/// Detail view: the list view plus the stored Shopify payload.
#[derive(Debug, Clone, Serialize)]
pub struct OrderDetail {
    #[serde(flatten)]
    pub summary: OrderView,
    pub computed_status: OrderStatus,
    pub workflow_status: Option<OrderStatus>,
    pub customer: Value,
    pub line_items: Value,
    pub shipping_address: Value,
    pub billing_address: Value,
    pub note: String,
    pub synced_at: DateTime<Utc>,
    /// Status history, newest first.
    pub events: Vec<OrderEvent>,
}

impl OrderDetail {
    #[must_use]
    pub fn new(order: Order, now: DateTime<Utc>) -> Self {
        let summary = OrderView::new(&order, now);
        Self {
            summary,
            computed_status: order.computed_status,
            workflow_status: order.workflow_status,
            customer: order.customer,
            line_items: order.line_items,
            shipping_address: order.shipping_address,
            billing_address: order.billing_address,
            note: order.note,
            synced_at: order.synced_at,
            events: Vec::new(),
        }
    }

    #[must_use]
    pub fn with_events(mut self, events: Vec<OrderEvent>) -> Self {
        self.events = events;
        self
    }
}

/// Kind of entry in an order's audit trail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum OrderEventType {
    StatusChange,
}

impl OrderEventType {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::StatusChange => "status_change",
        }
    }
}

/// One entry in an order's audit trail.
#[derive(Debug, Clone, Serialize)]
pub struct OrderEvent {
    pub id: OrderEventId,
    pub order_id: OrderId,
    pub event_type: String,
    pub old_value: Option<String>,
    pub new_value: Option<String>,
    /// `None` when the Shopify sync made the change.
    pub actor_id: Option<UserId>,
    pub note: Option<String>,
    pub created_at: DateTime<Utc>,
}

/// A manual workflow status change.
#[derive(Debug, Clone, Copy)]
pub struct WorkflowChange<'a> {
    /// Effective status the order was read in. The change only applies if
    /// it is still in that status.
    pub expected: OrderStatus,
    pub status: OrderStatus,
    pub actor: UserId,
    pub note: Option<&'a str>,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::{Duration, TimeZone};
    use serde_json::json;

    use super::*;

    fn order() -> Order {
        Order {
            id: OrderId::new(1),
            shopify_id: 5_001,
            order_number: "1001".to_string(),
            email: "asha@example.com".to_string(),
            total_price: Decimal::new(149_900, 2),
            currency: "INR".to_string(),
            financial_status: "paid".to_string(),
            fulfillment_status: None,
            created_at: Utc.with_ymd_and_hms(2024, 3, 1, 10, 0, 0).unwrap(),
            updated_at: None,
            cancelled_at: None,
            closed_at: None,
            computed_status: OrderStatus::ReadyToPack,
            workflow_status: None,
            workflow_updated_at: None,
            packed_by: None,
            packed_at: None,
            requires_engraving: false,
            customer: json!({"first_name": "Asha", "last_name": "Rao"}),
            line_items: json!([]),
            shipping_address: json!({}),
            billing_address: json!({}),
            tags: "COD".to_string(),
            note: String::new(),
            synced_at: Utc.with_ymd_and_hms(2024, 3, 1, 10, 5, 0).unwrap(),
        }
    }

    #[test]
    fn test_manual_status_applies_until_locked() {
        let mut o = order();
        o.workflow_status = Some(OrderStatus::Packed);
        assert_eq!(o.status(), OrderStatus::Packed);

        o.computed_status = OrderStatus::Shipped;
        assert_eq!(o.status(), OrderStatus::Shipped);
    }

    #[test]
    fn test_view_formats_order() {
        let o = order();
        let now = o.created_at + Duration::hours(30);
        let view = OrderView::new(&o, now);

        assert_eq!(view.customer_name, "Asha Rao");
        assert_eq!(view.payment_method, PaymentMethod::Cod);
        assert_eq!(view.status_display.label, "Ready to Pack");
        assert_eq!(view.financial_status_display.label, "Paid");
        assert_eq!(view.sla_due_at, Some(o.created_at + Duration::hours(24)));
        assert!(view.sla_breached);
    }

    #[test]
    fn test_detail_flattens_summary() {
        let detail = OrderDetail::new(order(), Utc::now());
        let json = serde_json::to_value(&detail).unwrap();
        assert_eq!(json["order_number"], "1001");
        assert_eq!(json["computed_status"], "ready_to_pack");
        assert!(json["workflow_status"].is_null());
        assert_eq!(json["events"], json!([]));
    }

    #[test]
    fn test_detail_carries_events() {
        let event = OrderEvent {
            id: OrderEventId::new(3),
            order_id: OrderId::new(1),
            event_type: OrderEventType::StatusChange.as_str().to_string(),
            old_value: Some("ready_to_pack".to_string()),
            new_value: Some("on_hold".to_string()),
            actor_id: Some(UserId::new(7)),
            note: Some("Customer asked to change the engraving".to_string()),
            created_at: Utc.with_ymd_and_hms(2024, 3, 2, 9, 0, 0).unwrap(),
        };

        let detail = OrderDetail::new(order(), Utc::now()).with_events(vec![event]);
        let json = serde_json::to_value(&detail).unwrap();
        let events = json["events"].as_array().unwrap();
        assert_eq!(events.len(), 1);
        assert_eq!(events[0]["event_type"], "status_change");
        assert_eq!(events[0]["old_value"], "ready_to_pack");
        assert_eq!(events[0]["new_value"], "on_hold");
        assert_eq!(events[0]["actor_id"], 7);
        assert_eq!(events[0]["note"], "Customer asked to change the engraving");
    }

    #[test]
    fn test_upsert_from_shopify_order() {
        let shopify: ShopifyOrder = serde_json::from_value(json!({
            "id": 9,
            "name": "#1009",
            "total_price": "10.005",
            "financial_status": "paid",
            "created_at": "2024-03-01T10:00:00Z",
            "line_items": [{"properties": [{"name": "_requires_engraving", "value": "yes"}]}]
        }))
        .unwrap();

        let upsert = OrderUpsert::from(&shopify);
        assert_eq!(upsert.order_number, "#1009");
        assert_eq!(upsert.total_price, Decimal::new(1_001, 2));
        assert_eq!(upsert.currency, "INR");
        assert!(upsert.requires_engraving);
        assert_eq!(upsert.computed_status, OrderStatus::Processing);
        assert!(upsert.customer.is_object());
    }
}
