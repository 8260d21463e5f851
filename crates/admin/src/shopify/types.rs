//! Shopify Admin REST payloads.
//!
//! Only the fields the order sync and the store pages read are typed. Nested
//! customer, line item and address objects stay as raw JSON so they can be
//! stored verbatim.

use chrono::{DateTime, Utc};
use lumen_core::OrderSignals;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Line item property that flags a piece for engraving.
pub const ENGRAVING_PROPERTY: &str = "_requires_engraving";

// =============================================================================
// Shop
// =============================================================================

/// Store details from `shop.json`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ShopInfo {
    pub id: Option<i64>,
    pub name: String,
    pub email: String,
    pub domain: String,
    pub myshopify_domain: String,
    pub plan_name: String,
    pub currency: String,
    pub timezone: String,
}

#[derive(Debug, Deserialize)]
pub(super) struct ShopEnvelope {
    pub shop: ShopInfo,
}

#[derive(Debug, Deserialize)]
pub(super) struct OrdersEnvelope {
    #[serde(default)]
    pub orders: Vec<ShopifyOrder>,
}

#[derive(Debug, Deserialize)]
pub(super) struct CountEnvelope {
    #[serde(default)]
    pub count: i64,
}

/// Result of a credentials check.
#[derive(Debug, Clone, Serialize)]
pub struct ConnectionTest {
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub shop: Option<ShopInfo>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Store summary shown on the settings page.
#[derive(Debug, Clone, Serialize)]
pub struct StoreInfo {
    pub name: String,
    pub email: String,
    pub domain: String,
    pub product_count: i64,
    pub order_count: i64,
    pub plan_name: String,
    pub currency: String,
    pub timezone: String,
}

impl StoreInfo {
    #[must_use]
    pub fn new(shop: ShopInfo, product_count: i64, order_count: i64) -> Self {
        Self {
            name: shop.name,
            email: shop.email,
            domain: shop.domain,
            product_count,
            order_count,
            plan_name: shop.plan_name,
            currency: shop.currency,
            timezone: shop.timezone,
        }
    }
}

// =============================================================================
// Orders
// =============================================================================

/// An order from `orders.json`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShopifyOrder {
    pub id: i64,
    #[serde(default)]
    pub order_number: Option<i64>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub total_price: Option<Decimal>,
    #[serde(default)]
    pub currency: Option<String>,
    #[serde(default)]
    pub financial_status: Option<String>,
    #[serde(default)]
    pub fulfillment_status: Option<String>,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub cancelled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub closed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub tags: Option<String>,
    #[serde(default)]
    pub note: Option<String>,
    #[serde(default)]
    pub customer: Option<Value>,
    #[serde(default)]
    pub line_items: Vec<Value>,
    #[serde(default)]
    pub shipping_address: Option<Value>,
    #[serde(default)]
    pub billing_address: Option<Value>,
    #[serde(default)]
    pub refunds: Vec<Refund>,
    #[serde(default)]
    pub fulfillments: Vec<Fulfillment>,
    #[serde(default)]
    pub disputes: Vec<Value>,
}

/// A refund on an order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Refund {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub transactions: Vec<RefundTransaction>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RefundTransaction {
    #[serde(default)]
    pub status: Option<String>,
}

/// A fulfillment (shipment) of an order.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Fulfillment {
    #[serde(default)]
    pub id: Option<i64>,
    #[serde(default)]
    pub shipment_status: Option<String>,
}

impl Refund {
    fn succeeded(&self) -> bool {
        self.status.as_deref() == Some("success")
            || self
                .transactions
                .iter()
                .any(|t| t.status.as_deref() == Some("success"))
    }
}

impl ShopifyOrder {
    /// Whether any line item carries a truthy engraving property.
    ///
    /// Properties arrive either as `[{"name", "value"}]` pairs or as a map.
    #[must_use]
    pub fn requires_engraving(&self) -> bool {
        self.line_items.iter().any(|item| match item.get("properties") {
            Some(Value::Array(pairs)) => pairs.iter().any(|pair| {
                pair.get("name").and_then(Value::as_str) == Some(ENGRAVING_PROPERTY)
                    && pair.get("value").is_some_and(is_truthy)
            }),
            Some(Value::Object(map)) => map.get(ENGRAVING_PROPERTY).is_some_and(is_truthy),
            _ => false,
        })
    }

    /// Facts the status engine needs.
    #[must_use]
    pub fn signals(&self) -> OrderSignals {
        OrderSignals {
            cancelled: self.cancelled_at.is_some(),
            closed: self.closed_at.is_some(),
            refund_count: self.refunds.len(),
            successful_refund: self.refunds.iter().any(Refund::succeeded),
            fulfillment_status: self.fulfillment_status.clone(),
            latest_shipment_status: self
                .fulfillments
                .last()
                .and_then(|f| f.shipment_status.clone()),
            financial_status: self.financial_status.clone(),
            requires_engraving: self.requires_engraving(),
            has_disputes: !self.disputes.is_empty(),
        }
    }

    /// Customer first name, if present.
    #[must_use]
    pub fn customer_first_name(&self) -> Option<&str> {
        self.customer
            .as_ref()
            .and_then(|c| c.get("first_name"))
            .and_then(Value::as_str)
    }
}

fn is_truthy(value: &Value) -> bool {
    match value {
        Value::Bool(b) => *b,
        Value::Number(n) => n.as_f64().is_some_and(|f| f != 0.0),
        Value::String(s) => {
            let s = s.trim().to_ascii_lowercase();
            !s.is_empty() && !matches!(s.as_str(), "false" | "0" | "no")
        }
        Value::Array(a) => !a.is_empty(),
        Value::Object(o) => !o.is_empty(),
        Value::Null => false,
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use lumen_core::OrderStatus;
    use lumen_core::orders::compute_current_status;
    use serde_json::json;

    use super::*;

    fn order(extra: &Value) -> ShopifyOrder {
        let mut base = json!({
            "id": 5_001,
            "order_number": 1001,
            "email": "asha@example.com",
            "total_price": "1499.00",
            "currency": "INR",
            "financial_status": "paid",
            "fulfillment_status": null,
            "created_at": "2024-03-01T10:00:00+05:30",
            "tags": "vip",
            "line_items": [{"title": "Ring", "properties": []}]
        });
        if let (Value::Object(base), Value::Object(extra)) = (&mut base, extra) {
            for (k, v) in extra {
                base.insert(k.clone(), v.clone());
            }
        }
        serde_json::from_value(base).unwrap()
    }

    #[test]
    fn test_deserialize_rest_order() {
        let o = order(&json!({}));
        assert_eq!(o.id, 5_001);
        assert_eq!(o.order_number, Some(1001));
        assert_eq!(o.total_price, Some(Decimal::new(149_900, 2)));
        assert_eq!(o.created_at.to_rfc3339(), "2024-03-01T04:30:00+00:00");
        assert!(o.refunds.is_empty());
    }

    #[test]
    fn test_engraving_from_name_value_pairs() {
        let o = order(&json!({
            "line_items": [
                {"title": "Chain", "properties": []},
                {"title": "Ring", "properties": [{"name": "_requires_engraving", "value": "true"}]}
            ]
        }));
        assert!(o.requires_engraving());
        assert_eq!(compute_current_status(&o.signals()), OrderStatus::Processing);
    }

    #[test]
    fn test_engraving_from_map_and_falsy_values() {
        let map = order(&json!({
            "line_items": [{"properties": {"_requires_engraving": true}}]
        }));
        assert!(map.requires_engraving());

        let falsy = order(&json!({
            "line_items": [{"properties": [{"name": "_requires_engraving", "value": "false"}]}]
        }));
        assert!(!falsy.requires_engraving());
        assert_eq!(
            compute_current_status(&falsy.signals()),
            OrderStatus::ReadyToPack
        );
    }

    #[test]
    fn test_signals_for_cancelled_with_refund() {
        let o = order(&json!({
            "cancelled_at": "2024-03-02T10:00:00Z",
            "refunds": [{"id": 1, "transactions": [{"status": "success"}]}]
        }));
        let signals = o.signals();
        assert!(signals.cancelled);
        assert!(signals.successful_refund);
        assert_eq!(compute_current_status(&signals), OrderStatus::Refunded);
    }

    #[test]
    fn test_latest_fulfillment_decides_delivery() {
        let o = order(&json!({
            "fulfillment_status": "fulfilled",
            "fulfillments": [
                {"id": 1, "shipment_status": "delivered"},
                {"id": 2, "shipment_status": "in_transit"}
            ]
        }));
        assert_eq!(compute_current_status(&o.signals()), OrderStatus::Shipped);
    }

    #[test]
    fn test_shop_info_tolerates_missing_fields() {
        let shop: ShopInfo = serde_json::from_value(json!({"name": "Eraya"})).unwrap();
        assert_eq!(shop.name, "Eraya");
        assert_eq!(shop.timezone, "");

        let info = StoreInfo::new(shop, 12, 340);
        assert_eq!(info.product_count, 12);
        assert_eq!(info.order_count, 340);
    }

    #[test]
    fn test_customer_first_name() {
        let o = order(&json!({"customer": {"first_name": "Asha", "last_name": "Rao"}}));
        assert_eq!(o.customer_first_name(), Some("Asha"));
        assert_eq!(order(&json!({})).customer_first_name(), None);
    }
}
