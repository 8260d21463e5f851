//! Shopify payload to packing station, through the public crate APIs.
//!
//! No server or database needed.

#![allow(clippy::unwrap_used)]

use chrono::{Duration, TimeZone, Utc};
use lumen_admin::models::OrderUpsert;
use lumen_admin::shopify::ShopifyOrder;
use lumen_core::orders::{PackingAction, is_sla_breached, sla_due_at};
use lumen_core::{OrderStatus, PaymentMethod};
use rust_decimal::Decimal;
use serde_json::json;

fn order(extra: serde_json::Value) -> ShopifyOrder {
    let mut base = json!({
        "id": 5_550_001,
        "order_number": 1042,
        "email": "guest@example.com",
        "total_price": "1499.50",
        "currency": null,
        "financial_status": "paid",
        "fulfillment_status": null,
        "created_at": "2024-03-08T10:00:00Z",
        "tags": "VIP, PPCOD",
        "customer": { "first_name": "Anika", "last_name": "Rao" },
        "line_items": [{ "title": "Silver ring", "properties": [] }],
    });
    if let (Some(base), Some(extra)) = (base.as_object_mut(), extra.as_object()) {
        for (k, v) in extra {
            base.insert(k.clone(), v.clone());
        }
    }
    serde_json::from_value(base).unwrap()
}

#[test]
fn test_paid_order_is_ready_to_pack() {
    let upsert = OrderUpsert::from(&order(json!({})));
    assert_eq!(upsert.computed_status, OrderStatus::ReadyToPack);
    assert_eq!(upsert.order_number, "1042");
    assert_eq!(upsert.currency, "INR");
    assert_eq!(upsert.total_price, Decimal::new(149_950, 2));
    assert!(!upsert.requires_engraving);
    assert_eq!(PaymentMethod::from_tags(&upsert.tags), PaymentMethod::Cod);
}

#[test]
fn test_engraving_routes_to_processing_with_longer_sla() {
    let payload = order(json!({
        "line_items": [{
            "title": "Engraved pendant",
            "properties": [{ "name": "_requires_engraving", "value": "true" }],
        }],
    }));
    let upsert = OrderUpsert::from(&payload);
    assert!(upsert.requires_engraving);
    assert_eq!(upsert.computed_status, OrderStatus::Processing);

    let created = Utc.with_ymd_and_hms(2024, 3, 8, 10, 0, 0).unwrap();
    let plain = sla_due_at(created, OrderStatus::Processing, false).unwrap();
    let engraved = sla_due_at(created, OrderStatus::Processing, true).unwrap();
    assert_eq!(engraved - plain, Duration::hours(24));
    assert!(!is_sla_breached(engraved, created, OrderStatus::Processing, true));
    assert!(is_sla_breached(
        engraved + Duration::seconds(1),
        created,
        OrderStatus::Processing,
        true
    ));
}

#[test]
fn test_cancelled_and_refunded_orders() {
    let cancelled = order(json!({ "cancelled_at": "2024-03-09T08:00:00Z" }));
    assert_eq!(
        OrderUpsert::from(&cancelled).computed_status,
        OrderStatus::Cancelled
    );

    let refunded = order(json!({
        "cancelled_at": "2024-03-09T08:00:00Z",
        "refunds": [{ "id": 1, "transactions": [{ "status": "success" }] }],
    }));
    assert_eq!(
        OrderUpsert::from(&refunded).computed_status,
        OrderStatus::Refunded
    );
}

#[test]
fn test_packing_station_flow() {
    let status = OrderUpsert::from(&order(json!({}))).computed_status;

    let held = status.apply(PackingAction::Hold).unwrap();
    assert_eq!(held, OrderStatus::OnHold);
    assert!(held.apply(PackingAction::Pack).is_err());

    let released = held.apply(PackingAction::Release).unwrap();
    let packed = released.apply(PackingAction::Pack).unwrap();
    assert_eq!(packed, OrderStatus::Packed);

    // Shipping takes over from a manual packing status
    assert_eq!(
        OrderStatus::effective(OrderStatus::Shipped, Some(packed)),
        OrderStatus::Shipped
    );
    assert_eq!(
        OrderStatus::effective(OrderStatus::ReadyToPack, Some(packed)),
        OrderStatus::Packed
    );
}
