//! Synced order repository.
//!
//! Sync writes only the Shopify-owned columns; the packing workflow owns
//! `workflow_status`, `packed_by` and `packed_at`, which survive resyncs.
//! Every status change, synced or manual, is appended to `order_events`.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;
use serde_json::Value;
use sqlx::{PgConnection, PgPool};

use lumen_core::types::money::round_money;
use lumen_core::{OrderEventId, OrderId, OrderStatus, UserId};

use super::{RepositoryError, like_pattern};
use crate::models::{
    Order, OrderEvent, OrderEventType, OrderFilter, OrderUpsert, WorkflowChange,
};

const ORDER_COLUMNS: &str = "id, shopify_id, order_number, email, total_price, currency, \
     financial_status, fulfillment_status, created_at, updated_at, cancelled_at, closed_at, \
     computed_status, workflow_status, workflow_updated_at, packed_by, packed_at, \
     requires_engraving, customer_data, line_items, shipping_address, billing_address, \
     tags, note, synced_at";

/// Status staff see: the manual override unless Shopify says the order is
/// terminal or in transit. Mirrors `OrderStatus::effective`.
const EFFECTIVE_STATUS: &str = "(CASE
        WHEN computed_status IN ('shipped', 'delivered', 'cancelled', 'refunded', 'disputed', 'error')
            THEN computed_status
        ELSE COALESCE(workflow_status, computed_status)
    END)";

const LIST_FILTER: &str = r"
    WHERE ($1::TEXT IS NULL OR order_number ILIKE $1 OR email ILIKE $1)
      AND ($2::TEXT IS NULL OR financial_status = $2)
      AND ($3::TIMESTAMPTZ IS NULL OR created_at >= $3)
      AND ($4::TIMESTAMPTZ IS NULL OR created_at < $4)
      AND ($5::TEXT IS NULL OR (($5 = 'cod') = (LOWER(tags) LIKE '%cod%')))";

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: i32,
    shopify_id: i64,
    order_number: String,
    email: String,
    total_price: Decimal,
    currency: String,
    financial_status: String,
    fulfillment_status: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: Option<DateTime<Utc>>,
    cancelled_at: Option<DateTime<Utc>>,
    closed_at: Option<DateTime<Utc>>,
    computed_status: OrderStatus,
    workflow_status: Option<OrderStatus>,
    workflow_updated_at: Option<DateTime<Utc>>,
    packed_by: Option<i32>,
    packed_at: Option<DateTime<Utc>>,
    requires_engraving: bool,
    customer_data: Value,
    line_items: Value,
    shipping_address: Value,
    billing_address: Value,
    tags: String,
    note: String,
    synced_at: DateTime<Utc>,
}

impl From<OrderRow> for Order {
    fn from(row: OrderRow) -> Self {
        Self {
            id: OrderId::new(row.id),
            shopify_id: row.shopify_id,
            order_number: row.order_number,
            email: row.email,
            total_price: row.total_price,
            currency: row.currency,
            financial_status: row.financial_status,
            fulfillment_status: row.fulfillment_status,
            created_at: row.created_at,
            updated_at: row.updated_at,
            cancelled_at: row.cancelled_at,
            closed_at: row.closed_at,
            computed_status: row.computed_status,
            workflow_status: row.workflow_status,
            workflow_updated_at: row.workflow_updated_at,
            packed_by: row.packed_by.map(UserId::new),
            packed_at: row.packed_at,
            requires_engraving: row.requires_engraving,
            customer: row.customer_data,
            line_items: row.line_items,
            shipping_address: row.shipping_address,
            billing_address: row.billing_address,
            tags: row.tags,
            note: row.note,
            synced_at: row.synced_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderEventRow {
    id: i32,
    order_id: i32,
    event_type: String,
    old_value: Option<String>,
    new_value: Option<String>,
    actor_id: Option<i32>,
    note: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<OrderEventRow> for OrderEvent {
    fn from(row: OrderEventRow) -> Self {
        Self {
            id: OrderEventId::new(row.id),
            order_id: OrderId::new(row.order_id),
            event_type: row.event_type,
            old_value: row.old_value,
            new_value: row.new_value,
            actor_id: row.actor_id.map(UserId::new),
            note: row.note,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CountRow {
    key: String,
    count: i64,
}

fn into_breakdown(rows: Vec<CountRow>) -> BTreeMap<String, i64> {
    rows.into_iter().map(|r| (r.key, r.count)).collect()
}

/// Order count and revenue over a time window.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct WindowTotals {
    pub orders: i64,
    pub revenue: Decimal,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for orders synced from Shopify.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert or refresh orders by `shopify_id` in one transaction.
    ///
    /// A refresh that changes `computed_status` appends a `status_change`
    /// event with no actor. Returns the number of rows written.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if any statement fails; nothing is
    /// written in that case.
    pub async fn upsert_many(&self, orders: &[OrderUpsert]) -> Result<usize, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        for order in orders {
            sqlx::query(
                r"
                WITH previous AS (
                    SELECT id, computed_status FROM shopify_orders WHERE shopify_id = $1
                ),
                upserted AS (
                    INSERT INTO shopify_orders (
                        shopify_id, order_number, email, total_price, currency,
                        financial_status, fulfillment_status, created_at, updated_at,
                        cancelled_at, closed_at, computed_status, requires_engraving,
                        customer_data, line_items, shipping_address, billing_address,
                        tags, note, synced_at
                    )
                    VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13,
                            $14, $15, $16, $17, $18, $19, NOW())
                    ON CONFLICT (shopify_id) DO UPDATE SET
                        order_number = EXCLUDED.order_number,
                        email = EXCLUDED.email,
                        total_price = EXCLUDED.total_price,
                        currency = EXCLUDED.currency,
                        financial_status = EXCLUDED.financial_status,
                        fulfillment_status = EXCLUDED.fulfillment_status,
                        created_at = EXCLUDED.created_at,
                        updated_at = EXCLUDED.updated_at,
                        cancelled_at = EXCLUDED.cancelled_at,
                        closed_at = EXCLUDED.closed_at,
                        computed_status = EXCLUDED.computed_status,
                        requires_engraving = EXCLUDED.requires_engraving,
                        customer_data = EXCLUDED.customer_data,
                        line_items = EXCLUDED.line_items,
                        shipping_address = EXCLUDED.shipping_address,
                        billing_address = EXCLUDED.billing_address,
                        tags = EXCLUDED.tags,
                        note = EXCLUDED.note,
                        synced_at = NOW()
                    RETURNING id, computed_status
                )
                INSERT INTO order_events (order_id, event_type, old_value, new_value, note)
                SELECT upserted.id, $20, previous.computed_status::TEXT,
                       upserted.computed_status::TEXT, $21
                FROM upserted
                JOIN previous ON previous.id = upserted.id
                WHERE previous.computed_status <> upserted.computed_status
                ",
            )
            .bind(order.shopify_id)
            .bind(&order.order_number)
            .bind(&order.email)
            .bind(order.total_price)
            .bind(&order.currency)
            .bind(&order.financial_status)
            .bind(&order.fulfillment_status)
            .bind(order.created_at)
            .bind(order.updated_at)
            .bind(order.cancelled_at)
            .bind(order.closed_at)
            .bind(order.computed_status)
            .bind(order.requires_engraving)
            .bind(&order.customer)
            .bind(&order.line_items)
            .bind(&order.shipping_address)
            .bind(&order.billing_address)
            .bind(&order.tags)
            .bind(&order.note)
            .bind(OrderEventType::StatusChange.as_str())
            .bind(SYNC_EVENT_NOTE)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(orders.len())
    }

    /// Shopify ID of the most recently created stored order.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn newest_shopify_id(&self) -> Result<Option<i64>, RepositoryError> {
        let id = sqlx::query_scalar(
            "SELECT shopify_id FROM shopify_orders ORDER BY created_at DESC, shopify_id DESC LIMIT 1",
        )
        .fetch_optional(self.pool)
        .await?;

        Ok(id)
    }

    /// Get an order by local ID.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get(&self, id: OrderId) -> Result<Option<Order>, RepositoryError> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM shopify_orders WHERE id = $1"
        ))
        .bind(id.as_i32())
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Into::into))
    }

    /// Filtered listing, newest first, plus the total matching.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list(&self, filter: &OrderFilter) -> Result<(Vec<Order>, i64), RepositoryError> {
        let search = filter
            .search
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(like_pattern);
        let payment = filter.payment_method.map(|p| p.as_str());

        let total: i64 =
            sqlx::query_scalar(&format!("SELECT COUNT(*) FROM shopify_orders {LIST_FILTER}"))
                .bind(&search)
                .bind(&filter.financial_status)
                .bind(filter.created_from)
                .bind(filter.created_before)
                .bind(payment)
                .fetch_one(self.pool)
                .await?;

        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM shopify_orders {LIST_FILTER}
             ORDER BY created_at DESC, id DESC
             LIMIT $6 OFFSET $7"
        ))
        .bind(&search)
        .bind(&filter.financial_status)
        .bind(filter.created_from)
        .bind(filter.created_before)
        .bind(payment)
        .bind(filter.limit)
        .bind(filter.offset)
        .fetch_all(self.pool)
        .await?;

        Ok((rows.into_iter().map(Into::into).collect(), total))
    }

    /// Newest orders, optionally only those created at or after `since`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn newest(
        &self,
        since: Option<DateTime<Utc>>,
        limit: i64,
        offset: i64,
    ) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM shopify_orders
             WHERE ($1::TIMESTAMPTZ IS NULL OR created_at >= $1)
             ORDER BY created_at DESC, id DESC
             LIMIT $2 OFFSET $3"
        ))
        .bind(since)
        .bind(limit)
        .bind(offset)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Order count and revenue for orders created in `[since, until)`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn totals(
        &self,
        since: Option<DateTime<Utc>>,
        until: Option<DateTime<Utc>>,
    ) -> Result<WindowTotals, RepositoryError> {
        let (orders, revenue): (i64, Decimal) = sqlx::query_as(
            r"
            SELECT COUNT(*), COALESCE(SUM(total_price), 0)
            FROM shopify_orders
            WHERE ($1::TIMESTAMPTZ IS NULL OR created_at >= $1)
              AND ($2::TIMESTAMPTZ IS NULL OR created_at < $2)
            ",
        )
        .bind(since)
        .bind(until)
        .fetch_one(self.pool)
        .await?;

        Ok(WindowTotals {
            orders,
            revenue: round_money(revenue),
        })
    }

    /// Order counts per Shopify financial status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn financial_breakdown(
        &self,
        since: Option<DateTime<Utc>>,
    ) -> Result<BTreeMap<String, i64>, RepositoryError> {
        let rows = sqlx::query_as::<_, CountRow>(
            r"
            SELECT COALESCE(NULLIF(financial_status, ''), 'unknown') AS key, COUNT(*) AS count
            FROM shopify_orders
            WHERE ($1::TIMESTAMPTZ IS NULL OR created_at >= $1)
            GROUP BY 1
            ",
        )
        .bind(since)
        .fetch_all(self.pool)
        .await?;

        Ok(into_breakdown(rows))
    }

    /// Order counts per effective internal status.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn status_breakdown(&self) -> Result<BTreeMap<String, i64>, RepositoryError> {
        let rows = sqlx::query_as::<_, CountRow>(&format!(
            "SELECT {EFFECTIVE_STATUS}::TEXT AS key, COUNT(*) AS count
             FROM shopify_orders GROUP BY 1"
        ))
        .fetch_all(self.pool)
        .await?;

        Ok(into_breakdown(rows))
    }

    /// Order counts per Shopify fulfillment status (`unfulfilled` when unset).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn fulfillment_breakdown(&self) -> Result<BTreeMap<String, i64>, RepositoryError> {
        let rows = sqlx::query_as::<_, CountRow>(
            r"
            SELECT COALESCE(NULLIF(fulfillment_status, ''), 'unfulfilled') AS key, COUNT(*) AS count
            FROM shopify_orders
            GROUP BY 1
            ",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(into_breakdown(rows))
    }

    /// Orders whose effective status carries an SLA target.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn in_flight(&self) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM shopify_orders
             WHERE {EFFECTIVE_STATUS} IN
                   ('pending', 'confirmed', 'processing', 'ready_to_pack', 'packed', 'shipped')"
        ))
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Orders awaiting payment (`pending` or `authorized`).
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn count_awaiting_payment(&self) -> Result<i64, RepositoryError> {
        let count = sqlx::query_scalar(
            "SELECT COUNT(*) FROM shopify_orders WHERE financial_status IN ('pending', 'authorized')",
        )
        .fetch_one(self.pool)
        .await?;

        Ok(count)
    }

    /// Orders ready for the packing station, oldest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn packing_queue(&self, limit: i64) -> Result<Vec<Order>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM shopify_orders
             WHERE {EFFECTIVE_STATUS} = 'ready_to_pack'
             ORDER BY created_at ASC, id ASC
             LIMIT $1"
        ))
        .bind(limit)
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Apply a manual workflow change and log it to `order_events`.
    ///
    /// The update only lands while the order's effective status still equals
    /// `change.expected`; `packed_by` and `packed_at` are recorded when the
    /// new status is `packed`.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::NotFound` if the order does not exist and
    /// `RepositoryError::Conflict` if its status changed since it was read.
    pub async fn set_workflow_status(
        &self,
        id: OrderId,
        change: &WorkflowChange<'_>,
    ) -> Result<Order, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let row = sqlx::query_as::<_, OrderRow>(&workflow_update_sql())
            .bind(id.as_i32())
            .bind(change.status)
            .bind(change.actor.as_i32())
            .bind(change.expected)
            .fetch_optional(&mut *tx)
            .await?;

        let Some(row) = row else {
            let exists: bool =
                sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM shopify_orders WHERE id = $1)")
                    .bind(id.as_i32())
                    .fetch_one(&mut *tx)
                    .await?;
            return Err(stale_workflow_update(exists));
        };

        insert_status_event(
            &mut *tx,
            id,
            change.expected,
            change.status,
            Some(change.actor),
            change.note,
        )
        .await?;
        tx.commit().await?;

        Ok(row.into())
    }

    /// Audit trail of an order, newest first.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn events(&self, id: OrderId) -> Result<Vec<OrderEvent>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderEventRow>(
            r"
            SELECT id, order_id, event_type, old_value, new_value, actor_id, note, created_at
            FROM order_events
            WHERE order_id = $1
            ORDER BY created_at DESC, id DESC
            ",
        )
        .bind(id.as_i32())
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Into::into).collect())
    }
}

/// Note attached to status changes picked up by the Shopify sync.
const SYNC_EVENT_NOTE: &str = "Shopify sync";

/// Guarded workflow update: `$4` is the effective status the caller saw.
fn workflow_update_sql() -> String {
    format!(
        "UPDATE shopify_orders SET
            workflow_status = $2,
            workflow_updated_at = NOW(),
            packed_by = CASE WHEN $2 = 'packed'::order_status THEN $3 ELSE packed_by END,
            packed_at = CASE WHEN $2 = 'packed'::order_status THEN NOW() ELSE packed_at END
         WHERE id = $1 AND {EFFECTIVE_STATUS} = $4
         RETURNING {ORDER_COLUMNS}"
    )
}

/// Error for a guarded update that matched no row.
fn stale_workflow_update(exists: bool) -> RepositoryError {
    if exists {
        RepositoryError::Conflict(
            "Order status changed since it was loaded; reload and try again".to_string(),
        )
    } else {
        RepositoryError::NotFound
    }
}

async fn insert_status_event(
    conn: &mut PgConnection,
    order_id: OrderId,
    old: OrderStatus,
    new: OrderStatus,
    actor: Option<UserId>,
    note: Option<&str>,
) -> Result<(), RepositoryError> {
    sqlx::query(
        r"
        INSERT INTO order_events (order_id, event_type, old_value, new_value, actor_id, note)
        VALUES ($1, $2, $3, $4, $5, $6)
        ",
    )
    .bind(order_id.as_i32())
    .bind(OrderEventType::StatusChange.as_str())
    .bind(old.as_str())
    .bind(new.as_str())
    .bind(actor.map(|u| u.as_i32()))
    .bind(note)
    .execute(conn)
    .await?;

    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_workflow_update_is_guarded_by_effective_status() {
        let sql = workflow_update_sql();
        assert!(sql.contains(&format!("WHERE id = $1 AND {EFFECTIVE_STATUS} = $4")));
        assert!(sql.contains("RETURNING id, shopify_id"));
    }

    #[test]
    fn test_stale_update_maps_to_conflict_or_not_found() {
        assert!(matches!(stale_workflow_update(true), RepositoryError::Conflict(_)));
        assert!(matches!(stale_workflow_update(false), RepositoryError::NotFound));
    }
}
