//! Packing station: the ready-to-pack queue and pack/hold/release actions.

use axum::{
    Json, Router,
    extract::{Path, Query, State},
    routing::{get, post},
};
use chrono::Utc;
use serde::{Deserialize, Serialize};
use tracing::instrument;

use lumen_core::OrderId;
use lumen_core::orders::{PackingAction, TransitionError};
use lumen_core::pagination::clamp_limit;

use crate::db::OrderRepository;
use crate::error::AppError;
use crate::middleware::CurrentUser;
use crate::models::{OrderDetail, OrderView, WorkflowChange};
use crate::state::AppState;

use super::orders::order_not_found;

const DEFAULT_QUEUE_SIZE: i64 = 50;
const MAX_QUEUE_SIZE: i64 = 250;

/// Build the packing router.
pub fn router() -> Router<AppState> {
    Router::new()
        .route("/api/packing/queue", get(queue))
        .route("/api/packing/{id}/pack", post(pack))
        .route("/api/packing/{id}/hold", post(hold))
        .route("/api/packing/{id}/release", post(release))
}

#[derive(Debug, Deserialize)]
pub struct QueueParams {
    pub limit: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct PackingQueue {
    pub orders: Vec<OrderView>,
    pub count: usize,
}

/// Orders waiting to be packed, oldest first.
#[instrument(skip(_user, state))]
async fn queue(
    CurrentUser(_user): CurrentUser,
    State(state): State<AppState>,
    Query(params): Query<QueueParams>,
) -> Result<Json<PackingQueue>, AppError> {
    let limit = clamp_limit(params.limit, DEFAULT_QUEUE_SIZE, MAX_QUEUE_SIZE);
    let orders = OrderRepository::new(state.pool()).packing_queue(limit).await?;

    let now = Utc::now();
    let orders: Vec<_> = orders.iter().map(|o| OrderView::new(o, now)).collect();
    Ok(Json(PackingQueue {
        count: orders.len(),
        orders,
    }))
}

async fn pack(
    user: CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<OrderDetail>, AppError> {
    apply(&state, &user, OrderId::new(id), PackingAction::Pack).await
}

async fn hold(
    user: CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<OrderDetail>, AppError> {
    apply(&state, &user, OrderId::new(id), PackingAction::Hold).await
}

async fn release(
    user: CurrentUser,
    State(state): State<AppState>,
    Path(id): Path<i32>,
) -> Result<Json<OrderDetail>, AppError> {
    apply(&state, &user, OrderId::new(id), PackingAction::Release).await
}

/// Run a packing action against the order's effective status.
///
/// # Errors
///
/// 404 for an unknown order, 409 when the action does not apply or the
/// order changed status while the action was in flight.
#[instrument(skip(state, user), fields(user_id = %user.0.id))]
async fn apply(
    state: &AppState,
    user: &CurrentUser,
    id: OrderId,
    action: PackingAction,
) -> Result<Json<OrderDetail>, AppError> {
    let repo = OrderRepository::new(state.pool());
    let order = repo.get(id).await?.ok_or_else(order_not_found)?;

    let current = order.status();
    let next = current.apply(action).map_err(transition_conflict)?;
    let change = WorkflowChange {
        expected: current,
        status: next,
        actor: user.0.id,
        note: None,
    };
    let order = repo.set_workflow_status(id, &change).await?;

    tracing::info!(order_id = %id, ?action, status = %next, "Packing action applied");
    Ok(Json(OrderDetail::new(order, Utc::now())))
}

fn transition_conflict(err: TransitionError) -> AppError {
    let verb = match err.action {
        PackingAction::Pack => "packed",
        PackingAction::Hold => "put on hold",
        PackingAction::Release => "released",
    };
    AppError::Conflict(format!(
        "Order cannot be {verb} while {}",
        err.from.display().label
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use lumen_core::OrderStatus;

    use super::*;

    #[test]
    fn test_transition_conflict_message() {
        let err = OrderStatus::Shipped
            .apply(PackingAction::Pack)
            .map_err(transition_conflict)
            .unwrap_err();
        assert_eq!(err.to_string(), "Order cannot be packed while Shipped");
        assert!(matches!(err, AppError::Conflict(_)));
    }

    #[test]
    fn test_release_requires_hold() {
        let err = transition_conflict(TransitionError {
            from: OrderStatus::ReadyToPack,
            action: PackingAction::Release,
        });
        assert_eq!(err.to_string(), "Order cannot be released while Ready to Pack");
    }
}
