// orderflow/src/checkout/status.rs

use crate::checkout::contexts::CheckoutDeps;
use crate::error::{AppError, Result};
use crate::models::{Order, OrderStatus, StatusOrigin};
use crate::store::StatusUpdate;
use crate::sync::{MirrorRow, SyncEvent, SyncEventKind};
use chrono::Utc;
use tracing::{error, info, instrument, warn};
use uuid::Uuid;

/// Applies a status change and queues its ledger row.
///
/// Setting the current status again is a successful no-op with no event.
/// A tracking number may only accompany `shipped`. If the event cannot be
/// queued the change is rolled back so the ledger never lags silently.
#[instrument(skip(deps, tracking_number), fields(order_id = %order_id, to = %to, origin = %origin), err(Display))]
pub(crate) async fn apply_status_change(
  deps: &CheckoutDeps,
  order_id: Uuid,
  to: OrderStatus,
  origin: StatusOrigin,
  tracking_number: Option<String>,
) -> Result<Order> {
  let tracking_number = tracking_number.map(|t| t.trim().to_string()).filter(|t| !t.is_empty());
  if tracking_number.is_some() && to != OrderStatus::Shipped {
    return Err(AppError::Validation(
      "A tracking number can only be set when shipping an order".to_string(),
    ));
  }

  let order = deps
    .store
    .get_order(order_id)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Order {} not found", order_id)))?;
  let from = order.status;

  if from == to {
    info!("Order already has the requested status; nothing to do.");
    return Ok(order);
  }
  if !from.can_transition(to, origin) {
    warn!(%from, "Rejected status transition.");
    return Err(AppError::InvalidTransition { from, to });
  }
  if origin == StatusOrigin::Override {
    warn!(%from, "Out-of-band status override.");
  }

  let now = Utc::now();
  let update = StatusUpdate {
    order_id,
    from,
    to,
    tracking_number,
    at: now,
  };
  if !deps.store.update_status(&update).await? {
    // Someone else moved the order first.
    let current = deps
      .store
      .get_order(order_id)
      .await?
      .ok_or_else(|| AppError::NotFound(format!("Order {} not found", order_id)))?;
    if current.status == to {
      return Ok(current);
    }
    return Err(AppError::InvalidTransition {
      from: current.status,
      to,
    });
  }

  let updated = deps
    .store
    .get_order(order_id)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Order {} not found", order_id)))?;

  let sync_event = SyncEvent::new(SyncEventKind::StatusChanged, MirrorRow::from_order(&updated, now), now);
  if let Err(e) = deps.outbox.enqueue(&sync_event).await {
    error!(error = %e, "Could not queue status change for the ledger; rolling back.");
    let revert = StatusUpdate {
      order_id,
      from: to,
      to: from,
      tracking_number: None,
      at: Utc::now(),
    };
    if let Err(revert_err) = deps.store.update_status(&revert).await {
      error!(error = %revert_err, "Rolling back the status change failed.");
    }
    return Err(e);
  }
  deps.relay_wake.notify_one();

  info!(%from, "Order status updated.");
  Ok(updated)
}
