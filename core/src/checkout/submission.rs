// orderflow/src/checkout/submission.rs

//! The `submit_order` workflow: validate the cart, price it, write the order
//! and its items, then queue the ledger row. A failure after the order row is
//! written deletes it again.

use crate::checkout::contexts::SubmissionCtxData;
use crate::error::{AppError, Result};
use crate::models::{Order, OrderItem};
use crate::sync::{MirrorRow, SyncEvent, SyncEventKind};
use crate::workflow::{ContextData, StepControl, Workflow};
use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{info, instrument, warn};

pub const WORKFLOW_NAME: &str = "submit_order";

pub fn build_workflow() -> Workflow<SubmissionCtxData, AppError> {
  let mut wf = Workflow::<SubmissionCtxData, AppError>::new(
    WORKFLOW_NAME,
    &[
      ("validate_cart", false, None),
      ("price_order", false, None),
      ("persist_order", false, None),
      ("persist_items", false, None),
      ("enqueue_sync", false, None),
    ],
  );
  wf.on("validate_cart", validate_cart);
  wf.on("price_order", price_order);
  wf.on("persist_order", persist_order);
  wf.compensate("persist_order", delete_order);
  wf.on("persist_items", persist_items);
  wf.on("enqueue_sync", enqueue_sync);
  wf
}

#[instrument(name = "submit_order::validate_cart", skip_all, err(Display))]
async fn validate_cart(ctx_data: ContextData<SubmissionCtxData>) -> Result<StepControl> {
  let guard = ctx_data.read();
  let request = &guard.request;

  if request.user_id.trim().is_empty() {
    return Err(AppError::Validation("A user id is required".to_string()));
  }
  if request.items.is_empty() {
    return Err(AppError::Validation("The cart is empty".to_string()));
  }
  for (idx, line) in request.items.iter().enumerate() {
    if line.id.trim().is_empty() {
      return Err(AppError::Validation(format!("Item {} has no product id", idx)));
    }
    if line.name.trim().is_empty() {
      return Err(AppError::Validation(format!("Item '{}' has no name", line.id)));
    }
    if line.quantity < 1 {
      return Err(AppError::Validation(format!(
        "Item '{}' has quantity {}; it must be at least 1",
        line.id, line.quantity
      )));
    }
    if line.price.is_sign_negative() {
      return Err(AppError::Validation(format!("Item '{}' has a negative price", line.id)));
    }
  }
  Ok(StepControl::Continue)
}

#[instrument(name = "submit_order::price_order", skip_all, err(Display))]
async fn price_order(ctx_data: ContextData<SubmissionCtxData>) -> Result<StepControl> {
  let mut guard = ctx_data.write();
  let out_of_range = || AppError::Validation("Order total is out of range".to_string());
  let subtotal = guard
    .request
    .items
    .iter()
    .try_fold(Decimal::ZERO, |acc, line| acc.checked_add(line.line_total()?))
    .ok_or_else(out_of_range)?;
  let total = subtotal
    .checked_add(guard.deps.settings.shipping_surcharge)
    .ok_or_else(out_of_range)?;

  if let Some(claimed) = guard.request.total {
    if claimed != total {
      warn!(%claimed, computed = %total, "Submitted total does not match the cart.");
      return Err(AppError::Validation(format!(
        "Order total {} does not match the computed total {}",
        claimed, total
      )));
    }
  }
  if total <= Decimal::ZERO {
    return Err(AppError::Validation("Order total must be greater than zero".to_string()));
  }

  guard.subtotal = subtotal;
  guard.total = total;
  info!(%subtotal, %total, "Order priced.");
  Ok(StepControl::Continue)
}

#[instrument(name = "submit_order::persist_order", skip_all, err(Display))]
async fn persist_order(ctx_data: ContextData<SubmissionCtxData>) -> Result<StepControl> {
  let (store, order) = {
    let guard = ctx_data.read();
    let order = Order::new(
      guard.request.user_id.trim().to_string(),
      guard.total,
      guard.request.shipping_address.clone().filter(|a| !a.trim().is_empty()),
      Utc::now(),
    );
    (guard.deps.store.clone(), order)
  };

  store.insert_order(&order).await?;
  info!(order_id = %order.id, order_number = %order.order_number, "Order record created.");
  ctx_data.write().order = Some(order);
  Ok(StepControl::Continue)
}

async fn delete_order(ctx_data: ContextData<SubmissionCtxData>) -> Result<StepControl> {
  let (store, order_id) = {
    let guard = ctx_data.read();
    (guard.deps.store.clone(), guard.order.as_ref().map(|o| o.id))
  };
  if let Some(order_id) = order_id {
    store.delete_order(order_id).await?;
    warn!(%order_id, "Order record removed after a failed submission.");
    ctx_data.write().order = None;
  }
  Ok(StepControl::Continue)
}

#[instrument(name = "submit_order::persist_items", skip_all, err(Display))]
async fn persist_items(ctx_data: ContextData<SubmissionCtxData>) -> Result<StepControl> {
  let (store, items) = {
    let guard = ctx_data.read();
    let order_id = guard
      .order
      .as_ref()
      .map(|o| o.id)
      .ok_or_else(|| AppError::Internal("persist_items ran without an order".to_string()))?;
    let items: Vec<OrderItem> = guard
      .request
      .items
      .iter()
      .cloned()
      .map(|line| line.into_item(order_id))
      .collect();
    (guard.deps.store.clone(), items)
  };

  store.insert_items(&items).await?;
  if let Some(order) = ctx_data.write().order.as_mut() {
    order.items = items;
  }
  Ok(StepControl::Continue)
}

#[instrument(name = "submit_order::enqueue_sync", skip_all, err(Display))]
async fn enqueue_sync(ctx_data: ContextData<SubmissionCtxData>) -> Result<StepControl> {
  let (outbox, wake, sync_event) = {
    let guard = ctx_data.read();
    let order = guard
      .order
      .as_ref()
      .ok_or_else(|| AppError::Internal("enqueue_sync ran without an order".to_string()))?;
    let now = Utc::now();
    let sync_event = SyncEvent::new(SyncEventKind::OrderCreated, MirrorRow::from_order(order, now), now);
    (guard.deps.outbox.clone(), guard.deps.relay_wake.clone(), sync_event)
  };

  outbox.enqueue(&sync_event).await?;
  wake.notify_one();
  Ok(StepControl::Continue)
}
