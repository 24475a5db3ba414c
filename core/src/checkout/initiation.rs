// orderflow/src/checkout/initiation.rs

//! The `initiate_payment` workflow.

use crate::checkout::contexts::InitiationCtxData;
use crate::error::{AppError, Result};
use crate::models::{OrderStatus, PaymentAttempt};
use crate::payment::PaymentRequest;
use crate::workflow::{ContextData, StepControl, Workflow};
use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{info, instrument};

pub const WORKFLOW_NAME: &str = "initiate_payment";

pub fn build_workflow() -> Workflow<InitiationCtxData, AppError> {
  let mut wf = Workflow::<InitiationCtxData, AppError>::new(
    WORKFLOW_NAME,
    &[
      ("load_order", false, None),
      ("create_transaction", false, None),
      ("record_attempt", false, None),
    ],
  );
  wf.on("load_order", load_order);
  wf.after("load_order", validate_payment);
  wf.on("create_transaction", create_transaction);
  wf.on("record_attempt", record_attempt);
  wf
}

#[instrument(name = "initiate_payment::load_order", skip_all, err(Display))]
async fn load_order(ctx_data: ContextData<InitiationCtxData>) -> Result<StepControl> {
  let (store, order_id) = {
    let guard = ctx_data.read();
    (guard.deps.store.clone(), guard.request.order_id)
  };
  let order = store
    .get_order(order_id)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Order {} not found", order_id)))?;
  ctx_data.write().order = Some(order);
  Ok(StepControl::Continue)
}

async fn validate_payment(ctx_data: ContextData<InitiationCtxData>) -> Result<StepControl> {
  let guard = ctx_data.read();
  let request = &guard.request;
  let order = guard
    .order
    .as_ref()
    .ok_or_else(|| AppError::Internal("order not loaded".to_string()))?;

  if order.status != OrderStatus::Processing {
    return Err(AppError::Validation(format!(
      "Order {} is '{}'; only processing orders can be paid",
      order.order_number, order.status
    )));
  }
  if request.amount <= Decimal::ZERO {
    return Err(AppError::Validation("Payment amount must be greater than zero".to_string()));
  }
  if request.amount != order.total {
    return Err(AppError::Validation(format!(
      "Payment amount {} does not match the order total {}",
      request.amount, order.total
    )));
  }
  if request.customer_email.trim().is_empty() {
    return Err(AppError::Validation("A customer email is required".to_string()));
  }
  Ok(StepControl::Continue)
}

#[instrument(name = "initiate_payment::create_transaction", skip_all, err(Display))]
async fn create_transaction(ctx_data: ContextData<InitiationCtxData>) -> Result<StepControl> {
  let (deps, payment_request) = {
    let guard = ctx_data.read();
    let order = guard
      .order
      .as_ref()
      .ok_or_else(|| AppError::Internal("order not loaded".to_string()))?;
    let request = &guard.request;
    let description = request
      .description
      .clone()
      .filter(|d| !d.trim().is_empty())
      .unwrap_or_else(|| format!("Order {}", order.order_number));
    let payment_request = PaymentRequest {
      order_id: order.id,
      amount: order.total,
      currency: guard.deps.payments.currency(),
      description,
      customer_email: request.customer_email.trim().to_string(),
      customer_name: request.customer_name.clone(),
      customer_phone: request.customer_phone.clone(),
    };
    (guard.deps.clone(), payment_request)
  };

  let provider = deps.payments.provider()?;
  let handle = provider.create_transaction(&payment_request).await?;
  info!(
    provider = %handle.provider,
    transaction_id = %handle.transaction_id,
    amount_minor = handle.amount_minor,
    "Payment transaction created."
  );
  ctx_data.write().handle = Some(handle);
  Ok(StepControl::Continue)
}

async fn record_attempt(ctx_data: ContextData<InitiationCtxData>) -> Result<StepControl> {
  let (store, attempt) = {
    let guard = ctx_data.read();
    let handle = guard
      .handle
      .as_ref()
      .ok_or_else(|| AppError::Internal("no payment handle to record".to_string()))?;
    let attempt = PaymentAttempt {
      order_id: guard.request.order_id,
      provider: handle.provider,
      transaction_id: handle.transaction_id.clone(),
      amount_minor: handle.amount_minor,
      currency: handle.currency,
      created_at: Utc::now(),
    };
    (guard.deps.store.clone(), attempt)
  };
  store.record_payment_attempt(&attempt).await?;
  Ok(StepControl::Continue)
}
