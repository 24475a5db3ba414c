// orderflow/src/checkout/verification.rs

//! The `verify_payment` workflow. Any step may halt with `verified` already
//! decided; only a confirmed payment reaches `mark_paid`.

use crate::checkout::contexts::VerificationCtxData;
use crate::checkout::status::apply_status_change;
use crate::error::{AppError, Result};
use crate::models::{OrderStatus, StatusOrigin};
use crate::payment::VerificationRequest;
use crate::workflow::{ContextData, SkipCondition, StepControl, Workflow};
use std::sync::Arc;
use tracing::{info, instrument, warn};

pub const WORKFLOW_NAME: &str = "verify_payment";

pub fn build_workflow() -> Workflow<VerificationCtxData, AppError> {
  let unverified: SkipCondition<VerificationCtxData> =
    Arc::new(|ctx_data: ContextData<VerificationCtxData>| !ctx_data.read().verified);
  let mut wf = Workflow::<VerificationCtxData, AppError>::new(
    WORKFLOW_NAME,
    &[
      ("load_order", false, None),
      ("load_attempt", false, None),
      ("confirm_with_provider", false, None),
      ("mark_paid", false, Some(unverified)),
    ],
  );
  wf.on("load_order", load_order);
  wf.on("load_attempt", load_attempt);
  wf.on("confirm_with_provider", confirm_with_provider);
  wf.on("mark_paid", mark_paid);
  wf
}

#[instrument(name = "verify_payment::load_order", skip_all, err(Display))]
async fn load_order(ctx_data: ContextData<VerificationCtxData>) -> Result<StepControl> {
  let (store, order_id) = {
    let guard = ctx_data.read();
    (guard.deps.store.clone(), guard.order_id)
  };
  let order = store
    .get_order(order_id)
    .await?
    .ok_or_else(|| AppError::NotFound(format!("Order {} not found", order_id)))?;

  let status = order.status;
  let mut guard = ctx_data.write();
  guard.order = Some(order);
  match status {
    OrderStatus::Processing => Ok(StepControl::Continue),
    OrderStatus::Paid => {
      info!(%order_id, "Order is already paid.");
      guard.verified = true;
      Ok(StepControl::Halt)
    }
    other => {
      warn!(%order_id, status = %other, "Payment verification for an order that is not awaiting payment.");
      Ok(StepControl::Halt)
    }
  }
}

async fn load_attempt(ctx_data: ContextData<VerificationCtxData>) -> Result<StepControl> {
  let (deps, order_id) = {
    let guard = ctx_data.read();
    (guard.deps.clone(), guard.order_id)
  };
  let Some(attempt) = deps.store.latest_payment_attempt(order_id).await? else {
    warn!(%order_id, "No payment was initiated for this order.");
    return Ok(StepControl::Halt);
  };

  let configured = deps.payments.configured_kind();
  if attempt.provider != configured {
    warn!(
      %order_id,
      initiated_with = %attempt.provider,
      configured = %configured,
      "Payment was initiated with a different provider."
    );
    return Ok(StepControl::Halt);
  }
  ctx_data.write().attempt = Some(attempt);
  Ok(StepControl::Continue)
}

#[instrument(name = "verify_payment::confirm_with_provider", skip_all, err(Display))]
async fn confirm_with_provider(ctx_data: ContextData<VerificationCtxData>) -> Result<StepControl> {
  let (deps, order_id, transaction_id, signature, initiated) = {
    let guard = ctx_data.read();
    let attempt = guard
      .attempt
      .as_ref()
      .ok_or_else(|| AppError::Internal("payment attempt not loaded".to_string()))?;
    (
      guard.deps.clone(),
      guard.order_id,
      guard.transaction_id.clone(),
      guard.signature.clone(),
      attempt.transaction_id.clone(),
    )
  };

  let provider = deps.payments.provider()?;
  let verified = provider
    .confirm(&VerificationRequest {
      order_id,
      transaction_id: &transaction_id,
      initiated_transaction_id: &initiated,
      signature: signature.as_deref(),
    })
    .await?;

  info!(%order_id, %transaction_id, verified, "Provider confirmation finished.");
  ctx_data.write().verified = verified;
  Ok(if verified { StepControl::Continue } else { StepControl::Halt })
}

async fn mark_paid(ctx_data: ContextData<VerificationCtxData>) -> Result<StepControl> {
  let (deps, order_id) = {
    let guard = ctx_data.read();
    (guard.deps.clone(), guard.order_id)
  };
  let order = apply_status_change(&deps, order_id, OrderStatus::Paid, StatusOrigin::Payment, None).await?;
  ctx_data.write().order = Some(order);
  Ok(StepControl::Continue)
}
