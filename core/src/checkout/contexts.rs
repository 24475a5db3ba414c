// orderflow/src/checkout/contexts.rs

//! Context data for the checkout workflows, plus the request types they are
//! started from.

use crate::config::CheckoutSettings;
use crate::models::{CartLine, Order, PaymentAttempt};
use crate::payment::{PaymentGateway, PaymentHandle};
use crate::store::{OrderStore, OutboxStore};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::Notify;
use uuid::Uuid;

/// Shared dependencies every workflow step can reach.
pub struct CheckoutDeps {
  pub store: Arc<dyn OrderStore>,
  pub outbox: Arc<dyn OutboxStore>,
  pub payments: PaymentGateway,
  pub settings: CheckoutSettings,
  /// Woken after every enqueue so the relay does not wait for its next poll.
  pub relay_wake: Arc<Notify>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateOrderRequest {
  pub user_id: String,
  /// Total the storefront displayed; checked against the computed one.
  #[serde(default)]
  pub total: Option<Decimal>,
  pub items: Vec<CartLine>,
  #[serde(default)]
  pub shipping_address: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InitiatePaymentRequest {
  pub order_id: Uuid,
  pub amount: Decimal,
  #[serde(default)]
  pub description: Option<String>,
  pub customer_email: String,
  #[serde(default)]
  pub customer_name: Option<String>,
  #[serde(default)]
  pub customer_phone: Option<String>,
}

pub struct SubmissionCtxData {
  pub deps: Arc<CheckoutDeps>,
  pub request: CreateOrderRequest,
  pub subtotal: Decimal,
  pub total: Decimal,
  pub order: Option<Order>,
}

impl SubmissionCtxData {
  pub fn new(deps: Arc<CheckoutDeps>, request: CreateOrderRequest) -> Self {
    Self {
      deps,
      request,
      subtotal: Decimal::ZERO,
      total: Decimal::ZERO,
      order: None,
    }
  }
}

pub struct InitiationCtxData {
  pub deps: Arc<CheckoutDeps>,
  pub request: InitiatePaymentRequest,
  pub order: Option<Order>,
  pub handle: Option<PaymentHandle>,
}

impl InitiationCtxData {
  pub fn new(deps: Arc<CheckoutDeps>, request: InitiatePaymentRequest) -> Self {
    Self {
      deps,
      request,
      order: None,
      handle: None,
    }
  }
}

pub struct VerificationCtxData {
  pub deps: Arc<CheckoutDeps>,
  pub order_id: Uuid,
  pub transaction_id: String,
  pub signature: Option<String>,
  pub order: Option<Order>,
  pub attempt: Option<PaymentAttempt>,
  pub verified: bool,
}

impl VerificationCtxData {
  pub fn new(deps: Arc<CheckoutDeps>, transaction_id: String, order_id: Uuid, signature: Option<String>) -> Self {
    Self {
      deps,
      order_id,
      transaction_id,
      signature,
      order: None,
      attempt: None,
      verified: false,
    }
  }
}
