// orderflow/src/payment/mock.rs

use crate::error::{AppError, Result};
use crate::payment::{
  PaymentHandle, PaymentProvider, PaymentRequest, ProviderKind, ProviderTransaction, TransactionStatus,
};
use async_trait::async_trait;
use parking_lot::RwLock;
use std::collections::HashMap;
use tracing::{info, instrument};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct MockPaymentIntent {
  pub id: String,
  pub amount_minor: i64,
  pub status: String, // "requires_action", "succeeded", "failed"
  pub order_id: String,
}

/// In-process provider for local development and tests. Transactions stay
/// `requires_action` until [`MockProvider::complete`] plays the customer's part.
#[derive(Default)]
pub struct MockProvider {
  intents: RwLock<HashMap<String, MockPaymentIntent>>,
}

impl MockProvider {
  pub fn new() -> Self {
    Self::default()
  }

  /// Simulates the customer completing the payment. Amounts whose minor units
  /// end in `123` are declined.
  pub fn complete(&self, transaction_id: &str) -> Result<TransactionStatus> {
    let mut intents = self.intents.write();
    let intent = intents
      .get_mut(transaction_id)
      .ok_or_else(|| AppError::NotFound(format!("mock transaction {}", transaction_id)))?;
    let status = if intent.amount_minor % 1000 == 123 {
      intent.status = "failed".to_string();
      TransactionStatus::Failed
    } else {
      intent.status = "succeeded".to_string();
      TransactionStatus::Succeeded
    };
    info!(transaction_id, status = %intent.status, "Mock payment completed.");
    Ok(status)
  }

  /// Rewrites the order id in a transaction's metadata.
  pub fn set_correlation(&self, transaction_id: &str, order_id: &str) {
    if let Some(intent) = self.intents.write().get_mut(transaction_id) {
      intent.order_id = order_id.to_string();
    }
  }

  pub fn intent(&self, transaction_id: &str) -> Option<MockPaymentIntent> {
    self.intents.read().get(transaction_id).cloned()
  }
}

#[async_trait]
impl PaymentProvider for MockProvider {
  fn kind(&self) -> ProviderKind {
    ProviderKind::Mock
  }

  #[instrument(name = "mock::create_transaction", skip(self, request), fields(order_id = %request.order_id))]
  async fn create_transaction(&self, request: &PaymentRequest) -> Result<PaymentHandle> {
    let amount_minor = request.currency.to_minor_units(request.amount)?;
    if amount_minor <= 0 {
      return Err(AppError::provider("mock", "Amount must be greater than zero"));
    }

    let intent_id = format!("mock_pi_{}", Uuid::new_v4().simple());
    let intent = MockPaymentIntent {
      id: intent_id.clone(),
      amount_minor,
      status: "requires_action".to_string(),
      order_id: request.order_id.to_string(),
    };
    self.intents.write().insert(intent_id.clone(), intent);
    info!(transaction_id = %intent_id, amount_minor, "Mock payment intent created.");

    Ok(PaymentHandle {
      provider: ProviderKind::Mock,
      client_secret: Some(format!("{}_secret_{}", intent_id, Uuid::new_v4().simple())),
      transaction_id: intent_id,
      amount_minor,
      currency: request.currency,
      public_key: None,
    })
  }

  async fn retrieve_transaction(&self, transaction_id: &str) -> Result<ProviderTransaction> {
    let intent = self
      .intent(transaction_id)
      .ok_or_else(|| AppError::provider("mock", format!("No such payment intent: {}", transaction_id)))?;
    let status = match intent.status.as_str() {
      "succeeded" => TransactionStatus::Succeeded,
      "failed" => TransactionStatus::Failed,
      _ => TransactionStatus::Pending,
    };
    Ok(ProviderTransaction {
      id: intent.id,
      status,
      correlation_order_id: Some(intent.order_id),
      raw_status: intent.status,
    })
  }
}
