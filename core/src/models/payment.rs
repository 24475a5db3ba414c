// orderflow/src/models/payment.rs

use crate::models::money::Currency;
use crate::payment::ProviderKind;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A transaction created with a provider for one order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentAttempt {
  pub order_id: Uuid,
  pub provider: ProviderKind,
  /// Provider-side id: payment intent, Razorpay order or Cashfree order.
  pub transaction_id: String,
  pub amount_minor: i64,
  pub currency: Currency,
  pub created_at: DateTime<Utc>,
}
