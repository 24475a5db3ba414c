// orderflow/src/payment/razorpay.rs

use crate::error::Result;
use crate::payment::{
  provider_error, resource_url, signature, PaymentHandle, PaymentProvider, PaymentRequest, ProviderKind,
  ProviderTransaction, TransactionStatus, VerificationRequest,
};
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::{info, instrument, warn};

/// Razorpay Orders API. Payments are confirmed by checkout signature rather
/// than by polling.
pub struct RazorpayProvider {
  http: reqwest::Client,
  api_base: String,
  key_id: String,
  key_secret: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RazorpayOrder {
  pub id: String,
  pub amount: i64,
}

#[derive(Debug, Deserialize)]
pub(crate) struct RazorpayPayment {
  pub id: String,
  pub status: String,
  #[serde(default, deserialize_with = "notes_map")]
  pub notes: HashMap<String, String>,
}

// Razorpay sends `notes: []` when there are none.
fn notes_map<'de, D>(deserializer: D) -> std::result::Result<HashMap<String, String>, D::Error>
where
  D: serde::Deserializer<'de>,
{
  let value = Value::deserialize(deserializer)?;
  Ok(match value {
    Value::Object(map) => map
      .into_iter()
      .filter_map(|(k, v)| v.as_str().map(|s| (k, s.to_string())))
      .collect(),
    _ => HashMap::new(),
  })
}

impl RazorpayProvider {
  pub fn new(http: reqwest::Client, api_base: String, key_id: String, key_secret: String) -> Self {
    Self {
      http,
      api_base: api_base.trim_end_matches('/').to_string(),
      key_id,
      key_secret,
    }
  }

  pub(crate) fn order_body(request: &PaymentRequest, amount_minor: i64) -> Value {
    json!({
      "amount": amount_minor,
      "currency": request.currency.code(),
      "receipt": request.order_id.to_string(),
      "notes": {
        "orderId": request.order_id.to_string(),
        "description": request.description,
        "customerEmail": request.customer_email,
        "customerName": request.customer_name.clone().unwrap_or_default(),
      }
    })
  }

  pub(crate) fn to_transaction(payment: RazorpayPayment) -> ProviderTransaction {
    let status = match payment.status.as_str() {
      "captured" => TransactionStatus::Succeeded,
      "failed" | "refunded" => TransactionStatus::Failed,
      _ => TransactionStatus::Pending,
    };
    ProviderTransaction {
      correlation_order_id: payment.notes.get("orderId").cloned(),
      id: payment.id,
      status,
      raw_status: payment.status,
    }
  }
}

#[async_trait]
impl PaymentProvider for RazorpayProvider {
  fn kind(&self) -> ProviderKind {
    ProviderKind::Razorpay
  }

  #[instrument(name = "razorpay::create_transaction", skip(self, request), fields(order_id = %request.order_id), err(Display))]
  async fn create_transaction(&self, request: &PaymentRequest) -> Result<PaymentHandle> {
    let amount_minor = request.currency.to_minor_units(request.amount)?;
    let response = self
      .http
      .post(resource_url(self.kind(), &self.api_base, &["v1", "orders"])?)
      .basic_auth(&self.key_id, Some(&self.key_secret))
      .json(&Self::order_body(request, amount_minor))
      .send()
      .await?;
    if !response.status().is_success() {
      return Err(provider_error(self.kind(), response).await);
    }
    let order: RazorpayOrder = response.json().await?;
    info!(razorpay_order = %order.id, amount_minor = order.amount, "Razorpay order created.");

    Ok(PaymentHandle {
      provider: ProviderKind::Razorpay,
      transaction_id: order.id,
      client_secret: None,
      amount_minor: order.amount,
      currency: request.currency,
      public_key: Some(self.key_id.clone()),
    })
  }

  #[instrument(name = "razorpay::retrieve_transaction", skip(self), err(Display))]
  async fn retrieve_transaction(&self, transaction_id: &str) -> Result<ProviderTransaction> {
    let response = self
      .http
      .get(resource_url(self.kind(), &self.api_base, &["v1", "payments", transaction_id])?)
      .basic_auth(&self.key_id, Some(&self.key_secret))
      .send()
      .await?;
    if !response.status().is_success() {
      return Err(provider_error(self.kind(), response).await);
    }
    let payment: RazorpayPayment = response.json().await?;
    Ok(Self::to_transaction(payment))
  }

  async fn confirm(&self, request: &VerificationRequest<'_>) -> Result<bool> {
    let Some(sig) = request.signature else {
      warn!(order_id = %request.order_id, "Razorpay verification without a signature.");
      return Ok(false);
    };
    let valid = signature::verify(
      &self.key_secret,
      request.initiated_transaction_id,
      request.transaction_id,
      sig,
    );
    if !valid {
      warn!(order_id = %request.order_id, payment_id = %request.transaction_id, "Razorpay signature mismatch.");
    }
    Ok(valid)
  }
}
