// orderflow/src/payment/stripe.rs

use crate::error::{AppError, Result};
use crate::payment::{
  provider_error, resource_url, PaymentHandle, PaymentProvider, PaymentRequest, ProviderKind, ProviderTransaction,
  TransactionStatus,
};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use tracing::{info, instrument};

/// Stripe PaymentIntents over the form-encoded REST API.
pub struct StripeProvider {
  http: reqwest::Client,
  api_base: String,
  secret_key: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct PaymentIntent {
  pub id: String,
  pub status: String,
  #[serde(default)]
  pub client_secret: Option<String>,
  #[serde(default)]
  pub metadata: HashMap<String, String>,
}

impl StripeProvider {
  pub fn new(http: reqwest::Client, api_base: String, secret_key: String) -> Self {
    Self {
      http,
      api_base: api_base.trim_end_matches('/').to_string(),
      secret_key,
    }
  }

  pub(crate) fn intent_form(request: &PaymentRequest, amount_minor: i64) -> Vec<(String, String)> {
    let mut form = vec![
      ("amount".to_string(), amount_minor.to_string()),
      ("currency".to_string(), request.currency.lower_code()),
      ("description".to_string(), request.description.clone()),
      ("metadata[orderId]".to_string(), request.order_id.to_string()),
      ("receipt_email".to_string(), request.customer_email.clone()),
      ("automatic_payment_methods[enabled]".to_string(), "true".to_string()),
    ];
    if let Some(name) = &request.customer_name {
      form.push(("metadata[customerName]".to_string(), name.clone()));
    }
    form
  }

  pub(crate) fn to_transaction(intent: PaymentIntent) -> ProviderTransaction {
    let status = match intent.status.as_str() {
      "succeeded" => TransactionStatus::Succeeded,
      "canceled" => TransactionStatus::Failed,
      _ => TransactionStatus::Pending,
    };
    ProviderTransaction {
      correlation_order_id: intent.metadata.get("orderId").cloned(),
      id: intent.id,
      status,
      raw_status: intent.status,
    }
  }
}

#[async_trait]
impl PaymentProvider for StripeProvider {
  fn kind(&self) -> ProviderKind {
    ProviderKind::Stripe
  }

  #[instrument(name = "stripe::create_transaction", skip(self, request), fields(order_id = %request.order_id), err(Display))]
  async fn create_transaction(&self, request: &PaymentRequest) -> Result<PaymentHandle> {
    let amount_minor = request.currency.to_minor_units(request.amount)?;
    let response = self
      .http
      .post(resource_url(self.kind(), &self.api_base, &["v1", "payment_intents"])?)
      .bearer_auth(&self.secret_key)
      .form(&Self::intent_form(request, amount_minor))
      .send()
      .await?;
    if !response.status().is_success() {
      return Err(provider_error(self.kind(), response).await);
    }
    let intent: PaymentIntent = response.json().await?;
    info!(payment_intent = %intent.id, amount_minor, "Stripe payment intent created.");

    let client_secret = intent
      .client_secret
      .ok_or_else(|| AppError::provider("stripe", "payment intent has no client_secret"))?;
    Ok(PaymentHandle {
      provider: ProviderKind::Stripe,
      transaction_id: intent.id,
      client_secret: Some(client_secret),
      amount_minor,
      currency: request.currency,
      public_key: None,
    })
  }

  #[instrument(name = "stripe::retrieve_transaction", skip(self), err(Display))]
  async fn retrieve_transaction(&self, transaction_id: &str) -> Result<ProviderTransaction> {
    let response = self
      .http
      .get(resource_url(self.kind(), &self.api_base, &["v1", "payment_intents", transaction_id])?)
      .bearer_auth(&self.secret_key)
      .send()
      .await?;
    if !response.status().is_success() {
      return Err(provider_error(self.kind(), response).await);
    }
    let intent: PaymentIntent = response.json().await?;
    Ok(Self::to_transaction(intent))
  }
}
