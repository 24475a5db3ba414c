// orderflow/src/payment/cashfree.rs

use crate::error::{AppError, Result};
use crate::payment::{
  provider_error, resource_url, PaymentHandle, PaymentProvider, PaymentRequest, ProviderKind, ProviderTransaction,
  TransactionStatus,
};
use async_trait::async_trait;
use rust_decimal::prelude::ToPrimitive;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use tracing::{info, instrument};
use uuid::Uuid;

/// Cashfree Payment Gateway orders (PG API). Amounts travel in major units.
pub struct CashfreeProvider {
  http: reqwest::Client,
  api_base: String,
  api_version: String,
  client_id: String,
  client_secret: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CashfreeOrder {
  pub order_id: String,
  pub order_status: String,
  #[serde(default)]
  pub payment_session_id: Option<String>,
  #[serde(default)]
  pub order_tags: Option<HashMap<String, String>>,
}

impl CashfreeProvider {
  pub fn new(
    http: reqwest::Client,
    api_base: String,
    api_version: String,
    client_id: String,
    client_secret: String,
  ) -> Self {
    Self {
      http,
      api_base: api_base.trim_end_matches('/').to_string(),
      api_version,
      client_id,
      client_secret,
    }
  }

  fn request(&self, builder: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
    builder
      .header("x-client-id", &self.client_id)
      .header("x-client-secret", &self.client_secret)
      .header("x-api-version", &self.api_version)
  }

  /// Cashfree order ids must be unique per attempt, so each attempt gets its
  /// own and the storefront order travels in `order_tags`.
  pub(crate) fn order_body(request: &PaymentRequest, cf_order_id: &str) -> Result<Value> {
    let major = request.currency.round_major(request.amount);
    let order_amount = major
      .to_f64()
      .ok_or_else(|| AppError::Validation(format!("Amount {} cannot be sent to Cashfree", major)))?;
    let customer_phone = request
      .customer_phone
      .as_deref()
      .filter(|p| !p.trim().is_empty())
      .ok_or_else(|| AppError::Validation("Cashfree payments require a customer phone".to_string()))?;

    Ok(json!({
      "order_id": cf_order_id,
      "order_amount": order_amount,
      "order_currency": request.currency.code(),
      "order_note": request.description,
      "customer_details": {
        "customer_id": format!("cust_{}", request.order_id.simple()),
        "customer_email": request.customer_email,
        "customer_phone": customer_phone,
        "customer_name": request.customer_name.clone().unwrap_or_default(),
      },
      "order_tags": { "orderId": request.order_id.to_string() }
    }))
  }

  pub(crate) fn to_transaction(order: CashfreeOrder) -> ProviderTransaction {
    let status = match order.order_status.as_str() {
      "PAID" => TransactionStatus::Succeeded,
      "EXPIRED" | "TERMINATED" => TransactionStatus::Failed,
      _ => TransactionStatus::Pending,
    };
    ProviderTransaction {
      correlation_order_id: order.order_tags.and_then(|mut tags| tags.remove("orderId")),
      id: order.order_id,
      status,
      raw_status: order.order_status,
    }
  }
}

#[async_trait]
impl PaymentProvider for CashfreeProvider {
  fn kind(&self) -> ProviderKind {
    ProviderKind::Cashfree
  }

  #[instrument(name = "cashfree::create_transaction", skip(self, request), fields(order_id = %request.order_id), err(Display))]
  async fn create_transaction(&self, request: &PaymentRequest) -> Result<PaymentHandle> {
    let amount_minor = request.currency.to_minor_units(request.amount)?;
    let cf_order_id = format!("cf_{}", Uuid::new_v4().simple());
    let body = Self::order_body(request, &cf_order_id)?;

    let response = self
      .request(self.http.post(resource_url(self.kind(), &self.api_base, &["orders"])?))
      .json(&body)
      .send()
      .await?;
    if !response.status().is_success() {
      return Err(provider_error(self.kind(), response).await);
    }
    let order: CashfreeOrder = response.json().await?;
    info!(cashfree_order = %order.order_id, status = %order.order_status, "Cashfree order created.");

    let session = order
      .payment_session_id
      .ok_or_else(|| AppError::provider("cashfree", "order has no payment_session_id"))?;
    Ok(PaymentHandle {
      provider: ProviderKind::Cashfree,
      transaction_id: order.order_id,
      client_secret: Some(session),
      amount_minor,
      currency: request.currency,
      public_key: None,
    })
  }

  #[instrument(name = "cashfree::retrieve_transaction", skip(self), err(Display))]
  async fn retrieve_transaction(&self, transaction_id: &str) -> Result<ProviderTransaction> {
    let response = self
      .request(self.http.get(resource_url(self.kind(), &self.api_base, &["orders", transaction_id])?))
      .send()
      .await?;
    if !response.status().is_success() {
      return Err(provider_error(self.kind(), response).await);
    }
    let order: CashfreeOrder = response.json().await?;
    Ok(Self::to_transaction(order))
  }
}
