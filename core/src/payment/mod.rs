// orderflow/src/payment/mod.rs

//! Payment providers behind one trait, plus the lazily built gateway the
//! checkout service talks to.

pub mod cashfree;
pub mod mock;
pub mod razorpay;
pub mod signature;
pub mod stripe;

use crate::config::PaymentConfig;
use crate::error::{AppError, Result};
use crate::models::Currency;
use async_trait::async_trait;
use once_cell::sync::OnceCell;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;
use tracing::{event, Level};
use uuid::Uuid;

pub use cashfree::CashfreeProvider;
pub use mock::MockProvider;
pub use razorpay::RazorpayProvider;
pub use stripe::StripeProvider;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProviderKind {
  Stripe,
  Razorpay,
  Cashfree,
  Mock,
}

impl ProviderKind {
  pub fn as_str(self) -> &'static str {
    match self {
      ProviderKind::Stripe => "stripe",
      ProviderKind::Razorpay => "razorpay",
      ProviderKind::Cashfree => "cashfree",
      ProviderKind::Mock => "mock",
    }
  }
}

impl fmt::Display for ProviderKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for ProviderKind {
  type Err = AppError;

  fn from_str(s: &str) -> Result<Self> {
    match s.trim().to_ascii_lowercase().as_str() {
      "stripe" => Ok(ProviderKind::Stripe),
      "razorpay" => Ok(ProviderKind::Razorpay),
      "cashfree" => Ok(ProviderKind::Cashfree),
      "mock" => Ok(ProviderKind::Mock),
      other => Err(AppError::Config(format!("Payment provider '{}' not supported", other))),
    }
  }
}

/// What a provider needs to open a transaction for an order.
#[derive(Debug, Clone)]
pub struct PaymentRequest {
  pub order_id: Uuid,
  /// Major units, e.g. `25.99`.
  pub amount: Decimal,
  pub currency: Currency,
  pub description: String,
  pub customer_email: String,
  pub customer_name: Option<String>,
  /// Required by Cashfree only.
  pub customer_phone: Option<String>,
}

/// Returned to the storefront so it can finish the payment client-side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PaymentHandle {
  pub provider: ProviderKind,
  pub transaction_id: String,
  #[serde(skip_serializing_if = "Option::is_none")]
  pub client_secret: Option<String>,
  pub amount_minor: i64,
  pub currency: Currency,
  /// Publishable key for the checkout widget (Razorpay key id).
  #[serde(skip_serializing_if = "Option::is_none")]
  pub public_key: Option<String>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransactionStatus {
  Succeeded,
  Pending,
  Failed,
}

/// A transaction as the provider reports it.
#[derive(Debug, Clone, PartialEq)]
pub struct ProviderTransaction {
  pub id: String,
  pub status: TransactionStatus,
  /// Order id found in the transaction's metadata, if any.
  pub correlation_order_id: Option<String>,
  /// Provider's raw status string, for logs.
  pub raw_status: String,
}

/// Everything a provider may need to decide whether a payment went through.
#[derive(Debug, Clone)]
pub struct VerificationRequest<'a> {
  pub order_id: Uuid,
  /// Id the client reports, e.g. the payment intent or Razorpay payment id.
  pub transaction_id: &'a str,
  /// Id recorded when the payment was initiated.
  pub initiated_transaction_id: &'a str,
  pub signature: Option<&'a str>,
}

#[async_trait]
pub trait PaymentProvider: Send + Sync {
  fn kind(&self) -> ProviderKind;

  async fn create_transaction(&self, request: &PaymentRequest) -> Result<PaymentHandle>;

  async fn retrieve_transaction(&self, transaction_id: &str) -> Result<ProviderTransaction>;

  /// Retrieves the transaction and accepts it only if it succeeded and is
  /// correlated to the expected order. Signature-based providers override this.
  async fn confirm(&self, request: &VerificationRequest<'_>) -> Result<bool> {
    let txn = self.retrieve_transaction(request.transaction_id).await?;
    let expected = request.order_id.to_string();
    let correlated = txn.correlation_order_id.as_deref() == Some(expected.as_str());
    if !correlated {
      event!(
        Level::WARN,
        provider = %self.kind(),
        transaction_id = %txn.id,
        expected_order = %expected,
        found_order = ?txn.correlation_order_id,
        "Transaction is not correlated to the expected order."
      );
    }
    Ok(txn.status == TransactionStatus::Succeeded && correlated)
  }
}

/// Holds the payment configuration and builds the selected provider on first
/// use. Missing credentials surface as `AppError::Config` at that point.
pub struct PaymentGateway {
  config: PaymentConfig,
  http: reqwest::Client,
  provider: OnceCell<Arc<dyn PaymentProvider>>,
}

impl PaymentGateway {
  pub fn new(config: PaymentConfig, http: reqwest::Client) -> Self {
    Self {
      config,
      http,
      provider: OnceCell::new(),
    }
  }

  /// A gateway around an already built provider.
  pub fn with_provider(config: PaymentConfig, provider: Arc<dyn PaymentProvider>) -> Self {
    let cell = OnceCell::new();
    let _ = cell.set(provider);
    Self {
      config,
      http: reqwest::Client::new(),
      provider: cell,
    }
  }

  pub fn configured_kind(&self) -> ProviderKind {
    self.config.provider
  }

  pub fn currency(&self) -> Currency {
    self.config.currency
  }

  pub fn provider(&self) -> Result<Arc<dyn PaymentProvider>> {
    self
      .provider
      .get_or_try_init(|| self.build_provider())
      .map(Arc::clone)
  }

  fn build_provider(&self) -> Result<Arc<dyn PaymentProvider>> {
    let cfg = &self.config;
    event!(Level::INFO, provider = %cfg.provider, "Building payment provider.");
    let provider: Arc<dyn PaymentProvider> = match cfg.provider {
      ProviderKind::Stripe => {
        let secret = required(&cfg.stripe_secret_key, "STRIPE_SECRET_KEY")?;
        Arc::new(StripeProvider::new(self.http.clone(), cfg.stripe_api_base.clone(), secret))
      }
      ProviderKind::Razorpay => {
        let key_id = required(&cfg.razorpay_key_id, "RAZORPAY_KEY_ID")?;
        let key_secret = required(&cfg.razorpay_key_secret, "RAZORPAY_KEY_SECRET")?;
        Arc::new(RazorpayProvider::new(
          self.http.clone(),
          cfg.razorpay_api_base.clone(),
          key_id,
          key_secret,
        ))
      }
      ProviderKind::Cashfree => {
        let client_id = required(&cfg.cashfree_client_id, "CASHFREE_CLIENT_ID")?;
        let client_secret = required(&cfg.cashfree_client_secret, "CASHFREE_CLIENT_SECRET")?;
        Arc::new(CashfreeProvider::new(
          self.http.clone(),
          cfg.cashfree_api_base.clone(),
          cfg.cashfree_api_version.clone(),
          client_id,
          client_secret,
        ))
      }
      ProviderKind::Mock => Arc::new(MockProvider::new()),
    };
    Ok(provider)
  }
}

fn required(value: &Option<String>, var_name: &str) -> Result<String> {
  match value.as_deref().map(str::trim) {
    Some(v) if !v.is_empty() => Ok(v.to_string()),
    _ => Err(AppError::Config(format!("{} is not configured", var_name))),
  }
}

/// `api_base` with `segments` appended, each percent-encoded as exactly one
/// path segment. Transaction ids come from clients and may contain `/` or `?`.
pub(crate) fn resource_url(provider: ProviderKind, api_base: &str, segments: &[&str]) -> Result<reqwest::Url> {
  let mut url = reqwest::Url::parse(api_base)
    .map_err(|e| AppError::Config(format!("Invalid {} API base '{}': {}", provider, api_base, e)))?;
  url
    .path_segments_mut()
    .map_err(|_| AppError::Config(format!("{} API base '{}' cannot take a path", provider, api_base)))?
    .pop_if_empty()
    .extend(segments);
  Ok(url)
}

/// Reads an error body from a non-2xx provider response.
pub(crate) async fn provider_error(provider: ProviderKind, response: reqwest::Response) -> AppError {
  let status = response.status();
  let body = response.text().await.unwrap_or_default();
  event!(Level::ERROR, %provider, %status, body = %body, "Payment provider returned an error.");
  AppError::provider(provider.as_str(), format!("{} {}", status, body))
}
