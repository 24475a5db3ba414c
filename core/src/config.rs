// orderflow/src/config.rs

use crate::error::{AppError, Result};
use crate::models::Currency;
use crate::payment::ProviderKind;
use dotenvy::dotenv;
use rust_decimal::Decimal;
use std::env;
use std::fmt;
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_SHIPPING_SURCHARGE: &str = "5.99";

#[derive(Clone)]
pub struct PaymentConfig {
  pub provider: ProviderKind,
  pub currency: Currency,
  pub stripe_secret_key: Option<String>,
  pub stripe_api_base: String,
  pub razorpay_key_id: Option<String>,
  pub razorpay_key_secret: Option<String>,
  pub razorpay_api_base: String,
  pub cashfree_client_id: Option<String>,
  pub cashfree_client_secret: Option<String>,
  pub cashfree_api_base: String,
  pub cashfree_api_version: String,
}

impl Default for PaymentConfig {
  fn default() -> Self {
    Self {
      provider: ProviderKind::Stripe,
      currency: Currency::Usd,
      stripe_secret_key: None,
      stripe_api_base: "https://api.stripe.com".to_string(),
      razorpay_key_id: None,
      razorpay_key_secret: None,
      razorpay_api_base: "https://api.razorpay.com".to_string(),
      cashfree_client_id: None,
      cashfree_client_secret: None,
      cashfree_api_base: "https://api.cashfree.com/pg".to_string(),
      cashfree_api_version: "2023-08-01".to_string(),
    }
  }
}

// Secrets never reach the logs.
impl fmt::Debug for PaymentConfig {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    let redact = |v: &Option<String>| if v.is_some() { "[REDACTED]" } else { "<unset>" };
    f.debug_struct("PaymentConfig")
      .field("provider", &self.provider)
      .field("currency", &self.currency)
      .field("stripe_secret_key", &redact(&self.stripe_secret_key))
      .field("stripe_api_base", &self.stripe_api_base)
      .field("razorpay_key_id", &self.razorpay_key_id)
      .field("razorpay_key_secret", &redact(&self.razorpay_key_secret))
      .field("razorpay_api_base", &self.razorpay_api_base)
      .field("cashfree_client_id", &self.cashfree_client_id)
      .field("cashfree_client_secret", &redact(&self.cashfree_client_secret))
      .field("cashfree_api_base", &self.cashfree_api_base)
      .field("cashfree_api_version", &self.cashfree_api_version)
      .finish()
  }
}

#[derive(Clone)]
pub struct MirrorConfig {
  pub api_key: Option<String>,
  pub sheet_id: Option<String>,
  pub api_base: String,
}

impl MirrorConfig {
  /// Both the key and the sheet id are set.
  pub fn is_configured(&self) -> bool {
    self.api_key.is_some() && self.sheet_id.is_some()
  }
}

impl Default for MirrorConfig {
  fn default() -> Self {
    Self {
      api_key: None,
      sheet_id: None,
      api_base: "https://sheets.googleapis.com".to_string(),
    }
  }
}

impl fmt::Debug for MirrorConfig {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("MirrorConfig")
      .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
      .field("sheet_id", &self.sheet_id)
      .field("api_base", &self.api_base)
      .finish()
  }
}

#[derive(Debug, Clone)]
pub struct CheckoutSettings {
  /// Flat amount added to every order's subtotal.
  pub shipping_surcharge: Decimal,
}

impl Default for CheckoutSettings {
  fn default() -> Self {
    Self {
      shipping_surcharge: Decimal::new(599, 2),
    }
  }
}

#[derive(Debug, Clone)]
pub struct OutboxConfig {
  pub poll_interval: Duration,
  pub base_backoff: Duration,
  pub max_backoff: Duration,
  pub max_attempts: u32,
}

impl Default for OutboxConfig {
  fn default() -> Self {
    Self {
      poll_interval: Duration::from_millis(2_000),
      base_backoff: Duration::from_millis(1_000),
      max_backoff: Duration::from_millis(300_000),
      max_attempts: 8,
    }
  }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
  pub server_host: String,
  pub server_port: u16,
  /// `None` selects the in-memory store.
  pub database_url: Option<String>,
  pub payment: PaymentConfig,
  pub mirror: MirrorConfig,
  pub checkout: CheckoutSettings,
  pub outbox: OutboxConfig,
}

impl AppConfig {
  pub fn from_env() -> Result<Self> {
    dotenv().ok(); // Load .env file if present
    let config = Self::from_lookup(|var_name| env::var(var_name).ok())?;
    tracing::info!(
      provider = %config.payment.provider,
      currency = %config.payment.currency,
      persistent_store = config.database_url.is_some(),
      sheets_mirror = config.mirror.is_configured(),
      "Application configuration loaded successfully."
    );
    Ok(config)
  }

  /// Builds the configuration from any variable source. Empty values count
  /// as unset.
  pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
    let get_env = |var_name: &str| lookup(var_name).filter(|v| !v.trim().is_empty());
    let env_or = |var_name: &str, default: &str| get_env(var_name).unwrap_or_else(|| default.to_string());

    let server_host = env_or("SERVER_HOST", "127.0.0.1");
    let server_port = env_or("SERVER_PORT", "8080")
      .parse::<u16>()
      .map_err(|e| AppError::Config(format!("Invalid SERVER_PORT: {}", e)))?;

    let payment_defaults = PaymentConfig::default();
    let payment = PaymentConfig {
      provider: env_or("PAYMENT_PROVIDER", "stripe").parse::<ProviderKind>()?,
      currency: env_or("PAYMENT_CURRENCY", "USD").parse::<Currency>()?,
      stripe_secret_key: get_env("STRIPE_SECRET_KEY"),
      stripe_api_base: get_env("STRIPE_API_BASE").unwrap_or(payment_defaults.stripe_api_base),
      razorpay_key_id: get_env("RAZORPAY_KEY_ID"),
      razorpay_key_secret: get_env("RAZORPAY_KEY_SECRET"),
      razorpay_api_base: get_env("RAZORPAY_API_BASE").unwrap_or(payment_defaults.razorpay_api_base),
      cashfree_client_id: get_env("CASHFREE_CLIENT_ID"),
      cashfree_client_secret: get_env("CASHFREE_CLIENT_SECRET"),
      cashfree_api_base: get_env("CASHFREE_API_BASE").unwrap_or(payment_defaults.cashfree_api_base),
      cashfree_api_version: get_env("CASHFREE_API_VERSION").unwrap_or(payment_defaults.cashfree_api_version),
    };

    let mirror = MirrorConfig {
      api_key: get_env("GOOGLE_SHEETS_API_KEY"),
      sheet_id: get_env("GOOGLE_SHEETS_ORDERS_SHEET_ID"),
      api_base: get_env("SHEETS_API_BASE").unwrap_or_else(|| MirrorConfig::default().api_base),
    };

    let shipping_surcharge = Decimal::from_str(env_or("SHIPPING_SURCHARGE", DEFAULT_SHIPPING_SURCHARGE).trim())
      .map_err(|e| AppError::Config(format!("Invalid SHIPPING_SURCHARGE: {}", e)))?;
    if shipping_surcharge.is_sign_negative() {
      return Err(AppError::Config("SHIPPING_SURCHARGE must not be negative".to_string()));
    }

    let millis = |var_name: &str, default: u64| -> Result<Duration> {
      match get_env(var_name) {
        Some(raw) => raw
          .trim()
          .parse::<u64>()
          .map(Duration::from_millis)
          .map_err(|e| AppError::Config(format!("Invalid {}: {}", var_name, e))),
        None => Ok(Duration::from_millis(default)),
      }
    };
    let outbox = OutboxConfig {
      poll_interval: millis("OUTBOX_POLL_INTERVAL_MS", 2_000)?,
      base_backoff: millis("OUTBOX_BASE_BACKOFF_MS", 1_000)?,
      max_backoff: millis("OUTBOX_MAX_BACKOFF_MS", 300_000)?,
      max_attempts: env_or("OUTBOX_MAX_ATTEMPTS", "8")
        .trim()
        .parse::<u32>()
        .map_err(|e| AppError::Config(format!("Invalid OUTBOX_MAX_ATTEMPTS: {}", e)))?,
    };
    if outbox.max_attempts == 0 {
      return Err(AppError::Config("OUTBOX_MAX_ATTEMPTS must be at least 1".to_string()));
    }

    Ok(Self {
      server_host,
      server_port,
      database_url: get_env("DATABASE_URL"),
      payment,
      mirror,
      checkout: CheckoutSettings { shipping_surcharge },
      outbox,
    })
  }
}
