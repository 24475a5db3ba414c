// tests/common/mod.rs
#![allow(dead_code)]

use once_cell::sync::Lazy;
use orderflow::payment::{MockProvider, PaymentGateway};
use orderflow::store::MemoryStore;
use orderflow::sync::MemoryMirror;
use orderflow::{AppConfig, CheckoutDeps, CheckoutService};
use orderflow_server::AppState;
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::Level;

static TRACING_INIT: Lazy<()> = Lazy::new(|| {
  tracing_subscriber::fmt()
    .with_max_level(Level::DEBUG)
    .with_test_writer()
    .try_init()
    .ok();
});

pub fn setup_tracing() {
  Lazy::force(&TRACING_INIT);
}

pub struct TestApp {
  pub state: AppState,
  pub provider: Arc<MockProvider>,
  pub mirror: Arc<MemoryMirror>,
}

/// App state backed by memory, paying through the mock provider.
pub fn test_app() -> TestApp {
  setup_tracing();
  let config = AppConfig::from_lookup(|key| match key {
    "PAYMENT_PROVIDER" => Some("mock".to_string()),
    _ => None,
  })
  .expect("test configuration");

  let store = Arc::new(MemoryStore::new());
  let mirror = Arc::new(MemoryMirror::new());
  let provider = Arc::new(MockProvider::new());
  let deps = CheckoutDeps {
    store: store.clone(),
    outbox: store,
    payments: PaymentGateway::with_provider(config.payment.clone(), provider.clone()),
    settings: config.checkout.clone(),
    relay_wake: Arc::new(Notify::new()),
  };
  let checkout = Arc::new(CheckoutService::new(deps, mirror.clone()));

  TestApp {
    state: AppState {
      checkout,
      config: Arc::new(config),
    },
    provider,
    mirror,
  }
}
