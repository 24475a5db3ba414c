// tests/common/mod.rs
#![allow(dead_code)] // Each test binary uses a different subset.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use orderflow::config::{CheckoutSettings, PaymentConfig};
use orderflow::models::{CartLine, Order, OrderItem, PaymentAttempt};
use orderflow::payment::{MockProvider, PaymentGateway, ProviderKind};
use orderflow::store::{MemoryStore, OrderStore, OutboxStore, StatusUpdate};
use orderflow::sync::{MemoryMirror, SyncEvent};
use orderflow::workflow::Handler;
use orderflow::{
  AppError, CheckoutDeps, CheckoutService, ContextData, CreateOrderRequest, StepControl, WorkflowError,
};
use rust_decimal::Decimal;
use std::str::FromStr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::Level;
use uuid::Uuid;

// --- Tracing ---
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

pub fn dec(s: &str) -> Decimal {
  Decimal::from_str(s).expect("test decimal")
}

// --- Engine test fixtures ---
#[derive(Clone, Debug, Default)]
pub struct TestContext {
  pub counter: i32,
  pub steps_executed: Vec<String>,
  pub compensated: Vec<String>,
}

#[derive(Debug, thiserror::Error)]
pub enum TestError {
  #[error("workflow: {0}")]
  Workflow(#[from] WorkflowError),

  #[error("handler failed: {0}")]
  Handler(String),
}

pub fn record_step(step_name: &'static str) -> Handler<TestContext, TestError> {
  Box::new(move |ctx: ContextData<TestContext>| {
    Box::pin(async move {
      let mut guard = ctx.write();
      guard.counter += 1;
      guard.steps_executed.push(step_name.to_string());
      Ok(StepControl::Continue)
    })
  })
}

pub fn failing_step(step_name: &'static str) -> Handler<TestContext, TestError> {
  Box::new(move |ctx: ContextData<TestContext>| {
    Box::pin(async move {
      ctx.write().steps_executed.push(step_name.to_string());
      Err(TestError::Handler(format!("{} failed", step_name)))
    })
  })
}

pub fn record_compensation(step_name: &'static str) -> Handler<TestContext, TestError> {
  Box::new(move |ctx: ContextData<TestContext>| {
    Box::pin(async move {
      ctx.write().compensated.push(step_name.to_string());
      Ok(StepControl::Continue)
    })
  })
}

// --- Checkout harness ---

/// A service wired to in-memory parts the test can reach into.
pub struct Harness {
  pub service: CheckoutService,
  pub store: Arc<FaultyStore>,
  pub mirror: Arc<MemoryMirror>,
  pub provider: Arc<MockProvider>,
}

pub fn harness() -> Harness {
  harness_with(CheckoutSettings::default())
}

pub fn harness_with(settings: CheckoutSettings) -> Harness {
  setup_tracing();
  let store = Arc::new(FaultyStore::default());
  let mirror = Arc::new(MemoryMirror::new());
  let provider = Arc::new(MockProvider::new());
  let payment_config = PaymentConfig {
    provider: ProviderKind::Mock,
    ..PaymentConfig::default()
  };

  let deps = CheckoutDeps {
    store: store.clone(),
    outbox: store.clone(),
    payments: PaymentGateway::with_provider(payment_config, provider.clone()),
    settings,
    relay_wake: Arc::new(Notify::new()),
  };
  let service = CheckoutService::new(deps, mirror.clone());
  Harness {
    service,
    store,
    mirror,
    provider,
  }
}

pub fn cart_line(id: &str, name: &str, price: &str, quantity: i32) -> CartLine {
  CartLine {
    id: id.to_string(),
    name: name.to_string(),
    price: dec(price),
    quantity,
  }
}

/// Two jars of salt at 10.00.
pub fn salt_order_request(user_id: &str) -> CreateOrderRequest {
  CreateOrderRequest {
    user_id: user_id.to_string(),
    total: None,
    items: vec![cart_line("salt", "Salt", "10.00", 2)],
    shipping_address: Some("1 Harbour Road".to_string()),
  }
}

// --- Fault injection ---

/// A `MemoryStore` whose item and outbox writes can be made to fail.
#[derive(Default)]
pub struct FaultyStore {
  pub inner: MemoryStore,
  pub fail_items: AtomicBool,
  pub fail_enqueue: AtomicBool,
}

impl FaultyStore {
  pub fn fail_items(&self, fail: bool) {
    self.fail_items.store(fail, Ordering::SeqCst);
  }

  pub fn fail_enqueue(&self, fail: bool) {
    self.fail_enqueue.store(fail, Ordering::SeqCst);
  }
}

#[async_trait]
impl OrderStore for FaultyStore {
  async fn insert_order(&self, order: &Order) -> orderflow::Result<()> {
    self.inner.insert_order(order).await
  }

  async fn insert_items(&self, items: &[OrderItem]) -> orderflow::Result<()> {
    if self.fail_items.load(Ordering::SeqCst) {
      return Err(AppError::Internal("injected item write failure".to_string()));
    }
    self.inner.insert_items(items).await
  }

  async fn delete_order(&self, order_id: Uuid) -> orderflow::Result<()> {
    self.inner.delete_order(order_id).await
  }

  async fn get_order(&self, order_id: Uuid) -> orderflow::Result<Option<Order>> {
    self.inner.get_order(order_id).await
  }

  async fn list_orders_for_user(&self, user_id: &str) -> orderflow::Result<Vec<Order>> {
    self.inner.list_orders_for_user(user_id).await
  }

  async fn list_orders(&self) -> orderflow::Result<Vec<Order>> {
    self.inner.list_orders().await
  }

  async fn update_status(&self, update: &StatusUpdate) -> orderflow::Result<bool> {
    self.inner.update_status(update).await
  }

  async fn record_payment_attempt(&self, attempt: &PaymentAttempt) -> orderflow::Result<()> {
    self.inner.record_payment_attempt(attempt).await
  }

  async fn latest_payment_attempt(&self, order_id: Uuid) -> orderflow::Result<Option<PaymentAttempt>> {
    self.inner.latest_payment_attempt(order_id).await
  }
}

#[async_trait]
impl OutboxStore for FaultyStore {
  async fn enqueue(&self, event: &SyncEvent) -> orderflow::Result<()> {
    if self.fail_enqueue.load(Ordering::SeqCst) {
      return Err(AppError::Internal("injected outbox failure".to_string()));
    }
    self.inner.enqueue(event).await
  }

  async fn due_heads(&self, now: DateTime<Utc>, limit: usize) -> orderflow::Result<Vec<SyncEvent>> {
    self.inner.due_heads(now, limit).await
  }

  async fn mark_delivered(&self, event_id: Uuid, at: DateTime<Utc>) -> orderflow::Result<()> {
    self.inner.mark_delivered(event_id, at).await
  }

  async fn reschedule(
    &self,
    event_id: Uuid,
    attempts: u32,
    next_attempt_at: DateTime<Utc>,
    error: &str,
  ) -> orderflow::Result<()> {
    self.inner.reschedule(event_id, attempts, next_attempt_at, error).await
  }

  async fn mark_failed(&self, event_id: Uuid, attempts: u32, at: DateTime<Utc>, error: &str) -> orderflow::Result<()> {
    self.inner.mark_failed(event_id, attempts, at, error).await
  }

  async fn has_undelivered(&self, order_id: Uuid) -> orderflow::Result<bool> {
    self.inner.has_undelivered(order_id).await
  }

  async fn events_for_order(&self, order_id: Uuid) -> orderflow::Result<Vec<SyncEvent>> {
    self.inner.events_for_order(order_id).await
  }
}
