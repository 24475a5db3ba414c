// orderflow/src/store/mod.rs

//! Persistence seams. Orders and their outbox live behind these traits so the
//! checkout service runs the same against PostgreSQL and in memory.

pub mod memory;
pub mod postgres;

use crate::error::Result;
use crate::models::{Order, OrderItem, OrderStatus, PaymentAttempt};
use crate::sync::SyncEvent;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// A compare-and-set status change.
#[derive(Debug, Clone)]
pub struct StatusUpdate {
  pub order_id: Uuid,
  pub from: OrderStatus,
  pub to: OrderStatus,
  /// Replaces the stored tracking number when set.
  pub tracking_number: Option<String>,
  pub at: DateTime<Utc>,
}

#[async_trait]
pub trait OrderStore: Send + Sync {
  /// Inserts the order row only; items are written separately.
  async fn insert_order(&self, order: &Order) -> Result<()>;

  async fn insert_items(&self, items: &[OrderItem]) -> Result<()>;

  /// Removes an order together with its items and payment attempts.
  async fn delete_order(&self, order_id: Uuid) -> Result<()>;

  /// The order with its items.
  async fn get_order(&self, order_id: Uuid) -> Result<Option<Order>>;

  /// Newest first.
  async fn list_orders_for_user(&self, user_id: &str) -> Result<Vec<Order>>;

  /// Newest first.
  async fn list_orders(&self) -> Result<Vec<Order>>;

  /// Applies the update only if the order is still in `update.from`.
  /// Returns whether a row changed.
  async fn update_status(&self, update: &StatusUpdate) -> Result<bool>;

  async fn record_payment_attempt(&self, attempt: &PaymentAttempt) -> Result<()>;

  async fn latest_payment_attempt(&self, order_id: Uuid) -> Result<Option<PaymentAttempt>>;
}

#[async_trait]
pub trait OutboxStore: Send + Sync {
  async fn enqueue(&self, event: &SyncEvent) -> Result<()>;

  /// For each order, its oldest pending event if that event is due at `now`.
  /// Ordered by creation.
  async fn due_heads(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<SyncEvent>>;

  async fn mark_delivered(&self, event_id: Uuid, at: DateTime<Utc>) -> Result<()>;

  async fn reschedule(&self, event_id: Uuid, attempts: u32, next_attempt_at: DateTime<Utc>, error: &str)
    -> Result<()>;

  async fn mark_failed(&self, event_id: Uuid, attempts: u32, at: DateTime<Utc>, error: &str) -> Result<()>;

  /// Whether the order's newest event has not reached the ledger, either
  /// still queued or dead-lettered. While it has not, the ledger's row for
  /// the order is stale.
  async fn has_undelivered(&self, order_id: Uuid) -> Result<bool>;

  /// All events of an order, oldest first.
  async fn events_for_order(&self, order_id: Uuid) -> Result<Vec<SyncEvent>>;
}
