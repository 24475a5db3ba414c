// orderflow/src/store/memory.rs

use crate::error::{AppError, Result};
use crate::models::{Order, OrderItem, PaymentAttempt};
use crate::store::{OrderStore, OutboxStore, StatusUpdate};
use crate::sync::SyncEvent;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

#[derive(Default)]
struct Tables {
  orders: HashMap<Uuid, Order>,
  items: Vec<OrderItem>,
  attempts: Vec<PaymentAttempt>,
  // Insertion order is creation order.
  outbox: Vec<SyncEvent>,
}

/// Process-local store used when no database is configured, and in tests.
#[derive(Default)]
pub struct MemoryStore {
  tables: RwLock<Tables>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }

  fn with_items(tables: &Tables, order: &Order) -> Order {
    let mut full = order.clone();
    full.items = tables.items.iter().filter(|i| i.order_id == order.id).cloned().collect();
    full
  }

  fn sorted_newest_first(mut orders: Vec<Order>) -> Vec<Order> {
    orders.sort_by(|a, b| b.created_at.cmp(&a.created_at));
    orders
  }

  fn with_event<R>(&self, event_id: Uuid, f: impl FnOnce(&mut SyncEvent) -> R) -> Result<R> {
    let mut tables = self.tables.write();
    let event = tables
      .outbox
      .iter_mut()
      .find(|e| e.id == event_id)
      .ok_or_else(|| AppError::NotFound(format!("sync event {}", event_id)))?;
    Ok(f(event))
  }
}

#[async_trait]
impl OrderStore for MemoryStore {
  async fn insert_order(&self, order: &Order) -> Result<()> {
    let mut tables = self.tables.write();
    if tables.orders.contains_key(&order.id) {
      return Err(AppError::Internal(format!("order {} already exists", order.id)));
    }
    let mut stored = order.clone();
    stored.items.clear();
    tables.orders.insert(order.id, stored);
    Ok(())
  }

  async fn insert_items(&self, items: &[OrderItem]) -> Result<()> {
    let mut tables = self.tables.write();
    if let Some(orphan) = items.iter().find(|i| !tables.orders.contains_key(&i.order_id)) {
      return Err(AppError::Internal(format!("order {} does not exist", orphan.order_id)));
    }
    tables.items.extend_from_slice(items);
    Ok(())
  }

  async fn delete_order(&self, order_id: Uuid) -> Result<()> {
    let mut tables = self.tables.write();
    tables.orders.remove(&order_id);
    tables.items.retain(|i| i.order_id != order_id);
    tables.attempts.retain(|a| a.order_id != order_id);
    Ok(())
  }

  async fn get_order(&self, order_id: Uuid) -> Result<Option<Order>> {
    let tables = self.tables.read();
    Ok(tables.orders.get(&order_id).map(|o| Self::with_items(&tables, o)))
  }

  async fn list_orders_for_user(&self, user_id: &str) -> Result<Vec<Order>> {
    let tables = self.tables.read();
    let orders = tables
      .orders
      .values()
      .filter(|o| o.user_id == user_id)
      .map(|o| Self::with_items(&tables, o))
      .collect();
    Ok(Self::sorted_newest_first(orders))
  }

  async fn list_orders(&self) -> Result<Vec<Order>> {
    let tables = self.tables.read();
    let orders = tables.orders.values().map(|o| Self::with_items(&tables, o)).collect();
    Ok(Self::sorted_newest_first(orders))
  }

  async fn update_status(&self, update: &StatusUpdate) -> Result<bool> {
    let mut tables = self.tables.write();
    match tables.orders.get_mut(&update.order_id) {
      Some(order) if order.status == update.from => {
        order.status = update.to;
        order.updated_at = update.at;
        if update.tracking_number.is_some() {
          order.tracking_number = update.tracking_number.clone();
        }
        Ok(true)
      }
      _ => Ok(false),
    }
  }

  async fn record_payment_attempt(&self, attempt: &PaymentAttempt) -> Result<()> {
    self.tables.write().attempts.push(attempt.clone());
    Ok(())
  }

  async fn latest_payment_attempt(&self, order_id: Uuid) -> Result<Option<PaymentAttempt>> {
    let tables = self.tables.read();
    Ok(tables.attempts.iter().rev().find(|a| a.order_id == order_id).cloned())
  }
}

#[async_trait]
impl OutboxStore for MemoryStore {
  async fn enqueue(&self, event: &SyncEvent) -> Result<()> {
    self.tables.write().outbox.push(event.clone());
    Ok(())
  }

  async fn due_heads(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<SyncEvent>> {
    let tables = self.tables.read();
    let mut seen = HashSet::new();
    Ok(
      tables
        .outbox
        .iter()
        .filter(|e| e.is_pending())
        .filter(|e| seen.insert(e.order_id))
        .filter(|e| e.next_attempt_at <= now)
        .take(limit)
        .cloned()
        .collect(),
    )
  }

  async fn mark_delivered(&self, event_id: Uuid, at: DateTime<Utc>) -> Result<()> {
    self.with_event(event_id, |e| {
      e.attempts += 1;
      e.delivered_at = Some(at);
    })
  }

  async fn reschedule(
    &self,
    event_id: Uuid,
    attempts: u32,
    next_attempt_at: DateTime<Utc>,
    error: &str,
  ) -> Result<()> {
    self.with_event(event_id, |e| {
      e.attempts = attempts;
      e.next_attempt_at = next_attempt_at;
      e.last_error = Some(error.to_string());
    })
  }

  async fn mark_failed(&self, event_id: Uuid, attempts: u32, at: DateTime<Utc>, error: &str) -> Result<()> {
    self.with_event(event_id, |e| {
      e.attempts = attempts;
      e.failed_at = Some(at);
      e.last_error = Some(error.to_string());
    })
  }

  async fn has_undelivered(&self, order_id: Uuid) -> Result<bool> {
    let tables = self.tables.read();
    let newest = tables.outbox.iter().rev().find(|e| e.order_id == order_id);
    Ok(newest.is_some_and(|e| e.delivered_at.is_none()))
  }

  async fn events_for_order(&self, order_id: Uuid) -> Result<Vec<SyncEvent>> {
    Ok(
      self
        .tables
        .read()
        .outbox
        .iter()
        .filter(|e| e.order_id == order_id)
        .cloned()
        .collect(),
    )
  }
}
