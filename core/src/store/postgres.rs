// orderflow/src/store/postgres.rs

use crate::error::{AppError, Result};
use crate::models::{Order, OrderItem, OrderStatus, PaymentAttempt};
use crate::store::{OrderStore, OutboxStore, StatusUpdate};
use crate::sync::{MirrorRow, SyncEvent};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::postgres::PgPoolOptions;
use sqlx::types::Json;
use sqlx::{FromRow, PgPool};
use std::collections::HashMap;
use tracing::{event, instrument, Level};
use uuid::Uuid;

const ORDER_COLUMNS: &str =
  "id, order_number, user_id, total, status, shipping_address, tracking_number, created_at, updated_at";

const EVENT_COLUMNS: &str =
  "id, order_id, kind, row_data, attempts, last_error, created_at, next_attempt_at, delivered_at, failed_at";

#[derive(Debug, FromRow)]
struct OrderRow {
  id: Uuid,
  order_number: String,
  user_id: String,
  total: Decimal,
  status: String,
  shipping_address: Option<String>,
  tracking_number: Option<String>,
  created_at: DateTime<Utc>,
  updated_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct ItemRow {
  order_id: Uuid,
  product_id: String,
  product_name: String,
  quantity: i32,
  price: Decimal,
}

#[derive(Debug, FromRow)]
struct AttemptRow {
  order_id: Uuid,
  provider: String,
  transaction_id: String,
  amount_minor: i64,
  currency: String,
  created_at: DateTime<Utc>,
}

#[derive(Debug, FromRow)]
struct EventRow {
  id: Uuid,
  order_id: Uuid,
  kind: String,
  row_data: Json<MirrorRow>,
  attempts: i32,
  last_error: Option<String>,
  created_at: DateTime<Utc>,
  next_attempt_at: DateTime<Utc>,
  delivered_at: Option<DateTime<Utc>>,
  failed_at: Option<DateTime<Utc>>,
}

fn corrupt(what: &str, detail: impl std::fmt::Display) -> AppError {
  AppError::Internal(format!("corrupt {} in database: {}", what, detail))
}

impl OrderRow {
  fn into_order(self, items: Vec<OrderItem>) -> Result<Order> {
    let status = self
      .status
      .parse::<OrderStatus>()
      .map_err(|_| corrupt("order status", &self.status))?;
    Ok(Order {
      id: self.id,
      order_number: self.order_number,
      user_id: self.user_id,
      total: self.total,
      status,
      shipping_address: self.shipping_address,
      tracking_number: self.tracking_number,
      created_at: self.created_at,
      updated_at: self.updated_at,
      items,
    })
  }
}

impl From<ItemRow> for OrderItem {
  fn from(row: ItemRow) -> Self {
    OrderItem {
      order_id: row.order_id,
      product_id: row.product_id,
      product_name: row.product_name,
      quantity: row.quantity,
      price: row.price,
    }
  }
}

impl TryFrom<AttemptRow> for PaymentAttempt {
  type Error = AppError;

  fn try_from(row: AttemptRow) -> Result<Self> {
    Ok(PaymentAttempt {
      order_id: row.order_id,
      provider: row.provider.parse().map_err(|_| corrupt("payment provider", &row.provider))?,
      transaction_id: row.transaction_id,
      amount_minor: row.amount_minor,
      currency: row.currency.parse().map_err(|_| corrupt("currency", &row.currency))?,
      created_at: row.created_at,
    })
  }
}

impl TryFrom<EventRow> for SyncEvent {
  type Error = AppError;

  fn try_from(row: EventRow) -> Result<Self> {
    Ok(SyncEvent {
      id: row.id,
      order_id: row.order_id,
      kind: row.kind.parse().map_err(|e: String| corrupt("sync event kind", e))?,
      row: row.row_data.0,
      attempts: u32::try_from(row.attempts).unwrap_or(0),
      last_error: row.last_error,
      created_at: row.created_at,
      next_attempt_at: row.next_attempt_at,
      delivered_at: row.delivered_at,
      failed_at: row.failed_at,
    })
  }
}

/// PostgreSQL-backed store for orders and the outbox.
#[derive(Clone)]
pub struct PgStore {
  pool: PgPool,
}

impl PgStore {
  /// Connects and applies the bundled migrations.
  #[instrument(name = "PgStore::connect", skip_all, err(Display))]
  pub async fn connect(database_url: &str) -> Result<Self> {
    let pool = PgPoolOptions::new().max_connections(10).connect(database_url).await?;
    sqlx::migrate!("./migrations").run(&pool).await.map_err(sqlx::Error::from)?;
    event!(Level::INFO, "Database connected and migrations applied.");
    Ok(Self { pool })
  }

  async fn attach_items(&self, rows: Vec<OrderRow>) -> Result<Vec<Order>> {
    let ids: Vec<Uuid> = rows.iter().map(|r| r.id).collect();
    let item_rows: Vec<ItemRow> = sqlx::query_as(
      "SELECT order_id, product_id, product_name, quantity, price FROM order_items WHERE order_id = ANY($1) ORDER BY id",
    )
    .bind(&ids)
    .fetch_all(&self.pool)
    .await?;

    let mut by_order: HashMap<Uuid, Vec<OrderItem>> = HashMap::new();
    for item in item_rows {
      by_order.entry(item.order_id).or_default().push(item.into());
    }
    rows
      .into_iter()
      .map(|row| {
        let items = by_order.remove(&row.id).unwrap_or_default();
        row.into_order(items)
      })
      .collect()
  }
}

#[async_trait]
impl OrderStore for PgStore {
  #[instrument(name = "PgStore::insert_order", skip_all, fields(order_id = %order.id), err(Display))]
  async fn insert_order(&self, order: &Order) -> Result<()> {
    sqlx::query(&format!(
      "INSERT INTO orders ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)",
      ORDER_COLUMNS
    ))
    .bind(order.id)
    .bind(&order.order_number)
    .bind(&order.user_id)
    .bind(order.total)
    .bind(order.status.as_str())
    .bind(&order.shipping_address)
    .bind(&order.tracking_number)
    .bind(order.created_at)
    .bind(order.updated_at)
    .execute(&self.pool)
    .await?;
    Ok(())
  }

  #[instrument(name = "PgStore::insert_items", skip_all, fields(count = items.len()), err(Display))]
  async fn insert_items(&self, items: &[OrderItem]) -> Result<()> {
    let mut tx = self.pool.begin().await?;
    for item in items {
      sqlx::query(
        "INSERT INTO order_items (order_id, product_id, product_name, quantity, price) VALUES ($1, $2, $3, $4, $5)",
      )
      .bind(item.order_id)
      .bind(&item.product_id)
      .bind(&item.product_name)
      .bind(item.quantity)
      .bind(item.price)
      .execute(&mut *tx)
      .await?;
    }
    tx.commit().await?;
    Ok(())
  }

  async fn delete_order(&self, order_id: Uuid) -> Result<()> {
    // Items and attempts cascade.
    sqlx::query("DELETE FROM orders WHERE id = $1")
      .bind(order_id)
      .execute(&self.pool)
      .await?;
    Ok(())
  }

  async fn get_order(&self, order_id: Uuid) -> Result<Option<Order>> {
    let row: Option<OrderRow> = sqlx::query_as(&format!("SELECT {} FROM orders WHERE id = $1", ORDER_COLUMNS))
      .bind(order_id)
      .fetch_optional(&self.pool)
      .await?;
    match row {
      Some(row) => Ok(self.attach_items(vec![row]).await?.pop()),
      None => Ok(None),
    }
  }

  async fn list_orders_for_user(&self, user_id: &str) -> Result<Vec<Order>> {
    let rows: Vec<OrderRow> = sqlx::query_as(&format!(
      "SELECT {} FROM orders WHERE user_id = $1 ORDER BY created_at DESC",
      ORDER_COLUMNS
    ))
    .bind(user_id)
    .fetch_all(&self.pool)
    .await?;
    self.attach_items(rows).await
  }

  async fn list_orders(&self) -> Result<Vec<Order>> {
    let rows: Vec<OrderRow> = sqlx::query_as(&format!("SELECT {} FROM orders ORDER BY created_at DESC", ORDER_COLUMNS))
      .fetch_all(&self.pool)
      .await?;
    self.attach_items(rows).await
  }

  async fn update_status(&self, update: &StatusUpdate) -> Result<bool> {
    let result = sqlx::query(
      "UPDATE orders SET status = $1, updated_at = $2, tracking_number = COALESCE($3, tracking_number) \
       WHERE id = $4 AND status = $5",
    )
    .bind(update.to.as_str())
    .bind(update.at)
    .bind(&update.tracking_number)
    .bind(update.order_id)
    .bind(update.from.as_str())
    .execute(&self.pool)
    .await?;
    Ok(result.rows_affected() == 1)
  }

  async fn record_payment_attempt(&self, attempt: &PaymentAttempt) -> Result<()> {
    sqlx::query(
      "INSERT INTO payment_attempts (order_id, provider, transaction_id, amount_minor, currency, created_at) \
       VALUES ($1, $2, $3, $4, $5, $6)",
    )
    .bind(attempt.order_id)
    .bind(attempt.provider.as_str())
    .bind(&attempt.transaction_id)
    .bind(attempt.amount_minor)
    .bind(attempt.currency.code())
    .bind(attempt.created_at)
    .execute(&self.pool)
    .await?;
    Ok(())
  }

  async fn latest_payment_attempt(&self, order_id: Uuid) -> Result<Option<PaymentAttempt>> {
    let row: Option<AttemptRow> = sqlx::query_as(
      "SELECT order_id, provider, transaction_id, amount_minor, currency, created_at \
       FROM payment_attempts WHERE order_id = $1 ORDER BY id DESC LIMIT 1",
    )
    .bind(order_id)
    .fetch_optional(&self.pool)
    .await?;
    row.map(PaymentAttempt::try_from).transpose()
  }
}

#[async_trait]
impl OutboxStore for PgStore {
  async fn enqueue(&self, event: &SyncEvent) -> Result<()> {
    sqlx::query(&format!(
      "INSERT INTO sync_events ({}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)",
      EVENT_COLUMNS
    ))
    .bind(event.id)
    .bind(event.order_id)
    .bind(event.kind.as_str())
    .bind(Json(&event.row))
    .bind(i32::try_from(event.attempts).unwrap_or(i32::MAX))
    .bind(&event.last_error)
    .bind(event.created_at)
    .bind(event.next_attempt_at)
    .bind(event.delivered_at)
    .bind(event.failed_at)
    .execute(&self.pool)
    .await?;
    Ok(())
  }

  async fn due_heads(&self, now: DateTime<Utc>, limit: usize) -> Result<Vec<SyncEvent>> {
    let rows: Vec<EventRow> = sqlx::query_as(&format!(
      "WITH heads AS ( \
         SELECT DISTINCT ON (order_id) seq, {cols} FROM sync_events \
         WHERE delivered_at IS NULL AND failed_at IS NULL \
         ORDER BY order_id, seq \
       ) \
       SELECT {cols} FROM heads WHERE next_attempt_at <= $1 ORDER BY seq LIMIT $2",
      cols = EVENT_COLUMNS
    ))
    .bind(now)
    .bind(i64::try_from(limit).unwrap_or(i64::MAX))
    .fetch_all(&self.pool)
    .await?;
    rows.into_iter().map(SyncEvent::try_from).collect()
  }

  async fn mark_delivered(&self, event_id: Uuid, at: DateTime<Utc>) -> Result<()> {
    sqlx::query("UPDATE sync_events SET delivered_at = $1, attempts = attempts + 1 WHERE id = $2")
      .bind(at)
      .bind(event_id)
      .execute(&self.pool)
      .await?;
    Ok(())
  }

  async fn reschedule(
    &self,
    event_id: Uuid,
    attempts: u32,
    next_attempt_at: DateTime<Utc>,
    error: &str,
  ) -> Result<()> {
    sqlx::query("UPDATE sync_events SET attempts = $1, next_attempt_at = $2, last_error = $3 WHERE id = $4")
      .bind(i32::try_from(attempts).unwrap_or(i32::MAX))
      .bind(next_attempt_at)
      .bind(error)
      .bind(event_id)
      .execute(&self.pool)
      .await?;
    Ok(())
  }

  async fn mark_failed(&self, event_id: Uuid, attempts: u32, at: DateTime<Utc>, error: &str) -> Result<()> {
    sqlx::query("UPDATE sync_events SET attempts = $1, failed_at = $2, last_error = $3 WHERE id = $4")
      .bind(i32::try_from(attempts).unwrap_or(i32::MAX))
      .bind(at)
      .bind(error)
      .bind(event_id)
      .execute(&self.pool)
      .await?;
    Ok(())
  }

  async fn has_undelivered(&self, order_id: Uuid) -> Result<bool> {
    let newest_delivered: Option<bool> = sqlx::query_scalar(
      "SELECT delivered_at IS NOT NULL FROM sync_events WHERE order_id = $1 ORDER BY seq DESC LIMIT 1",
    )
    .bind(order_id)
    .fetch_optional(&self.pool)
    .await?;
    Ok(newest_delivered == Some(false))
  }

  async fn events_for_order(&self, order_id: Uuid) -> Result<Vec<SyncEvent>> {
    let rows: Vec<EventRow> = sqlx::query_as(&format!(
      "SELECT {} FROM sync_events WHERE order_id = $1 ORDER BY seq",
      EVENT_COLUMNS
    ))
    .bind(order_id)
    .fetch_all(&self.pool)
    .await?;
    rows.into_iter().map(SyncEvent::try_from).collect()
  }
}
