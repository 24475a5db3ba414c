// orderflow/src/sync/row.rs

//! The seven-column ledger row `[id, orderNumber, userId, total, status,
//! timestamp, itemsJSON]` and its conversion to and from sheet cells.

use crate::models::{Order, OrderItem, OrderStatus};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use tracing::warn;
use uuid::Uuid;

pub const ROW_WIDTH: usize = 7;

/// Item as written into the `itemsJSON` cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MirrorItem {
  pub product_id: String,
  #[serde(default)]
  pub product_name: String,
  pub quantity: i32,
  pub price: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MirrorRow {
  pub id: Uuid,
  pub order_number: String,
  pub user_id: String,
  pub total: Decimal,
  pub status: OrderStatus,
  pub timestamp: DateTime<Utc>,
  pub items: Vec<MirrorItem>,
}

impl MirrorRow {
  /// Snapshot of an order at `timestamp`.
  pub fn from_order(order: &Order, timestamp: DateTime<Utc>) -> Self {
    Self {
      id: order.id,
      order_number: order.order_number.clone(),
      user_id: order.user_id.clone(),
      total: order.total,
      status: order.status,
      timestamp,
      items: order.items.iter().map(MirrorItem::from).collect(),
    }
  }

  /// Cells in column order. `total` is a plain decimal string.
  pub fn to_cells(&self) -> Vec<String> {
    vec![
      self.id.to_string(),
      self.order_number.clone(),
      self.user_id.clone(),
      self.total.to_string(),
      self.status.as_str().to_string(),
      self.timestamp.to_rfc3339(),
      serde_json::to_string(&self.items).unwrap_or_else(|_| "[]".to_string()),
    ]
  }

  /// Parses one sheet row. Returns `None` (and logs) for malformed rows; an
  /// unknown status is accepted as `processing` and an unreadable timestamp
  /// as the Unix epoch, so a hand-edited row still carries its status.
  pub fn from_cells(cells: &[String]) -> Option<Self> {
    if cells.len() < ROW_WIDTH {
      warn!(cells = cells.len(), "Skipping ledger row with too few cells.");
      return None;
    }
    let id = match Uuid::parse_str(cells[0].trim()) {
      Ok(id) => id,
      Err(e) => {
        warn!(raw_id = %cells[0], error = %e, "Skipping ledger row with an unparseable id.");
        return None;
      }
    };
    let total = match Decimal::from_str(cells[3].trim()) {
      Ok(total) => total,
      Err(e) => {
        warn!(order_id = %id, raw_total = %cells[3], error = %e, "Skipping ledger row with an unparseable total.");
        return None;
      }
    };
    let (status, defaulted) = OrderStatus::parse_lenient(&cells[4]);
    if defaulted {
      warn!(order_id = %id, raw_status = %cells[4], "Invalid status in ledger row, defaulting to 'processing'.");
    }
    let timestamp = match DateTime::parse_from_rfc3339(cells[5].trim()) {
      Ok(ts) => ts.with_timezone(&Utc),
      Err(e) => {
        warn!(order_id = %id, raw_timestamp = %cells[5], error = %e, "Unparseable timestamp in ledger row, using the epoch.");
        DateTime::<Utc>::UNIX_EPOCH
      }
    };
    let items_raw = if cells[6].trim().is_empty() { "[]" } else { cells[6].as_str() };
    let items = match serde_json::from_str::<Vec<MirrorItem>>(items_raw) {
      Ok(items) => items,
      Err(e) => {
        warn!(order_id = %id, error = %e, "Skipping ledger row with unparseable items.");
        return None;
      }
    };

    Some(Self {
      id,
      order_number: cells[1].clone(),
      user_id: cells[2].clone(),
      total,
      status,
      timestamp,
      items,
    })
  }
}

impl From<&OrderItem> for MirrorItem {
  fn from(item: &OrderItem) -> Self {
    Self {
      product_id: item.product_id.clone(),
      product_name: item.product_name.clone(),
      quantity: item.quantity,
      price: item.price,
    }
  }
}
