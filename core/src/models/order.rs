// orderflow/src/models/order.rs

use crate::error::AppError;
use crate::models::order_item::OrderItem;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OrderStatus {
  Processing,
  Paid,
  Shipped,
  Delivered,
  Cancelled,
}

impl OrderStatus {
  pub const ALL: [OrderStatus; 5] = [
    OrderStatus::Processing,
    OrderStatus::Paid,
    OrderStatus::Shipped,
    OrderStatus::Delivered,
    OrderStatus::Cancelled,
  ];

  pub fn as_str(self) -> &'static str {
    match self {
      OrderStatus::Processing => "processing",
      OrderStatus::Paid => "paid",
      OrderStatus::Shipped => "shipped",
      OrderStatus::Delivered => "delivered",
      OrderStatus::Cancelled => "cancelled",
    }
  }

  /// Parses a status typed by a human into the ledger. Anything unrecognised
  /// falls back to `processing`; the flag reports whether that happened.
  pub fn parse_lenient(raw: &str) -> (OrderStatus, bool) {
    match raw.trim().to_ascii_lowercase().parse::<OrderStatus>() {
      Ok(status) => (status, false),
      Err(_) => (OrderStatus::Processing, true),
    }
  }

  /// Whether `self -> to` is allowed for a change coming from `origin`.
  /// Staying in the same status is always allowed.
  pub fn can_transition(self, to: OrderStatus, origin: StatusOrigin) -> bool {
    use OrderStatus::*;
    if self == to {
      return true;
    }
    match origin {
      StatusOrigin::Override => true,
      StatusOrigin::Payment => matches!((self, to), (Processing, Paid)),
      StatusOrigin::Fulfillment => matches!(
        (self, to),
        (Processing, Paid) | (Processing, Cancelled) | (Paid, Shipped) | (Paid, Cancelled) | (Shipped, Delivered)
      ),
    }
  }
}

impl fmt::Display for OrderStatus {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for OrderStatus {
  type Err = AppError;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    OrderStatus::ALL
      .into_iter()
      .find(|status| status.as_str() == s)
      .ok_or_else(|| AppError::Validation(format!("Unknown order status '{}'", s)))
  }
}

/// Who is asking for a status change.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StatusOrigin {
  /// A verified payment. Only `processing -> paid`.
  Payment,
  /// The normal admin path, restricted to the transition table.
  Fulfillment,
  /// Admin or ledger override. Any transition, logged as out-of-band.
  Override,
}

impl fmt::Display for StatusOrigin {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(match self {
      StatusOrigin::Payment => "payment",
      StatusOrigin::Fulfillment => "fulfillment",
      StatusOrigin::Override => "override",
    })
  }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
  pub id: Uuid,
  pub order_number: String,
  pub user_id: String,
  pub total: Decimal,
  pub status: OrderStatus,
  pub shipping_address: Option<String>,
  pub tracking_number: Option<String>,
  pub created_at: DateTime<Utc>,
  pub updated_at: DateTime<Utc>,
  #[serde(default)]
  pub items: Vec<OrderItem>,
}

impl Order {
  /// A fresh `processing` order with no items yet.
  pub fn new(user_id: String, total: Decimal, shipping_address: Option<String>, now: DateTime<Utc>) -> Self {
    Self {
      id: Uuid::new_v4(),
      order_number: new_order_number(now),
      user_id,
      total,
      status: OrderStatus::Processing,
      shipping_address,
      tracking_number: None,
      created_at: now,
      updated_at: now,
      items: Vec::new(),
    }
  }
}

/// `ORD-<yyyymmdd>-<12 upper-case hex>`, the suffix taken from a random UUID.
pub fn new_order_number(now: DateTime<Utc>) -> String {
  let suffix = Uuid::new_v4().simple().to_string()[..12].to_ascii_uppercase();
  format!("ORD-{}-{}", now.format("%Y%m%d"), suffix)
}
