// orderflow/src/models/order_item.rs

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A stored line item. Name and price are snapshots taken at submission time.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OrderItem {
  pub order_id: Uuid,
  pub product_id: String,
  pub product_name: String,
  pub quantity: i32,
  pub price: Decimal,
}

/// One cart line as the storefront submits it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartLine {
  /// Product id.
  pub id: String,
  pub name: String,
  pub price: Decimal,
  pub quantity: i32,
}

impl CartLine {
  /// `None` when the product does not fit in a `Decimal`.
  pub fn line_total(&self) -> Option<Decimal> {
    self.price.checked_mul(Decimal::from(self.quantity))
  }

  pub fn into_item(self, order_id: Uuid) -> OrderItem {
    OrderItem {
      order_id,
      product_id: self.id,
      product_name: self.name,
      quantity: self.quantity,
      price: self.price,
    }
  }
}
