// orderflow/src/sync/mirror.rs

//! The external, human-editable ledger orders are mirrored into.

use crate::config::MirrorConfig;
use crate::error::{AppError, Result};
use crate::models::OrderStatus;
use crate::sync::row::MirrorRow;
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Deserialize;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use tracing::{event, instrument, Level};
use uuid::Uuid;

#[async_trait]
pub trait OrderMirror: Send + Sync {
  /// Appends one row.
  async fn push(&self, row: &MirrorRow) -> Result<()>;

  /// All well-formed rows in sheet order.
  async fn pull(&self) -> Result<Vec<MirrorRow>>;
}

/// The last row per order id; later rows win.
pub fn latest_by_id(rows: &[MirrorRow]) -> HashMap<Uuid, &MirrorRow> {
  rows.iter().map(|row| (row.id, row)).collect()
}

const APPEND_RANGE: &str = "Orders!A:G";
const READ_RANGE: &str = "Orders!A2:G";

/// Google Sheets v4 values API.
pub struct SheetsMirror {
  http: reqwest::Client,
  api_base: String,
  api_key: String,
  sheet_id: String,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
  #[serde(default)]
  values: Vec<Vec<Value>>,
}

impl SheetsMirror {
  pub fn new(http: reqwest::Client, api_base: String, api_key: String, sheet_id: String) -> Self {
    Self {
      http,
      api_base: api_base.trim_end_matches('/').to_string(),
      api_key,
      sheet_id,
    }
  }

  /// `None` when the key or sheet id is missing.
  pub fn from_config(http: reqwest::Client, config: &MirrorConfig) -> Option<Self> {
    Some(Self::new(
      http,
      config.api_base.clone(),
      config.api_key.clone()?,
      config.sheet_id.clone()?,
    ))
  }

  fn values_url(&self, range: &str) -> String {
    format!("{}/v4/spreadsheets/{}/values/{}", self.api_base, self.sheet_id, range)
  }

  pub(crate) fn cells_of(row: Vec<Value>) -> Vec<String> {
    row
      .into_iter()
      .map(|cell| match cell {
        Value::String(s) => s,
        Value::Null => String::new(),
        other => other.to_string(),
      })
      .collect()
  }

  async fn check(response: reqwest::Response, action: &str) -> Result<reqwest::Response> {
    if response.status().is_success() {
      return Ok(response);
    }
    let status = response.status();
    let body = response.text().await.unwrap_or_default();
    event!(Level::ERROR, %status, body = %body, "Google Sheets API error.");
    Err(AppError::Mirror(format!("Failed to {}: {} {}", action, status, body)))
  }
}

#[async_trait]
impl OrderMirror for SheetsMirror {
  #[instrument(name = "SheetsMirror::push", skip_all, fields(order_id = %row.id), err(Display))]
  async fn push(&self, row: &MirrorRow) -> Result<()> {
    let response = self
      .http
      .post(format!("{}:append", self.values_url(APPEND_RANGE)))
      .query(&[("valueInputOption", "RAW")])
      .bearer_auth(&self.api_key)
      .json(&json!({ "values": [row.to_cells()] }))
      .send()
      .await
      .map_err(|e| AppError::Mirror(format!("Failed to add order to Google Sheets: {}", e)))?;
    Self::check(response, "add order to Google Sheets").await?;
    event!(Level::DEBUG, "Order row appended to Google Sheets.");
    Ok(())
  }

  #[instrument(name = "SheetsMirror::pull", skip_all, err(Display))]
  async fn pull(&self) -> Result<Vec<MirrorRow>> {
    let response = self
      .http
      .get(self.values_url(READ_RANGE))
      .bearer_auth(&self.api_key)
      .send()
      .await
      .map_err(|e| AppError::Mirror(format!("Failed to fetch orders from Google Sheets: {}", e)))?;
    let range: ValueRange = Self::check(response, "fetch orders from Google Sheets")
      .await?
      .json()
      .await
      .map_err(|e| AppError::Mirror(format!("Unreadable Google Sheets response: {}", e)))?;

    let received = range.values.len();
    let rows: Vec<MirrorRow> = range
      .values
      .into_iter()
      .filter_map(|row| MirrorRow::from_cells(&Self::cells_of(row)))
      .collect();
    event!(Level::INFO, received, parsed = rows.len(), "Received orders from Google Sheets.");
    Ok(rows)
  }
}

/// In-process ledger. Keeps raw cells like a sheet does, so manual edits and
/// malformed rows can be simulated.
#[derive(Default)]
pub struct MemoryMirror {
  sheet: RwLock<Vec<Vec<String>>>,
  unavailable: AtomicBool,
}

impl MemoryMirror {
  pub fn new() -> Self {
    Self::default()
  }

  /// While set, every call fails as if the ledger were unreachable.
  pub fn set_unavailable(&self, unavailable: bool) {
    self.unavailable.store(unavailable, Ordering::SeqCst);
  }

  /// Appends raw cells, bypassing the row codec.
  pub fn push_raw(&self, cells: Vec<String>) {
    self.sheet.write().push(cells);
  }

  /// Raw sheet contents.
  pub fn raw_rows(&self) -> Vec<Vec<String>> {
    self.sheet.read().clone()
  }

  /// Overwrites the status cell of the order's latest row, the way an
  /// operator would in the sheet. Returns whether a row was found.
  pub fn edit_status(&self, order_id: Uuid, raw_status: &str) -> bool {
    let id = order_id.to_string();
    let mut sheet = self.sheet.write();
    match sheet.iter_mut().rev().find(|cells| cells.first() == Some(&id)) {
      Some(cells) if cells.len() > 4 => {
        cells[4] = raw_status.to_string();
        true
      }
      _ => false,
    }
  }

  /// Convenience over [`MemoryMirror::edit_status`].
  pub fn set_status(&self, order_id: Uuid, status: OrderStatus) -> bool {
    self.edit_status(order_id, status.as_str())
  }

  fn ensure_available(&self) -> Result<()> {
    if self.unavailable.load(Ordering::SeqCst) {
      return Err(AppError::Mirror("ledger unavailable".to_string()));
    }
    Ok(())
  }
}

#[async_trait]
impl OrderMirror for MemoryMirror {
  async fn push(&self, row: &MirrorRow) -> Result<()> {
    self.ensure_available()?;
    self.sheet.write().push(row.to_cells());
    Ok(())
  }

  async fn pull(&self) -> Result<Vec<MirrorRow>> {
    self.ensure_available()?;
    let sheet = self.sheet.read().clone();
    Ok(sheet.iter().filter_map(|cells| MirrorRow::from_cells(cells)).collect())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::models::Order;
  use chrono::Utc;
  use rust_decimal::Decimal;

  fn row(status: OrderStatus) -> MirrorRow {
    let mut order = Order::new("u1".into(), Decimal::new(2599, 2), None, Utc::now());
    order.status = status;
    MirrorRow::from_order(&order, Utc::now())
  }

  #[test]
  fn sheet_cells_of_any_json_type_become_strings() {
    let cells = SheetsMirror::cells_of(vec![json!("a"), json!(25.99), json!(null), json!(true)]);
    assert_eq!(cells, vec!["a", "25.99", "", "true"]);
  }

  #[test]
  fn sheets_urls_target_the_orders_tab() {
    let mirror = SheetsMirror::new(reqwest::Client::new(), "https://sheets.test/".into(), "k".into(), "S1".into());
    assert_eq!(
      mirror.values_url(READ_RANGE),
      "https://sheets.test/v4/spreadsheets/S1/values/Orders!A2:G"
    );
  }

  #[tokio::test]
  async fn memory_mirror_round_trips_and_skips_garbage() {
    let mirror = MemoryMirror::new();
    let written = row(OrderStatus::Processing);
    mirror.push(&written).await.unwrap();
    mirror.push_raw(vec!["garbage".into()]);
    let pulled = mirror.pull().await.unwrap();
    assert_eq!(pulled, vec![written.clone()]);
    assert_eq!(mirror.pull().await.unwrap(), pulled);

    assert!(mirror.set_status(written.id, OrderStatus::Shipped));
    assert_eq!(mirror.pull().await.unwrap()[0].status, OrderStatus::Shipped);
  }

  #[tokio::test]
  async fn latest_row_wins() {
    let mirror = MemoryMirror::new();
    let first = row(OrderStatus::Processing);
    let mut second = first.clone();
    second.status = OrderStatus::Paid;
    mirror.push(&first).await.unwrap();
    mirror.push(&second).await.unwrap();
    let rows = mirror.pull().await.unwrap();
    assert_eq!(latest_by_id(&rows)[&first.id].status, OrderStatus::Paid);
  }

  #[tokio::test]
  async fn unavailable_mirror_errors() {
    let mirror = MemoryMirror::new();
    mirror.set_unavailable(true);
    assert!(matches!(mirror.pull().await, Err(AppError::Mirror(_))));
    assert!(matches!(mirror.push(&row(OrderStatus::Paid)).await, Err(AppError::Mirror(_))));
  }
}
