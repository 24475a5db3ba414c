// orderflow/src/sync/event.rs

use crate::sync::row::MirrorRow;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncEventKind {
  OrderCreated,
  StatusChanged,
}

impl SyncEventKind {
  pub fn as_str(self) -> &'static str {
    match self {
      SyncEventKind::OrderCreated => "order_created",
      SyncEventKind::StatusChanged => "status_changed",
    }
  }
}

impl fmt::Display for SyncEventKind {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

impl FromStr for SyncEventKind {
  type Err = String;

  fn from_str(s: &str) -> Result<Self, Self::Err> {
    match s {
      "order_created" => Ok(SyncEventKind::OrderCreated),
      "status_changed" => Ok(SyncEventKind::StatusChanged),
      other => Err(format!("unknown sync event kind '{}'", other)),
    }
  }
}

/// An outbox entry: one row waiting to be pushed to the ledger.
#[derive(Debug, Clone, PartialEq)]
pub struct SyncEvent {
  pub id: Uuid,
  pub order_id: Uuid,
  pub kind: SyncEventKind,
  pub row: MirrorRow,
  pub attempts: u32,
  pub last_error: Option<String>,
  pub created_at: DateTime<Utc>,
  pub next_attempt_at: DateTime<Utc>,
  pub delivered_at: Option<DateTime<Utc>>,
  pub failed_at: Option<DateTime<Utc>>,
}

impl SyncEvent {
  /// A new event, due immediately.
  pub fn new(kind: SyncEventKind, row: MirrorRow, now: DateTime<Utc>) -> Self {
    Self {
      id: Uuid::new_v4(),
      order_id: row.id,
      kind,
      row,
      attempts: 0,
      last_error: None,
      created_at: now,
      next_attempt_at: now,
      delivered_at: None,
      failed_at: None,
    }
  }

  /// Neither delivered nor dead-lettered.
  pub fn is_pending(&self) -> bool {
    self.delivered_at.is_none() && self.failed_at.is_none()
  }
}
