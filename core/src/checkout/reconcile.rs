// orderflow/src/checkout/reconcile.rs

//! Reading the ledger back. Fulfillment staff edit statuses by hand in the
//! ledger; these functions bring those edits into view and, on request, into
//! the store.

use crate::checkout::contexts::CheckoutDeps;
use crate::checkout::status::apply_status_change;
use crate::error::Result;
use crate::models::{Order, StatusOrigin};
use crate::sync::{latest_by_id, OrderMirror};
use serde::Serialize;
use std::collections::HashSet;
use tracing::{event, instrument, Level};
use uuid::Uuid;

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReconcileReport {
  /// Stored orders looked at.
  pub examined: usize,
  pub applied: usize,
  /// Orders whose latest change never reached the ledger.
  pub skipped_pending: usize,
  pub unchanged: usize,
  pub failed: usize,
  /// Ledger rows with no stored order.
  pub unknown_rows: usize,
}

/// A user's orders, newest first, with statuses taken from the ledger where
/// it has a row. Falls back to the stored statuses if the ledger is down.
#[instrument(skip(deps, mirror), err(Display))]
pub(crate) async fn orders_for_user(
  deps: &CheckoutDeps,
  mirror: &dyn OrderMirror,
  user_id: &str,
) -> Result<Vec<Order>> {
  let mut orders = deps.store.list_orders_for_user(user_id).await?;
  if orders.is_empty() {
    return Ok(orders);
  }

  let rows = match mirror.pull().await {
    Ok(rows) => rows,
    Err(e) => {
      event!(Level::WARN, error = %e, "Ledger unavailable; returning stored statuses.");
      return Ok(orders);
    }
  };
  let latest = latest_by_id(&rows);
  for order in orders.iter_mut() {
    if let Some(row) = latest.get(&order.id) {
      order.status = row.status;
    }
  }
  Ok(orders)
}

/// Applies ledger statuses that differ from the stored ones as overrides.
#[instrument(skip_all, err(Display))]
pub(crate) async fn reconcile_from_mirror(deps: &CheckoutDeps, mirror: &dyn OrderMirror) -> Result<ReconcileReport> {
  let rows = mirror.pull().await?;
  let latest = latest_by_id(&rows);
  let orders = deps.store.list_orders().await?;

  let known: HashSet<Uuid> = orders.iter().map(|order| order.id).collect();
  let mut report = ReconcileReport {
    unknown_rows: latest.keys().filter(|id| !known.contains(*id)).count(),
    ..ReconcileReport::default()
  };

  for order in &orders {
    report.examined += 1;
    let Some(row) = latest.get(&order.id) else {
      report.unchanged += 1;
      continue;
    };
    if row.status == order.status {
      report.unchanged += 1;
      continue;
    }
    // The ledger has not caught up with this order, or gave up on it; its row is stale.
    if deps.outbox.has_undelivered(order.id).await? {
      report.skipped_pending += 1;
      continue;
    }
    match apply_status_change(deps, order.id, row.status, StatusOrigin::Override, None).await {
      Ok(_) => report.applied += 1,
      Err(e) => {
        event!(Level::ERROR, order_id = %order.id, error = %e, "Could not apply ledger status.");
        report.failed += 1;
      }
    }
  }

  event!(
    Level::INFO,
    examined = report.examined,
    applied = report.applied,
    skipped_pending = report.skipped_pending,
    failed = report.failed,
    unknown_rows = report.unknown_rows,
    "Reconciliation finished."
  );
  Ok(report)
}
