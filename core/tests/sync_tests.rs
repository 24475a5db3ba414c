// tests/sync_tests.rs
mod common;

use chrono::{Duration as ChronoDuration, Utc};
use common::*;
use orderflow::config::OutboxConfig;
use orderflow::store::OutboxStore;
use orderflow::sync::{DrainReport, MirrorRow, OrderMirror, OutboxRelay};
use orderflow::{Order, OrderStatus, StatusOrigin};
use serial_test::serial;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

fn outbox_config() -> OutboxConfig {
  OutboxConfig {
    poll_interval: Duration::from_secs(60),
    base_backoff: Duration::from_secs(1),
    max_backoff: Duration::from_secs(30),
    max_attempts: 3,
  }
}

fn relay(h: &Harness) -> OutboxRelay {
  h.service.outbox_relay(&outbox_config())
}

#[tokio::test]
#[serial]
async fn test_pushed_order_reads_back_with_same_id_total_and_items() {
  let h = harness();
  let order = h.service.create_order(salt_order_request("user-1")).await.unwrap();

  let report = relay(&h).drain_once().await.unwrap();
  assert_eq!(report.delivered, 1);

  let rows = h.service.pull_mirror().await.unwrap();
  assert_eq!(rows.len(), 1);
  let row = &rows[0];
  assert_eq!(row.id, order.id);
  assert_eq!(row.order_number, order.order_number);
  assert_eq!(row.user_id, "user-1");
  assert_eq!(row.total, dec("25.99"));
  assert_eq!(row.status, OrderStatus::Processing);
  assert_eq!(row.items.len(), 1);
  assert_eq!(row.items[0].product_id, "salt");
  assert_eq!(row.items[0].quantity, 2);
  assert_eq!(row.items[0].price, dec("10.00"));

  assert!(!h.store.has_undelivered(order.id).await.unwrap());
}

#[tokio::test]
#[serial]
async fn test_pull_is_idempotent() {
  let h = harness();
  h.service.create_order(salt_order_request("user-1")).await.unwrap();
  h.service.create_order(salt_order_request("user-2")).await.unwrap();
  relay(&h).drain_once().await.unwrap();

  let first = h.service.pull_mirror().await.unwrap();
  let second = h.service.pull_mirror().await.unwrap();

  assert_eq!(first.len(), 2);
  assert_eq!(first, second);
}

#[tokio::test]
#[serial]
async fn test_unknown_ledger_status_reads_as_processing() {
  let h = harness();
  let order = h.service.create_order(salt_order_request("user-1")).await.unwrap();
  relay(&h).drain_once().await.unwrap();
  assert!(h.mirror.edit_status(order.id, "bogus"));

  let rows = h.service.pull_mirror().await.unwrap();

  assert_eq!(rows[0].status, OrderStatus::Processing);
}

#[tokio::test]
#[serial]
async fn test_malformed_ledger_rows_are_skipped() {
  let h = harness();
  h.service.create_order(salt_order_request("user-1")).await.unwrap();
  relay(&h).drain_once().await.unwrap();
  h.mirror.push_raw(vec!["not-a-uuid".to_string(), "ORD-x".to_string()]);

  let rows = h.service.pull_mirror().await.unwrap();

  assert_eq!(rows.len(), 1);
  assert_eq!(h.mirror.raw_rows().len(), 2);
}

#[tokio::test]
#[serial]
async fn test_failed_push_is_retried_with_backoff_then_dead_lettered() {
  let h = harness();
  let order = h.service.create_order(salt_order_request("user-1")).await.unwrap();
  let relay = relay(&h);
  h.mirror.set_unavailable(true);
  let t0 = Utc::now();

  let report = relay.drain_at(t0).await.unwrap();
  assert_eq!(report.retried, 1);
  let event = &h.store.events_for_order(order.id).await.unwrap()[0];
  assert_eq!(event.attempts, 1);
  assert_eq!(event.next_attempt_at, t0 + ChronoDuration::seconds(1));
  assert!(event.last_error.is_some());

  // Not due yet.
  assert_eq!(relay.drain_at(t0).await.unwrap(), DrainReport::default());

  let t1 = t0 + ChronoDuration::seconds(1);
  assert_eq!(relay.drain_at(t1).await.unwrap().retried, 1);
  let event = &h.store.events_for_order(order.id).await.unwrap()[0];
  assert_eq!(event.attempts, 2);
  assert_eq!(event.next_attempt_at, t1 + ChronoDuration::seconds(2));

  let t2 = t1 + ChronoDuration::seconds(2);
  assert_eq!(relay.drain_at(t2).await.unwrap().dead_lettered, 1);
  let event = &h.store.events_for_order(order.id).await.unwrap()[0];
  assert_eq!(event.attempts, 3);
  assert!(event.failed_at.is_some());
  assert!(h.store.has_undelivered(order.id).await.unwrap());

  // Dead letters are never picked up again.
  h.mirror.set_unavailable(false);
  let later = t2 + ChronoDuration::hours(1);
  assert_eq!(relay.drain_at(later).await.unwrap(), DrainReport::default());
  assert!(h.mirror.raw_rows().is_empty());
}

#[tokio::test]
#[serial]
async fn test_events_of_one_order_are_delivered_in_order() {
  let h = harness();
  let order = h.service.create_order(salt_order_request("user-1")).await.unwrap();
  h.service
    .update_order_status(order.id, OrderStatus::Paid, StatusOrigin::Fulfillment, None)
    .await
    .unwrap();
  let relay = relay(&h);

  // The head fails, so the later event has to wait behind it.
  h.mirror.set_unavailable(true);
  let t0 = Utc::now();
  let report = relay.drain_at(t0).await.unwrap();
  assert_eq!(report.retried, 1);
  assert_eq!(report.delivered, 0);

  h.mirror.set_unavailable(false);
  let t1 = t0 + ChronoDuration::seconds(1);
  assert_eq!(relay.drain_at(t1).await.unwrap().delivered, 1);
  assert_eq!(relay.drain_at(t1).await.unwrap().delivered, 1);

  let statuses: Vec<_> = h.service.pull_mirror().await.unwrap().iter().map(|r| r.status).collect();
  assert_eq!(statuses, vec![OrderStatus::Processing, OrderStatus::Paid]);
}

#[tokio::test]
#[serial]
async fn test_spawned_relay_delivers_on_wake_and_stops_on_shutdown() {
  let h = harness();
  let (shutdown_tx, shutdown_rx) = watch::channel(false);
  let handle = Arc::new(relay(&h)).spawn(shutdown_rx);
  tokio::time::sleep(Duration::from_millis(20)).await;

  let order = h.service.create_order(salt_order_request("user-1")).await.unwrap();

  // The poll interval is a minute; only the wake-up can deliver this in time.
  let delivered = tokio::time::timeout(Duration::from_secs(5), async {
    loop {
      if !h.mirror.raw_rows().is_empty() {
        break;
      }
      tokio::time::sleep(Duration::from_millis(10)).await;
    }
  })
  .await;
  assert!(delivered.is_ok());
  assert_eq!(h.service.pull_mirror().await.unwrap()[0].id, order.id);

  shutdown_tx.send(true).unwrap();
  tokio::time::timeout(Duration::from_secs(5), handle)
    .await
    .expect("relay did not stop")
    .unwrap();
}

#[tokio::test]
#[serial]
async fn test_orders_for_user_shows_ledger_status() {
  let h = harness();
  let order = h.service.create_order(salt_order_request("user-1")).await.unwrap();
  relay(&h).drain_once().await.unwrap();
  h.mirror.set_status(order.id, OrderStatus::Delivered);

  let orders = h.service.orders_for_user("user-1").await.unwrap();
  assert_eq!(orders[0].status, OrderStatus::Delivered);
  // The store itself is untouched.
  assert_eq!(h.service.get_order(order.id).await.unwrap().status, OrderStatus::Processing);

  h.mirror.set_unavailable(true);
  let orders = h.service.orders_for_user("user-1").await.unwrap();
  assert_eq!(orders[0].status, OrderStatus::Processing);
}

#[tokio::test]
#[serial]
async fn test_reconcile_applies_manual_ledger_edits() {
  let h = harness();
  let order = h.service.create_order(salt_order_request("user-1")).await.unwrap();
  let untouched = h.service.create_order(salt_order_request("user-2")).await.unwrap();
  relay(&h).drain_once().await.unwrap();
  h.mirror.set_status(order.id, OrderStatus::Shipped);

  let report = h.service.reconcile_from_mirror().await.unwrap();

  assert_eq!(report.examined, 2);
  assert_eq!(report.applied, 1);
  assert_eq!(report.unchanged, 1);
  assert_eq!(h.service.get_order(order.id).await.unwrap().status, OrderStatus::Shipped);
  assert_eq!(
    h.service.get_order(untouched.id).await.unwrap().status,
    OrderStatus::Processing
  );
  // The override goes back to the ledger like any other change.
  assert!(h.store.has_undelivered(order.id).await.unwrap());

  let again = h.service.reconcile_from_mirror().await.unwrap();
  assert_eq!(again.applied, 0);
}

#[tokio::test]
#[serial]
async fn test_reconcile_skips_orders_with_undelivered_changes() {
  let h = harness();
  let order = h.service.create_order(salt_order_request("user-1")).await.unwrap();
  relay(&h).drain_once().await.unwrap();
  h.service
    .update_order_status(order.id, OrderStatus::Paid, StatusOrigin::Fulfillment, None)
    .await
    .unwrap();

  // The ledger still says processing, but only because it is behind.
  let report = h.service.reconcile_from_mirror().await.unwrap();

  assert_eq!(report.skipped_pending, 1);
  assert_eq!(report.applied, 0);
  assert_eq!(h.service.get_order(order.id).await.unwrap().status, OrderStatus::Paid);
}

#[tokio::test]
#[serial]
async fn test_reconcile_keeps_status_whose_push_was_dead_lettered() {
  let h = harness();
  let order = h.service.create_order(salt_order_request("user-1")).await.unwrap();
  let relay = h.service.outbox_relay(&OutboxConfig {
    max_attempts: 1,
    ..outbox_config()
  });
  relay.drain_once().await.unwrap();
  h.service
    .update_order_status(order.id, OrderStatus::Paid, StatusOrigin::Payment, None)
    .await
    .unwrap();

  h.mirror.set_unavailable(true);
  assert_eq!(relay.drain_once().await.unwrap().dead_lettered, 1);
  h.mirror.set_unavailable(false);

  // The ledger's newest row is still the processing one.
  let report = h.service.reconcile_from_mirror().await.unwrap();

  assert_eq!(report.skipped_pending, 1);
  assert_eq!(report.applied, 0);
  assert_eq!(h.service.get_order(order.id).await.unwrap().status, OrderStatus::Paid);
}

#[tokio::test]
#[serial]
async fn test_reconcile_resumes_once_a_later_change_reaches_the_ledger() {
  let h = harness();
  let order = h.service.create_order(salt_order_request("user-1")).await.unwrap();
  let relay = h.service.outbox_relay(&OutboxConfig {
    max_attempts: 1,
    ..outbox_config()
  });
  relay.drain_once().await.unwrap();
  h.service
    .update_order_status(order.id, OrderStatus::Paid, StatusOrigin::Payment, None)
    .await
    .unwrap();
  h.mirror.set_unavailable(true);
  relay.drain_once().await.unwrap();
  h.mirror.set_unavailable(false);

  h.service
    .update_order_status(order.id, OrderStatus::Shipped, StatusOrigin::Fulfillment, None)
    .await
    .unwrap();
  assert_eq!(relay.drain_once().await.unwrap().delivered, 1);
  assert!(!h.store.has_undelivered(order.id).await.unwrap());
  h.mirror.set_status(order.id, OrderStatus::Delivered);

  let report = h.service.reconcile_from_mirror().await.unwrap();

  assert_eq!(report.applied, 1);
  assert_eq!(h.service.get_order(order.id).await.unwrap().status, OrderStatus::Delivered);
}

#[tokio::test]
#[serial]
async fn test_reconcile_counts_rows_without_orders() {
  let h = harness();
  let stranger = Order::new("ghost".to_string(), dec("9.99"), None, Utc::now());
  h.mirror.push(&MirrorRow::from_order(&stranger, Utc::now())).await.unwrap();

  let report = h.service.reconcile_from_mirror().await.unwrap();

  assert_eq!(report.unknown_rows, 1);
  assert_eq!(report.examined, 0);
}
