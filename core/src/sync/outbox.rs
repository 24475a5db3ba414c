// orderflow/src/sync/outbox.rs

//! Background delivery of [`SyncEvent`]s to the ledger, with per-order
//! ordering, exponential backoff and dead-lettering.

use crate::config::OutboxConfig;
use crate::error::Result;
use crate::store::OutboxStore;
use crate::sync::event::SyncEvent;
use crate::sync::mirror::OrderMirror;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tracing::{event, instrument, Instrument, Level};

const DEFAULT_BATCH_SIZE: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
  pub base: Duration,
  pub max: Duration,
  pub max_attempts: u32,
}

impl RetryPolicy {
  pub fn from_config(config: &OutboxConfig) -> Self {
    Self {
      base: config.base_backoff,
      max: config.max_backoff,
      max_attempts: config.max_attempts,
    }
  }

  /// Delay before the next try after `attempts` failures: `base × 2^(attempts-1)`,
  /// capped at `max`.
  pub fn backoff(&self, attempts: u32) -> Duration {
    let exponent = attempts.saturating_sub(1);
    let factor = 1u32.checked_shl(exponent).unwrap_or(u32::MAX);
    self.base.saturating_mul(factor).min(self.max)
  }
}

/// What one drain pass did.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DrainReport {
  pub delivered: usize,
  pub retried: usize,
  pub dead_lettered: usize,
}

pub struct OutboxRelay {
  outbox: Arc<dyn OutboxStore>,
  mirror: Arc<dyn OrderMirror>,
  policy: RetryPolicy,
  poll_interval: Duration,
  wake: Arc<Notify>,
  batch_size: usize,
}

impl OutboxRelay {
  pub fn new(
    outbox: Arc<dyn OutboxStore>,
    mirror: Arc<dyn OrderMirror>,
    config: &OutboxConfig,
    wake: Arc<Notify>,
  ) -> Self {
    Self {
      outbox,
      mirror,
      policy: RetryPolicy::from_config(config),
      poll_interval: config.poll_interval,
      wake,
      batch_size: DEFAULT_BATCH_SIZE,
    }
  }

  pub async fn drain_once(&self) -> Result<DrainReport> {
    self.drain_at(Utc::now()).await
  }

  /// One pass at `now`: every order's due head event is pushed once.
  #[instrument(name = "OutboxRelay::drain", skip(self), err(Display))]
  pub async fn drain_at(&self, now: DateTime<Utc>) -> Result<DrainReport> {
    let heads = self.outbox.due_heads(now, self.batch_size).await?;
    let mut report = DrainReport::default();
    for sync_event in heads {
      match self.mirror.push(&sync_event.row).await {
        Ok(()) => {
          self.outbox.mark_delivered(sync_event.id, now).await?;
          event!(
            Level::DEBUG,
            event_id = %sync_event.id,
            order_id = %sync_event.order_id,
            kind = %sync_event.kind,
            "Sync event delivered."
          );
          report.delivered += 1;
        }
        Err(e) => {
          self.record_failure(&sync_event, now, &e.to_string(), &mut report).await?;
        }
      }
    }
    if report != DrainReport::default() {
      event!(
        Level::INFO,
        delivered = report.delivered,
        retried = report.retried,
        dead_lettered = report.dead_lettered,
        "Outbox drain pass finished."
      );
    }
    Ok(report)
  }

  async fn record_failure(
    &self,
    sync_event: &SyncEvent,
    now: DateTime<Utc>,
    error: &str,
    report: &mut DrainReport,
  ) -> Result<()> {
    let attempts = sync_event.attempts + 1;
    if attempts >= self.policy.max_attempts {
      self.outbox.mark_failed(sync_event.id, attempts, now, error).await?;
      event!(
        Level::ERROR,
        event_id = %sync_event.id,
        order_id = %sync_event.order_id,
        kind = %sync_event.kind,
        attempts,
        error,
        "Sync event dead-lettered after exhausting retries."
      );
      report.dead_lettered += 1;
    } else {
      let delay = self.policy.backoff(attempts);
      let next_attempt_at = now + chrono::Duration::from_std(delay).unwrap_or_else(|_| chrono::Duration::days(1));
      self.outbox.reschedule(sync_event.id, attempts, next_attempt_at, error).await?;
      event!(
        Level::WARN,
        event_id = %sync_event.id,
        order_id = %sync_event.order_id,
        attempts,
        retry_in_ms = delay.as_millis() as u64,
        error,
        "Sync event push failed; rescheduled."
      );
      report.retried += 1;
    }
    Ok(())
  }

  /// Runs the relay until `shutdown` turns true or its sender is dropped.
  /// Wakes every poll interval, or early when the notifier fires.
  pub fn spawn(self: Arc<Self>, mut shutdown: watch::Receiver<bool>) -> JoinHandle<()> {
    let span = tracing::info_span!("outbox_relay");
    tokio::spawn(
      async move {
        event!(Level::INFO, poll_interval_ms = self.poll_interval.as_millis() as u64, "Outbox relay started.");
        loop {
          // Keep draining while progress is made so an order's later events
          // follow right behind its head.
          loop {
            match self.drain_once().await {
              Ok(report) if report.delivered > 0 => continue,
              Ok(_) => break,
              Err(e) => {
                event!(Level::ERROR, error = %e, "Outbox drain pass failed.");
                break;
              }
            }
          }

          if *shutdown.borrow() {
            break;
          }
          let sender_gone = tokio::select! {
            _ = tokio::time::sleep(self.poll_interval) => false,
            _ = self.wake.notified() => false,
            changed = shutdown.changed() => changed.is_err(),
          };
          if sender_gone || *shutdown.borrow() {
            break;
          }
        }
        event!(Level::INFO, "Outbox relay stopped.");
      }
      .instrument(span),
    )
  }
}
