// orderflow/src/checkout/mod.rs

//! The checkout service: the three checkout workflows, status updates and
//! ledger reconciliation behind one entry point.

pub mod contexts;
pub mod initiation;
pub mod reconcile;
pub(crate) mod status;
pub mod submission;
pub mod verification;

pub use contexts::{
  CheckoutDeps, CreateOrderRequest, InitiatePaymentRequest, InitiationCtxData, SubmissionCtxData,
  VerificationCtxData,
};
pub use reconcile::ReconcileReport;

use crate::config::{AppConfig, OutboxConfig};
use crate::error::{AppError, Result};
use crate::models::{Order, OrderStatus, StatusOrigin};
use crate::payment::{PaymentGateway, PaymentHandle};
use crate::store::{MemoryStore, OrderStore, OutboxStore, PgStore};
use crate::sync::{MemoryMirror, MirrorRow, OrderMirror, OutboxRelay, SheetsMirror};
use crate::workflow::{ContextData, WorkflowRegistry};
use std::sync::Arc;
use tokio::sync::Notify;
use tracing::{event, instrument, Level};
use uuid::Uuid;

pub struct CheckoutService {
  deps: Arc<CheckoutDeps>,
  mirror: Arc<dyn OrderMirror>,
  workflows: WorkflowRegistry<AppError>,
}

impl CheckoutService {
  pub fn new(deps: CheckoutDeps, mirror: Arc<dyn OrderMirror>) -> Self {
    let workflows = WorkflowRegistry::<AppError>::new();
    workflows.register(submission::build_workflow());
    workflows.register(initiation::build_workflow());
    workflows.register(verification::build_workflow());
    event!(Level::DEBUG, workflows = ?workflows.registered_names(), "Checkout workflows registered.");

    Self {
      deps: Arc::new(deps),
      mirror,
      workflows,
    }
  }

  /// Builds the service from configuration: PostgreSQL when a database URL
  /// is set, otherwise in memory; Google Sheets when configured, otherwise
  /// an in-process ledger.
  pub async fn from_config(config: &AppConfig) -> Result<Self> {
    let http = reqwest::Client::new();

    let (store, outbox) = match config.database_url.as_deref() {
      Some(url) => {
        let pg = Arc::new(PgStore::connect(url).await?);
        let store: Arc<dyn OrderStore> = pg.clone();
        let outbox: Arc<dyn OutboxStore> = pg;
        (store, outbox)
      }
      None => {
        event!(Level::WARN, "DATABASE_URL not set; orders are kept in memory only.");
        let memory = Arc::new(MemoryStore::new());
        let store: Arc<dyn OrderStore> = memory.clone();
        let outbox: Arc<dyn OutboxStore> = memory;
        (store, outbox)
      }
    };

    let mirror: Arc<dyn OrderMirror> = match SheetsMirror::from_config(http.clone(), &config.mirror) {
      Some(sheets) => Arc::new(sheets),
      None => {
        event!(Level::WARN, "Google Sheets is not configured; mirroring to an in-process ledger.");
        Arc::new(MemoryMirror::new())
      }
    };

    let deps = CheckoutDeps {
      store,
      outbox,
      payments: PaymentGateway::new(config.payment.clone(), http),
      settings: config.checkout.clone(),
      relay_wake: Arc::new(Notify::new()),
    };
    Ok(Self::new(deps, mirror))
  }

  /// A relay draining this service's outbox into its ledger.
  pub fn outbox_relay(&self, config: &OutboxConfig) -> OutboxRelay {
    OutboxRelay::new(
      self.deps.outbox.clone(),
      self.mirror.clone(),
      config,
      self.deps.relay_wake.clone(),
    )
  }

  #[instrument(name = "CheckoutService::create_order", skip_all, fields(user_id = %request.user_id), err(Display))]
  pub async fn create_order(&self, request: CreateOrderRequest) -> Result<Order> {
    let ctx_data = ContextData::new(SubmissionCtxData::new(self.deps.clone(), request));
    self.workflows.run(ctx_data.clone()).await?;
    let order = ctx_data.write().order.take();
    order.ok_or_else(|| AppError::Internal("order submission finished without an order".to_string()))
  }

  #[instrument(name = "CheckoutService::initiate_payment", skip_all, fields(order_id = %request.order_id), err(Display))]
  pub async fn initiate_payment(&self, request: InitiatePaymentRequest) -> Result<PaymentHandle> {
    let ctx_data = ContextData::new(InitiationCtxData::new(self.deps.clone(), request));
    self.workflows.run(ctx_data.clone()).await?;
    let handle = ctx_data.write().handle.take();
    handle.ok_or_else(|| AppError::Internal("payment initiation finished without a handle".to_string()))
  }

  /// `true` once the order is paid. A declined, unfinished or mismatched
  /// payment is `false`, not an error.
  #[instrument(name = "CheckoutService::verify_payment", skip(self, signature), err(Display))]
  pub async fn verify_payment(&self, transaction_id: &str, order_id: Uuid, signature: Option<String>) -> Result<bool> {
    let ctx_data = ContextData::new(VerificationCtxData::new(
      self.deps.clone(),
      transaction_id.to_string(),
      order_id,
      signature,
    ));
    let outcome = self.workflows.run(ctx_data.clone()).await?;
    let verified = ctx_data.read().verified;
    event!(Level::INFO, ?outcome, verified, "Payment verification finished.");
    Ok(verified)
  }

  pub async fn update_order_status(
    &self,
    order_id: Uuid,
    status: OrderStatus,
    origin: StatusOrigin,
    tracking_number: Option<String>,
  ) -> Result<Order> {
    status::apply_status_change(&self.deps, order_id, status, origin, tracking_number).await
  }

  pub async fn get_order(&self, order_id: Uuid) -> Result<Order> {
    self
      .deps
      .store
      .get_order(order_id)
      .await?
      .ok_or_else(|| AppError::NotFound(format!("Order {} not found", order_id)))
  }

  pub async fn orders_for_user(&self, user_id: &str) -> Result<Vec<Order>> {
    reconcile::orders_for_user(&self.deps, self.mirror.as_ref(), user_id).await
  }

  pub async fn reconcile_from_mirror(&self) -> Result<ReconcileReport> {
    reconcile::reconcile_from_mirror(&self.deps, self.mirror.as_ref()).await
  }

  /// Ledger rows as they stand, malformed ones skipped.
  pub async fn pull_mirror(&self) -> Result<Vec<MirrorRow>> {
    self.mirror.pull().await
  }
}
