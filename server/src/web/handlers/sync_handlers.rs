// orderflow-server/src/web/handlers/sync_handlers.rs

use actix_web::{web, HttpResponse};
use serde_json::json;
use tracing::instrument;

use crate::errors::Result;
use crate::state::AppState;

/// The ledger as it stands, for fulfillment tooling.
#[instrument(name = "handler::mirror_orders", skip(app_state))]
pub async fn mirror_orders_handler(app_state: web::Data<AppState>) -> Result<HttpResponse> {
  let rows = app_state.checkout.pull_mirror().await?;
  Ok(HttpResponse::Ok().json(json!({ "rows": rows })))
}

#[instrument(name = "handler::reconcile", skip(app_state))]
pub async fn reconcile_handler(app_state: web::Data<AppState>) -> Result<HttpResponse> {
  let report = app_state.checkout.reconcile_from_mirror().await?;
  Ok(HttpResponse::Ok().json(json!({ "report": report })))
}
