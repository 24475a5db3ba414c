// orderflow-server/src/web/handlers/order_handlers.rs

use actix_web::{web, HttpResponse};
use orderflow::{CreateOrderRequest, OrderStatus, StatusOrigin};
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument};
use uuid::Uuid;

use crate::errors::Result;
use crate::state::AppState;

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct ListOrdersQuery {
  pub user_id: String,
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct UpdateStatusPayload {
  pub status: OrderStatus,
  /// Defaults to the normal fulfillment path.
  #[serde(default)]
  pub origin: Option<StatusOrigin>,
  #[serde(default)]
  pub tracking_number: Option<String>,
}

#[instrument(name = "handler::create_order", skip(app_state, payload), fields(user_id = %payload.user_id))]
pub async fn create_order_handler(
  app_state: web::Data<AppState>,
  payload: web::Json<CreateOrderRequest>,
) -> Result<HttpResponse> {
  let order = app_state.checkout.create_order(payload.into_inner()).await?;
  info!(order_id = %order.id, order_number = %order.order_number, "Order created.");
  Ok(HttpResponse::Created().json(json!({
      "message": "Order created successfully.",
      "order": order
  })))
}

#[instrument(name = "handler::list_orders", skip(app_state, query), fields(user_id = %query.user_id))]
pub async fn list_orders_handler(
  app_state: web::Data<AppState>,
  query: web::Query<ListOrdersQuery>,
) -> Result<HttpResponse> {
  let orders = app_state.checkout.orders_for_user(&query.user_id).await?;
  Ok(HttpResponse::Ok().json(json!({ "orders": orders })))
}

#[instrument(name = "handler::get_order", skip(app_state, path), fields(order_id = %path.as_ref()))]
pub async fn get_order_handler(app_state: web::Data<AppState>, path: web::Path<Uuid>) -> Result<HttpResponse> {
  let order = app_state.checkout.get_order(path.into_inner()).await?;
  Ok(HttpResponse::Ok().json(json!({ "order": order })))
}

#[instrument(
  name = "handler::update_order_status",
  skip(app_state, path, payload),
  fields(order_id = %path.as_ref(), status = %payload.status)
)]
pub async fn update_order_status_handler(
  app_state: web::Data<AppState>,
  path: web::Path<Uuid>,
  payload: web::Json<UpdateStatusPayload>,
) -> Result<HttpResponse> {
  let payload = payload.into_inner();
  let order = app_state
    .checkout
    .update_order_status(
      path.into_inner(),
      payload.status,
      payload.origin.unwrap_or(StatusOrigin::Fulfillment),
      payload.tracking_number,
    )
    .await?;
  Ok(HttpResponse::Ok().json(json!({ "order": order })))
}
