// orderflow-server/src/web/handlers/payment_handlers.rs

use actix_web::{web, HttpResponse};
use orderflow::InitiatePaymentRequest;
use serde::Deserialize;
use serde_json::json;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::errors::Result;
use crate::state::AppState;

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
pub struct VerifyPaymentPayload {
  pub transaction_id: String,
  pub order_id: Uuid,
  /// Razorpay checkout signature; other providers ignore it.
  #[serde(default)]
  pub signature: Option<String>,
}

#[instrument(name = "handler::initiate_payment", skip(app_state, payload), fields(order_id = %payload.order_id))]
pub async fn initiate_payment_handler(
  app_state: web::Data<AppState>,
  payload: web::Json<InitiatePaymentRequest>,
) -> Result<HttpResponse> {
  let handle = app_state.checkout.initiate_payment(payload.into_inner()).await?;
  info!(provider = %handle.provider, transaction_id = %handle.transaction_id, "Payment initiated.");
  Ok(HttpResponse::Ok().json(json!({ "payment": handle })))
}

#[instrument(
  name = "handler::verify_payment",
  skip(app_state, payload),
  fields(order_id = %payload.order_id, transaction_id = %payload.transaction_id)
)]
pub async fn verify_payment_handler(
  app_state: web::Data<AppState>,
  payload: web::Json<VerifyPaymentPayload>,
) -> Result<HttpResponse> {
  let VerifyPaymentPayload {
    transaction_id,
    order_id,
    signature,
  } = payload.into_inner();
  let verified = app_state
    .checkout
    .verify_payment(&transaction_id, order_id, signature)
    .await?;
  if !verified {
    warn!("Payment could not be verified.");
  }
  Ok(HttpResponse::Ok().json(json!({
      "orderId": order_id,
      "verified": verified
  })))
}
