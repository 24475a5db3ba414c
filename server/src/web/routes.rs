// orderflow-server/src/web/routes.rs

use actix_web::{error, web, HttpRequest, HttpResponse};
use orderflow::AppError;

use crate::errors::ApiError;
use crate::state::AppState;
use crate::web::handlers::{order_handlers, payment_handlers, sync_handlers};

async fn health_check_handler(app_state: web::Data<AppState>) -> HttpResponse {
  HttpResponse::Ok().json(serde_json::json!({
    "status": "ok",
    "paymentProvider": app_state.config.payment.provider,
    "persistentStore": app_state.config.database_url.is_some(),
  }))
}

// Malformed bodies and queries get the same JSON error shape as everything else.
fn json_error_handler(err: error::JsonPayloadError, _req: &HttpRequest) -> actix_web::Error {
  ApiError(AppError::Validation(err.to_string())).into()
}

fn query_error_handler(err: error::QueryPayloadError, _req: &HttpRequest) -> actix_web::Error {
  ApiError(AppError::Validation(err.to_string())).into()
}

fn path_error_handler(err: error::PathError, _req: &HttpRequest) -> actix_web::Error {
  ApiError(AppError::Validation(err.to_string())).into()
}

pub fn configure_app_routes(cfg: &mut web::ServiceConfig) {
  cfg.service(
    web::scope("/api/v1")
      .app_data(web::JsonConfig::default().error_handler(json_error_handler))
      .app_data(web::QueryConfig::default().error_handler(query_error_handler))
      .app_data(web::PathConfig::default().error_handler(path_error_handler))
      .route("/health", web::get().to(health_check_handler))
      .service(
        web::scope("/orders")
          .route("", web::post().to(order_handlers::create_order_handler))
          .route("", web::get().to(order_handlers::list_orders_handler))
          .route("/{order_id}", web::get().to(order_handlers::get_order_handler))
          .route(
            "/{order_id}/status",
            web::patch().to(order_handlers::update_order_status_handler),
          ),
      )
      .service(
        web::scope("/payments")
          .route("", web::post().to(payment_handlers::initiate_payment_handler))
          .route("/verify", web::post().to(payment_handlers::verify_payment_handler)),
      )
      .service(
        web::scope("/sync")
          .route("/orders", web::get().to(sync_handlers::mirror_orders_handler))
          .route("/reconcile", web::post().to(sync_handlers::reconcile_handler)),
      ),
  );
}
