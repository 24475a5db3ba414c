// orderflow-server/src/errors.rs

use actix_web::http::StatusCode;
use actix_web::{HttpResponse, ResponseError};
use orderflow::AppError;
use serde_json::json;
use thiserror::Error;

/// An [`AppError`] on its way to becoming an HTTP response.
#[derive(Debug, Error)]
#[error(transparent)]
pub struct ApiError(#[from] pub AppError);

impl ResponseError for ApiError {
  fn status_code(&self) -> StatusCode {
    match &self.0 {
      AppError::Validation(_) => StatusCode::BAD_REQUEST,
      AppError::NotFound(_) => StatusCode::NOT_FOUND,
      AppError::InvalidTransition { .. } => StatusCode::CONFLICT,
      AppError::Provider { .. } | AppError::Http(_) => StatusCode::BAD_GATEWAY,
      AppError::Config(_)
      | AppError::Mirror(_)
      | AppError::Database(_)
      | AppError::Workflow { .. }
      | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
    }
  }

  fn error_response(&self) -> HttpResponse {
    let status = self.status_code();
    if status.is_server_error() {
      tracing::error!(application_error = %self.0, "Responding with error");
    } else {
      tracing::warn!(application_error = %self.0, "Rejecting request");
    }

    let body = match &self.0 {
      AppError::Validation(m) | AppError::NotFound(m) => json!({ "error": m }),
      AppError::InvalidTransition { from, to } => json!({
        "error": "Status transition not allowed",
        "detail": format!("{} -> {}", from, to),
      }),
      AppError::Provider { provider, message } => json!({
        "error": "Payment provider error",
        "detail": format!("{}: {}", provider, message),
      }),
      AppError::Http(e) => json!({ "error": "Upstream request failed", "detail": e.to_string() }),
      AppError::Config(m) => json!({ "error": "Configuration issue", "detail": m }),
      // Query text and driver details stay in the logs.
      AppError::Database(_) => json!({ "error": "Database operation failed" }),
      AppError::Mirror(m) => json!({ "error": "Order ledger unavailable", "detail": m }),
      AppError::Workflow { source } => json!({ "error": "Workflow processing error", "detail": source.to_string() }),
      AppError::Internal(m) => json!({ "error": "An internal error occurred", "detail": m }),
    };
    HttpResponse::build(status).json(body)
  }
}

pub type Result<T, E = ApiError> = std::result::Result<T, E>;
