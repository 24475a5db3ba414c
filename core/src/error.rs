// orderflow/src/error.rs
use crate::models::OrderStatus;
use crate::workflow::WorkflowError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
  #[error("Validation Error: {0}")]
  Validation(String),

  #[error("Resource Not Found: {0}")]
  NotFound(String),

  #[error("Configuration Error: {0}")]
  Config(String),

  #[error("Invalid status transition from '{from}' to '{to}'")]
  InvalidTransition { from: OrderStatus, to: OrderStatus },

  #[error("Payment provider '{provider}' error: {message}")]
  Provider { provider: String, message: String },

  #[error("Order mirror error: {0}")]
  Mirror(String),

  #[error("Database Error: {0}")]
  Database(#[from] sqlx::Error),

  #[error("HTTP client error: {0}")]
  Http(#[from] reqwest::Error),

  #[error("Workflow Error: {source}")]
  Workflow {
    #[from]
    source: WorkflowError,
  },

  #[error("Internal Error: {0}")]
  Internal(String),
}

impl AppError {
  pub fn provider(provider: impl Into<String>, message: impl Into<String>) -> Self {
    AppError::Provider {
      provider: provider.into(),
      message: message.into(),
    }
  }

  /// Configuration and validation failures are never worth retrying.
  pub fn is_retryable(&self) -> bool {
    matches!(
      self,
      AppError::Provider { .. } | AppError::Mirror(_) | AppError::Database(_) | AppError::Http(_)
    )
  }
}

impl From<anyhow::Error> for AppError {
  fn from(err: anyhow::Error) -> Self {
    match err.downcast::<AppError>() {
      Ok(app_err) => app_err,
      Err(err) => match err.downcast::<sqlx::Error>() {
        Ok(db_err) => AppError::Database(db_err),
        Err(err) => AppError::Internal(err.to_string()),
      },
    }
  }
}

pub type Result<T, E = AppError> = std::result::Result<T, E>;
