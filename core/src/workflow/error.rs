// orderflow/src/workflow/error.rs
use anyhow::Error as AnyhowError;
use thiserror::Error;

/// Framework-level failures of the workflow engine.
#[derive(Debug, Error)]
pub enum WorkflowError {
  #[error("Handler missing for required step: {step_name}")]
  HandlerMissing { step_name: String },

  #[error("Type mismatch during context downcast (expected {expected_type}, at '{location}')")]
  TypeMismatch { location: String, expected_type: String },

  #[error("No workflow registered for context type {type_name}")]
  NotRegistered { type_name: String },

  #[error("Error in workflow handler. Source: {source}")]
  HandlerError {
    #[source]
    source: AnyhowError,
  },

  #[error("Internal workflow error: {0}")]
  Internal(String),
}

impl From<AnyhowError> for WorkflowError {
  fn from(err: AnyhowError) -> Self {
    WorkflowError::HandlerError { source: err }
  }
}
