// orderflow/src/workflow/mod.rs

//! A small asynchronous workflow engine: named steps with before/on/after
//! handlers, optional steps, skip conditions, saga-style compensation and a
//! type-keyed registry. The checkout stages are built on it.

pub mod context;
pub mod control;
pub mod definition;
pub mod error;
pub mod execution;
pub mod hooks;
pub mod registry;
pub mod step;

pub use context::{ContextData, Handler};
pub use control::{StepControl, WorkflowResult};
pub use definition::Workflow;
pub use error::WorkflowError;
pub use registry::WorkflowRegistry;
pub use step::{SkipCondition, StepDef};
