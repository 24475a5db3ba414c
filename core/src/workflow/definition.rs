// orderflow/src/workflow/definition.rs

//! Contains the `Workflow<TData, Err>` struct definition and methods for its
//! construction and structural modification.

use crate::workflow::context::Handler;
use crate::workflow::error::WorkflowError;
use crate::workflow::step::{SkipCondition, StepDef};
use std::collections::HashMap;

/// An ordered, named-step workflow over a root data type `TData` whose handlers
/// fail with `Err`.
///
/// `Err` must be constructible from `WorkflowError` so that framework-level
/// failures (a required step without handlers, for instance) surface through
/// the same error type as handler failures.
pub struct Workflow<TData, Err>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + From<WorkflowError> + Send + Sync + 'static,
{
  /// Name used in spans and logs.
  pub(crate) name: String,

  /// Ordered list of step definitions.
  pub(crate) steps: Vec<StepDef<TData>>,

  // Handlers for the phases of each step.
  pub(crate) before: HashMap<String, Vec<Handler<TData, Err>>>,
  pub(crate) on: HashMap<String, Vec<Handler<TData, Err>>>,
  pub(crate) after: HashMap<String, Vec<Handler<TData, Err>>>,

  // Undo actions, run in reverse step order when a later required step fails.
  pub(crate) compensations: HashMap<String, Vec<Handler<TData, Err>>>,
}

impl<TData, Err> Workflow<TData, Err>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + From<WorkflowError> + Send + Sync + 'static,
{
  /// Creates a workflow from `(step_name, optional, skip_if)` triples.
  pub fn new(name: &str, step_defs: &[(&str, bool, Option<SkipCondition<TData>>)]) -> Self {
    let steps = step_defs
      .iter()
      .map(|(step_name, optional, skip_cond_opt)| StepDef {
        name: (*step_name).to_string(),
        optional: *optional,
        skip_if: skip_cond_opt.clone(),
      })
      .collect();

    Self {
      name: name.to_string(),
      steps,
      before: HashMap::new(),
      on: HashMap::new(),
      after: HashMap::new(),
      compensations: HashMap::new(),
    }
  }

  pub fn name(&self) -> &str {
    &self.name
  }

  /// Panics if the step is unknown. A typo in a step name is a wiring bug,
  /// found the first time the workflow is built.
  pub(crate) fn ensure_step_exists(&self, step_name: &str) {
    if !self.steps.iter().any(|s| s.name == step_name) {
      panic!(
        "Workflow '{}' setup error: step '{}' not found in definition.",
        self.name, step_name
      );
    }
  }
}
