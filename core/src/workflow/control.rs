// orderflow/src/workflow/control.rs

//! Signals for controlling workflow flow and the outcome of a workflow run.

/// Signal from a handler indicating whether the workflow should go on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepControl {
  /// Continue with the remaining handlers of this step and the next steps.
  Continue,
  /// Halt the workflow now. Completed steps are kept; no compensation runs,
  /// since halting is a business decision rather than a failure.
  Halt,
}

/// Outcome of a workflow run that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkflowResult {
  /// Every non-skipped step ran to completion.
  Completed,
  /// A handler returned `StepControl::Halt`.
  Halted,
}
