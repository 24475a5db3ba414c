// orderflow/src/workflow/execution.rs

//! Contains `Workflow::run()`: step execution, optional-step tolerance and
//! reverse-order compensation of completed steps.

use crate::workflow::context::{ContextData, Handler};
use crate::workflow::control::{StepControl, WorkflowResult};
use crate::workflow::definition::Workflow;
use crate::workflow::error::WorkflowError;
use tracing::{event, instrument, Instrument, Level};

/// How a single step ended.
enum StepOutcome<Err> {
  Completed,
  Halted,
  Failed(Err),
}

impl<TData, Err> Workflow<TData, Err>
where
  TData: 'static + Send + Sync,
  Err: std::error::Error + From<WorkflowError> + Send + Sync + 'static,
{
  /// Executes the workflow against `ctx_data`.
  ///
  /// A failing required step triggers the compensations of every step that
  /// completed before it, newest first, and then returns the step's error.
  /// A failing optional step is logged and skipped.
  #[instrument(
    name = "Workflow::run",
    skip_all,
    fields(
      workflow = %self.name,
      context_data_type = %std::any::type_name::<TData>(),
      num_steps = self.steps.len(),
    ),
    err(Display)
  )]
  pub async fn run(&self, ctx_data: ContextData<TData>) -> Result<WorkflowResult, Err> {
    event!(Level::DEBUG, "Workflow execution starting.");
    let mut completed: Vec<&str> = Vec::with_capacity(self.steps.len());

    for (step_idx, step_def) in self.steps.iter().enumerate() {
      let step_name = step_def.name.as_str();

      if let Some(skip_cond_fn) = &step_def.skip_if {
        if skip_cond_fn(ctx_data.clone()) {
          event!(Level::INFO, step_name, "Step skipped due to 'skip_if' condition.");
          continue;
        }
      }

      let has_handlers = [&self.before, &self.on, &self.after]
        .iter()
        .any(|phase| phase.get(step_name).map_or(false, |v| !v.is_empty()));

      if !has_handlers {
        if step_def.optional {
          event!(Level::DEBUG, step_name, "Optional step has no handlers, skipping.");
          continue;
        }
        event!(Level::ERROR, step_name, "Required step has no handlers.");
        let err = Err::from(WorkflowError::HandlerMissing {
          step_name: step_def.name.clone(),
        });
        self.compensate_completed(&completed, &ctx_data).await;
        return Err(err);
      }

      let step_span = tracing::info_span!(
        "workflow_step",
        step_name,
        step_index = step_idx,
        optional = step_def.optional
      );

      match self.run_step(step_name, &ctx_data).instrument(step_span).await {
        StepOutcome::Completed => completed.push(step_name),
        StepOutcome::Halted => {
          event!(Level::INFO, step_name, "Workflow halted by handler.");
          return Ok(WorkflowResult::Halted);
        }
        StepOutcome::Failed(e) if step_def.optional => {
          event!(Level::WARN, step_name, error = %e, "Optional step failed; continuing.");
        }
        StepOutcome::Failed(e) => {
          event!(Level::ERROR, step_name, error = %e, "Required step failed.");
          self.compensate_completed(&completed, &ctx_data).await;
          return Err(e);
        }
      }
    }

    event!(Level::DEBUG, "Workflow execution completed.");
    Ok(WorkflowResult::Completed)
  }

  async fn run_step(&self, step_name: &str, ctx_data: &ContextData<TData>) -> StepOutcome<Err> {
    let phases: [(&str, Option<&Vec<Handler<TData, Err>>>); 3] = [
      ("before", self.before.get(step_name)),
      ("on", self.on.get(step_name)),
      ("after", self.after.get(step_name)),
    ];

    for (phase_name, handlers) in phases {
      let Some(handlers) = handlers else { continue };
      for (handler_idx, handler_fn) in handlers.iter().enumerate() {
        event!(Level::TRACE, phase = phase_name, handler_index = handler_idx, "Executing handler.");
        match handler_fn(ctx_data.clone()).await {
          Ok(StepControl::Continue) => {}
          Ok(StepControl::Halt) => return StepOutcome::Halted,
          Err(e) => return StepOutcome::Failed(e),
        }
      }
    }
    StepOutcome::Completed
  }

  async fn compensate_completed(&self, completed: &[&str], ctx_data: &ContextData<TData>) {
    for step_name in completed.iter().rev() {
      let Some(handlers) = self.compensations.get(*step_name) else { continue };
      event!(Level::WARN, step_name = *step_name, "Compensating completed step.");
      for handler_fn in handlers {
        if let Err(e) = handler_fn(ctx_data.clone()).await {
          // The original failure is what the caller needs to see; a failed
          // undo is left for an operator.
          event!(Level::ERROR, step_name = *step_name, error = %e, "Compensation failed.");
        }
      }
    }
  }
}
