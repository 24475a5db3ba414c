// orderflow/src/workflow/registry.rs

//! Defines `WorkflowRegistry<E>`, a type-keyed registry for managing and
//! executing workflows. Each workflow is keyed by the `TypeId` of its context
//! data, so running a context finds "its" workflow without naming it.

use crate::workflow::context::ContextData;
use crate::workflow::control::WorkflowResult;
use crate::workflow::definition::Workflow;
use crate::workflow::error::WorkflowError;

use async_trait::async_trait;
use parking_lot::RwLock;
use std::any::{Any, TypeId};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::sync::Arc;
use tracing::{event, instrument, Level};

/// Type-erased runner stored in the registry.
#[async_trait]
trait ErasedWorkflow<AppErr>: Send + Sync
where
  AppErr: std::error::Error + Send + Sync + 'static,
{
  fn name(&self) -> &str;

  /// `ctx_obj` must be a `Box<ContextData<TData>>` for the wrapped workflow.
  async fn run_erased(&self, ctx_obj: Box<dyn Any + Send>) -> Result<WorkflowResult, AppErr>;
}

struct WorkflowRunner<TData, HandlerErr, AppErr>
where
  TData: 'static + Send + Sync,
  HandlerErr: std::error::Error + From<WorkflowError> + Send + Sync + 'static,
  AppErr: std::error::Error + From<HandlerErr> + From<WorkflowError> + Send + Sync + 'static,
{
  workflow: Arc<Workflow<TData, HandlerErr>>,
  _phantom_app_err: PhantomData<fn() -> AppErr>,
}

#[async_trait]
impl<TData, HandlerErr, AppErr> ErasedWorkflow<AppErr> for WorkflowRunner<TData, HandlerErr, AppErr>
where
  TData: 'static + Send + Sync,
  HandlerErr: std::error::Error + From<WorkflowError> + Send + Sync + 'static,
  AppErr: std::error::Error + From<HandlerErr> + From<WorkflowError> + Send + Sync + 'static,
{
  fn name(&self) -> &str {
    self.workflow.name()
  }

  async fn run_erased(&self, ctx_obj: Box<dyn Any + Send>) -> Result<WorkflowResult, AppErr> {
    let typed_ctx_data = match ctx_obj.downcast::<ContextData<TData>>() {
      Ok(boxed) => *boxed,
      Err(_) => {
        let expected_type = std::any::type_name::<ContextData<TData>>();
        event!(Level::ERROR, %expected_type, "Context object type mismatch in registry dispatch.");
        return Err(AppErr::from(WorkflowError::TypeMismatch {
          location: "registry_dispatch".to_string(),
          expected_type: expected_type.to_string(),
        }));
      }
    };
    self.workflow.run(typed_ctx_data).await.map_err(AppErr::from)
  }
}

/// Registry of workflows returning `AppErr`.
pub struct WorkflowRegistry<AppErr = WorkflowError>
where
  AppErr: std::error::Error + From<WorkflowError> + Send + Sync + 'static,
{
  registry: RwLock<HashMap<TypeId, Arc<dyn ErasedWorkflow<AppErr>>>>,
}

impl<AppErr> Default for WorkflowRegistry<AppErr>
where
  AppErr: std::error::Error + From<WorkflowError> + Send + Sync + 'static,
{
  fn default() -> Self {
    Self::new()
  }
}

impl<AppErr> WorkflowRegistry<AppErr>
where
  AppErr: std::error::Error + From<WorkflowError> + Send + Sync + 'static,
{
  pub fn new() -> Self {
    Self {
      registry: RwLock::new(HashMap::new()),
    }
  }

  /// Registers `workflow` for its context data type, replacing any earlier one.
  pub fn register<TData, HandlerErr>(&self, workflow: Workflow<TData, HandlerErr>)
  where
    TData: 'static + Send + Sync,
    HandlerErr: std::error::Error + From<WorkflowError> + Send + Sync + 'static,
    AppErr: From<HandlerErr>,
  {
    event!(
      Level::DEBUG,
      workflow = %workflow.name(),
      tdata_type = %std::any::type_name::<TData>(),
      "Registering workflow."
    );
    let runner = WorkflowRunner::<TData, HandlerErr, AppErr> {
      workflow: Arc::new(workflow),
      _phantom_app_err: PhantomData,
    };
    self.registry.write().insert(TypeId::of::<TData>(), Arc::new(runner));
  }

  /// Names of the registered workflows, sorted.
  pub fn registered_names(&self) -> Vec<String> {
    let mut names: Vec<String> = self.registry.read().values().map(|r| r.name().to_string()).collect();
    names.sort();
    names
  }

  /// Runs the workflow registered for `TData`.
  #[instrument(name = "WorkflowRegistry::run", skip_all, fields(tdata_type = %std::any::type_name::<TData>()))]
  pub async fn run<TData>(&self, ctx_data: ContextData<TData>) -> Result<WorkflowResult, AppErr>
  where
    TData: 'static + Send + Sync,
  {
    let runner = self.registry.read().get(&TypeId::of::<TData>()).cloned().ok_or_else(|| {
      let type_name = std::any::type_name::<TData>();
      event!(Level::ERROR, "No workflow registered for {}.", type_name);
      AppErr::from(WorkflowError::NotRegistered {
        type_name: type_name.to_string(),
      })
    })?;

    runner.run_erased(Box::new(ctx_data)).await
  }
}
