// orderflow-server/src/state.rs
use orderflow::{AppConfig, CheckoutService};
use std::sync::Arc;

#[derive(Clone)]
pub struct AppState {
  pub checkout: Arc<CheckoutService>,
  pub config: Arc<AppConfig>, // Share loaded config
}
