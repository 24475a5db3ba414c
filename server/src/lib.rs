// orderflow-server/src/lib.rs

//! HTTP surface of the checkout service.

pub mod errors;
pub mod state;
pub mod web;

pub use errors::ApiError;
pub use state::AppState;
