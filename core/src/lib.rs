// orderflow/src/lib.rs

//! Orderflow: checkout workflows for a storefront.
//!
//! Orders are submitted, paid through a pluggable payment provider and
//! mirrored into an external, human-editable ledger. Each checkout stage is a
//! workflow of named steps run by the small engine in [`workflow`]:
//!  - Order submission validates and prices the cart, then writes the order
//!    and its items under a compensating saga.
//!  - Payment initiation opens a transaction carrying the order id.
//!  - Payment verification confirms the transaction with the provider and
//!    marks the order paid.
//!
//! Ledger writes go through a transactional outbox drained by
//! [`sync::OutboxRelay`] with retries and backoff.

pub mod checkout;
pub mod config;
pub mod error;
pub mod models;
pub mod payment;
pub mod store;
pub mod sync;
pub mod workflow;

// --- Re-exports for the Public API ---

pub use crate::checkout::{CheckoutDeps, CheckoutService, CreateOrderRequest, InitiatePaymentRequest, ReconcileReport};
pub use crate::config::AppConfig;
pub use crate::error::{AppError, Result};
pub use crate::models::{CartLine, Currency, Order, OrderItem, OrderStatus, StatusOrigin};
pub use crate::payment::{PaymentGateway, PaymentHandle, PaymentProvider, ProviderKind};
pub use crate::workflow::{ContextData, StepControl, Workflow, WorkflowError, WorkflowRegistry, WorkflowResult};
