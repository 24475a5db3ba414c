// orderflow/src/models/mod.rs

//! Data structures for orders, their items and payment attempts.

pub mod money;
pub mod order;
pub mod order_item;
pub mod payment;

pub use money::Currency;
pub use order::{new_order_number, Order, OrderStatus, StatusOrigin};
pub use order_item::{CartLine, OrderItem};
pub use payment::PaymentAttempt;
