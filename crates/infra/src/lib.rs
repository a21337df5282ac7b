//! Infrastructure layer: persistence adapters and the order lifecycle manager.

pub mod lifecycle;
pub mod store;

mod integration_tests;

pub use lifecycle::{LifecycleError, OrderLifecycleManager, StockAdjustment, Transition};
