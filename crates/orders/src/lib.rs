//! Orders domain module.
//!
//! This crate contains business rules for storefront orders: placement
//! validation, the status state machine and its inventory side-effect rule,
//! implemented purely as deterministic domain logic (no IO, no HTTP, no storage).

pub mod order;
pub mod query;
pub mod status;
pub mod summary;

pub use order::{
    LineItem, LineItemDraft, Order, OrderDraft, OrderId, OrderParts, PaymentMethod, StatusChange,
    UserRef,
};
pub use query::OrderQuery;
pub use status::{OrderStatus, TransitionPlan, TransitionPolicy};
pub use summary::OrderSummary;
