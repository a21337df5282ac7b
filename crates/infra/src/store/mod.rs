//! Persistence boundary for orders and inventory.
//!
//! The lifecycle manager only talks to these traits. In-memory implementations
//! back tests/dev; Postgres implementations are behind the `postgres` feature.

pub mod in_memory;
#[cfg(feature = "postgres")]
pub mod postgres;
pub mod r#trait;

pub use in_memory::{InMemoryInventoryLedger, InMemoryOrderStore};
#[cfg(feature = "postgres")]
pub use postgres::{PostgresInventoryLedger, PostgresOrderStore};
pub use r#trait::{DecrementOutcome, InventoryLedger, OrderStore, ProductCatalog, StoreError};
