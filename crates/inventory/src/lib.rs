//! Inventory domain module.
//!
//! Business rules for per-product stock, implemented purely as deterministic
//! domain logic (no IO, no HTTP, no storage). Storage-backed ledgers live in
//! `storefront-infra` and delegate the arithmetic to this crate.

pub mod product;

pub use product::{Product, ProductId, StockDecrement};
