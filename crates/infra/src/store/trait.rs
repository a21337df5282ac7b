use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use thiserror::Error;

use storefront_core::DomainError;
use storefront_inventory::{Product, ProductId, StockDecrement};
use storefront_orders::{Order, OrderDraft, OrderId, OrderQuery, StatusChange};

/// Persistence operation error.
///
/// `Validation`, `NotFound` and `Conflict` are deterministic and surface to
/// callers as-is; `Backend` covers storage failures (lock poisoning, SQL
/// errors, corrupt rows).
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum StoreError {
    #[error("validation failed: {0}")]
    Validation(String),

    #[error("not found")]
    NotFound,

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("storage backend error: {0}")]
    Backend(String),
}

impl From<DomainError> for StoreError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => StoreError::Validation(msg),
            DomainError::InvalidTransition(msg) => StoreError::Validation(msg),
            DomainError::NotFound => StoreError::NotFound,
            DomainError::Conflict(msg) => StoreError::Conflict(msg),
        }
    }
}

/// Result of asking the ledger to take stock out for one line item.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DecrementOutcome {
    Applied(StockDecrement),
    /// The product is not (or no longer) in the catalog; nothing changed.
    MissingProduct(ProductId),
}

/// Durable mapping from order id to order.
///
/// This is a dumb persistence layer: it validates new orders (via the domain)
/// and performs conditional status writes, but it does not decide whether a
/// transition is legal. That authority belongs to the lifecycle manager.
#[async_trait]
pub trait OrderStore: Send + Sync {
    /// Persist a fully-built order. Fails with `Conflict` if the id exists.
    async fn insert(&self, order: Order) -> Result<Order, StoreError>;

    async fn get(&self, id: OrderId) -> Result<Order, StoreError>;

    /// A finite snapshot of orders; calling again restarts from the top.
    async fn list(&self, query: OrderQuery) -> Result<Vec<Order>, StoreError>;

    /// Write the status fields only if the stored version still equals
    /// `change.expected_version`, otherwise fail with `Conflict`.
    async fn set_status(&self, id: OrderId, change: StatusChange) -> Result<Order, StoreError>;

    /// Validate a draft and persist it as a new `pending` order.
    ///
    /// Nothing is written when validation fails.
    async fn create(&self, draft: OrderDraft) -> Result<Order, StoreError> {
        let order = Order::place(draft, OrderId::generate(), Utc::now())?;
        self.insert(order).await
    }
}

/// Authoritative per-product stock counts.
///
/// `decrement` is the only stock mutation path; it clamps at zero and treats
/// an unknown product as a no-op.
#[async_trait]
pub trait InventoryLedger: Send + Sync {
    async fn product(&self, id: ProductId) -> Result<Option<Product>, StoreError>;

    async fn decrement(&self, id: ProductId, quantity: u64) -> Result<DecrementOutcome, StoreError>;

    /// Applied decrements for a product, oldest first.
    async fn movements(&self, id: ProductId) -> Result<Vec<StockDecrement>, StoreError>;
}

/// Product catalog maintenance (creating and retiring products).
///
/// Registration sets the initial stock of a new product; it never adjusts the
/// stock of an existing one.
#[async_trait]
pub trait ProductCatalog: Send + Sync {
    /// Fails with `Conflict` if the id is already registered.
    async fn register(&self, product: Product) -> Result<Product, StoreError>;

    async fn remove(&self, id: ProductId) -> Result<(), StoreError>;
}

#[async_trait]
impl<S> OrderStore for Arc<S>
where
    S: OrderStore + ?Sized,
{
    async fn insert(&self, order: Order) -> Result<Order, StoreError> {
        (**self).insert(order).await
    }

    async fn get(&self, id: OrderId) -> Result<Order, StoreError> {
        (**self).get(id).await
    }

    async fn list(&self, query: OrderQuery) -> Result<Vec<Order>, StoreError> {
        (**self).list(query).await
    }

    async fn set_status(&self, id: OrderId, change: StatusChange) -> Result<Order, StoreError> {
        (**self).set_status(id, change).await
    }
}

#[async_trait]
impl<L> InventoryLedger for Arc<L>
where
    L: InventoryLedger + ?Sized,
{
    async fn product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        (**self).product(id).await
    }

    async fn decrement(&self, id: ProductId, quantity: u64) -> Result<DecrementOutcome, StoreError> {
        (**self).decrement(id, quantity).await
    }

    async fn movements(&self, id: ProductId) -> Result<Vec<StockDecrement>, StoreError> {
        (**self).movements(id).await
    }
}

#[async_trait]
impl<C> ProductCatalog for Arc<C>
where
    C: ProductCatalog + ?Sized,
{
    async fn register(&self, product: Product) -> Result<Product, StoreError> {
        (**self).register(product).await
    }

    async fn remove(&self, id: ProductId) -> Result<(), StoreError> {
        (**self).remove(id).await
    }
}
