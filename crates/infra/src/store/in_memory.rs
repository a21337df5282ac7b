use std::collections::HashMap;
use std::sync::RwLock;

use async_trait::async_trait;

use storefront_core::AggregateRoot;
use storefront_inventory::{Product, ProductId, StockDecrement};
use storefront_orders::{Order, OrderId, OrderQuery, StatusChange};

use super::r#trait::{DecrementOutcome, InventoryLedger, OrderStore, ProductCatalog, StoreError};

fn poisoned() -> StoreError {
    StoreError::Backend("lock poisoned".to_string())
}

/// In-memory order store.
///
/// Intended for tests/dev. The conditional status write is atomic because it
/// runs entirely under the map's write lock.
#[derive(Debug, Default)]
pub struct InMemoryOrderStore {
    orders: RwLock<HashMap<OrderId, Order>>,
}

impl InMemoryOrderStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrderStore for InMemoryOrderStore {
    async fn insert(&self, order: Order) -> Result<Order, StoreError> {
        let mut orders = self.orders.write().map_err(|_| poisoned())?;
        let id = order.id_typed();
        if orders.contains_key(&id) {
            return Err(StoreError::Conflict(format!("order {id} already exists")));
        }
        orders.insert(id, order.clone());
        Ok(order)
    }

    async fn get(&self, id: OrderId) -> Result<Order, StoreError> {
        let orders = self.orders.read().map_err(|_| poisoned())?;
        orders.get(&id).cloned().ok_or(StoreError::NotFound)
    }

    async fn list(&self, query: OrderQuery) -> Result<Vec<Order>, StoreError> {
        let snapshot = {
            let orders = self.orders.read().map_err(|_| poisoned())?;
            orders.values().cloned().collect::<Vec<_>>()
        };
        Ok(query.apply(snapshot))
    }

    async fn set_status(&self, id: OrderId, change: StatusChange) -> Result<Order, StoreError> {
        let mut orders = self.orders.write().map_err(|_| poisoned())?;
        let order = orders.get_mut(&id).ok_or(StoreError::NotFound)?;
        change.expected_version.check(order.version())?;
        order.apply(&change);
        Ok(order.clone())
    }
}

#[derive(Debug, Default)]
struct LedgerState {
    products: HashMap<ProductId, Product>,
    movements: Vec<StockDecrement>,
}

/// In-memory inventory ledger + catalog.
///
/// Intended for tests/dev.
#[derive(Debug, Default)]
pub struct InMemoryInventoryLedger {
    state: RwLock<LedgerState>,
}

impl InMemoryInventoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a ledger with products (test/dev convenience).
    pub fn with_products(products: impl IntoIterator<Item = Product>) -> Self {
        let ledger = Self::new();
        if let Ok(mut state) = ledger.state.write() {
            state
                .products
                .extend(products.into_iter().map(|p| (p.id_typed(), p)));
        }
        ledger
    }
}

#[async_trait]
impl InventoryLedger for InMemoryInventoryLedger {
    async fn product(&self, id: ProductId) -> Result<Option<Product>, StoreError> {
        let state = self.state.read().map_err(|_| poisoned())?;
        Ok(state.products.get(&id).cloned())
    }

    async fn decrement(&self, id: ProductId, quantity: u64) -> Result<DecrementOutcome, StoreError> {
        let mut state = self.state.write().map_err(|_| poisoned())?;
        let Some(product) = state.products.get_mut(&id) else {
            return Ok(DecrementOutcome::MissingProduct(id));
        };
        let applied = product.decrement(quantity);
        state.movements.push(applied);
        Ok(DecrementOutcome::Applied(applied))
    }

    async fn movements(&self, id: ProductId) -> Result<Vec<StockDecrement>, StoreError> {
        let state = self.state.read().map_err(|_| poisoned())?;
        Ok(state
            .movements
            .iter()
            .filter(|m| m.product_id == id)
            .copied()
            .collect())
    }
}

#[async_trait]
impl ProductCatalog for InMemoryInventoryLedger {
    async fn register(&self, product: Product) -> Result<Product, StoreError> {
        let mut state = self.state.write().map_err(|_| poisoned())?;
        let id = product.id_typed();
        if state.products.contains_key(&id) {
            return Err(StoreError::Conflict(format!("product {id} already exists")));
        }
        state.products.insert(id, product.clone());
        Ok(product)
    }

    async fn remove(&self, id: ProductId) -> Result<(), StoreError> {
        let mut state = self.state.write().map_err(|_| poisoned())?;
        state.products.remove(&id).map(|_| ()).ok_or(StoreError::NotFound)
    }
}
