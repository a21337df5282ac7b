//! Order lifecycle orchestration.
//!
//! `OrderLifecycleManager` is the only component with authority over order
//! status. It composes an [`OrderStore`] and an [`InventoryLedger`]:
//!
//! ```text
//! transition(order_id, to)
//!   ↓
//! 1. Acquire the per-order lock (serializes transitions of one order)
//!   ↓
//! 2. Load the order (NotFound → error, no side effects)
//!   ↓
//! 3. Plan the transition under the configured policy (pure)
//!   ↓
//! 4. Conditionally persist the status (expected version = loaded version)
//!   ↓
//! 5. Only if step 4 won and the plan says so: decrement stock per line item
//! ```
//!
//! Stock is taken out at most once per order: the plan only asks for it on the
//! order's first entry into `completed`, and the decrement runs only after the
//! conditional write reports that this caller performed that entry. Losing the
//! write race surfaces as `Conflict` with no inventory effect.
//!
//! Decrements are best-effort per line: a missing product or a ledger failure
//! is logged and recorded in the returned [`Transition`], and the remaining
//! lines are still applied.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use chrono::Utc;
use serde::Serialize;
use thiserror::Error;
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::{debug, info, warn};

use storefront_core::DomainError;
use storefront_inventory::ProductId;
use storefront_orders::{
    Order, OrderDraft, OrderId, OrderQuery, OrderStatus, OrderSummary, TransitionPolicy,
};

use crate::store::{DecrementOutcome, InventoryLedger, OrderStore, StoreError};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum LifecycleError {
    /// Malformed or missing input (order placement, status names).
    #[error("validation failed: {0}")]
    Validation(String),
    /// The requested status change is not allowed by the transition policy.
    #[error("invalid transition: {0}")]
    InvalidTransition(String),
    #[error("order not found")]
    NotFound,
    /// Another writer changed the order first.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Persistence failed.
    #[error("store error: {0}")]
    Store(String),
}

impl From<StoreError> for LifecycleError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::Validation(msg) => LifecycleError::Validation(msg),
            StoreError::NotFound => LifecycleError::NotFound,
            StoreError::Conflict(msg) => LifecycleError::Conflict(msg),
            StoreError::Backend(msg) => LifecycleError::Store(msg),
        }
    }
}

impl From<DomainError> for LifecycleError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => {
                LifecycleError::Validation(msg)
            }
            DomainError::InvalidTransition(msg) => LifecycleError::InvalidTransition(msg),
            DomainError::NotFound => LifecycleError::NotFound,
            DomainError::Conflict(msg) => LifecycleError::Conflict(msg),
        }
    }
}

/// What happened to one line item's stock during a completion.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum StockAdjustment {
    Applied {
        product_id: ProductId,
        quantity: u64,
        previous: u64,
        current: u64,
        clamped: bool,
    },
    MissingProduct {
        product_id: ProductId,
        quantity: u64,
    },
    Failed {
        product_id: ProductId,
        quantity: u64,
        reason: String,
    },
}

/// Result of a successful transition request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub order: Order,
    pub previous_status: OrderStatus,
    /// One entry per line item when this call completed the order for the
    /// first time, otherwise empty.
    pub adjustments: Vec<StockAdjustment>,
}

type LockMap = Mutex<HashMap<OrderId, Arc<AsyncMutex<()>>>>;

/// Per-order async locks. Entries are dropped once nobody holds or awaits them.
#[derive(Debug, Default)]
struct OrderLocks {
    inner: Arc<LockMap>,
}

struct OrderLockGuard {
    id: OrderId,
    map: Arc<LockMap>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl OrderLocks {
    async fn acquire(&self, id: OrderId) -> OrderLockGuard {
        let lock = {
            let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            map.entry(id).or_default().clone()
        };
        let guard = lock.lock_owned().await;
        OrderLockGuard {
            id,
            map: self.inner.clone(),
            guard: Some(guard),
        }
    }

    #[cfg(test)]
    fn len(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }
}

impl Drop for OrderLockGuard {
    fn drop(&mut self) {
        let mut map = self.map.lock().unwrap_or_else(PoisonError::into_inner);
        // One reference in the map, one inside our guard: nobody else is waiting.
        if map.get(&self.id).is_some_and(|l| Arc::strong_count(l) == 2) {
            map.remove(&self.id);
        }
        self.guard.take();
    }
}

/// Orchestrates order placement and status transitions.
///
/// Generic over the persistence collaborators so tests use in-memory stores and
/// production swaps in Postgres without touching this logic.
#[derive(Debug)]
pub struct OrderLifecycleManager<S, L> {
    orders: S,
    ledger: L,
    policy: TransitionPolicy,
    locks: OrderLocks,
}

impl<S, L> OrderLifecycleManager<S, L> {
    pub fn new(orders: S, ledger: L) -> Self {
        Self::with_policy(orders, ledger, TransitionPolicy::default())
    }

    pub fn with_policy(orders: S, ledger: L, policy: TransitionPolicy) -> Self {
        Self {
            orders,
            ledger,
            policy,
            locks: OrderLocks::default(),
        }
    }

    pub fn policy(&self) -> TransitionPolicy {
        self.policy
    }

    pub fn orders(&self) -> &S {
        &self.orders
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }
}

impl<S, L> OrderLifecycleManager<S, L>
where
    S: OrderStore,
    L: InventoryLedger,
{
    /// Validate and persist a new `pending` order.
    pub async fn create_order(&self, draft: OrderDraft) -> Result<Order, LifecycleError> {
        let order = self.orders.create(draft).await?;
        info!(
            order_id = %order.id_typed(),
            user = %order.user(),
            items = order.items().len(),
            total_amount = order.total_amount(),
            "order created"
        );
        Ok(order)
    }

    pub async fn get_order(&self, id: OrderId) -> Result<Order, LifecycleError> {
        Ok(self.orders.get(id).await?)
    }

    pub async fn list_orders(&self, query: OrderQuery) -> Result<Vec<Order>, LifecycleError> {
        Ok(self.orders.list(query).await?)
    }

    /// The `n` most recently created orders.
    pub async fn latest_orders(&self, n: usize) -> Result<Vec<Order>, LifecycleError> {
        self.list_orders(OrderQuery::latest(n)).await
    }

    /// Counts per status and completed revenue over all orders.
    pub async fn summary(&self) -> Result<OrderSummary, LifecycleError> {
        let orders = self.orders.list(OrderQuery::all()).await?;
        Ok(orders.iter().collect())
    }

    /// Move an order to `to`, taking stock out of inventory on its first
    /// completion.
    pub async fn transition(
        &self,
        id: OrderId,
        to: OrderStatus,
    ) -> Result<Transition, LifecycleError> {
        let _lock = self.locks.acquire(id).await;

        let order = self.orders.get(id).await?;
        let plan = order.plan_transition(to, self.policy)?;

        if !plan.changes_status {
            debug!(order_id = %id, status = %to, "order already in requested status");
            return Ok(Transition {
                previous_status: order.status(),
                order,
                adjustments: Vec::new(),
            });
        }

        let change = order.status_change(&plan, Utc::now());
        let updated = match self.orders.set_status(id, change).await {
            Ok(updated) => updated,
            Err(StoreError::Conflict(msg)) => {
                warn!(order_id = %id, to = %to, "concurrent status change detected: {msg}");
                return Err(LifecycleError::Conflict(msg));
            }
            Err(e) => return Err(e.into()),
        };

        let adjustments = if plan.decrements_stock {
            self.take_stock(&updated).await
        } else {
            Vec::new()
        };

        info!(
            order_id = %id,
            from = %plan.from,
            to = %plan.to,
            stock_lines = adjustments.len(),
            "order status changed"
        );

        Ok(Transition {
            order: updated,
            previous_status: plan.from,
            adjustments,
        })
    }

    /// Convenience for `transition(id, Cancelled)`. Never restores stock.
    pub async fn cancel(&self, id: OrderId) -> Result<Transition, LifecycleError> {
        self.transition(id, OrderStatus::Cancelled).await
    }

    async fn take_stock(&self, order: &Order) -> Vec<StockAdjustment> {
        let order_id = order.id_typed();
        let mut adjustments = Vec::with_capacity(order.items().len());

        for item in order.items() {
            let product_id = item.product_id;
            let quantity = u64::from(item.quantity);

            let adjustment = match self.ledger.decrement(product_id, quantity).await {
                Ok(DecrementOutcome::Applied(d)) => {
                    if d.clamped() {
                        warn!(
                            %order_id, %product_id, requested = quantity, available = d.previous,
                            "oversold: stock clamped to zero"
                        );
                    } else {
                        debug!(%order_id, %product_id, quantity, remaining = d.current, "stock decremented");
                    }
                    StockAdjustment::Applied {
                        product_id,
                        quantity,
                        previous: d.previous,
                        current: d.current,
                        clamped: d.clamped(),
                    }
                }
                Ok(DecrementOutcome::MissingProduct(_)) => {
                    warn!(
                        %order_id, %product_id, quantity,
                        "order references a product missing from the catalog; skipping stock decrement"
                    );
                    StockAdjustment::MissingProduct {
                        product_id,
                        quantity,
                    }
                }
                Err(e) => {
                    warn!(%order_id, %product_id, quantity, error = %e, "stock decrement failed");
                    StockAdjustment::Failed {
                        product_id,
                        quantity,
                        reason: e.to_string(),
                    }
                }
            };
            adjustments.push(adjustment);
        }

        adjustments
    }
}
