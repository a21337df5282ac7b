//! Integration tests for the order lifecycle.
//!
//! Tests: OrderLifecycleManager → OrderStore + InventoryLedger
//!
//! Verifies:
//! - Completion takes stock out exactly once per order
//! - Oversold stock clamps at zero
//! - Cancellation and unknown orders leave inventory untouched
//! - Concurrent completions of one order decrement once

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use async_trait::async_trait;

    use storefront_inventory::{Product, ProductId, StockDecrement};
    use storefront_orders::{
        LineItemDraft, Order, OrderDraft, OrderId, OrderQuery, OrderStatus, StatusChange,
        TransitionPolicy,
    };

    use crate::lifecycle::{LifecycleError, OrderLifecycleManager, StockAdjustment};
    use crate::store::{
        DecrementOutcome, InMemoryInventoryLedger, InMemoryOrderStore, InventoryLedger,
        OrderStore, StoreError,
    };

    type Manager = OrderLifecycleManager<Arc<InMemoryOrderStore>, Arc<InMemoryInventoryLedger>>;

    fn product(name: &str, stock: u64) -> Product {
        Product::new(ProductId::generate(), name, stock).unwrap()
    }

    fn draft(lines: &[(ProductId, i64)]) -> OrderDraft {
        OrderDraft {
            user: "user-42".to_string(),
            items: lines
                .iter()
                .map(|(id, quantity)| LineItemDraft {
                    product_id: id.to_string(),
                    quantity: *quantity,
                    unit_price: 250,
                })
                .collect(),
            total_amount: lines.iter().map(|(_, q)| q * 250).sum(),
            payment_method: "card".to_string(),
            shipping_address: "1 Market Street".to_string(),
        }
    }

    fn setup(products: Vec<Product>, policy: TransitionPolicy) -> Manager {
        let orders = Arc::new(InMemoryOrderStore::new());
        let ledger = Arc::new(InMemoryInventoryLedger::with_products(products));
        OrderLifecycleManager::with_policy(orders, ledger, policy)
    }

    async fn stock_of(manager: &Manager, id: ProductId) -> u64 {
        manager.ledger().product(id).await.unwrap().unwrap().stock()
    }

    #[tokio::test]
    async fn completing_an_order_takes_stock_out() {
        let widget = product("Widget", 5);
        let widget_id = widget.id_typed();
        let manager = setup(vec![widget], TransitionPolicy::Permissive);

        let order = manager.create_order(draft(&[(widget_id, 3)])).await.unwrap();
        assert_eq!(order.status(), OrderStatus::Pending);
        assert_eq!(stock_of(&manager, widget_id).await, 5);

        let t = manager
            .transition(order.id_typed(), OrderStatus::Completed)
            .await
            .unwrap();

        assert_eq!(t.previous_status, OrderStatus::Pending);
        assert_eq!(t.order.status(), OrderStatus::Completed);
        assert!(t.order.stock_applied_at().is_some());
        assert_eq!(
            t.adjustments,
            vec![StockAdjustment::Applied {
                product_id: widget_id,
                quantity: 3,
                previous: 5,
                current: 2,
                clamped: false,
            }]
        );
        assert_eq!(stock_of(&manager, widget_id).await, 2);
    }

    #[tokio::test]
    async fn repeating_completion_does_not_decrement_again() {
        let widget = product("Widget", 5);
        let widget_id = widget.id_typed();
        let manager = setup(vec![widget], TransitionPolicy::Permissive);
        let order = manager.create_order(draft(&[(widget_id, 3)])).await.unwrap();

        manager.transition(order.id_typed(), OrderStatus::Completed).await.unwrap();
        let again = manager
            .transition(order.id_typed(), OrderStatus::Completed)
            .await
            .unwrap();

        assert!(again.adjustments.is_empty());
        assert_eq!(again.order.status(), OrderStatus::Completed);
        assert_eq!(stock_of(&manager, widget_id).await, 2);
        assert_eq!(manager.ledger().movements(widget_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn oversold_stock_clamps_at_zero() {
        let widget = product("Widget", 2);
        let widget_id = widget.id_typed();
        let manager = setup(vec![widget], TransitionPolicy::Permissive);
        let order = manager.create_order(draft(&[(widget_id, 5)])).await.unwrap();

        let t = manager
            .transition(order.id_typed(), OrderStatus::Completed)
            .await
            .unwrap();

        assert!(matches!(
            t.adjustments[0],
            StockAdjustment::Applied { previous: 2, current: 0, clamped: true, .. }
        ));
        assert_eq!(stock_of(&manager, widget_id).await, 0);
    }

    #[tokio::test]
    async fn cancelling_never_touches_inventory() {
        let widget = product("Widget", 5);
        let widget_id = widget.id_typed();
        let manager = setup(vec![widget], TransitionPolicy::Permissive);
        let order = manager.create_order(draft(&[(widget_id, 3)])).await.unwrap();

        manager.transition(order.id_typed(), OrderStatus::InProgress).await.unwrap();
        let t = manager.cancel(order.id_typed()).await.unwrap();

        assert_eq!(t.previous_status, OrderStatus::InProgress);
        assert_eq!(t.order.status(), OrderStatus::Cancelled);
        assert!(t.adjustments.is_empty());
        assert_eq!(stock_of(&manager, widget_id).await, 5);
    }

    #[tokio::test]
    async fn cancelling_a_completed_order_does_not_restore_stock() {
        let widget = product("Widget", 5);
        let widget_id = widget.id_typed();
        let manager = setup(vec![widget], TransitionPolicy::Permissive);
        let order = manager.create_order(draft(&[(widget_id, 3)])).await.unwrap();

        manager.transition(order.id_typed(), OrderStatus::Completed).await.unwrap();
        manager.cancel(order.id_typed()).await.unwrap();
        assert_eq!(stock_of(&manager, widget_id).await, 2);

        // Completing again after a cancellation must not take stock out twice.
        let t = manager
            .transition(order.id_typed(), OrderStatus::Completed)
            .await
            .unwrap();
        assert!(t.adjustments.is_empty());
        assert_eq!(stock_of(&manager, widget_id).await, 2);
    }

    #[tokio::test]
    async fn unknown_order_is_not_found_and_changes_nothing() {
        let widget = product("Widget", 5);
        let widget_id = widget.id_typed();
        let manager = setup(vec![widget], TransitionPolicy::Permissive);

        let err = manager
            .transition(OrderId::generate(), OrderStatus::Completed)
            .await
            .unwrap_err();

        assert_eq!(err, LifecycleError::NotFound);
        assert_eq!(stock_of(&manager, widget_id).await, 5);
        assert!(manager.list_orders(OrderQuery::all()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn missing_product_is_skipped_and_order_still_completes() {
        let widget = product("Widget", 5);
        let widget_id = widget.id_typed();
        let ghost = ProductId::generate();
        let manager = setup(vec![widget], TransitionPolicy::Permissive);
        let order = manager
            .create_order(draft(&[(ghost, 1), (widget_id, 2)]))
            .await
            .unwrap();

        let t = manager
            .transition(order.id_typed(), OrderStatus::Completed)
            .await
            .unwrap();

        assert_eq!(t.order.status(), OrderStatus::Completed);
        assert_eq!(
            t.adjustments[0],
            StockAdjustment::MissingProduct { product_id: ghost, quantity: 1 }
        );
        assert_eq!(stock_of(&manager, widget_id).await, 3);
    }

    #[tokio::test]
    async fn invalid_draft_creates_nothing() {
        let manager = setup(vec![], TransitionPolicy::Permissive);
        let mut bad = draft(&[(ProductId::generate(), 1)]);
        bad.shipping_address.clear();

        let err = manager.create_order(bad).await.unwrap_err();
        assert!(matches!(err, LifecycleError::Validation(_)));
        assert!(manager.list_orders(OrderQuery::all()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn strict_policy_rejects_leaving_terminal_states() {
        let widget = product("Widget", 5);
        let widget_id = widget.id_typed();
        let manager = setup(vec![widget], TransitionPolicy::Strict);
        let order = manager.create_order(draft(&[(widget_id, 1)])).await.unwrap();

        manager.cancel(order.id_typed()).await.unwrap();
        let err = manager
            .transition(order.id_typed(), OrderStatus::Completed)
            .await
            .unwrap_err();

        assert!(matches!(err, LifecycleError::InvalidTransition(_)));
        assert_eq!(stock_of(&manager, widget_id).await, 5);
        let stored = manager.get_order(order.id_typed()).await.unwrap();
        assert_eq!(stored.status(), OrderStatus::Cancelled);
    }

    #[tokio::test]
    async fn moving_back_to_pending_is_rejected() {
        let manager = setup(vec![], TransitionPolicy::Permissive);
        let order = manager
            .create_order(draft(&[(ProductId::generate(), 1)]))
            .await
            .unwrap();
        manager.transition(order.id_typed(), OrderStatus::InProgress).await.unwrap();

        let err = manager
            .transition(order.id_typed(), OrderStatus::Pending)
            .await
            .unwrap_err();
        assert!(matches!(err, LifecycleError::InvalidTransition(_)));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_completions_decrement_once() {
        let widget = product("Widget", 100);
        let widget_id = widget.id_typed();
        let manager = Arc::new(setup(vec![widget], TransitionPolicy::Permissive));
        let order = manager.create_order(draft(&[(widget_id, 7)])).await.unwrap();

        let handles: Vec<_> = (0..16)
            .map(|_| {
                let manager = manager.clone();
                let id = order.id_typed();
                tokio::spawn(async move { manager.transition(id, OrderStatus::Completed).await })
            })
            .collect();

        let mut decrementing_calls = 0;
        for handle in handles {
            let t = handle.await.unwrap().unwrap();
            assert_eq!(t.order.status(), OrderStatus::Completed);
            if !t.adjustments.is_empty() {
                decrementing_calls += 1;
            }
        }

        assert_eq!(decrementing_calls, 1);
        assert_eq!(stock_of(&manager, widget_id).await, 93);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_completions_across_managers_decrement_once() {
        // Two managers over the same stores do not share locks; the conditional
        // write alone must keep the decrement single.
        let widget = product("Widget", 10);
        let widget_id = widget.id_typed();
        let orders = Arc::new(InMemoryOrderStore::new());
        let ledger = Arc::new(InMemoryInventoryLedger::with_products([widget]));
        let a = Arc::new(OrderLifecycleManager::new(orders.clone(), ledger.clone()));
        let b = Arc::new(OrderLifecycleManager::new(orders.clone(), ledger.clone()));
        let order = a.create_order(draft(&[(widget_id, 4)])).await.unwrap();
        let id = order.id_typed();

        let mut handles = Vec::new();
        for i in 0..16 {
            let m = if i % 2 == 0 { a.clone() } else { b.clone() };
            handles.push(tokio::spawn(async move {
                m.transition(id, OrderStatus::Completed).await
            }));
        }

        for handle in handles {
            match handle.await.unwrap() {
                Ok(_) | Err(LifecycleError::Conflict(_)) => {}
                Err(other) => panic!("unexpected error: {other}"),
            }
        }

        let stock = ledger.product(widget_id).await.unwrap().unwrap().stock();
        assert_eq!(stock, 6);
        assert_eq!(ledger.movements(widget_id).await.unwrap().len(), 1);
    }

    /// Order store that lets another writer win the race on the first write.
    struct RacingOrderStore {
        inner: InMemoryOrderStore,
        raced: std::sync::atomic::AtomicBool,
    }

    #[async_trait]
    impl OrderStore for RacingOrderStore {
        async fn insert(&self, order: Order) -> Result<Order, StoreError> {
            self.inner.insert(order).await
        }

        async fn get(&self, id: OrderId) -> Result<Order, StoreError> {
            self.inner.get(id).await
        }

        async fn list(&self, query: OrderQuery) -> Result<Vec<Order>, StoreError> {
            self.inner.list(query).await
        }

        async fn set_status(&self, id: OrderId, change: StatusChange) -> Result<Order, StoreError> {
            if !self.raced.swap(true, std::sync::atomic::Ordering::SeqCst) {
                self.inner.set_status(id, change.clone()).await?;
            }
            self.inner.set_status(id, change).await
        }
    }

    #[tokio::test]
    async fn losing_the_write_race_is_a_conflict_without_decrement() {
        let widget = product("Widget", 5);
        let widget_id = widget.id_typed();
        let orders = RacingOrderStore {
            inner: InMemoryOrderStore::new(),
            raced: std::sync::atomic::AtomicBool::new(false),
        };
        let ledger = Arc::new(InMemoryInventoryLedger::with_products([widget]));
        let manager = OrderLifecycleManager::new(orders, ledger.clone());
        let order = manager.create_order(draft(&[(widget_id, 3)])).await.unwrap();

        let err = manager
            .transition(order.id_typed(), OrderStatus::Completed)
            .await
            .unwrap_err();

        assert!(matches!(err, LifecycleError::Conflict(_)));
        assert_eq!(ledger.product(widget_id).await.unwrap().unwrap().stock(), 5);
    }

    /// Ledger whose decrements always fail.
    struct BrokenLedger;

    #[async_trait]
    impl InventoryLedger for BrokenLedger {
        async fn product(&self, _id: ProductId) -> Result<Option<Product>, StoreError> {
            Ok(None)
        }

        async fn decrement(&self, _id: ProductId, _q: u64) -> Result<DecrementOutcome, StoreError> {
            Err(StoreError::Backend("ledger offline".to_string()))
        }

        async fn movements(&self, _id: ProductId) -> Result<Vec<StockDecrement>, StoreError> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn ledger_failures_are_reported_but_completion_stands() {
        let manager = OrderLifecycleManager::new(InMemoryOrderStore::new(), BrokenLedger);
        let a = ProductId::generate();
        let b = ProductId::generate();
        let order = manager.create_order(draft(&[(a, 1), (b, 2)])).await.unwrap();

        let t = manager
            .transition(order.id_typed(), OrderStatus::Completed)
            .await
            .unwrap();

        assert_eq!(t.order.status(), OrderStatus::Completed);
        assert_eq!(t.adjustments.len(), 2);
        assert!(t
            .adjustments
            .iter()
            .all(|adj| matches!(adj, StockAdjustment::Failed { .. })));
    }

    #[tokio::test]
    async fn latest_orders_and_summary_reflect_the_store() {
        let widget = product("Widget", 50);
        let widget_id = widget.id_typed();
        let manager = setup(vec![widget], TransitionPolicy::Permissive);

        let mut ids = Vec::new();
        for q in 1..=6 {
            let order = manager.create_order(draft(&[(widget_id, q)])).await.unwrap();
            ids.push(order.id_typed());
            tokio::time::sleep(std::time::Duration::from_millis(2)).await;
        }
        manager.transition(ids[0], OrderStatus::Completed).await.unwrap();
        manager.cancel(ids[1]).await.unwrap();
        manager.transition(ids[2], OrderStatus::InProgress).await.unwrap();

        let latest = manager.latest_orders(5).await.unwrap();
        assert_eq!(latest.len(), 5);
        assert_eq!(latest[0].id_typed(), ids[5]);
        assert_eq!(latest[4].id_typed(), ids[1]);

        let summary = manager.summary().await.unwrap();
        assert_eq!(summary.total, 6);
        assert_eq!(summary.pending, 3);
        assert_eq!(summary.in_progress, 1);
        assert_eq!(summary.completed, 1);
        assert_eq!(summary.cancelled, 1);
        assert_eq!(summary.completed_revenue, 250);
    }
}
