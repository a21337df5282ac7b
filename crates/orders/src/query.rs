//! Listing options for orders.

use crate::order::Order;

/// How a listing of orders should be ordered and bounded.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OrderQuery {
    /// Most recently created first (ties broken by id, which is time-ordered).
    pub newest_first: bool,
    /// Keep at most this many orders.
    pub limit: Option<usize>,
}

impl Default for OrderQuery {
    fn default() -> Self {
        Self::all()
    }
}

impl OrderQuery {
    /// Every order, newest first.
    pub fn all() -> Self {
        Self {
            newest_first: true,
            limit: None,
        }
    }

    /// Every order, oldest first.
    pub fn oldest_first() -> Self {
        Self {
            newest_first: false,
            limit: None,
        }
    }

    /// The `n` most recently created orders.
    pub fn latest(n: usize) -> Self {
        Self {
            newest_first: true,
            limit: Some(n),
        }
    }

    /// Sort and bound an unordered snapshot of orders.
    pub fn apply(&self, mut orders: Vec<Order>) -> Vec<Order> {
        orders.sort_by_key(|o| (o.created_at(), o.id_typed()));
        if self.newest_first {
            orders.reverse();
        }
        if let Some(limit) = self.limit {
            orders.truncate(limit);
        }
        orders
    }
}
