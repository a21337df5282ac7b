//! Dashboard roll-up over a set of orders.

use serde::Serialize;

use crate::order::Order;
use crate::status::OrderStatus;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct OrderSummary {
    pub total: u64,
    pub pending: u64,
    pub in_progress: u64,
    pub completed: u64,
    pub cancelled: u64,
    /// Sum of `total_amount` over completed orders.
    pub completed_revenue: u64,
}

impl OrderSummary {
    pub fn record(&mut self, order: &Order) {
        self.total += 1;
        match order.status() {
            OrderStatus::Pending => self.pending += 1,
            OrderStatus::InProgress => self.in_progress += 1,
            OrderStatus::Completed => {
                self.completed += 1;
                self.completed_revenue = self.completed_revenue.saturating_add(order.total_amount());
            }
            OrderStatus::Cancelled => self.cancelled += 1,
        }
    }
}

impl<'a> FromIterator<&'a Order> for OrderSummary {
    fn from_iter<I: IntoIterator<Item = &'a Order>>(iter: I) -> Self {
        let mut summary = OrderSummary::default();
        for order in iter {
            summary.record(order);
        }
        summary
    }
}
