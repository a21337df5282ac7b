//! Order status state machine.

use serde::{Deserialize, Serialize};

use storefront_core::{DomainError, DomainResult};

/// Order status lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum OrderStatus {
    Pending,
    InProgress,
    Completed,
    Cancelled,
}

impl OrderStatus {
    pub const ALL: [OrderStatus; 4] = [
        OrderStatus::Pending,
        OrderStatus::InProgress,
        OrderStatus::Completed,
        OrderStatus::Cancelled,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            OrderStatus::Pending => "pending",
            OrderStatus::InProgress => "in-progress",
            OrderStatus::Completed => "completed",
            OrderStatus::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, OrderStatus::Completed | OrderStatus::Cancelled)
    }
}

impl core::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl core::str::FromStr for OrderStatus {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "pending" => Ok(OrderStatus::Pending),
            "in-progress" => Ok(OrderStatus::InProgress),
            "completed" => Ok(OrderStatus::Completed),
            "cancelled" => Ok(OrderStatus::Cancelled),
            other => Err(DomainError::validation(format!(
                "status must be one of: pending, in-progress, completed, cancelled (got '{other}')"
            ))),
        }
    }
}

/// Which transitions the lifecycle accepts.
///
/// - `Permissive`: any status may move to `completed` or `cancelled`, and
///   `pending` may move to `in-progress`. Terminal states can be left again
///   (a cancelled order can still be completed, and vice versa).
/// - `Strict`: same graph, but `completed` and `cancelled` are final.
///
/// Requesting the status an order already has is always accepted as a no-op.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransitionPolicy {
    #[default]
    Permissive,
    Strict,
}

impl core::str::FromStr for TransitionPolicy {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "permissive" => Ok(TransitionPolicy::Permissive),
            "strict" => Ok(TransitionPolicy::Strict),
            other => Err(DomainError::validation(format!(
                "transition policy must be 'permissive' or 'strict' (got '{other}')"
            ))),
        }
    }
}

/// Outcome of deciding a transition (no state has changed yet).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransitionPlan {
    pub from: OrderStatus,
    pub to: OrderStatus,
    /// Inventory must be decremented for every line item. The policy sets this
    /// on entry into `completed`; `Order::plan_transition` clears it again when
    /// the order's stock was already applied by an earlier completion.
    pub decrements_stock: bool,
    /// The stored status actually changes.
    pub changes_status: bool,
}

impl TransitionPolicy {
    /// Decide whether `from -> to` is allowed and what it entails.
    pub fn plan(self, from: OrderStatus, to: OrderStatus) -> DomainResult<TransitionPlan> {
        let plan = TransitionPlan {
            from,
            to,
            decrements_stock: to == OrderStatus::Completed && from != OrderStatus::Completed,
            changes_status: from != to,
        };

        if from == to {
            return Ok(plan);
        }

        if self == TransitionPolicy::Strict && from.is_terminal() {
            return Err(DomainError::invalid_transition(format!(
                "order is {from}; {from} orders cannot move to {to}"
            )));
        }

        match (from, to) {
            (_, OrderStatus::Completed) | (_, OrderStatus::Cancelled) => Ok(plan),
            (OrderStatus::Pending, OrderStatus::InProgress) => Ok(plan),
            _ => Err(DomainError::invalid_transition(format!(
                "cannot move order from {from} to {to}"
            ))),
        }
    }
}
