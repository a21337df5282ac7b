use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storefront_core::{AggregateId, AggregateRoot, DomainError, DomainResult, ExpectedVersion, ValueObject};
use storefront_inventory::ProductId;

use crate::status::{OrderStatus, TransitionPlan, TransitionPolicy};

/// Order identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrderId(pub AggregateId);

storefront_core::impl_aggregate_id_newtype!(OrderId);

/// Opaque reference to the customer who placed the order.
///
/// Accounts live outside this system; the reference is stored verbatim.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserRef(String);

impl UserRef {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl core::fmt::Display for UserRef {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod {
    Cash,
    Card,
    Online,
}

impl PaymentMethod {
    pub fn as_str(self) -> &'static str {
        match self {
            PaymentMethod::Cash => "cash",
            PaymentMethod::Card => "card",
            PaymentMethod::Online => "online",
        }
    }
}

impl core::str::FromStr for PaymentMethod {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "cash" => Ok(PaymentMethod::Cash),
            "card" => Ok(PaymentMethod::Card),
            "online" => Ok(PaymentMethod::Online),
            "" => Err(DomainError::validation("payment_method is required")),
            other => Err(DomainError::validation(format!(
                "payment_method must be one of: cash, card, online (got '{other}')"
            ))),
        }
    }
}

/// Order line: product, quantity, and the unit price captured at placement.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LineItem {
    pub product_id: ProductId,
    pub quantity: u32,
    /// Price in smallest currency unit (e.g., cents).
    pub unit_price: u64,
}

impl ValueObject for LineItem {}

impl LineItem {
    pub fn line_total(&self) -> u64 {
        self.unit_price.saturating_mul(u64::from(self.quantity))
    }
}

/// Unvalidated line item as submitted by a caller.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LineItemDraft {
    pub product_id: String,
    pub quantity: i64,
    pub unit_price: i64,
}

/// Unvalidated order placement request.
///
/// Every field defaults when absent so that missing input surfaces as a
/// domain validation error rather than a deserialization failure.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OrderDraft {
    pub user: String,
    pub items: Vec<LineItemDraft>,
    pub total_amount: i64,
    pub payment_method: String,
    pub shipping_address: String,
}

impl LineItemDraft {
    fn validate(&self, idx: usize) -> DomainResult<LineItem> {
        let product_id = self
            .product_id
            .trim()
            .parse::<ProductId>()
            .map_err(|e| DomainError::validation(format!("items[{idx}].product_id: {e}")))?;

        let quantity = u32::try_from(self.quantity)
            .ok()
            .filter(|q| *q > 0)
            .ok_or_else(|| DomainError::validation(format!("items[{idx}].quantity must be positive")))?;

        let unit_price = u64::try_from(self.unit_price)
            .ok()
            .filter(|p| *p > 0)
            .ok_or_else(|| DomainError::validation(format!("items[{idx}].unit_price must be positive")))?;

        Ok(LineItem {
            product_id,
            quantity,
            unit_price,
        })
    }
}

/// Aggregate root: Order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Order {
    id: OrderId,
    user: UserRef,
    items: Vec<LineItem>,
    total_amount: u64,
    payment_method: PaymentMethod,
    shipping_address: String,
    status: OrderStatus,
    /// Set once, when line items were first taken out of inventory.
    stock_applied_at: Option<DateTime<Utc>>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    version: u64,
}

/// All persisted fields of an order, used by stores to rehydrate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderParts {
    pub id: OrderId,
    pub user: String,
    pub items: Vec<LineItem>,
    pub total_amount: u64,
    pub payment_method: PaymentMethod,
    pub shipping_address: String,
    pub status: OrderStatus,
    pub stock_applied_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: u64,
}

/// A status write decided by the lifecycle, applied by a store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatusChange {
    pub status: OrderStatus,
    /// The write only lands if the stored order is still at this version.
    pub expected_version: ExpectedVersion,
    pub marks_stock_applied: bool,
    pub at: DateTime<Utc>,
}

impl Order {
    /// Validate a draft and build a new `pending` order.
    pub fn place(draft: OrderDraft, id: OrderId, now: DateTime<Utc>) -> DomainResult<Self> {
        let user = draft.user.trim();
        if user.is_empty() {
            return Err(DomainError::validation("user is required"));
        }

        if draft.items.is_empty() {
            return Err(DomainError::validation("order must contain at least one item"));
        }
        let items = draft
            .items
            .iter()
            .enumerate()
            .map(|(idx, item)| item.validate(idx))
            .collect::<DomainResult<Vec<_>>>()?;

        let total_amount = u64::try_from(draft.total_amount)
            .ok()
            .filter(|t| *t > 0)
            .ok_or_else(|| DomainError::validation("total_amount must be positive"))?;

        let payment_method = draft.payment_method.parse::<PaymentMethod>()?;

        let shipping_address = draft.shipping_address.trim();
        if shipping_address.is_empty() {
            return Err(DomainError::validation("shipping_address is required"));
        }

        Ok(Self {
            id,
            user: UserRef(user.to_string()),
            items,
            total_amount,
            payment_method,
            shipping_address: shipping_address.to_string(),
            status: OrderStatus::Pending,
            stock_applied_at: None,
            created_at: now,
            updated_at: now,
            version: 1,
        })
    }

    pub fn rehydrate(parts: OrderParts) -> Self {
        Self {
            id: parts.id,
            user: UserRef(parts.user),
            items: parts.items,
            total_amount: parts.total_amount,
            payment_method: parts.payment_method,
            shipping_address: parts.shipping_address,
            status: parts.status,
            stock_applied_at: parts.stock_applied_at,
            created_at: parts.created_at,
            updated_at: parts.updated_at,
            version: parts.version,
        }
    }

    pub fn id_typed(&self) -> OrderId {
        self.id
    }

    pub fn user(&self) -> &UserRef {
        &self.user
    }

    pub fn items(&self) -> &[LineItem] {
        &self.items
    }

    pub fn total_amount(&self) -> u64 {
        self.total_amount
    }

    pub fn payment_method(&self) -> PaymentMethod {
        self.payment_method
    }

    pub fn shipping_address(&self) -> &str {
        &self.shipping_address
    }

    pub fn status(&self) -> OrderStatus {
        self.status
    }

    pub fn stock_applied_at(&self) -> Option<DateTime<Utc>> {
        self.stock_applied_at
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Decide a transition to `to` (pure; does not mutate).
    ///
    /// Stock is only ever taken once per order: a permissive policy may let a
    /// cancelled order be completed again, but if an earlier completion already
    /// applied stock the plan will not ask for it a second time.
    pub fn plan_transition(
        &self,
        to: OrderStatus,
        policy: TransitionPolicy,
    ) -> DomainResult<TransitionPlan> {
        let mut plan = policy.plan(self.status, to)?;
        plan.decrements_stock &= self.stock_applied_at.is_none();
        Ok(plan)
    }

    /// The conditional write that carries out `plan` against this version.
    pub fn status_change(&self, plan: &TransitionPlan, at: DateTime<Utc>) -> StatusChange {
        StatusChange {
            status: plan.to,
            expected_version: ExpectedVersion::Exact(self.version),
            marks_stock_applied: plan.decrements_stock,
            at,
        }
    }

    /// Apply a status write. Callers (stores) check `expected_version` first.
    pub fn apply(&mut self, change: &StatusChange) {
        self.status = change.status;
        if change.marks_stock_applied && self.stock_applied_at.is_none() {
            self.stock_applied_at = Some(change.at);
        }
        self.updated_at = change.at;

        // +1 per persisted change.
        self.version += 1;
    }
}

impl AggregateRoot for Order {
    type Id = OrderId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.version
    }
}
