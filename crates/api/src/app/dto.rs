use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use storefront_core::AggregateRoot;
use storefront_infra::{StockAdjustment, Transition};
use storefront_inventory::{Product, ProductId};
use storefront_orders::{LineItem, Order, OrderStatus};

// -------------------------
// Request DTOs
// -------------------------

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    #[serde(default)]
    pub status: String,
}

#[derive(Debug, Deserialize)]
pub struct CreateProductRequest {
    /// Optional caller-chosen id (the catalog owns product identity).
    pub id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub stock: u64,
}

#[derive(Debug, Default, Deserialize)]
pub struct LimitQuery {
    pub limit: Option<usize>,
}

// -------------------------
// Response DTOs
// -------------------------

#[derive(Debug, Serialize)]
pub struct ProductView {
    pub id: ProductId,
    pub name: String,
    pub stock: u64,
}

impl From<&Product> for ProductView {
    fn from(p: &Product) -> Self {
        Self {
            id: p.id_typed(),
            name: p.name().to_string(),
            stock: p.stock(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct LineItemView {
    pub product_id: ProductId,
    pub quantity: u32,
    pub unit_price: u64,
    /// Current catalog entry; absent when not requested or no longer listed.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub product: Option<ProductView>,
}

#[derive(Debug, Serialize)]
pub struct OrderView {
    pub id: String,
    pub user: String,
    pub items: Vec<LineItemView>,
    pub total_amount: u64,
    pub payment_method: &'static str,
    pub shipping_address: String,
    pub status: OrderStatus,
    pub stock_applied_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub version: u64,
}

impl OrderView {
    /// Build a view, resolving each line's product with `lookup`.
    pub fn with_products<F>(order: &Order, mut lookup: F) -> Self
    where
        F: FnMut(&LineItem) -> Option<ProductView>,
    {
        Self {
            id: order.id_typed().to_string(),
            user: order.user().to_string(),
            items: order
                .items()
                .iter()
                .map(|item| LineItemView {
                    product_id: item.product_id,
                    quantity: item.quantity,
                    unit_price: item.unit_price,
                    product: lookup(item),
                })
                .collect(),
            total_amount: order.total_amount(),
            payment_method: order.payment_method().as_str(),
            shipping_address: order.shipping_address().to_string(),
            status: order.status(),
            stock_applied_at: order.stock_applied_at(),
            created_at: order.created_at(),
            updated_at: order.updated_at(),
            version: order.version(),
        }
    }
}

impl From<&Order> for OrderView {
    fn from(order: &Order) -> Self {
        Self::with_products(order, |_| None)
    }
}

#[derive(Debug, Serialize)]
pub struct ListResponse<T> {
    pub items: Vec<T>,
}

#[derive(Debug, Serialize)]
pub struct TransitionView {
    pub order: OrderView,
    pub previous_status: OrderStatus,
    pub adjustments: Vec<StockAdjustment>,
}

impl From<Transition> for TransitionView {
    fn from(t: Transition) -> Self {
        Self {
            order: OrderView::from(&t.order),
            previous_status: t.previous_status,
            adjustments: t.adjustments,
        }
    }
}
