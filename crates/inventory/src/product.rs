use serde::{Deserialize, Serialize};

use storefront_core::{AggregateId, DomainError, DomainResult, Entity};

/// Product identifier.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProductId(pub AggregateId);

storefront_core::impl_aggregate_id_newtype!(ProductId);

/// A catalog product as seen by the inventory ledger.
///
/// Stock is unsigned, so "never negative" holds by construction; the only way
/// to lower it is [`Product::decrement`], which clamps at zero.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Product {
    id: ProductId,
    name: String,
    stock: u64,
}

impl Product {
    pub fn new(id: ProductId, name: impl Into<String>, stock: u64) -> DomainResult<Self> {
        let name = name.into().trim().to_string();
        if name.is_empty() {
            return Err(DomainError::validation("product name cannot be empty"));
        }
        Ok(Self { id, name, stock })
    }

    pub fn id_typed(&self) -> ProductId {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn stock(&self) -> u64 {
        self.stock
    }

    /// Reduce stock by `quantity`, flooring at zero.
    ///
    /// Overselling is not an error: the shortfall is recorded on the returned
    /// [`StockDecrement`] and stock becomes zero.
    pub fn decrement(&mut self, quantity: u64) -> StockDecrement {
        let previous = self.stock;
        self.stock = previous.saturating_sub(quantity);
        StockDecrement {
            product_id: self.id,
            requested: quantity,
            previous,
            current: self.stock,
        }
    }
}

impl Entity for Product {
    type Id = ProductId;

    fn id(&self) -> &Self::Id {
        &self.id
    }
}

/// Record of a single applied stock decrement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StockDecrement {
    pub product_id: ProductId,
    pub requested: u64,
    pub previous: u64,
    pub current: u64,
}

impl StockDecrement {
    /// True when the requested quantity exceeded available stock.
    pub fn clamped(&self) -> bool {
        self.requested > self.previous
    }

    /// Units actually removed from stock.
    pub fn removed(&self) -> u64 {
        self.previous - self.current
    }
}
