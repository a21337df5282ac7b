//! Value object trait: equality by value, not identity.

/// Marker trait for value objects.
///
/// Value objects are **immutable** and **compared by value**. An order line item
/// (product, quantity, captured unit price) is a value object: once an order is
/// placed its lines never change, and two lines with the same values are equal.
pub trait ValueObject: Clone + PartialEq + core::fmt::Debug {}
