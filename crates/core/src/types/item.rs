//! Cart items and their composite uniqueness key.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Uniqueness key for an item within a cart: product + variant + size.
///
/// No two items in one cart may share a composite key; a write for an
/// existing key updates the item rather than appending a duplicate.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CompositeKey {
    pub product_id: String,
    /// Style/color index within the product.
    pub variant_key: u32,
    pub size: String,
}

impl CompositeKey {
    /// Create a composite key.
    #[must_use]
    pub fn new(product_id: impl Into<String>, variant_key: u32, size: impl Into<String>) -> Self {
        Self {
            product_id: product_id.into(),
            variant_key,
            size: size.into(),
        }
    }
}

impl std::fmt::Display for CompositeKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}:{}:{}", self.product_id, self.variant_key, self.size)
    }
}

/// An item stored in a cart.
///
/// `quantity` is always positive once stored; writes that drive a quantity
/// to zero or below remove the item instead (see [`crate::model::upsert`]).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItem {
    pub product_id: String,
    pub variant_key: u32,
    pub size: String,
    /// Price snapshot taken at add-time, not re-verified on reads.
    pub unit_price: Decimal,
    pub quantity: u32,
    /// Advisory stock snapshot; never a transactional reservation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available_stock: Option<u32>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CartItem {
    /// The composite key identifying this item within its cart.
    #[must_use]
    pub fn key(&self) -> CompositeKey {
        CompositeKey::new(self.product_id.clone(), self.variant_key, self.size.clone())
    }

    /// Line total for this item.
    #[must_use]
    pub fn line_total(&self) -> Decimal {
        self.unit_price * Decimal::from(self.quantity)
    }
}

/// An item write as submitted by a caller, before validation.
///
/// `quantity` is signed: a value of zero or below is not invalid input, it is
/// the "remove this key" signal handled by [`crate::model::upsert`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CartItemDraft {
    pub product_id: String,
    pub variant_key: u32,
    pub size: String,
    pub unit_price: Decimal,
    pub quantity: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub available_stock: Option<u32>,
}

impl CartItemDraft {
    /// The composite key this draft addresses.
    #[must_use]
    pub fn key(&self) -> CompositeKey {
        CompositeKey::new(self.product_id.clone(), self.variant_key, self.size.clone())
    }
}

impl From<&CartItem> for CartItemDraft {
    fn from(item: &CartItem) -> Self {
        Self {
            product_id: item.product_id.clone(),
            variant_key: item.variant_key,
            size: item.size.clone(),
            unit_price: item.unit_price,
            quantity: i64::from(item.quantity),
            available_stock: item.available_stock,
        }
    }
}
