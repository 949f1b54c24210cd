//! The cart aggregate.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::identity::Identity;
use super::item::CartItem;

/// Derived cart totals.
///
/// Always recomputed from the item list, never patched incrementally, so the
/// stored values cannot drift from the items they summarize.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct CartTotals {
    /// Sum of `unit_price * quantity` over all items.
    pub total: Decimal,
    /// Sum of quantities over all items.
    pub item_count: u32,
}

/// A shopper's cart.
///
/// Item order is insertion order - irrelevant to correctness, preserved for
/// display. `expires_at` is set only on primary-tier copies; the local tier
/// has no TTL.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cart {
    pub identity: Identity,
    pub items: Vec<CartItem>,
    pub total: Decimal,
    pub item_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
}

impl Cart {
    /// Create an empty cart for an identity.
    #[must_use]
    pub fn empty(identity: Identity, now: DateTime<Utc>) -> Self {
        Self {
            identity,
            items: Vec::new(),
            total: Decimal::ZERO,
            item_count: 0,
            created_at: now,
            updated_at: now,
            expires_at: None,
        }
    }

    /// Whether the cart holds no items.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
