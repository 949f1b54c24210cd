//! Cart mutation logic: totals derivation, validation, upsert, cap.
//!
//! Every function here is pure and deterministic. The storage tiers and the
//! coordinator never mutate an item list themselves; they route every change
//! through this module so the invariants hold identically on both tiers:
//!
//! - stored quantities are always positive (quantity <= 0 removes the key)
//! - totals are recomputed from items on every mutation
//! - no two items share a composite key
//! - the item list never exceeds the cap (oldest-by-`created_at` drop first)

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use thiserror::Error;

use crate::types::{CartItem, CartItemDraft, CartTotals};

/// A single item failed validation.
///
/// Quantity <= 0 is deliberately NOT a validation error - it is the removal
/// signal, handled by [`upsert`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The draft has an empty product ID.
    #[error("item is missing a product id")]
    MissingProductId,

    /// The draft has an empty size.
    #[error("item is missing a size")]
    MissingSize,

    /// The draft's price snapshot is zero or negative.
    #[error("item has a non-positive unit price: {0}")]
    NonPositivePrice(Decimal),
}

/// Compute derived totals from an item list.
#[must_use]
pub fn derive_totals(items: &[CartItem]) -> CartTotals {
    CartTotals {
        total: items.iter().map(CartItem::line_total).sum(),
        item_count: items.iter().map(|item| item.quantity).sum(),
    }
}

/// Validate a draft's identifying fields and price snapshot.
///
/// # Errors
///
/// Returns `ValidationError` if `product_id` or `size` is empty, or if
/// `unit_price` is not strictly positive.
pub fn validate_item(draft: &CartItemDraft) -> Result<(), ValidationError> {
    if draft.product_id.trim().is_empty() {
        return Err(ValidationError::MissingProductId);
    }
    if draft.size.trim().is_empty() {
        return Err(ValidationError::MissingSize);
    }
    if draft.unit_price <= Decimal::ZERO {
        return Err(ValidationError::NonPositivePrice(draft.unit_price));
    }
    Ok(())
}

/// Apply one item write to an item list.
///
/// Replaces the item sharing the draft's composite key (preserving the
/// original `created_at`), or appends if absent. A draft quantity <= 0
/// removes the key instead of storing a non-positive quantity.
///
/// The caller is expected to have run [`validate_item`] first; `upsert` does
/// not re-check identifying fields.
#[must_use]
pub fn upsert(mut items: Vec<CartItem>, draft: CartItemDraft, now: DateTime<Utc>) -> Vec<CartItem> {
    let key = draft.key();

    if draft.quantity <= 0 {
        items.retain(|item| item.key() != key);
        return items;
    }

    // Checked above: quantity is in 1..=i64::MAX, clamp covers the u32 edge.
    let quantity = u32::try_from(draft.quantity).unwrap_or(u32::MAX);

    if let Some(existing) = items.iter_mut().find(|item| item.key() == key) {
        existing.unit_price = draft.unit_price;
        existing.quantity = quantity;
        existing.available_stock = draft.available_stock;
        existing.updated_at = now;
    } else {
        items.push(CartItem {
            product_id: draft.product_id,
            variant_key: draft.variant_key,
            size: draft.size,
            unit_price: draft.unit_price,
            quantity,
            available_stock: draft.available_stock,
            created_at: now,
            updated_at: now,
        });
    }

    items
}

/// Truncate an item list to `max` items, dropping oldest-by-`created_at`
/// first. Display order of the survivors is preserved.
///
/// Truncation is a successful outcome, not an error; callers report the
/// write as ok.
#[must_use]
pub fn enforce_cap(mut items: Vec<CartItem>, max: usize) -> Vec<CartItem> {
    while items.len() > max {
        let Some(oldest) = items
            .iter()
            .enumerate()
            .min_by_key(|(_, item)| item.created_at)
            .map(|(i, _)| i)
        else {
            break;
        };
        items.remove(oldest);
    }
    items
}
