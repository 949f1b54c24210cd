//! Cart entity types.

mod cart;
mod identity;
mod item;

pub use cart::{Cart, CartTotals};
pub use identity::{Identity, SessionId, UserId};
pub use item::{CartItem, CartItemDraft, CompositeKey};
