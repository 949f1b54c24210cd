//! Cartsync Core - Pure cart data model.
//!
//! This crate provides the entity shapes and validation/derivation logic for
//! the cart engine:
//! - `storefront`-facing identity types (signed-in user xor anonymous session)
//! - cart items keyed by a composite key (product + variant + size)
//! - totals derivation, item validation, upsert, and cap enforcement
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no async,
//! no storage backends. Both storage tiers and the coordinator build on it,
//! which keeps the invariants (positive quantities, recomputed totals, unique
//! composite keys, capped item lists) in exactly one place.
//!
//! # Modules
//!
//! - [`types`] - Identity, composite key, item, and cart types
//! - [`model`] - Totals derivation, validation, upsert, and cap enforcement

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod model;
pub mod types;

pub use model::*;
pub use types::*;
