//! Cartsync Engine - cart persistence and synchronization.
//!
//! Keeps a shopper's cart consistent across two storage tiers and the
//! transition from anonymous to signed-in identity:
//!
//! - [`store::PrimaryCartStore`] - fast, TTL-bound key/value tier;
//!   authoritative for signed-in shoppers while reachable
//! - [`store::LocalCartStore`] - durable client-resident tier; authoritative
//!   for anonymous shoppers and a write-behind backup for signed-in ones
//! - [`CartCoordinator`] - read/write fallback policy across the tiers
//! - [`MergeResolver`] - one-time reconciliation of the anonymous cart into
//!   the signed-in cart at login
//!
//! # Architecture
//!
//! Both tiers sit behind injected traits ([`store::PrimaryBackend`],
//! [`store::LocalMedium`]), so the same coordinator logic runs against a
//! remote key/value service, an in-process cache, or in-memory test fakes -
//! no ambient environment checks, no singletons. All validation and mutation
//! logic lives in `cartsync-core`; the engine only moves carts between tiers.
//!
//! Tier failures never escape as panics or hangs: every tier call carries a
//! bounded timeout, unavailability triggers fallback, and soft conditions
//! (degraded writes, per-item validation rejections) ride along on the `Ok`
//! side of results.
//!
//! # Example
//!
//! ```rust,ignore
//! use cartsync_engine::{CartCoordinator, EngineConfig};
//! use cartsync_engine::store::{MemoryBackend, MemoryMedium};
//!
//! let config = EngineConfig::default();
//! let coordinator = CartCoordinator::new(
//!     Arc::new(MemoryBackend::new()),
//!     Arc::new(MemoryMedium::new()),
//!     &config,
//! );
//!
//! let read = coordinator.get_cart(&identity).await?;
//! println!("{} items via {:?}", read.cart.item_count, read.source);
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod config;
pub mod coordinator;
pub mod error;
pub mod lookup;
pub mod merge;
pub mod store;

pub use config::{ConfigError, EngineConfig};
pub use coordinator::{CartCoordinator, CartRead, CartWrite, RejectedItem, Tier};
pub use error::CartError;
pub use lookup::{LookupError, PriceQuote, ProductLookup};
pub use merge::MergeResolver;
