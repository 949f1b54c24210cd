//! Price/stock collaborator interface.
//!
//! The catalog is out of scope for the engine; it only consumes a snapshot
//! of `{unit_price, available_stock}` when an item is added. Snapshots are
//! not re-verified on reads, and stock is advisory - never a reservation.

use async_trait::async_trait;
use rust_decimal::Decimal;
use thiserror::Error;

/// Price and advisory stock snapshot for a product variant/size.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PriceQuote {
    pub unit_price: Decimal,
    pub available_stock: Option<u32>,
}

/// The lookup collaborator failed.
#[derive(Debug, Clone, Error)]
pub enum LookupError {
    /// No lookup collaborator was configured on the coordinator.
    #[error("no product lookup configured")]
    NotConfigured,

    /// The product/variant/size combination is unknown to the catalog.
    #[error("unknown product: {0}")]
    UnknownProduct(String),

    /// The collaborator itself failed.
    #[error("product lookup failed: {0}")]
    Failed(String),
}

/// Catalog collaborator supplying add-time price/stock snapshots.
#[async_trait]
pub trait ProductLookup: Send + Sync {
    /// Resolve the current price and advisory stock for a variant/size.
    async fn price_and_stock(
        &self,
        product_id: &str,
        variant_key: u32,
        size: &str,
    ) -> Result<PriceQuote, LookupError>;
}
