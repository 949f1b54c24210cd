//! Engine error taxonomy.
//!
//! Four kinds of trouble, handled very differently:
//!
//! - unavailable: a tier could not be reached or timed out; transient,
//!   triggers fallback, surfaced as a hard error only when no tier can serve
//! - not found: no cart exists yet; not an error, callers get an empty cart
//! - validation: a single item is rejected, the rest of the batch proceeds;
//!   reported alongside the successful partial write, never as an `Err`
//! - corrupted: the local blob failed to parse; cleared internally and
//!   reported as not-found, never propagated upward

use thiserror::Error;

/// The primary tier could not be reached or timed out.
///
/// Carries no cart-level meaning: "not found" is `Ok(None)`, never this.
#[derive(Debug, Clone, Error)]
#[error("primary tier unavailable: {0}")]
pub struct PrimaryUnavailable(pub String);

/// A primary backend call failed.
#[derive(Debug, Error)]
pub enum BackendError {
    /// Transport-level failure (connection refused, DNS, TLS, ...).
    #[error("transport error: {0}")]
    Transport(String),

    /// The backend answered with something unusable.
    #[error("unexpected backend response: {0}")]
    BadResponse(String),
}

impl From<reqwest::Error> for BackendError {
    fn from(err: reqwest::Error) -> Self {
        Self::Transport(err.to_string())
    }
}

/// A local storage medium call failed.
#[derive(Debug, Clone, Error)]
#[error("{0}")]
pub struct MediumError(pub String);

/// The local tier failed in a way the store could not absorb.
///
/// Parse corruption is absorbed internally (blob cleared, not-found
/// reported) and never appears here.
#[derive(Debug, Clone, Error)]
pub enum LocalStoreError {
    /// The storage medium failed or timed out.
    #[error("local storage medium error: {0}")]
    Medium(String),

    /// The medium rejected the write even after a cleanup pass and retry.
    #[error("local write rejected after cleanup retry: {0}")]
    WriteRejected(String),
}

/// Errors surfaced by coordinator operations.
///
/// Per the propagation policy, a coordinator method errors only when no tier
/// could serve the operation. Soft conditions (degraded writes, per-item
/// rejections) are carried on the `Ok` side of results.
#[derive(Debug, Error)]
pub enum CartError {
    /// Neither tier could serve the operation.
    #[error("cart storage unavailable: {0}")]
    Unavailable(String),

    /// The local tier failed for an anonymous shopper (no fallback exists).
    #[error(transparent)]
    Local(#[from] LocalStoreError),

    /// The price/stock collaborator failed while resolving a product.
    #[error(transparent)]
    Lookup(#[from] crate::lookup::LookupError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_primary_unavailable_display() {
        let err = PrimaryUnavailable("timed out after 1500ms".to_string());
        assert_eq!(
            err.to_string(),
            "primary tier unavailable: timed out after 1500ms"
        );
    }

    #[test]
    fn test_cart_error_wraps_local() {
        let err = CartError::from(LocalStoreError::Medium("disk full".to_string()));
        assert_eq!(err.to_string(), "local storage medium error: disk full");
    }
}
