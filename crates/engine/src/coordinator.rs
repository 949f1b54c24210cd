//! Cross-tier orchestration.
//!
//! The coordinator owns the read/write fallback policy:
//!
//! - anonymous identity: local tier only, the primary tier is never consulted
//! - signed-in identity, read: primary first; unavailable falls back to
//!   local; not-found still checks local (an unmerged prior-session cart or
//!   outage residue may live there)
//! - signed-in identity, write: primary, then a best-effort mirror to local;
//!   primary unavailable degrades to a local-only write flagged
//!   `primary_degraded` so callers can surface a non-blocking notice
//!
//! Convenience operations (`add_item`, `remove_item`, `clear_cart`) are
//! expressed purely as get + `cartsync_core` mutation + set, so they inherit
//! the same fallback and validation behavior as direct `update_cart` calls.

use std::sync::Arc;

use chrono::Utc;
use tracing::{instrument, warn};

use cartsync_core::{
    Cart, CartItem, CartItemDraft, CompositeKey, Identity, SessionId, UserId, ValidationError,
    enforce_cap, upsert, validate_item,
};

use crate::config::EngineConfig;
use crate::error::CartError;
use crate::lookup::{LookupError, ProductLookup};
use crate::merge::MergeResolver;
use crate::store::{LocalCartStore, LocalMedium, PrimaryBackend, PrimaryCartStore};

/// Which tier served an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Primary,
    Local,
}

/// Result of a cart read.
#[derive(Debug, Clone)]
pub struct CartRead {
    /// The cart; empty (never an error) when none exists yet.
    pub cart: Cart,
    /// The tier that served the read.
    pub source: Tier,
}

/// Result of a cart write.
#[derive(Debug, Clone)]
pub struct CartWrite {
    pub cart: Cart,
    /// The tier that accepted the authoritative write.
    pub source: Tier,
    /// True when the write landed only on the local tier because the
    /// primary tier was unavailable. A soft warning, not a failure.
    pub primary_degraded: bool,
    /// Items rejected by validation; the rest of the batch was written.
    pub rejected: Vec<RejectedItem>,
}

/// A single item rejected during a batch write.
#[derive(Debug, Clone)]
pub struct RejectedItem {
    pub key: CompositeKey,
    pub reason: ValidationError,
}

/// Orchestrates reads and writes across the primary and local tiers.
///
/// Construct with both stores (or their backends) injected; there are no
/// process-wide singletons, so tests substitute in-memory fakes freely.
pub struct CartCoordinator {
    primary: PrimaryCartStore,
    local: LocalCartStore,
    lookup: Option<Arc<dyn ProductLookup>>,
    max_items: usize,
    merge: MergeResolver,
}

impl CartCoordinator {
    /// Create a coordinator over injected tier backends.
    #[must_use]
    pub fn new(
        backend: Arc<dyn PrimaryBackend>,
        medium: Arc<dyn LocalMedium>,
        config: &EngineConfig,
    ) -> Self {
        Self::from_stores(
            PrimaryCartStore::new(backend, config),
            LocalCartStore::new(medium, config),
            config,
        )
    }

    /// Create a coordinator from pre-built stores.
    #[must_use]
    pub fn from_stores(
        primary: PrimaryCartStore,
        local: LocalCartStore,
        config: &EngineConfig,
    ) -> Self {
        Self {
            primary,
            local,
            lookup: None,
            max_items: config.max_items,
            merge: MergeResolver::new(),
        }
    }

    /// Attach the catalog collaborator used by [`Self::add_product`].
    #[must_use]
    pub fn with_lookup(mut self, lookup: Arc<dyn ProductLookup>) -> Self {
        self.lookup = Some(lookup);
        self
    }

    /// Fetch the cart for an identity, applying the read fallback policy.
    ///
    /// # Errors
    ///
    /// Returns `CartError` only when no tier could serve the read.
    #[instrument(skip(self), fields(identity = %identity))]
    pub async fn get_cart(&self, identity: &Identity) -> Result<CartRead, CartError> {
        if identity.is_anonymous() {
            let cart = self.local.get().await?;
            return Ok(CartRead {
                cart: cart.unwrap_or_else(|| Cart::empty(identity.clone(), Utc::now())),
                source: Tier::Local,
            });
        }

        match self.primary.get(identity).await {
            Ok(Some(cart)) => Ok(CartRead {
                cart,
                source: Tier::Primary,
            }),
            Ok(None) => {
                // No primary entry yet; a local cart may remain from a prior
                // anonymous session or a primary outage.
                match self.local.get().await {
                    Ok(Some(cart)) => Ok(CartRead {
                        cart,
                        source: Tier::Local,
                    }),
                    Ok(None) => Ok(CartRead {
                        cart: Cart::empty(identity.clone(), Utc::now()),
                        source: Tier::Primary,
                    }),
                    Err(err) => {
                        warn!(error = %err, "local read failed after primary not-found");
                        Ok(CartRead {
                            cart: Cart::empty(identity.clone(), Utc::now()),
                            source: Tier::Primary,
                        })
                    }
                }
            }
            Err(primary_err) => {
                warn!(error = %primary_err, "primary unavailable, falling back to local");
                match self.local.get().await {
                    Ok(cart) => Ok(CartRead {
                        cart: cart.unwrap_or_else(|| Cart::empty(identity.clone(), Utc::now())),
                        source: Tier::Local,
                    }),
                    Err(local_err) => Err(CartError::Unavailable(format!(
                        "primary: {primary_err}; local: {local_err}"
                    ))),
                }
            }
        }
    }

    /// Replace the cart's item list, applying the write fallback policy.
    ///
    /// Each draft is validated individually; invalid drafts are rejected and
    /// reported in the result while the valid remainder is written.
    ///
    /// # Errors
    ///
    /// Returns `CartError` only when no tier accepted the write.
    #[instrument(skip(self, drafts), fields(identity = %identity, drafts = drafts.len()))]
    pub async fn update_cart(
        &self,
        identity: &Identity,
        drafts: Vec<CartItemDraft>,
    ) -> Result<CartWrite, CartError> {
        let now = Utc::now();
        let mut items = Vec::new();
        let mut rejected = Vec::new();

        for draft in drafts {
            match validate_item(&draft) {
                Ok(()) => items = upsert(items, draft, now),
                Err(reason) => rejected.push(RejectedItem {
                    key: draft.key(),
                    reason,
                }),
            }
        }

        // Best-effort: keep the existing cart's creation stamp; an unreadable
        // prior cart must not fail the write.
        let created_at = self
            .get_cart(identity)
            .await
            .ok()
            .map(|read| read.cart.created_at);

        let mut write = self.set_items(identity, items, created_at).await?;
        write.rejected = rejected;
        Ok(write)
    }

    /// Add (or re-quantify) one item. A draft quantity <= 0 removes the key;
    /// that is a successful write, not an error.
    ///
    /// # Errors
    ///
    /// Returns `CartError` only when no tier accepted the write.
    #[instrument(skip(self, draft), fields(identity = %identity, key = %draft.key()))]
    pub async fn add_item(
        &self,
        identity: &Identity,
        draft: CartItemDraft,
    ) -> Result<CartWrite, CartError> {
        let read = self.get_cart(identity).await?;

        if let Err(reason) = validate_item(&draft) {
            // Nothing to write; report the rejection alongside the current cart.
            return Ok(CartWrite {
                cart: read.cart,
                source: read.source,
                primary_degraded: false,
                rejected: vec![RejectedItem {
                    key: draft.key(),
                    reason,
                }],
            });
        }

        let created_at = read.cart.created_at;
        let items = upsert(read.cart.items, draft, Utc::now());
        self.set_items(identity, items, Some(created_at)).await
    }

    /// Add an item by catalog reference, snapshotting price and advisory
    /// stock through the configured [`ProductLookup`].
    ///
    /// # Errors
    ///
    /// Returns `CartError::Lookup` if no collaborator is configured or the
    /// lookup fails, otherwise as [`Self::add_item`].
    #[instrument(skip(self), fields(identity = %identity, product_id, variant_key, size))]
    pub async fn add_product(
        &self,
        identity: &Identity,
        product_id: &str,
        variant_key: u32,
        size: &str,
        quantity: i64,
    ) -> Result<CartWrite, CartError> {
        let lookup = self.lookup.as_ref().ok_or(LookupError::NotConfigured)?;
        let quote = lookup.price_and_stock(product_id, variant_key, size).await?;

        self.add_item(
            identity,
            CartItemDraft {
                product_id: product_id.to_string(),
                variant_key,
                size: size.to_string(),
                unit_price: quote.unit_price,
                quantity,
                available_stock: quote.available_stock,
            },
        )
        .await
    }

    /// Remove the item with the given composite key. Removing an absent key
    /// is a successful no-op write.
    ///
    /// # Errors
    ///
    /// Returns `CartError` only when no tier accepted the write.
    #[instrument(skip(self), fields(identity = %identity, key = %key))]
    pub async fn remove_item(
        &self,
        identity: &Identity,
        key: &CompositeKey,
    ) -> Result<CartWrite, CartError> {
        let read = self.get_cart(identity).await?;
        let created_at = read.cart.created_at;
        let mut items = read.cart.items;
        items.retain(|item| item.key() != *key);
        self.set_items(identity, items, Some(created_at)).await
    }

    /// Empty the cart. Expressed as a write of zero items so it follows the
    /// same fallback path as every other mutation.
    ///
    /// # Errors
    ///
    /// Returns `CartError` only when no tier accepted the write.
    #[instrument(skip(self), fields(identity = %identity))]
    pub async fn clear_cart(&self, identity: &Identity) -> Result<CartWrite, CartError> {
        self.update_cart(identity, Vec::new()).await
    }

    /// Reconcile the prior anonymous cart into the signed-in cart. Called
    /// exactly once by the identity-transition collaborator after sign-in;
    /// concurrent calls for the same user are serialized internally.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Unavailable` if the primary tier cannot be
    /// reached (the merge is retried by the caller; the local cart is left
    /// intact), or `CartError::Local` if the local tier fails.
    pub async fn merge_on_login(
        &self,
        user: &UserId,
        prior_session: &SessionId,
    ) -> Result<CartWrite, CartError> {
        self.merge
            .merge(&self.primary, &self.local, user, prior_session)
            .await
    }

    /// Shared write path: cap, route by identity, mirror or degrade.
    /// `created_at` is the existing cart's creation stamp, `None` on first
    /// write.
    async fn set_items(
        &self,
        identity: &Identity,
        items: Vec<CartItem>,
        created_at: Option<chrono::DateTime<Utc>>,
    ) -> Result<CartWrite, CartError> {
        let items = enforce_cap(items, self.max_items);

        if identity.is_anonymous() {
            let cart = self.local.set(identity, items, created_at).await?;
            return Ok(CartWrite {
                cart,
                source: Tier::Local,
                primary_degraded: false,
                rejected: Vec::new(),
            });
        }

        match self.primary.set(identity, items.clone(), created_at).await {
            Ok(cart) => {
                // Write-behind backup; a mirror failure never fails the write.
                if let Err(err) = self.local.set(identity, items, created_at).await {
                    warn!(error = %err, "local mirror write failed");
                }
                Ok(CartWrite {
                    cart,
                    source: Tier::Primary,
                    primary_degraded: false,
                    rejected: Vec::new(),
                })
            }
            Err(primary_err) => {
                warn!(error = %primary_err, "primary write unavailable, degrading to local");
                match self.local.set(identity, items, created_at).await {
                    Ok(cart) => Ok(CartWrite {
                        cart,
                        source: Tier::Local,
                        primary_degraded: true,
                        rejected: Vec::new(),
                    }),
                    Err(local_err) => Err(CartError::Unavailable(format!(
                        "primary: {primary_err}; local: {local_err}"
                    ))),
                }
            }
        }
    }
}
