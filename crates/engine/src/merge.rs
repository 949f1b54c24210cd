//! Login-boundary merge of the anonymous cart into the signed-in cart.
//!
//! Runs exactly once per login, before normal coordinator operations resume
//! for the new identity. The precedence rule on key conflicts is "the local
//! (pre-login) item wins" - pre-login activity is taken as the shopper's
//! most recent intent. The rule is deliberately NOT timestamp-derived; if
//! the primary cart was touched more recently from another device, the local
//! quantity still wins. Changing that needs a product decision, not a code
//! change here.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tracing::{info, instrument, warn};

use cartsync_core::{Cart, CartItem, Identity, SessionId, UserId};

use crate::coordinator::{CartWrite, Tier};
use crate::error::CartError;
use crate::store::{LocalCartStore, PrimaryCartStore};

/// Union two item lists by composite key.
///
/// Local items come first (their order preserved), primary-only keys are
/// carried through unchanged after them. For keys present on both sides the
/// local item wins wholesale - quantity and price snapshot alike.
fn merge_items(local: Vec<CartItem>, primary: Vec<CartItem>) -> Vec<CartItem> {
    let mut merged = local;
    for item in primary {
        if !merged.iter().any(|existing| existing.key() == item.key()) {
            merged.push(item);
        }
    }
    merged
}

/// Serializes login merges per user and runs the merge algorithm.
///
/// The read-then-write sequence of a merge is not re-entrant-safe, so a
/// per-user in-flight guard makes a concurrent second login for the same
/// user wait instead of racing.
pub struct MergeResolver {
    inflight: Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl MergeResolver {
    /// Create a resolver with no merges in flight.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inflight: Mutex::new(HashMap::new()),
        }
    }

    fn gate_for(&self, user: &UserId) -> Arc<tokio::sync::Mutex<()>> {
        let mut inflight = match self.inflight.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        Arc::clone(
            inflight
                .entry(user.as_str().to_string())
                .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(()))),
        )
    }

    fn release_gate(&self, user: &UserId) {
        let mut inflight = match self.inflight.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        // Drop the map entry once nobody else holds the gate.
        if inflight
            .get(user.as_str())
            .is_some_and(|gate| Arc::strong_count(gate) == 1)
        {
            inflight.remove(user.as_str());
        }
    }

    /// Reconcile the prior anonymous cart into the signed-in cart.
    ///
    /// Steps: read both sides independently; if no local cart exists the
    /// primary cart (possibly absent) is the active cart unchanged; if no
    /// primary cart exists the local cart is promoted under the user id;
    /// if both exist they are unioned by composite key with local winning
    /// conflicts. The merged result is persisted to the primary tier and the
    /// local entry cleared, which makes a repeated merge a no-op.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Unavailable` if the primary tier cannot be
    /// reached - the local cart is left intact so the caller can retry -
    /// or `CartError::Local` if the local tier fails.
    #[instrument(skip(self, primary, local), fields(user = %user, prior_session = %prior_session))]
    pub async fn merge(
        &self,
        primary: &PrimaryCartStore,
        local: &LocalCartStore,
        user: &UserId,
        prior_session: &SessionId,
    ) -> Result<CartWrite, CartError> {
        let gate = self.gate_for(user);
        let result = {
            let _held = gate.lock().await;
            self.merge_locked(primary, local, user).await
        };
        drop(gate);
        self.release_gate(user);
        result
    }

    async fn merge_locked(
        &self,
        primary: &PrimaryCartStore,
        local: &LocalCartStore,
        user: &UserId,
    ) -> Result<CartWrite, CartError> {
        let identity = Identity::User(user.clone());

        let local_cart = local.get().await?;
        let primary_cart = primary
            .get(&identity)
            .await
            .map_err(|err| CartError::Unavailable(err.to_string()))?;

        let Some(local_cart) = local_cart else {
            // Nothing to merge; the primary cart (possibly absent) is
            // already the active cart. This arm is what makes a second
            // merge after a completed one a no-op.
            let cart = primary_cart
                .unwrap_or_else(|| Cart::empty(identity.clone(), chrono::Utc::now()));
            return Ok(CartWrite {
                cart,
                source: Tier::Primary,
                primary_degraded: false,
                rejected: Vec::new(),
            });
        };

        // The merged cart keeps the signed-in cart's creation stamp; a pure
        // promotion keeps the anonymous cart's.
        let created_at = primary_cart
            .as_ref()
            .map_or(local_cart.created_at, |cart| cart.created_at);

        let merged_items = match primary_cart {
            Some(primary_cart) => {
                info!(
                    local_items = local_cart.items.len(),
                    primary_items = primary_cart.items.len(),
                    "merging anonymous cart into signed-in cart"
                );
                merge_items(local_cart.items, primary_cart.items)
            }
            None => local_cart.items,
        };

        // Persist under the user id; totals are recomputed by the store.
        let cart = primary
            .set(&identity, merged_items, Some(created_at))
            .await
            .map_err(|err| CartError::Unavailable(err.to_string()))?;

        // The anonymous entry must not survive the merge, otherwise a later
        // login would replay it.
        if let Err(err) = local.delete().await {
            warn!(error = %err, "failed to clear local cart after merge");
            return Err(CartError::Local(err));
        }

        Ok(CartWrite {
            cart,
            source: Tier::Primary,
            primary_degraded: false,
            rejected: Vec::new(),
        })
    }
}

impl Default for MergeResolver {
    fn default() -> Self {
        Self::new()
    }
}
