//! Primary tier: fast, TTL-bound, authoritative while reachable.

use std::future::Future;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use chrono::Utc;
use tracing::{debug, instrument, warn};

use cartsync_core::{Cart, CartItem, Identity, derive_totals};

use crate::config::EngineConfig;
use crate::error::PrimaryUnavailable;

use super::PrimaryBackend;

/// Cached tier-health flag.
///
/// After a failed call the primary tier is considered down for a cooldown
/// window; calls inside the window short-circuit to unavailable instead of
/// burning the timeout again. Any success (or a `probe`) clears the flag.
struct HealthFlag {
    last_failure: Mutex<Option<Instant>>,
    cooldown: Duration,
}

impl HealthFlag {
    fn new(cooldown: Duration) -> Self {
        Self {
            last_failure: Mutex::new(None),
            cooldown,
        }
    }

    fn is_cooling(&self) -> bool {
        self.last_failure
            .lock()
            .map(|guard| guard.is_some_and(|at| at.elapsed() < self.cooldown))
            .unwrap_or(false)
    }

    fn mark_down(&self) {
        if let Ok(mut guard) = self.last_failure.lock() {
            *guard = Some(Instant::now());
        }
    }

    fn mark_up(&self) {
        if let Ok(mut guard) = self.last_failure.lock() {
            *guard = None;
        }
    }
}

/// The fast, TTL-bound key/value tier.
///
/// Last-write-wins per identity. Every successful `set` refreshes the expiry
/// window whether or not the identity previously existed. Distinguishes three
/// read outcomes: found (`Ok(Some)`), not found (`Ok(None)` - the cart simply
/// doesn't exist yet), and unavailable (`Err` - the tier itself could not be
/// reached), so callers can decide whether to fall back.
pub struct PrimaryCartStore {
    backend: Arc<dyn PrimaryBackend>,
    key_prefix: String,
    ttl: Duration,
    call_timeout: Duration,
    health: HealthFlag,
}

impl PrimaryCartStore {
    /// Create a primary store over an injected backend.
    pub fn new(backend: Arc<dyn PrimaryBackend>, config: &EngineConfig) -> Self {
        Self {
            backend,
            key_prefix: config.key_prefix.clone(),
            ttl: config.cart_ttl,
            call_timeout: config.primary_timeout,
            health: HealthFlag::new(config.health_cooldown),
        }
    }

    fn key_for(&self, identity: &Identity) -> String {
        format!("{}{}", self.key_prefix, identity.as_str())
    }

    /// Run a backend call under the bounded timeout, tracking tier health.
    async fn bounded<T>(
        &self,
        op: &'static str,
        fut: impl Future<Output = Result<T, crate::error::BackendError>>,
    ) -> Result<T, PrimaryUnavailable> {
        if self.health.is_cooling() {
            debug!(op, "primary tier cooling down, skipping call");
            return Err(PrimaryUnavailable("cooling down after failure".into()));
        }

        match tokio::time::timeout(self.call_timeout, fut).await {
            Ok(Ok(value)) => {
                self.health.mark_up();
                Ok(value)
            }
            Ok(Err(err)) => {
                self.health.mark_down();
                warn!(op, error = %err, "primary backend call failed");
                Err(PrimaryUnavailable(err.to_string()))
            }
            Err(_) => {
                self.health.mark_down();
                let timeout_ms = u64::try_from(self.call_timeout.as_millis()).unwrap_or(u64::MAX);
                warn!(op, timeout_ms, "primary backend call timed out");
                Err(PrimaryUnavailable(format!(
                    "timed out after {}ms",
                    self.call_timeout.as_millis()
                )))
            }
        }
    }

    /// Fetch the cart for an identity.
    ///
    /// # Errors
    ///
    /// Returns `PrimaryUnavailable` if the tier could not be reached or
    /// timed out. A missing cart is `Ok(None)`, not an error.
    #[instrument(skip(self), fields(identity = %identity))]
    pub async fn get(&self, identity: &Identity) -> Result<Option<Cart>, PrimaryUnavailable> {
        let key = self.key_for(identity);
        let bytes = self.bounded("get", self.backend.get(&key)).await?;

        let Some(bytes) = bytes else {
            return Ok(None);
        };

        match serde_json::from_slice::<Cart>(&bytes) {
            Ok(cart) => Ok(Some(cart)),
            Err(err) => {
                // Unparseable primary entries self-heal on the next write.
                warn!(key, error = %err, "discarding unparseable primary cart entry");
                Ok(None)
            }
        }
    }

    /// Write the item list for an identity, recomputing totals and
    /// refreshing the TTL window.
    ///
    /// `created_at` carries the existing cart's creation stamp through a
    /// read-modify-write; `None` means the cart is being created now.
    ///
    /// # Errors
    ///
    /// Returns `PrimaryUnavailable` if the tier could not be reached or
    /// timed out.
    #[instrument(skip(self, items, created_at), fields(identity = %identity, items = items.len()))]
    pub async fn set(
        &self,
        identity: &Identity,
        items: Vec<CartItem>,
        created_at: Option<chrono::DateTime<Utc>>,
    ) -> Result<Cart, PrimaryUnavailable> {
        let now = Utc::now();
        let totals = derive_totals(&items);
        let ttl_chrono = chrono::Duration::from_std(self.ttl)
            .unwrap_or_else(|_| chrono::Duration::seconds(172_800));

        let cart = Cart {
            identity: identity.clone(),
            items,
            total: totals.total,
            item_count: totals.item_count,
            created_at: created_at.unwrap_or(now),
            updated_at: now,
            expires_at: Some(now + ttl_chrono),
        };

        let bytes = serde_json::to_vec(&cart)
            .map_err(|err| PrimaryUnavailable(format!("serialize failed: {err}")))?;

        let key = self.key_for(identity);
        self.bounded("set", self.backend.set_ex(&key, bytes, self.ttl))
            .await?;

        Ok(cart)
    }

    /// Remove the cart for an identity.
    ///
    /// # Errors
    ///
    /// Returns `PrimaryUnavailable` if the tier could not be reached or
    /// timed out.
    #[instrument(skip(self), fields(identity = %identity))]
    pub async fn delete(&self, identity: &Identity) -> Result<(), PrimaryUnavailable> {
        let key = self.key_for(identity);
        self.bounded("delete", self.backend.delete(&key)).await
    }

    /// Probe tier health with the bounded timeout, clearing the cached
    /// down-flag on success. Returns whether the tier answered.
    pub async fn probe(&self) -> bool {
        match tokio::time::timeout(self.call_timeout, self.backend.ping()).await {
            Ok(Ok(())) => {
                self.health.mark_up();
                true
            }
            _ => {
                self.health.mark_down();
                false
            }
        }
    }
}
