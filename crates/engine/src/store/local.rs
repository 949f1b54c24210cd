//! Local tier: durable, client-resident, no TTL.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{instrument, warn};

use cartsync_core::{Cart, CartItem, Identity, derive_totals, enforce_cap};

use crate::config::EngineConfig;
use crate::error::{LocalStoreError, MediumError};

use super::LocalMedium;

/// The durable client-resident tier.
///
/// Authoritative for anonymous shoppers and a write-behind backup for
/// signed-in ones. No TTL: entries persist until explicitly cleared or the
/// medium is wiped. A parse failure on the persisted blob is treated as
/// corruption - the blob is cleared and the read reports not-found rather
/// than propagating a parse error.
pub struct LocalCartStore {
    medium: Arc<dyn LocalMedium>,
    storage_key: String,
    max_items: usize,
    call_timeout: Duration,
}

impl LocalCartStore {
    /// Create a local store over an injected medium.
    pub fn new(medium: Arc<dyn LocalMedium>, config: &EngineConfig) -> Self {
        Self {
            medium,
            storage_key: config.local_key.clone(),
            max_items: config.max_items,
            call_timeout: config.local_timeout,
        }
    }

    async fn bounded<T>(
        &self,
        op: &'static str,
        fut: impl std::future::Future<Output = Result<T, MediumError>>,
    ) -> Result<T, LocalStoreError> {
        match tokio::time::timeout(self.call_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(err)) => Err(LocalStoreError::Medium(err.to_string())),
            Err(_) => {
                warn!(op, "local medium call timed out");
                Err(LocalStoreError::Medium(format!(
                    "timed out after {}ms",
                    self.call_timeout.as_millis()
                )))
            }
        }
    }

    /// Fetch the locally persisted cart, if any.
    ///
    /// A corrupted blob is cleared and reported as `Ok(None)`.
    ///
    /// # Errors
    ///
    /// Returns `LocalStoreError` if the medium itself fails or times out.
    #[instrument(skip(self))]
    pub async fn get(&self) -> Result<Option<Cart>, LocalStoreError> {
        let bytes = self
            .bounded("read", self.medium.read(&self.storage_key))
            .await?;

        let Some(bytes) = bytes else {
            return Ok(None);
        };

        match serde_json::from_slice::<Cart>(&bytes) {
            Ok(cart) => Ok(Some(cart)),
            Err(err) => {
                warn!(error = %err, "local cart blob corrupted, clearing");
                if let Err(err) = self
                    .bounded("remove", self.medium.remove(&self.storage_key))
                    .await
                {
                    warn!(error = %err, "failed to clear corrupted local cart blob");
                }
                Ok(None)
            }
        }
    }

    /// Persist the item list for an identity, recomputing totals and
    /// enforcing the item cap before writing.
    ///
    /// `created_at` carries the existing cart's creation stamp through a
    /// read-modify-write; `None` means the cart is being created now.
    ///
    /// If the medium rejects the write, one bounded cleanup pass discards
    /// stale auxiliary keys and the write is retried exactly once.
    ///
    /// # Errors
    ///
    /// Returns `LocalStoreError::WriteRejected` when the retry also fails,
    /// or `LocalStoreError::Medium` on read/timeout failures.
    #[instrument(skip(self, items, created_at), fields(identity = %identity, items = items.len()))]
    pub async fn set(
        &self,
        identity: &Identity,
        items: Vec<CartItem>,
        created_at: Option<chrono::DateTime<Utc>>,
    ) -> Result<Cart, LocalStoreError> {
        let now = Utc::now();
        let items = enforce_cap(items, self.max_items);
        let totals = derive_totals(&items);

        let cart = Cart {
            identity: identity.clone(),
            items,
            total: totals.total,
            item_count: totals.item_count,
            created_at: created_at.unwrap_or(now),
            updated_at: now,
            expires_at: None, // local tier has no TTL
        };

        let bytes = serde_json::to_vec(&cart)
            .map_err(|err| LocalStoreError::Medium(format!("serialize failed: {err}")))?;

        let first = self
            .bounded("write", self.medium.write(&self.storage_key, bytes.clone()))
            .await;

        if let Err(err) = first {
            warn!(error = %err, "local write rejected, running cleanup pass");
            self.cleanup_auxiliary_keys().await;

            self.bounded("write", self.medium.write(&self.storage_key, bytes))
                .await
                .map_err(|err| LocalStoreError::WriteRejected(err.to_string()))?;
        }

        Ok(cart)
    }

    /// Remove the locally persisted cart.
    ///
    /// # Errors
    ///
    /// Returns `LocalStoreError` if the medium fails or times out.
    #[instrument(skip(self))]
    pub async fn delete(&self) -> Result<(), LocalStoreError> {
        self.bounded("remove", self.medium.remove(&self.storage_key))
            .await
    }

    /// Discard every key except the cart blob itself. Best-effort: failures
    /// are logged and the subsequent retry decides the outcome.
    async fn cleanup_auxiliary_keys(&self) {
        let keys = match self.bounded("keys", self.medium.keys()).await {
            Ok(keys) => keys,
            Err(err) => {
                warn!(error = %err, "cleanup pass could not enumerate keys");
                return;
            }
        };

        for key in keys {
            if key == self.storage_key {
                continue;
            }
            if let Err(err) = self.bounded("remove", self.medium.remove(&key)).await {
                warn!(key, error = %err, "cleanup pass failed to remove key");
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::Decimal;

    use cartsync_core::{CartItemDraft, SessionId, upsert};

    use crate::store::MemoryMedium;

    use super::*;

    fn config() -> EngineConfig {
        EngineConfig {
            local_timeout: Duration::from_millis(50),
            ..EngineConfig::default()
        }
    }

    fn identity() -> Identity {
        Identity::Session(SessionId::new("s1"))
    }

    fn items(count: usize) -> Vec<CartItem> {
        let mut out = Vec::new();
        for i in 0..count {
            let draft = CartItemDraft {
                product_id: format!("p{i}"),
                variant_key: 0,
                size: "M".to_string(),
                unit_price: Decimal::new(500, 2),
                quantity: 1,
                available_stock: None,
            };
            out = upsert(out, draft, Utc::now() + chrono::Duration::seconds(i as i64));
        }
        out
    }

    #[tokio::test]
    async fn test_get_absent_is_none() {
        let store = LocalCartStore::new(Arc::new(MemoryMedium::new()), &config());
        assert!(store.get().await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_then_get_round_trips() {
        let store = LocalCartStore::new(Arc::new(MemoryMedium::new()), &config());
        let written = store.set(&identity(), items(2), None).await.unwrap();
        assert_eq!(written.item_count, 2);
        assert!(written.expires_at.is_none(), "local tier has no TTL");

        let read = store.get().await.unwrap().unwrap();
        assert_eq!(read, written);
    }

    #[tokio::test]
    async fn test_corrupted_blob_cleared_and_reported_not_found() {
        let medium = Arc::new(MemoryMedium::new());
        medium
            .write("cartsync.cart", b"%%% not json %%%".to_vec())
            .await
            .unwrap();

        let store = LocalCartStore::new(Arc::clone(&medium) as Arc<dyn LocalMedium>, &config());
        assert!(store.get().await.unwrap().is_none());

        // The corrupted blob must be gone, not lingering.
        assert!(medium.read("cartsync.cart").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_set_enforces_cap_before_persisting() {
        let mut cfg = config();
        cfg.max_items = 3;
        let store = LocalCartStore::new(Arc::new(MemoryMedium::new()), &cfg);

        let written = store.set(&identity(), items(5), None).await.unwrap();
        assert_eq!(written.items.len(), 3);
        // Oldest two dropped first.
        assert!(written.items.iter().all(|i| i.product_id != "p0"));
        assert!(written.items.iter().all(|i| i.product_id != "p1"));
    }

    #[tokio::test]
    async fn test_rejected_write_retries_after_cleanup() {
        // Capacity fits the cart blob only once stale auxiliary keys are gone.
        let medium = Arc::new(MemoryMedium::with_capacity(1200));
        medium
            .write("stale.analytics", vec![0_u8; 900])
            .await
            .unwrap();

        let store = LocalCartStore::new(Arc::clone(&medium) as Arc<dyn LocalMedium>, &config());
        let written = store.set(&identity(), items(2), None).await.unwrap();
        assert_eq!(written.item_count, 2);

        // The stale key was discarded by the cleanup pass.
        assert!(medium.read("stale.analytics").await.unwrap().is_none());
        assert!(medium.read("cartsync.cart").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_write_rejected_after_retry_reports_failure() {
        // Too small for the blob even after cleanup.
        let medium = Arc::new(MemoryMedium::with_capacity(10));
        let store = LocalCartStore::new(medium, &config());

        let err = store.set(&identity(), items(2), None).await.unwrap_err();
        assert!(matches!(err, LocalStoreError::WriteRejected(_)));
    }
}
