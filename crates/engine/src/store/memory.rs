//! In-process backends: a `moka` TTL cache for the primary tier and a
//! capacity-bounded map for the local tier.
//!
//! `MemoryBackend` is the embedded/single-node primary tier and the test
//! fake; `moka` handles per-entry expiry natively, so TTL semantics match
//! the remote backend exactly. `MemoryMedium` doubles as the local-tier test
//! fake, with an optional byte capacity to exercise the store's cleanup and
//! retry path.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::Expiry;
use moka::future::Cache;

use crate::error::{BackendError, MediumError};

use super::{LocalMedium, PrimaryBackend};

// =============================================================================
// MemoryBackend
// =============================================================================

#[derive(Clone)]
struct Entry {
    bytes: Vec<u8>,
    ttl: Duration,
}

/// Expiry policy that reads the TTL off each entry, so every write
/// (re)starts that entry's expiry window.
struct PerEntryTtl;

impl Expiry<String, Entry> for PerEntryTtl {
    fn expire_after_create(
        &self,
        _key: &String,
        entry: &Entry,
        _created_at: Instant,
    ) -> Option<Duration> {
        Some(entry.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        entry: &Entry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(entry.ttl)
    }
}

/// In-process primary backend backed by a `moka` cache with native
/// per-entry TTL.
pub struct MemoryBackend {
    cache: Cache<String, Entry>,
}

impl MemoryBackend {
    /// Create a backend with room for `max_capacity` entries.
    #[must_use]
    pub fn new() -> Self {
        Self::with_capacity(10_000)
    }

    /// Create a backend bounded to `max_capacity` entries.
    #[must_use]
    pub fn with_capacity(max_capacity: u64) -> Self {
        Self {
            cache: Cache::builder()
                .max_capacity(max_capacity)
                .expire_after(PerEntryTtl)
                .build(),
        }
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PrimaryBackend for MemoryBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BackendError> {
        Ok(self.cache.get(key).await.map(|entry| entry.bytes))
    }

    async fn set_ex(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), BackendError> {
        self.cache
            .insert(key.to_string(), Entry { bytes: value, ttl })
            .await;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), BackendError> {
        self.cache.invalidate(key).await;
        Ok(())
    }

    async fn ping(&self) -> Result<(), BackendError> {
        Ok(())
    }
}

// =============================================================================
// MemoryMedium
// =============================================================================

/// In-memory local medium with an optional byte capacity.
///
/// With a capacity set, writes that would push the total stored bytes over
/// the limit are rejected - the same shape as a full client storage quota -
/// which lets tests drive the local store's cleanup-and-retry path.
pub struct MemoryMedium {
    blobs: Mutex<HashMap<String, Vec<u8>>>,
    capacity: Option<usize>,
}

impl MemoryMedium {
    /// Create an unbounded medium.
    #[must_use]
    pub fn new() -> Self {
        Self {
            blobs: Mutex::new(HashMap::new()),
            capacity: None,
        }
    }

    /// Create a medium that rejects writes once total stored bytes would
    /// exceed `capacity`.
    #[must_use]
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            blobs: Mutex::new(HashMap::new()),
            capacity: Some(capacity),
        }
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, Vec<u8>>>, MediumError> {
        self.blobs
            .lock()
            .map_err(|_| MediumError("medium lock poisoned".to_string()))
    }
}

impl Default for MemoryMedium {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LocalMedium for MemoryMedium {
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>, MediumError> {
        Ok(self.lock()?.get(key).cloned())
    }

    async fn write(&self, key: &str, value: Vec<u8>) -> Result<(), MediumError> {
        let mut blobs = self.lock()?;

        if let Some(capacity) = self.capacity {
            let occupied: usize = blobs
                .iter()
                .filter(|(k, _)| k.as_str() != key)
                .map(|(_, v)| v.len())
                .sum();
            if occupied + value.len() > capacity {
                return Err(MediumError(format!(
                    "capacity exceeded: {} + {} > {capacity}",
                    occupied,
                    value.len()
                )));
            }
        }

        blobs.insert(key.to_string(), value);
        Ok(())
    }

    async fn remove(&self, key: &str) -> Result<(), MediumError> {
        self.lock()?.remove(key);
        Ok(())
    }

    async fn keys(&self) -> Result<Vec<String>, MediumError> {
        Ok(self.lock()?.keys().cloned().collect())
    }
}
