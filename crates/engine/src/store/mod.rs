//! Storage tiers and their injectable backends.
//!
//! # Architecture
//!
//! Each tier is a thin policy layer over an injected trait:
//!
//! - [`PrimaryCartStore`] over [`PrimaryBackend`] - remote TTL key/value
//!   service ([`RestBackend`]) or in-process cache ([`MemoryBackend`])
//! - [`LocalCartStore`] over [`LocalMedium`] - abstract byte-addressable
//!   client store ([`FileMedium`]) or in-memory fake ([`MemoryMedium`])
//!
//! The traits exist so the coordinator never branches on its environment:
//! the same logic runs in a server, an embedded client, or a test harness.
//! Construct stores with their dependencies passed in; there are no shared
//! singletons.

mod file;
mod local;
mod memory;
mod primary;
mod rest;

pub use file::FileMedium;
pub use local::LocalCartStore;
pub use memory::{MemoryBackend, MemoryMedium};
pub use primary::PrimaryCartStore;
pub use rest::RestBackend;

use std::time::Duration;

use async_trait::async_trait;

use crate::error::{BackendError, MediumError};

/// Key/value backend for the primary tier.
///
/// Implementations must be `Send + Sync`; values are opaque serialized
/// bytes. TTL handling belongs to the backend (native expiry), never to the
/// store layer.
#[async_trait]
pub trait PrimaryBackend: Send + Sync {
    /// Fetch the value for a key. `None` means the key does not exist
    /// (or has expired) - that is not an error.
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BackendError>;

    /// Store a value, (re)setting its time-to-live.
    async fn set_ex(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), BackendError>;

    /// Remove a key. Removing an absent key is not an error.
    async fn delete(&self, key: &str) -> Result<(), BackendError>;

    /// Cheap liveness probe.
    async fn ping(&self) -> Result<(), BackendError>;
}

/// Abstract byte-addressable client store for the local tier.
///
/// Replaces ambient "what environment are we in" checks: anything that can
/// read, write, remove, and enumerate keyed blobs can host the local cart.
#[async_trait]
pub trait LocalMedium: Send + Sync {
    /// Read the blob stored under a key, `None` if absent.
    async fn read(&self, key: &str) -> Result<Option<Vec<u8>>, MediumError>;

    /// Write a blob under a key. The medium may reject the write
    /// (e.g. capacity exceeded); the store handles cleanup and retry.
    async fn write(&self, key: &str, value: Vec<u8>) -> Result<(), MediumError>;

    /// Remove a key. Removing an absent key is not an error.
    async fn remove(&self, key: &str) -> Result<(), MediumError>;

    /// Enumerate all keys currently held by the medium.
    async fn keys(&self) -> Result<Vec<String>, MediumError>;
}
