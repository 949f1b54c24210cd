//! Shared fixtures for cartsync integration tests.
//!
//! Everything runs against in-memory tiers; the harness adds two scripted
//! backends on top of [`MemoryBackend`]:
//!
//! - [`FlakyBackend`] - flips between healthy and refusing-connections,
//!   driving the coordinator's fallback and degraded-write paths
//! - [`HangingBackend`] - never answers, driving the timeout path

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use rust_decimal::Decimal;

use cartsync_core::{CartItemDraft, Identity, SessionId, UserId};
use cartsync_engine::error::BackendError;
use cartsync_engine::store::{MemoryBackend, MemoryMedium, PrimaryBackend};
use cartsync_engine::{CartCoordinator, EngineConfig};

/// Primary backend whose availability is scripted by the test.
pub struct FlakyBackend {
    inner: MemoryBackend,
    down: AtomicBool,
}

impl FlakyBackend {
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: MemoryBackend::new(),
            down: AtomicBool::new(false),
        }
    }

    /// Make every subsequent call fail (or succeed again).
    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    fn check(&self) -> Result<(), BackendError> {
        if self.down.load(Ordering::SeqCst) {
            return Err(BackendError::Transport("connection refused".to_string()));
        }
        Ok(())
    }
}

impl Default for FlakyBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PrimaryBackend for FlakyBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BackendError> {
        self.check()?;
        self.inner.get(key).await
    }

    async fn set_ex(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), BackendError> {
        self.check()?;
        self.inner.set_ex(key, value, ttl).await
    }

    async fn delete(&self, key: &str) -> Result<(), BackendError> {
        self.check()?;
        self.inner.delete(key).await
    }

    async fn ping(&self) -> Result<(), BackendError> {
        self.check()
    }
}

/// Primary backend that never answers; every call must hit the timeout.
pub struct HangingBackend;

#[async_trait]
impl PrimaryBackend for HangingBackend {
    async fn get(&self, _key: &str) -> Result<Option<Vec<u8>>, BackendError> {
        std::future::pending().await
    }

    async fn set_ex(&self, _key: &str, _value: Vec<u8>, _ttl: Duration) -> Result<(), BackendError> {
        std::future::pending().await
    }

    async fn delete(&self, _key: &str) -> Result<(), BackendError> {
        std::future::pending().await
    }

    async fn ping(&self) -> Result<(), BackendError> {
        std::future::pending().await
    }
}

/// Install a test subscriber honoring `RUST_LOG`, once per process.
pub fn init_tracing() {
    static INIT: std::sync::Once = std::sync::Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
            .with_test_writer()
            .try_init();
    });
}

/// Engine config tightened for tests: short timeouts, no health cooldown
/// (every call really hits the backend, keeping scripted outages exact).
#[must_use]
pub fn test_config() -> EngineConfig {
    EngineConfig {
        primary_timeout: Duration::from_millis(100),
        health_cooldown: Duration::ZERO,
        local_timeout: Duration::from_millis(100),
        ..EngineConfig::default()
    }
}

/// Coordinator wired to the given backend and medium under [`test_config`].
#[must_use]
pub fn coordinator_with(
    backend: Arc<dyn PrimaryBackend>,
    medium: Arc<MemoryMedium>,
) -> CartCoordinator {
    init_tracing();
    CartCoordinator::new(backend, medium, &test_config())
}

/// Fresh signed-in identity.
#[must_use]
pub fn fresh_user() -> UserId {
    UserId::new(format!("u-{}", uuid::Uuid::new_v4()))
}

/// Fresh anonymous identity.
#[must_use]
pub fn fresh_session() -> SessionId {
    SessionId::new(format!("s-{}", uuid::Uuid::new_v4()))
}

/// Signed-in identity wrapper.
#[must_use]
pub fn signed_in(user: &UserId) -> Identity {
    Identity::User(user.clone())
}

/// Anonymous identity wrapper.
#[must_use]
pub fn anonymous(session: &SessionId) -> Identity {
    Identity::Session(session.clone())
}

/// Draft for a 10.00 item of the given product and quantity.
#[must_use]
pub fn draft(product_id: &str, quantity: i64) -> CartItemDraft {
    CartItemDraft {
        product_id: product_id.to_string(),
        variant_key: 0,
        size: "M".to_string(),
        unit_price: Decimal::new(1000, 2),
        quantity,
        available_stock: Some(10),
    }
}
