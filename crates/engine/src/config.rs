//! Engine configuration.
//!
//! # Environment Variables
//!
//! All optional; `EngineConfig::default()` is usable as-is for embedded
//! deployments with in-process backends.
//!
//! - `CARTSYNC_PRIMARY_URL` - Base URL of the REST key/value service
//! - `CARTSYNC_PRIMARY_TOKEN` - Bearer token for the REST service
//! - `CARTSYNC_PRIMARY_TIMEOUT_MS` - Per-call primary timeout (default: 1500)
//! - `CARTSYNC_HEALTH_COOLDOWN_MS` - Skip-primary window after a failure (default: 5000)
//! - `CARTSYNC_LOCAL_TIMEOUT_MS` - Per-call local medium timeout (default: 1500)
//! - `CARTSYNC_CART_TTL_SECS` - Primary entry TTL, refreshed on write (default: 172800 / 48h)
//! - `CARTSYNC_MAX_ITEMS` - Cart item cap (default: 50)
//! - `CARTSYNC_KEY_PREFIX` - Primary key prefix (default: "cart:")
//! - `CARTSYNC_LOCAL_KEY` - Local tier storage key (default: "cartsync.cart")
//! - `CARTSYNC_LOCAL_DIR` - Data directory for the file medium

use std::path::PathBuf;
use std::time::Duration;

use secrecy::SecretString;
use thiserror::Error;

/// Configuration errors that can occur during loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
}

/// Cart engine configuration.
#[derive(Debug, Clone)]
pub struct EngineConfig {
    /// Base URL of the REST key/value service backing the primary tier.
    pub primary_url: Option<String>,
    /// Bearer token for the REST key/value service.
    pub primary_token: Option<SecretString>,
    /// Bounded timeout for each primary tier call.
    pub primary_timeout: Duration,
    /// How long to skip the primary tier after a failed call.
    pub health_cooldown: Duration,
    /// Bounded timeout for each local medium call.
    pub local_timeout: Duration,
    /// Primary-tier entry TTL, refreshed on every successful write.
    pub cart_ttl: Duration,
    /// Maximum items per cart; over-cap writes truncate oldest first.
    pub max_items: usize,
    /// Prefix prepended to the identity string to form the primary key.
    pub key_prefix: String,
    /// Fixed storage key for the local tier blob.
    pub local_key: String,
    /// Data directory for the file-backed local medium.
    pub local_dir: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            primary_url: None,
            primary_token: None,
            primary_timeout: Duration::from_millis(1500),
            health_cooldown: Duration::from_millis(5000),
            local_timeout: Duration::from_millis(1500),
            cart_ttl: Duration::from_secs(172_800), // 48h
            max_items: 50,
            key_prefix: "cart:".to_string(),
            local_key: "cartsync.cart".to_string(),
            local_dir: None,
        }
    }
}

impl EngineConfig {
    /// Load configuration from environment variables.
    ///
    /// Calls `dotenvy::dotenv()` to load from `.env` file if present. Unset
    /// variables fall back to the defaults above.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if a set variable fails to parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        let defaults = Self::default();

        Ok(Self {
            primary_url: get_optional_env("CARTSYNC_PRIMARY_URL"),
            primary_token: get_optional_env("CARTSYNC_PRIMARY_TOKEN").map(SecretString::from),
            primary_timeout: get_duration_ms(
                "CARTSYNC_PRIMARY_TIMEOUT_MS",
                defaults.primary_timeout,
            )?,
            health_cooldown: get_duration_ms(
                "CARTSYNC_HEALTH_COOLDOWN_MS",
                defaults.health_cooldown,
            )?,
            local_timeout: get_duration_ms("CARTSYNC_LOCAL_TIMEOUT_MS", defaults.local_timeout)?,
            cart_ttl: get_duration_secs("CARTSYNC_CART_TTL_SECS", defaults.cart_ttl)?,
            max_items: get_parsed("CARTSYNC_MAX_ITEMS", defaults.max_items)?,
            key_prefix: get_env_or("CARTSYNC_KEY_PREFIX", defaults.key_prefix),
            local_key: get_env_or("CARTSYNC_LOCAL_KEY", defaults.local_key),
            local_dir: get_optional_env("CARTSYNC_LOCAL_DIR").map(PathBuf::from),
        })
    }
}

// =============================================================================
// Helper Functions
// =============================================================================

/// Get an optional environment variable.
fn get_optional_env(key: &str) -> Option<String> {
    std::env::var(key).ok()
}

/// Get an environment variable with a default value.
fn get_env_or(key: &str, default: String) -> String {
    std::env::var(key).unwrap_or(default)
}

/// Parse an environment variable, falling back to a default when unset.
fn get_parsed<T: std::str::FromStr>(key: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .parse::<T>()
            .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string())),
        Err(_) => Ok(default),
    }
}

/// Parse a millisecond duration from the environment.
fn get_duration_ms(key: &str, default: Duration) -> Result<Duration, ConfigError> {
    let millis = get_parsed(key, default.as_millis())?;
    let millis = u64::try_from(millis)
        .map_err(|e| ConfigError::InvalidEnvVar(key.to_string(), e.to_string()))?;
    Ok(Duration::from_millis(millis))
}

/// Parse a second duration from the environment.
fn get_duration_secs(key: &str, default: Duration) -> Result<Duration, ConfigError> {
    let secs = get_parsed(key, default.as_secs())?;
    Ok(Duration::from_secs(secs))
}
