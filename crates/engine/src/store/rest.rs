//! REST key/value backend for the primary tier.
//!
//! Speaks the Upstash-style Redis REST protocol: one command per request,
//! bearer-token auth, `{"result": ...}` response envelopes. The engine only
//! needs `GET`/`SET ... EX`/`DEL`/`PING`, so that is all this client knows.

use std::time::Duration;

use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::debug;

use crate::config::{ConfigError, EngineConfig};
use crate::error::BackendError;

use super::PrimaryBackend;

/// Response envelope returned by the REST service.
#[derive(Debug, Deserialize)]
struct RestResult {
    result: Option<serde_json::Value>,
}

/// HTTP client for an Upstash-style REST key/value service.
pub struct RestBackend {
    client: reqwest::Client,
    base_url: String,
    token: SecretString,
}

impl RestBackend {
    /// Create a backend from an explicit URL and bearer token.
    #[must_use]
    pub fn new(base_url: impl Into<String>, token: SecretString) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
        }
    }

    /// Create a backend from engine configuration.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::MissingEnvVar` if the config carries no primary
    /// URL or token.
    pub fn from_config(config: &EngineConfig) -> Result<Self, ConfigError> {
        let url = config
            .primary_url
            .clone()
            .ok_or_else(|| ConfigError::MissingEnvVar("CARTSYNC_PRIMARY_URL".to_string()))?;
        let token = config
            .primary_token
            .clone()
            .ok_or_else(|| ConfigError::MissingEnvVar("CARTSYNC_PRIMARY_TOKEN".to_string()))?;
        Ok(Self::new(url, token))
    }

    async fn command(&self, request: reqwest::RequestBuilder) -> Result<RestResult, BackendError> {
        let response = request
            .header(
                "Authorization",
                format!("Bearer {}", self.token.expose_secret()),
            )
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(BackendError::BadResponse(format!(
                "HTTP {status}: {}",
                body.chars().take(200).collect::<String>()
            )));
        }

        serde_json::from_str(&body).map_err(|err| {
            BackendError::BadResponse(format!(
                "unparseable envelope ({err}): {}",
                body.chars().take(200).collect::<String>()
            ))
        })
    }
}

#[async_trait::async_trait]
impl PrimaryBackend for RestBackend {
    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>, BackendError> {
        let url = format!("{}/get/{key}", self.base_url);
        let envelope = self.command(self.client.get(&url)).await?;

        match envelope.result {
            None | Some(serde_json::Value::Null) => Ok(None),
            Some(serde_json::Value::String(value)) => Ok(Some(value.into_bytes())),
            Some(other) => Err(BackendError::BadResponse(format!(
                "expected string value, got {other}"
            ))),
        }
    }

    async fn set_ex(&self, key: &str, value: Vec<u8>, ttl: Duration) -> Result<(), BackendError> {
        let url = format!("{}/set/{key}?EX={}", self.base_url, ttl.as_secs());
        debug!(key, ttl_secs = ttl.as_secs(), "primary REST set");
        self.command(self.client.post(&url).body(value)).await?;
        Ok(())
    }

    async fn delete(&self, key: &str) -> Result<(), BackendError> {
        let url = format!("{}/del/{key}", self.base_url);
        self.command(self.client.post(&url)).await?;
        Ok(())
    }

    async fn ping(&self) -> Result<(), BackendError> {
        let url = format!("{}/ping", self.base_url);
        let envelope = self.command(self.client.get(&url)).await?;

        match envelope.result {
            Some(serde_json::Value::String(answer)) if answer.eq_ignore_ascii_case("pong") => {
                Ok(())
            }
            other => Err(BackendError::BadResponse(format!(
                "unexpected ping reply: {other:?}"
            ))),
        }
    }
}
