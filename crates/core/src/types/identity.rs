//! Cart ownership identity.
//!
//! A cart is owned by exactly one of a signed-in user or an anonymous
//! session - never both, never neither. The enum makes the exclusivity a
//! compile-time fact instead of a pair of optional fields.

use serde::{Deserialize, Serialize};

/// Signed-in user identifier, issued by the external identity provider.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct UserId(String);

impl UserId {
    /// Create a user ID from the identity provider's opaque value.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the underlying string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for UserId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Anonymous session identifier for shoppers who have not signed in.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    /// Create a session ID from the session layer's opaque value.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Get the underlying string value.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The owning key of a cart.
///
/// Switching from `Session` to `User` is a login lifecycle event handled by
/// the merge resolver, never an in-place mutation of an existing identity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Identity {
    /// Signed-in shopper.
    User(UserId),
    /// Anonymous shopper.
    Session(SessionId),
}

impl Identity {
    /// Whether this identity belongs to an anonymous (not signed-in) shopper.
    #[must_use]
    pub const fn is_anonymous(&self) -> bool {
        matches!(self, Self::Session(_))
    }

    /// The raw identity string, used as the storage key suffix.
    #[must_use]
    pub fn as_str(&self) -> &str {
        match self {
            Self::User(id) => id.as_str(),
            Self::Session(id) => id.as_str(),
        }
    }
}

impl From<UserId> for Identity {
    fn from(id: UserId) -> Self {
        Self::User(id)
    }
}

impl From<SessionId> for Identity {
    fn from(id: SessionId) -> Self {
        Self::Session(id)
    }
}

impl std::fmt::Display for Identity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::User(id) => write!(f, "user:{id}"),
            Self::Session(id) => write!(f, "session:{id}"),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_identity_is_anonymous() {
        assert!(Identity::Session(SessionId::new("s1")).is_anonymous());
        assert!(!Identity::User(UserId::new("u1")).is_anonymous());
    }

    #[test]
    fn test_identity_as_str() {
        let identity = Identity::User(UserId::new("u-42"));
        assert_eq!(identity.as_str(), "u-42");

        let identity = Identity::Session(SessionId::new("anon-7"));
        assert_eq!(identity.as_str(), "anon-7");
    }

    #[test]
    fn test_identity_serde_round_trip() {
        let identity = Identity::User(UserId::new("u-42"));
        let json = serde_json::to_string(&identity).unwrap();
        assert!(json.contains("\"user\""));

        let back: Identity = serde_json::from_str(&json).unwrap();
        assert_eq!(back, identity);
    }
}
