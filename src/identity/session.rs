use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

pub type BearerToken = String;

/// Subject of a session as reported by the identity provider.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SessionUser {
    pub id: String,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub user_metadata: Map<String, Value>,
}

impl SessionUser {
    pub fn metadata_str(&self, key: &str) -> Option<&str> {
        self.user_metadata.get(key).and_then(|v| v.as_str())
    }
}

/// Server-issued proof of authentication.
///
/// `expires_at` is in epoch seconds and may be absent when the provider does
/// not report it; callers must then treat the token as best effort.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Session {
    pub access_token: BearerToken,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_at: Option<i64>,
    pub user: SessionUser,
}

impl Session {
    /// Seconds until expiry measured from `now` (epoch seconds). Negative once expired.
    pub fn seconds_left(&self, now: i64) -> Option<i64> {
        self.expires_at.map(|exp| exp - now)
    }

    pub fn has_token(&self) -> bool {
        !self.access_token.trim().is_empty()
    }
}
