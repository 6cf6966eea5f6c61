use async_trait::async_trait;
use thiserror::Error;

use super::session::{Session, SessionUser};

/// Failures reported by (or while talking to) the identity provider.
#[derive(Debug, Clone, Error, PartialEq)]
pub enum IdentityError {
    #[error("identity provider rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },
    #[error("identity provider unreachable: {0}")]
    Transport(String),
    #[error("malformed identity provider response: {0}")]
    Malformed(String),
    #[error("no active session")]
    NoSession,
}

impl IdentityError {
    /// Human readable message without the category prefix.
    pub fn message(&self) -> String {
        match self {
            IdentityError::Rejected { message, .. } => message.clone(),
            IdentityError::Transport(m) | IdentityError::Malformed(m) => m.clone(),
            IdentityError::NoSession => "no active session".to_string(),
        }
    }
}

impl From<reqwest::Error> for IdentityError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            IdentityError::Malformed(err.to_string())
        } else {
            IdentityError::Transport(err.to_string())
        }
    }
}

/// Session lifecycle operations of the identity provider.
///
/// The provider owns the session; callers only ever see snapshots.
#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Current session, `None` when nobody is signed in.
    async fn get_session(&self) -> Result<Option<Session>, IdentityError>;

    /// Exchange the current refresh token for a new session, invalidating the old token.
    async fn refresh_session(&self) -> Result<Session, IdentityError>;

    async fn sign_out(&self) -> Result<(), IdentityError>;
}

/// Server-side verification of an access token presented by a caller.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn get_user(&self, access_token: &str) -> Result<SessionUser, IdentityError>;
}
