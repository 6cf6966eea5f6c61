//! HTTP client for a GoTrue-compatible auth service (the Supabase auth REST API).
//!
//! The client caches the current session in memory. That cache is the only
//! session state in the process; the session guard reads a snapshot of it on
//! every call and never keeps its own copy.

use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::provider::{IdentityError, IdentityProvider, TokenVerifier};
use super::session::{Session, SessionUser};

pub struct GoTrueClient {
    base: String,
    anon_key: String,
    http: reqwest::Client,
    current: RwLock<Option<Session>>,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    #[serde(default)]
    expires_in: Option<i64>,
    #[serde(default)]
    expires_at: Option<i64>,
    user: SessionUser,
}

impl TokenResponse {
    fn into_session(self, now: i64) -> Session {
        // Older servers only report a relative lifetime
        let expires_at = self.expires_at.or_else(|| self.expires_in.map(|secs| now + secs));
        Session {
            access_token: self.access_token,
            refresh_token: self.refresh_token,
            expires_at,
            user: self.user,
        }
    }
}

impl GoTrueClient {
    pub fn new(base: &str, anon_key: impl Into<String>, timeout: Duration) -> Result<Self, IdentityError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| IdentityError::Transport(e.to_string()))?;
        Ok(Self::with_http(base, anon_key, http))
    }

    pub fn with_http(base: &str, anon_key: impl Into<String>, http: reqwest::Client) -> Self {
        Self {
            base: base.trim_end_matches('/').to_string(),
            anon_key: anon_key.into(),
            http,
            current: RwLock::new(None),
        }
    }

    /// Restore a previously persisted session (e.g. read back from disk by the caller).
    pub fn restore(&self, session: Session) {
        *self.current.write() = Some(session);
    }

    pub fn current(&self) -> Option<Session> {
        self.current.read().clone()
    }

    fn url(&self, path: &str) -> String {
        format!("{}/auth/v1/{}", self.base, path)
    }

    pub async fn sign_in_with_password(&self, email: &str, password: &str) -> Result<Session, IdentityError> {
        let session = self
            .token_grant("password", json!({ "email": email, "password": password }))
            .await?;
        debug!(user = %session.user.id, "identity.sign_in");
        *self.current.write() = Some(session.clone());
        Ok(session)
    }

    async fn token_grant(&self, grant_type: &str, body: Value) -> Result<Session, IdentityError> {
        let resp = self
            .http
            .post(self.url("token"))
            .query(&[("grant_type", grant_type)])
            .header("apikey", &self.anon_key)
            .json(&body)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(rejected(status.as_u16(), &text));
        }
        let token: TokenResponse = resp.json().await?;
        Ok(token.into_session(chrono::Utc::now().timestamp()))
    }
}

/// Pick the most specific message out of a provider error body.
fn rejected(status: u16, body: &str) -> IdentityError {
    let message = serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|v| {
            ["error_description", "msg", "message", "error"]
                .iter()
                .find_map(|k| v.get(*k).and_then(|m| m.as_str()).map(|m| m.to_string()))
        })
        .unwrap_or_else(|| {
            if body.trim().is_empty() { format!("HTTP {}", status) } else { body.trim().to_string() }
        });
    IdentityError::Rejected { status, message }
}

#[async_trait]
impl IdentityProvider for GoTrueClient {
    async fn get_session(&self) -> Result<Option<Session>, IdentityError> {
        Ok(self.current())
    }

    async fn refresh_session(&self) -> Result<Session, IdentityError> {
        let refresh_token = self
            .current
            .read()
            .as_ref()
            .and_then(|s| s.refresh_token.clone())
            .ok_or(IdentityError::NoSession)?;
        let session = self
            .token_grant("refresh_token", json!({ "refresh_token": refresh_token }))
            .await?;
        *self.current.write() = Some(session.clone());
        Ok(session)
    }

    async fn sign_out(&self) -> Result<(), IdentityError> {
        let taken = { self.current.write().take() };
        let Some(session) = taken else { return Ok(()); };
        let resp = self
            .http
            .post(self.url("logout"))
            .header("apikey", &self.anon_key)
            .bearer_auth(&session.access_token)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "identity.sign_out rejected; local session cleared anyway");
            return Err(rejected(status.as_u16(), &text));
        }
        Ok(())
    }
}

#[async_trait]
impl TokenVerifier for GoTrueClient {
    async fn get_user(&self, access_token: &str) -> Result<SessionUser, IdentityError> {
        let resp = self
            .http
            .get(self.url("user"))
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let text = resp.text().await.unwrap_or_default();
            return Err(rejected(status.as_u16(), &text));
        }
        Ok(resp.json().await?)
    }
}
