//!
//! Authorized request relay
//! ------------------------
//! `Relay` issues one outbound JSON call with a credential attached and
//! classifies the response into a [`RelayOutcome`]. `AuthorizedRelay` puts the
//! session guard in front of it: no call leaves without a token, and a
//! credential failure (local or remote) notifies the user and schedules the
//! redirect to the login page. Remote and transport failures never redirect.

use std::sync::Arc;
use std::time::Duration;

use reqwest::header::AUTHORIZATION;
use reqwest::Method;
use serde_json::Value;
use tracing::{debug, warn};

use crate::config::GatewayConfig;
use crate::guard::SessionGuard;
use crate::identity::IdentityProvider;

pub mod outcome;
pub mod feedback;

pub use outcome::{classify, remote_message, RelayOutcome};
pub use feedback::{CredentialFailure, Notification, NotificationLevel, ReauthPolicy, TracingFeedback, UserFeedback};

/// One outbound call: method, absolute URL and optional JSON body.
#[derive(Debug, Clone, PartialEq)]
pub struct RelayRequest {
    pub method: Method,
    pub url: String,
    pub body: Option<Value>,
}

impl RelayRequest {
    pub fn get(url: impl Into<String>) -> Self {
        Self { method: Method::GET, url: url.into(), body: None }
    }

    pub fn post(url: impl Into<String>, body: Value) -> Self {
        Self { method: Method::POST, url: url.into(), body: Some(body) }
    }
}

/// Credential attached to an outbound call.
#[derive(Debug, Clone, Copy)]
pub enum Credential<'a> {
    /// Token to send as `Authorization: Bearer <token>`.
    Bearer(&'a str),
    /// Inbound `Authorization` header value, forwarded verbatim.
    Forwarded(&'a str),
}

impl Credential<'_> {
    fn header_value(&self) -> String {
        match self {
            Credential::Bearer(t) => format!("Bearer {}", t),
            Credential::Forwarded(h) => (*h).to_string(),
        }
    }
}

#[derive(Clone)]
pub struct Relay {
    http: reqwest::Client,
}

impl Relay {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http })
    }

    pub fn with_client(http: reqwest::Client) -> Self {
        Self { http }
    }

    pub async fn send(&self, request: &RelayRequest, credential: Credential<'_>) -> RelayOutcome {
        let mut builder = self
            .http
            .request(request.method.clone(), &request.url)
            .header(AUTHORIZATION, credential.header_value());
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }
        let resp = match builder.send().await {
            Ok(r) => r,
            Err(e) => {
                warn!(url = %request.url, error = %e, "relay: transport failure");
                return RelayOutcome::TransportFailure(e.to_string());
            }
        };
        let status = resp.status().as_u16();
        let body = match resp.bytes().await {
            Ok(b) => b,
            Err(e) => {
                warn!(url = %request.url, status, error = %e, "relay: failed reading response body");
                return RelayOutcome::TransportFailure(e.to_string());
            }
        };
        let outcome = classify(status, &body);
        debug!(url = %request.url, status, outcome = outcome.kind(), "relay: response classified");
        outcome
    }
}

/// Relay with the session guard and the re-authentication side effect in front.
#[derive(Clone)]
pub struct AuthorizedRelay {
    relay: Relay,
    guard: SessionGuard,
    feedback: Arc<dyn UserFeedback>,
    policy: ReauthPolicy,
}

impl AuthorizedRelay {
    pub fn new(relay: Relay, guard: SessionGuard, feedback: Arc<dyn UserFeedback>, policy: ReauthPolicy) -> Self {
        Self { relay, guard, feedback, policy }
    }

    /// Relay, guard threshold and re-login policy taken from the gateway configuration.
    pub fn from_config(
        config: &GatewayConfig,
        provider: Arc<dyn IdentityProvider>,
        feedback: Arc<dyn UserFeedback>,
    ) -> Result<Self, reqwest::Error> {
        let relay = Relay::new(config.request_timeout)?;
        let guard = SessionGuard::new(provider).with_refresh_threshold(config.refresh_threshold);
        let policy = ReauthPolicy { login_path: config.login_path.clone(), redirect_delay: config.redirect_delay };
        Ok(Self::new(relay, guard, feedback, policy))
    }

    pub fn feedback(&self) -> &Arc<dyn UserFeedback> {
        &self.feedback
    }

    pub async fn invoke(&self, request: &RelayRequest) -> RelayOutcome {
        let token = match self.guard.obtain_authorized_token().await {
            Ok(t) => t,
            Err(e) => {
                warn!(url = %request.url, error = %e, "relay: no token available, call not sent");
                self.policy.trigger(&self.feedback, CredentialFailure::SessionInvalid);
                return RelayOutcome::AuthFailure;
            }
        };
        let outcome = self.relay.send(request, Credential::Bearer(&token)).await;
        if outcome.is_auth_failure() {
            warn!(url = %request.url, "relay: backend rejected credentials");
            self.policy.trigger(&self.feedback, CredentialFailure::SessionExpired);
        }
        outcome
    }
}
