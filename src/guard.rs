//! Session guard: produces a currently valid bearer token for an outbound call.
//!
//! Every protected call asks the guard first. The guard reads a fresh session
//! snapshot from the identity provider, refreshes it once when it is close to
//! expiry, and reports a terminal failure when no usable token exists.
//!
//! Overlapping calls near the threshold may each trigger their own refresh.
//! Refresh is idempotent on the provider side, so this only costs extra
//! network calls.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use crate::identity::{BearerToken, IdentityProvider};

pub const DEFAULT_REFRESH_THRESHOLD: Duration = Duration::from_secs(300);

/// Per-attempt authorization result. Never stored.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthorizationDecision {
    Valid(BearerToken),
    RefreshedValid(BearerToken),
    Unavailable,
}

impl AuthorizationDecision {
    pub fn token(&self) -> Option<&str> {
        match self {
            AuthorizationDecision::Valid(t) | AuthorizationDecision::RefreshedValid(t) => Some(t.as_str()),
            AuthorizationDecision::Unavailable => None,
        }
    }
}

/// What to do with the current token when a refresh attempt fails.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum RefreshFallback {
    /// Keep sending the current token, even past its expiry; the backend decides.
    #[default]
    KeepCurrent,
    /// Keep the current token only while it has not expired.
    RequireUnexpired,
}

/// No valid token can be produced without the user signing in again.
#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("session invalid: sign in again")]
pub struct TerminalAuthFailure;

#[derive(Clone)]
pub struct SessionGuard {
    provider: Arc<dyn IdentityProvider>,
    refresh_threshold: Duration,
    fallback: RefreshFallback,
}

impl SessionGuard {
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        Self { provider, refresh_threshold: DEFAULT_REFRESH_THRESHOLD, fallback: RefreshFallback::default() }
    }

    pub fn with_fallback(mut self, fallback: RefreshFallback) -> Self {
        self.fallback = fallback;
        self
    }

    pub fn with_refresh_threshold(mut self, threshold: Duration) -> Self {
        self.refresh_threshold = threshold;
        self
    }

    pub fn refresh_threshold(&self) -> Duration {
        self.refresh_threshold
    }

    pub async fn obtain_authorized_token(&self) -> Result<BearerToken, TerminalAuthFailure> {
        match self.authorize().await {
            AuthorizationDecision::Valid(t) | AuthorizationDecision::RefreshedValid(t) => Ok(t),
            AuthorizationDecision::Unavailable => Err(TerminalAuthFailure),
        }
    }

    pub async fn authorize(&self) -> AuthorizationDecision {
        self.authorize_at(chrono::Utc::now().timestamp()).await
    }

    /// Decide against an explicit clock reading (epoch seconds).
    pub async fn authorize_at(&self, now: i64) -> AuthorizationDecision {
        let session = match self.provider.get_session().await {
            Ok(Some(s)) if s.has_token() => s,
            Ok(_) => {
                warn!("guard: no session or token missing");
                return AuthorizationDecision::Unavailable;
            }
            Err(e) => {
                warn!(error = %e, "guard: session lookup failed");
                return AuthorizationDecision::Unavailable;
            }
        };

        let Some(time_left) = session.seconds_left(now) else {
            debug!("guard: token present, expiry not available");
            return AuthorizationDecision::Valid(session.access_token);
        };
        debug!(minutes = time_left / 60, seconds = time_left % 60, "guard: token present");

        let threshold = i64::try_from(self.refresh_threshold.as_secs()).unwrap_or(i64::MAX);
        if time_left >= threshold {
            return AuthorizationDecision::Valid(session.access_token);
        }

        info!(time_left, "guard: token close to expiry, refreshing");
        match self.provider.refresh_session().await {
            Ok(fresh) if fresh.has_token() => {
                info!("guard: token refreshed");
                AuthorizationDecision::RefreshedValid(fresh.access_token)
            }
            Ok(_) => self.fall_back(session.access_token, time_left, "refresh returned no token"),
            Err(e) => self.fall_back(session.access_token, time_left, &e.to_string()),
        }
    }

    fn fall_back(&self, current: BearerToken, time_left: i64, reason: &str) -> AuthorizationDecision {
        if time_left >= 0 || self.fallback == RefreshFallback::KeepCurrent {
            warn!(reason, time_left, "guard: refresh failed, continuing with current token");
            AuthorizationDecision::Valid(current)
        } else {
            warn!(reason, time_left, "guard: refresh failed and token already expired");
            AuthorizationDecision::Unavailable
        }
    }
}

#[cfg(test)]
#[path = "guard_tests.rs"]
mod tests;
