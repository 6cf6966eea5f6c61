//! Explicit authentication context for a signed-in dashboard user.
//!
//! The context is created once at startup, handed to whatever needs it, and
//! only changes through [`AuthContext::apply`].

use tracing::{debug, info, warn};

use super::profiles::{ProfileDirectory, UserProfile};
use super::provider::{IdentityError, IdentityProvider};
use super::session::Session;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum AuthStatus {
    #[default]
    Loading,
    Ready,
}

#[derive(Debug, Clone)]
pub enum AuthEvent {
    Loading,
    SignedIn { session: Session, user: UserProfile },
    Refreshed(Session),
    SignedOut,
}

#[derive(Debug, Clone, Default)]
pub struct AuthContext {
    status: AuthStatus,
    session: Option<Session>,
    user: Option<UserProfile>,
}

impl AuthContext {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn status(&self) -> AuthStatus { self.status }
    pub fn session(&self) -> Option<&Session> { self.session.as_ref() }
    pub fn user(&self) -> Option<&UserProfile> { self.user.as_ref() }

    /// The single transition function.
    pub fn apply(&mut self, event: AuthEvent) {
        match event {
            AuthEvent::Loading => self.status = AuthStatus::Loading,
            AuthEvent::SignedIn { session, user } => {
                self.session = Some(session);
                self.user = Some(user);
                self.status = AuthStatus::Ready;
            }
            AuthEvent::Refreshed(session) => {
                let same_subject = self.session.as_ref().map(|s| s.user.id == session.user.id).unwrap_or(false);
                if same_subject {
                    self.session = Some(session);
                } else {
                    debug!(user = %session.user.id, "auth_context.refresh ignored: no matching signed-in subject");
                }
            }
            AuthEvent::SignedOut => {
                self.session = None;
                self.user = None;
                self.status = AuthStatus::Ready;
            }
        }
    }

    /// Load the current session and resolve the user's profile.
    ///
    /// Always leaves the context `Ready`. A failed profile lookup produces a
    /// fallback profile from the session and a best-effort profile creation.
    pub async fn initialize(&mut self, provider: &dyn IdentityProvider, profiles: &dyn ProfileDirectory) {
        self.apply(AuthEvent::Loading);
        let session = match provider.get_session().await {
            Ok(Some(s)) if s.has_token() => s,
            Ok(_) => {
                info!("auth_context.init: no active session");
                self.apply(AuthEvent::SignedOut);
                return;
            }
            Err(e) => {
                warn!(error = %e, "auth_context.init: session lookup failed");
                self.apply(AuthEvent::SignedOut);
                return;
            }
        };

        let user = match profiles.find(&session.user.id, &session.access_token).await {
            Ok(profile) => UserProfile {
                id: session.user.id.clone(),
                email: session.user.email.clone().unwrap_or_default(),
                ..profile
            },
            Err(e) => {
                let fallback = UserProfile::fallback_for(&session.user);
                warn!(error = %e, role = fallback.role.as_str(), "auth_context.init: profile lookup failed, using fallback");
                if let Err(e) = profiles.create(&fallback, &session.access_token).await {
                    warn!(error = %e, "auth_context.init: profile creation failed");
                }
                fallback
            }
        };
        info!(user = %user.id, role = user.role.as_str(), "auth_context.init: signed in");
        self.apply(AuthEvent::SignedIn { session, user });
    }

    /// Sign out through the provider. Local state is cleared even if the provider call fails.
    pub async fn sign_out(&mut self, provider: &dyn IdentityProvider) -> Result<(), IdentityError> {
        let res = provider.sign_out().await;
        self.apply(AuthEvent::SignedOut);
        res
    }

    /// Where a visitor of the dashboard entry point should land.
    pub fn landing_path<'a>(&'a self, login_path: &'a str) -> &'a str {
        match &self.user {
            Some(u) => u.role.dashboard_path(),
            None => login_path,
        }
    }
}
