use std::sync::Arc;
use std::time::Duration;

use tracing::{info, warn};

pub const DEFAULT_REDIRECT_DELAY: Duration = Duration::from_millis(1500);
pub const DEFAULT_LOGIN_PATH: &str = "/login";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationLevel {
    Info,
    Error,
}

/// Non-blocking message shown to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub level: NotificationLevel,
    pub title: String,
    pub description: Option<String>,
}

impl Notification {
    pub fn error(title: impl Into<String>, description: Option<String>) -> Self {
        Self { level: NotificationLevel::Error, title: title.into(), description }
    }
}

/// Surface through which the relay talks back to the user: notifications and navigation.
pub trait UserFeedback: Send + Sync {
    fn notify(&self, notification: Notification);
    fn redirect(&self, target: &str);
}

/// Feedback sink for headless callers: everything goes to the log.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingFeedback;

impl UserFeedback for TracingFeedback {
    fn notify(&self, n: Notification) {
        match n.level {
            NotificationLevel::Info => info!(title = %n.title, description = ?n.description, "notify"),
            NotificationLevel::Error => warn!(title = %n.title, description = ?n.description, "notify"),
        }
    }

    fn redirect(&self, target: &str) {
        info!(target_path = target, "redirect");
    }
}

/// Why the user must sign in again.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialFailure {
    /// No usable token could be produced locally.
    SessionInvalid,
    /// The backend rejected the token.
    SessionExpired,
}

impl CredentialFailure {
    pub fn notification(self) -> Notification {
        let title = match self {
            CredentialFailure::SessionInvalid => "Sessione non valida",
            CredentialFailure::SessionExpired => "Sessione scaduta",
        };
        Notification::error(title, Some("Effettua nuovamente il login".to_string()))
    }

    pub fn message(self) -> &'static str {
        match self {
            CredentialFailure::SessionInvalid => "Sessione non valida, effettua nuovamente il login",
            CredentialFailure::SessionExpired => "Sessione scaduta, effettua nuovamente il login",
        }
    }
}

/// Where and when to send the user after a credential failure.
#[derive(Debug, Clone)]
pub struct ReauthPolicy {
    pub login_path: String,
    pub redirect_delay: Duration,
}

impl Default for ReauthPolicy {
    fn default() -> Self {
        Self { login_path: DEFAULT_LOGIN_PATH.to_string(), redirect_delay: DEFAULT_REDIRECT_DELAY }
    }
}

impl ReauthPolicy {
    /// Notify now and navigate to the login path once the delay has elapsed.
    pub fn trigger(&self, feedback: &Arc<dyn UserFeedback>, failure: CredentialFailure) {
        info!(reason = failure.message(), login = %self.login_path, delay_ms = self.redirect_delay.as_millis() as u64, "reauth: scheduling redirect");
        feedback.notify(failure.notification());
        let feedback = Arc::clone(feedback);
        let target = self.login_path.clone();
        let delay = self.redirect_delay;
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    tokio::time::sleep(delay).await;
                    feedback.redirect(&target);
                });
            }
            Err(e) => {
                warn!(error = %e, login = %target, "reauth: no async runtime, redirecting without delay");
                feedback.redirect(&target);
            }
        }
    }
}
