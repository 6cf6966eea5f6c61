use super::*;
use crate::identity::{IdentityError, Session, SessionUser};
use async_trait::async_trait;
use parking_lot::Mutex;

const NOW: i64 = 1_700_000_000;

struct FakeProvider {
    current: Result<Option<Session>, IdentityError>,
    refreshed: Result<Session, IdentityError>,
    refresh_calls: Mutex<usize>,
}

impl FakeProvider {
    fn new(current: Option<Session>, refreshed: Result<Session, IdentityError>) -> Arc<Self> {
        Arc::new(Self { current: Ok(current), refreshed, refresh_calls: Mutex::new(0) })
    }
    fn refresh_calls(&self) -> usize { *self.refresh_calls.lock() }
}

#[async_trait]
impl IdentityProvider for FakeProvider {
    async fn get_session(&self) -> Result<Option<Session>, IdentityError> { self.current.clone() }
    async fn refresh_session(&self) -> Result<Session, IdentityError> {
        *self.refresh_calls.lock() += 1;
        self.refreshed.clone()
    }
    async fn sign_out(&self) -> Result<(), IdentityError> { Ok(()) }
}

fn session(token: &str, expires_at: Option<i64>) -> Session {
    Session {
        access_token: token.into(),
        refresh_token: Some("refresh".into()),
        expires_at,
        user: SessionUser { id: "u1".into(), ..Default::default() },
    }
}

fn refresh_failure() -> Result<Session, IdentityError> {
    Err(IdentityError::Rejected { status: 400, message: "invalid refresh token".into() })
}

#[tokio::test]
async fn distant_expiry_never_refreshes() {
    for time_left in [300, 301, 3_600, 86_400] {
        let p = FakeProvider::new(Some(session("old", Some(NOW + time_left))), Ok(session("new", None)));
        let guard = SessionGuard::new(p.clone());
        assert_eq!(guard.authorize_at(NOW).await, AuthorizationDecision::Valid("old".into()));
        assert_eq!(p.refresh_calls(), 0, "time_left={}", time_left);
    }
}

#[tokio::test]
async fn near_expiry_refreshes_exactly_once_and_uses_new_token() {
    for time_left in [0, 1, 120, 299] {
        let p = FakeProvider::new(Some(session("old", Some(NOW + time_left))), Ok(session("new", Some(NOW + 3_600))));
        let guard = SessionGuard::new(p.clone());
        assert_eq!(guard.authorize_at(NOW).await, AuthorizationDecision::RefreshedValid("new".into()));
        assert_eq!(p.refresh_calls(), 1, "time_left={}", time_left);
    }
}

#[tokio::test]
async fn failed_refresh_keeps_the_current_token() {
    for time_left in [0, 10, 299] {
        let p = FakeProvider::new(Some(session("old", Some(NOW + time_left))), refresh_failure());
        let guard = SessionGuard::new(p.clone());
        assert_eq!(guard.authorize_at(NOW).await, AuthorizationDecision::Valid("old".into()));
        assert_eq!(p.refresh_calls(), 1);
    }
}

#[tokio::test]
async fn failed_refresh_of_an_expired_token_keeps_it_by_default() {
    let p = FakeProvider::new(Some(session("old", Some(NOW - 5))), refresh_failure());
    let guard = SessionGuard::new(p.clone());
    assert_eq!(guard.authorize_at(NOW).await, AuthorizationDecision::Valid("old".into()));
    assert_eq!(p.refresh_calls(), 1);
}

#[tokio::test]
async fn failed_refresh_of_an_expired_token_is_terminal_when_strict() {
    let p = FakeProvider::new(Some(session("old", Some(NOW - 5))), refresh_failure());
    let guard = SessionGuard::new(p.clone()).with_fallback(RefreshFallback::RequireUnexpired);
    assert_eq!(guard.authorize_at(NOW).await, AuthorizationDecision::Unavailable);
    assert_eq!(p.refresh_calls(), 1);

    let p = FakeProvider::new(Some(session("old", Some(NOW))), refresh_failure());
    let guard = SessionGuard::new(p).with_fallback(RefreshFallback::RequireUnexpired);
    assert_eq!(guard.authorize_at(NOW).await, AuthorizationDecision::Valid("old".into()));
}

#[tokio::test]
async fn missing_expiry_returns_token_as_is() {
    let p = FakeProvider::new(Some(session("old", None)), Ok(session("new", None)));
    let guard = SessionGuard::new(p.clone());
    assert_eq!(guard.authorize_at(NOW).await, AuthorizationDecision::Valid("old".into()));
    assert_eq!(p.refresh_calls(), 0);
}

#[tokio::test]
async fn absent_session_is_terminal() {
    let p = FakeProvider::new(None, Ok(session("new", None)));
    let guard = SessionGuard::new(p.clone());
    assert_eq!(guard.obtain_authorized_token().await, Err(TerminalAuthFailure));
    assert_eq!(p.refresh_calls(), 0);
}

#[tokio::test]
async fn empty_token_is_terminal() {
    let p = FakeProvider::new(Some(session("  ", Some(NOW + 10_000))), Ok(session("new", None)));
    assert_eq!(SessionGuard::new(p).authorize_at(NOW).await, AuthorizationDecision::Unavailable);
}

#[tokio::test]
async fn provider_error_is_terminal_without_retry() {
    let p = Arc::new(FakeProvider {
        current: Err(IdentityError::Transport("connection refused".into())),
        refreshed: Ok(session("new", None)),
        refresh_calls: Mutex::new(0),
    });
    let guard = SessionGuard::new(p.clone());
    assert_eq!(guard.authorize_at(NOW).await, AuthorizationDecision::Unavailable);
    assert_eq!(p.refresh_calls(), 0);
}

#[tokio::test]
async fn threshold_is_configurable() {
    let p = FakeProvider::new(Some(session("old", Some(NOW + 100))), Ok(session("new", None)));
    let guard = SessionGuard::new(p.clone()).with_refresh_threshold(Duration::from_secs(60));
    assert_eq!(guard.authorize_at(NOW).await.token(), Some("old"));
    assert_eq!(p.refresh_calls(), 0);
}

#[tokio::test]
async fn overlapping_calls_refresh_independently() {
    let p = FakeProvider::new(Some(session("old", Some(NOW + 30))), Ok(session("new", Some(NOW + 3_600))));
    let guard = SessionGuard::new(p.clone());
    let (a, b) = futures::future::join(guard.authorize_at(NOW), guard.authorize_at(NOW)).await;
    assert_eq!(a, AuthorizationDecision::RefreshedValid("new".into()));
    assert_eq!(b, AuthorizationDecision::RefreshedValid("new".into()));
    assert_eq!(p.refresh_calls(), 2);
}
