//! Shared fakes for integration tests: a recording backend served by axum on
//! an ephemeral port, a token verifier, an identity provider and a feedback sink.
#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Bytes;
use axum::extract::State;
use axum::http::{header, HeaderMap, Method, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use parking_lot::Mutex;
use serde_json::Value;
use tokio::task::JoinHandle;

use psicogate::config::GatewayConfig;
use psicogate::identity::{IdentityError, IdentityProvider, Session, SessionUser, TokenVerifier};
use psicogate::relay::{Notification, Relay, UserFeedback};
use psicogate::server::GatewayState;

/// One request as seen by the fake backend.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: Method,
    pub path: String,
    pub authorization: Option<String>,
    pub body: Value,
}

#[derive(Clone)]
struct BackendState {
    status: u16,
    body: Arc<str>,
    hits: Arc<Mutex<Vec<Recorded>>>,
}

pub struct FakeBackend {
    pub url: String,
    hits: Arc<Mutex<Vec<Recorded>>>,
    handle: JoinHandle<()>,
}

impl FakeBackend {
    /// Answer every request with `status` and `body`.
    pub async fn start(status: u16, body: &str) -> FakeBackend {
        let hits = Arc::new(Mutex::new(Vec::new()));
        let state = BackendState { status, body: Arc::from(body), hits: hits.clone() };
        let app = Router::new().fallback(record).with_state(state);
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind 127.0.0.1:0");
        let addr = listener.local_addr().expect("local addr");
        let handle = tokio::spawn(async move {
            let _ = axum::serve(listener, app).await;
        });
        FakeBackend { url: format!("http://{}", addr), hits, handle }
    }

    pub fn hits(&self) -> Vec<Recorded> {
        self.hits.lock().clone()
    }

    pub fn hit_count(&self) -> usize {
        self.hits.lock().len()
    }
}

impl Drop for FakeBackend {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn record(State(state): State<BackendState>, method: Method, uri: Uri, headers: HeaderMap, body: Bytes) -> Response {
    let authorization = headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()).map(str::to_string);
    let body = serde_json::from_slice(&body).unwrap_or(Value::Null);
    state.hits.lock().push(Recorded { method, path: uri.path().to_string(), authorization, body });
    let status = StatusCode::from_u16(state.status).expect("status");
    (status, [(header::CONTENT_TYPE, "application/json")], state.body.to_string()).into_response()
}

/// Address nothing listens on.
pub async fn closed_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.expect("bind");
    let addr = listener.local_addr().expect("addr");
    drop(listener);
    format!("http://{}", addr)
}

/// Accepts exactly `good-token`.
#[derive(Default)]
pub struct FakeVerifier {
    pub calls: Mutex<usize>,
}

pub const GOOD_TOKEN: &str = "good-token";

#[async_trait]
impl TokenVerifier for FakeVerifier {
    async fn get_user(&self, access_token: &str) -> Result<SessionUser, IdentityError> {
        *self.calls.lock() += 1;
        if access_token == GOOD_TOKEN {
            Ok(SessionUser { id: "user-1".into(), email: Some("paziente@example.com".into()), ..Default::default() })
        } else {
            Err(IdentityError::Rejected { status: 401, message: "invalid JWT".into() })
        }
    }
}

pub fn gateway(backend_url: &str, verifier: Arc<FakeVerifier>) -> GatewayState {
    let config = GatewayConfig::new(backend_url, "http://127.0.0.1:9", "anon").expect("config");
    let relay = Relay::new(Duration::from_secs(5)).expect("relay client");
    GatewayState::new(&config, relay, verifier)
}

/// Identity provider holding one fixed session and a fixed refresh result.
pub struct FakeProvider {
    pub current: Option<Session>,
    pub refreshed: Result<Session, IdentityError>,
    pub refresh_calls: Mutex<usize>,
}

impl FakeProvider {
    pub fn new(current: Option<Session>, refreshed: Result<Session, IdentityError>) -> Arc<Self> {
        Arc::new(Self { current, refreshed, refresh_calls: Mutex::new(0) })
    }

    pub fn refresh_calls(&self) -> usize {
        *self.refresh_calls.lock()
    }
}

#[async_trait]
impl IdentityProvider for FakeProvider {
    async fn get_session(&self) -> Result<Option<Session>, IdentityError> {
        Ok(self.current.clone())
    }

    async fn refresh_session(&self) -> Result<Session, IdentityError> {
        *self.refresh_calls.lock() += 1;
        self.refreshed.clone()
    }

    async fn sign_out(&self) -> Result<(), IdentityError> {
        Ok(())
    }
}

pub fn session(token: &str, expires_at: Option<i64>) -> Session {
    Session {
        access_token: token.into(),
        refresh_token: Some("refresh".into()),
        expires_at,
        user: SessionUser { id: "user-1".into(), ..Default::default() },
    }
}

pub fn now() -> i64 {
    chrono::Utc::now().timestamp()
}

/// Feedback sink that records notifications and redirects.
#[derive(Default)]
pub struct RecordingFeedback {
    pub notifications: Mutex<Vec<Notification>>,
    pub redirects: Mutex<Vec<String>>,
}

impl UserFeedback for RecordingFeedback {
    fn notify(&self, notification: Notification) {
        self.notifications.lock().push(notification);
    }

    fn redirect(&self, target: &str) {
        self.redirects.lock().push(target.to_string());
    }
}

impl RecordingFeedback {
    pub fn titles(&self) -> Vec<String> {
        self.notifications.lock().iter().map(|n| n.title.clone()).collect()
    }

    pub fn redirects(&self) -> Vec<String> {
        self.redirects.lock().clone()
    }
}
