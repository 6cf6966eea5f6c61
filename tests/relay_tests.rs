//! Authorized relay and API client integration tests against fake servers.

mod support;

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use reqwest::Method;
use serde_json::json;

use psicogate::client::{ApiClient, ClientError};
use psicogate::config::GatewayConfig;
use psicogate::guard::{RefreshFallback, SessionGuard};
use psicogate::identity::IdentityError;
use psicogate::relay::{AuthorizedRelay, ReauthPolicy, Relay, RelayOutcome, RelayRequest, UserFeedback};
use psicogate::server::router;
use support::{closed_url, gateway, now, session, FakeBackend, FakeProvider, FakeVerifier, RecordingFeedback};

const SHORT_DELAY: Duration = Duration::from_millis(20);

fn authorized(provider: Arc<FakeProvider>, feedback: Arc<RecordingFeedback>) -> AuthorizedRelay {
    authorized_with(SessionGuard::new(provider), feedback)
}

fn authorized_with(guard: SessionGuard, feedback: Arc<RecordingFeedback>) -> AuthorizedRelay {
    let relay = Relay::new(Duration::from_secs(5)).expect("relay client");
    let policy = ReauthPolicy { login_path: "/login".into(), redirect_delay: SHORT_DELAY };
    let feedback: Arc<dyn UserFeedback> = feedback;
    AuthorizedRelay::new(relay, guard, feedback, policy)
}

fn refresh_failure() -> Result<psicogate::identity::Session, IdentityError> {
    Err(IdentityError::Rejected { status: 400, message: "invalid refresh token".into() })
}

fn valid_session() -> Arc<FakeProvider> {
    FakeProvider::new(Some(session("live", Some(now() + 3_600))), refresh_failure())
}

async fn settle() {
    tokio::time::sleep(SHORT_DELAY * 5).await;
}

#[tokio::test]
async fn repeated_calls_yield_the_same_outcome() -> Result<()> {
    let backend = FakeBackend::start(200, r#"{"answer":"Hello"}"#).await;
    let relay = authorized(valid_session(), Arc::new(RecordingFeedback::default()));
    let request = RelayRequest::post(format!("{}/therapy-session", backend.url), json!({"query": "Ciao", "session_id": "s1"}));

    let outcomes = futures::future::join_all((0..3).map(|_| relay.invoke(&request))).await;
    for outcome in &outcomes {
        assert!(outcome.is_success());
        assert_eq!(outcome, &RelayOutcome::Success(json!({"answer": "Hello"})));
    }
    assert_eq!(backend.hit_count(), 3);
    assert!(backend.hits().iter().all(|h| h.authorization.as_deref() == Some("Bearer live")));
    Ok(())
}

#[tokio::test]
async fn absent_session_sends_nothing_and_schedules_login() -> Result<()> {
    let backend = FakeBackend::start(200, "{}").await;
    let feedback = Arc::new(RecordingFeedback::default());
    let relay = authorized(FakeProvider::new(None, refresh_failure()), feedback.clone());

    let outcome = relay.invoke(&RelayRequest::get(format!("{}/api/session-summary/s1", backend.url))).await;
    assert_eq!(outcome, RelayOutcome::AuthFailure);
    assert_eq!(backend.hit_count(), 0);
    assert_eq!(feedback.titles(), vec!["Sessione non valida".to_string()]);
    assert!(feedback.redirects().is_empty(), "redirect must wait for the delay");

    settle().await;
    assert_eq!(feedback.redirects(), vec!["/login".to_string()]);
    Ok(())
}

#[tokio::test]
async fn backend_rejection_notifies_session_expired() -> Result<()> {
    let backend = FakeBackend::start(401, r#"{"detail":"Not authenticated"}"#).await;
    let feedback = Arc::new(RecordingFeedback::default());
    let relay = authorized(valid_session(), feedback.clone());

    let outcome = relay.invoke(&RelayRequest::post(format!("{}/api/reset-session", backend.url), json!({"session_id": "s1"}))).await;
    assert_eq!(outcome, RelayOutcome::AuthFailure);
    settle().await;
    assert_eq!(feedback.titles(), vec!["Sessione scaduta".to_string()]);
    assert_eq!(feedback.redirects(), vec!["/login".to_string()]);
    Ok(())
}

#[tokio::test]
async fn remote_and_transport_failures_never_redirect() -> Result<()> {
    let backend = FakeBackend::start(500, r#"{"detail":"boom"}"#).await;
    let feedback = Arc::new(RecordingFeedback::default());
    let relay = authorized(valid_session(), feedback.clone());

    let outcome = relay.invoke(&RelayRequest::post(format!("{}/therapy-session", backend.url), json!({}))).await;
    assert_eq!(outcome, RelayOutcome::RemoteFailure { status: 500, message: "boom".into() });

    let outcome = relay.invoke(&RelayRequest::post(format!("{}/therapy-session", closed_url().await), json!({}))).await;
    assert!(matches!(outcome, RelayOutcome::TransportFailure(ref m) if !m.is_empty()));

    settle().await;
    assert!(feedback.redirects().is_empty());
    assert!(feedback.titles().is_empty());
    Ok(())
}

#[tokio::test]
async fn near_expiry_token_is_refreshed_before_the_call() -> Result<()> {
    let backend = FakeBackend::start(200, "{}").await;
    let provider = FakeProvider::new(Some(session("old", Some(now() + 60))), Ok(session("fresh", Some(now() + 3_600))));
    let relay = authorized(provider.clone(), Arc::new(RecordingFeedback::default()));

    relay.invoke(&RelayRequest::post(format!("{}/therapy-session", backend.url), json!({}))).await;
    assert_eq!(provider.refresh_calls(), 1);
    assert_eq!(backend.hits()[0].authorization.as_deref(), Some("Bearer fresh"));
    Ok(())
}

#[tokio::test]
async fn expired_token_with_failed_refresh_is_sent_by_default() -> Result<()> {
    let backend = FakeBackend::start(200, "{}").await;
    let provider = FakeProvider::new(Some(session("stale", Some(now() - 10))), refresh_failure());
    let relay = authorized(provider.clone(), Arc::new(RecordingFeedback::default()));

    relay.invoke(&RelayRequest::post(format!("{}/therapy-session", backend.url), json!({}))).await;
    assert_eq!(provider.refresh_calls(), 1);
    assert_eq!(backend.hits()[0].authorization.as_deref(), Some("Bearer stale"));
    Ok(())
}

#[tokio::test]
async fn strict_guard_never_sends_an_expired_token() -> Result<()> {
    let backend = FakeBackend::start(200, "{}").await;
    let provider = FakeProvider::new(Some(session("stale", Some(now() - 10))), refresh_failure());
    let feedback = Arc::new(RecordingFeedback::default());
    let guard = SessionGuard::new(provider.clone()).with_fallback(RefreshFallback::RequireUnexpired);
    let relay = authorized_with(guard, feedback.clone());

    let outcome = relay.invoke(&RelayRequest::post(format!("{}/therapy-session", backend.url), json!({}))).await;
    assert_eq!(outcome, RelayOutcome::AuthFailure);
    assert_eq!(provider.refresh_calls(), 1);
    assert_eq!(backend.hit_count(), 0);
    assert_eq!(feedback.titles(), vec!["Sessione non valida".to_string()]);
    Ok(())
}

#[tokio::test]
async fn empty_success_body_is_null() -> Result<()> {
    let backend = FakeBackend::start(200, "").await;
    let relay = Relay::new(Duration::from_secs(5))?;
    let outcome = relay
        .send(&RelayRequest { method: Method::DELETE, url: format!("{}/x", backend.url), body: None }, psicogate::relay::Credential::Bearer("t"))
        .await;
    assert_eq!(outcome, RelayOutcome::Success(serde_json::Value::Null));
    Ok(())
}

#[tokio::test]
async fn client_decodes_typed_responses() -> Result<()> {
    let gateway_fake = FakeBackend::start(200, r#"{"answer":"Ciao, come stai?","audio_url":"/audio/1.mp3"}"#).await;
    let client = ApiClient::new(authorized(valid_session(), Arc::new(RecordingFeedback::default())), &gateway_fake.url);

    let reply = client.send_message("Ciao", "s1", Some("calmo")).await?;
    assert_eq!(reply.answer, "Ciao, come stai?");
    assert_eq!(reply.audio_url.as_deref(), Some("/audio/1.mp3"));

    let hits = gateway_fake.hits();
    assert_eq!(hits[0].path, "/api/chat");
    assert_eq!(hits[0].body, json!({"query": "Ciao", "session_id": "s1", "mood": "calmo"}));
    Ok(())
}

#[tokio::test]
async fn client_reports_gateway_errors_with_operation_title() -> Result<()> {
    let gateway_fake = FakeBackend::start(500, r#"{"error":"Errore dal backend"}"#).await;
    let feedback = Arc::new(RecordingFeedback::default());
    let client = ApiClient::new(authorized(valid_session(), feedback.clone()), &gateway_fake.url);

    let err = client.reset_session("s1").await.unwrap_err();
    assert_eq!(err, ClientError::RemoteError { status: 500, message: "Errore dal backend".into() });
    assert_eq!(feedback.titles(), vec!["Errore nel reset della sessione".to_string()]);
    Ok(())
}

#[tokio::test]
async fn client_flags_undecodable_payloads() -> Result<()> {
    let gateway_fake = FakeBackend::start(200, r#"{"unexpected": true}"#).await;
    let feedback = Arc::new(RecordingFeedback::default());
    let client = ApiClient::new(authorized(valid_session(), feedback.clone()), &gateway_fake.url);

    let err = client.get_mood_analysis("s1").await.unwrap_err();
    assert!(matches!(err, ClientError::Decode(_)));
    assert_eq!(feedback.titles(), vec!["Errore nell'analisi dell'umore".to_string()]);
    Ok(())
}

#[tokio::test]
async fn client_auth_failure_is_session_invalid() -> Result<()> {
    let gateway_fake = FakeBackend::start(401, r#"{"error":"Utente non autenticato o sessione scaduta"}"#).await;
    let feedback = Arc::new(RecordingFeedback::default());
    let client = ApiClient::new(authorized(valid_session(), feedback.clone()), &gateway_fake.url);

    let err = client.get_pathology_analysis("s1").await.unwrap_err();
    assert_eq!(err, ClientError::SessionInvalid);
    settle().await;
    assert_eq!(feedback.titles(), vec!["Sessione scaduta".to_string()]);
    assert_eq!(feedback.redirects(), vec!["/login".to_string()]);
    Ok(())
}

#[tokio::test]
async fn client_through_gateway_to_backend() -> Result<()> {
    let backend = FakeBackend::start(200, r#"{"summary_html":"<h2>Riepilogo</h2>"}"#).await;
    let app = router(gateway(&backend.url, Arc::new(FakeVerifier::default())));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    let server = tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    let client = ApiClient::new(authorized(valid_session(), Arc::new(RecordingFeedback::default())), format!("http://{}", addr));
    let summary = client.get_session_summary("sessione 7").await?;
    assert_eq!(summary.summary_html, "<h2>Riepilogo</h2>");

    let hits = backend.hits();
    assert_eq!(hits[0].path, "/api/session-summary/sessione%207");
    assert_eq!(hits[0].authorization.as_deref(), Some("Bearer live"));
    server.abort();
    Ok(())
}

#[tokio::test]
async fn session_policy_comes_from_configuration() -> Result<()> {
    let gateway_fake = FakeBackend::start(200, r#"{"status":"ok","message":"reset"}"#).await;
    let mut config = GatewayConfig::new(&gateway_fake.url, "http://127.0.0.1:9", "anon")?;
    config.refresh_threshold = Duration::from_secs(60);
    config.redirect_delay = SHORT_DELAY;
    config.login_path = "/accesso".into();

    let provider = FakeProvider::new(Some(session("current", Some(now() + 120))), Ok(session("fresh", Some(now() + 3_600))));
    let relay = AuthorizedRelay::from_config(&config, provider.clone(), Arc::new(RecordingFeedback::default()))?;
    relay.invoke(&RelayRequest::post(format!("{}/api/reset-session", gateway_fake.url), json!({"session_id": "s1"}))).await;
    assert_eq!(provider.refresh_calls(), 0);
    assert_eq!(gateway_fake.hits()[0].authorization.as_deref(), Some("Bearer current"));

    let feedback = Arc::new(RecordingFeedback::default());
    let client = ApiClient::from_config(&config, FakeProvider::new(None, refresh_failure()), feedback.clone(), &gateway_fake.url)?;
    assert_eq!(client.reset_session("s1").await.unwrap_err(), ClientError::SessionInvalid);
    settle().await;
    assert_eq!(feedback.redirects(), vec!["/accesso".to_string()]);
    Ok(())
}
