//!
//! psicogate HTTP server
//! ---------------------
//! Axum router in front of the therapy backend.
//!
//! Responsibilities:
//! - Route proxies for every backend capability (`/api/...`), see [`proxy`].
//! - Page guard redirecting unauthenticated visitors of dashboard pages, see [`page_guard`].
//! - Health route and optional static dashboard assets.
//! - Startup: HTTP clients, identity client, configuration log, listener.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use axum::routing::{get, post};
use axum::{middleware, Json, Router};
use serde_json::json;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::capability::Capability;
use crate::config::GatewayConfig;
use crate::identity::{GoTrueClient, TokenVerifier};
use crate::relay::Relay;

pub mod page_guard;
pub mod proxy;

/// Shared state injected into all handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub relay: Relay,
    /// Verifies session-cookie tokens with the identity provider.
    pub verifier: Arc<dyn TokenVerifier>,
    /// Backend base URL without trailing slash.
    pub backend_url: String,
    pub session_cookie: String,
    pub login_path: String,
    pub protected_prefixes: Arc<Vec<String>>,
    pub static_dir: Option<PathBuf>,
}

impl GatewayState {
    pub fn new(config: &GatewayConfig, relay: Relay, verifier: Arc<dyn TokenVerifier>) -> Self {
        Self {
            relay,
            verifier,
            backend_url: config.backend_url.trim_end_matches('/').to_string(),
            session_cookie: config.session_cookie.clone(),
            login_path: config.login_path.clone(),
            protected_prefixes: Arc::new(config.protected_prefixes.clone()),
            static_dir: config.static_dir.clone(),
        }
    }
}

/// Build the full router: proxies, health, page guard and optional static assets.
pub fn router(state: GatewayState) -> Router {
    let mut app = Router::new()
        .route("/health", get(health))
        .route(Capability::ChatTurn.descriptor().route, post(proxy::chat))
        .route(Capability::RecommendResources.descriptor().route, post(proxy::recommend_resources))
        .route(Capability::SessionSummary.descriptor().route, get(proxy::session_summary))
        .route(Capability::MoodAnalysis.descriptor().route, post(proxy::mood_analysis))
        .route(Capability::PathologyAnalysis.descriptor().route, post(proxy::pathology_analysis))
        .route(Capability::ResetSession.descriptor().route, post(proxy::reset_session));
    if let Some(dir) = &state.static_dir {
        app = app.fallback_service(ServeDir::new(dir).append_index_html_on_directories(true));
    }
    app.layer(middleware::from_fn_with_state(state.clone(), page_guard::require_session))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(json!({ "status": "ok", "service": "psicogate" }))
}

fn log_startup(config: &GatewayConfig) {
    info!(
        target: "startup",
        "psicogate starting: http_port={}, backend_url={}, identity_url={}, login_path={}, session_cookie={}, static_dir={:?}",
        config.http_port, config.backend_url, config.identity_url, config.login_path, config.session_cookie, config.static_dir
    );
    info!(
        target: "startup",
        "Gateway policy: request_timeout={}s, protected_prefixes={:?}",
        config.request_timeout.as_secs(),
        config.protected_prefixes
    );
}

/// Start the gateway bound to `config.http_port` on all interfaces.
pub async fn run(config: GatewayConfig) -> anyhow::Result<()> {
    log_startup(&config);

    let relay = Relay::new(config.request_timeout).context("While building the backend HTTP client")?;
    let identity = GoTrueClient::new(&config.identity_url, config.identity_anon_key.clone(), config.request_timeout)
        .with_context(|| format!("While building the identity client for {}", config.identity_url))?;
    let state = GatewayState::new(&config, relay, Arc::new(identity));
    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.http_port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind HTTP listener on {}", addr))?;
    info!(target: "startup", "psicogate listening on http://{}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}
