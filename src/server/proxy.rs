//! Route proxies.
//!
//! Every handler is a one-line configuration over [`forward`]: validate the
//! required fields, resolve the caller's credential, relay to the backend and
//! map the outcome to the gateway's error model.

use std::panic::AssertUnwindSafe;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::http::header::AUTHORIZATION;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use futures_util::FutureExt;
use serde_json::{Map, Value};
use tracing::{info, info_span, warn, Instrument};
use uuid::Uuid;

use super::GatewayState;
use crate::capability::{Capability, CredentialMode};
use crate::error::{AppError, AppResult, MSG_NOT_AUTHENTICATED, MSG_TOKEN_MISSING};
use crate::identity::{access_token_from_cookie, parse_cookie};
use crate::relay::{Credential, RelayOutcome, RelayRequest};

pub async fn chat(State(state): State<GatewayState>, headers: HeaderMap, body: Bytes) -> Response {
    forward_body(&state, Capability::ChatTurn, &headers, &body).await
}

pub async fn recommend_resources(State(state): State<GatewayState>, headers: HeaderMap, body: Bytes) -> Response {
    forward_body(&state, Capability::RecommendResources, &headers, &body).await
}

pub async fn session_summary(
    State(state): State<GatewayState>,
    Path(session_id): Path<String>,
    headers: HeaderMap,
) -> Response {
    let mut payload = Map::new();
    payload.insert("session_id".to_string(), Value::String(session_id));
    forward(&state, Capability::SessionSummary, &headers, payload).await
}

pub async fn mood_analysis(State(state): State<GatewayState>, headers: HeaderMap, body: Bytes) -> Response {
    forward_body(&state, Capability::MoodAnalysis, &headers, &body).await
}

pub async fn pathology_analysis(State(state): State<GatewayState>, headers: HeaderMap, body: Bytes) -> Response {
    forward_body(&state, Capability::PathologyAnalysis, &headers, &body).await
}

pub async fn reset_session(State(state): State<GatewayState>, headers: HeaderMap, body: Bytes) -> Response {
    forward_body(&state, Capability::ResetSession, &headers, &body).await
}

async fn forward_body(state: &GatewayState, capability: Capability, headers: &HeaderMap, body: &[u8]) -> Response {
    match parse_payload(body) {
        Ok(payload) => forward(state, capability, headers, payload).await,
        Err(e) => {
            warn!(capability = capability.name(), error = %e, "proxy: malformed request body");
            e.into_response()
        }
    }
}

/// Inbound JSON body as an object. An empty body or a non-object value is an
/// empty payload, which then fails required-field validation.
fn parse_payload(body: &[u8]) -> AppResult<Map<String, Value>> {
    if body.iter().all(u8::is_ascii_whitespace) {
        return Ok(Map::new());
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(Value::Object(map)) => Ok(map),
        Ok(_) => Ok(Map::new()),
        Err(e) => Err(AppError::invalid_body(e.to_string())),
    }
}

/// Relay one capability call and render the result.
pub async fn forward(state: &GatewayState, capability: Capability, headers: &HeaderMap, payload: Map<String, Value>) -> Response {
    let span = info_span!("proxy", capability = capability.name(), request_id = %Uuid::new_v4());
    let call = relay_capability(state, capability, headers, &payload);
    let result = match AssertUnwindSafe(call).catch_unwind().instrument(span.clone()).await {
        Ok(r) => r,
        Err(panic) => Err(AppError::internal(panic_message(panic.as_ref()))),
    };
    let _entered = span.enter();
    match result {
        Ok(value) => {
            info!("proxy: relayed");
            (StatusCode::OK, Json(value)).into_response()
        }
        Err(e) => {
            warn!(status = e.http_status(), code = e.code_str(), error = %e.message(), "proxy: failed");
            e.into_response()
        }
    }
}

async fn relay_capability(
    state: &GatewayState,
    capability: Capability,
    headers: &HeaderMap,
    payload: &Map<String, Value>,
) -> AppResult<Value> {
    if let Some(field) = capability.missing_field(payload) {
        return Err(AppError::missing_field(field.name, field.message));
    }
    let caller = resolve_caller(state, capability, headers).await?;
    let request = RelayRequest {
        method: capability.descriptor().method.as_reqwest(),
        url: capability.backend_url(&state.backend_url, payload),
        body: capability.shape_payload(payload),
    };
    match state.relay.send(&request, caller.credential()).await {
        RelayOutcome::Success(value) => Ok(value),
        failure => Err(AppError::from_outcome(&failure).unwrap_or_else(|| AppError::internal(""))),
    }
}

/// Where the outbound credential came from.
enum Caller {
    /// Inbound `Authorization` header, forwarded verbatim.
    Header(String),
    /// Access token from the session cookie, verified with the identity provider.
    Cookie(String),
}

impl Caller {
    fn credential(&self) -> Credential<'_> {
        match self {
            Caller::Header(h) => Credential::Forwarded(h),
            Caller::Cookie(t) => Credential::Bearer(t),
        }
    }
}

async fn resolve_caller(state: &GatewayState, capability: Capability, headers: &HeaderMap) -> AppResult<Caller> {
    let header = headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .filter(|v| !v.trim().is_empty());
    if let Some(h) = header {
        return Ok(Caller::Header(h.to_string()));
    }
    match capability.descriptor().credential {
        CredentialMode::PassThrough => Err(AppError::missing_credential(MSG_TOKEN_MISSING)),
        CredentialMode::BearerOrCookie => {
            let token = parse_cookie(headers, &state.session_cookie)
                .and_then(|raw| access_token_from_cookie(&raw))
                .ok_or_else(|| AppError::missing_credential(MSG_NOT_AUTHENTICATED))?;
            match state.verifier.get_user(&token).await {
                Ok(user) => {
                    tracing::debug!(user_id = %user.id, "proxy: cookie session verified");
                    Ok(Caller::Cookie(token))
                }
                Err(e) => Err(AppError::missing_credential(format!("Errore di autenticazione: {}", e.message()))),
            }
        }
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        String::new()
    }
}
