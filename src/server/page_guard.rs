//! Page access middleware: dashboard pages need a verified session cookie.

use axum::extract::{Request, State};
use axum::middleware::Next;
use axum::response::{IntoResponse, Redirect, Response};
use tracing::{debug, warn};

use super::GatewayState;
use crate::identity::{access_token_from_cookie, parse_cookie};

/// Path as the static file service will resolve it: percent-decoded, empty
/// and `.` segments dropped, `..` applied. `None` when decoding fails.
pub fn normalize_path(raw: &str) -> Option<String> {
    let decoded = urlencoding::decode(raw).ok()?;
    let mut segments: Vec<&str> = Vec::new();
    for segment in decoded.split('/') {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            s => segments.push(s),
        }
    }
    let mut path = format!("/{}", segments.join("/"));
    if decoded.ends_with('/') && path.len() > 1 {
        path.push('/');
    }
    Some(path)
}

/// True when `path` is `prefix` itself or lies below it.
pub fn is_protected(path: &str, prefixes: &[String]) -> bool {
    if path == "/api" || path.starts_with("/api/") {
        return false;
    }
    prefixes.iter().any(|p| {
        let p = p.trim_end_matches('/');
        path == p || path.strip_prefix(p).is_some_and(|rest| rest.starts_with('/'))
    })
}

pub async fn require_session(State(state): State<GatewayState>, request: Request, next: Next) -> Response {
    let raw = request.uri().path().to_string();
    let path = match normalize_path(&raw) {
        Some(p) => p,
        None => {
            warn!(path = %raw, "page guard: undecodable path");
            return Redirect::to(&state.login_path).into_response();
        }
    };
    if path.trim_end_matches('/') == state.login_path || !is_protected(&path, &state.protected_prefixes) {
        return next.run(request).await;
    }
    let token = parse_cookie(request.headers(), &state.session_cookie).and_then(|raw| access_token_from_cookie(&raw));
    let verified = match token {
        None => false,
        Some(token) => match state.verifier.get_user(&token).await {
            Ok(_) => true,
            Err(e) => {
                warn!(path = %path, error = %e.message(), "page guard: session verification failed");
                false
            }
        },
    };
    if verified {
        next.run(request).await
    } else {
        debug!(path = %path, login = %state.login_path, "page guard: redirecting to login");
        Redirect::to(&state.login_path).into_response()
    }
}
