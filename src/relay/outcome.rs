use serde_json::Value;

/// Tagged result of one outbound call, built once at the relay boundary.
#[derive(Debug, Clone, PartialEq)]
pub enum RelayOutcome {
    Success(Value),
    AuthFailure,
    RemoteFailure { status: u16, message: String },
    TransportFailure(String),
}

impl RelayOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, RelayOutcome::Success(_))
    }

    pub fn is_auth_failure(&self) -> bool {
        matches!(self, RelayOutcome::AuthFailure)
    }

    /// Short label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            RelayOutcome::Success(_) => "success",
            RelayOutcome::AuthFailure => "auth_failure",
            RelayOutcome::RemoteFailure { .. } => "remote_failure",
            RelayOutcome::TransportFailure(_) => "transport_failure",
        }
    }
}

/// Classify a received response.
///
/// 401 is an auth failure whatever the body says. Other non-2xx statuses carry
/// the best message the body offers. A 2xx body must be JSON (or empty).
pub fn classify(status: u16, body: &[u8]) -> RelayOutcome {
    if status == 401 {
        return RelayOutcome::AuthFailure;
    }
    if !(200..300).contains(&status) {
        return RelayOutcome::RemoteFailure { status, message: remote_message(status, body) };
    }
    if body.iter().all(|b| b.is_ascii_whitespace()) {
        return RelayOutcome::Success(Value::Null);
    }
    match serde_json::from_slice::<Value>(body) {
        Ok(v) => RelayOutcome::Success(v),
        Err(e) => RelayOutcome::TransportFailure(format!("invalid JSON in response: {}", e)),
    }
}

/// Message of a failed response: `detail`, then `error`, then `message`, then the raw text.
pub fn remote_message(status: u16, body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return generic_server_error(status);
    }
    let Ok(v) = serde_json::from_str::<Value>(trimmed) else {
        return trimmed.to_string();
    };
    for key in ["detail", "error", "message"] {
        match v.get(key) {
            Some(Value::String(s)) if !s.trim().is_empty() => return s.clone(),
            // FastAPI validation errors put a list under `detail`
            Some(other @ (Value::Array(_) | Value::Object(_))) if key == "detail" => return other.to_string(),
            _ => continue,
        }
    }
    generic_server_error(status)
}

pub fn generic_server_error(status: u16) -> String {
    format!("Errore del server ({})", status)
}
