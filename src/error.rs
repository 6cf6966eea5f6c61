//! Gateway error model for the inbound HTTP boundary.
//! Every failure a route proxy reports is one of these categories and renders
//! as `{ "error": <message> }` with the category's status code.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter};

use crate::relay::RelayOutcome;

pub const MSG_SESSION_EXPIRED: &str = "Utente non autenticato o sessione scaduta";
pub const MSG_NOT_AUTHENTICATED: &str = "Utente non autenticato";
pub const MSG_TOKEN_MISSING: &str = "Token di autenticazione mancante";
pub const MSG_INTERNAL: &str = "Errore interno del server";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum AppError {
    MissingField { field: String, message: String },
    InvalidBody { message: String },
    MissingCredential { message: String },
    ExpiredCredential { message: String },
    Remote { status: u16, message: String },
    Transport { message: String },
    Internal { message: String },
}

impl AppError {
    pub fn message(&self) -> &str {
        match self {
            AppError::MissingField { message, .. }
            | AppError::InvalidBody { message }
            | AppError::MissingCredential { message }
            | AppError::ExpiredCredential { message }
            | AppError::Remote { message, .. }
            | AppError::Transport { message }
            | AppError::Internal { message } => message.as_str(),
        }
    }

    pub fn code_str(&self) -> &'static str {
        match self {
            AppError::MissingField { .. } => "missing_field",
            AppError::InvalidBody { .. } => "invalid_body",
            AppError::MissingCredential { .. } => "missing_credential",
            AppError::ExpiredCredential { .. } => "expired_credential",
            AppError::Remote { .. } => "remote_error",
            AppError::Transport { .. } => "transport_error",
            AppError::Internal { .. } => "internal_error",
        }
    }

    pub fn missing_field<S: Into<String>>(field: S, msg: S) -> Self { AppError::MissingField { field: field.into(), message: msg.into() } }
    pub fn invalid_body<S: Into<String>>(msg: S) -> Self { AppError::InvalidBody { message: msg.into() } }
    pub fn missing_credential<S: Into<String>>(msg: S) -> Self { AppError::MissingCredential { message: msg.into() } }
    pub fn expired_credential() -> Self { AppError::ExpiredCredential { message: MSG_SESSION_EXPIRED.into() } }
    pub fn remote<S: Into<String>>(status: u16, msg: S) -> Self { AppError::Remote { status, message: msg.into() } }
    pub fn transport<S: Into<String>>(msg: S) -> Self { AppError::Transport { message: msg.into() } }

    /// Unexpected failure; an empty message is replaced by the generic one.
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        let message: String = msg.into();
        let message = if message.trim().is_empty() { MSG_INTERNAL.to_string() } else { message };
        AppError::Internal { message }
    }

    /// Map to HTTP status code. Relayed backend failures keep the upstream status.
    pub fn http_status(&self) -> u16 {
        match self {
            AppError::MissingField { .. } | AppError::InvalidBody { .. } => 400,
            AppError::MissingCredential { .. } | AppError::ExpiredCredential { .. } => 401,
            AppError::Remote { status, .. } => *status,
            AppError::Transport { .. } | AppError::Internal { .. } => 500,
        }
    }

    /// Error side of a relay outcome; `None` for success.
    pub fn from_outcome(outcome: &RelayOutcome) -> Option<Self> {
        match outcome {
            RelayOutcome::Success(_) => None,
            RelayOutcome::AuthFailure => Some(AppError::expired_credential()),
            RelayOutcome::RemoteFailure { status, message } => Some(AppError::remote(*status, message.as_str())),
            RelayOutcome::TransportFailure(message) => Some(AppError::transport(message.as_str())),
        }
    }
}

impl Display for AppError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code_str(), self.message())
    }
}

impl std::error::Error for AppError {}

pub type AppResult<T> = Result<T, AppError>;

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        AppError::internal(err.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.http_status()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(serde_json::json!({ "error": self.message() }))).into_response()
    }
}

#[cfg(test)]
#[path = "error_tests.rs"]
mod tests;
