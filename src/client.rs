//! Typed API client for the gateway's `/api` routes.
//!
//! Calls go through an [`AuthorizedRelay`], so every request carries a
//! guarded bearer token and credential failures trigger the re-login flow.
//! Other failures are reported to the user with a per-operation title.

use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::capability::models::{
    AnalysisRequest, ChatRequest, ChatResponse, MoodAnalysisResponse, PathologyAnalysisResponse, ResetSessionRequest,
    ResetSessionResponse, ResourcesRequest, ResourcesResponse, SessionSummaryResponse,
};
use crate::capability::Capability;
use crate::config::GatewayConfig;
use crate::identity::IdentityProvider;
use crate::relay::{AuthorizedRelay, Notification, RelayOutcome, RelayRequest, UserFeedback};

#[derive(Debug, Clone, Error, PartialEq)]
pub enum ClientError {
    #[error("Sessione non valida, effettua nuovamente il login")]
    SessionInvalid,
    #[error("{message}")]
    RemoteError { status: u16, message: String },
    #[error("errore di rete: {0}")]
    Transport(String),
    #[error("risposta non valida: {0}")]
    Decode(String),
}

#[derive(Clone)]
pub struct ApiClient {
    relay: AuthorizedRelay,
    /// Gateway base URL; routes are appended to it.
    base: String,
}

impl ApiClient {
    pub fn new(relay: AuthorizedRelay, base: impl Into<String>) -> Self {
        let base: String = base.into();
        Self { relay, base: base.trim_end_matches('/').to_string() }
    }

    /// Client for the gateway at `base` with session policy from `config`.
    pub fn from_config(
        config: &GatewayConfig,
        provider: Arc<dyn IdentityProvider>,
        feedback: Arc<dyn UserFeedback>,
        base: impl Into<String>,
    ) -> Result<Self, ClientError> {
        let relay = AuthorizedRelay::from_config(config, provider, feedback).map_err(|e| ClientError::Transport(e.to_string()))?;
        Ok(Self::new(relay, base))
    }

    pub async fn send_message(&self, message: &str, session_id: &str, mood: Option<&str>) -> Result<ChatResponse, ClientError> {
        let body = ChatRequest { query: message.to_string(), session_id: session_id.to_string(), mood: mood.map(str::to_string) };
        self.call(Capability::ChatTurn, &body, "Errore nell'invio del messaggio").await
    }

    pub async fn reset_session(&self, session_id: &str) -> Result<ResetSessionResponse, ClientError> {
        let body = ResetSessionRequest { session_id: session_id.to_string() };
        self.call(Capability::ResetSession, &body, "Errore nel reset della sessione").await
    }

    pub async fn get_session_summary(&self, session_id: &str) -> Result<SessionSummaryResponse, ClientError> {
        let body = serde_json::json!({ "session_id": session_id });
        self.call(Capability::SessionSummary, &body, "Errore nel recupero del riepilogo").await
    }

    pub async fn get_resource_recommendations(&self, query: &str, session_id: &str) -> Result<ResourcesResponse, ClientError> {
        let body = ResourcesRequest { query: query.to_string(), session_id: session_id.to_string() };
        self.call(Capability::RecommendResources, &body, "Errore nel recupero delle risorse").await
    }

    pub async fn get_mood_analysis(&self, session_id: &str) -> Result<MoodAnalysisResponse, ClientError> {
        let body = AnalysisRequest { session_id: session_id.to_string(), analyze_chatbot: true };
        self.call(Capability::MoodAnalysis, &body, "Errore nell'analisi dell'umore").await
    }

    pub async fn get_pathology_analysis(&self, session_id: &str) -> Result<PathologyAnalysisResponse, ClientError> {
        let body = AnalysisRequest { session_id: session_id.to_string(), analyze_chatbot: true };
        self.call(Capability::PathologyAnalysis, &body, "Errore nell'analisi delle patologie").await
    }

    async fn call<B: Serialize, T: DeserializeOwned>(&self, capability: Capability, body: &B, title: &str) -> Result<T, ClientError> {
        let payload = match serde_json::to_value(body) {
            Ok(Value::Object(map)) => map,
            Ok(_) => Map::new(),
            Err(e) => return Err(self.report(title, ClientError::Decode(e.to_string()))),
        };
        let request = RelayRequest {
            method: capability.descriptor().method.as_reqwest(),
            url: capability.route_url(&self.base, &payload),
            body: capability.shape_payload(&payload),
        };
        debug!(capability = capability.name(), url = %request.url, "client: calling gateway");
        match self.relay.invoke(&request).await {
            RelayOutcome::Success(value) => {
                serde_json::from_value(value).map_err(|e| self.report(title, ClientError::Decode(e.to_string())))
            }
            // The relay already notified and scheduled the redirect.
            RelayOutcome::AuthFailure => Err(ClientError::SessionInvalid),
            RelayOutcome::RemoteFailure { status, message } => Err(self.report(title, ClientError::RemoteError { status, message })),
            RelayOutcome::TransportFailure(message) => Err(self.report(title, ClientError::Transport(message))),
        }
    }

    fn report(&self, title: &str, err: ClientError) -> ClientError {
        warn!(title, error = %err, "client: request failed");
        self.relay.feedback().notify(Notification::error(title, Some(err.to_string())));
        err
    }
}
