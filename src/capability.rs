//! Remote capability descriptors.
//!
//! Each backend operation is described once, statically: inbound route,
//! backend path, method, required payload fields and credential mode. The
//! route proxies and the API client are thin configurations over these.

use serde_json::{Map, Value};

pub mod models;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Capability {
    ChatTurn,
    RecommendResources,
    SessionSummary,
    MoodAnalysis,
    PathologyAnalysis,
    ResetSession,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HttpMethod {
    Get,
    Post,
}

impl HttpMethod {
    pub fn as_reqwest(self) -> reqwest::Method {
        match self {
            HttpMethod::Get => reqwest::Method::GET,
            HttpMethod::Post => reqwest::Method::POST,
        }
    }
}

/// How a route proxy obtains the caller's credential.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialMode {
    /// Only an inbound `Authorization` header, forwarded verbatim.
    PassThrough,
    /// `Authorization` header if present, otherwise the session cookie verified with the identity provider.
    BearerOrCookie,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequiredField {
    pub name: &'static str,
    /// Shown to the caller when the field is missing.
    pub message: &'static str,
}

#[derive(Debug, Clone, Copy)]
pub struct CapabilityDescriptor {
    pub name: &'static str,
    pub method: HttpMethod,
    /// Inbound route, axum path syntax.
    pub route: &'static str,
    /// Backend path template relative to the backend base URL.
    pub backend_path: &'static str,
    pub required: &'static [RequiredField],
    /// Payload fields relayed to the backend; everything else is dropped.
    pub forwarded: &'static [&'static str],
    pub credential: CredentialMode,
}

const SESSION_ID: RequiredField = RequiredField { name: "session_id", message: "ID sessione mancante" };
const QUERY: RequiredField = RequiredField { name: "query", message: "Messaggio mancante" };

static CHAT_TURN: CapabilityDescriptor = CapabilityDescriptor {
    name: "chat_turn",
    method: HttpMethod::Post,
    route: "/api/chat",
    backend_path: "/therapy-session",
    required: &[QUERY],
    forwarded: &["query", "session_id", "mood"],
    credential: CredentialMode::BearerOrCookie,
};

static RECOMMEND_RESOURCES: CapabilityDescriptor = CapabilityDescriptor {
    name: "recommend_resources",
    method: HttpMethod::Post,
    route: "/api/recommend-resources",
    backend_path: "/api/recommend-resources",
    required: &[SESSION_ID],
    forwarded: &["query", "session_id"],
    credential: CredentialMode::PassThrough,
};

static SESSION_SUMMARY: CapabilityDescriptor = CapabilityDescriptor {
    name: "session_summary",
    method: HttpMethod::Get,
    route: "/api/session-summary/{session_id}",
    backend_path: "/api/session-summary/{session_id}",
    required: &[SESSION_ID],
    forwarded: &[],
    credential: CredentialMode::BearerOrCookie,
};

static MOOD_ANALYSIS: CapabilityDescriptor = CapabilityDescriptor {
    name: "mood_analysis",
    method: HttpMethod::Post,
    route: "/api/mood-analysis",
    backend_path: "/api/mood-analysis",
    required: &[SESSION_ID],
    forwarded: &["session_id", "analyze_chatbot"],
    credential: CredentialMode::BearerOrCookie,
};

static PATHOLOGY_ANALYSIS: CapabilityDescriptor = CapabilityDescriptor {
    name: "pathology_analysis",
    method: HttpMethod::Post,
    route: "/api/pathology-analysis",
    backend_path: "/api/pathology-analysis",
    required: &[SESSION_ID],
    forwarded: &["session_id", "analyze_chatbot"],
    credential: CredentialMode::BearerOrCookie,
};

static RESET_SESSION: CapabilityDescriptor = CapabilityDescriptor {
    name: "reset_session",
    method: HttpMethod::Post,
    route: "/api/reset-session",
    backend_path: "/api/reset-session",
    required: &[SESSION_ID],
    forwarded: &["session_id"],
    credential: CredentialMode::BearerOrCookie,
};

impl Capability {
    pub const ALL: [Capability; 6] = [
        Capability::ChatTurn,
        Capability::RecommendResources,
        Capability::SessionSummary,
        Capability::MoodAnalysis,
        Capability::PathologyAnalysis,
        Capability::ResetSession,
    ];

    pub fn descriptor(self) -> &'static CapabilityDescriptor {
        match self {
            Capability::ChatTurn => &CHAT_TURN,
            Capability::RecommendResources => &RECOMMEND_RESOURCES,
            Capability::SessionSummary => &SESSION_SUMMARY,
            Capability::MoodAnalysis => &MOOD_ANALYSIS,
            Capability::PathologyAnalysis => &PATHOLOGY_ANALYSIS,
            Capability::ResetSession => &RESET_SESSION,
        }
    }

    pub fn name(self) -> &'static str {
        self.descriptor().name
    }

    /// First required field that is absent, null or blank.
    pub fn missing_field(self, payload: &Map<String, Value>) -> Option<&'static RequiredField> {
        self.descriptor().required.iter().find(|f| match payload.get(f.name) {
            None | Some(Value::Null) => true,
            Some(Value::String(s)) => s.trim().is_empty(),
            Some(_) => false,
        })
    }

    /// Body relayed to the backend, `None` for bodiless methods.
    pub fn shape_payload(self, payload: &Map<String, Value>) -> Option<Value> {
        let d = self.descriptor();
        if d.method == HttpMethod::Get {
            return None;
        }
        let mut out = Map::new();
        for key in d.forwarded {
            if let Some(v) = payload.get(*key).filter(|v| !v.is_null()) {
                out.insert((*key).to_string(), v.clone());
            }
        }
        if matches!(self, Capability::MoodAnalysis | Capability::PathologyAnalysis) {
            out.entry("analyze_chatbot").or_insert(Value::Bool(true));
        }
        Some(Value::Object(out))
    }

    /// Absolute backend URL with path parameters filled in from the payload.
    pub fn backend_url(self, base: &str, payload: &Map<String, Value>) -> String {
        format!("{}{}", base.trim_end_matches('/'), fill_path(self.descriptor().backend_path, payload))
    }

    /// Absolute URL of the inbound route on a gateway at `base`.
    pub fn route_url(self, base: &str, payload: &Map<String, Value>) -> String {
        format!("{}{}", base.trim_end_matches('/'), fill_path(self.descriptor().route, payload))
    }
}

/// Replace `{name}` segments with the percent-encoded string value of `payload[name]`.
fn fill_path(template: &str, payload: &Map<String, Value>) -> String {
    let mut out = String::with_capacity(template.len());
    let mut rest = template;
    while let Some(start) = rest.find('{') {
        let Some(len) = rest[start..].find('}') else { break; };
        let name = &rest[start + 1..start + len];
        out.push_str(&rest[..start]);
        let value = match payload.get(name) {
            Some(Value::String(s)) => s.clone(),
            Some(Value::Null) | None => String::new(),
            Some(other) => other.to_string(),
        };
        out.push_str(&urlencoding::encode(&value));
        rest = &rest[start + len + 1..];
    }
    out.push_str(rest);
    out
}
