use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::json;

use super::provider::IdentityError;
use super::session::SessionUser;

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    #[default]
    Patient,
    Therapist,
}

impl Role {
    /// Lenient parse used for provider metadata; unknown values are `None`.
    pub fn parse(s: &str) -> Option<Role> {
        match s.trim().to_ascii_lowercase().as_str() {
            "patient" => Some(Role::Patient),
            "therapist" => Some(Role::Therapist),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Patient => "patient",
            Role::Therapist => "therapist",
        }
    }

    pub fn dashboard_path(&self) -> &'static str {
        match self {
            Role::Patient => "/patient-dashboard",
            Role::Therapist => "/therapist-dashboard",
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct UserProfile {
    pub id: String,
    #[serde(default)]
    pub email: String,
    #[serde(default, deserialize_with = "lenient_role")]
    pub role: Role,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub first_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl UserProfile {
    /// Minimal profile built from the session subject when no stored profile is available.
    pub fn fallback_for(user: &SessionUser) -> Self {
        Self {
            id: user.id.clone(),
            email: user.email.clone().unwrap_or_default(),
            role: user.metadata_str("role").and_then(Role::parse).unwrap_or_default(),
            first_name: user.metadata_str("first_name").map(str::to_string),
            last_name: user.metadata_str("last_name").map(str::to_string),
            avatar_url: None,
            created_at: None,
        }
    }

    pub fn display_name(&self) -> String {
        match (&self.first_name, &self.last_name) {
            (Some(f), Some(l)) => format!("{} {}", f, l),
            (Some(f), None) => f.clone(),
            _ => self.email.clone(),
        }
    }
}

/// Stored rows may carry `null` or a role this crate does not know; both read as the default.
fn lenient_role<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Role, D::Error> {
    let raw = Option::<serde_json::Value>::deserialize(deserializer)?;
    Ok(raw.as_ref().and_then(|v| v.as_str()).and_then(Role::parse).unwrap_or_default())
}

/// Lookup and creation of stored user profiles.
#[async_trait]
pub trait ProfileDirectory: Send + Sync {
    async fn find(&self, user_id: &str, access_token: &str) -> Result<UserProfile, IdentityError>;
    async fn create(&self, profile: &UserProfile, access_token: &str) -> Result<(), IdentityError>;
}

/// `profiles` table behind a PostgREST endpoint.
pub struct RestProfileDirectory {
    base: String,
    anon_key: String,
    http: reqwest::Client,
}

impl RestProfileDirectory {
    pub fn new(base: &str, anon_key: impl Into<String>, timeout: Duration) -> Result<Self, IdentityError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| IdentityError::Transport(e.to_string()))?;
        Ok(Self { base: base.trim_end_matches('/').to_string(), anon_key: anon_key.into(), http })
    }

    fn url(&self) -> String {
        format!("{}/rest/v1/profiles", self.base)
    }
}

#[async_trait]
impl ProfileDirectory for RestProfileDirectory {
    async fn find(&self, user_id: &str, access_token: &str) -> Result<UserProfile, IdentityError> {
        let resp = self
            .http
            .get(self.url())
            .query(&[("select", "*".to_string()), ("id", format!("eq.{}", user_id))])
            .header("apikey", &self.anon_key)
            .header("Accept", "application/vnd.pgrst.object+json")
            .bearer_auth(access_token)
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(IdentityError::Rejected { status: status.as_u16(), message });
        }
        Ok(resp.json().await?)
    }

    async fn create(&self, profile: &UserProfile, access_token: &str) -> Result<(), IdentityError> {
        let resp = self
            .http
            .post(self.url())
            .header("apikey", &self.anon_key)
            .header("Prefer", "return=minimal")
            .bearer_auth(access_token)
            .json(&json!({ "id": profile.id, "email": profile.email, "role": profile.role }))
            .send()
            .await?;
        let status = resp.status();
        if !status.is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(IdentityError::Rejected { status: status.as_u16(), message });
        }
        Ok(())
    }
}
