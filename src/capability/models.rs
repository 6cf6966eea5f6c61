//! Payload and result shapes of the backend capabilities.

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ChatRequest {
    pub query: String,
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mood: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChatSource {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ChatResponse {
    pub answer: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sources: Option<Vec<ChatSource>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResourcesRequest {
    pub query: String,
    pub session_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResourceItem {
    pub title: String,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ResourcesResponse {
    #[serde(default)]
    pub resources: Vec<ResourceItem>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SessionSummaryResponse {
    pub summary_html: String,
}

/// Request body of the mood and pathology analyses.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnalysisRequest {
    pub session_id: String,
    pub analyze_chatbot: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MoodAnalysisResponse {
    pub mood_analysis: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PathologyItem {
    pub name: String,
    pub description: String,
    /// Between 0 and 1.
    pub confidence: f64,
    #[serde(default)]
    pub key_symptoms: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PathologyAnalysisResponse {
    #[serde(default)]
    pub possible_pathologies: Vec<PathologyItem>,
    pub analysis_summary: String,
}

impl PathologyAnalysisResponse {
    /// Pathologies ordered by decreasing confidence, with confidence clamped to 0..=1.
    pub fn ranked(&self) -> Vec<PathologyItem> {
        let mut items: Vec<PathologyItem> = self
            .possible_pathologies
            .iter()
            .cloned()
            .map(|mut p| {
                p.confidence = if p.confidence.is_nan() { 0.0 } else { p.confidence.clamp(0.0, 1.0) };
                p
            })
            .collect();
        items.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
        items
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResetSessionRequest {
    pub session_id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ResetSessionResponse {
    pub status: String,
    pub message: String,
}
