use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Request metadata expected by every Cloud Code endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Metadata {
    pub ide_type: &'static str,
    pub platform: &'static str,
    pub plugin_type: &'static str,
}

impl Default for Metadata {
    fn default() -> Self {
        Self {
            ide_type: "ANTIGRAVITY",
            platform: "PLATFORM_UNSPECIFIED",
            plugin_type: "GEMINI",
        }
    }
}

/// The upstream project identifier arrives either as a bare string or as
/// an object carrying an `id` field. The variant never leaks past this
/// module; `normalize` collapses it to a plain string.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum ProjectRef {
    Id(String),
    Object {
        #[serde(default)]
        id: Option<String>,
    },
    Other(serde_json::Value),
}

impl ProjectRef {
    /// Empty or missing ids are treated as absent, never as an error.
    pub fn normalize(&self) -> Option<String> {
        match self {
            ProjectRef::Id(s) if !s.is_empty() => Some(s.clone()),
            ProjectRef::Object { id: Some(s) } if !s.is_empty() => Some(s.clone()),
            _ => None,
        }
    }
}

pub fn normalize_project(value: Option<&ProjectRef>) -> Option<String> {
    value.and_then(ProjectRef::normalize)
}

#[derive(Debug, Clone, Deserialize)]
pub struct TierInfo {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default, rename = "isDefault")]
    pub is_default: bool,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadAssistRequest {
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadAssistResponse {
    #[serde(default)]
    pub project_id: Option<String>,
    #[serde(default, rename = "cloudaicompanionProject")]
    pub cloudaicompanion_project: Option<ProjectRef>,
    #[serde(default)]
    pub current_tier: Option<TierInfo>,
    #[serde(default)]
    pub paid_tier: Option<TierInfo>,
    #[serde(default)]
    pub allowed_tiers: Vec<TierInfo>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct OnboardRequest {
    pub tier_id: String,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OnboardResponse {
    #[serde(default)]
    pub done: bool,
    #[serde(default)]
    pub response: OnboardResult,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OnboardResult {
    #[serde(default, rename = "cloudaicompanionProject")]
    pub cloudaicompanion_project: Option<ProjectRef>,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchModelsRequest {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub project: Option<String>,
    pub metadata: Metadata,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchModelsResponse {
    #[serde(default)]
    pub models: HashMap<String, WireModel>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireModel {
    #[serde(default)]
    pub display_name: String,
    #[serde(default)]
    pub quota_info: Option<WireQuotaInfo>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct WireQuotaInfo {
    #[serde(default)]
    pub remaining_fraction: Option<f64>,
    #[serde(default)]
    pub reset_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_exhausted: Option<bool>,
}
