use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Health classification of a model's remaining quota.
///
/// Ordered from best to worst so that `Ord` reflects severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum StatusTier {
    Healthy,
    Warning,
    Critical,
    Empty,
}

impl StatusTier {
    /// Thresholds applied to the remaining fraction. The explicit
    /// exhausted flag always wins, even with a nonzero fraction.
    pub fn from_quota(remaining_fraction: f64, is_exhausted: bool) -> Self {
        if is_exhausted || remaining_fraction <= 0.0 {
            StatusTier::Empty
        } else if remaining_fraction <= 0.2 {
            StatusTier::Critical
        } else if remaining_fraction <= 0.5 {
            StatusTier::Warning
        } else {
            StatusTier::Healthy
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StatusTier::Healthy => "HEALTHY",
            StatusTier::Warning => "WARNING",
            StatusTier::Critical => "CRITICAL",
            StatusTier::Empty => "EMPTY",
        }
    }
}

impl std::fmt::Display for StatusTier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Quota information for a single model, as observed in one fetch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelQuota {
    pub model_id: String,
    pub display_name: String,
    /// Remaining quota in [0, 1].
    pub remaining_fraction: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reset_time: Option<DateTime<Utc>>,
    #[serde(default)]
    pub is_exhausted: bool,
}

impl ModelQuota {
    pub fn status_tier(&self) -> StatusTier {
        StatusTier::from_quota(self.remaining_fraction, self.is_exhausted)
    }

    pub fn remaining_percentage(&self) -> i32 {
        (self.remaining_fraction * 100.0).round() as i32
    }
}

/// One immutable fetch result for one account at one point in time.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuotaSnapshot {
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub project_id: Option<String>,
    pub fetched_at: DateTime<Utc>,
    pub models: Vec<ModelQuota>,
}

/// Maps an upstream billing tier id to a human label. Unrecognized ids
/// collapse to the free label rather than being surfaced verbatim.
pub fn map_tier_to_name(tier_id: &str) -> Option<String> {
    let id = tier_id.trim();
    if id.is_empty() {
        return None;
    }
    let lower = id.to_ascii_lowercase();
    if lower.contains("ultra") {
        Some("Ultra".to_string())
    } else if lower.contains("pro") {
        Some("Pro".to_string())
    } else {
        Some("Free".to_string())
    }
}
