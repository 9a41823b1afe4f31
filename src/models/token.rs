use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One stored OAuth2 credential, keyed by account email.
///
/// This record is the sole source of truth for an account's token state.
/// It is created on a successful OAuth exchange, mutated in place on
/// refresh, and deleted only on explicit account removal.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TokenData {
    pub access_token: String,
    /// Absent means the account must re-authenticate once the access
    /// token expires.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub token_type: String,
    pub expiry: DateTime<Utc>,
    #[serde(default)]
    pub email: String,
    /// Cached human-readable subscription tier label. Advisory only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tier_name: Option<String>,
}

impl TokenData {
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expiry
    }

    pub fn is_valid(&self) -> bool {
        !self.access_token.is_empty() && !self.is_expired()
    }
}
