use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::constants::TOKEN_URL;
use crate::error::{AppError, AppResult};
use crate::models::TokenData;

fn env_first(keys: &[&str]) -> Option<String> {
    for k in keys {
        if let Ok(v) = std::env::var(k) {
            let t = v.trim();
            if !t.is_empty() {
                return Some(t.to_string());
            }
        }
    }
    None
}

fn client_id() -> AppResult<String> {
    env_first(&["QUOTAWATCH_OAUTH_CLIENT_ID", "GOOGLE_OAUTH_CLIENT_ID"]).ok_or_else(|| {
        AppError::Config(
            "Missing OAuth client_id. Set QUOTAWATCH_OAUTH_CLIENT_ID.".to_string(),
        )
    })
}

fn client_secret_optional() -> Option<String> {
    env_first(&["QUOTAWATCH_OAUTH_CLIENT_SECRET", "GOOGLE_OAUTH_CLIENT_SECRET"])
}

/// Wire shape of a token endpoint response.
#[derive(Debug, Serialize, Deserialize)]
pub struct TokenResponse {
    pub access_token: String,
    pub expires_in: i64,
    #[serde(default)]
    pub token_type: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
}

impl TokenResponse {
    pub fn expiry(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        now + Duration::seconds(self.expires_in)
    }

    /// Builds the persisted credential for a refreshed token. The
    /// endpoint usually omits the refresh token on refresh exchanges,
    /// in which case the previous one is carried over.
    pub fn into_token_data(self, previous: &TokenData) -> TokenData {
        let expiry = self.expiry(Utc::now());
        TokenData {
            access_token: self.access_token,
            refresh_token: self.refresh_token.or_else(|| previous.refresh_token.clone()),
            token_type: if self.token_type.is_empty() {
                previous.token_type.clone()
            } else {
                self.token_type
            },
            expiry,
            email: previous.email.clone(),
            tier_name: previous.tier_name.clone(),
        }
    }
}

/// Exchanges a refresh token for a fresh access token.
///
/// A rejected exchange (e.g. `invalid_grant`) is an `Auth` error and the
/// caller must prompt re-authentication; connection failures stay
/// `Network` so callers can retry.
pub async fn refresh_access_token(refresh_token: &str) -> AppResult<TokenResponse> {
    let cid = client_id()?;
    let mut params: Vec<(&str, String)> = vec![
        ("client_id", cid),
        ("refresh_token", refresh_token.to_string()),
        ("grant_type", "refresh_token".to_string()),
    ];
    if let Some(secret) = client_secret_optional() {
        params.push(("client_secret", secret));
    }

    let client = crate::utils::http::get_client();
    let response = client.post(TOKEN_URL).form(&params).send().await?;

    if response.status().is_success() {
        let token = response.json::<TokenResponse>().await?;
        tracing::debug!("token refresh succeeded, expires in {}s", token.expires_in);
        Ok(token)
    } else {
        let status = response.status();
        let body = response.text().await.unwrap_or_default();
        tracing::warn!("token refresh rejected ({}): {}", status, body);
        Err(AppError::Auth(format!(
            "token refresh rejected ({}): {}",
            status, body
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn previous() -> TokenData {
        TokenData {
            access_token: "old-access".to_string(),
            refresh_token: Some("old-refresh".to_string()),
            token_type: "Bearer".to_string(),
            expiry: Utc::now(),
            email: "user@example.com".to_string(),
            tier_name: Some("Pro".to_string()),
        }
    }

    #[test]
    fn refresh_response_carries_over_missing_fields() {
        let response = TokenResponse {
            access_token: "new-access".to_string(),
            expires_in: 3600,
            token_type: String::new(),
            refresh_token: None,
        };

        let token = response.into_token_data(&previous());
        assert_eq!(token.access_token, "new-access");
        assert_eq!(token.refresh_token.as_deref(), Some("old-refresh"));
        assert_eq!(token.token_type, "Bearer");
        assert_eq!(token.email, "user@example.com");
        assert_eq!(token.tier_name.as_deref(), Some("Pro"));
        assert!(token.expiry > Utc::now() + Duration::minutes(50));
    }

    #[test]
    fn refresh_response_prefers_new_refresh_token() {
        let response = TokenResponse {
            access_token: "new-access".to_string(),
            expires_in: 60,
            token_type: "Bearer".to_string(),
            refresh_token: Some("new-refresh".to_string()),
        };

        let token = response.into_token_data(&previous());
        assert_eq!(token.refresh_token.as_deref(), Some("new-refresh"));
    }
}
