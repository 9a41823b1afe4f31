use std::fs;
use std::future::Future;
use std::path::PathBuf;
use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::Mutex;

use crate::error::{AppError, AppResult};
use crate::models::TokenData;
use crate::modules::auth::oauth::{self, TokenResponse};
use crate::modules::config;

/// On-disk credential store with per-account mutual exclusion.
///
/// Every operation for a given email is serialized through that email's
/// lock so overlapping fetches cannot race two refresh exchanges against
/// the token endpoint. Operations on different accounts never block each
/// other. The lock map grows lazily and is never pruned; account counts
/// are small and the entries live for the process lifetime.
pub struct CredentialStore {
    accounts_dir: PathBuf,
    locks: DashMap<String, Arc<Mutex<()>>>,
}

impl CredentialStore {
    pub fn new(accounts_dir: PathBuf) -> Self {
        Self {
            accounts_dir,
            locks: DashMap::new(),
        }
    }

    /// Opens the store at the standard accounts directory.
    pub fn open_default() -> AppResult<Self> {
        Ok(Self::new(config::get_accounts_dir()?))
    }

    fn lock_for(&self, email: &str) -> Arc<Mutex<()>> {
        self.locks
            .entry(email.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone()
    }

    fn account_path(&self, email: &str) -> PathBuf {
        self.accounts_dir.join(format!("{}.json", email))
    }

    fn load_unlocked(&self, email: &str) -> AppResult<TokenData> {
        let path = self.account_path(email);
        let content = match fs::read_to_string(&path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(AppError::AccountNotFound(email.to_string()));
            }
            Err(e) => return Err(e.into()),
        };

        serde_json::from_str(&content)
            .map_err(|e| AppError::Config(format!("failed to parse token file for {}: {}", email, e)))
    }

    fn save_unlocked(&self, email: &str, token: &TokenData) -> AppResult<()> {
        let mut token = token.clone();
        token.email = email.to_string();
        let content = serde_json::to_string_pretty(&token)
            .map_err(|e| AppError::Config(format!("failed to serialize token: {}", e)))?;
        config::atomic_write(&self.account_path(email), content.as_bytes())
    }

    pub async fn load(&self, email: &str) -> AppResult<TokenData> {
        let lock = self.lock_for(email);
        let _guard = lock.lock().await;
        self.load_unlocked(email)
    }

    pub async fn save(&self, email: &str, token: &TokenData) -> AppResult<()> {
        let lock = self.lock_for(email);
        let _guard = lock.lock().await;
        self.save_unlocked(email, token)
    }

    pub async fn delete(&self, email: &str) -> AppResult<()> {
        let lock = self.lock_for(email);
        let _guard = lock.lock().await;
        match fs::remove_file(self.account_path(email)) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                Err(AppError::AccountNotFound(email.to_string()))
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Lists all emails with a persisted credential, sorted. A missing
    /// directory means no accounts yet, not an error.
    pub fn list_emails(&self) -> AppResult<Vec<String>> {
        let entries = match fs::read_dir(&self.accounts_dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut emails = Vec::new();
        for entry in entries {
            let entry = entry?;
            if entry.file_type()?.is_dir() {
                continue;
            }
            let name = entry.file_name();
            let name = name.to_string_lossy();
            if let Some(email) = name.strip_suffix(".json") {
                if !email.starts_with('.') {
                    emails.push(email.to_string());
                }
            }
        }
        emails.sort();
        Ok(emails)
    }

    /// Returns a valid access token for the account, refreshing and
    /// persisting it first if expired.
    ///
    /// The on-disk record is re-read after acquiring the account lock:
    /// another caller may have refreshed and saved a newer token while
    /// this one was waiting.
    pub async fn get_valid_access_token<F, Fut>(&self, email: &str, refresh: F) -> AppResult<String>
    where
        F: FnOnce(String) -> Fut,
        Fut: Future<Output = AppResult<TokenResponse>>,
    {
        let lock = self.lock_for(email);
        let _guard = lock.lock().await;

        let token = self.load_unlocked(email)?;
        if token.is_valid() {
            return Ok(token.access_token);
        }

        let Some(refresh_token) = token.refresh_token.clone() else {
            return Err(AppError::Auth(format!(
                "token expired and no refresh token available for {}, please login again",
                email
            )));
        };

        tracing::info!("token expired for {}, refreshing", email);
        let response = refresh(refresh_token).await?;
        let refreshed = response.into_token_data(&token);
        self.save_unlocked(email, &refreshed)?;
        Ok(refreshed.access_token)
    }

    /// Refresh via the standard OAuth token endpoint.
    pub async fn get_valid_access_token_via_oauth(&self, email: &str) -> AppResult<String> {
        self.get_valid_access_token(email, |refresh_token| async move {
            oauth::refresh_access_token(&refresh_token).await
        })
        .await
    }

    /// Caches the resolved subscription tier label. Best-effort: callers
    /// must not fail the surrounding fetch on error.
    pub async fn update_tier_name(&self, email: &str, tier_name: Option<String>) -> AppResult<()> {
        let lock = self.lock_for(email);
        let _guard = lock.lock().await;

        let mut token = self.load_unlocked(email)?;
        if token.tier_name == tier_name {
            return Ok(());
        }
        token.tier_name = tier_name;
        self.save_unlocked(email, &token)
    }
}
