use std::path::PathBuf;
use std::sync::Arc;

use serde::Serialize;

use crate::error::{AppError, AppResult};
use crate::models::AppConfig;
use crate::modules::auth::store::CredentialStore;
use crate::modules::config;

/// Derived view over one persisted credential.
#[derive(Debug, Clone, Serialize)]
pub struct AccountInfo {
    pub email: String,
    pub is_default: bool,
    pub token_valid: bool,
}

/// Registry over the set of persisted credentials plus the app-config
/// default-account pointer.
pub struct AccountManager {
    store: Arc<CredentialStore>,
    config_path: PathBuf,
}

impl AccountManager {
    pub fn new(store: Arc<CredentialStore>, config_path: PathBuf) -> Self {
        Self { store, config_path }
    }

    pub fn open_default(store: Arc<CredentialStore>) -> AppResult<Self> {
        Ok(Self::new(store, config::get_config_path()?))
    }

    pub fn store(&self) -> &Arc<CredentialStore> {
        &self.store
    }

    pub fn load_config(&self) -> AppResult<AppConfig> {
        config::load_app_config_from(&self.config_path)
    }

    pub fn save_config(&self, cfg: &AppConfig) -> AppResult<()> {
        config::save_app_config_to(&self.config_path, cfg)
    }

    /// Lists all saved accounts, default first, then lexicographic.
    pub async fn list_accounts(&self) -> AppResult<Vec<AccountInfo>> {
        let cfg = self.load_config()?;
        let default = cfg.default_account.as_deref().unwrap_or("");

        let mut accounts = Vec::new();
        for email in self.store.list_emails()? {
            let token_valid = match self.store.load(&email).await {
                Ok(token) => token.is_valid(),
                Err(_) => false,
            };
            accounts.push(AccountInfo {
                is_default: email == default,
                token_valid,
                email,
            });
        }

        accounts.sort_by(|a, b| {
            b.is_default
                .cmp(&a.is_default)
                .then_with(|| a.email.cmp(&b.email))
        });
        Ok(accounts)
    }

    pub async fn set_default_account(&self, email: &str) -> AppResult<()> {
        // Verify the credential exists before pointing at it.
        self.store.load(email).await?;

        let mut cfg = self.load_config()?;
        cfg.default_account = Some(email.to_string());
        self.save_config(&cfg)
    }

    /// Deletes an account's credential. If it was the default, the
    /// pointer is cleared so no dangling default remains.
    pub async fn remove_account(&self, email: &str) -> AppResult<()> {
        self.store.delete(email).await?;

        let mut cfg = self.load_config()?;
        if cfg.default_account.as_deref() == Some(email) {
            cfg.default_account = None;
            self.save_config(&cfg)?;
        }
        Ok(())
    }

    pub fn default_account(&self) -> AppResult<Option<String>> {
        Ok(self.load_config()?.default_account)
    }
}
