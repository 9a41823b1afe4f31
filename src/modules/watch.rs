use std::sync::Arc;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::error::AppResult;
use crate::models::AppConfig;
use crate::modules::auth::store::CredentialStore;
use crate::modules::notify::{
    MessageFormatter, Registry, StateTracker, StatusChange, TelegramNotifier,
};
use crate::modules::quota::{self, AccountQuotaResult};

pub const DEFAULT_WATCH_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Builds the notification registry from config. Disabled notifications
/// yield an empty registry; `notify_all` on it is a no-op.
pub fn build_registry(config: &AppConfig) -> Registry {
    let mut registry = Registry::new();
    if !config.notifications.enabled {
        return registry;
    }

    let telegram = &config.notifications.telegram;
    if !telegram.bot_token.is_empty() && !telegram.chat_id.is_empty() {
        registry.register(Box::new(TelegramNotifier::new(
            telegram.bot_token.clone(),
            telegram.chat_id.clone(),
        )));
    }
    registry
}

/// Periodic quota monitor: fetches all accounts, diffs against the
/// last observation and dispatches notifications for the changes.
pub struct Watcher {
    store: Arc<CredentialStore>,
    tracker: StateTracker,
    formatter: MessageFormatter,
    registry: Registry,
    interval: Duration,
}

impl Watcher {
    pub fn new(store: Arc<CredentialStore>, registry: Registry, interval: Duration) -> Self {
        Self {
            store,
            tracker: StateTracker::new(),
            formatter: MessageFormatter::new(),
            registry,
            interval,
        }
    }

    /// Runs rounds until cancelled. The first round fires immediately,
    /// subsequent rounds on the interval.
    pub async fn run(&self, cancel: CancellationToken) {
        tracing::info!(
            "watch started: interval={}s, channels={:?}",
            self.interval.as_secs(),
            self.registry.names()
        );

        let mut ticker = tokio::time::interval(self.interval);
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    tracing::info!("watch stopped");
                    return;
                }
                _ = ticker.tick() => {
                    if let Err(e) = self.run_round(&cancel).await {
                        tracing::error!("quota round failed: {}", e);
                    }
                }
            }
        }
    }

    /// One fetch-diff-notify round.
    ///
    /// An unreadable account registry is a systemic failure and surfaces
    /// as `Err`; `Ok(None)` is reserved for a cancelled round.
    pub async fn run_round(
        &self,
        cancel: &CancellationToken,
    ) -> AppResult<Option<Vec<AccountQuotaResult>>> {
        let emails = self.store.list_emails()?;
        if emails.is_empty() {
            tracing::warn!("no accounts configured, skipping round");
            return Ok(Some(Vec::new()));
        }

        let Some(results) = quota::fetch_all(self.store.clone(), emails, cancel).await else {
            return Ok(None);
        };
        self.dispatch_changes(&results).await;
        Ok(Some(results))
    }

    async fn dispatch_changes(&self, results: &[AccountQuotaResult]) {
        let mut changes: Vec<StatusChange> = Vec::new();
        for result in results {
            if let Some(snapshot) = &result.snapshot {
                changes.extend(self.tracker.update(&result.email, &snapshot.models));
            }
        }
        if changes.is_empty() {
            return;
        }

        let message = self.formatter.format_changes(&changes);
        if message.is_empty() {
            return;
        }
        let failures = self.registry.notify_all(&message).await;
        tracing::info!(
            "dispatched {} change(s), {} channel failure(s)",
            changes.len(),
            failures.len()
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{NotificationSettings, TelegramSettings};

    fn config(enabled: bool, token: &str, chat: &str) -> AppConfig {
        AppConfig {
            default_account: None,
            notifications: NotificationSettings {
                enabled,
                telegram: TelegramSettings {
                    bot_token: token.to_string(),
                    chat_id: chat.to_string(),
                },
            },
        }
    }

    #[test]
    fn disabled_notifications_yield_empty_registry() {
        let registry = build_registry(&config(false, "tok", "chat"));
        assert!(registry.names().is_empty());
    }

    #[test]
    fn partially_configured_telegram_is_not_registered() {
        let registry = build_registry(&config(true, "tok", ""));
        assert!(registry.names().is_empty());
    }

    #[test]
    fn configured_telegram_is_registered() {
        let registry = build_registry(&config(true, "tok", "chat"));
        assert_eq!(registry.names(), vec!["telegram"]);
    }

    #[tokio::test]
    async fn round_with_no_accounts_is_empty_not_failed() {
        let dir = tempfile::tempdir().expect("tempdir");
        let store = Arc::new(CredentialStore::new(dir.path().join("accounts")));
        let watcher = Watcher::new(store, Registry::new(), DEFAULT_WATCH_INTERVAL);

        let results = watcher
            .run_round(&CancellationToken::new())
            .await
            .expect("listing succeeds")
            .expect("round not cancelled");
        assert!(results.is_empty());
    }

    #[tokio::test]
    async fn unreadable_account_registry_is_an_error_not_a_cancellation() {
        let dir = tempfile::tempdir().expect("tempdir");
        // A regular file where the accounts directory should be.
        std::fs::write(dir.path().join("accounts"), "junk").expect("seed file");
        let store = Arc::new(CredentialStore::new(dir.path().join("accounts")));
        let watcher = Watcher::new(store, Registry::new(), DEFAULT_WATCH_INTERVAL);

        let err = watcher
            .run_round(&CancellationToken::new())
            .await
            .expect_err("systemic failure must surface as an error");
        assert!(matches!(err, crate::error::AppError::Io(_)));
    }
}
