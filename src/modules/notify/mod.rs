pub mod formatter;
pub mod state;
pub mod telegram;

use std::collections::BTreeMap;

use async_trait::async_trait;

use crate::error::AppError;

pub use formatter::MessageFormatter;
pub use state::{StateTracker, StatusChange};
pub use telegram::TelegramNotifier;

/// Importance of a notification, derived from the worst tier involved.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Recovery,
    Warning,
    Critical,
}

/// A formatted notification, ready for delivery.
#[derive(Debug, Clone, Default)]
pub struct Message {
    pub title: String,
    pub body: String,
    pub severity: Option<Severity>,
}

impl Message {
    pub fn is_empty(&self) -> bool {
        self.title.is_empty() && self.body.is_empty()
    }
}

/// A delivery channel. Channels own their configuration and their own
/// rate limiting; a rate-limited send is a local failure.
#[async_trait]
pub trait Notifier: Send + Sync {
    fn name(&self) -> &str;

    /// Whether the channel is fully configured.
    fn is_enabled(&self) -> bool;

    async fn send(&self, message: &Message) -> Result<(), AppError>;
}

/// Holds the registered channels and fans a message out to every
/// enabled one, collecting per-channel errors instead of
/// short-circuiting. Delivery is at-most-once, best-effort.
#[derive(Default)]
pub struct Registry {
    notifiers: BTreeMap<String, Box<dyn Notifier>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, notifier: Box<dyn Notifier>) {
        self.notifiers.insert(notifier.name().to_string(), notifier);
    }

    pub fn names(&self) -> Vec<&str> {
        self.notifiers.keys().map(String::as_str).collect()
    }

    pub async fn notify_all(&self, message: &Message) -> Vec<(String, AppError)> {
        let mut errors = Vec::new();
        for (name, notifier) in &self.notifiers {
            if !notifier.is_enabled() {
                continue;
            }
            if let Err(e) = notifier.send(message).await {
                tracing::warn!("notification via {} failed: {}", name, e);
                errors.push((name.clone(), e));
            }
        }
        errors
    }
}
