use serde::{Deserialize, Serialize};

/// Application-level configuration persisted as `config.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// Email of the default account, if one is set. Removing that
    /// account must clear this pointer.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_account: Option<String>,
    #[serde(default)]
    pub notifications: NotificationSettings,
}

impl AppConfig {
    pub fn new() -> Self {
        Self::default()
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct NotificationSettings {
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub telegram: TelegramSettings,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TelegramSettings {
    #[serde(default)]
    pub bot_token: String,
    #[serde(default)]
    pub chat_id: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_object_deserializes_to_defaults() {
        let cfg: AppConfig = serde_json::from_str("{}").expect("parse empty config");
        assert!(cfg.default_account.is_none());
        assert!(!cfg.notifications.enabled);
        assert!(cfg.notifications.telegram.bot_token.is_empty());
    }

    #[test]
    fn default_account_roundtrip() {
        let mut cfg = AppConfig::new();
        cfg.default_account = Some("user@example.com".to_string());
        let json = serde_json::to_string(&cfg).expect("serialize config");
        let parsed: AppConfig = serde_json::from_str(&json).expect("parse config");
        assert_eq!(parsed.default_account.as_deref(), Some("user@example.com"));
    }
}
