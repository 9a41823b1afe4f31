use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use crate::error::AppError;
use crate::utils::http::get_client;

use super::{Message, Notifier, Severity};

const TELEGRAM_API_BASE: &str = "https://api.telegram.org";
const RATE_WINDOW: Duration = Duration::from_secs(60);
const RATE_LIMIT: usize = 10;

/// Delivers messages to a Telegram chat through the Bot API, capped at
/// ten messages per sliding minute.
pub struct TelegramNotifier {
    token: String,
    chat_id: String,
    sent_at: Mutex<Vec<Instant>>,
}

#[derive(Debug, Default, Deserialize)]
struct TelegramResponse {
    #[serde(default)]
    ok: bool,
    #[serde(default)]
    description: String,
}

impl TelegramNotifier {
    pub fn new(token: impl Into<String>, chat_id: impl Into<String>) -> Self {
        Self {
            token: token.into(),
            chat_id: chat_id.into(),
            sent_at: Mutex::new(Vec::new()),
        }
    }

    /// Records a send in the sliding window, or reports that the window
    /// is full. Pruning and admission happen under one lock hold. The
    /// slot is consumed before delivery, so the cap bounds attempts
    /// against the Bot API, not successes.
    fn check_rate_limit(&self) -> Result<(), AppError> {
        let mut sent = self.sent_at.lock().map_err(|_| {
            AppError::Config("telegram rate limiter lock poisoned".to_string())
        })?;
        let now = Instant::now();
        sent.retain(|t| now.duration_since(*t) < RATE_WINDOW);
        if sent.len() >= RATE_LIMIT {
            return Err(AppError::Config(format!(
                "telegram rate limit exceeded (max {} msgs/min)",
                RATE_LIMIT
            )));
        }
        sent.push(Instant::now());
        Ok(())
    }

    /// Probes the bot token against getMe without sending anything.
    pub async fn validate(&self) -> Result<(), AppError> {
        if self.token.is_empty() {
            return Err(AppError::Config("telegram bot token is empty".to_string()));
        }

        let url = format!("{}/bot{}/getMe", TELEGRAM_API_BASE, self.token);
        let response = get_client().get(&url).send().await?;
        let status = response.status();
        if !status.is_success() {
            let parsed = response.json::<TelegramResponse>().await.unwrap_or_default();
            return Err(AppError::Upstream {
                status: status.as_u16(),
                message: if parsed.description.is_empty() {
                    "invalid telegram token".to_string()
                } else {
                    parsed.description
                },
            });
        }
        Ok(())
    }

    fn severity_emoji(severity: Option<Severity>) -> &'static str {
        match severity {
            Some(Severity::Critical) => "🚨",
            Some(Severity::Warning) => "⚠️",
            Some(Severity::Recovery) => "✅",
            _ => "ℹ️",
        }
    }
}

#[async_trait]
impl Notifier for TelegramNotifier {
    fn name(&self) -> &str {
        "telegram"
    }

    fn is_enabled(&self) -> bool {
        !self.token.is_empty() && !self.chat_id.is_empty()
    }

    async fn send(&self, message: &Message) -> Result<(), AppError> {
        if !self.is_enabled() {
            return Err(AppError::Config(
                "telegram notifier not configured".to_string(),
            ));
        }
        self.check_rate_limit()?;

        let text = format!(
            "{} *{}*\n\n{}",
            Self::severity_emoji(message.severity),
            message.title,
            message.body
        );

        let url = format!("{}/bot{}/sendMessage", TELEGRAM_API_BASE, self.token);
        let response = get_client()
            .post(&url)
            .json(&json!({
                "chat_id": self.chat_id,
                "text": text,
                "parse_mode": "Markdown",
            }))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let parsed = response.json::<TelegramResponse>().await.unwrap_or_default();
            tracing::warn!(
                "telegram send failed: status={}, ok={}, description={}",
                status,
                parsed.ok,
                parsed.description
            );
            return Err(AppError::Upstream {
                status: status.as_u16(),
                message: if parsed.description.is_empty() {
                    "telegram API error".to_string()
                } else {
                    parsed.description
                },
            });
        }
        Ok(())
    }
}
