pub mod config;
pub mod quota;
pub mod token;

pub use config::{AppConfig, NotificationSettings, TelegramSettings};
pub use quota::{ModelQuota, QuotaSnapshot, StatusTier};
pub use token::TokenData;
