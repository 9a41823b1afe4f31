pub mod constants;
pub mod error;
pub mod models;
pub mod modules;
pub mod utils;

pub use error::{AppError, AppResult};
pub use models::{AppConfig, ModelQuota, QuotaSnapshot, StatusTier, TokenData};
pub use modules::api::QuotaClient;
pub use modules::auth::{AccountInfo, AccountManager, CredentialStore};
pub use modules::notify::{MessageFormatter, Registry, StateTracker, StatusChange};
pub use modules::quota::{fetch_all, AccountQuotaResult};
pub use modules::watch::{build_registry, Watcher, DEFAULT_WATCH_INTERVAL};
