use thiserror::Error;

/// Error taxonomy for the quota engine.
///
/// `Auth` and `AccountNotFound` require user action and are never retried.
/// `Transient` is only produced after the retry budget is exhausted;
/// `Upstream` is a terminal 4xx rejection that was not retried at all.
#[derive(Error, Debug)]
pub enum AppError {
    #[error("authentication required: {0}")]
    Auth(String),

    #[error("account not found: {0}")]
    AccountNotFound(String),

    #[error("upstream request failed after {attempts} attempt(s): {message}")]
    Transient { attempts: u32, message: String },

    #[error("upstream rejected request ({status}): {message}")]
    Upstream { status: u16, message: String },

    #[error("onboarding timed out after {0} attempt(s)")]
    OnboardTimeout(u32),

    #[error("network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("configuration error: {0}")]
    Config(String),
}

impl AppError {
    /// Whether retrying the same operation later could succeed without
    /// user intervention.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AppError::Transient { .. } | AppError::Network(_) | AppError::OnboardTimeout(_)
        )
    }
}

pub type AppResult<T> = Result<T, AppError>;
