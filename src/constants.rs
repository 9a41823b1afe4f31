use std::time::Duration;

/// Primary Cloud Code API endpoint.
pub const BASE_URL: &str = "https://cloudcode-pa.googleapis.com";

/// Google OAuth2 token endpoint used for refresh-token exchanges.
pub const TOKEN_URL: &str = "https://oauth2.googleapis.com/token";

pub const USER_AGENT: &str = "quotawatch";

/// Transport retry budget: 3 retries, 4 attempts total.
pub const MAX_RETRIES: u32 = 3;

/// Initial backoff delay, doubled on each retry.
pub const RETRY_BASE_DELAY: Duration = Duration::from_secs(1);

/// Onboarding is polled with a fixed attempt budget and fixed delay.
pub const ONBOARD_MAX_ATTEMPTS: u32 = 5;
pub const ONBOARD_POLL_DELAY: Duration = Duration::from_secs(2);

/// Tier id used for onboarding when the upstream offers no usable hint.
pub const FALLBACK_TIER_ID: &str = "LEGACY";
