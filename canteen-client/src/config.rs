//! Client configuration
//!
//! # Environment variables
//!
//! | Variable | Default | Meaning |
//! |----------|---------|---------|
//! | CANTEEN_API_URL | http://localhost:5000/api | Backend base URL |
//! | CANTEEN_API_TOKEN | (none) | Bearer token of the signed-in user |
//! | CANTEEN_REQUEST_TIMEOUT_SECS | 30 | Per-request timeout |
//! | CANTEEN_VERIFY_RETRIES | 3 | Verify attempts on transport errors |
//! | CANTEEN_VERIFY_BACKOFF_MS | 500 | Base backoff between verify attempts |
//! | CANTEEN_DATA_DIR | ./canteen_data | Directory of the local submission log |
//! | CANTEEN_UTC_OFFSET_MINUTES | 330 | Canteen local timezone offset |
//! | CANTEEN_DEVICE_LABEL | (none) | Free-form device label for support |
//! | CANTEEN_LOG_LEVEL | info | Default log level |

use chrono::{FixedOffset, Offset, Utc};
use shared::error::{AppError, AppResult, ErrorCode};
use std::path::PathBuf;
use std::time::Duration;

/// India Standard Time, UTC+05:30
pub const DEFAULT_UTC_OFFSET_MINUTES: i32 = 330;

/// Cap on a single backoff sleep
const MAX_BACKOFF: Duration = Duration::from_secs(8);

/// Bounded retry with exponential backoff
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts including the first one (>= 1)
    pub max_attempts: u32,
    /// Delay before the second attempt; doubles afterwards
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Single attempt, no retry
    pub fn none() -> Self {
        Self::new(1, Duration::ZERO)
    }

    /// Delay to wait after failed attempt number `attempt` (1-based)
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 1u32 << attempt.saturating_sub(1).min(16);
        self.base_delay.saturating_mul(factor).min(MAX_BACKOFF)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(500))
    }
}

/// Client configuration for the canteen backend
#[derive(Debug, Clone)]
pub struct ClientConfig {
    /// Server base URL (e.g., "http://localhost:5000/api")
    pub base_url: String,

    /// JWT token for authentication
    pub token: Option<String>,

    /// Request timeout in seconds
    pub timeout: u64,

    /// Retry policy for payment verification
    pub verify_retry: RetryPolicy,

    /// Directory holding the local payment submission log
    pub data_dir: PathBuf,

    /// Canteen local timezone, minutes east of UTC
    pub utc_offset_minutes: i32,

    /// Device label recorded with payment submissions
    pub device_label: Option<String>,

    /// Default log level when RUST_LOG is unset
    pub log_level: String,
}

impl ClientConfig {
    /// Create a new client configuration
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            token: None,
            timeout: 30,
            verify_retry: RetryPolicy::default(),
            data_dir: PathBuf::from("./canteen_data"),
            utc_offset_minutes: DEFAULT_UTC_OFFSET_MINUTES,
            device_label: None,
            log_level: "info".to_string(),
        }
    }

    /// Load configuration from the environment (and `.env` if present)
    pub fn from_env() -> AppResult<Self> {
        dotenv::dotenv().ok();

        let mut config = Self::new(
            std::env::var("CANTEEN_API_URL").unwrap_or_else(|_| "http://localhost:5000/api".into()),
        );
        config.token = std::env::var("CANTEEN_API_TOKEN").ok().filter(|t| !t.is_empty());

        if let Some(secs) = parse_env::<u64>("CANTEEN_REQUEST_TIMEOUT_SECS")? {
            config.timeout = secs;
        }
        let retries = parse_env::<u32>("CANTEEN_VERIFY_RETRIES")?;
        let backoff = parse_env::<u64>("CANTEEN_VERIFY_BACKOFF_MS")?;
        config.verify_retry = RetryPolicy::new(
            retries.unwrap_or(config.verify_retry.max_attempts),
            backoff
                .map(Duration::from_millis)
                .unwrap_or(config.verify_retry.base_delay),
        );
        if let Ok(dir) = std::env::var("CANTEEN_DATA_DIR") {
            config.data_dir = PathBuf::from(dir);
        }
        if let Some(offset) = parse_env::<i32>("CANTEEN_UTC_OFFSET_MINUTES")? {
            config = config.with_utc_offset_minutes(offset)?;
        }
        config.device_label = std::env::var("CANTEEN_DEVICE_LABEL").ok();
        if let Ok(level) = std::env::var("CANTEEN_LOG_LEVEL") {
            config.log_level = level;
        }

        tracing::debug!(base_url = %config.base_url, timeout = config.timeout, "Client configuration loaded");
        Ok(config)
    }

    /// Set the JWT token
    pub fn with_token(mut self, token: impl Into<String>) -> Self {
        self.token = Some(token.into());
        self
    }

    /// Set the request timeout
    pub fn with_timeout(mut self, seconds: u64) -> Self {
        self.timeout = seconds;
        self
    }

    /// Set the verification retry policy
    pub fn with_verify_retry(mut self, policy: RetryPolicy) -> Self {
        self.verify_retry = policy;
        self
    }

    /// Set the local data directory
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    /// Set the default log level
    pub fn with_log_level(mut self, level: impl Into<String>) -> Self {
        self.log_level = level.into();
        self
    }

    /// Set the canteen timezone offset
    pub fn with_utc_offset_minutes(mut self, minutes: i32) -> AppResult<Self> {
        if FixedOffset::east_opt(minutes * 60).is_none() {
            return Err(AppError::with_message(
                ErrorCode::ConfigError,
                format!("invalid UTC offset: {} minutes", minutes),
            ));
        }
        self.utc_offset_minutes = minutes;
        Ok(self)
    }

    /// Request timeout as a duration
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.timeout)
    }

    /// Canteen local timezone
    pub fn canteen_timezone(&self) -> FixedOffset {
        FixedOffset::east_opt(self.utc_offset_minutes * 60)
            .or_else(|| FixedOffset::east_opt(DEFAULT_UTC_OFFSET_MINUTES * 60))
            .unwrap_or_else(|| Utc.fix())
    }

    /// Create an HTTP client from this configuration
    pub fn build_http_client(&self) -> crate::ClientResult<crate::HttpClient> {
        crate::HttpClient::new(self)
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self::new("http://localhost:5000/api")
    }
}

fn parse_env<T: std::str::FromStr>(name: &str) -> AppResult<Option<T>>
where
    T::Err: std::fmt::Display,
{
    match std::env::var(name) {
        Ok(raw) => raw.trim().parse::<T>().map(Some).map_err(|e| {
            AppError::with_message(ErrorCode::ConfigError, format!("Invalid {}: {}", name, e))
        }),
        Err(_) => Ok(None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_doubles_and_caps() {
        let policy = RetryPolicy::new(5, Duration::from_millis(500));
        assert_eq!(policy.backoff(1), Duration::from_millis(500));
        assert_eq!(policy.backoff(2), Duration::from_millis(1000));
        assert_eq!(policy.backoff(3), Duration::from_millis(2000));
        assert_eq!(policy.backoff(30), MAX_BACKOFF);
    }

    #[test]
    fn test_retry_policy_has_at_least_one_attempt() {
        assert_eq!(RetryPolicy::new(0, Duration::ZERO).max_attempts, 1);
        assert_eq!(RetryPolicy::none().max_attempts, 1);
    }

    #[test]
    fn test_builder_and_timezone() {
        let config = ClientConfig::new("http://api.test")
            .with_token("t")
            .with_timeout(5)
            .with_log_level("debug")
            .with_utc_offset_minutes(-300)
            .unwrap();
        assert_eq!(config.token.as_deref(), Some("t"));
        assert_eq!(config.log_level, "debug");
        assert_eq!(ClientConfig::default().log_level, "info");
        assert_eq!(config.request_timeout(), Duration::from_secs(5));
        assert_eq!(config.canteen_timezone().local_minus_utc(), -300 * 60);
    }

    #[test]
    fn test_invalid_offset_rejected() {
        let err = ClientConfig::default()
            .with_utc_offset_minutes(24 * 60)
            .unwrap_err();
        assert_eq!(err.code, ErrorCode::ConfigError);
    }

    #[test]
    fn test_default_timezone_is_ist() {
        assert_eq!(
            ClientConfig::default().canteen_timezone().local_minus_utc(),
            330 * 60
        );
    }
}
