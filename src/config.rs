//! Client configuration
//!
//! Provides:
//! - API endpoint and credentials
//! - Request timeout
//! - Retry/backoff policy
//!
//! Configuration can be built in code, deserialized from JSON/TOML, or read
//! from `ALTITRACE_*` environment variables.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use url::Url;

use crate::errors::ClientError;

/// Default API endpoint used when nothing else is configured
pub const DEFAULT_API_URL: &str = "http://localhost:8080/v1";

/// Environment variable holding the API base URL
pub const ENV_API_URL: &str = "ALTITRACE_API_URL";
/// Environment variable holding the API key
pub const ENV_API_KEY: &str = "ALTITRACE_API_KEY";
/// Environment variable holding the request timeout in milliseconds
pub const ENV_TIMEOUT_MS: &str = "ALTITRACE_TIMEOUT_MS";
/// Environment variable holding the maximum number of attempts
pub const ENV_MAX_RETRIES: &str = "ALTITRACE_MAX_RETRIES";

/// Retry policy for transient failures
///
/// Delays grow geometrically from `initial_delay_ms` by `multiplier` and are
/// capped at `max_delay_ms`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct RetryConfig {
    /// Total number of attempts, including the first one
    pub max_attempts: u32,
    /// Delay before the second attempt
    pub initial_delay_ms: u64,
    /// Upper bound for any single delay
    pub max_delay_ms: u64,
    /// Growth factor applied after every failed attempt
    pub multiplier: u32,
    /// HTTP status codes that are worth retrying
    pub retry_on_status: Vec<u16>,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 500,
            max_delay_ms: 10_000,
            multiplier: 2,
            retry_on_status: vec![408, 429, 500, 502, 503, 504],
        }
    }
}

impl RetryConfig {
    /// Policy that sends every request exactly once
    pub fn disabled() -> Self {
        Self { max_attempts: 1, ..Default::default() }
    }

    /// Delay to wait before `attempt + 1`, where `attempt` starts at 1
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let factor = (self.multiplier.max(1) as u64).saturating_pow(attempt.saturating_sub(1));
        let delay = self.initial_delay_ms.saturating_mul(factor);
        Duration::from_millis(delay.min(self.max_delay_ms))
    }

    /// Upper bound applied to server-provided `Retry-After` hints
    pub fn max_delay(&self) -> Duration {
        Duration::from_millis(self.max_delay_ms)
    }

    /// Whether an HTTP status should be retried
    pub fn should_retry_status(&self, status: u16) -> bool {
        self.retry_on_status.contains(&status)
    }
}

/// Altitrace API client configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct ClientConfig {
    /// API base URL, including the version prefix (e.g. `https://host/v1`)
    pub base_url: Url,
    /// Optional API key sent as a bearer token
    pub api_key: Option<String>,
    /// Per-request timeout in milliseconds
    pub timeout_ms: u64,
    /// User agent sent with every request
    pub user_agent: String,
    /// Retry policy
    pub retry: RetryConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: Url::parse(DEFAULT_API_URL).expect("default API URL is valid"),
            api_key: None,
            timeout_ms: 30_000,
            user_agent: format!("altitrace-rs/{}", env!("CARGO_PKG_VERSION")),
            retry: RetryConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Creates a configuration pointing at `base_url` with default settings
    ///
    /// # Arguments
    /// * `base_url` - API base URL, e.g. `https://api.example.com/v1`
    ///
    /// # Returns
    /// * `Ok(ClientConfig)` - Configuration with default timeout and retry policy
    /// * `Err(ClientError::InvalidUrl)` - If the URL cannot be parsed
    pub fn new(base_url: &str) -> Result<Self, ClientError> {
        let base_url = parse_base_url(base_url)?;
        Ok(Self { base_url, ..Default::default() })
    }

    /// Loads the configuration from `ALTITRACE_*` environment variables
    ///
    /// Unset variables keep their default value.
    pub fn from_env() -> Result<Self, ClientError> {
        let mut config = Self::default();
        if let Ok(url) = std::env::var(ENV_API_URL) {
            config.base_url = parse_base_url(&url)?;
        }
        if let Ok(key) = std::env::var(ENV_API_KEY) {
            if !key.trim().is_empty() {
                config.api_key = Some(key);
            }
        }
        if let Ok(timeout) = std::env::var(ENV_TIMEOUT_MS) {
            config.timeout_ms = timeout.parse().map_err(|_| {
                ClientError::Config(format!("{ENV_TIMEOUT_MS} must be an integer, got {timeout}"))
            })?;
        }
        if let Ok(retries) = std::env::var(ENV_MAX_RETRIES) {
            config.retry.max_attempts = retries.parse().map_err(|_| {
                ClientError::Config(format!("{ENV_MAX_RETRIES} must be an integer, got {retries}"))
            })?;
        }
        Ok(config)
    }

    /// Sets the API key
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        self.api_key = Some(api_key.into());
        self
    }

    /// Sets the request timeout
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout_ms = timeout.as_millis() as u64;
        self
    }

    /// Replaces the retry policy
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Per-request timeout
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    /// Resolves an endpoint path (e.g. `/trace/call`) against the base URL
    pub fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        // Url::join drops the last segment unless the base ends with '/'
        let mut base = self.base_url.clone();
        if !base.path().ends_with('/') {
            let path = format!("{}/", base.path());
            base.set_path(&path);
        }
        base.join(path.trim_start_matches('/'))
            .map_err(|e| ClientError::InvalidUrl(format!("{path}: {e}")))
    }
}

fn parse_base_url(url: &str) -> Result<Url, ClientError> {
    let parsed = Url::parse(url).map_err(|e| ClientError::InvalidUrl(format!("{url}: {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(parsed),
        scheme => Err(ClientError::InvalidUrl(format!("unsupported scheme '{scheme}'"))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_backoff_is_capped() {
        let retry = RetryConfig {
            max_attempts: 10,
            initial_delay_ms: 100,
            max_delay_ms: 1_000,
            multiplier: 2,
            retry_on_status: vec![],
        };
        assert_eq!(retry.delay_for_attempt(1), Duration::from_millis(100));
        assert_eq!(retry.delay_for_attempt(2), Duration::from_millis(200));
        assert_eq!(retry.delay_for_attempt(4), Duration::from_millis(800));
        assert_eq!(retry.delay_for_attempt(5), Duration::from_millis(1_000));
        assert_eq!(retry.delay_for_attempt(60), Duration::from_millis(1_000));
    }

    #[test]
    fn test_endpoint_keeps_version_prefix() {
        let config = ClientConfig::new("https://api.example.com/v1").unwrap();
        assert_eq!(
            config.endpoint("/simulate/access-list").unwrap().as_str(),
            "https://api.example.com/v1/simulate/access-list"
        );

        let config = ClientConfig::new("https://api.example.com/v1/").unwrap();
        assert_eq!(
            config.endpoint("trace/tx").unwrap().as_str(),
            "https://api.example.com/v1/trace/tx"
        );
    }

    #[test]
    fn test_rejects_non_http_scheme() {
        assert!(ClientConfig::new("ws://localhost:8080").is_err());
        assert!(ClientConfig::new("not a url").is_err());
    }

    #[test]
    fn test_deserialize_partial_config() {
        let config: ClientConfig = serde_json::from_str(
            r#"{"baseUrl": "https://sim.example.org/v1", "retry": {"maxAttempts": 5}}"#,
        )
        .unwrap();
        assert_eq!(config.base_url.as_str(), "https://sim.example.org/v1");
        assert_eq!(config.retry.max_attempts, 5);
        assert_eq!(config.retry.initial_delay_ms, 500);
        assert_eq!(config.timeout_ms, 30_000);
    }
}
