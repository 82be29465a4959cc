//! Client Configuration
//!
//! Defines the configuration schema for the REST client.

use crate::error::{ApiError, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::time::Duration;

/// Settings for an [`ApiClient`](crate::client::ApiClient)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClientConfig {
    /// Base URL every endpoint is appended to
    pub base_url: String,

    /// Bearer token sent in the Authorization header
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,

    /// Environment variable holding the bearer token
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key_env: Option<String>,

    /// Requests allowed per rate period
    #[serde(default = "default_rate_limit")]
    pub rate_limit: usize,

    /// Rate limit period in seconds
    #[serde(default = "default_rate_period")]
    pub rate_period: f64,

    /// Retries after the first attempt
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// Initial retry delay in seconds, doubled on each transport failure
    #[serde(default = "default_retry_delay")]
    pub retry_delay: f64,

    /// Per-attempt timeout in seconds
    #[serde(default = "default_timeout")]
    pub timeout: f64,

    /// User-Agent header value
    #[serde(default = "default_user_agent")]
    pub user_agent: String,

    /// Additional headers to send with every request
    #[serde(default, skip_serializing_if = "HashMap::is_empty")]
    pub headers: HashMap<String, String>,

    /// Retry 5xx responses with backoff instead of failing immediately
    #[serde(default)]
    pub retry_on_server_error: bool,
}

fn default_rate_limit() -> usize {
    60
}

fn default_rate_period() -> f64 {
    60.0
}

fn default_max_retries() -> u32 {
    3
}

fn default_retry_delay() -> f64 {
    1.0
}

fn default_timeout() -> f64 {
    10.0
}

pub(crate) fn default_user_agent() -> String {
    format!("restkit/{}", env!("CARGO_PKG_VERSION"))
}

impl ClientConfig {
    /// Configuration with defaults for everything but the base URL
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_key: None,
            api_key_env: None,
            rate_limit: default_rate_limit(),
            rate_period: default_rate_period(),
            max_retries: default_max_retries(),
            retry_delay: default_retry_delay(),
            timeout: default_timeout(),
            user_agent: default_user_agent(),
            headers: HashMap::new(),
            retry_on_server_error: false,
        }
    }

    /// Set the bearer token
    #[must_use]
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    /// Set the rate limit as `requests` per `period_secs`
    #[must_use]
    pub fn rate_limit(mut self, requests: usize, period_secs: f64) -> Self {
        self.rate_limit = requests;
        self.rate_period = period_secs;
        self
    }

    /// Set retry count and initial delay
    #[must_use]
    pub fn retries(mut self, max_retries: u32, retry_delay_secs: f64) -> Self {
        self.max_retries = max_retries;
        self.retry_delay = retry_delay_secs;
        self
    }

    /// Set the per-attempt timeout
    #[must_use]
    pub fn timeout(mut self, secs: f64) -> Self {
        self.timeout = secs;
        self
    }

    /// Add a default header
    #[must_use]
    pub fn header(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(key.into(), value.into());
        self
    }

    /// Base URL without trailing slashes
    pub fn normalized_base_url(&self) -> &str {
        self.base_url.trim_end_matches('/')
    }

    /// Effective bearer token: the explicit key, else the named env var
    pub fn resolve_api_key(&self) -> Option<String> {
        if let Some(key) = &self.api_key {
            return Some(key.clone());
        }
        self.api_key_env
            .as_ref()
            .and_then(|name| std::env::var(name).ok())
            .filter(|key| !key.is_empty())
    }

    pub fn rate_period_duration(&self) -> Duration {
        Duration::from_secs_f64(self.rate_period)
    }

    pub fn retry_delay_duration(&self) -> Duration {
        Duration::from_secs_f64(self.retry_delay)
    }

    pub fn timeout_duration(&self) -> Duration {
        Duration::from_secs_f64(self.timeout)
    }

    /// Reject settings the client cannot run with
    pub fn validate(&self) -> Result<()> {
        if self.normalized_base_url().is_empty() {
            return Err(ApiError::Config("base_url must not be empty".to_string()));
        }
        if self.rate_limit == 0 {
            return Err(ApiError::Config(
                "rate_limit must be at least 1".to_string(),
            ));
        }
        check_seconds("rate_period", self.rate_period, false)?;
        check_seconds("retry_delay", self.retry_delay, true)?;
        check_seconds("timeout", self.timeout, false)?;
        Ok(())
    }
}

fn check_seconds(field: &str, value: f64, allow_zero: bool) -> Result<()> {
    let valid = value.is_finite()
        && Duration::try_from_secs_f64(value).is_ok()
        && (allow_zero || value > 0.0);

    if valid {
        Ok(())
    } else {
        Err(ApiError::Config(format!(
            "{} must be a {} number of seconds, got {}",
            field,
            if allow_zero { "non-negative" } else { "positive" },
            value
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_deserialize_with_defaults() {
        let json = r#"{ "base_url": "https://api.example.com/" }"#;

        let config: ClientConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config, ClientConfig::new("https://api.example.com/"));
        assert_eq!(config.normalized_base_url(), "https://api.example.com");
        assert_eq!(config.rate_limit, 60);
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.timeout_duration(), Duration::from_secs(10));
    }

    #[test]
    fn test_deserialize_full() {
        let json = r#"{
            "base_url": "https://api.example.com/v1",
            "api_key": "secret",
            "rate_limit": 5,
            "rate_period": 1.5,
            "max_retries": 0,
            "retry_delay": 0.25,
            "timeout": 2,
            "user_agent": "APIClient/1.0",
            "headers": { "X-Tenant": "acme" },
            "retry_on_server_error": true
        }"#;

        let config: ClientConfig = serde_json::from_str(json).unwrap();
        assert_eq!(config.api_key.as_deref(), Some("secret"));
        assert_eq!(config.rate_period_duration(), Duration::from_millis(1500));
        assert_eq!(config.retry_delay_duration(), Duration::from_millis(250));
        assert_eq!(config.user_agent, "APIClient/1.0");
        assert_eq!(config.headers.get("X-Tenant").map(String::as_str), Some("acme"));
        assert!(config.retry_on_server_error);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let base = ClientConfig::new("https://api.example.com");
        assert!(base.validate().is_ok());

        assert!(ClientConfig::new("/").validate().is_err());
        assert!(base.clone().rate_limit(0, 60.0).validate().is_err());
        assert!(base.clone().rate_limit(10, 0.0).validate().is_err());
        assert!(base.clone().retries(3, -1.0).validate().is_err());
        assert!(base.clone().retries(3, f64::NAN).validate().is_err());
        assert!(base.clone().timeout(f64::INFINITY).validate().is_err());
        assert!(base.clone().retries(3, 0.0).validate().is_ok());
    }

    #[test]
    fn test_explicit_api_key_wins() {
        let mut config = ClientConfig::new("https://api.example.com").api_key("explicit");
        config.api_key_env = Some("RESTKIT_TEST_UNSET_KEY_VARIABLE".to_string());
        assert_eq!(config.resolve_api_key().as_deref(), Some("explicit"));

        config.api_key = None;
        assert_eq!(config.resolve_api_key(), None);
    }
}
