use std::time::Duration;

use secrecy::SecretString;
use serde::Deserialize;

use crate::dispatch::RetryPolicy;

use super::error::ConfigError;

pub(crate) const DEFAULT_BASE_URL: &str = "https://api.moonshot.cn/v1/";
pub(crate) const DEFAULT_MODEL: &str = "moonshot-v1-8k";
const DEFAULT_TIMEOUT_SECONDS: u64 = 120;
const DEFAULT_STREAM_IDLE_TIMEOUT_SECONDS: u64 = 60;

/// Settings used to build a [`ChatClient`](crate::ChatClient).
#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// API key sent as a bearer token
    pub api_key: Option<SecretString>,
    /// Base URL of the API, ending with a slash
    pub base_url: String,
    /// Default model identifier
    pub model: String,
    /// Default sampling temperature
    pub temperature: Option<f32>,
    /// Default completion token ceiling
    pub max_tokens: Option<u32>,
    /// Whole-request timeout for non-streaming calls
    pub timeout_seconds: Option<u64>,
    /// Longest silence tolerated between two stream reads
    pub stream_idle_timeout_seconds: u64,
    /// System prompt placed at the start of new conversations
    pub system: Option<String>,
    pub retry: RetryConfig,
    pub continuation: ContinuationConfig,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            base_url: DEFAULT_BASE_URL.to_string(),
            model: DEFAULT_MODEL.to_string(),
            temperature: None,
            max_tokens: None,
            timeout_seconds: Some(DEFAULT_TIMEOUT_SECONDS),
            stream_idle_timeout_seconds: DEFAULT_STREAM_IDLE_TIMEOUT_SECONDS,
            system: None,
            retry: RetryConfig::default(),
            continuation: ContinuationConfig::default(),
        }
    }
}

impl ClientConfig {
    /// Checks values that would otherwise fail only at request time.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.api_key.is_none() {
            return Err(ConfigError::MissingApiKey);
        }
        if self.model.trim().is_empty() {
            return Err(invalid("model", "must not be empty"));
        }
        if !self.base_url.starts_with("http://") && !self.base_url.starts_with("https://") {
            return Err(invalid("base_url", "must be an http(s) URL"));
        }
        if let Some(temperature) = self.temperature {
            if !(0.0..=2.0).contains(&temperature) {
                return Err(invalid("temperature", "must be within 0.0..=2.0"));
            }
        }
        if self.stream_idle_timeout_seconds == 0 {
            return Err(invalid("stream_idle_timeout_seconds", "must be positive"));
        }
        if self.retry.max_retries == 0 {
            return Err(invalid("retry.max_retries", "must allow at least one attempt"));
        }
        if self.retry.initial_delay_ms > self.retry.max_delay_ms {
            return Err(invalid(
                "retry.initial_delay_ms",
                "must not exceed retry.max_delay_ms",
            ));
        }
        if self.continuation.max_rounds == 0 {
            return Err(invalid("continuation.max_rounds", "must be at least 1"));
        }
        Ok(())
    }

    pub(crate) fn stream_idle_timeout(&self) -> Duration {
        Duration::from_secs(self.stream_idle_timeout_seconds)
    }
}

fn invalid(field: &'static str, reason: &str) -> ConfigError {
    ConfigError::Invalid {
        field,
        reason: reason.to_string(),
    }
}

/// Backoff settings for transient failures.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Total attempts, including the first one
    pub max_retries: u32,
    pub initial_delay_ms: u64,
    pub max_delay_ms: u64,
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 500,
            max_delay_ms: 8_000,
            jitter: true,
        }
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(cfg: &RetryConfig) -> Self {
        RetryPolicy {
            max_retries: cfg.max_retries,
            initial_delay: Duration::from_millis(cfg.initial_delay_ms),
            max_delay: Duration::from_millis(cfg.max_delay_ms),
            jitter: cfg.jitter,
        }
    }
}

/// Automatic continuation of length-truncated completions.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ContinuationConfig {
    pub enabled: bool,
    /// Upper bound on rounds for one logical answer, the first round included
    pub max_rounds: u32,
}

impl Default for ContinuationConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_rounds: 5,
        }
    }
}
