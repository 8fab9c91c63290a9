use reqwest::Client;
use secrecy::SecretString;

use crate::chat::{Tool, ToolChoice};
use crate::config::ClientConfig;
use crate::dispatch::RetryPolicy;

/// Values collected by [`ChatClientBuilder`](super::ChatClientBuilder).
/// Unset fields fall back to `base`.
#[derive(Default)]
pub(crate) struct BuilderState {
    pub(crate) base: ClientConfig,
    pub(crate) api_key: Option<SecretString>,
    pub(crate) base_url: Option<String>,
    pub(crate) model: Option<String>,
    pub(crate) max_tokens: Option<u32>,
    pub(crate) temperature: Option<f32>,
    pub(crate) top_p: Option<f32>,
    pub(crate) system: Option<String>,
    pub(crate) timeout_seconds: Option<u64>,
    pub(crate) stream_idle_timeout_seconds: Option<u64>,
    pub(crate) tools: Option<Vec<Tool>>,
    pub(crate) tool_choice: Option<ToolChoice>,
    pub(crate) retry_attempts: Option<u32>,
    pub(crate) retry_base_delay_ms: Option<u64>,
    pub(crate) retry_max_delay_ms: Option<u64>,
    pub(crate) retry_jitter: Option<bool>,
    pub(crate) retry_policy: Option<RetryPolicy>,
    pub(crate) continuation: Option<bool>,
    pub(crate) max_continuation_rounds: Option<u32>,
    pub(crate) http_client: Option<Client>,
}

impl BuilderState {
    pub(crate) fn new(base: ClientConfig) -> Self {
        Self {
            base,
            ..Self::default()
        }
    }

    /// Folds the explicit builder values over the base config.
    pub(crate) fn resolved_config(&mut self) -> ClientConfig {
        let mut config = std::mem::take(&mut self.base);
        if let Some(key) = self.api_key.take() {
            config.api_key = Some(key);
        }
        if let Some(url) = self.base_url.take() {
            config.base_url = url;
        }
        if let Some(model) = self.model.take() {
            config.model = model;
        }
        if self.max_tokens.is_some() {
            config.max_tokens = self.max_tokens;
        }
        if self.temperature.is_some() {
            config.temperature = self.temperature;
        }
        if let Some(system) = self.system.take() {
            config.system = Some(system);
        }
        if self.timeout_seconds.is_some() {
            config.timeout_seconds = self.timeout_seconds;
        }
        if let Some(idle) = self.stream_idle_timeout_seconds {
            config.stream_idle_timeout_seconds = idle;
        }
        if let Some(attempts) = self.retry_attempts {
            config.retry.max_retries = attempts;
        }
        if let Some(base) = self.retry_base_delay_ms {
            config.retry.initial_delay_ms = base;
        }
        if let Some(max) = self.retry_max_delay_ms {
            config.retry.max_delay_ms = max;
        }
        if let Some(jitter) = self.retry_jitter {
            config.retry.jitter = jitter;
        }
        if let Some(enabled) = self.continuation {
            config.continuation.enabled = enabled;
        }
        if let Some(rounds) = self.max_continuation_rounds {
            config.continuation.max_rounds = rounds;
        }
        config
    }
}
