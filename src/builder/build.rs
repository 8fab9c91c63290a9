use std::sync::Arc;
use std::time::Duration;

use reqwest::{Client, Url};

use crate::chat::{ChatOptions, ToolChoice};
use crate::client::ChatClient;
use crate::config::{ClientConfig, ConfigError};
use crate::continuation::ContinuationPolicy;
use crate::dispatch::{Dispatcher, RetryPolicy};
use crate::error::LLMError;

use super::chat_builder::ChatClientBuilder;
use super::state::BuilderState;

const CONNECT_TIMEOUT_SECONDS: u64 = 30;

impl ChatClientBuilder {
    pub fn build(self) -> Result<ChatClient, LLMError> {
        self.state.build()
    }
}

impl ChatClient {
    /// Builds a client straight from a loaded config.
    pub fn from_config(config: ClientConfig) -> Result<Self, LLMError> {
        ChatClientBuilder::from_config(config).build()
    }
}

impl BuilderState {
    fn build(mut self) -> Result<ChatClient, LLMError> {
        let mut config = self.resolved_config();
        config.validate()?;
        self.validate_tools()?;
        log::debug!(
            "Building chat client. model={} base_url={} tools={} temp={:?} retries={} continuation={}",
            config.model,
            config.base_url,
            self.tools.as_ref().map(|v| v.len()).unwrap_or(0),
            config.temperature,
            config.retry.max_retries,
            config.continuation.enabled,
        );

        let base_url = parse_base_url(&config.base_url)?;
        let http = match self.http_client.take() {
            Some(client) => client,
            None => Client::builder()
                .connect_timeout(Duration::from_secs(CONNECT_TIMEOUT_SECONDS))
                .build()
                .map_err(|e| ConfigError::Invalid {
                    field: "http_client",
                    reason: e.to_string(),
                })?,
        };
        let policy = self
            .retry_policy
            .take()
            .unwrap_or_else(|| RetryPolicy::from(&config.retry));
        let api_key = config.api_key.take().ok_or(ConfigError::MissingApiKey)?;

        let defaults = ChatOptions {
            model: Some(config.model.clone()),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
            top_p: self.top_p,
            tools: self.tools.take(),
            tool_choice: self.tool_choice.take(),
            ..ChatOptions::default()
        };

        Ok(ChatClient {
            dispatcher: Dispatcher::new(http, policy),
            base_url,
            api_key: Arc::new(api_key),
            defaults,
            request_timeout: config.timeout_seconds.map(Duration::from_secs),
            stream_idle_timeout: config.stream_idle_timeout(),
            continuation: ContinuationPolicy::from(&config.continuation),
            system: config.system,
        })
    }

    fn validate_tools(&self) -> Result<(), LLMError> {
        match &self.tool_choice {
            Some(ToolChoice::Tool(name)) => {
                let found = self
                    .tools
                    .as_ref()
                    .is_some_and(|tools| tools.iter().any(|tool| tool.function.name == *name));
                if !found {
                    return Err(LLMError::InvalidRequest(format!(
                        "tool choice {name} does not name a configured tool"
                    )));
                }
            }
            Some(_) if self.tools.is_none() => {
                return Err(LLMError::InvalidRequest(
                    "tool choice cannot be set without tools".to_string(),
                ));
            }
            _ => {}
        }
        Ok(())
    }
}

/// Relative endpoint paths only join correctly below a trailing slash.
fn parse_base_url(raw: &str) -> Result<Url, ConfigError> {
    let mut raw = raw.trim().to_string();
    if !raw.ends_with('/') {
        raw.push('/');
    }
    Url::parse(&raw).map_err(|e| ConfigError::Invalid {
        field: "base_url",
        reason: e.to_string(),
    })
}
