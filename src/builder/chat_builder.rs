use reqwest::Client;
use secrecy::SecretString;

use crate::chat::{Tool, ToolChoice};
use crate::config::ClientConfig;

use super::state::BuilderState;

/// Builder for configuring and instantiating a [`ChatClient`](crate::ChatClient).
pub struct ChatClientBuilder {
    pub(super) state: BuilderState,
}

impl Default for ChatClientBuilder {
    fn default() -> Self {
        Self {
            state: BuilderState::new(ClientConfig::default()),
        }
    }
}

impl ChatClientBuilder {
    /// Creates a builder starting from the built-in defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a builder starting from a loaded config. Builder calls
    /// override its values.
    pub fn from_config(config: ClientConfig) -> Self {
        Self {
            state: BuilderState::new(config),
        }
    }

    /// Sets the API key for authentication.
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.state.api_key = Some(SecretString::new(key.into()));
        self
    }

    /// Sets the base URL for API requests.
    pub fn base_url(mut self, url: impl Into<String>) -> Self {
        self.state.base_url = Some(url.into());
        self
    }

    /// Sets the default model identifier.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.state.model = Some(model.into());
        self
    }

    /// Sets the default maximum number of tokens to generate.
    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.state.max_tokens = Some(max_tokens);
        self
    }

    /// Sets the default sampling temperature.
    pub fn temperature(mut self, temperature: f32) -> Self {
        self.state.temperature = Some(temperature);
        self
    }

    pub fn top_p(mut self, top_p: f32) -> Self {
        self.state.top_p = Some(top_p);
        self
    }

    /// Sets the system prompt new sessions start with.
    pub fn system(mut self, system: impl Into<String>) -> Self {
        self.state.system = Some(system.into());
        self
    }

    /// Sets the whole-request timeout for non-streaming calls.
    pub fn timeout_seconds(mut self, timeout_seconds: u64) -> Self {
        self.state.timeout_seconds = Some(timeout_seconds);
        self
    }

    /// Sets the longest silence tolerated between two stream reads.
    pub fn stream_idle_timeout_seconds(mut self, seconds: u64) -> Self {
        self.state.stream_idle_timeout_seconds = Some(seconds);
        self
    }

    /// Adds a function tool offered on every request.
    pub fn tool(mut self, tool: Tool) -> Self {
        self.state.tools.get_or_insert_with(Vec::new).push(tool);
        self
    }

    pub fn tool_choice(mut self, choice: ToolChoice) -> Self {
        self.state.tool_choice = Some(choice);
        self
    }

    /// Uses a preconfigured HTTP client, e.g. one with a proxy.
    pub fn http_client(mut self, client: Client) -> Self {
        self.state.http_client = Some(client);
        self
    }
}
