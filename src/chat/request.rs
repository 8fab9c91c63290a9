use serde::Serialize;

use super::message::{ChatMessage, MessageContent};
use super::tool::{Tool, ToolCall, ToolChoice};

/// Output format requested from the model.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ResponseFormat {
    Text,
    JsonObject,
}

/// Per-request generation options. Unset fields fall back to the client
/// defaults.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChatOptions {
    pub model: Option<String>,
    pub temperature: Option<f32>,
    pub max_tokens: Option<u32>,
    pub top_p: Option<f32>,
    /// Number of choices to generate
    pub n: Option<u32>,
    pub stop: Option<Vec<String>>,
    pub presence_penalty: Option<f32>,
    pub frequency_penalty: Option<f32>,
    pub response_format: Option<ResponseFormat>,
    pub tools: Option<Vec<Tool>>,
    pub tool_choice: Option<ToolChoice>,
    /// Set on continuation rounds so merging cannot bring back a ceiling
    pub(crate) lift_limits: bool,
}

impl ChatOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn top_p(mut self, top_p: f32) -> Self {
        self.top_p = Some(top_p);
        self
    }

    pub fn n(mut self, n: u32) -> Self {
        self.n = Some(n);
        self
    }

    pub fn stop(mut self, stop: Vec<String>) -> Self {
        self.stop = Some(stop);
        self
    }

    pub fn response_format(mut self, format: ResponseFormat) -> Self {
        self.response_format = Some(format);
        self
    }

    pub fn tools(mut self, tools: Vec<Tool>) -> Self {
        self.tools = Some(tools);
        self
    }

    pub fn tool_choice(mut self, choice: ToolChoice) -> Self {
        self.tool_choice = Some(choice);
        self
    }

    /// Values set here win; unset ones are taken from `defaults`. Options
    /// of a continuation round never inherit `max_tokens` or `n`.
    pub fn merged_over(&self, defaults: &ChatOptions) -> ChatOptions {
        let (max_tokens, n) = if self.lift_limits {
            (None, None)
        } else {
            (
                self.max_tokens.or(defaults.max_tokens),
                self.n.or(defaults.n),
            )
        };
        ChatOptions {
            model: self.model.clone().or_else(|| defaults.model.clone()),
            temperature: self.temperature.or(defaults.temperature),
            max_tokens,
            top_p: self.top_p.or(defaults.top_p),
            n,
            stop: self.stop.clone().or_else(|| defaults.stop.clone()),
            presence_penalty: self.presence_penalty.or(defaults.presence_penalty),
            frequency_penalty: self.frequency_penalty.or(defaults.frequency_penalty),
            response_format: self.response_format.or(defaults.response_format),
            tools: self.tools.clone().or_else(|| defaults.tools.clone()),
            tool_choice: self.tool_choice.clone().or_else(|| defaults.tool_choice.clone()),
            lift_limits: self.lift_limits,
        }
    }

    /// Options for a continuation round: no token ceiling and a single choice.
    pub(crate) fn for_continuation(&self) -> ChatOptions {
        ChatOptions {
            max_tokens: None,
            n: None,
            lift_limits: true,
            ..self.clone()
        }
    }
}

#[derive(Serialize, Debug)]
pub(crate) struct WireMessage<'a> {
    role: &'static str,
    content: &'a MessageContent,
    #[serde(skip_serializing_if = "std::ops::Not::not")]
    partial: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_call_id: Option<&'a str>,
    #[serde(skip_serializing_if = "<[ToolCall]>::is_empty")]
    tool_calls: &'a [ToolCall],
}

impl<'a> From<&'a ChatMessage> for WireMessage<'a> {
    fn from(msg: &'a ChatMessage) -> Self {
        Self {
            role: msg.role.as_str(),
            content: &msg.content,
            partial: msg.is_partial(),
            name: msg.name.as_deref(),
            tool_call_id: msg.tool_call_id.as_deref(),
            tool_calls: &msg.tool_calls,
        }
    }
}

/// Request payload for the chat completions endpoint.
#[derive(Serialize, Debug)]
pub(crate) struct WireRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    n: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    stop: Option<&'a [String]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    presence_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    frequency_penalty: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<&'a [Tool]>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<&'a ToolChoice>,
    stream: bool,
}

impl<'a> WireRequest<'a> {
    /// `options` must already be merged with the client defaults.
    pub(crate) fn new(
        model: &'a str,
        messages: &'a [ChatMessage],
        options: &'a ChatOptions,
        stream: bool,
    ) -> Self {
        Self {
            model,
            messages: messages.iter().map(WireMessage::from).collect(),
            temperature: options.temperature,
            max_tokens: options.max_tokens,
            top_p: options.top_p,
            n: options.n.filter(|n| *n > 1),
            stop: options.stop.as_deref(),
            presence_penalty: options.presence_penalty,
            frequency_penalty: options.frequency_penalty,
            response_format: options.response_format,
            tools: options.tools.as_deref().filter(|tools| !tools.is_empty()),
            tool_choice: options.tool_choice.as_ref(),
            stream,
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::chat::PartialKind;

    #[test]
    fn request_serializes_minimal_body() {
        let messages = vec![ChatMessage::user().content("hi").build()];
        let options = ChatOptions::new();
        let body = serde_json::to_value(WireRequest::new("x", &messages, &options, false)).unwrap();
        assert_eq!(
            body,
            json!({
                "model": "x",
                "messages": [{"role": "user", "content": "hi"}],
                "stream": false
            })
        );
    }

    #[test]
    fn partial_turn_carries_flag_and_name() {
        let messages = vec![
            ChatMessage::user().content("tell a story").build(),
            ChatMessage::assistant()
                .content("Once upon")
                .name("narrator")
                .partial(PartialKind::Seed)
                .build(),
        ];
        let options = ChatOptions::new().temperature(0.3).n(2);
        let body = serde_json::to_value(WireRequest::new("x", &messages, &options, true)).unwrap();
        assert_eq!(
            body["messages"][1],
            json!({"role": "assistant", "content": "Once upon", "partial": true, "name": "narrator"})
        );
        assert_eq!(body["n"], json!(2));
        assert_eq!(body["stream"], json!(true));
    }

    #[test]
    fn merge_prefers_call_values() {
        let defaults = ChatOptions::new().model("a").temperature(0.1).max_tokens(10);
        let call = ChatOptions::new().temperature(0.9);
        let merged = call.merged_over(&defaults);
        assert_eq!(merged.model.as_deref(), Some("a"));
        assert_eq!(merged.temperature, Some(0.9));
        assert_eq!(merged.max_tokens, Some(10));
        assert_eq!(merged.for_continuation().max_tokens, None);
    }

    #[test]
    fn continuation_options_do_not_inherit_default_ceiling() {
        let defaults = ChatOptions::new().model("a").max_tokens(3).n(2).temperature(0.2);
        let round = ChatOptions::new().temperature(0.7).for_continuation();
        let merged = round.merged_over(&defaults);
        assert_eq!(merged.max_tokens, None);
        assert_eq!(merged.n, None);
        assert_eq!(merged.model.as_deref(), Some("a"));
        assert_eq!(merged.temperature, Some(0.7));

        let first = ChatOptions::new().merged_over(&defaults);
        assert_eq!(first.max_tokens, Some(3));
    }
}
