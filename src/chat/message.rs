use std::fmt;

use serde::{Deserialize, Serialize};

use super::tool::ToolCall;

/// Role of a turn in a conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
    /// Instructions that frame the whole conversation
    System,
    /// The human participant
    User,
    /// The model
    Assistant,
    /// The output of a tool the model asked for
    Tool,
    /// A reference to server-side cached context
    Cache,
}

impl ChatRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChatRole::System => "system",
            ChatRole::User => "user",
            ChatRole::Assistant => "assistant",
            ChatRole::Tool => "tool",
            ChatRole::Cache => "cache",
        }
    }
}

impl fmt::Display for ChatRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An image reference inside structured content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ImageUrl {
    pub url: String,
}

/// One element of structured message content.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

/// Message body: plain text or a list of typed parts.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum MessageContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

impl Default for MessageContent {
    fn default() -> Self {
        MessageContent::Text(String::new())
    }
}

impl MessageContent {
    /// The textual parts joined together; images contribute nothing.
    pub fn text(&self) -> String {
        match self {
            MessageContent::Text(text) => text.clone(),
            MessageContent::Parts(parts) => parts
                .iter()
                .filter_map(|part| match part {
                    ContentPart::Text { text } => Some(text.as_str()),
                    ContentPart::ImageUrl { .. } => None,
                })
                .collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        match self {
            MessageContent::Text(text) => text.is_empty(),
            MessageContent::Parts(parts) => parts.is_empty(),
        }
    }
}

impl From<String> for MessageContent {
    fn from(text: String) -> Self {
        MessageContent::Text(text)
    }
}

impl From<&str> for MessageContent {
    fn from(text: &str) -> Self {
        MessageContent::Text(text.to_string())
    }
}

/// Why an assistant turn is still open.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PartialKind {
    /// Supplied by the caller to steer how the answer starts
    Seed,
    /// Text accumulated from rounds that were cut off by the length limit
    Continuation,
}

/// A single turn in a conversation.
#[derive(Debug, Clone, PartialEq)]
pub struct ChatMessage {
    /// Who produced the turn
    pub role: ChatRole,
    pub content: MessageContent,
    /// Set while the turn is an unfinished assistant prefix
    pub partial: Option<PartialKind>,
    /// Speaker name, used by role-play seeding
    pub name: Option<String>,
    /// The call this turn answers, for `tool` turns
    pub tool_call_id: Option<String>,
    /// Calls requested by the model, for `assistant` turns
    pub tool_calls: Vec<ToolCall>,
}

impl ChatMessage {
    pub fn system() -> ChatMessageBuilder {
        ChatMessageBuilder::new(ChatRole::System)
    }

    pub fn user() -> ChatMessageBuilder {
        ChatMessageBuilder::new(ChatRole::User)
    }

    pub fn assistant() -> ChatMessageBuilder {
        ChatMessageBuilder::new(ChatRole::Assistant)
    }

    /// Builder for the result of the tool call `call_id`.
    pub fn tool(call_id: impl Into<String>) -> ChatMessageBuilder {
        let mut builder = ChatMessageBuilder::new(ChatRole::Tool);
        builder.tool_call_id = Some(call_id.into());
        builder
    }

    /// Builder for a cache reference turn.
    pub fn cache() -> ChatMessageBuilder {
        ChatMessageBuilder::new(ChatRole::Cache)
    }

    pub fn is_partial(&self) -> bool {
        self.partial.is_some()
    }

    /// Text of the turn.
    pub fn text(&self) -> String {
        self.content.text()
    }
}

/// Builder for ChatMessage
#[derive(Debug)]
pub struct ChatMessageBuilder {
    role: ChatRole,
    content: MessageContent,
    partial: Option<PartialKind>,
    name: Option<String>,
    tool_call_id: Option<String>,
    tool_calls: Vec<ToolCall>,
}

impl ChatMessageBuilder {
    pub fn new(role: ChatRole) -> Self {
        Self {
            role,
            content: MessageContent::default(),
            partial: None,
            name: None,
            tool_call_id: None,
            tool_calls: Vec::new(),
        }
    }

    /// Set the message text
    pub fn content(mut self, content: impl Into<MessageContent>) -> Self {
        self.content = content.into();
        self
    }

    /// Append an image reference, turning the content into parts
    pub fn image_url(mut self, url: impl Into<String>) -> Self {
        let image = ContentPart::ImageUrl {
            image_url: ImageUrl { url: url.into() },
        };
        self.content = match self.content {
            MessageContent::Text(text) if text.is_empty() => MessageContent::Parts(vec![image]),
            MessageContent::Text(text) => {
                MessageContent::Parts(vec![ContentPart::Text { text }, image])
            }
            MessageContent::Parts(mut parts) => {
                parts.push(image);
                MessageContent::Parts(parts)
            }
        };
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn partial(mut self, kind: PartialKind) -> Self {
        self.partial = Some(kind);
        self
    }

    pub fn tool_calls(mut self, calls: Vec<ToolCall>) -> Self {
        self.tool_calls = calls;
        self
    }

    pub fn build(self) -> ChatMessage {
        ChatMessage {
            role: self.role,
            content: self.content,
            partial: self.partial,
            name: self.name,
            tool_call_id: self.tool_call_id,
            tool_calls: self.tool_calls,
        }
    }
}
