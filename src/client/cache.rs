use std::collections::HashMap;

use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::{Deserialize, Serialize};

use crate::chat::{ChatMessage, Tool, WireMessage};
use crate::decode::decode_typed;
use crate::error::LLMError;

use super::ChatClient;

/// Context to store server side so later requests can reference it by tag.
#[derive(Debug, Clone, Default)]
pub struct CacheRequest {
    pub model: String,
    pub messages: Vec<ChatMessage>,
    pub tools: Vec<Tool>,
    pub name: Option<String>,
    pub description: Option<String>,
    pub metadata: HashMap<String, String>,
    /// Lifetime in seconds
    pub ttl: Option<u64>,
}

impl CacheRequest {
    pub fn new(model: impl Into<String>, messages: Vec<ChatMessage>) -> Self {
        Self {
            model: model.into(),
            messages,
            ..Self::default()
        }
    }

    pub fn ttl(mut self, seconds: u64) -> Self {
        self.ttl = Some(seconds);
        self
    }

    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }
}

#[derive(Serialize)]
struct CacheBody<'a> {
    model: &'a str,
    messages: Vec<WireMessage<'a>>,
    #[serde(skip_serializing_if = "<[Tool]>::is_empty")]
    tools: &'a [Tool],
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    description: Option<&'a str>,
    #[serde(skip_serializing_if = "HashMap::is_empty")]
    metadata: &'a HashMap<String, String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    ttl: Option<u64>,
}

impl<'a> From<&'a CacheRequest> for CacheBody<'a> {
    fn from(request: &'a CacheRequest) -> Self {
        Self {
            model: &request.model,
            messages: request.messages.iter().map(WireMessage::from).collect(),
            tools: &request.tools,
            name: request.name.as_deref(),
            description: request.description.as_deref(),
            metadata: &request.metadata,
            ttl: request.ttl,
        }
    }
}

/// A stored context cache.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct CacheObject {
    pub id: String,
    #[serde(default)]
    pub status: String,
    #[serde(default)]
    pub model: String,
    /// Prompt tokens held by the cache
    #[serde(default)]
    pub tokens: u32,
    #[serde(with = "chrono::serde::ts_seconds")]
    pub created_at: DateTime<Utc>,
    #[serde(default, with = "chrono::serde::ts_seconds_option")]
    pub expired_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub metadata: HashMap<String, String>,
}

/// A human-readable alias pointing at a cache.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct CacheTag {
    pub tag: String,
    pub cache_id: String,
    #[serde(default)]
    pub owned_by: Option<String>,
}

#[derive(Serialize)]
struct TagBody<'a> {
    tag: &'a str,
    cache_id: &'a str,
}

#[derive(Deserialize)]
struct Deleted {
    #[serde(default)]
    deleted: bool,
}

impl ChatClient {
    pub async fn create_cache(&self, request: &CacheRequest) -> Result<CacheObject, LLMError> {
        if request.messages.is_empty() {
            return Err(LLMError::InvalidRequest(
                "a cache needs at least one message".to_string(),
            ));
        }
        let raw = self.send_json("caching", &CacheBody::from(request)).await?;
        decode_typed(raw).await
    }

    pub async fn create_cache_tag(&self, tag: &str, cache_id: &str) -> Result<CacheTag, LLMError> {
        let raw = self
            .send_json("caching/refs/tags", &TagBody { tag, cache_id })
            .await?;
        decode_typed(raw).await
    }

    pub async fn retrieve_cache_tag(&self, tag: &str) -> Result<CacheTag, LLMError> {
        let raw = self
            .send_simple(Method::GET, &format!("caching/refs/tags/{tag}"))
            .await?;
        decode_typed(raw).await
    }

    pub async fn delete_cache_tag(&self, tag: &str) -> Result<bool, LLMError> {
        let raw = self
            .send_simple(Method::DELETE, &format!("caching/refs/tags/{tag}"))
            .await?;
        let deleted: Deleted = decode_typed(raw).await?;
        Ok(deleted.deleted)
    }
}
