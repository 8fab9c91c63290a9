use async_trait::async_trait;
use tokio_util::sync::CancellationToken;

use crate::error::LLMError;

use super::completion::CompletionResult;
use super::message::ChatMessage;
use super::request::ChatOptions;
use super::stream::{ChunkControl, StreamChunk};

/// Callback receiving text as it streams in.
pub type ChunkHandler<'a> = dyn FnMut(&StreamChunk) -> ChunkControl + Send + 'a;

/// One completion round against a model endpoint.
///
/// Implementations send `messages` as they are; folding the result back into
/// a conversation and continuing truncated answers happens above this trait.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    /// Sends the messages and waits for the whole answer.
    async fn complete(
        &self,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> Result<CompletionResult, LLMError>;

    /// Sends the messages with streaming enabled, feeding `on_chunk` as text
    /// arrives.
    async fn complete_streaming(
        &self,
        messages: &[ChatMessage],
        options: &ChatOptions,
        on_chunk: &mut ChunkHandler<'_>,
        cancel: &CancellationToken,
    ) -> Result<CompletionResult, LLMError>;
}
