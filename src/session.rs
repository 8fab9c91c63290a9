//! A conversation bound to a client.
//!
//! Each `ask*` call appends the user turn, completes it (continuing the
//! answer while it is cut off by the length limit) and records the assistant
//! turn. When the call fails the history is rolled back to how it was before
//! the call, so a retry starts from a consistent state.

use tokio_util::sync::CancellationToken;

use crate::chat::{ChatMessage, ChatOptions, ChunkControl, CompletionResult, StreamChunk};
use crate::client::ChatClient;
use crate::continuation::{self, ContinuationPolicy};
use crate::conversation::{Checkpoint, Conversation};
use crate::error::LLMError;

#[derive(Debug, Clone)]
struct Seed {
    text: String,
    name: Option<String>,
}

#[derive(Debug, Clone)]
pub struct ChatSession {
    client: ChatClient,
    conversation: Conversation,
    policy: ContinuationPolicy,
    pending_seed: Option<Seed>,
    max_turns: Option<usize>,
}

impl ChatSession {
    /// Starts an empty conversation, with the client's system prompt if any.
    pub fn new(client: ChatClient) -> Self {
        let conversation = match client.system() {
            Some(system) => Conversation::with_system(system),
            None => Conversation::new(),
        };
        Self::with_conversation(client, conversation)
    }

    /// Resumes an existing conversation.
    pub fn with_conversation(client: ChatClient, conversation: Conversation) -> Self {
        let policy = client.continuation_policy();
        Self {
            client,
            conversation,
            policy,
            pending_seed: None,
            max_turns: None,
        }
    }

    pub fn client(&self) -> &ChatClient {
        &self.client
    }

    pub fn history(&self) -> &Conversation {
        &self.conversation
    }

    /// Overrides the client's continuation settings for this session.
    pub fn set_continuation(&mut self, policy: ContinuationPolicy) {
        self.policy = policy;
    }

    /// Keeps at most `max_turns` non-system turns after every answer.
    pub fn set_max_turns(&mut self, max_turns: Option<usize>) {
        self.max_turns = max_turns;
    }

    pub fn set_system(&mut self, system: impl Into<String>) {
        self.conversation.replace_system(system.into());
    }

    pub fn reset(&mut self, preserve_system: bool) {
        self.conversation.clear(preserve_system);
        self.pending_seed = None;
    }

    /// Makes the next answer start with `text`, spoken by `name` if given.
    /// The seed is placed after the next user turn and is part of the
    /// returned content.
    pub fn seed_partial(&mut self, text: impl Into<String>, name: Option<String>) {
        self.pending_seed = Some(Seed {
            text: text.into(),
            name,
        });
    }

    /// Adds context cached server side under `tag`.
    pub fn attach_cache(&mut self, tag: &str, reset_ttl: Option<u64>) -> Result<(), LLMError> {
        self.conversation.append_cache_ref(tag, reset_ttl)
    }

    /// Adds extracted file text as context for the following questions.
    pub fn attach_file_text(&mut self, text: impl Into<String>) -> Result<(), LLMError> {
        self.conversation.append_file_context(text.into())
    }

    pub async fn ask(&mut self, text: &str) -> Result<CompletionResult, LLMError> {
        self.ask_with(text, &ChatOptions::new()).await
    }

    pub async fn ask_with(&mut self, text: &str, options: &ChatOptions) -> Result<CompletionResult, LLMError> {
        self.ask_message(ChatMessage::user().content(text).build(), options)
            .await
    }

    /// Asks with a prebuilt user turn, e.g. one carrying images.
    pub async fn ask_message(
        &mut self,
        message: ChatMessage,
        options: &ChatOptions,
    ) -> Result<CompletionResult, LLMError> {
        let (checkpoint, seed) = self.open_round(message)?;
        let outcome = continuation::complete(
            &self.client,
            &mut self.conversation,
            options,
            self.policy,
        )
        .await;
        self.settle(checkpoint, seed, outcome)
    }

    /// Streams the answer through `on_chunk`.
    ///
    /// The handler may return `()`, a `bool` (false stops reading) or a
    /// [`ChunkControl`]. Stopping or cancelling keeps what was received so
    /// far as the assistant turn and marks the result `stopped_early`.
    pub async fn ask_streaming<F, C>(
        &mut self,
        text: &str,
        mut on_chunk: F,
        cancel: &CancellationToken,
    ) -> Result<CompletionResult, LLMError>
    where
        F: FnMut(&StreamChunk) -> C + Send,
        C: Into<ChunkControl>,
    {
        let (checkpoint, seed) = self.open_round(ChatMessage::user().content(text).build())?;
        let mut handler = |chunk: &StreamChunk| -> ChunkControl { on_chunk(chunk).into() };
        let outcome = continuation::complete_streaming(
            &self.client,
            &mut self.conversation,
            &ChatOptions::new(),
            self.policy,
            &mut handler,
            cancel,
        )
        .await;
        self.settle(checkpoint, seed, outcome)
    }

    /// Answers tool calls from the previous turn and lets the model go on.
    pub async fn submit_tool_results<I, S>(
        &mut self,
        results: I,
        options: &ChatOptions,
    ) -> Result<CompletionResult, LLMError>
    where
        I: IntoIterator<Item = (String, S)>,
        S: Into<String>,
    {
        let checkpoint = self.conversation.checkpoint();
        for (call_id, content) in results {
            let content: String = content.into();
            if let Err(err) = self.conversation.append_tool_result(call_id, content) {
                self.conversation.rollback(checkpoint);
                return Err(err);
            }
        }
        let outcome = continuation::complete(
            &self.client,
            &mut self.conversation,
            options,
            self.policy,
        )
        .await;
        self.settle(checkpoint, None, outcome)
    }

    fn open_round(&mut self, message: ChatMessage) -> Result<(Checkpoint, Option<Seed>), LLMError> {
        let checkpoint = self.conversation.checkpoint();
        self.conversation.append_user_message(message)?;
        let seed = self.pending_seed.take();
        if let Some(seed) = &seed {
            if let Err(err) = self.conversation.seed_partial(&seed.text, seed.name.clone()) {
                self.conversation.rollback(checkpoint);
                self.pending_seed = Some(seed.clone());
                return Err(err);
            }
        }
        Ok((checkpoint, seed))
    }

    fn settle(
        &mut self,
        checkpoint: Checkpoint,
        seed: Option<Seed>,
        outcome: Result<CompletionResult, LLMError>,
    ) -> Result<CompletionResult, LLMError> {
        match outcome {
            Ok(result) => {
                if let Some(max_turns) = self.max_turns {
                    self.conversation.trim_to(max_turns);
                }
                Ok(result)
            }
            Err(err) => {
                log::debug!("rolling back conversation after {}", err.kind());
                self.conversation.rollback(checkpoint);
                if seed.is_some() {
                    self.pending_seed = seed;
                }
                Err(err)
            }
        }
    }
}
