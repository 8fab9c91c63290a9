//! Ordered turn history of one conversation.
//!
//! The history is mutated only through the methods below. At most one turn
//! is partial at any time and it is always the most recent one; any append
//! is refused until it has been resolved.

use crate::chat::{ChatMessage, ChatRole, MessageContent, PartialKind};
use crate::error::LLMError;

/// Position in the history that a failed round can be rolled back to.
#[derive(Debug, Clone)]
pub struct Checkpoint {
    len: usize,
    partial: Option<ChatMessage>,
}

#[derive(Debug, Clone, Default)]
pub struct Conversation {
    turns: Vec<ChatMessage>,
}

impl Conversation {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_system(system: impl Into<MessageContent>) -> Self {
        Self {
            turns: vec![ChatMessage::system().content(system).build()],
        }
    }

    /// All turns in chronological order, as sent on the next request.
    pub fn turns(&self) -> &[ChatMessage] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }

    pub fn append_user(&mut self, content: impl Into<MessageContent>) -> Result<(), LLMError> {
        self.push(ChatMessage::user().content(content).build())
    }

    /// Appends a fully built user turn, e.g. one carrying images.
    pub fn append_user_message(&mut self, message: ChatMessage) -> Result<(), LLMError> {
        if message.role != ChatRole::User {
            return Err(LLMError::InvalidRequest(format!(
                "expected a user turn, got {}",
                message.role
            )));
        }
        self.push(message)
    }

    pub fn append_assistant(&mut self, content: impl Into<MessageContent>) -> Result<(), LLMError> {
        self.push(ChatMessage::assistant().content(content).build())
    }

    /// Appends a finished assistant turn, keeping any tool calls it requested.
    pub fn append_assistant_message(&mut self, message: ChatMessage) -> Result<(), LLMError> {
        if message.role != ChatRole::Assistant || message.is_partial() {
            return Err(LLMError::InvalidRequest(
                "expected a finished assistant turn".to_string(),
            ));
        }
        self.push(message)
    }

    pub fn append_tool_result(
        &mut self,
        call_id: impl Into<String>,
        content: impl Into<MessageContent>,
    ) -> Result<(), LLMError> {
        self.push(ChatMessage::tool(call_id).content(content).build())
    }

    /// References server-side cached context by tag.
    pub fn append_cache_ref(&mut self, tag: &str, reset_ttl: Option<u64>) -> Result<(), LLMError> {
        let content = match reset_ttl {
            Some(ttl) => format!("tag={tag};reset_ttl={ttl}"),
            None => format!("tag={tag}"),
        };
        self.push(ChatMessage::cache().content(content).build())
    }

    /// Adds the extracted text of an uploaded file as context.
    pub fn append_file_context(&mut self, text: impl Into<MessageContent>) -> Result<(), LLMError> {
        self.push(ChatMessage::system().content(text).build())
    }

    /// Replaces the leading system prompt, or inserts one.
    pub fn replace_system(&mut self, system: impl Into<MessageContent>) {
        let turn = ChatMessage::system().content(system).build();
        match self.turns.first_mut() {
            Some(first) if first.role == ChatRole::System => *first = turn,
            _ => self.turns.insert(0, turn),
        }
    }

    /// Opens an assistant turn with caller-chosen text that the model will
    /// continue from. Must directly follow a user turn.
    pub fn seed_partial(&mut self, text: &str, name: Option<String>) -> Result<(), LLMError> {
        self.ensure_no_partial()?;
        if self.turns.last().map(|t| t.role) != Some(ChatRole::User) {
            return Err(LLMError::InvalidRequest(
                "a partial seed must follow a user turn".to_string(),
            ));
        }
        let mut builder = ChatMessage::assistant()
            .content(text)
            .partial(PartialKind::Seed);
        if let Some(name) = name {
            builder = builder.name(name);
        }
        self.turns.push(builder.build());
        Ok(())
    }

    /// Stores `accumulated` as the open assistant turn, creating it if needed.
    pub fn mark_partial(&mut self, accumulated: &str) {
        match self.turns.last_mut() {
            Some(last) if last.is_partial() => {
                last.content = MessageContent::Text(accumulated.to_string());
                last.partial = Some(PartialKind::Continuation);
            }
            _ => self.turns.push(
                ChatMessage::assistant()
                    .content(accumulated)
                    .partial(PartialKind::Continuation)
                    .build(),
            ),
        }
    }

    /// The open assistant turn, if any.
    pub fn partial(&self) -> Option<&ChatMessage> {
        self.turns.last().filter(|turn| turn.is_partial())
    }

    /// Closes the open assistant turn with its final text.
    pub fn resolve_partial(&mut self, final_text: &str) -> Result<&ChatMessage, LLMError> {
        match self.turns.last_mut() {
            Some(last) if last.is_partial() => {
                last.content = MessageContent::Text(final_text.to_string());
                last.partial = None;
                Ok(last)
            }
            _ => Err(LLMError::InvalidRequest(
                "no partial turn to resolve".to_string(),
            )),
        }
    }

    /// The most recent turn with `role` and everything after it. Empty when
    /// no such turn exists.
    pub fn turns_since(&self, role: ChatRole) -> &[ChatMessage] {
        match self.turns.iter().rposition(|turn| turn.role == role) {
            Some(pos) => &self.turns[pos..],
            None => &[],
        }
    }

    pub fn last_user(&self) -> Option<&ChatMessage> {
        self.turns_since(ChatRole::User).first()
    }

    /// Removes turns. System turns survive when `preserve_system` is set.
    pub fn clear(&mut self, preserve_system: bool) {
        if preserve_system {
            self.turns.retain(|turn| turn.role == ChatRole::System);
        } else {
            self.turns.clear();
        }
    }

    /// Keeps system turns plus at most `max_turns` of the most recent others.
    pub fn trim_to(&mut self, max_turns: usize) {
        let others = self
            .turns
            .iter()
            .filter(|turn| turn.role != ChatRole::System)
            .count();
        let mut to_drop = others.saturating_sub(max_turns);
        if to_drop == 0 {
            return;
        }
        self.turns.retain(|turn| {
            if turn.role == ChatRole::System || to_drop == 0 {
                return true;
            }
            to_drop -= 1;
            false
        });
        // A tool result is meaningless without the call that produced it.
        while let Some(pos) = self
            .turns
            .iter()
            .position(|turn| turn.role != ChatRole::System)
        {
            if self.turns[pos].role != ChatRole::Tool {
                break;
            }
            self.turns.remove(pos);
        }
    }

    pub fn checkpoint(&self) -> Checkpoint {
        Checkpoint {
            len: self.turns.len(),
            partial: self.partial().cloned(),
        }
    }

    /// Restores the history to `checkpoint`.
    pub fn rollback(&mut self, checkpoint: Checkpoint) {
        self.turns.truncate(checkpoint.len);
        if let Some(partial) = checkpoint.partial {
            if let Some(last) = self.turns.last_mut() {
                *last = partial;
            }
        }
    }

    fn push(&mut self, turn: ChatMessage) -> Result<(), LLMError> {
        self.ensure_no_partial()?;
        self.turns.push(turn);
        Ok(())
    }

    fn ensure_no_partial(&self) -> Result<(), LLMError> {
        if self.partial().is_some() {
            return Err(LLMError::InvalidRequest(
                "the previous assistant turn is still partial".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
#[path = "conversation/tests.rs"]
mod tests;
