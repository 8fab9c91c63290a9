use std::collections::BTreeMap;
use std::time::Duration;

use futures::StreamExt;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;

use crate::chat::{
    ChoiceOutput, ChunkControl, ChunkHandler, CompletionResult, FinishReason, FunctionCall,
    StreamChunk, StreamFrame, ToolCall, Usage,
};
use crate::error::LLMError;

use super::frames::FrameStream;

#[derive(Debug, Default)]
struct ToolCallBuilder {
    id: String,
    name: String,
    arguments: String,
}

#[derive(Debug, Default)]
struct ChoiceAccumulator {
    content: String,
    finish_reason: Option<FinishReason>,
    tool_calls: BTreeMap<u32, ToolCallBuilder>,
}

/// Folds stream frames into a [`CompletionResult`].
///
/// Keeps one accumulator and one finish-reason slot per choice index, so
/// `n > 1` streams are reassembled independently.
#[derive(Debug, Default)]
pub struct StreamReassembler {
    choices: BTreeMap<u32, ChoiceAccumulator>,
    usage: Option<Usage>,
}

impl StreamReassembler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Applies one frame. Returns the chunk to surface when the frame
    /// carried text.
    pub fn apply(&mut self, frame: StreamFrame) -> Option<StreamChunk> {
        let choice = self.choices.entry(frame.index).or_default();

        for delta in frame.tool_calls {
            let call = choice.tool_calls.entry(delta.index).or_default();
            if let Some(id) = delta.id {
                call.id = id;
            }
            if let Some(function) = delta.function {
                if let Some(name) = function.name {
                    call.name.push_str(&name);
                }
                if let Some(arguments) = function.arguments {
                    call.arguments.push_str(&arguments);
                }
            }
        }
        if let Some(reason) = frame.finish_reason {
            choice.finish_reason = Some(reason);
        }
        // Some servers repeat cumulative usage on every event; the last value wins.
        if frame.usage.is_some() {
            self.usage = frame.usage;
        }

        if frame.delta_content.is_empty() {
            return None;
        }
        choice.content.push_str(&frame.delta_content);
        Some(StreamChunk {
            delta_content: frame.delta_content,
            index: frame.index,
            done: false,
            finish_reason: None,
        })
    }

    /// Text accumulated so far for choice `index`.
    pub fn content(&self, index: u32) -> &str {
        self.choices
            .get(&index)
            .map(|choice| choice.content.as_str())
            .unwrap_or("")
    }

    pub fn has_choices(&self) -> bool {
        !self.choices.is_empty()
    }

    /// Finish reason of the first choice, when already reported.
    pub fn finish_reason(&self) -> Option<FinishReason> {
        self.choices
            .values()
            .next()
            .and_then(|choice| choice.finish_reason)
    }

    pub fn finish(self) -> CompletionResult {
        let choices = self
            .choices
            .into_iter()
            .map(|(index, choice)| ChoiceOutput {
                index,
                content: choice.content,
                finish_reason: choice.finish_reason.unwrap_or_default(),
                tool_calls: choice
                    .tool_calls
                    .into_values()
                    .map(|call| ToolCall {
                        id: call.id,
                        call_type: "function".to_string(),
                        function: FunctionCall {
                            name: call.name,
                            arguments: call.arguments,
                        },
                    })
                    .collect(),
            })
            .collect();
        CompletionResult::from_choices(choices, self.usage)
    }
}

/// Drives a frame stream to completion.
///
/// The handler sees every text delta and, once the stream has ended, a
/// single `done` chunk. Cancellation or a [`ChunkControl::Stop`] from the
/// handler abandons the stream and returns what was accumulated so far.
pub(crate) async fn reassemble(
    mut frames: FrameStream,
    on_chunk: &mut ChunkHandler<'_>,
    cancel: &CancellationToken,
    idle_timeout: Duration,
) -> Result<CompletionResult, LLMError> {
    let mut reassembler = StreamReassembler::new();

    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                log::debug!("stream cancelled, returning partial content");
                return Ok(reassembler.finish().stopped_early());
            }
            next = timeout(idle_timeout, frames.next()) => next,
        };

        let frame = match next {
            Err(_) => {
                return Err(LLMError::Timeout(format!(
                    "no stream data received for {:.1}s",
                    idle_timeout.as_secs_f64()
                )))
            }
            Ok(None) => break,
            Ok(Some(frame)) => frame?,
        };

        if let Some(chunk) = reassembler.apply(frame) {
            if on_chunk(&chunk) == ChunkControl::Stop {
                log::debug!("chunk handler requested stop");
                return Ok(reassembler.finish().stopped_early());
            }
        }
    }

    if !reassembler.has_choices() {
        return Err(LLMError::EmptyChoices);
    }

    let done = StreamChunk {
        delta_content: String::new(),
        index: 0,
        done: true,
        finish_reason: Some(reassembler.finish_reason().unwrap_or_default()),
    };
    let _ = on_chunk(&done);
    Ok(reassembler.finish())
}
