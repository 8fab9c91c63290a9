//! Automatic continuation of answers cut off by the length limit.
//!
//! When the first choice finishes with `length`, the text produced so far is
//! stored as a partial assistant turn and the same conversation is resent so
//! the model picks up where it stopped. Rounds repeat until the model stops
//! on its own or the round bound is hit. Only choice 0 is ever continued.

use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::chat::{
    merge_usage, ChatMessage, ChatOptions, ChatProvider, ChoiceOutput, ChunkControl,
    ChunkHandler, CompletionResult, FinishReason, StreamChunk, Usage,
};
use crate::config::ContinuationConfig;
use crate::conversation::Conversation;
use crate::error::LLMError;

/// Whether and how far truncated answers are continued.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ContinuationPolicy {
    pub enabled: bool,
    /// Rounds allowed for one answer, the first one included
    pub max_rounds: u32,
}

impl Default for ContinuationPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            max_rounds: 5,
        }
    }
}

impl ContinuationPolicy {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            max_rounds: 1,
        }
    }

    fn bound(&self) -> u32 {
        if self.enabled {
            self.max_rounds.max(1)
        } else {
            1
        }
    }
}

impl From<&ContinuationConfig> for ContinuationPolicy {
    fn from(cfg: &ContinuationConfig) -> Self {
        Self {
            enabled: cfg.enabled,
            max_rounds: cfg.max_rounds,
        }
    }
}

/// Progress of one logical answer across rounds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ContinuationState {
    /// Text of choice 0 so far, seed included
    pub accumulated: String,
    /// Rounds completed
    pub iterations: u32,
    pub bound: u32,
}

impl ContinuationState {
    pub fn new(seed: &str, bound: u32) -> Self {
        Self {
            accumulated: seed.to_string(),
            iterations: 0,
            bound,
        }
    }

    /// True when another round is allowed after the current one.
    pub fn has_rounds_left(&self) -> bool {
        self.iterations < self.bound
    }
}

enum Mode<'a, 'h> {
    Blocking,
    Streaming {
        on_chunk: &'a mut ChunkHandler<'h>,
        cancel: &'a CancellationToken,
    },
}

/// Completes the conversation, continuing truncated answers, and records the
/// final assistant turn.
///
/// The last turn must be a user turn or a seeded partial. On error the
/// conversation may hold a partial turn; callers roll back with a
/// [`Checkpoint`](crate::conversation::Checkpoint).
pub async fn complete(
    provider: &dyn ChatProvider,
    conversation: &mut Conversation,
    options: &ChatOptions,
    policy: ContinuationPolicy,
) -> Result<CompletionResult, LLMError> {
    run(provider, conversation, options, policy, Mode::Blocking).await
}

/// Streaming counterpart of [`complete`].
///
/// Text deltas of every round reach `on_chunk` as they arrive. A `done`
/// chunk is surfaced once, for the round that ends the answer.
pub async fn complete_streaming(
    provider: &dyn ChatProvider,
    conversation: &mut Conversation,
    options: &ChatOptions,
    policy: ContinuationPolicy,
    on_chunk: &mut ChunkHandler<'_>,
    cancel: &CancellationToken,
) -> Result<CompletionResult, LLMError> {
    run(
        provider,
        conversation,
        options,
        policy,
        Mode::Streaming { on_chunk, cancel },
    )
    .await
}

async fn run(
    provider: &dyn ChatProvider,
    conversation: &mut Conversation,
    options: &ChatOptions,
    policy: ContinuationPolicy,
    mut mode: Mode<'_, '_>,
) -> Result<CompletionResult, LLMError> {
    let seed = conversation
        .partial()
        .map(|turn| turn.text())
        .unwrap_or_default();
    let mut state = ContinuationState::new(&seed, policy.bound());
    let continuation_options = options.for_continuation();

    let mut first_round: Option<CompletionResult> = None;
    let mut usage = None;
    let mut retry_delays = Vec::new();

    let last = loop {
        let round_options = if state.iterations == 0 {
            options
        } else {
            &continuation_options
        };
        state.iterations += 1;
        let more_allowed = state.has_rounds_left();

        let outcome = match &mut mode {
            Mode::Blocking => provider.complete(conversation.turns(), round_options).await,
            Mode::Streaming { on_chunk, cancel } => {
                let mut forward = |chunk: &StreamChunk| {
                    if more_allowed && chunk.done && chunk.finish_reason == Some(FinishReason::Length) {
                        return ChunkControl::Continue;
                    }
                    (**on_chunk)(chunk)
                };
                provider
                    .complete_streaming(conversation.turns(), round_options, &mut forward, *cancel)
                    .await
            }
        };
        let round = match outcome {
            Ok(round) => round,
            // Text of earlier rounds was already delivered; keep it.
            Err(LLMError::Cancelled) if first_round.is_some() => {
                state.iterations -= 1;
                log::debug!(
                    "cancelled before round {}, keeping accumulated text",
                    state.iterations + 1
                );
                break cancelled_round();
            }
            Err(err) => return Err(err),
        };

        state.accumulated.push_str(&round.content);
        usage = merge_usage(usage, round.usage);
        retry_delays.extend(round.retry_delays.iter().copied());

        let truncated = round.is_truncated() && !round.stopped_early;
        if first_round.is_none() {
            first_round = Some(round.clone());
        }
        if !truncated {
            break round;
        }
        if !more_allowed {
            if policy.enabled {
                log::warn!(
                    "answer still truncated after {} round(s), returning accumulated text",
                    state.iterations
                );
            }
            break round;
        }

        log::debug!(
            "continuing truncated answer, round {}/{}",
            state.iterations + 1,
            state.bound
        );
        conversation.mark_partial(&state.accumulated);
    };

    let first = first_round.unwrap_or_else(|| last.clone());
    let result = stitch(first, last, state.accumulated, usage, state.iterations, retry_delays);
    record_answer(conversation, &result)?;
    Ok(result)
}

/// Stand-in for a round that never produced anything. The answer stays
/// truncated and is flagged as stopped early.
fn cancelled_round() -> CompletionResult {
    CompletionResult::from_choices(
        vec![ChoiceOutput {
            index: 0,
            finish_reason: FinishReason::Length,
            ..ChoiceOutput::default()
        }],
        None,
    )
    .stopped_early()
}

/// Combines the rounds of one answer. Choices other than 0 come from the
/// first round, which is the only one that asked for several.
fn stitch(
    first: CompletionResult,
    last: CompletionResult,
    content: String,
    usage: Option<Usage>,
    rounds: u32,
    retry_delays: Vec<Duration>,
) -> CompletionResult {
    let mut choices = first.choices;
    match choices.first_mut() {
        Some(choice) if choice.index == 0 => {
            choice.content = content.clone();
            choice.finish_reason = last.finish_reason;
            choice.tool_calls = last.tool_calls.clone();
        }
        _ => choices.insert(
            0,
            ChoiceOutput {
                index: 0,
                content: content.clone(),
                finish_reason: last.finish_reason,
                tool_calls: last.tool_calls.clone(),
            },
        ),
    }

    CompletionResult {
        content,
        finish_reason: last.finish_reason,
        usage,
        tool_calls: last.tool_calls,
        choices,
        stopped_early: last.stopped_early,
        rounds,
        retry_delays,
    }
}

fn record_answer(conversation: &mut Conversation, result: &CompletionResult) -> Result<(), LLMError> {
    if conversation.partial().is_some() {
        conversation.resolve_partial(&result.content)?;
        return Ok(());
    }
    conversation.append_assistant_message(
        ChatMessage::assistant()
            .content(result.content.as_str())
            .tool_calls(result.tool_calls.clone())
            .build(),
    )
}

#[cfg(test)]
#[path = "continuation/tests.rs"]
mod tests;
