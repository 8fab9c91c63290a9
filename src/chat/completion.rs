use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use super::tool::ToolCall;
use super::usage::Usage;

/// Why a completion ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", from = "String")]
pub enum FinishReason {
    /// Natural end of the answer
    Stop,
    /// Cut off by the token ceiling
    Length,
    /// The model wants tools to be called
    ToolCalls,
    /// Output was withheld by the content filter
    ContentFilter,
    /// Missing or unrecognised
    #[default]
    Unknown,
}

impl From<&str> for FinishReason {
    fn from(value: &str) -> Self {
        match value {
            "stop" | "end_turn" => FinishReason::Stop,
            "length" | "max_tokens" => FinishReason::Length,
            "tool_calls" | "function_call" => FinishReason::ToolCalls,
            "content_filter" => FinishReason::ContentFilter,
            _ => FinishReason::Unknown,
        }
    }
}

impl From<String> for FinishReason {
    fn from(value: String) -> Self {
        FinishReason::from(value.as_str())
    }
}

impl fmt::Display for FinishReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FinishReason::Stop => "stop",
            FinishReason::Length => "length",
            FinishReason::ToolCalls => "tool_calls",
            FinishReason::ContentFilter => "content_filter",
            FinishReason::Unknown => "unknown",
        };
        f.write_str(name)
    }
}

/// Output of one choice of a completion.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ChoiceOutput {
    pub index: u32,
    pub content: String,
    pub finish_reason: FinishReason,
    pub tool_calls: Vec<ToolCall>,
}

/// Normalised result of one completion, whether decoded from a single JSON
/// document, reassembled from an event stream, or stitched from several
/// continuation rounds.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CompletionResult {
    /// Text of the first choice
    pub content: String,
    /// Finish reason of the first choice
    pub finish_reason: FinishReason,
    pub usage: Option<Usage>,
    /// Tool calls of the first choice
    pub tool_calls: Vec<ToolCall>,
    /// Every choice, ordered by index
    pub choices: Vec<ChoiceOutput>,
    /// Reading stopped before the server finished (cancellation or callback)
    pub stopped_early: bool,
    /// Round trips that produced this result
    pub rounds: u32,
    /// Backoff delays slept before the request finally went through
    pub retry_delays: Vec<Duration>,
}

impl CompletionResult {
    /// Builds a single-round result. `choices` need not be sorted. The
    /// top-level fields mirror choice 0 and stay empty when it is missing.
    pub(crate) fn from_choices(mut choices: Vec<ChoiceOutput>, usage: Option<Usage>) -> Self {
        choices.sort_by_key(|choice| choice.index);
        let first = choices
            .iter()
            .find(|choice| choice.index == 0)
            .cloned()
            .unwrap_or_default();
        Self {
            content: first.content,
            finish_reason: first.finish_reason,
            usage,
            tool_calls: first.tool_calls,
            choices,
            stopped_early: false,
            rounds: 1,
            retry_delays: Vec::new(),
        }
    }

    pub(crate) fn with_retry_delays(mut self, delays: Vec<Duration>) -> Self {
        self.retry_delays = delays;
        self
    }

    pub(crate) fn stopped_early(mut self) -> Self {
        self.stopped_early = true;
        self
    }

    /// True when the first choice was cut off by the length limit.
    pub fn is_truncated(&self) -> bool {
        self.finish_reason == FinishReason::Length
    }
}

impl fmt::Display for CompletionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.content)
    }
}
