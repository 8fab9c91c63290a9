use serde::Deserialize;
use serde_json::Value;

use super::completion::FinishReason;
use super::usage::Usage;

/// One decoded `data:` event of a completion stream.
#[derive(Debug, Clone, Deserialize)]
pub(crate) struct StreamEvent {
    #[serde(default)]
    pub(crate) choices: Vec<StreamEventChoice>,
    #[serde(default)]
    pub(crate) usage: Option<Usage>,
    #[serde(default)]
    pub(crate) error: Option<Value>,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct StreamEventChoice {
    #[serde(default)]
    pub(crate) index: u32,
    #[serde(default)]
    pub(crate) delta: StreamDelta,
    #[serde(default)]
    pub(crate) finish_reason: Option<FinishReason>,
    #[serde(default)]
    pub(crate) usage: Option<Usage>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub(crate) struct StreamDelta {
    #[serde(default)]
    pub(crate) content: Option<String>,
    #[serde(default)]
    pub(crate) tool_calls: Option<Vec<ToolCallDelta>>,
}

/// Fragment of a tool call carried by a stream delta.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ToolCallDelta {
    /// Position of the call within the choice
    #[serde(default)]
    pub index: u32,
    /// Present on the first fragment only
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub function: Option<FunctionDelta>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct FunctionDelta {
    #[serde(default)]
    pub name: Option<String>,
    /// A slice of the JSON argument text
    #[serde(default)]
    pub arguments: Option<String>,
}

/// Per-choice content of one stream event.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamFrame {
    /// Choice the frame belongs to
    pub index: u32,
    pub delta_content: String,
    pub finish_reason: Option<FinishReason>,
    pub usage: Option<Usage>,
    pub tool_calls: Vec<ToolCallDelta>,
}

impl StreamEvent {
    /// Splits the event into one frame per choice. Usage reported at the
    /// top level is attached to the first frame, or to an empty frame when
    /// the event carries no choices.
    pub(crate) fn into_frames(self) -> Vec<StreamFrame> {
        let mut frames: Vec<StreamFrame> = self
            .choices
            .into_iter()
            .map(|choice| StreamFrame {
                index: choice.index,
                delta_content: choice.delta.content.unwrap_or_default(),
                finish_reason: choice.finish_reason,
                usage: choice.usage,
                tool_calls: choice.delta.tool_calls.unwrap_or_default(),
            })
            .collect();

        if let Some(usage) = self.usage {
            match frames.first_mut() {
                Some(frame) => frame.usage = Some(usage),
                None => frames.push(StreamFrame {
                    usage: Some(usage),
                    ..StreamFrame::default()
                }),
            }
        }
        frames
    }
}

/// Incremental update handed to the caller's chunk handler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StreamChunk {
    /// Newly generated text, empty on the final chunk
    pub delta_content: String,
    /// Choice the text belongs to
    pub index: u32,
    /// Set once, after the terminating sentinel
    pub done: bool,
    /// Finish reason of the first choice, known only on the final chunk
    pub finish_reason: Option<FinishReason>,
}

/// Returned by a chunk handler to keep reading or abandon the stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChunkControl {
    Continue,
    Stop,
}

impl From<bool> for ChunkControl {
    fn from(keep_going: bool) -> Self {
        if keep_going {
            ChunkControl::Continue
        } else {
            ChunkControl::Stop
        }
    }
}

impl From<()> for ChunkControl {
    fn from(_: ()) -> Self {
        ChunkControl::Continue
    }
}
