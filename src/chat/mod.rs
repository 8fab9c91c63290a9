mod completion;
mod message;
mod request;
pub(crate) mod sse;
pub(crate) mod stream;
mod tool;
mod traits;
mod usage;

pub use completion::{ChoiceOutput, CompletionResult, FinishReason};
pub use message::{
    ChatMessage, ChatMessageBuilder, ChatRole, ContentPart, ImageUrl, MessageContent, PartialKind,
};
pub use request::{ChatOptions, ResponseFormat};
pub(crate) use request::{WireMessage, WireRequest};
pub use stream::{ChunkControl, FunctionDelta, StreamChunk, StreamFrame, ToolCallDelta};
pub use tool::{FunctionCall, FunctionTool, Tool, ToolCall, ToolChoice};
pub use traits::{ChatProvider, ChunkHandler};
pub(crate) use usage::merge_usage;
pub use usage::Usage;
