//! Turns raw responses into [`CompletionResult`](crate::CompletionResult)s.
//!
//! Whole responses are a single JSON document. Streamed responses go through
//! three layers: the SSE splitter in `chat::sse` buffers bytes into events,
//! [`frame_stream`] parses events into [`StreamFrame`](crate::StreamFrame)s,
//! and [`StreamReassembler`] folds frames into the final result while
//! feeding the caller's chunk handler.

#[path = "decode/json.rs"]
mod json;

#[path = "decode/frames.rs"]
mod frames;

#[path = "decode/reassembler.rs"]
mod reassembler;

pub(crate) use frames::frame_stream;
pub use frames::FrameStream;
pub(crate) use json::{decode_response, decode_typed};
pub(crate) use reassembler::reassemble;
pub use reassembler::StreamReassembler;
