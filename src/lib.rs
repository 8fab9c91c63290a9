//! Chat completion client with retrying dispatch, SSE stream reassembly and
//! automatic continuation of answers cut off by the length limit.
//!
//! # Overview
//!
//! - [`dispatch`]: sends requests, retrying transient failures with
//!   exponential backoff and jitter
//! - [`decode`]: turns whole JSON responses or event streams into a
//!   [`CompletionResult`]
//! - [`continuation`]: keeps asking while the answer is truncated and
//!   stitches the rounds into one answer
//! - [`conversation`]: the turn history sent with every request
//! - [`ChatSession`]: ties a [`ChatClient`] to a [`Conversation`]
//!
//! ```no_run
//! use kimi_chat::{ChatClient, ChatSession};
//!
//! # async fn run() -> Result<(), kimi_chat::LLMError> {
//! let client = ChatClient::builder()
//!     .api_key(std::env::var("MOONSHOT_API_KEY").unwrap_or_default())
//!     .model("moonshot-v1-8k")
//!     .build()?;
//! let mut session = ChatSession::new(client);
//! let answer = session.ask("Hello!").await?;
//! println!("{answer}");
//! # Ok(())
//! # }
//! ```

pub mod builder;
pub mod chat;
pub mod client;
pub mod config;
pub mod continuation;
pub mod conversation;
pub mod decode;
pub mod dispatch;
pub mod error;
pub mod session;

pub use builder::ChatClientBuilder;
pub use chat::{
    ChatMessage, ChatOptions, ChatProvider, ChatRole, ChunkControl, CompletionResult,
    FinishReason, StreamChunk, StreamFrame, Tool, ToolCall, Usage,
};
pub use client::ChatClient;
pub use config::ClientConfig;
pub use continuation::{ContinuationPolicy, ContinuationState};
pub use conversation::Conversation;
pub use dispatch::RetryPolicy;
pub use error::{ApiFailure, LLMError};
pub use session::ChatSession;

/// Initialises `env_logger` from `RUST_LOG`. Safe to call more than once.
#[cfg(feature = "logging")]
pub fn init_logging() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .format_timestamp_millis()
        .try_init();
}
