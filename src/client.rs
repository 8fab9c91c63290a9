//! HTTP client for the chat completions API and its companion endpoints.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::header::CONTENT_TYPE;
use reqwest::{Method, RequestBuilder, Url};
use secrecy::{ExposeSecret, SecretString};
use serde::Serialize;
use tokio_util::sync::CancellationToken;

use crate::chat::sse::response_events;
use crate::chat::{
    ChatMessage, ChatOptions, ChatProvider, ChunkHandler, CompletionResult, WireRequest,
};
use crate::continuation::ContinuationPolicy;
use crate::decode::{decode_response, frame_stream, reassemble, FrameStream};
use crate::dispatch::{Dispatcher, RawResponse};
use crate::error::LLMError;

#[path = "client/files.rs"]
mod files;

#[path = "client/cache.rs"]
mod cache;

#[path = "client/account.rs"]
mod account;

pub use account::{Balance, ModelInfo};
pub use cache::{CacheObject, CacheRequest, CacheTag};
pub use files::{FileContent, FileObject, FilePurpose};

const CHAT_COMPLETIONS: &str = "chat/completions";

/// Client for the completion endpoint.
///
/// Cloning is cheap: the HTTP connection pool and the key are shared.
#[derive(Debug, Clone)]
pub struct ChatClient {
    pub(crate) dispatcher: Dispatcher,
    pub(crate) base_url: Url,
    pub(crate) api_key: Arc<SecretString>,
    /// Model and sampling defaults applied under per-call options
    pub(crate) defaults: ChatOptions,
    pub(crate) request_timeout: Option<Duration>,
    pub(crate) stream_idle_timeout: Duration,
    pub(crate) continuation: ContinuationPolicy,
    pub(crate) system: Option<String>,
}

impl ChatClient {
    pub fn builder() -> crate::builder::ChatClientBuilder {
        crate::builder::ChatClientBuilder::new()
    }

    pub fn model(&self) -> &str {
        self.defaults.model.as_deref().unwrap_or_default()
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn defaults(&self) -> &ChatOptions {
        &self.defaults
    }

    pub fn continuation_policy(&self) -> ContinuationPolicy {
        self.continuation
    }

    pub fn system(&self) -> Option<&str> {
        self.system.as_deref()
    }

    pub fn dispatcher(&self) -> &Dispatcher {
        &self.dispatcher
    }

    /// Opens a completion stream and returns its frames without reassembling
    /// them. Frames of every choice are yielded in arrival order.
    pub async fn stream_frames(
        &self,
        messages: &[ChatMessage],
        options: &ChatOptions,
        cancel: &CancellationToken,
    ) -> Result<FrameStream, LLMError> {
        let raw = self.send_completion(messages, options, true, cancel).await?;
        Ok(frame_stream(response_events(raw.into_inner())))
    }

    async fn send_completion(
        &self,
        messages: &[ChatMessage],
        options: &ChatOptions,
        stream: bool,
        cancel: &CancellationToken,
    ) -> Result<RawResponse, LLMError> {
        if messages.is_empty() {
            return Err(LLMError::InvalidRequest(
                "at least one message is required".to_string(),
            ));
        }
        let effective = options.merged_over(&self.defaults);
        let model = effective.model.as_deref().unwrap_or_default();
        let body = WireRequest::new(model, messages, &effective, stream);
        self.log_request_payload("chat completion payload", &body);

        let url = self.endpoint(CHAT_COMPLETIONS)?;
        let payload = Bytes::from(serde_json::to_vec(&body)?);
        // Streams are bounded by the idle timeout instead of a whole-request one.
        let timeout = if stream { None } else { self.request_timeout };
        self.dispatcher
            .send(
                |client| {
                    let request = client
                        .post(url.clone())
                        .header(CONTENT_TYPE, "application/json")
                        .body(payload.clone());
                    self.authorize(request, timeout)
                },
                cancel,
            )
            .await
    }

    /// Sends a bodiless request to a companion endpoint.
    pub(crate) async fn send_simple(&self, method: Method, path: &str) -> Result<RawResponse, LLMError> {
        let url = self.endpoint(path)?;
        log::debug!("{method} {path}");
        self.dispatcher
            .send(
                |client| self.authorize(client.request(method.clone(), url.clone()), self.request_timeout),
                &CancellationToken::new(),
            )
            .await
    }

    pub(crate) async fn send_json<T: Serialize>(&self, path: &str, body: &T) -> Result<RawResponse, LLMError> {
        let url = self.endpoint(path)?;
        self.log_request_payload(path, body);
        let payload = Bytes::from(serde_json::to_vec(body)?);
        self.dispatcher
            .send(
                |client| {
                    let request = client
                        .post(url.clone())
                        .header(CONTENT_TYPE, "application/json")
                        .body(payload.clone());
                    self.authorize(request, self.request_timeout)
                },
                &CancellationToken::new(),
            )
            .await
    }

    pub(crate) fn endpoint(&self, path: &str) -> Result<Url, LLMError> {
        self.base_url
            .join(path)
            .map_err(|e| LLMError::InvalidRequest(format!("bad endpoint path {path}: {e}")))
    }

    pub(crate) fn authorize(&self, request: RequestBuilder, timeout: Option<Duration>) -> RequestBuilder {
        let request = request.bearer_auth(self.api_key.expose_secret());
        match timeout {
            Some(timeout) => request.timeout(timeout),
            None => request,
        }
    }

    fn log_request_payload<T: Serialize>(&self, label: &str, body: &T) {
        if !log::log_enabled!(log::Level::Trace) {
            return;
        }
        if let Ok(json) = serde_json::to_string(body) {
            log::trace!("{label}: {json}");
        }
    }
}

#[async_trait]
impl ChatProvider for ChatClient {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> Result<CompletionResult, LLMError> {
        let raw = self
            .send_completion(messages, options, false, &CancellationToken::new())
            .await?;
        decode_response(raw).await
    }

    async fn complete_streaming(
        &self,
        messages: &[ChatMessage],
        options: &ChatOptions,
        on_chunk: &mut ChunkHandler<'_>,
        cancel: &CancellationToken,
    ) -> Result<CompletionResult, LLMError> {
        let raw = self.send_completion(messages, options, true, cancel).await?;
        let delays = raw.retry_delays.clone();
        let frames = frame_stream(response_events(raw.into_inner()));
        let result = reassemble(frames, on_chunk, cancel, self.stream_idle_timeout).await?;
        Ok(result.with_retry_delays(delays))
    }
}
