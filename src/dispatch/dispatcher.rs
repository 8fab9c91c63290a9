use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;

use crate::error::{classify, LLMError};

use super::policy::RetryPolicy;

/// A successful (2xx) response, together with how it was obtained.
#[derive(Debug)]
pub struct RawResponse {
    pub(crate) response: Response,
    /// HTTP status of the final attempt
    pub status: u16,
    /// Attempts made, the successful one included
    pub attempts: u32,
    /// Backoff delays slept between attempts
    pub retry_delays: Vec<Duration>,
}

impl RawResponse {
    pub fn into_inner(self) -> Response {
        self.response
    }
}

/// Retrying HTTP dispatcher.
#[derive(Debug, Clone)]
pub struct Dispatcher {
    client: Client,
    policy: RetryPolicy,
}

impl Dispatcher {
    pub fn new(client: Client, policy: RetryPolicy) -> Self {
        Self { client, policy }
    }

    pub fn client(&self) -> &Client {
        &self.client
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    /// Sends the request built by `build`, rebuilding it for every attempt.
    ///
    /// Connection failures, timeouts, 429 and 5xx responses are retried up to
    /// `max_retries` attempts in total. Any other non-success status is
    /// returned at once as a classified error. When the attempts run out the
    /// last error is returned inside [`LLMError::RetryExceeded`].
    pub async fn send<F>(&self, mut build: F, cancel: &CancellationToken) -> Result<RawResponse, LLMError>
    where
        F: FnMut(&Client) -> RequestBuilder,
    {
        let max_attempts = self.policy.max_retries.max(1);
        let mut retry_delays = Vec::new();
        let mut attempt = 0u32;

        loop {
            attempt += 1;
            if cancel.is_cancelled() {
                return Err(LLMError::Cancelled);
            }

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(LLMError::Cancelled),
                outcome = Self::attempt(build(&self.client)) => outcome,
            };

            let err = match outcome {
                Ok(response) => {
                    let status = response.status().as_u16();
                    log::debug!("HTTP status: {status} after {attempt} attempt(s)");
                    return Ok(RawResponse {
                        response,
                        status,
                        attempts: attempt,
                        retry_delays,
                    });
                }
                Err(err) => err,
            };

            if !err.is_retryable() {
                return Err(err);
            }
            if attempt >= max_attempts {
                log::warn!("giving up after {attempt} attempt(s): {}", err.kind());
                return Err(LLMError::RetryExceeded {
                    attempts: attempt,
                    last_error: Box::new(err),
                });
            }

            let delay = self.policy.backoff(attempt);
            if let Some(advised) = err.api_failure().and_then(|f| f.retry_after) {
                log::debug!("server advised Retry-After {advised:?}, using computed backoff");
            }
            log::warn!(
                "HTTP retry reason={} attempt={}/{} delay={:.3}s",
                err.kind(),
                attempt,
                max_attempts,
                delay.as_secs_f64()
            );
            retry_delays.push(delay);

            tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(LLMError::Cancelled),
                _ = sleep(delay) => {}
            }
        }
    }

    async fn attempt(request: RequestBuilder) -> Result<Response, LLMError> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let retry_after = classify::retry_after(response.headers());
        let body = response.text().await.unwrap_or_default();
        let failure = classify::parse_failure(status.as_u16(), &body, retry_after);
        Err(classify::classify(failure))
    }
}
