use std::fmt;
use std::time::Duration;

use thiserror::Error;

use crate::config::ConfigError;

#[path = "error/classify.rs"]
pub(crate) mod classify;

/// Details of a non-success HTTP response returned by the API.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiFailure {
    /// HTTP status code of the response
    pub status: u16,
    /// `error.type` reported by the server, if any
    pub error_type: Option<String>,
    /// `error.code` reported by the server, if any
    pub code: Option<String>,
    /// Human readable message, or the raw body when it was not JSON
    pub message: String,
    /// Advisory `Retry-After` value. Never used for backoff timing.
    pub retry_after: Option<Duration>,
}

impl ApiFailure {
    pub fn new(status: u16, message: impl Into<String>) -> Self {
        Self {
            status,
            error_type: None,
            code: None,
            message: message.into(),
            retry_after: None,
        }
    }
}

impl fmt::Display for ApiFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HTTP {}", self.status)?;
        if let Some(error_type) = &self.error_type {
            write!(f, " ({error_type})")?;
        }
        write!(f, ": {}", self.message)
    }
}

/// Error types that can occur when talking to the completion API.
#[derive(Debug, Error)]
pub enum LLMError {
    /// Connection level failure before a response was received
    #[error("Network error: {0}")]
    Network(String),
    /// The request or a stream read exceeded its time budget
    #[error("Timeout: {0}")]
    Timeout(String),
    /// HTTP 429
    #[error("Rate limited: {0}")]
    RateLimited(ApiFailure),
    /// HTTP 5xx
    #[error("Server error: {0}")]
    ServerError(ApiFailure),
    /// HTTP 401
    #[error("Auth error: {0}")]
    Auth(ApiFailure),
    /// HTTP 403
    #[error("Permission denied: {0}")]
    Permission(ApiFailure),
    /// HTTP 403 caused by an account that has not been activated or was suspended
    #[error("Account inactive: {0}")]
    AccountInactive(ApiFailure),
    /// HTTP 404
    #[error("Not found: {0}")]
    NotFound(ApiFailure),
    /// HTTP 400 with no more specific classification
    #[error("Invalid parameter: {0}")]
    InvalidParameter(ApiFailure),
    /// The prompt or the output was rejected by the content filter
    #[error("Content filtered: {0}")]
    ContentFiltered(ApiFailure),
    /// Prompt plus requested output exceed the model context window
    #[error("Context length exceeded: {0}")]
    ContextLengthExceeded(ApiFailure),
    /// The account has no remaining quota
    #[error("Insufficient balance: {0}")]
    InsufficientBalance(ApiFailure),
    /// Any other non-success status
    #[error("HTTP error: {0}")]
    HttpStatus(ApiFailure),
    /// API response parsing or format error
    #[error("Malformed response: {message}. Raw response: {raw_response}")]
    MalformedResponse {
        message: String,
        raw_response: String,
    },
    /// The response parsed but carried no choices
    #[error("Response contained no choices")]
    EmptyChoices,
    /// JSON serialization/deserialization errors
    #[error("JSON parse error: {0}")]
    Json(String),
    /// Caller misuse detected before anything was sent
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    /// Configuration could not be loaded or validated
    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
    /// The caller cancelled the request
    #[error("Request cancelled")]
    Cancelled,
    /// Retry attempts exceeded
    #[error("Retry attempts exceeded after {attempts} tries: {last_error}")]
    RetryExceeded {
        attempts: u32,
        last_error: Box<LLMError>,
    },
}

impl LLMError {
    /// Stable snake_case name of the error kind.
    pub fn kind(&self) -> &'static str {
        match self {
            LLMError::Network(_) => "network_error",
            LLMError::Timeout(_) => "timeout",
            LLMError::RateLimited(_) => "rate_limited",
            LLMError::ServerError(_) => "server_error",
            LLMError::Auth(_) => "auth_error",
            LLMError::Permission(_) => "permission_error",
            LLMError::AccountInactive(_) => "account_inactive",
            LLMError::NotFound(_) => "not_found",
            LLMError::InvalidParameter(_) => "invalid_parameter",
            LLMError::ContentFiltered(_) => "content_filtered",
            LLMError::ContextLengthExceeded(_) => "context_length_exceeded",
            LLMError::InsufficientBalance(_) => "insufficient_balance",
            LLMError::HttpStatus(_) => "http_error",
            LLMError::MalformedResponse { .. } => "malformed_response",
            LLMError::EmptyChoices => "empty_choices",
            LLMError::Json(_) => "json_error",
            LLMError::InvalidRequest(_) => "invalid_request",
            LLMError::Config(_) => "config_error",
            LLMError::Cancelled => "cancelled",
            LLMError::RetryExceeded { .. } => "retry_exceeded",
        }
    }

    /// The API failure carried by HTTP status errors.
    pub fn api_failure(&self) -> Option<&ApiFailure> {
        match self {
            LLMError::RateLimited(f)
            | LLMError::ServerError(f)
            | LLMError::Auth(f)
            | LLMError::Permission(f)
            | LLMError::AccountInactive(f)
            | LLMError::NotFound(f)
            | LLMError::InvalidParameter(f)
            | LLMError::ContentFiltered(f)
            | LLMError::ContextLengthExceeded(f)
            | LLMError::InsufficientBalance(f)
            | LLMError::HttpStatus(f) => Some(f),
            LLMError::RetryExceeded { last_error, .. } => last_error.api_failure(),
            _ => None,
        }
    }

    /// HTTP status of the failed response, when there was one.
    pub fn status(&self) -> Option<u16> {
        self.api_failure().map(|f| f.status)
    }

    /// Whether the dispatcher may try the request again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            LLMError::Network(_)
                | LLMError::Timeout(_)
                | LLMError::RateLimited(_)
                | LLMError::ServerError(_)
        )
    }
}

/// Converts reqwest transport errors, keeping timeouts distinct.
impl From<reqwest::Error> for LLMError {
    fn from(err: reqwest::Error) -> Self {
        let timeout = err.is_timeout();
        let decode = err.is_decode();
        // reqwest renders the URL but never headers, so the bearer token stays out.
        let message = err.without_url().to_string();
        if timeout {
            LLMError::Timeout(message)
        } else if decode {
            LLMError::MalformedResponse {
                message,
                raw_response: String::new(),
            }
        } else {
            LLMError::Network(message)
        }
    }
}

impl From<serde_json::Error> for LLMError {
    fn from(err: serde_json::Error) -> Self {
        LLMError::Json(format!(
            "{} at line {} column {}",
            err,
            err.line(),
            err.column()
        ))
    }
}
