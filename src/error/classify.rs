//! Maps non-success responses onto [`LLMError`] kinds.
//!
//! The server's machine-readable `error.type` is consulted first. Only when it
//! is absent or too generic do we fall back to matching known phrases in the
//! message, which is a best-effort heuristic.

use std::sync::OnceLock;
use std::time::Duration;

use regex::RegexSet;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use serde::Deserialize;
use serde_json::Value;

use super::{ApiFailure, LLMError};

const MAX_BODY_IN_MESSAGE: usize = 512;

#[derive(Debug, Deserialize)]
pub(crate) struct ErrorEnvelope {
    pub(crate) error: ApiErrorBody,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorBody {
    #[serde(default)]
    pub(crate) message: Option<String>,
    #[serde(default, rename = "type")]
    pub(crate) error_type: Option<String>,
    #[serde(default)]
    pub(crate) code: Option<Value>,
}

impl ApiErrorBody {
    fn into_failure(self, status: u16, fallback: &str) -> ApiFailure {
        ApiFailure {
            status,
            error_type: self.error_type,
            code: self.code.map(|code| match code {
                Value::String(s) => s,
                other => other.to_string(),
            }),
            message: self.message.unwrap_or_else(|| truncate(fallback)),
            retry_after: None,
        }
    }
}

/// Builds an [`ApiFailure`] from a raw error body, tolerating non-JSON bodies.
pub(crate) fn parse_failure(status: u16, body: &str, retry_after: Option<Duration>) -> ApiFailure {
    let mut failure = match serde_json::from_str::<ErrorEnvelope>(body) {
        Ok(envelope) => envelope.error.into_failure(status, body),
        Err(_) => ApiFailure::new(status, truncate(body)),
    };
    failure.retry_after = retry_after;
    failure
}

/// Builds the typed error for an `error` object found inside a 2xx body or
/// a stream event. The HTTP status says nothing there, so the kind is
/// derived from `error.type` while the reported status stays as received.
pub(crate) fn from_error_value(status: u16, error: &Value) -> LLMError {
    let failure = match serde_json::from_value::<ApiErrorBody>(error.clone()) {
        Ok(body) => body.into_failure(status, &error.to_string()),
        Err(_) => ApiFailure::new(status, truncate(&error.to_string())),
    };
    let effective = match failure.error_type.as_deref() {
        Some(error_type) if (200..300).contains(&status) => {
            status_for_type(error_type).unwrap_or(status)
        }
        _ => status,
    };
    classify_as(effective, failure)
}

fn status_for_type(error_type: &str) -> Option<u16> {
    match error_type {
        "invalid_request_error" => Some(400),
        "invalid_authentication_error" => Some(401),
        "permission_denied_error" => Some(403),
        "resource_not_found_error" => Some(404),
        "rate_limit_reached_error" => Some(429),
        "engine_overloaded_error" | "server_error" => Some(503),
        _ => None,
    }
}

/// Reads an integer-seconds `Retry-After` header.
pub(crate) fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

pub(crate) fn classify(failure: ApiFailure) -> LLMError {
    classify_as(failure.status, failure)
}

fn classify_as(status: u16, failure: ApiFailure) -> LLMError {
    let type_hint = failure.error_type.as_deref().map(TypeHint::from_type);
    match (status, type_hint) {
        (_, Some(TypeHint::Balance)) => LLMError::InsufficientBalance(failure),
        (429, _) => LLMError::RateLimited(failure),
        (status, _) if status >= 500 => LLMError::ServerError(failure),
        (_, Some(TypeHint::ContentFilter)) => LLMError::ContentFiltered(failure),
        (401, _) => LLMError::Auth(failure),
        (403, _) => {
            if matches_phrase(Phrase::AccountInactive, &failure.message) {
                LLMError::AccountInactive(failure)
            } else {
                LLMError::Permission(failure)
            }
        }
        (404, _) => LLMError::NotFound(failure),
        (400, _) => classify_bad_request(failure),
        _ => LLMError::HttpStatus(failure),
    }
}

fn classify_bad_request(failure: ApiFailure) -> LLMError {
    let message = failure.message.as_str();
    if matches_phrase(Phrase::ContextLength, message) {
        LLMError::ContextLengthExceeded(failure)
    } else if matches_phrase(Phrase::ContentFilter, message) {
        LLMError::ContentFiltered(failure)
    } else if matches_phrase(Phrase::Balance, message) {
        LLMError::InsufficientBalance(failure)
    } else {
        LLMError::InvalidParameter(failure)
    }
}

enum TypeHint {
    Balance,
    ContentFilter,
    Other,
}

impl TypeHint {
    fn from_type(error_type: &str) -> Self {
        match error_type {
            "exceeded_current_quota_error" | "insufficient_quota" => TypeHint::Balance,
            "content_filter" | "content_filter_error" => TypeHint::ContentFilter,
            _ => TypeHint::Other,
        }
    }
}

#[derive(Clone, Copy)]
enum Phrase {
    ContextLength = 0,
    ContentFilter = 1,
    Balance = 2,
    AccountInactive = 3,
}

const PHRASES: [&[&str]; 4] = [
    &[
        r"(?i)context length",
        r"(?i)context_length",
        r"(?i)exceeded model token limit",
        r"(?i)maximum context",
        r"上下文长度",
    ],
    &[
        r"(?i)high risk",
        r"(?i)content filter",
        r"(?i)content_filter",
        r"(?i)inappropriate content",
        r"敏感",
    ],
    &[
        r"(?i)insufficient balance",
        r"(?i)exceeded current quota",
        r"(?i)suspended due to insufficient",
        r"余额不足",
    ],
    &[
        r"(?i)not (been )?activated",
        r"(?i)inactive",
        r"(?i)account .* suspended",
        r"未激活",
        r"已停用",
    ],
];

fn matches_phrase(phrase: Phrase, message: &str) -> bool {
    static SETS: OnceLock<Vec<RegexSet>> = OnceLock::new();
    let sets = SETS.get_or_init(|| {
        PHRASES
            .iter()
            .filter_map(|patterns| RegexSet::new(patterns.iter()).ok())
            .collect()
    });
    sets.get(phrase as usize)
        .is_some_and(|set| set.is_match(message))
}

fn truncate(body: &str) -> String {
    let trimmed = body.trim();
    if trimmed.len() <= MAX_BODY_IN_MESSAGE {
        return trimmed.to_string();
    }
    let mut end = MAX_BODY_IN_MESSAGE;
    while !trimmed.is_char_boundary(end) {
        end -= 1;
    }
    format!("{}...", &trimmed[..end])
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn body(error_type: &str, message: &str) -> String {
        serde_json::json!({
            "error": {"type": error_type, "message": message, "code": 1301}
        })
        .to_string()
    }

    #[rstest]
    #[case(401, "invalid_authentication_error", "Invalid Authentication", "auth_error")]
    #[case(403, "permission_denied_error", "not allowed", "permission_error")]
    #[case(403, "permission_denied_error", "Your account is not activated", "account_inactive")]
    #[case(403, "permission_denied_error", "账户未激活", "account_inactive")]
    #[case(404, "resource_not_found_error", "no such model", "not_found")]
    #[case(400, "invalid_request_error", "temperature must be in [0, 1]", "invalid_parameter")]
    #[case(
        400,
        "invalid_request_error",
        "Invalid request: Your request exceeded model token limit: 8192",
        "context_length_exceeded"
    )]
    #[case(
        400,
        "invalid_request_error",
        "The request was rejected because it was considered high risk",
        "content_filtered"
    )]
    #[case(400, "content_filter", "blocked", "content_filtered")]
    #[case(429, "rate_limit_reached_error", "slow down", "rate_limited")]
    #[case(429, "exceeded_current_quota_error", "quota exhausted", "insufficient_balance")]
    #[case(503, "engine_overloaded_error", "overloaded", "server_error")]
    #[case(409, "conflict", "duplicate", "http_error")]
    fn classifies_status_and_message(
        #[case] status: u16,
        #[case] error_type: &str,
        #[case] message: &str,
        #[case] expected: &str,
    ) {
        let failure = parse_failure(status, &body(error_type, message), None);
        let err = classify(failure);
        assert_eq!(err.kind(), expected);
        assert_eq!(err.status(), Some(status));
        assert_eq!(err.api_failure().map(|f| f.message.as_str()), Some(message));
    }

    #[test]
    fn error_value_in_success_body_uses_type_for_kind() {
        let error = serde_json::json!({"type": "rate_limit_reached_error", "message": "too fast"});
        let err = from_error_value(200, &error);
        assert_eq!(err.kind(), "rate_limited");
        assert_eq!(err.status(), Some(200));

        let error = serde_json::json!({"type": "something_new", "message": "?"});
        assert_eq!(from_error_value(200, &error).kind(), "http_error");
    }

    #[test]
    fn non_json_body_is_kept_as_message() {
        let failure = parse_failure(502, "<html>Bad Gateway</html>", None);
        assert_eq!(failure.message, "<html>Bad Gateway</html>");
        assert_eq!(failure.error_type, None);
    }

    #[test]
    fn numeric_code_is_stringified() {
        let failure = parse_failure(400, &body("invalid_request_error", "x"), None);
        assert_eq!(failure.code.as_deref(), Some("1301"));
    }

    #[test]
    fn long_bodies_are_truncated_on_char_boundary() {
        let long = "é".repeat(MAX_BODY_IN_MESSAGE);
        let failure = parse_failure(500, &long, None);
        assert!(failure.message.ends_with("..."));
        assert!(failure.message.len() <= MAX_BODY_IN_MESSAGE + 3);
    }

    #[test]
    fn retry_after_header_is_parsed_as_seconds() {
        let mut headers = HeaderMap::new();
        headers.insert(RETRY_AFTER, "7".parse().unwrap());
        assert_eq!(retry_after(&headers), Some(Duration::from_secs(7)));
        headers.insert(RETRY_AFTER, "Wed, 21 Oct 2015 07:28:00 GMT".parse().unwrap());
        assert_eq!(retry_after(&headers), None);
    }
}
