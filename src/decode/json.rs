use serde::de::DeserializeOwned;
use serde::Deserialize;
use serde_json::Value;

use crate::chat::{ChoiceOutput, CompletionResult, FinishReason, ToolCall, Usage};
use crate::dispatch::RawResponse;
use crate::error::{classify, LLMError};

#[derive(Deserialize, Debug)]
struct ChatCompletionResponse {
    #[serde(default)]
    choices: Vec<ResponseChoice>,
    #[serde(default)]
    usage: Option<Usage>,
}

#[derive(Deserialize, Debug)]
struct ResponseChoice {
    #[serde(default)]
    index: u32,
    #[serde(default)]
    message: Option<ResponseMessage>,
    #[serde(default)]
    finish_reason: Option<FinishReason>,
}

#[derive(Deserialize, Debug)]
struct ResponseMessage {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    tool_calls: Option<Vec<ToolCall>>,
}

/// Reads the whole body of a non-streaming response and decodes it.
pub(crate) async fn decode_response(raw: RawResponse) -> Result<CompletionResult, LLMError> {
    let status = raw.status;
    let delays = raw.retry_delays;
    let body = raw.response.text().await?;
    if log::log_enabled!(log::Level::Trace) {
        log::trace!("completion response body: {body}");
    }
    decode_json(status, &body).map(|result| result.with_retry_delays(delays))
}

/// Decodes a single JSON completion document.
///
/// An `error` object is mapped to its typed API error instead of being
/// reported as a parse failure.
pub(crate) fn decode_json(status: u16, body: &str) -> Result<CompletionResult, LLMError> {
    let value: Value = serde_json::from_str(body).map_err(|err| malformed(&err, body))?;

    if let Some(error) = value.get("error").filter(|error| !error.is_null()) {
        return Err(classify::from_error_value(status, error));
    }

    let parsed: ChatCompletionResponse =
        serde_json::from_value(value).map_err(|err| malformed(&err, body))?;
    if parsed.choices.is_empty() {
        return Err(LLMError::EmptyChoices);
    }

    let mut choices = Vec::with_capacity(parsed.choices.len());
    for choice in parsed.choices {
        let Some(message) = choice.message else {
            return Err(LLMError::MalformedResponse {
                message: format!("choice {} has no message", choice.index),
                raw_response: body.to_string(),
            });
        };
        choices.push(ChoiceOutput {
            index: choice.index,
            content: message.content.unwrap_or_default(),
            finish_reason: choice.finish_reason.unwrap_or_default(),
            tool_calls: message.tool_calls.unwrap_or_default(),
        });
    }

    Ok(CompletionResult::from_choices(choices, parsed.usage))
}

/// Reads a whole body into `T`, mapping an embedded `error` object to its
/// typed API error.
pub(crate) async fn decode_typed<T: DeserializeOwned>(raw: RawResponse) -> Result<T, LLMError> {
    let status = raw.status;
    let body = raw.response.text().await?;
    parse_typed(status, &body)
}

pub(crate) fn parse_typed<T: DeserializeOwned>(status: u16, body: &str) -> Result<T, LLMError> {
    let value: Value = serde_json::from_str(body).map_err(|err| malformed(&err, body))?;
    if let Some(error) = value.get("error").filter(|error| error.is_object()) {
        return Err(classify::from_error_value(status, error));
    }
    serde_json::from_value(value).map_err(|err| malformed(&err, body))
}

fn malformed(err: &serde_json::Error, body: &str) -> LLMError {
    LLMError::MalformedResponse {
        message: err.to_string(),
        raw_response: body.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_content_and_finish_reason() {
        let result = decode_json(
            200,
            r#"{"choices":[{"message":{"content":"hello"},"finish_reason":"stop"}]}"#,
        )
        .unwrap();
        assert_eq!(result.content, "hello");
        assert_eq!(result.finish_reason, FinishReason::Stop);
        assert_eq!(result.usage, None);
        assert_eq!(result.rounds, 1);
    }

    #[test]
    fn decodes_usage_tool_calls_and_all_choices() {
        let body = r#"{
            "choices": [
                {"index": 1, "message": {"content": "second"}, "finish_reason": "length"},
                {"index": 0, "message": {"content": null, "tool_calls": [
                    {"id": "call_1", "type": "function", "function": {"name": "search", "arguments": "{}"}}
                ]}, "finish_reason": "tool_calls"}
            ],
            "usage": {"prompt_tokens": 9, "completion_tokens": 4, "total_tokens": 13}
        }"#;
        let result = decode_json(200, body).unwrap();
        assert_eq!(result.finish_reason, FinishReason::ToolCalls);
        assert_eq!(result.content, "");
        assert_eq!(result.tool_calls[0].function.name, "search");
        assert_eq!(result.choices.len(), 2);
        assert_eq!(result.choices[1].content, "second");
        assert_eq!(result.usage.map(|u| u.total_tokens), Some(13));
    }

    #[test]
    fn error_object_maps_to_typed_error() {
        let err = decode_json(
            200,
            r#"{"error":{"message":"Your request exceeded model token limit","type":"invalid_request_error","code":null}}"#,
        )
        .unwrap_err();
        assert_eq!(err.kind(), "context_length_exceeded");
    }

    #[test]
    fn empty_choices_is_an_error() {
        let err = decode_json(200, r#"{"choices":[]}"#).unwrap_err();
        assert!(matches!(err, LLMError::EmptyChoices));
    }

    #[test]
    fn non_json_is_malformed() {
        let err = decode_json(200, "<html>").unwrap_err();
        let LLMError::MalformedResponse { raw_response, .. } = err else {
            panic!("expected MalformedResponse");
        };
        assert_eq!(raw_response, "<html>");
    }

    #[test]
    fn missing_message_is_malformed() {
        let err = decode_json(200, r#"{"choices":[{"finish_reason":"stop"}]}"#).unwrap_err();
        assert_eq!(err.kind(), "malformed_response");
    }

    #[test]
    fn typed_bodies_surface_embedded_errors() {
        #[derive(Deserialize, Debug)]
        struct Balance {
            available_balance: f64,
        }

        let ok: Balance = parse_typed(200, r#"{"available_balance": 12.5}"#).unwrap();
        assert_eq!(ok.available_balance, 12.5);

        let err = parse_typed::<Balance>(
            200,
            r#"{"error":{"type":"invalid_authentication_error","message":"bad key"}}"#,
        )
        .unwrap_err();
        assert_eq!(err.kind(), "auth_error");

        let err = parse_typed::<Balance>(200, r#"{"unexpected": true}"#).unwrap_err();
        assert_eq!(err.kind(), "malformed_response");
    }
}
