use std::pin::Pin;

use futures::future;
use futures::stream::{self, Stream, StreamExt};

use crate::chat::sse::{SseEvent, SseEventStream};
use crate::chat::stream::StreamEvent;
use crate::chat::StreamFrame;
use crate::error::{classify, LLMError};

/// Frames of one streamed completion, ending at the `[DONE]` sentinel.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<StreamFrame, LLMError>> + Send>>;

/// Parses events into frames. Events that are not valid JSON are logged and
/// skipped; an `error` event becomes a typed error item.
pub(crate) fn frame_stream(events: SseEventStream) -> FrameStream {
    let frames = events
        .take_while(|event| future::ready(!matches!(event, Ok(SseEvent::Done))))
        .filter_map(|event| {
            future::ready(match event {
                Ok(SseEvent::Data(data)) => parse_event(&data),
                Ok(SseEvent::Done) => None,
                Err(err) => Some(Err(err)),
            })
        })
        .flat_map(|parsed| {
            let items: Vec<Result<StreamFrame, LLMError>> = match parsed {
                Ok(frames) => frames.into_iter().map(Ok).collect(),
                Err(err) => vec![Err(err)],
            };
            stream::iter(items)
        });
    Box::pin(frames)
}

fn parse_event(data: &str) -> Option<Result<Vec<StreamFrame>, LLMError>> {
    let event: StreamEvent = match serde_json::from_str(data) {
        Ok(event) => event,
        Err(err) => {
            log::warn!("skipping malformed stream event: {err}");
            return None;
        }
    };
    if let Some(error) = event.error.as_ref().filter(|error| !error.is_null()) {
        return Some(Err(classify::from_error_value(200, error)));
    }
    Some(Ok(event.into_frames()))
}
