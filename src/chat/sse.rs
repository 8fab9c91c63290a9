use std::collections::VecDeque;
use std::pin::Pin;

use bytes::Bytes;
use futures::stream::{self, Stream, StreamExt};

use crate::error::LLMError;

const DATA_FIELD: &str = "data:";
const DONE_SENTINEL: &str = "[DONE]";
const IGNORED_FIELDS: [&str; 3] = ["event:", "id:", "retry:"];

/// A complete server-sent event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum SseEvent {
    /// JSON payload of one event, continuation lines joined with `\n`
    Data(String),
    /// The literal `[DONE]` sentinel
    Done,
}

pub(crate) type SseEventStream = Pin<Box<dyn Stream<Item = Result<SseEvent, LLMError>> + Send>>;

/// Splits a byte stream into events. Bytes may be cut anywhere, including
/// inside a multi-byte character. Pending data is flushed at end of input.
pub(crate) fn sse_events<S>(bytes: S) -> SseEventStream
where
    S: Stream<Item = Result<Bytes, reqwest::Error>> + Send + 'static,
{
    let init = (Box::pin(bytes), SseState::default(), VecDeque::new(), false);
    let events = stream::unfold(init, |(mut inner, mut state, mut ready, mut eof)| async move {
        loop {
            if let Some(item) = ready.pop_front() {
                return Some((item, (inner, state, ready, eof)));
            }
            if eof {
                return None;
            }
            match inner.next().await {
                Some(Ok(chunk)) => {
                    state.push_bytes(&chunk);
                    ready.extend(state.drain_events().into_iter().map(Ok));
                }
                Some(Err(err)) => {
                    ready.push_back(Err(LLMError::from(err)));
                    eof = true;
                }
                None => {
                    ready.extend(state.finish().into_iter().map(Ok));
                    eof = true;
                }
            }
        }
    });
    Box::pin(events)
}

/// Convenience for reading a whole `reqwest` body as events.
pub(crate) fn response_events(response: reqwest::Response) -> SseEventStream {
    sse_events(response.bytes_stream())
}

#[derive(Default)]
struct SseState {
    buffer: String,
    utf8_buffer: Vec<u8>,
    pending: Option<String>,
}

impl SseState {
    fn push_bytes(&mut self, bytes: &[u8]) {
        self.utf8_buffer.extend_from_slice(bytes);
        match std::str::from_utf8(&self.utf8_buffer) {
            Ok(text) => {
                self.buffer.push_str(text);
                self.utf8_buffer.clear();
            }
            Err(err) => self.consume_valid_prefix(err.valid_up_to()),
        }
    }

    fn consume_valid_prefix(&mut self, valid_up_to: usize) {
        if valid_up_to == 0 {
            return;
        }

        let valid = String::from_utf8_lossy(&self.utf8_buffer[..valid_up_to]);
        self.buffer.push_str(&valid);
        self.utf8_buffer.drain(..valid_up_to);
    }

    fn drain_events(&mut self) -> Vec<SseEvent> {
        let mut events = Vec::new();
        while let Some(line) = self.next_line() {
            if let Some(event) = self.consume_line(&line) {
                events.push(event);
            }
        }
        events
    }

    fn finish(&mut self) -> Vec<SseEvent> {
        if !self.utf8_buffer.is_empty() {
            let rest = String::from_utf8_lossy(&self.utf8_buffer).into_owned();
            self.buffer.push_str(&rest);
            self.utf8_buffer.clear();
        }
        let mut events = self.drain_events();
        let tail = std::mem::take(&mut self.buffer);
        let tail = tail.trim_end_matches('\r');
        if !tail.is_empty() {
            if let Some(event) = self.consume_line(tail) {
                events.push(event);
            }
        }
        events.extend(self.dispatch());
        events
    }

    fn next_line(&mut self) -> Option<String> {
        let pos = self.buffer.find('\n')?;
        let line = self.buffer[..pos].trim_end_matches('\r').to_string();
        self.buffer.drain(..=pos);
        Some(line)
    }

    fn consume_line(&mut self, line: &str) -> Option<SseEvent> {
        if line.is_empty() {
            return self.dispatch();
        }
        if line.starts_with(':') {
            return None;
        }
        if let Some(data) = line.strip_prefix(DATA_FIELD) {
            let data = data.strip_prefix(' ').unwrap_or(data);
            self.append(data);
            return None;
        }
        if IGNORED_FIELDS.iter().any(|field| line.starts_with(field)) {
            return None;
        }
        match self.pending {
            Some(_) => self.append(line),
            None => log::debug!("ignoring stray stream line outside an event"),
        }
        None
    }

    fn append(&mut self, data: &str) {
        match &mut self.pending {
            Some(pending) => {
                pending.push('\n');
                pending.push_str(data);
            }
            None => self.pending = Some(data.to_string()),
        }
    }

    fn dispatch(&mut self) -> Option<SseEvent> {
        let data = self.pending.take()?;
        if data.trim() == DONE_SENTINEL {
            Some(SseEvent::Done)
        } else {
            Some(SseEvent::Data(data))
        }
    }
}

#[cfg(test)]
#[path = "sse_tests.rs"]
mod tests;
