use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use super::*;
use crate::chat::{ChatRole, ChoiceOutput};
use crate::error::ApiFailure;

type Reply = Result<CompletionResult, LLMError>;

/// Replays canned rounds and records what each request carried.
#[derive(Clone, Default)]
struct ScriptedProvider {
    replies: Arc<Mutex<VecDeque<Reply>>>,
    requests: Arc<Mutex<Vec<(Vec<ChatMessage>, ChatOptions)>>>,
}

impl ScriptedProvider {
    fn new(replies: Vec<Reply>) -> Self {
        Self {
            replies: Arc::new(Mutex::new(replies.into())),
            requests: Arc::default(),
        }
    }

    fn next(&self, messages: &[ChatMessage], options: &ChatOptions) -> Reply {
        self.requests
            .lock()
            .expect("requests lock")
            .push((messages.to_vec(), options.clone()));
        self.replies
            .lock()
            .expect("replies lock")
            .pop_front()
            .expect("script exhausted")
    }

    fn requests(&self) -> Vec<(Vec<ChatMessage>, ChatOptions)> {
        self.requests.lock().expect("requests lock").clone()
    }
}

#[async_trait]
impl ChatProvider for ScriptedProvider {
    async fn complete(
        &self,
        messages: &[ChatMessage],
        options: &ChatOptions,
    ) -> Result<CompletionResult, LLMError> {
        self.next(messages, options)
    }

    async fn complete_streaming(
        &self,
        messages: &[ChatMessage],
        options: &ChatOptions,
        on_chunk: &mut ChunkHandler<'_>,
        _cancel: &CancellationToken,
    ) -> Result<CompletionResult, LLMError> {
        let result = self.next(messages, options)?;
        for piece in result.content.chars() {
            let _ = on_chunk(&StreamChunk {
                delta_content: piece.to_string(),
                index: 0,
                done: false,
                finish_reason: None,
            });
        }
        let _ = on_chunk(&StreamChunk {
            delta_content: String::new(),
            index: 0,
            done: true,
            finish_reason: Some(result.finish_reason),
        });
        Ok(result)
    }
}

fn round(content: &str, finish_reason: FinishReason, tokens: u32) -> Reply {
    let mut result = CompletionResult::from_choices(
        vec![ChoiceOutput {
            index: 0,
            content: content.to_string(),
            finish_reason,
            tool_calls: Vec::new(),
        }],
        Some(Usage {
            prompt_tokens: 1,
            completion_tokens: tokens,
            total_tokens: tokens + 1,
            cached_tokens: None,
        }),
    );
    result.retry_delays = vec![Duration::from_millis(tokens.into())];
    Ok(result)
}

fn asked(question: &str) -> Conversation {
    let mut conversation = Conversation::with_system("sys");
    conversation.append_user(question).unwrap();
    conversation
}

#[tokio::test]
async fn single_round_records_one_assistant_turn() {
    let provider = ScriptedProvider::new(vec![round("hello", FinishReason::Stop, 2)]);
    let mut conversation = asked("hi");

    let result = complete(&provider, &mut conversation, &ChatOptions::new(), ContinuationPolicy::default())
        .await
        .unwrap();

    assert_eq!(result.content, "hello");
    assert_eq!(result.rounds, 1);
    assert_eq!(conversation.len(), 3);
    let last = &conversation.turns()[2];
    assert_eq!(last.role, ChatRole::Assistant);
    assert_eq!(last.text(), "hello");
    assert!(!last.is_partial());
}

#[tokio::test]
async fn truncated_then_stop_matches_single_round_answer() {
    let provider = ScriptedProvider::new(vec![
        round("The quick ", FinishReason::Length, 3),
        round("brown fox", FinishReason::Stop, 2),
    ]);
    let mut conversation = asked("story");
    let options = ChatOptions::new().max_tokens(3).n(2);

    let result = complete(&provider, &mut conversation, &options, ContinuationPolicy::default())
        .await
        .unwrap();

    assert_eq!(result.content, "The quick brown fox");
    assert_eq!(result.finish_reason, FinishReason::Stop);
    assert_eq!(result.rounds, 2);
    assert_eq!(result.choices[0].content, "The quick brown fox");
    assert_eq!(result.usage.map(|u| u.completion_tokens), Some(5));
    assert_eq!(result.retry_delays.len(), 2);

    let requests = provider.requests();
    let (second_messages, second_options) = &requests[1];
    let tail = second_messages.last().unwrap();
    assert_eq!(tail.text(), "The quick ");
    assert_eq!(tail.partial, Some(crate::chat::PartialKind::Continuation));
    assert_eq!(second_options.max_tokens, None);
    assert_eq!(second_options.n, None);
    assert_eq!(requests[0].1.max_tokens, Some(3));

    let texts: Vec<String> = conversation.turns().iter().map(|t| t.text()).collect();
    assert_eq!(texts, vec!["sys", "story", "The quick brown fox"]);
    assert!(conversation.partial().is_none());
}

#[tokio::test]
async fn always_truncated_stops_at_bound() {
    let replies = (0..10)
        .map(|_| round("x", FinishReason::Length, 1))
        .collect();
    let provider = ScriptedProvider::new(replies);
    let mut conversation = asked("long");

    let result = complete(&provider, &mut conversation, &ChatOptions::new(), ContinuationPolicy::default())
        .await
        .unwrap();

    assert_eq!(provider.requests().len(), 5);
    assert_eq!(result.rounds, 5);
    assert_eq!(result.content, "xxxxx");
    assert!(result.is_truncated());
    assert_eq!(conversation.turns().last().unwrap().text(), "xxxxx");
    assert!(conversation.partial().is_none());
}

#[tokio::test]
async fn disabled_policy_returns_truncated_answer() {
    let provider = ScriptedProvider::new(vec![round("cut", FinishReason::Length, 1)]);
    let mut conversation = asked("q");

    let result = complete(&provider, &mut conversation, &ChatOptions::new(), ContinuationPolicy::disabled())
        .await
        .unwrap();

    assert_eq!(provider.requests().len(), 1);
    assert!(result.is_truncated());
}

#[tokio::test]
async fn terminal_error_is_not_continued() {
    let provider = ScriptedProvider::new(vec![
        round("part", FinishReason::Length, 1),
        Err(LLMError::ContextLengthExceeded(ApiFailure::new(400, "too long"))),
        round("never", FinishReason::Stop, 1),
    ]);
    let mut conversation = asked("q");
    let checkpoint = conversation.checkpoint();

    let err = complete(&provider, &mut conversation, &ChatOptions::new(), ContinuationPolicy::default())
        .await
        .unwrap_err();

    assert_eq!(err.kind(), "context_length_exceeded");
    assert_eq!(provider.requests().len(), 2);
    assert_eq!(conversation.partial().map(|t| t.text()).as_deref(), Some("part"));
    conversation.rollback(checkpoint);
    assert!(conversation.partial().is_none());
    assert_eq!(conversation.len(), 2);
}

#[tokio::test]
async fn seeded_answer_starts_from_seed() {
    let provider = ScriptedProvider::new(vec![
        round(" am the", FinishReason::Length, 2),
        round(" Survivor", FinishReason::Stop, 1),
    ]);
    let mut conversation = asked("who are you?");
    conversation
        .seed_partial("I", Some("Kelsier".to_string()))
        .unwrap();

    let result = complete(&provider, &mut conversation, &ChatOptions::new(), ContinuationPolicy::default())
        .await
        .unwrap();

    assert_eq!(result.content, "I am the Survivor");
    let first_request = &provider.requests()[0].0;
    assert_eq!(first_request.last().unwrap().text(), "I");
    let answer = conversation.turns().last().unwrap();
    assert_eq!(answer.text(), "I am the Survivor");
    assert_eq!(answer.name.as_deref(), Some("Kelsier"));
    assert!(!answer.is_partial());
}

#[tokio::test]
async fn streaming_surfaces_a_single_done_chunk() {
    let provider = ScriptedProvider::new(vec![
        round("ab", FinishReason::Length, 2),
        round("cd", FinishReason::Stop, 2),
    ]);
    let mut conversation = asked("q");
    let mut seen = Vec::new();
    let mut handler = |chunk: &StreamChunk| {
        seen.push(chunk.clone());
        ChunkControl::Continue
    };

    let result = complete_streaming(
        &provider,
        &mut conversation,
        &ChatOptions::new(),
        ContinuationPolicy::default(),
        &mut handler,
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(result.content, "abcd");
    let text: String = seen.iter().map(|c| c.delta_content.as_str()).collect();
    assert_eq!(text, "abcd");
    let done: Vec<_> = seen.iter().filter(|c| c.done).collect();
    assert_eq!(done.len(), 1);
    assert_eq!(done[0].finish_reason, Some(FinishReason::Stop));
}

#[tokio::test]
async fn stopped_stream_is_not_continued() {
    let mut stopped = round("half", FinishReason::Length, 1).unwrap();
    stopped.stopped_early = true;
    let provider = ScriptedProvider::new(vec![Ok(stopped)]);
    let mut conversation = asked("q");
    let mut handler = |_: &StreamChunk| ChunkControl::Continue;

    let result = complete_streaming(
        &provider,
        &mut conversation,
        &ChatOptions::new(),
        ContinuationPolicy::default(),
        &mut handler,
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    assert!(result.stopped_early);
    assert_eq!(provider.requests().len(), 1);
    assert_eq!(conversation.turns().last().unwrap().text(), "half");
}

#[tokio::test]
async fn cancellation_between_rounds_keeps_delivered_text() {
    let provider = ScriptedProvider::new(vec![
        round("already streamed ", FinishReason::Length, 2),
        Err(LLMError::Cancelled),
    ]);
    let mut conversation = asked("q");
    let mut seen = String::new();
    let mut handler = |chunk: &StreamChunk| {
        seen.push_str(&chunk.delta_content);
        ChunkControl::Continue
    };

    let result = complete_streaming(
        &provider,
        &mut conversation,
        &ChatOptions::new(),
        ContinuationPolicy::default(),
        &mut handler,
        &CancellationToken::new(),
    )
    .await
    .unwrap();

    assert_eq!(seen, "already streamed ");
    assert_eq!(result.content, "already streamed ");
    assert!(result.stopped_early);
    assert!(result.is_truncated());
    assert_eq!(result.rounds, 1);
    assert_eq!(provider.requests().len(), 2);
    let last = conversation.turns().last().unwrap();
    assert_eq!(last.role, ChatRole::Assistant);
    assert_eq!(last.text(), "already streamed ");
    assert!(conversation.partial().is_none());
}

#[tokio::test]
async fn cancellation_of_first_round_is_an_error() {
    let provider = ScriptedProvider::new(vec![Err(LLMError::Cancelled)]);
    let mut conversation = asked("q");
    let mut handler = |_: &StreamChunk| ChunkControl::Continue;

    let err = complete_streaming(
        &provider,
        &mut conversation,
        &ChatOptions::new(),
        ContinuationPolicy::default(),
        &mut handler,
        &CancellationToken::new(),
    )
    .await
    .unwrap_err();

    assert!(matches!(err, LLMError::Cancelled));
    assert_eq!(conversation.len(), 2);
}

#[test]
fn state_tracks_rounds_against_bound() {
    let mut state = ContinuationState::new("seed", 2);
    assert!(state.has_rounds_left());
    state.iterations = 2;
    assert!(!state.has_rounds_left());
    assert_eq!(state.accumulated, "seed");
}
