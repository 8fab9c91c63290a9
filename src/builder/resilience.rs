use crate::dispatch::RetryPolicy;

use super::chat_builder::ChatClientBuilder;

impl ChatClientBuilder {
    /// Sets the total number of attempts per request, the first included.
    pub fn retry_attempts(mut self, attempts: u32) -> Self {
        self.state.retry_attempts = Some(attempts);
        self
    }

    /// Sets initial and max backoff delays in milliseconds.
    pub fn retry_backoff(mut self, initial_delay_ms: u64, max_delay_ms: u64) -> Self {
        self.state.retry_base_delay_ms = Some(initial_delay_ms);
        self.state.retry_max_delay_ms = Some(max_delay_ms);
        self
    }

    /// Sets jitter toggle for backoff.
    pub fn retry_jitter(mut self, jitter: bool) -> Self {
        self.state.retry_jitter = Some(jitter);
        self
    }

    /// Replaces the retry settings wholesale.
    pub fn retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.state.retry_policy = Some(policy);
        self
    }

    /// Enables or disables automatic continuation of truncated answers.
    pub fn continuation(mut self, enabled: bool) -> Self {
        self.state.continuation = Some(enabled);
        self
    }

    /// Sets the round bound for one answer, the first round included.
    pub fn max_continuation_rounds(mut self, rounds: u32) -> Self {
        self.state.max_continuation_rounds = Some(rounds);
        self
    }
}
