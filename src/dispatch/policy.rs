use std::time::Duration;

use rand::Rng;

/// Largest exponent applied to the initial delay.
const MAX_BACKOFF_EXPONENT: u32 = 20;
/// Upper bound of the random extra delay, as a fraction of the base delay.
const JITTER_FRACTION: f64 = 0.2;

/// Configuration for retry and backoff behavior. Fixed for the duration of
/// one request.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Maximum number of attempts, the first one included
    pub max_retries: u32,
    /// Delay after the first failed attempt
    pub initial_delay: Duration,
    /// Ceiling for the exponential delay, before jitter
    pub max_delay: Duration,
    /// Whether to add up to 20% of random extra delay
    pub jitter: bool,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(8),
            jitter: true,
        }
    }
}

impl RetryPolicy {
    /// A policy that never retries.
    pub fn no_retry() -> Self {
        Self {
            max_retries: 1,
            ..Self::default()
        }
    }

    /// `initial_delay * 2^(failed_attempt - 1)`, capped at `max_delay`.
    pub fn base_delay(&self, failed_attempt: u32) -> Duration {
        let exponent = failed_attempt.saturating_sub(1).min(MAX_BACKOFF_EXPONENT);
        self.initial_delay
            .saturating_mul(1u32 << exponent)
            .min(self.max_delay)
    }

    /// Delay to sleep after `failed_attempt` failed, with `sample` in `[0, 1)`
    /// scaling the jitter.
    pub fn delay_with_sample(&self, failed_attempt: u32, sample: f64) -> Duration {
        let base = self.base_delay(failed_attempt);
        if !self.jitter {
            return base;
        }
        let sample = sample.clamp(0.0, 1.0);
        base + base.mul_f64(JITTER_FRACTION * sample)
    }

    /// Delay to sleep after `failed_attempt` failed.
    pub fn backoff(&self, failed_attempt: u32) -> Duration {
        let sample = if self.jitter {
            rand::thread_rng().gen::<f64>()
        } else {
            0.0
        };
        self.delay_with_sample(failed_attempt, sample)
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;

    fn policy(initial_ms: u64, max_ms: u64, jitter: bool) -> RetryPolicy {
        RetryPolicy {
            max_retries: 5,
            initial_delay: Duration::from_millis(initial_ms),
            max_delay: Duration::from_millis(max_ms),
            jitter,
        }
    }

    #[test]
    fn base_delay_doubles_until_capped() {
        let p = policy(100, 1_000, false);
        let delays: Vec<u128> = (1..=6).map(|a| p.base_delay(a).as_millis()).collect();
        assert_eq!(delays, vec![100, 200, 400, 800, 1_000, 1_000]);
    }

    #[test]
    fn jitter_disabled_returns_base() {
        let p = policy(100, 1_000, false);
        assert_eq!(p.backoff(2), Duration::from_millis(200));
    }

    #[test]
    fn huge_attempt_numbers_do_not_overflow() {
        let p = policy(100, 60_000, true);
        assert_eq!(p.base_delay(u32::MAX), Duration::from_millis(60_000));
    }

    proptest! {
        #[test]
        fn delay_before_attempt_k_stays_within_jitter_band(
            initial_ms in 1u64..2_000,
            cap_factor in 1u64..64,
            k in 2u32..12,
        ) {
            let p = policy(initial_ms, initial_ms * cap_factor, true);
            let base = p.base_delay(k - 1);
            let expected = Duration::from_millis(initial_ms)
                .saturating_mul(1u32 << (k - 2))
                .min(p.max_delay);
            prop_assert_eq!(base, expected);

            let delay = p.backoff(k - 1);
            prop_assert!(delay >= base);
            prop_assert!(delay <= base.mul_f64(1.2) + Duration::from_nanos(1));
        }
    }
}
