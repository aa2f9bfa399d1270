// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Reliability Policy - timeout and retry-with-backoff parameters for one chain link
//
// A chain link is one provider's full retry sequence within a turn. Each
// attempt is bounded by `call_timeout`; transient failures are retried up to
// `max_attempts` total attempts with capped exponential backoff plus jitter.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::domain::llm::ProviderError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Total attempts per chain link (first call included)
    pub max_attempts: u32,

    /// Deadline for a single upstream call
    pub call_timeout: Duration,

    /// Backoff base; attempt `n` waits `base * 2^(n-1)` plus jitter
    pub base_delay: Duration,

    /// Upper bound for any single backoff sleep
    pub max_delay: Duration,

    /// Exclusive upper bound of the random jitter added to each backoff
    pub jitter: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            call_timeout: Duration::from_millis(1500),
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_millis(2000),
            jitter: Duration::from_millis(80),
        }
    }
}

impl RetryPolicy {
    /// Deterministic backoff for `attempt` (1-based) given an explicit jitter.
    ///
    /// A 429 carrying a retry-after hint waits `min(retry_after, max_delay)`
    /// instead of the exponential schedule.
    pub fn backoff_delay(&self, attempt: u32, err: &ProviderError, jitter: Duration) -> Duration {
        if let Some(retry_after_ms) = err.retry_after_ms() {
            return Duration::from_millis(retry_after_ms).min(self.max_delay);
        }

        let exponent = attempt.saturating_sub(1).min(31);
        let exponential = self.base_delay.saturating_mul(1u32 << exponent);
        exponential.saturating_add(jitter).min(self.max_delay)
    }

    /// Backoff for `attempt` with a fresh random jitter in `[0, self.jitter)`
    pub fn next_delay(&self, attempt: u32, err: &ProviderError) -> Duration {
        let jitter_ms = self.jitter.as_millis() as u64;
        let jitter = if jitter_ms == 0 {
            Duration::ZERO
        } else {
            Duration::from_millis(rand::rng().random_range(0..jitter_ms))
        };
        self.backoff_delay(attempt, err, jitter)
    }

    /// Longest one chain link can run: every attempt hits `call_timeout` and
    /// every backoff sleeps the full `max_delay`
    pub fn link_budget(&self) -> Duration {
        let attempts = self.max_attempts.max(1);
        self.call_timeout
            .saturating_mul(attempts)
            .saturating_add(self.max_delay.saturating_mul(attempts - 1))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 4,
            call_timeout: Duration::from_millis(100),
            base_delay: Duration::from_millis(200),
            max_delay: Duration::from_millis(1000),
            jitter: Duration::from_millis(80),
        }
    }

    #[test]
    fn test_exponential_schedule_is_capped() {
        let p = policy();
        let err = ProviderError::http(500, "boom");

        assert_eq!(p.backoff_delay(1, &err, Duration::ZERO), Duration::from_millis(200));
        assert_eq!(p.backoff_delay(2, &err, Duration::from_millis(10)), Duration::from_millis(410));
        assert_eq!(p.backoff_delay(3, &err, Duration::ZERO), Duration::from_millis(800));
        assert_eq!(p.backoff_delay(4, &err, Duration::from_millis(79)), Duration::from_millis(1000));
        assert_eq!(p.backoff_delay(40, &err, Duration::ZERO), Duration::from_millis(1000));
    }

    #[test]
    fn test_retry_after_overrides_schedule() {
        let p = policy();
        let short = ProviderError::rate_limited(Some(300));
        let long = ProviderError::rate_limited(Some(5000));
        let no_hint = ProviderError::rate_limited(None);

        assert_eq!(p.backoff_delay(3, &short, Duration::from_millis(50)), Duration::from_millis(300));
        assert_eq!(p.backoff_delay(1, &long, Duration::ZERO), Duration::from_millis(1000));
        assert_eq!(p.backoff_delay(1, &no_hint, Duration::ZERO), Duration::from_millis(200));
    }

    #[test]
    fn test_random_jitter_stays_in_bounds() {
        let p = policy();
        let err = ProviderError::Timeout;
        for _ in 0..100 {
            let d = p.next_delay(1, &err);
            assert!(d >= Duration::from_millis(200) && d < Duration::from_millis(280));
        }
    }

    #[test]
    fn test_link_budget_covers_timeouts_and_backoff() {
        let p = policy();
        assert_eq!(p.link_budget(), Duration::from_millis(4 * 100 + 3 * 1000));

        let single = RetryPolicy {
            max_attempts: 0,
            ..policy()
        };
        assert_eq!(single.link_budget(), Duration::from_millis(100));
    }
}
