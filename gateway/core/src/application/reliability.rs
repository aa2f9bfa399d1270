// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Reliability Wrapper
//!
//! Bounded timeout and bounded retry-with-backoff around one provider call.
//! A chain link runs as `with_retry(|_| with_timeout(adapter.chat(..), call_timeout))`.
//!
//! # Architecture
//!
//! - **Layer:** Application Layer
//! - **Purpose:** Reliability controls shared by every provider chain link

use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::domain::llm::{ChatCompletion, ChatMessage, ProviderAdapter, ProviderError};
use crate::domain::reliability::RetryPolicy;

/// Race `op` against `deadline`.
///
/// When the deadline elapses first the future is dropped, which cancels the
/// in-flight work at its next suspension point, and `ProviderError::Timeout`
/// is returned.
pub async fn with_timeout<F, T>(op: F, deadline: Duration) -> Result<T, ProviderError>
where
    F: Future<Output = Result<T, ProviderError>>,
{
    match tokio::time::timeout(deadline, op).await {
        Ok(result) => result,
        Err(_) => {
            debug!(deadline_ms = deadline.as_millis() as u64, "Provider call timed out");
            Err(ProviderError::Timeout)
        }
    }
}

/// Invoke `op` until it succeeds, fails non-transiently, or `policy.max_attempts` is reached.
///
/// `op` receives the 1-based attempt number. After the final attempt the last
/// error is returned unchanged.
pub async fn with_retry<F, Fut, T>(policy: &RetryPolicy, mut op: F) -> Result<T, ProviderError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, ProviderError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() && attempt < max_attempts => {
                let delay = policy.next_delay(attempt, &err);
                warn!(
                    attempt,
                    max_attempts,
                    error = %err,
                    delay_ms = delay.as_millis() as u64,
                    "Transient provider error, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

/// One full chain link against `adapter`
pub async fn call_with_reliability(
    adapter: &dyn ProviderAdapter,
    messages: &[ChatMessage],
    policy: &RetryPolicy,
) -> Result<ChatCompletion, ProviderError> {
    with_retry(policy, |_| with_timeout(adapter.chat(messages), policy.call_timeout)).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::session::Role;
    use crate::infrastructure::llm::scripted::{ScriptStep, ScriptedProvider};
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio_test::{assert_err, assert_ok};

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            call_timeout: Duration::from_millis(50),
            base_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            jitter: Duration::ZERO,
        }
    }

    #[tokio::test]
    async fn test_retries_transient_until_success() {
        let calls = AtomicU32::new(0);
        let result = with_retry(&fast_policy(4), |_| {
            let n = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if n < 3 {
                    Err(ProviderError::http(500, "boom"))
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(assert_ok!(result), 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_transient_is_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = with_retry(&fast_policy(4), |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err(ProviderError::http(400, "bad request")) }
        })
        .await;

        assert_eq!(assert_err!(result).status(), 400);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exhausted_attempts_return_last_error() {
        let result: Result<(), _> = with_retry(&fast_policy(3), |attempt| async move {
            if attempt < 3 {
                Err(ProviderError::Timeout)
            } else {
                Err(ProviderError::rate_limited(Some(1)))
            }
        })
        .await;

        assert_eq!(assert_err!(result).code(), "HTTP_429");
    }

    #[tokio::test]
    async fn test_timeout_passes_through_fast_result() {
        let result = with_timeout(async { Ok::<_, ProviderError>("fast") }, Duration::from_millis(50)).await;
        assert_eq!(assert_ok!(result), "fast");
    }

    #[tokio::test]
    async fn test_timeout_fires_before_slow_result() {
        let started = std::time::Instant::now();
        let result = with_timeout(
            async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Ok::<_, ProviderError>("late")
            },
            Duration::from_millis(20),
        )
        .await;

        assert_eq!(assert_err!(result), ProviderError::Timeout);
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_chain_link_retries_timeouts() {
        let provider = ScriptedProvider::echo("vendorA").with_latency(Duration::from_millis(200));
        let messages = vec![ChatMessage::new(Role::User, "Hello")];

        let err = call_with_reliability(&provider, &messages, &fast_policy(3))
            .await
            .unwrap_err();
        assert_eq!(err, ProviderError::Timeout);
        assert_eq!(provider.calls(), 3);

        let flaky = ScriptedProvider::echo("vendorB")
            .then(ScriptStep::Fail(ProviderError::rate_limited(Some(2))));
        let reply = call_with_reliability(&flaky, &messages, &fast_policy(3)).await.unwrap();
        assert_eq!(reply.text, "vendorB reply: Hello");
        assert_eq!(flaky.calls(), 2);
    }
}
