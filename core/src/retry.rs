//! Repeat-with-backoff around an already timeout-wrapped attempt.
//!
//! # Design
//! The retry driver knows nothing about HTTP. It calls the attempt closure
//! with a 1-based attempt number, inspects the failure kind, sleeps
//! `base × 2^(N−1)` after attempt N and tries again until the budget of
//! `max_retries + 1` attempts is spent. Attempts are strictly sequential.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::config::FetchConfig;
use crate::error::{FailureKind, FetchError, Outcome};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub retry_invalid_bodies: bool,
}

impl RetryPolicy {
    pub fn from_config(config: &FetchConfig) -> Self {
        Self {
            max_retries: config.max_retries,
            base_delay: config.retry_delay,
            retry_invalid_bodies: config.retry_invalid_bodies,
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries.saturating_add(1)
    }

    /// Delay slept after the given (1-based) attempt fails.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1);
        self.base_delay.saturating_mul(2u32.saturating_pow(exponent))
    }

    pub fn is_retryable(&self, kind: FailureKind) -> bool {
        match kind {
            FailureKind::Transport | FailureKind::Timeout | FailureKind::HttpStatus => true,
            FailureKind::Decode | FailureKind::Validation => self.retry_invalid_bodies,
            FailureKind::Serialization | FailureKind::Cancelled => false,
        }
    }
}

/// Drive `attempt` until it succeeds, fails with a non-retryable kind, or
/// the attempt budget runs out. The last failure is returned unchanged.
///
/// Cancelling `cancel` while backing off ends the loop with a `Cancelled`
/// failure carrying the number of the attempt that just finished.
pub async fn retry<T, F, Fut>(policy: &RetryPolicy, cancel: Option<&CancellationToken>, mut attempt: F) -> Outcome<T>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Outcome<T>>,
{
    let max_attempts = policy.max_attempts();
    let mut attempt_no = 1;
    loop {
        let err = match attempt(attempt_no).await {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };
        if attempt_no >= max_attempts || !policy.is_retryable(err.kind) {
            return Err(err);
        }

        let delay = policy.delay_after(attempt_no);
        warn!(
            url = %err.url,
            attempt = attempt_no,
            kind = %err.kind,
            ?delay,
            "attempt failed, retrying: {}",
            err.message
        );
        match cancel {
            Some(token) => {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => {
                        return Err(FetchError::new(
                            FailureKind::Cancelled,
                            "request cancelled during retry backoff",
                            err.url,
                            attempt_no,
                        ));
                    }
                    _ = tokio::time::sleep(delay) => {}
                }
            }
            None => tokio::time::sleep(delay).await,
        }
        attempt_no += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use tokio::time::Instant;

    fn policy(max_retries: u32, base_ms: u64) -> RetryPolicy {
        RetryPolicy {
            max_retries,
            base_delay: Duration::from_millis(base_ms),
            retry_invalid_bodies: false,
        }
    }

    fn failure(kind: FailureKind, attempt: u32) -> FetchError {
        FetchError::new(kind, "boom", "https://x", attempt)
    }

    #[test]
    fn delay_doubles_from_base() {
        let p = policy(5, 100);
        let delays: Vec<u128> = (1..=4).map(|n| p.delay_after(n).as_millis()).collect();
        assert_eq!(delays, vec![100, 200, 400, 800]);
    }

    #[test]
    fn delay_saturates_instead_of_overflowing() {
        let p = policy(u32::MAX, 1_000);
        assert_eq!(p.delay_after(64), Duration::from_millis(1_000).saturating_mul(u32::MAX));
        assert!(p.delay_after(64) >= p.delay_after(33));
        assert_eq!(p.max_attempts(), u32::MAX);
        let huge = RetryPolicy {
            base_delay: Duration::MAX,
            ..policy(1, 0)
        };
        assert_eq!(huge.delay_after(2), Duration::MAX);
    }

    #[test]
    fn zero_base_delay_stays_zero_past_exponent_overflow() {
        let p = policy(40, 0);
        for attempt in [1, 32, 33, 40, u32::MAX] {
            assert_eq!(p.delay_after(attempt), Duration::ZERO, "attempt {attempt}");
        }
    }

    #[tokio::test(start_paused = true)]
    async fn zero_base_delay_runs_every_attempt_without_waiting() {
        let calls = AtomicU32::new(0);
        let started = Instant::now();
        let err = retry(&policy(40, 0), None, |n| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { Err::<(), _>(failure(FailureKind::Transport, n)) }
        })
        .await
        .unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 41);
        assert_eq!(err.attempt, 41);
        assert!(started.elapsed() < Duration::from_millis(1));
    }

    #[test]
    fn invalid_bodies_are_retried_only_when_enabled() {
        let mut p = policy(1, 1);
        assert!(!p.is_retryable(FailureKind::Decode));
        assert!(!p.is_retryable(FailureKind::Validation));
        p.retry_invalid_bodies = true;
        assert!(p.is_retryable(FailureKind::Decode));
        assert!(p.is_retryable(FailureKind::Validation));
        assert!(!p.is_retryable(FailureKind::Serialization));
        assert!(!p.is_retryable(FailureKind::Cancelled));
    }

    #[tokio::test(start_paused = true)]
    async fn stops_after_budget_with_last_failure() {
        let calls = AtomicU32::new(0);
        let started = Instant::now();
        let err = retry(&policy(2, 100), None, |n| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { Err::<(), _>(failure(FailureKind::Timeout, n)) }
        })
        .await
        .unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(err.attempt, 3);
        let waited = started.elapsed();
        assert!(waited >= Duration::from_millis(300) && waited < Duration::from_millis(400), "{waited:?}");
    }

    #[tokio::test(start_paused = true)]
    async fn success_short_circuits() {
        let calls = AtomicU32::new(0);
        let value = retry(&policy(5, 10), None, |n| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(failure(FailureKind::Transport, n))
                } else {
                    Ok(n)
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(value, 2);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn non_retryable_failure_returns_immediately() {
        let calls = AtomicU32::new(0);
        let err = retry(&policy(3, 10), None, |n| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { Err::<(), _>(failure(FailureKind::Serialization, n)) }
        })
        .await
        .unwrap_err();
        assert_eq!(err.kind, FailureKind::Serialization);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_during_backoff_stops_retrying() {
        let token = CancellationToken::new();
        let calls = AtomicU32::new(0);
        let canceller = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            canceller.cancel();
        });
        let err = retry(&policy(3, 1_000), Some(&token), |n| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { Err::<(), _>(failure(FailureKind::HttpStatus, n)) }
        })
        .await
        .unwrap_err();
        assert_eq!(err.kind, FailureKind::Cancelled);
        assert_eq!(err.attempt, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
