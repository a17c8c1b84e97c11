//! Deadline race for a single physical attempt.

use std::future::Future;
use std::time::Duration;

use crate::error::{FailureKind, FetchError, Outcome};

/// Run `attempt` against a timer of length `limit`.
///
/// If the timer fires first the attempt future is dropped, which aborts the
/// in-flight transport call, and a timeout failure is returned instead.
pub async fn with_timeout<T, F>(limit: Duration, url: &str, attempt_no: u32, attempt: F) -> Outcome<T>
where
    F: Future<Output = Outcome<T>>,
{
    match tokio::time::timeout(limit, attempt).await {
        Ok(outcome) => outcome,
        Err(_) => Err(FetchError::new(
            FailureKind::Timeout,
            format!("request timed out after {} ms", limit.as_millis()),
            url,
            attempt_no,
        )),
    }
}
