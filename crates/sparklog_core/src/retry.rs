//! crates/sparklog_core/src/retry.rs
//!
//! A small retry wrapper shared by the API route handlers and the client
//! facade. Retries only failures classified as transient, with exponential
//! backoff. No jitter and no total-time cap.

use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::ports::{PortError, PortResult};

/// The delay before retry `attempt` (zero-based): `base_delay * 2^attempt`,
/// saturating instead of overflowing for absurd attempt counts.
fn backoff_delay(base_delay: Duration, attempt: u32) -> Duration {
    base_delay.saturating_mul(2u32.saturating_pow(attempt))
}

/// Executes `op`, retrying on transient failures.
///
/// The delay before retry `n` (zero-based) is `base_delay * 2^n`. A
/// non-transient error propagates immediately; exhausting all attempts
/// returns the last error.
pub async fn with_retry<T, F, Fut>(
    mut op: F,
    max_attempts: u32,
    base_delay: Duration,
) -> PortResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = PortResult<T>>,
{
    let mut last_error = None;
    for attempt in 0..max_attempts {
        match op().await {
            Ok(value) => return Ok(value),
            Err(err) => {
                if !err.is_transient() {
                    return Err(err);
                }
                warn!(
                    attempt = attempt + 1,
                    max_attempts,
                    error = %err,
                    "transient failure, will retry"
                );
                if attempt + 1 < max_attempts {
                    tokio::time::sleep(backoff_delay(base_delay, attempt)).await;
                }
                last_error = Some(err);
            }
        }
    }
    Err(last_error
        .unwrap_or_else(|| PortError::Unexpected("all retry attempts failed".to_string())))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test]
    async fn recovers_after_transient_failures() {
        let attempts = AtomicU32::new(0);
        let result = with_retry(
            || async {
                let n = attempts.fetch_add(1, Ordering::SeqCst);
                if n < 2 {
                    Err(PortError::Unexpected("upstream returned 503".to_string()))
                } else {
                    Ok("ok")
                }
            },
            3,
            Duration::from_millis(1),
        )
        .await;
        assert_eq!(result.unwrap(), "ok");
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn permanent_failure_is_not_retried() {
        let attempts = AtomicU32::new(0);
        let result: PortResult<()> = with_retry(
            || async {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(PortError::Unexpected("401 Unauthorized".to_string()))
            },
            3,
            Duration::from_millis(1),
        )
        .await;
        assert!(matches!(result, Err(PortError::Unexpected(_))));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn backoff_delay_grows_and_saturates() {
        let base = Duration::from_secs(1);
        assert_eq!(backoff_delay(base, 0), Duration::from_secs(1));
        assert_eq!(backoff_delay(base, 2), Duration::from_secs(4));
        // Caller-supplied attempt counts can be arbitrarily large; the
        // delay must cap out instead of panicking on overflow.
        assert_eq!(backoff_delay(base, 40), backoff_delay(base, u32::MAX));
    }

    #[tokio::test]
    async fn exhausting_attempts_returns_the_last_error() {
        let attempts = AtomicU32::new(0);
        let result: PortResult<()> = with_retry(
            || async {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err(PortError::Upstream {
                    status: 503,
                    message: "overloaded".to_string(),
                })
            },
            2,
            Duration::from_millis(1),
        )
        .await;
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        match result {
            Err(PortError::Upstream { status, .. }) => assert_eq!(status, 503),
            other => panic!("unexpected result: {other:?}"),
        }
    }
}
