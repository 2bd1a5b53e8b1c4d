//! Bounded exponential backoff for API requests
//!
//! Transport failures, timeouts and HTTP statuses listed in
//! [`RetryConfig::retry_on_status`] are retried. Everything else is returned
//! to the caller immediately.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::warn;

use crate::{config::RetryConfig, errors::ClientError};

/// Failure of a single attempt
#[derive(Debug)]
pub struct AttemptError {
    pub error: ClientError,
    /// Server-provided `Retry-After` hint
    pub retry_after: Option<Duration>,
}

impl From<ClientError> for AttemptError {
    fn from(error: ClientError) -> Self {
        Self { error, retry_after: None }
    }
}

/// Whether `error` is worth another attempt under `policy`
pub fn is_retryable(policy: &RetryConfig, error: &ClientError) -> bool {
    error.is_transient() || error.status().is_some_and(|status| policy.should_retry_status(status))
}

/// Delay before the attempt following `attempt`
///
/// A `Retry-After` hint replaces the computed backoff but is still capped at
/// the policy's maximum delay.
pub fn next_delay(policy: &RetryConfig, attempt: u32, retry_after: Option<Duration>) -> Duration {
    match retry_after {
        Some(hint) => hint.min(policy.max_delay()),
        None => policy.delay_for_attempt(attempt),
    }
}

/// Runs `op` until it succeeds, fails permanently, or runs out of attempts
///
/// # Arguments
/// * `policy` - Retry policy
/// * `endpoint` - Endpoint name, used for logging
/// * `op` - Operation receiving the 1-based attempt number
///
/// # Returns
/// * `Ok(T)` - Result of the first successful attempt
/// * `Err(ClientError)` - The permanent error, or `RetriesExhausted` wrapping
///   the last transient one
pub async fn retry_with_backoff<F, Fut, T>(
    policy: &RetryConfig,
    endpoint: &str,
    mut op: F,
) -> Result<T, ClientError>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, AttemptError>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(failure) if !is_retryable(policy, &failure.error) => return Err(failure.error),
            Err(failure) if attempt < max_attempts => {
                let delay = next_delay(policy, attempt, failure.retry_after);
                warn!(
                    target: "altitrace::client",
                    endpoint,
                    attempt,
                    max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %failure.error,
                    "Request failed, retrying"
                );
                sleep(delay).await;
                attempt += 1;
            }
            Err(failure) if max_attempts == 1 => return Err(failure.error),
            Err(failure) => {
                return Err(ClientError::RetriesExhausted {
                    attempts: attempt,
                    last_error: Box::new(failure.error),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            initial_delay_ms: 1,
            max_delay_ms: 5,
            ..Default::default()
        }
    }

    fn unavailable() -> ClientError {
        ClientError::Status { endpoint: "/simulate".into(), status: 503, body: String::new() }
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let counter = AtomicU32::new(0);
        let result: Result<u32, ClientError> = retry_with_backoff(&fast_policy(4), "/simulate", |_| {
            let current = counter.fetch_add(1, Ordering::Relaxed);
            async move {
                if current < 2 {
                    Err(AttemptError::from(unavailable()))
                } else {
                    Ok(7)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(counter.load(Ordering::Relaxed), 3);
    }

    #[tokio::test]
    async fn test_client_errors_are_not_retried() {
        let counter = AtomicU32::new(0);
        let result: Result<(), ClientError> = retry_with_backoff(&fast_policy(5), "/simulate", |_| {
            counter.fetch_add(1, Ordering::Relaxed);
            async {
                Err(AttemptError::from(ClientError::Status {
                    endpoint: "/simulate".into(),
                    status: 400,
                    body: "bad request".into(),
                }))
            }
        })
        .await;

        assert_eq!(result.unwrap_err().status(), Some(400));
        assert_eq!(counter.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_exhaustion_reports_attempts() {
        let result: Result<(), ClientError> = retry_with_backoff(&fast_policy(3), "/trace/tx", |_| async {
            Err(AttemptError::from(ClientError::Transport("connection reset".into())))
        })
        .await;

        match result {
            Err(ClientError::RetriesExhausted { attempts, last_error }) => {
                assert_eq!(attempts, 3);
                assert!(last_error.is_transient());
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_retry_after_is_capped() {
        let policy = fast_policy(3);
        assert_eq!(next_delay(&policy, 1, Some(Duration::from_secs(60))), Duration::from_millis(5));
        assert_eq!(next_delay(&policy, 2, None), Duration::from_millis(2));
    }
}
