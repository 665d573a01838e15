//! Retry of transient CRM failures
//!
//! Exponential backoff with jitter for HTTP 429/502. Any other error is
//! returned immediately; a transient error that outlives the attempt budget
//! becomes [`CrmError::Transient`].

use crate::crm::CrmError;
use asmbly_common::config::CrmConfig;
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Backoff parameters
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::from_config(&CrmConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &CrmConfig) -> Self {
        Self {
            max_attempts: config.max_retries.max(1),
            initial_backoff: Duration::from_millis(config.initial_backoff_ms),
            max_backoff: Duration::from_millis(config.max_backoff_ms),
        }
    }

    /// Delay before attempt `attempt + 1`: doubling from the initial backoff,
    /// capped, plus up to 25% jitter.
    fn backoff(&self, attempt: u32) -> Duration {
        let exp = attempt.saturating_sub(1).min(16);
        let base = self
            .initial_backoff
            .saturating_mul(1u32 << exp)
            .min(self.max_backoff);
        let jitter_ms = (base.as_millis() as u64) / 4;
        let jitter = if jitter_ms > 0 {
            rand::thread_rng().gen_range(0..=jitter_ms)
        } else {
            0
        };
        base + Duration::from_millis(jitter)
    }
}

/// Run `operation` until it succeeds, fails permanently, or runs out of attempts.
pub async fn retry_transient<F, Fut, T>(
    operation_name: &str,
    policy: &RetryPolicy,
    mut operation: F,
) -> Result<T, CrmError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, CrmError>>,
{
    let mut attempt = 0;

    loop {
        attempt += 1;

        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    tracing::debug!(
                        operation = operation_name,
                        attempt,
                        "CRM request succeeded after retry"
                    );
                }
                return Ok(result);
            }
            Err(err) if err.is_transient() => {
                let status = match &err {
                    CrmError::Status { status, .. } => *status,
                    _ => 0,
                };

                if attempt >= policy.max_attempts {
                    tracing::error!(
                        operation = operation_name,
                        attempt,
                        status,
                        "CRM request failed: retries exhausted"
                    );
                    return Err(CrmError::Transient {
                        status,
                        attempts: attempt,
                    });
                }

                let delay = policy.backoff(attempt);
                tracing::warn!(
                    operation = operation_name,
                    attempt,
                    status,
                    backoff_ms = delay.as_millis() as u64,
                    "Transient CRM error, will retry after backoff"
                );
                tokio::time::sleep(delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn fast_policy(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            initial_backoff: Duration::from_millis(1),
            max_backoff: Duration::from_millis(4),
        }
    }

    fn throttled() -> CrmError {
        CrmError::Status {
            status: 429,
            body: "Too Many Requests".to_string(),
        }
    }

    #[tokio::test]
    async fn test_succeeds_first_attempt() {
        let result = retry_transient("test_op", &fast_policy(3), || async { Ok::<_, CrmError>(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn test_retries_transient_then_succeeds() {
        let calls = AtomicU32::new(0);
        let result = retry_transient("test_op", &fast_policy(5), || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n < 2 {
                    Err(throttled())
                } else {
                    Ok(n)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhaustion_is_transient_error() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry_transient("test_op", &fast_policy(3), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(CrmError::Status {
                    status: 502,
                    body: String::new(),
                })
            }
        })
        .await;

        match result {
            Err(CrmError::Transient { status, attempts }) => {
                assert_eq!(status, 502);
                assert_eq!(attempts, 3);
            }
            other => panic!("expected Transient, got {:?}", other),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_not_retried() {
        let calls = AtomicU32::new(0);
        let result: Result<(), _> = retry_transient("test_op", &fast_policy(5), || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err(CrmError::Status {
                    status: 401,
                    body: "Unauthorized".to_string(),
                })
            }
        })
        .await;

        assert!(matches!(result, Err(CrmError::Status { status: 401, .. })));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_backoff_is_capped() {
        let policy = RetryPolicy {
            max_attempts: 10,
            initial_backoff: Duration::from_millis(500),
            max_backoff: Duration::from_millis(2000),
        };

        let first = policy.backoff(1);
        assert!(first >= Duration::from_millis(500) && first <= Duration::from_millis(625));

        let late = policy.backoff(9);
        assert!(late >= Duration::from_millis(2000) && late <= Duration::from_millis(2500));
    }
}
