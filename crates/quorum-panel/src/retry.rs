//! Bounded retry around a single backend call.

use std::time::Duration;
use tracing::{debug, warn};

use crate::backend::{BackendInvoker, Completion, InvocationRequest};
use crate::error::RetryError;

/// Fixed-delay retry policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first. Treated as at least 1.
    pub max_attempts: u32,
    /// Pause between attempts.
    pub delay: Duration,
}

impl RetryPolicy {
    #[must_use]
    pub const fn new(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            delay,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(1000))
    }
}

/// Invokes `backend`, retrying transient failures up to the policy limit.
///
/// Permanent errors return immediately. The delay is applied between
/// attempts only, never after the last one.
pub async fn invoke_with_retry(
    backend: &dyn BackendInvoker,
    request: &InvocationRequest,
    policy: &RetryPolicy,
) -> Result<Completion, RetryError> {
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 0;
    loop {
        attempt += 1;
        match backend.invoke(request).await {
            Ok(completion) => {
                debug!(
                    persona = %request.persona,
                    backend = %completion.backend_used,
                    attempt,
                    "backend call succeeded"
                );
                return Ok(completion);
            }
            Err(err) if err.is_transient() && attempt < max_attempts => {
                warn!(
                    persona = %request.persona,
                    backend = %request.backend,
                    attempt,
                    error = %err,
                    "backend call failed, retrying"
                );
                tokio::time::sleep(policy.delay).await;
            }
            Err(err) => {
                warn!(
                    persona = %request.persona,
                    backend = %request.backend,
                    attempt,
                    error = %err,
                    "backend call gave up"
                );
                return Err(RetryError {
                    attempts: attempt,
                    source: err,
                });
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::SamplingParams;
    use crate::error::BackendError;
    use async_trait::async_trait;
    use quorum_registry::Complexity;
    use std::sync::atomic::{AtomicU32, Ordering};

    /// Fails with `error` for the first `failures` calls, then succeeds.
    struct Flaky {
        failures: u32,
        error: BackendError,
        calls: AtomicU32,
    }

    #[async_trait]
    impl BackendInvoker for Flaky {
        async fn invoke(&self, request: &InvocationRequest) -> Result<Completion, BackendError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            if n < self.failures {
                Err(self.error.clone())
            } else {
                Ok(Completion::new("answer", request.backend.clone()))
            }
        }
    }

    fn request() -> InvocationRequest {
        InvocationRequest {
            persona: "analyst".into(),
            backend: "m".into(),
            system_prompt: String::new(),
            user_prompt: "q".into(),
            sampling: SamplingParams::for_complexity(Complexity::Low),
        }
    }

    fn flaky(failures: u32, error: BackendError) -> Flaky {
        Flaky {
            failures,
            error,
            calls: AtomicU32::new(0),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_failures_are_retried() {
        let backend = flaky(2, BackendError::Transient("busy".into()));
        let policy = RetryPolicy::new(3, Duration::from_millis(100));
        let start = tokio::time::Instant::now();

        let out = invoke_with_retry(&backend, &request(), &policy).await.unwrap();

        assert_eq!(out.text, "answer");
        assert_eq!(backend.calls.load(Ordering::SeqCst), 3);
        assert_eq!(start.elapsed(), Duration::from_millis(200));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_reports_attempts() {
        let backend = flaky(10, BackendError::Transient("busy".into()));
        let policy = RetryPolicy::new(3, Duration::from_millis(100));

        let err = invoke_with_retry(&backend, &request(), &policy).await.unwrap_err();

        assert_eq!(err.attempts, 3);
        assert_eq!(backend.calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_permanent_error_is_not_retried() {
        let backend = flaky(10, BackendError::Permanent("bad model".into()));
        let policy = RetryPolicy::new(5, Duration::from_millis(100));

        let err = invoke_with_retry(&backend, &request(), &policy).await.unwrap_err();

        assert_eq!(err.attempts, 1);
        assert!(!err.source.is_transient());
    }

    #[tokio::test]
    async fn test_zero_attempts_still_calls_once() {
        let backend = flaky(0, BackendError::Transient("busy".into()));
        let policy = RetryPolicy::new(0, Duration::ZERO);
        assert!(invoke_with_retry(&backend, &request(), &policy).await.is_ok());
        assert_eq!(backend.calls.load(Ordering::SeqCst), 1);
    }
}
