//! Bounded fixed-delay retry for data-store calls.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;

use metrics::counter;
use tokio::sync::Semaphore;
use tracing::warn;

use super::repos::RepoError;

const DEFAULT_MAX_RETRIES: u32 = 3;
const DEFAULT_DELAY: Duration = Duration::from_millis(1000);

/// Errors that may succeed when the same call is issued again.
pub trait Transient {
    fn is_transient(&self) -> bool;
}

impl Transient for RepoError {
    fn is_transient(&self) -> bool {
        RepoError::is_transient(self)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: DEFAULT_MAX_RETRIES,
            delay: DEFAULT_DELAY,
        }
    }
}

impl From<&crate::config::RetrySettings> for RetryPolicy {
    fn from(settings: &crate::config::RetrySettings) -> Self {
        Self {
            max_retries: settings.max_retries,
            delay: settings.delay,
        }
    }
}

/// Runs queries under a [`RetryPolicy`].
///
/// Each caller performs its own attempts. Only the back-off waits pass
/// through a single permit, so concurrent failing callers wait one after
/// another instead of all hammering a recovering backend at once.
pub struct RetryExecutor {
    policy: RetryPolicy,
    wait_gate: Semaphore,
}

impl RetryExecutor {
    pub fn new(policy: RetryPolicy) -> Self {
        Self {
            policy,
            wait_gate: Semaphore::new(1),
        }
    }

    pub async fn execute<T, E, F, Fut>(&self, operation: &'static str, query: F) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Transient + Display,
    {
        self.execute_with_retries(operation, self.policy.max_retries, query)
            .await
    }

    /// Invoke `query`, retrying transient failures up to `retries_remaining` times.
    ///
    /// The last error is returned once retries run out; non-transient errors
    /// are returned on first sight.
    pub async fn execute_with_retries<T, E, F, Fut>(
        &self,
        operation: &'static str,
        retries_remaining: u32,
        mut query: F,
    ) -> Result<T, E>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, E>>,
        E: Transient + Display,
    {
        let mut remaining = retries_remaining;
        let mut attempt: u32 = 1;

        loop {
            let err = match query().await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            if !err.is_transient() {
                return Err(err);
            }

            if remaining == 0 {
                warn!(
                    target = "uidir::retry",
                    operation,
                    attempts = attempt,
                    error = %err,
                    "retries exhausted"
                );
                counter!("uidir_retry_exhausted_total", "operation" => operation).increment(1);
                return Err(err);
            }

            remaining -= 1;
            warn!(
                target = "uidir::retry",
                operation,
                attempt,
                remaining,
                delay_ms = self.policy.delay.as_millis() as u64,
                error = %err,
                "transient failure, retrying"
            );
            counter!("uidir_retry_attempt_total", "operation" => operation).increment(1);

            self.wait().await;
            attempt += 1;
        }
    }

    async fn wait(&self) {
        let _permit = self.wait_gate.acquire().await.ok();
        tokio::time::sleep(self.policy.delay).await;
    }
}

impl Default for RetryExecutor {
    fn default() -> Self {
        Self::new(RetryPolicy::default())
    }
}

#[cfg(test)]
mod tests {
    use std::fmt;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use tokio::time::Instant;

    use super::*;

    #[derive(Debug, PartialEq)]
    enum FakeError {
        Network,
        BadInput,
    }

    impl fmt::Display for FakeError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{self:?}")
        }
    }

    impl Transient for FakeError {
        fn is_transient(&self) -> bool {
            matches!(self, FakeError::Network)
        }
    }

    #[tokio::test(start_paused = true)]
    async fn succeeds_after_two_transient_failures() {
        let executor = RetryExecutor::default();
        let calls = AtomicUsize::new(0);

        let result = executor
            .execute_with_retries("test", 3, || {
                let call = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if call < 2 {
                        Err(FakeError::Network)
                    } else {
                        Ok("rows")
                    }
                }
            })
            .await;

        assert_eq!(result, Ok("rows"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_retries_surface_last_error() {
        let executor = RetryExecutor::default();
        let calls = AtomicUsize::new(0);
        let started = Instant::now();

        let result: Result<(), _> = executor
            .execute_with_retries("test", 2, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(FakeError::Network) }
            })
            .await;

        assert_eq!(result, Err(FakeError::Network));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert!(started.elapsed() >= Duration::from_millis(2000));
        assert!(started.elapsed() < Duration::from_millis(2100));
    }

    #[tokio::test(start_paused = true)]
    async fn non_transient_errors_are_not_retried() {
        let executor = RetryExecutor::default();
        let calls = AtomicUsize::new(0);

        let result: Result<(), _> = executor
            .execute("test", || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(FakeError::BadInput) }
            })
            .await;

        assert_eq!(result, Err(FakeError::BadInput));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn concurrent_waits_are_serialized() {
        let executor = Arc::new(RetryExecutor::new(RetryPolicy {
            max_retries: 1,
            delay: Duration::from_secs(1),
        }));
        let started = Instant::now();

        let run = |executor: Arc<RetryExecutor>| async move {
            let calls = AtomicUsize::new(0);
            executor
                .execute("test", || {
                    let call = calls.fetch_add(1, Ordering::SeqCst);
                    async move {
                        if call == 0 {
                            Err(FakeError::Network)
                        } else {
                            Ok(())
                        }
                    }
                })
                .await
        };

        let (first, second) = tokio::join!(run(executor.clone()), run(executor.clone()));
        assert!(first.is_ok() && second.is_ok());
        assert!(started.elapsed() >= Duration::from_secs(2));
    }
}
