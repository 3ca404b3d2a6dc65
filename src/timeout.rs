//! Timeout policy for asynchronous evaluation.
//!
//! Races an operation against the tokio timer. On expiry the wrapper stops
//! waiting and rejects with a timeout-classified error; the raced future is
//! dropped, never forcibly aborted beyond that — cancellation here is
//! cooperative, as everywhere in this crate.

use crate::error::EvalError;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio::time::Instant;

/// Upper bound on configurable timeouts (1 day).
pub const MAX_TIMEOUT: Duration = Duration::from_secs(24 * 60 * 60);

/// Errors produced while configuring a timeout.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TimeoutConfigError {
    #[error("timeout duration must be non-zero")]
    Zero,
    #[error("timeout duration must be at most {MAX_TIMEOUT:?}")]
    TooLarge,
}

/// A time budget for one evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeoutPolicy {
    limit: Duration,
}

impl TimeoutPolicy {
    /// Validate and create a policy.
    pub fn new(limit: Duration) -> Result<Self, TimeoutConfigError> {
        if limit.is_zero() {
            return Err(TimeoutConfigError::Zero);
        }
        if limit > MAX_TIMEOUT {
            return Err(TimeoutConfigError::TooLarge);
        }
        Ok(Self { limit })
    }

    /// The configured budget.
    pub fn limit(&self) -> Duration {
        self.limit
    }

    /// Run `operation` under the budget.
    pub async fn execute<T, E, Fut, Op>(&self, operation: Op) -> Result<T, EvalError<E>>
    where
        Fut: Future<Output = Result<T, EvalError<E>>> + Send,
        Op: FnOnce() -> Fut + Send,
    {
        let start = Instant::now();
        match tokio::time::timeout(self.limit, operation()).await {
            Ok(result) => result,
            Err(_) => {
                let elapsed = start.elapsed();
                tracing::warn!(?elapsed, limit = ?self.limit, "evaluation timed out");
                Err(EvalError::Timeout { elapsed, limit: self.limit })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::{Arc, Mutex};
    use tracing_subscriber::fmt::writer::BoxMakeWriter;
    use tracing_subscriber::fmt::MakeWriter;

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct TestError;

    impl std::fmt::Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "test error")
        }
    }

    impl std::error::Error for TestError {}

    #[test]
    fn validates_bounds() {
        assert!(matches!(TimeoutPolicy::new(Duration::ZERO), Err(TimeoutConfigError::Zero)));
        assert!(matches!(
            TimeoutPolicy::new(MAX_TIMEOUT + Duration::from_secs(1)),
            Err(TimeoutConfigError::TooLarge)
        ));
        assert!(TimeoutPolicy::new(Duration::from_secs(1)).is_ok());
    }

    #[tokio::test]
    async fn fast_operation_passes_through() {
        let policy = TimeoutPolicy::new(Duration::from_millis(100)).unwrap();
        let result = policy
            .execute(|| async {
                tokio::time::sleep(Duration::from_millis(5)).await;
                Ok::<_, EvalError<TestError>>(42)
            })
            .await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn slow_operation_times_out_with_details() {
        let policy = TimeoutPolicy::new(Duration::from_millis(30)).unwrap();
        let result = policy
            .execute(|| async {
                tokio::time::sleep(Duration::from_millis(500)).await;
                Ok::<_, EvalError<TestError>>(42)
            })
            .await;

        match result.unwrap_err() {
            EvalError::Timeout { elapsed, limit } => {
                assert_eq!(limit, Duration::from_millis(30));
                assert!(elapsed >= limit);
            }
            other => panic!("expected timeout, got {:?}", other),
        }
    }

    #[derive(Clone)]
    struct SharedWriter(Arc<Mutex<Vec<u8>>>);

    impl<'a> MakeWriter<'a> for SharedWriter {
        type Writer = SharedGuard;
        fn make_writer(&'a self) -> Self::Writer {
            SharedGuard(self.0.clone())
        }
    }

    struct SharedGuard(Arc<Mutex<Vec<u8>>>);
    impl std::io::Write for SharedGuard {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            let mut guard = self.0.lock().unwrap();
            guard.extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn expiry_warns_with_elapsed_and_limit() {
        let buffer = Arc::new(Mutex::new(Vec::new()));
        let writer = SharedWriter(buffer.clone());
        let subscriber = tracing_subscriber::fmt()
            .with_writer(BoxMakeWriter::new(writer))
            .with_target(true)
            .without_time()
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let policy = TimeoutPolicy::new(Duration::from_millis(10)).unwrap();
        let result: Result<i32, _> = policy
            .execute(|| async {
                tokio::time::sleep(Duration::from_millis(200)).await;
                Ok::<_, EvalError<TestError>>(42)
            })
            .await;
        assert!(matches!(result, Err(EvalError::Timeout { .. })));

        let logs = String::from_utf8(buffer.lock().unwrap().clone()).unwrap();
        assert!(
            logs.contains("evaluation timed out"),
            "warning should be emitted on expiry"
        );
    }

    #[tokio::test]
    async fn operation_errors_propagate_unwrapped() {
        let policy = TimeoutPolicy::new(Duration::from_secs(1)).unwrap();
        let result: Result<(), _> =
            policy.execute(|| async { Err(EvalError::Inner(TestError)) }).await;
        assert!(matches!(result.unwrap_err(), EvalError::Inner(TestError)));
    }
}
