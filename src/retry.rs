//! Retry scheduling with backoff and cooperative cancellation.
//!
//! Semantics:
//! - `max_attempts` counts total attempts (initial try + retries).
//! - Only `EvalError::Inner(E)` failures matching the policy's matcher are
//!   retried; anything else returns immediately.
//! - The delay before retry `n` is `backoff.delay(n)`, optionally jittered;
//!   delays are applied through the `Sleeper` so tests stay deterministic.
//! - After exhausting attempts the *underlying last error* surfaces, not an
//!   exhausted wrapper; intermediate failures are discarded by design.
//! - Each attempt is a fresh iteration of a loop, never direct recursion,
//!   so unbounded attempt counts are stack-safe.
//! - A [`StopToken`] halts the loop cooperatively: once set, the next
//!   scheduling checkpoint (including one sitting inside a backoff sleep)
//!   rejects with `EvalError::Stopped` without invoking the operation
//!   again. Work already in flight is never preempted.

use crate::error::EvalError;
use crate::matcher::{ErrorDetails, ErrorMatcher};
use crate::{Backoff, Jitter, Sleeper, TokioSleeper};
use std::fmt;
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::Notify;

/// Cooperative cancellation flag: single writer, many readers.
///
/// Cloning shares the flag. Setting it never preempts in-flight work; it
/// only stops wrappers from scheduling further waiting or retrying.
#[derive(Clone, Default)]
pub struct StopToken {
    stopped: Arc<AtomicBool>,
    notify: Arc<Notify>,
}

impl fmt::Debug for StopToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StopToken").field("stopped", &self.is_stopped()).finish()
    }
}

impl StopToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the flag and wake every waiting checkpoint.
    pub fn stop(&self) {
        self.stopped.store(true, Ordering::SeqCst);
        self.notify.notify_waiters();
    }

    /// Poll the flag.
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Suspend until the flag is set (returns immediately if it already is).
    pub async fn stopped(&self) {
        while !self.is_stopped() {
            let notified = self.notify.notified();
            // re-check after registering so a concurrent stop() is not lost
            if self.is_stopped() {
                break;
            }
            notified.await;
        }
    }
}

/// Errors produced while building a retry policy.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum RetryBuildError {
    /// `max_attempts` must be > 0.
    #[error("max_attempts must be > 0")]
    ZeroAttempts,
    /// Invalid backoff configuration.
    #[error(transparent)]
    Backoff(#[from] crate::backoff::BackoffError),
}

/// Retry policy combining attempt budget, backoff, jitter, matcher, and
/// sleeper.
pub struct RetryPolicy<E> {
    max_attempts: usize,
    backoff: Backoff,
    jitter: Jitter,
    matcher: ErrorMatcher<E>,
    sleeper: Arc<dyn Sleeper>,
}

impl<E> Clone for RetryPolicy<E> {
    fn clone(&self) -> Self {
        Self {
            max_attempts: self.max_attempts,
            backoff: self.backoff.clone(),
            jitter: self.jitter,
            matcher: self.matcher.clone(),
            sleeper: self.sleeper.clone(),
        }
    }
}

impl<E> fmt::Debug for RetryPolicy<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RetryPolicy")
            .field("max_attempts", &self.max_attempts)
            .field("backoff", &self.backoff)
            .field("jitter", &self.jitter)
            .field("matcher", &self.matcher)
            .finish()
    }
}

impl<E> RetryPolicy<E>
where
    E: ErrorDetails + fmt::Display + Send + Sync + 'static,
{
    /// Construct a builder with defaults (3 attempts, doubling exponential
    /// backoff from 1s, no jitter, retry every inner error).
    pub fn builder() -> RetryPolicyBuilder<E> {
        RetryPolicyBuilder::new()
    }

    /// The canonical retry shape: up to `max_attempts` total attempts with
    /// delay `min(base * factor^(n-1), max_delay)` before retry `n`.
    pub fn exponential(
        max_attempts: usize,
        base: Duration,
        factor: f64,
        max_delay: Duration,
    ) -> Result<Self, RetryBuildError> {
        let backoff = Backoff::exponential_with_factor(base, factor)?.with_max(max_delay)?;
        Self::builder().max_attempts(max_attempts).backoff(backoff).build()
    }

    /// Execute `operation` under this policy. `token` is polled at every
    /// scheduling checkpoint and raced against every backoff sleep.
    pub async fn execute<T, Fut, Op>(
        &self,
        token: &StopToken,
        mut operation: Op,
    ) -> Result<T, EvalError<E>>
    where
        Fut: Future<Output = Result<T, EvalError<E>>> + Send,
        Op: FnMut() -> Fut + Send,
    {
        for attempt in 1..=self.max_attempts {
            if token.is_stopped() {
                return Err(EvalError::Stopped { attempts: attempt - 1 });
            }

            match operation().await {
                Ok(value) => return Ok(value),
                Err(EvalError::Inner(err)) => {
                    if !self.matcher.matches(&err) {
                        return Err(EvalError::Inner(err));
                    }
                    if attempt >= self.max_attempts {
                        tracing::warn!(attempts = attempt, error = %err, "retry exhausted");
                        // surface the underlying last error, not a wrapper
                        return Err(EvalError::Inner(err));
                    }

                    let delay = self.jitter.apply(self.backoff.delay(attempt));
                    tracing::debug!(attempt, ?delay, error = %err, "retrying after backoff");

                    tokio::select! {
                        _ = self.sleeper.sleep(delay) => {}
                        _ = token.stopped() => {
                            return Err(EvalError::Stopped { attempts: attempt });
                        }
                    }
                }
                // Timeout/Stopped classifications from inner layers are not
                // retried
                Err(other) => return Err(other),
            }
        }

        // the loop runs at least once (max_attempts > 0 is validated) and
        // the final attempt always returns
        debug_assert!(false, "retry loop should have returned");
        unreachable!()
    }
}

/// Builder for [`RetryPolicy`].
pub struct RetryPolicyBuilder<E> {
    max_attempts: usize,
    backoff: Backoff,
    jitter: Jitter,
    matcher: ErrorMatcher<E>,
    sleeper: Arc<dyn Sleeper>,
}

impl<E> RetryPolicyBuilder<E>
where
    E: ErrorDetails + fmt::Display + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            max_attempts: 3,
            backoff: Backoff::exponential(Duration::from_secs(1)),
            jitter: Jitter::None,
            matcher: ErrorMatcher::Any,
            sleeper: Arc::new(TokioSleeper),
        }
    }

    /// Total attempts (initial + retries). Must be > 0.
    pub fn max_attempts(mut self, attempts: usize) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Unbounded retrying (practically: `usize::MAX` attempts).
    pub fn unbounded(mut self) -> Self {
        self.max_attempts = usize::MAX;
        self
    }

    pub fn backoff(mut self, backoff: Backoff) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn with_jitter(mut self, jitter: Jitter) -> Self {
        self.jitter = jitter;
        self
    }

    /// Only errors matching `matcher` are retried.
    pub fn matching(mut self, matcher: ErrorMatcher<E>) -> Self {
        self.matcher = matcher;
        self
    }

    pub fn with_sleeper<S>(mut self, sleeper: S) -> Self
    where
        S: Sleeper + 'static,
    {
        self.sleeper = Arc::new(sleeper);
        self
    }

    pub fn build(self) -> Result<RetryPolicy<E>, RetryBuildError> {
        if self.max_attempts == 0 {
            return Err(RetryBuildError::ZeroAttempts);
        }
        Ok(RetryPolicy {
            max_attempts: self.max_attempts,
            backoff: self.backoff,
            jitter: self.jitter,
            matcher: self.matcher,
            sleeper: self.sleeper,
        })
    }
}

impl<E> Default for RetryPolicyBuilder<E>
where
    E: ErrorDetails + fmt::Display + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}
