//! Error types shared by the synchronous and asynchronous algebras.
//!
//! An absent result is *not* an error: combinators that can decline to
//! produce a value (restrict, fallback) return `Ok(None)`. Errors proper are
//! classified so callers can discriminate "did not finish" (`Timeout`),
//! "was cancelled" (`Stopped`), and "finished badly" (`Inner`).

use std::time::Duration;
use thiserror::Error;

/// The outcome of evaluating a lazy function: a value, an absent result,
/// or a classified error.
pub type Eval<T, E> = Result<Option<T>, EvalError<E>>;

/// Unified error type for function evaluation and resilience combinators.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum EvalError<E> {
    /// The evaluation exceeded its time budget.
    #[error("evaluation timed out after {elapsed:?} (limit: {limit:?})")]
    Timeout {
        /// Time actually spent before the race was abandoned.
        elapsed: Duration,
        /// Configured budget.
        limit: Duration,
    },

    /// A retry or gated loop was halted by its stop token.
    #[error("evaluation stopped after {attempts} attempt(s)")]
    Stopped {
        /// Attempts completed before the token was observed set.
        attempts: usize,
    },

    /// The underlying operation failed; passed through untouched unless a
    /// matching fallback intercepts it.
    #[error(transparent)]
    Inner(E),
}

impl<E> EvalError<E> {
    /// Check whether this error is a timeout.
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }

    /// Check whether this error came from a stop token.
    pub fn is_stopped(&self) -> bool {
        matches!(self, Self::Stopped { .. })
    }

    /// Check whether this error wraps an underlying failure.
    pub fn is_inner(&self) -> bool {
        matches!(self, Self::Inner(_))
    }

    /// Borrow the underlying error if present.
    pub fn as_inner(&self) -> Option<&E> {
        match self {
            Self::Inner(e) => Some(e),
            _ => None,
        }
    }

    /// Extract the underlying error if this is an `Inner` variant.
    pub fn into_inner(self) -> Option<E> {
        match self {
            Self::Inner(e) => Some(e),
            _ => None,
        }
    }

    /// Access timeout details as `(elapsed, limit)` if present.
    pub fn timeout_details(&self) -> Option<(Duration, Duration)> {
        match self {
            Self::Timeout { elapsed, limit } => Some((*elapsed, *limit)),
            _ => None,
        }
    }

    /// Map the inner error type, preserving the other variants unchanged.
    pub fn map_inner<F, E2>(self, f: F) -> EvalError<E2>
    where
        F: FnOnce(E) -> E2,
    {
        match self {
            Self::Timeout { elapsed, limit } => EvalError::Timeout { elapsed, limit },
            Self::Stopped { attempts } => EvalError::Stopped { attempts },
            Self::Inner(e) => EvalError::Inner(f(e)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fmt;

    #[derive(Debug, Clone, PartialEq, Eq)]
    struct DummyError(&'static str);

    impl fmt::Display for DummyError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "{}", self.0)
        }
    }

    impl std::error::Error for DummyError {}

    #[test]
    fn timeout_display_includes_durations() {
        let err: EvalError<DummyError> = EvalError::Timeout {
            elapsed: Duration::from_millis(5100),
            limit: Duration::from_secs(5),
        };
        let msg = format!("{}", err);
        assert!(msg.contains("timed out"));
        assert!(msg.contains("5.1"));
    }

    #[test]
    fn stopped_display_includes_attempts() {
        let err: EvalError<DummyError> = EvalError::Stopped { attempts: 4 };
        let msg = format!("{}", err);
        assert!(msg.contains("stopped"));
        assert!(msg.contains('4'));
    }

    #[test]
    fn inner_display_is_transparent() {
        let err = EvalError::Inner(DummyError("boom"));
        assert_eq!(format!("{}", err), "boom");
    }

    #[test]
    fn predicates_cover_all_variants() {
        let timeout: EvalError<DummyError> = EvalError::Timeout {
            elapsed: Duration::from_secs(1),
            limit: Duration::from_secs(2),
        };
        assert!(timeout.is_timeout());
        assert!(!timeout.is_stopped());
        assert!(!timeout.is_inner());

        let stopped: EvalError<DummyError> = EvalError::Stopped { attempts: 1 };
        assert!(stopped.is_stopped());

        let inner = EvalError::Inner(DummyError("x"));
        assert!(inner.is_inner());
        assert_eq!(inner.as_inner().unwrap().0, "x");
        assert_eq!(inner.into_inner().unwrap().0, "x");
    }

    #[test]
    fn timeout_details_accessor() {
        let err: EvalError<DummyError> = EvalError::Timeout {
            elapsed: Duration::from_millis(10),
            limit: Duration::from_millis(20),
        };
        assert_eq!(
            err.timeout_details(),
            Some((Duration::from_millis(10), Duration::from_millis(20)))
        );
        assert!(EvalError::Inner(DummyError("x")).timeout_details().is_none());
    }

    #[test]
    fn map_inner_preserves_classification() {
        let err: EvalError<DummyError> = EvalError::Stopped { attempts: 2 };
        let mapped: EvalError<String> = err.map_inner(|e| e.0.to_string());
        assert!(mapped.is_stopped());

        let inner: EvalError<DummyError> = EvalError::Inner(DummyError("boom"));
        let mapped = inner.map_inner(|e| e.0.to_string());
        assert_eq!(mapped.into_inner().unwrap(), "boom");
    }
}
