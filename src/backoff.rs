//! Backoff strategies for retry scheduling.
//!
//! Attempt semantics: attempt `0` is the initial call (no delay); retries
//! start at attempt `1`. The exponential strategy computes
//! `base * factor^(attempt - 1)`, optionally capped by `with_max`; all
//! strategies saturate at [`MAX_BACKOFF`] so large attempt numbers never
//! overflow.
//!
//! ```rust
//! use skein::Backoff;
//! use std::time::Duration;
//!
//! let backoff = Backoff::exponential_with_factor(Duration::from_millis(10), 2.0)
//!     .unwrap()
//!     .with_max(Duration::from_millis(25))
//!     .unwrap();
//! assert_eq!(backoff.delay(1), Duration::from_millis(10));
//! assert_eq!(backoff.delay(2), Duration::from_millis(20));
//! assert_eq!(backoff.delay(3), Duration::from_millis(25)); // capped
//! ```

use std::time::Duration;
use thiserror::Error;

/// Delay ceiling applied when calculations overflow or grow unbounded (1 day).
pub const MAX_BACKOFF: Duration = Duration::from_secs(24 * 60 * 60);

/// Errors returned by backoff configuration.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BackoffError {
    /// `with_max` only applies to the growing strategies.
    #[error("with_max is only valid for linear or exponential backoff")]
    ConstantDoesNotSupportMax,
    /// The cap must be a positive duration.
    #[error("max must be greater than zero")]
    MaxMustBePositive,
    /// The cap must not undercut the base delay.
    #[error("max ({max:?}) must be >= base ({base:?})")]
    MaxLessThanBase { base: Duration, max: Duration },
    /// Exponential growth requires a factor of at least 1.
    #[error("exponential factor must be >= 1.0 (got {0})")]
    FactorBelowOne(f64),
}

/// Delay strategy between retry attempts.
#[derive(Debug, Clone, PartialEq)]
pub enum Backoff {
    /// The same delay before every retry.
    Constant { delay: Duration },
    /// `base * attempt`, optionally capped.
    Linear { base: Duration, max: Option<Duration> },
    /// `base * factor^(attempt - 1)`, optionally capped.
    Exponential { base: Duration, factor: f64, max: Option<Duration> },
}

impl Backoff {
    /// Constant delay strategy.
    pub fn constant(delay: Duration) -> Self {
        Self::Constant { delay }
    }

    /// Linear growth strategy.
    pub fn linear(base: Duration) -> Self {
        Self::Linear { base, max: None }
    }

    /// Doubling exponential strategy.
    pub fn exponential(base: Duration) -> Self {
        Self::Exponential { base, factor: 2.0, max: None }
    }

    /// Exponential strategy with an explicit growth factor (>= 1).
    pub fn exponential_with_factor(base: Duration, factor: f64) -> Result<Self, BackoffError> {
        if !(factor >= 1.0) {
            return Err(BackoffError::FactorBelowOne(factor));
        }
        Ok(Self::Exponential { base, factor, max: None })
    }

    /// Cap the delay of a growing strategy. Rejects `Constant`, a zero cap,
    /// and a cap below the base.
    pub fn with_max(mut self, cap: Duration) -> Result<Self, BackoffError> {
        if cap.is_zero() {
            return Err(BackoffError::MaxMustBePositive);
        }
        match &mut self {
            Self::Constant { .. } => return Err(BackoffError::ConstantDoesNotSupportMax),
            Self::Linear { base, max } | Self::Exponential { base, max, .. } => {
                if cap < *base {
                    return Err(BackoffError::MaxLessThanBase { base: *base, max: cap });
                }
                *max = Some(cap);
            }
        }
        Ok(self)
    }

    /// Delay before the given attempt (0-based; attempt `0` is the initial
    /// call and has no delay).
    pub fn delay(&self, attempt: usize) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        match self {
            Self::Constant { delay } => *delay,
            Self::Linear { base, max } => {
                let attempt = u32::try_from(attempt).unwrap_or(u32::MAX);
                let raw = base.checked_mul(attempt).unwrap_or(MAX_BACKOFF);
                cap(raw, *max)
            }
            Self::Exponential { base, factor, max } => {
                let exponent = attempt.saturating_sub(1).min(i32::MAX as usize) as i32;
                let secs = base.as_secs_f64() * factor.powi(exponent);
                let raw = if secs.is_finite() && secs < MAX_BACKOFF.as_secs_f64() {
                    Duration::from_secs_f64(secs)
                } else {
                    MAX_BACKOFF
                };
                cap(raw, *max)
            }
        }
    }
}

fn cap(delay: Duration, max: Option<Duration>) -> Duration {
    let capped = max.map_or(delay, |m| delay.min(m));
    capped.min(MAX_BACKOFF)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn constant_returns_same_delay() {
        let backoff = Backoff::constant(Duration::from_secs(1));
        assert_eq!(backoff.delay(0), Duration::ZERO);
        assert_eq!(backoff.delay(1), Duration::from_secs(1));
        assert_eq!(backoff.delay(100), Duration::from_secs(1));
    }

    #[test]
    fn linear_grows_by_attempt() {
        let backoff = Backoff::linear(Duration::from_millis(100));
        assert_eq!(backoff.delay(1), Duration::from_millis(100));
        assert_eq!(backoff.delay(3), Duration::from_millis(300));
    }

    #[test]
    fn exponential_doubles_by_default() {
        let backoff = Backoff::exponential(Duration::from_millis(100));
        assert_eq!(backoff.delay(1), Duration::from_millis(100));
        assert_eq!(backoff.delay(2), Duration::from_millis(200));
        assert_eq!(backoff.delay(3), Duration::from_millis(400));
        assert_eq!(backoff.delay(4), Duration::from_millis(800));
    }

    #[test]
    fn exponential_honors_custom_factor() {
        let backoff =
            Backoff::exponential_with_factor(Duration::from_millis(10), 3.0).unwrap();
        assert_eq!(backoff.delay(1), Duration::from_millis(10));
        assert_eq!(backoff.delay(2), Duration::from_millis(30));
        assert_eq!(backoff.delay(3), Duration::from_millis(90));
    }

    #[test]
    fn factor_below_one_is_rejected() {
        let err = Backoff::exponential_with_factor(Duration::from_millis(10), 0.5).unwrap_err();
        assert_eq!(err, BackoffError::FactorBelowOne(0.5));
        let err = Backoff::exponential_with_factor(Duration::from_millis(10), f64::NAN)
            .unwrap_err();
        assert!(matches!(err, BackoffError::FactorBelowOne(_)));
    }

    #[test]
    fn with_max_caps_growth() {
        let backoff = Backoff::exponential(Duration::from_millis(100))
            .with_max(Duration::from_secs(1))
            .unwrap();
        assert_eq!(backoff.delay(4), Duration::from_millis(800));
        assert_eq!(backoff.delay(5), Duration::from_secs(1));
        assert_eq!(backoff.delay(10), Duration::from_secs(1));
    }

    #[test]
    fn with_max_validation() {
        assert!(matches!(
            Backoff::constant(Duration::from_secs(5)).with_max(Duration::from_secs(1)),
            Err(BackoffError::ConstantDoesNotSupportMax)
        ));
        assert!(matches!(
            Backoff::linear(Duration::from_secs(1)).with_max(Duration::ZERO),
            Err(BackoffError::MaxMustBePositive)
        ));
        assert!(matches!(
            Backoff::linear(Duration::from_secs(100)).with_max(Duration::from_secs(50)),
            Err(BackoffError::MaxLessThanBase { .. })
        ));
    }

    #[test]
    fn huge_attempts_saturate() {
        let backoff = Backoff::exponential(Duration::from_secs(1));
        assert_eq!(backoff.delay(1_000_000_000), MAX_BACKOFF);

        let backoff = Backoff::linear(Duration::from_secs(u64::MAX / 2));
        assert_eq!(backoff.delay(1_000_000_000), MAX_BACKOFF);
    }

    #[test]
    fn zero_base_stays_zero() {
        assert_eq!(Backoff::linear(Duration::ZERO).delay(5), Duration::ZERO);
        assert_eq!(Backoff::exponential(Duration::ZERO).delay(3), Duration::ZERO);
    }
}
