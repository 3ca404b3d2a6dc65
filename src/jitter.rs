//! Jitter strategies for randomizing retry delays.
//!
//! `None` keeps the backoff formula exact (the default); `Full` draws
//! uniformly from `[0, delay]` and `Equal` from `[delay/2, delay]`, both
//! useful to spread load when many callers retry in lockstep. Millisecond
//! conversions saturate so very large durations never panic.

use rand::{rng, Rng};
use std::time::Duration;

/// Randomization applied on top of a computed backoff delay.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Jitter {
    /// Use the exact backoff delay.
    #[default]
    None,
    /// Uniform in `[0, delay]`.
    Full,
    /// Uniform in `[delay/2, delay]`; keeps a floor while adding spread.
    Equal,
}

impl Jitter {
    /// Randomize `delay` with the thread-local RNG.
    pub fn apply(&self, delay: Duration) -> Duration {
        self.apply_with_rng(delay, &mut rng())
    }

    /// Randomize `delay` with a caller-supplied RNG (deterministic tests).
    pub fn apply_with_rng<R: Rng>(&self, delay: Duration, rng: &mut R) -> Duration {
        let millis: u64 = delay.as_millis().try_into().unwrap_or(u64::MAX);
        match self {
            Jitter::None => delay,
            Jitter::Full => {
                if millis == 0 {
                    return Duration::ZERO;
                }
                Duration::from_millis(rng.random_range(0..=millis))
            }
            Jitter::Equal => {
                if millis == 0 {
                    return Duration::ZERO;
                }
                Duration::from_millis(rng.random_range(millis / 2..=millis))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn none_returns_exact_delay() {
        assert_eq!(Jitter::None.apply(Duration::from_secs(1)), Duration::from_secs(1));
    }

    #[test]
    fn full_stays_within_bounds() {
        let delay = Duration::from_secs(1);
        for _ in 0..100 {
            let jittered = Jitter::Full.apply(delay);
            assert!(jittered <= delay);
        }
    }

    #[test]
    fn equal_keeps_a_floor() {
        let delay = Duration::from_secs(1);
        for _ in 0..100 {
            let jittered = Jitter::Equal.apply(delay);
            assert!(jittered >= Duration::from_millis(500));
            assert!(jittered <= delay);
        }
    }

    #[test]
    fn zero_delay_stays_zero() {
        assert_eq!(Jitter::Full.apply(Duration::ZERO), Duration::ZERO);
        assert_eq!(Jitter::Equal.apply(Duration::ZERO), Duration::ZERO);
    }

    #[test]
    fn deterministic_with_seeded_rng() {
        let mut rng = StdRng::seed_from_u64(42);
        let a = Jitter::Full.apply_with_rng(Duration::from_millis(1000), &mut rng);
        let mut rng = StdRng::seed_from_u64(42);
        let b = Jitter::Full.apply_with_rng(Duration::from_millis(1000), &mut rng);
        assert_eq!(a, b);
    }

    #[test]
    fn saturates_huge_durations() {
        let huge = Duration::MAX;
        let mut rng = StdRng::seed_from_u64(7);
        let jittered = Jitter::Full.apply_with_rng(huge, &mut rng);
        assert!(jittered <= Duration::from_millis(u64::MAX));
    }
}
