#![forbid(unsafe_code)]
#![deny(warnings)]
#![cfg_attr(not(test), deny(clippy::all))]

//! # Skein
//!
//! A fluent combinator algebra over four lazy carriers: sequences, functions,
//! and their asynchronous counterparts.
//!
//! ## Features
//!
//! - **Lazy sequences** (`LazySeq`, `AsyncSeq`): re-entrant, possibly
//!   infinite, with restrict/map/zip/cartesian/slice/cycle combinators
//! - **Lazy functions** (`LazyFunc`, `AsyncFunc`): restriction, mapping,
//!   fallback routing, parallel evaluation, argument adaptation
//! - **Combinatorial search** via persistent `PathChain` prefixes with
//!   subtree-pruning early restriction
//! - **Resilience combinators** on async functions: timeouts, retry with
//!   backoff and jitter, event-gated execution, cooperative stopping
//! - **Order-preserving bridging** from synchronous sequences of pending
//!   values into asynchronous streams
//!
//! ## Quick Start
//!
//! ```rust
//! use skein::{LazyFunc, LazySeq};
//!
//! let evens = LazySeq::<u64>::naturals()
//!     .restrict(|n, _| n % 2 == 0)
//!     .map(|n, _| n * n);
//! assert_eq!(evens.take(3), vec![0, 4, 16]);
//!
//! let half: LazyFunc<u64, u64, std::convert::Infallible> =
//!     LazyFunc::partial(|n| (n % 2 == 0).then(|| n / 2));
//! assert_eq!(half.eval(&10), Ok(Some(5)));
//! assert_eq!(half.eval(&7), Ok(None));
//! ```

pub mod async_func;
pub mod async_seq;
pub mod backoff;
pub mod chain;
pub mod error;
pub mod event;
pub mod func;
pub mod jitter;
pub mod matcher;
pub mod prelude;
pub mod retry;
pub mod scope;
pub mod seq;
pub mod sleeper;
pub mod timeout;

// Re-exports
pub use async_func::{AsyncFunc, GateMode};
pub use async_seq::AsyncSeq;
pub use backoff::Backoff;
pub use chain::PathChain;
pub use error::{Eval, EvalError};
pub use event::{Emitter, EventGate, EventSource};
pub use func::LazyFunc;
pub use jitter::Jitter;
pub use matcher::{ErrorDetails, ErrorMatcher};
pub use retry::{RetryPolicy, RetryPolicyBuilder, StopToken};
pub use scope::Scope;
pub use seq::{LazySeq, SliceMode};
pub use sleeper::{InstantSleeper, Sleeper, TokioSleeper, TrackingSleeper};
pub use timeout::TimeoutPolicy;
