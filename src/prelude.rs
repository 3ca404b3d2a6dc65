//! Convenient re-exports for common Skein types.
pub use crate::{
    async_func::{AsyncFunc, GateMode},
    async_seq::AsyncSeq,
    backoff::{Backoff, BackoffError, MAX_BACKOFF},
    chain::PathChain,
    error::{Eval, EvalError},
    event::{Emitter, EventGate, EventSource},
    func::LazyFunc,
    jitter::Jitter,
    matcher::{ErrorDetails, ErrorMatcher},
    retry::{RetryBuildError, RetryPolicy, RetryPolicyBuilder, StopToken},
    scope::{Lookup, Scope},
    seq::{LazySeq, SliceMode},
    sleeper::{InstantSleeper, Sleeper, TokioSleeper, TrackingSleeper},
    timeout::{TimeoutConfigError, TimeoutPolicy, MAX_TIMEOUT},
};
