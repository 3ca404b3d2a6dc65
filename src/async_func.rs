//! Lazy asynchronous functions and resilience combinators.
//!
//! `AsyncFunc<A, R, E>` is the asynchronous counterpart of
//! [`LazyFunc`](crate::LazyFunc): an `Arc`'d shareable definition from
//! arguments to a suspended [`Eval`]. It lifts the full synchronous algebra
//! and adds the combinators that only make sense under a runtime: deadline
//! enforcement, retry with backoff, event-gated execution, and cooperative
//! stopping.
//!
//! Arguments travel as `Arc<A>` so a single argument value can be handed to
//! several branches (retry attempts, fallback alternates, parallel legs)
//! without cloning the payload.

use crate::async_seq::AsyncSeq;
use crate::error::{Eval, EvalError};
use crate::event::EventSource;
use crate::matcher::{ErrorDetails, ErrorMatcher};
use crate::retry::{RetryPolicy, StopToken};
use crate::scope::{Lookup, Scope};
use crate::timeout::TimeoutPolicy;
use futures::future::{BoxFuture, FutureExt};
use std::fmt;
use std::future::Future;
use std::sync::Arc;

type AsyncCore<A, R, E> = Arc<dyn Fn(Arc<A>) -> BoxFuture<'static, Eval<R, E>> + Send + Sync>;

/// How an event gate relates to the wrapped computation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GateMode {
    /// Wait for a matching payload, then evaluate.
    Start,
    /// Evaluate immediately; a matching payload resolves the result absent.
    /// Stopping is cooperative: the computation's side effects already in
    /// flight are not interrupted.
    Stop,
}

/// A lazy asynchronous function from `A` to an optional `R`.
pub struct AsyncFunc<A, R, E> {
    core: AsyncCore<A, R, E>,
}

impl<A, R, E> Clone for AsyncFunc<A, R, E> {
    fn clone(&self) -> Self {
        Self { core: self.core.clone() }
    }
}

impl<A, R, E> fmt::Debug for AsyncFunc<A, R, E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AsyncFunc(..)")
    }
}

impl<A, R, E> AsyncFunc<A, R, E>
where
    A: Send + Sync + 'static,
    R: Send + 'static,
    E: Send + Sync + 'static,
{
    /// Wrap an asynchronous evaluation rule.
    pub fn new<F, Fut>(core: F) -> Self
    where
        F: Fn(Arc<A>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Eval<R, E>> + Send + 'static,
    {
        Self { core: Arc::new(move |args| core(args).boxed()) }
    }

    /// Wrap a mapping that always produces a value.
    pub fn total<F, Fut>(f: F) -> Self
    where
        F: Fn(Arc<A>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = R> + Send + 'static,
    {
        Self::new(move |args| f(args).map(|value| Ok(Some(value))))
    }

    /// Wrap a mapping that may decline to produce a value.
    pub fn partial<F, Fut>(f: F) -> Self
    where
        F: Fn(Arc<A>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Option<R>> + Send + 'static,
    {
        Self::new(move |args| f(args).map(Ok))
    }

    /// Wrap a fallible mapping; failures become `EvalError::Inner`.
    pub fn fallible<F, Fut>(f: F) -> Self
    where
        F: Fn(Arc<A>) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = Result<R, E>> + Send + 'static,
    {
        Self::new(move |args| f(args).map(|result| result.map(Some).map_err(EvalError::Inner)))
    }

    /// Lift a synchronous function; evaluation completes without suspending.
    pub fn from_sync(func: crate::func::LazyFunc<A, R, E>) -> Self {
        Self::new(move |args: Arc<A>| {
            let result = func.eval(&args);
            async move { result }
        })
    }

    /// Evaluate against `args`.
    pub async fn eval(&self, args: Arc<A>) -> Eval<R, E> {
        (self.core)(args).await
    }

    /// Evaluate only if `pred(args)` holds; otherwise return absent, or
    /// raise `on_fail` when supplied.
    pub fn restrict_input<P>(&self, pred: P, on_fail: Option<E>) -> Self
    where
        P: Fn(&A) -> bool + Send + Sync + 'static,
        E: Clone,
    {
        let core = self.core.clone();
        Self { core: Arc::new(move |args: Arc<A>| {
            if pred(&args) {
                core(args)
            } else {
                let outcome = match &on_fail {
                    Some(err) => Err(EvalError::Inner(err.clone())),
                    None => Ok(None),
                };
                async move { outcome }.boxed()
            }
        }) }
    }

    /// Check the produced value against `pred(result, args)`; a rejected
    /// value becomes absent, or `on_fail` when supplied.
    pub fn restrict_output<P>(&self, pred: P, on_fail: Option<E>) -> Self
    where
        P: Fn(&R, &A) -> bool + Send + Sync + 'static,
        E: Clone,
    {
        let core = self.core.clone();
        let pred = Arc::new(pred);
        let on_fail = Arc::new(on_fail);
        Self { core: Arc::new(move |args: Arc<A>| {
            let fut = core(args.clone());
            let pred = pred.clone();
            let on_fail = on_fail.clone();
            async move {
                match fut.await? {
                    Some(result) if pred(&result, &args) => Ok(Some(result)),
                    Some(_) => match on_fail.as_ref() {
                        Some(err) => Err(EvalError::Inner(err.clone())),
                        None => Ok(None),
                    },
                    None => Ok(None),
                }
            }
            .boxed()
        }) }
    }

    /// Transform the produced value. Absence and errors pass through.
    pub fn map<R2, F>(&self, f: F) -> AsyncFunc<A, R2, E>
    where
        R2: Send + 'static,
        F: Fn(R) -> R2 + Send + Sync + 'static,
    {
        let core = self.core.clone();
        let f = Arc::new(f);
        AsyncFunc { core: Arc::new(move |args| {
            let fut = core(args);
            let f = f.clone();
            async move { Ok(fut.await?.map(|value| f(value))) }.boxed()
        }) }
    }

    /// Route to `alt` when this function produces absent or an inner error
    /// accepted by `matcher`. Timeouts, stops, and non-matching errors
    /// propagate untouched.
    pub fn fallback(&self, alt: &Self, matcher: ErrorMatcher<E>) -> Self
    where
        E: ErrorDetails + fmt::Display,
    {
        let primary = self.core.clone();
        let alt = alt.core.clone();
        Self { core: Arc::new(move |args: Arc<A>| {
            let primary = primary(args.clone());
            let alt = alt.clone();
            let matcher = matcher.clone();
            async move {
                match primary.await {
                    Ok(Some(value)) => Ok(Some(value)),
                    Ok(None) => alt(args).await,
                    Err(EvalError::Inner(err)) if matcher.matches(&err) => alt(args).await,
                    Err(other) => Err(other),
                }
            }
            .boxed()
        }) }
    }

    /// Evaluate this function and `others` against the same arguments and
    /// collect the values in argument order. Branches are awaited one at a
    /// time, left to right; an absent branch makes the whole result absent
    /// and a failing branch short-circuits with its error.
    pub fn parallel(&self, others: &[Self]) -> AsyncFunc<A, Vec<R>, E> {
        let branches: Vec<AsyncCore<A, R, E>> = std::iter::once(self.core.clone())
            .chain(others.iter().map(|f| f.core.clone()))
            .collect();
        AsyncFunc { core: Arc::new(move |args: Arc<A>| {
            let branches = branches.clone();
            async move {
                let mut results = Vec::with_capacity(branches.len());
                for branch in &branches {
                    match branch(args.clone()).await? {
                        Some(value) => results.push(value),
                        None => return Ok(None),
                    }
                }
                Ok(Some(results))
            }
            .boxed()
        }) }
    }

    /// Enforce a per-evaluation deadline. On expiry the pending evaluation
    /// is dropped and the result is `EvalError::Timeout`.
    pub fn with_timeout(&self, policy: TimeoutPolicy) -> Self {
        let core = self.core.clone();
        Self { core: Arc::new(move |args| {
            let core = core.clone();
            async move { policy.execute(|| core(args)).await }.boxed()
        }) }
    }

    /// Re-invoke on matching inner failure per `policy`, racing every
    /// backoff delay against `token`. Resolves on the first present or
    /// absent success; exhaustion surfaces the last underlying error.
    pub fn retrying(&self, policy: RetryPolicy<E>, token: StopToken) -> Self
    where
        E: ErrorDetails + fmt::Display,
    {
        let core = self.core.clone();
        Self { core: Arc::new(move |args: Arc<A>| {
            let core = core.clone();
            let policy = policy.clone();
            let token = token.clone();
            async move { policy.execute(&token, move || core(args.clone())).await }.boxed()
        }) }
    }

    /// Tie evaluation to a named event on `source`, bounded by `limit`.
    ///
    /// `GateMode::Start` waits for a payload accepted by `pred`, then
    /// evaluates. `GateMode::Stop` starts evaluating immediately on a
    /// spawned task and resolves absent when a matching payload arrives
    /// first; the task itself is left to finish. Either way, no match
    /// before the deadline yields `EvalError::Timeout`, and the listener
    /// is deregistered on every exit path.
    pub fn gated_by_event<S, P, M>(
        &self,
        source: Arc<S>,
        event: impl Into<String>,
        pred: M,
        limit: TimeoutPolicy,
        mode: GateMode,
    ) -> Self
    where
        S: EventSource<P> + 'static,
        P: Clone + Send + 'static,
        M: Fn(&P) -> bool + Send + Sync + 'static,
    {
        let core = self.core.clone();
        let event = event.into();
        let pred = Arc::new(pred);
        Self { core: Arc::new(move |args: Arc<A>| {
            let core = core.clone();
            let source = source.clone();
            let event = event.clone();
            let pred = pred.clone();
            async move {
                match mode {
                    GateMode::Start => {
                        limit
                            .execute(|| async move {
                                let mut gate = source.subscribe(&event);
                                loop {
                                    match gate.next().await {
                                        Some(payload) if pred(&payload) => {
                                            tracing::debug!(event = %event, "start gate matched");
                                            drop(gate);
                                            return core(args).await;
                                        }
                                        Some(_) => {}
                                        // source gone; only the deadline
                                        // can resolve this evaluation now
                                        None => futures::future::pending::<()>().await,
                                    }
                                }
                            })
                            .await
                    }
                    GateMode::Stop => {
                        let mut gate = source.subscribe(&event);
                        let running = tokio::spawn(core(args));
                        limit
                            .execute(move || async move {
                                tokio::pin!(running);
                                loop {
                                    tokio::select! {
                                        finished = &mut running => {
                                            return match finished {
                                                Ok(eval) => eval,
                                                Err(join) => {
                                                    std::panic::resume_unwind(join.into_panic())
                                                }
                                            };
                                        }
                                        payload = gate.next() => match payload {
                                            Some(payload) if pred(&payload) => {
                                                tracing::debug!(event = %event, "stop gate matched");
                                                return Ok(None);
                                            }
                                            Some(_) => {}
                                            None => futures::future::pending::<()>().await,
                                        },
                                    }
                                }
                            })
                            .await
                    }
                }
            }
            .boxed()
        }) }
    }
}

impl<A, T, E> AsyncFunc<A, AsyncSeq<T>, E>
where
    A: Send + Sync + 'static,
    T: Clone + Send + 'static,
    E: Send + Sync + 'static,
{
    /// Treat this function's result as a sequence: apply `step` to each
    /// element, flatten one level, dropping absent outputs. The produced
    /// sequence stays lazy.
    pub fn expand<U, F>(&self, step: F) -> AsyncFunc<A, AsyncSeq<U>, E>
    where
        U: Send + 'static,
        F: Fn(&T) -> Option<AsyncSeq<U>> + Send + Sync + 'static,
    {
        let core = self.core.clone();
        let step = Arc::new(step);
        AsyncFunc { core: Arc::new(move |args| {
            let fut = core(args);
            let step = step.clone();
            async move {
                let Some(elements) = fut.await? else {
                    return Ok(None);
                };
                let step = step.clone();
                let expanded = elements
                    .map(move |item, _| step(&item).unwrap_or_else(AsyncSeq::empty))
                    .flatten();
                Ok(Some(expanded))
            }
            .boxed()
        }) }
    }
}

impl<V, R, E> AsyncFunc<Vec<V>, R, E>
where
    V: Clone + Send + Sync + 'static,
    R: Send + 'static,
    E: Send + Sync + 'static,
{
    /// Partial application: insert `value` at argument position `index`
    /// before evaluating. Positions past the end append.
    pub fn adapt_insert(&self, index: usize, value: V) -> Self {
        let core = self.core.clone();
        Self { core: Arc::new(move |args: Arc<Vec<V>>| {
            let mut full = Vec::with_capacity(args.len() + 1);
            let at = index.min(args.len());
            full.extend_from_slice(&args[..at]);
            full.push(value.clone());
            full.extend_from_slice(&args[at..]);
            core(Arc::new(full))
        }) }
    }

    /// Read named fields out of a hierarchical scope as positional
    /// arguments, then evaluate. An unresolvable name makes the evaluation
    /// absent.
    pub fn adapt_fields(&self, keys: Vec<String>) -> AsyncFunc<Scope<V>, R, E> {
        let core = self.core.clone();
        let keys = Arc::new(keys);
        AsyncFunc { core: Arc::new(move |scope: Arc<Scope<V>>| {
            let mut args = Vec::with_capacity(keys.len());
            for key in keys.iter() {
                match scope.lookup(key) {
                    Some(value) => args.push(value.clone()),
                    None => return async { Ok(None) }.boxed(),
                }
            }
            core(Arc::new(args))
        }) }
    }
}

impl<V, E> AsyncFunc<Vec<V>, V, E>
where
    V: Clone + Send + Sync + 'static,
    E: Send + Sync + 'static,
{
    /// As [`adapt_fields`](Self::adapt_fields), then write the result back
    /// into the scope under `output_key`, yielding the extended scope.
    pub fn adapt_fields_into(
        &self,
        keys: Vec<String>,
        output_key: impl Into<String>,
    ) -> AsyncFunc<Scope<V>, Scope<V>, E> {
        let output_key = output_key.into();
        let extracted = self.adapt_fields(keys);
        AsyncFunc { core: Arc::new(move |scope: Arc<Scope<V>>| {
            let extracted = extracted.clone();
            let output_key = output_key.clone();
            async move {
                Ok(extracted
                    .eval(scope.clone())
                    .await?
                    .map(|value| scope.bind(output_key, value)))
            }
            .boxed()
        }) }
    }
}
