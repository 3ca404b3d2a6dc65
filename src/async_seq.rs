//! Lazy asynchronous sequences.
//!
//! An `AsyncSeq<T>` mirrors [`LazySeq`](crate::LazySeq): a definition of how
//! to produce a fresh `futures` stream, re-entrant and possibly infinite,
//! with the same combinator surface. Every step may suspend before producing
//! or consuming an element, but iteration stays strictly sequential — no
//! combinator fans out elements concurrently, and the pending-value bridge
//! resolves elements positionally so source order is preserved even when
//! resolution order would differ.

use crate::seq::{LazySeq, SliceMode};
use futures::future::ready;
use futures::stream::{self, BoxStream, StreamExt};
use std::future::Future;
use std::sync::Arc;

type MakeStream<T> = Arc<dyn Fn() -> BoxStream<'static, T> + Send + Sync>;

/// A lazy, re-entrant, possibly-infinite asynchronous sequence.
pub struct AsyncSeq<T> {
    make: MakeStream<T>,
}

impl<T> Clone for AsyncSeq<T> {
    fn clone(&self) -> Self {
        Self { make: self.make.clone() }
    }
}

impl<T> std::fmt::Debug for AsyncSeq<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("AsyncSeq(..)")
    }
}

impl<T> AsyncSeq<T>
where
    T: Send + 'static,
{
    /// Wrap a stream factory. The factory runs once per traversal.
    pub fn from_fn<F, S>(factory: F) -> Self
    where
        F: Fn() -> S + Send + Sync + 'static,
        S: stream::Stream<Item = T> + Send + 'static,
    {
        Self { make: Arc::new(move || factory().boxed()) }
    }

    /// The empty sequence.
    pub fn empty() -> Self {
        Self::from_fn(|| stream::empty())
    }

    /// A finite sequence over the given items.
    pub fn of(items: Vec<T>) -> Self
    where
        T: Clone + Sync,
    {
        Self::from_fn(move || stream::iter(items.clone()))
    }

    /// A one-element sequence.
    pub fn singleton(item: T) -> Self
    where
        T: Clone + Sync,
    {
        Self::of(vec![item])
    }

    /// Coerce an optional value: absent becomes empty, present a singleton.
    pub fn from_option(item: Option<T>) -> Self
    where
        T: Clone + Sync,
    {
        match item {
            Some(item) => Self::singleton(item),
            None => Self::empty(),
        }
    }

    /// The chain `seed, step(seed), step(step(seed)), …`, ending when `step`
    /// yields `None`. Each traversal restarts from `seed`.
    pub fn along<F>(seed: T, step: F) -> Self
    where
        T: Clone + Sync,
        F: Fn(&T) -> Option<T> + Send + Sync + 'static,
    {
        Self::from_seq(LazySeq::along(seed, step))
    }

    /// Lift a synchronous sequence.
    pub fn from_seq(seq: LazySeq<T>) -> Self {
        Self::from_fn(move || stream::iter(seq.iter()))
    }

    /// Bridge a synchronous sequence of pending values: each element is
    /// awaited in source position before the next is touched, so the output
    /// order is the source order regardless of resolution timing.
    pub fn resolving<F>(seq: LazySeq<F>) -> Self
    where
        F: Future<Output = T> + Send + 'static,
    {
        Self::from_fn(move || stream::iter(seq.iter()).then(|pending| pending))
    }

    /// A fresh, independent stream over this sequence.
    pub fn stream(&self) -> BoxStream<'static, T> {
        (self.make)()
    }

    /// Keep items where `pred(item, index)` holds. Lazy.
    pub fn restrict<P>(&self, pred: P) -> Self
    where
        P: Fn(&T, usize) -> bool + Send + Sync + 'static,
    {
        let make = self.make.clone();
        let pred = Arc::new(pred);
        Self::from_fn(move || {
            let pred = pred.clone();
            make()
                .enumerate()
                .filter(move |pair| ready(pred(&pair.1, pair.0)))
                .map(|(_, item)| item)
        })
    }

    /// Transform each item through `f(item, index)`. Lazy.
    pub fn map<U, F>(&self, f: F) -> AsyncSeq<U>
    where
        U: Send + 'static,
        F: Fn(T, usize) -> U + Send + Sync + 'static,
    {
        let make = self.make.clone();
        let f = Arc::new(f);
        AsyncSeq::from_fn(move || {
            let f = f.clone();
            make().enumerate().map(move |(i, item)| f(item, i))
        })
    }

    /// As [`map`](Self::map) with a suspending step function; elements are
    /// still processed one at a time, in order.
    pub fn map_async<U, F, Fut>(&self, f: F) -> AsyncSeq<U>
    where
        U: Send + 'static,
        F: Fn(T, usize) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = U> + Send + 'static,
    {
        let make = self.make.clone();
        let f = Arc::new(f);
        AsyncSeq::from_fn(move || {
            let f = f.clone();
            make().enumerate().then(move |(i, item)| f(item, i))
        })
    }

    /// Append `other` after this sequence. Lazy.
    pub fn concat(&self, other: &Self) -> Self {
        let a = self.make.clone();
        let b = other.make.clone();
        Self::from_fn(move || a().chain(b()))
    }

    /// Pair items by position; stops at the shorter side. Lazy.
    pub fn zip<U>(&self, other: &AsyncSeq<U>) -> AsyncSeq<(T, U)>
    where
        U: Send + 'static,
    {
        let a = self.make.clone();
        let b = other.make.clone();
        AsyncSeq::from_fn(move || a().zip(b()))
    }

    /// Nested-loop product; `other` is re-traversed once per outer item.
    pub fn cartesian<U>(&self, other: &AsyncSeq<U>) -> AsyncSeq<(T, U)>
    where
        T: Clone,
        U: Send + 'static,
    {
        let a = self.make.clone();
        let other = other.clone();
        AsyncSeq::from_fn(move || {
            let other = other.clone();
            a().flat_map(move |x| {
                let x = x.clone();
                other.stream().map(move |y| (x.clone(), y))
            })
        })
    }

    /// Single stateful pass gated on the first match; identical semantics
    /// to the synchronous [`LazySeq::slice`].
    pub fn slice<P>(&self, pred: P, mode: SliceMode, inclusive: bool) -> Self
    where
        P: Fn(&T, usize) -> bool + Send + Sync + 'static,
    {
        let make = self.make.clone();
        let pred = Arc::new(pred);
        Self::from_fn(move || {
            let pred = pred.clone();
            make()
                .enumerate()
                .scan((false, false), move |(started, done), (i, item)| {
                    let out = match mode {
                        SliceMode::Start => {
                            if *started {
                                Some(Some(item))
                            } else if pred(&item, i) {
                                *started = true;
                                if inclusive {
                                    Some(Some(item))
                                } else {
                                    Some(None)
                                }
                            } else {
                                Some(None)
                            }
                        }
                        SliceMode::End => {
                            if *done {
                                None
                            } else if pred(&item, i) {
                                *done = true;
                                inclusive.then(|| Some(item))
                            } else {
                                Some(Some(item))
                            }
                        }
                    };
                    ready(out)
                })
                .filter_map(ready)
        })
    }

    /// Yield until the first match, excluding it.
    pub fn until<P>(&self, pred: P) -> Self
    where
        P: Fn(&T, usize) -> bool + Send + Sync + 'static,
    {
        self.slice(pred, SliceMode::End, false)
    }

    /// Yield through the first match, including it.
    pub fn through<P>(&self, pred: P) -> Self
    where
        P: Fn(&T, usize) -> bool + Send + Sync + 'static,
    {
        self.slice(pred, SliceMode::End, true)
    }

    /// Begin yielding at the first match, inclusive.
    pub fn begin_when<P>(&self, pred: P) -> Self
    where
        P: Fn(&T, usize) -> bool + Send + Sync + 'static,
    {
        self.slice(pred, SliceMode::Start, true)
    }

    /// Begin yielding just after the first match.
    pub fn begin_after<P>(&self, pred: P) -> Self
    where
        P: Fn(&T, usize) -> bool + Send + Sync + 'static,
    {
        self.slice(pred, SliceMode::Start, false)
    }

    /// Numeric slice sugar: drop everything before index `n`.
    pub fn from_index(&self, n: usize) -> Self {
        self.slice(move |_, i| i == n, SliceMode::Start, true)
    }

    /// Numeric slice sugar: keep everything before index `n`.
    pub fn until_index(&self, n: usize) -> Self {
        self.slice(move |_, i| i == n, SliceMode::End, false)
    }

    /// The infinite sequence of this sequence itself; each repetition
    /// re-runs from scratch when traversed.
    pub fn cycle(&self) -> AsyncSeq<AsyncSeq<T>> {
        let this = self.clone();
        AsyncSeq::from_fn(move || stream::iter(std::iter::repeat(this.clone())))
    }

    /// Force evaluation: the first item, or `None` for an empty sequence.
    pub async fn resolve(&self) -> Option<T> {
        self.stream().next().await
    }

    /// Force evaluation: left fold seeded by the first item.
    pub async fn resolve_with<F>(&self, op: F) -> Option<T>
    where
        F: Fn(T, T) -> T + Send,
    {
        let mut items = self.stream();
        let first = items.next().await?;
        Some(items.fold(first, |acc, item| ready(op(acc, item))).await)
    }

    /// Force evaluation: fold over every item from an explicit seed.
    pub async fn resolve_from<A, F>(&self, seed: A, op: F) -> A
    where
        A: Send,
        F: Fn(A, T) -> A + Send,
    {
        self.stream().fold(seed, |acc, item| ready(op(acc, item))).await
    }

    /// Materialize at most `n` leading items. Forces evaluation.
    pub async fn take(&self, n: usize) -> Vec<T> {
        self.stream().take(n).collect().await
    }

    /// Materialize the whole sequence. Forces evaluation; must be finite.
    pub async fn to_vec(&self) -> Vec<T> {
        self.stream().collect().await
    }
}

impl<T> AsyncSeq<AsyncSeq<T>>
where
    T: Send + 'static,
{
    /// Flatten one nesting level. Lazy.
    pub fn flatten(&self) -> AsyncSeq<T> {
        let make = self.make.clone();
        AsyncSeq::from_fn(move || make().flat_map(|inner| inner.stream()))
    }
}
