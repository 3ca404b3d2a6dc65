//! Lazy, possibly-infinite synchronous sequences.
//!
//! A `LazySeq<T>` is a *definition* of how to produce an iteration, not a
//! container: it stores no items, and every call to [`LazySeq::iter`] yields
//! an independent traversal from scratch (re-entrant, never a shared
//! cursor). Combinators are all lazy; constructing a chain of them performs
//! zero evaluation until `resolve*` or `iter` forces it.
//!
//! Semantics:
//! - Sequences may be infinite (`naturals`, `along`, `cycle`); forcing
//!   operations on infinite sequences do not terminate unless bounded first.
//! - Cloning is O(1) and shares the definition, not any iteration state.
//! - Equality is element-wise over finite sequences and recurses through the
//!   element type's own `PartialEq`; comparing two equal infinite sequences
//!   does not terminate.

use std::sync::Arc;

/// Iteration mode for [`LazySeq::slice`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SliceMode {
    /// Begin yielding at (inclusive) or after (exclusive) the first match.
    Start,
    /// Yield until (exclusive) or through (inclusive) the first match.
    End,
}

type Make<T> = Arc<dyn Fn() -> Box<dyn Iterator<Item = T> + Send> + Send + Sync>;

/// A lazy, re-entrant, possibly-infinite sequence.
pub struct LazySeq<T> {
    make: Make<T>,
}

impl<T> Clone for LazySeq<T> {
    fn clone(&self) -> Self {
        Self { make: self.make.clone() }
    }
}

impl<T> std::fmt::Debug for LazySeq<T> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        // Deliberately opaque: rendering elements would force evaluation
        // and may not terminate.
        f.write_str("LazySeq(..)")
    }
}

impl<T> LazySeq<T>
where
    T: Send + 'static,
{
    /// Wrap an iterator factory. The factory runs once per traversal.
    pub fn from_fn<F, I>(factory: F) -> Self
    where
        F: Fn() -> I + Send + Sync + 'static,
        I: Iterator<Item = T> + Send + 'static,
    {
        Self { make: Arc::new(move || Box::new(factory())) }
    }

    /// The empty sequence.
    pub fn empty() -> Self {
        Self::from_fn(std::iter::empty)
    }

    /// A finite sequence over the given items.
    pub fn of(items: Vec<T>) -> Self
    where
        T: Clone + Sync,
    {
        Self::from_fn(move || items.clone().into_iter())
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

    /// The infinite chain `seed, step(seed), step(step(seed)), …`, ending
    /// when `step` yields `None`. Each traversal restarts from `seed`.
    pub fn along<F>(seed: T, step: F) -> Self
    where
        T: Clone + Sync,
        F: Fn(&T) -> Option<T> + Send + Sync + 'static,
    {
        let step = Arc::new(step);
        Self::from_fn(move || {
            let step = step.clone();
            std::iter::successors(Some(seed.clone()), move |prev| step(prev))
        })
    }

    /// A fresh, independent traversal of this sequence.
    pub fn iter(&self) -> Box<dyn Iterator<Item = T> + Send> {
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
            make().enumerate().filter(move |(i, item)| pred(item, *i)).map(|(_, item)| item)
        })
    }

    /// Transform each item through `f(item, index)`. Lazy.
    pub fn map<U, F>(&self, f: F) -> LazySeq<U>
    where
        U: Send + 'static,
        F: Fn(T, usize) -> U + Send + Sync + 'static,
    {
        let make = self.make.clone();
        let f = Arc::new(f);
        LazySeq::from_fn(move || {
            let f = f.clone();
            make().enumerate().map(move |(i, item)| f(item, i))
        })
    }

    /// Append `other` after this sequence. Lazy.
    pub fn concat(&self, other: &Self) -> Self {
        let a = self.make.clone();
        let b = other.make.clone();
        Self::from_fn(move || a().chain(b()))
    }

    /// Pair items by position; stops at the shorter side. Lazy.
    pub fn zip<U>(&self, other: &LazySeq<U>) -> LazySeq<(T, U)>
    where
        U: Send + 'static,
    {
        let a = self.make.clone();
        let b = other.make.clone();
        LazySeq::from_fn(move || a().zip(b()))
    }

    /// Nested-loop product: for each `a` here, every `b` of `other`. Lazy;
    /// `other` is re-traversed once per outer item.
    pub fn cartesian<U>(&self, other: &LazySeq<U>) -> LazySeq<(T, U)>
    where
        T: Clone,
        U: Send + 'static,
    {
        let a = self.make.clone();
        let other = other.clone();
        LazySeq::from_fn(move || {
            let other = other.clone();
            a().flat_map(move |x| {
                let x = x.clone();
                other.iter().map(move |y| (x.clone(), y))
            })
        })
    }

    /// Single stateful pass gated on the first item matching
    /// `pred(item, index)`. See [`SliceMode`] for the two modes; `inclusive`
    /// decides whether the matching item itself is yielded.
    pub fn slice<P>(&self, pred: P, mode: SliceMode, inclusive: bool) -> Self
    where
        P: Fn(&T, usize) -> bool + Send + Sync + 'static,
    {
        let make = self.make.clone();
        let pred = Arc::new(pred);
        Self::from_fn(move || {
            let pred = pred.clone();
            let mut source = make().enumerate();
            let mut started = false;
            let mut done = false;
            std::iter::from_fn(move || match mode {
                SliceMode::Start => loop {
                    let (i, item) = source.next()?;
                    if started {
                        return Some(item);
                    }
                    if pred(&item, i) {
                        started = true;
                        if inclusive {
                            return Some(item);
                        }
                    }
                },
                SliceMode::End => {
                    if done {
                        return None;
                    }
                    let (i, item) = source.next()?;
                    if pred(&item, i) {
                        done = true;
                        return inclusive.then_some(item);
                    }
                    Some(item)
                }
            })
        })
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

    /// Yield until the first match, excluding it.
    pub fn until<P>(&self, pred: P) -> Self
    where
        P: Fn(&T, usize) -> bool + Send + Sync + 'static,
    {
        self.slice(pred, SliceMode::End, false)
    }

    /// Yield through the first match, then stop.
    pub fn through<P>(&self, pred: P) -> Self
    where
        P: Fn(&T, usize) -> bool + Send + Sync + 'static,
    {
        self.slice(pred, SliceMode::End, true)
    }

    /// Numeric slice sugar: drop everything before index `n`.
    pub fn from_index(&self, n: usize) -> Self {
        self.slice(move |_, i| i == n, SliceMode::Start, true)
    }

    /// Numeric slice sugar: keep everything before index `n`.
    pub fn until_index(&self, n: usize) -> Self {
        self.slice(move |_, i| i == n, SliceMode::End, false)
    }

    /// The infinite sequence whose elements are this sequence itself; each
    /// repetition, when iterated by the consumer, re-runs from scratch.
    pub fn cycle(&self) -> LazySeq<LazySeq<T>> {
        let this = self.clone();
        LazySeq::from_fn(move || std::iter::repeat(this.clone()))
    }

    /// Force evaluation: the first item, or `None` for an empty sequence.
    pub fn resolve(&self) -> Option<T> {
        self.iter().next()
    }

    /// Force evaluation: left fold seeded by the first item.
    pub fn resolve_with<F>(&self, op: F) -> Option<T>
    where
        F: Fn(T, T) -> T,
    {
        let mut items = self.iter();
        let first = items.next()?;
        Some(items.fold(first, op))
    }

    /// Force evaluation: fold over every item from an explicit seed.
    pub fn resolve_from<A, F>(&self, seed: A, op: F) -> A
    where
        F: Fn(A, T) -> A,
    {
        self.iter().fold(seed, op)
    }

    /// Materialize at most `n` leading items. Forces evaluation.
    pub fn take(&self, n: usize) -> Vec<T> {
        self.iter().take(n).collect()
    }

    /// Materialize the whole sequence. Forces evaluation; must be finite.
    pub fn to_vec(&self) -> Vec<T> {
        self.iter().collect()
    }
}

impl LazySeq<u64> {
    /// The naturals `0, 1, 2, …`. A pure factory: every traversal gets a
    /// fresh cursor, there is no shared state to advance.
    pub fn naturals() -> Self {
        Self::from_fn(|| 0u64..)
    }
}

impl<T> LazySeq<LazySeq<T>>
where
    T: Send + 'static,
{
    /// Flatten one nesting level. Lazy.
    pub fn flatten(&self) -> LazySeq<T> {
        let make = self.make.clone();
        LazySeq::from_fn(move || make().flat_map(|inner| inner.iter()))
    }
}

impl<T> From<Vec<T>> for LazySeq<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn from(items: Vec<T>) -> Self {
        Self::of(items)
    }
}

impl<T> FromIterator<T> for LazySeq<T>
where
    T: Clone + Send + Sync + 'static,
{
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::of(iter.into_iter().collect())
    }
}

impl<T> PartialEq for LazySeq<T>
where
    T: PartialEq + Send + 'static,
{
    /// Element-wise comparison. Nested sequences recurse through the element
    /// type's `PartialEq`; strings compare atomically by construction. Does
    /// not terminate for two equal infinite sequences.
    fn eq(&self, other: &Self) -> bool {
        let mut a = self.iter();
        let mut b = other.iter();
        loop {
            match (a.next(), b.next()) {
                (None, None) => return true,
                (Some(x), Some(y)) if x == y => continue,
                _ => return false,
            }
        }
    }
}

impl<T> Eq for LazySeq<T> where T: Eq + Send + 'static {}
