//! Persistent chain structure for combinatorial search-space traversal.
//!
//! A `PathChain` is an immutable linked node `{parent, last, length}`
//! representing one branch of a search tree. Extension is O(1) and shares the
//! parent instead of copying it, so unboundedly many branches can hang off a
//! common prefix with no synchronization. The chain links backward only;
//! forward materialization walks and reverses the last `n` steps.

use crate::seq::LazySeq;
use std::fmt;
use std::sync::Arc;

struct Node<T> {
    parent: Option<Arc<Node<T>>>,
    last: T,
    length: usize,
}

/// An immutable persistent chain; one prefix of a combinatorial product.
///
/// Cloning is O(1) (an `Arc` bump). No operation mutates an existing chain;
/// every transformation yields a new chain referencing the old one as parent.
pub struct PathChain<T> {
    head: Option<Arc<Node<T>>>,
}

impl<T> Clone for PathChain<T> {
    fn clone(&self) -> Self {
        Self { head: self.head.clone() }
    }
}

impl<T> Default for PathChain<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> Drop for PathChain<T> {
    fn drop(&mut self) {
        // unlink uniquely-owned nodes iteratively; a naive recursive drop
        // would overflow the stack on deep chains
        let mut head = self.head.take();
        while let Some(node) = head {
            match Arc::try_unwrap(node) {
                Ok(mut node) => head = node.parent.take(),
                Err(_) => break,
            }
        }
    }
}

impl<T> PathChain<T> {
    /// The empty chain (length 0).
    pub fn new() -> Self {
        Self { head: None }
    }

    /// A chain of length 1 holding `item`.
    pub fn root(item: T) -> Self {
        Self::new().extend(item)
    }

    /// Extend with one item; O(1), parent shared.
    pub fn extend(&self, item: T) -> Self {
        let length = self.len() + 1;
        Self {
            head: Some(Arc::new(Node { parent: self.head.clone(), last: item, length })),
        }
    }

    /// Number of steps in the chain.
    pub fn len(&self) -> usize {
        self.head.as_ref().map_or(0, |n| n.length)
    }

    /// True for the empty chain.
    pub fn is_empty(&self) -> bool {
        self.head.is_none()
    }

    /// The most recently appended item, if any.
    pub fn last(&self) -> Option<&T> {
        self.head.as_ref().map(|n| &n.last)
    }

    /// Walk backward over the last `n` items (most recent first).
    fn walk_back(&self, n: usize) -> impl Iterator<Item = &T> {
        let mut cursor = self.head.as_deref();
        let mut remaining = n;
        std::iter::from_fn(move || {
            if remaining == 0 {
                return None;
            }
            remaining -= 1;
            let node = cursor?;
            cursor = node.parent.as_deref();
            Some(&node.last)
        })
    }

    /// Reconstruct the last `n` steps in forward order, mapping each through
    /// `f`. The chain is natively linked backward, so this walks then
    /// reverses.
    pub fn last_items<U, F>(&self, n: usize, f: F) -> Vec<U>
    where
        F: Fn(&T) -> U,
    {
        let mut out: Vec<U> = self.walk_back(n).map(f).collect();
        out.reverse();
        out
    }

    /// The whole chain in forward order.
    pub fn items<U, F>(&self, f: F) -> Vec<U>
    where
        F: Fn(&T) -> U,
    {
        self.last_items(self.len(), f)
    }
}

impl<T> PathChain<T>
where
    T: Clone + Send + Sync + 'static,
{
    /// One new child chain per item of `items`, materialized lazily as the
    /// caller consumes the sequence. This is the branching step of a
    /// combinatorial expansion: all children share this chain as parent.
    pub fn extend_across(&self, items: LazySeq<T>) -> LazySeq<PathChain<T>> {
        let base = self.clone();
        items.map(move |item, _| base.extend(item))
    }
}

impl<T: PartialEq> PartialEq for PathChain<T> {
    fn eq(&self, other: &Self) -> bool {
        if self.len() != other.len() {
            return false;
        }
        self.walk_back(self.len()).eq(other.walk_back(other.len()))
    }
}

impl<T: Eq> Eq for PathChain<T> {}

impl<T: fmt::Debug> fmt::Debug for PathChain<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut items: Vec<&T> = self.walk_back(self.len()).collect();
        items.reverse();
        f.debug_list().entries(items).finish()
    }
}
