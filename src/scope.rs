//! Hierarchical named-value lookup, consumed by the `adapt_fields` mode of
//! the function algebra.
//!
//! A `Scope` is a persistent key/value context: lookup searches upward
//! through ancestors for the first definition of a name, and binding a name
//! produces a child scope sharing the parent (never copying it), mirroring
//! the sharing model of `PathChain`.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

/// Read access to a hierarchical named-value context.
pub trait Lookup<V> {
    /// The first definition of `name`, searching this level then ancestors.
    fn lookup(&self, name: &str) -> Option<&V>;
}

struct Frame<V> {
    parent: Option<Arc<Frame<V>>>,
    bindings: HashMap<String, V>,
}

/// A persistent hierarchical scope.
pub struct Scope<V> {
    frame: Arc<Frame<V>>,
}

impl<V> Clone for Scope<V> {
    fn clone(&self) -> Self {
        Self { frame: self.frame.clone() }
    }
}

impl<V> Default for Scope<V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<V> Scope<V> {
    /// An empty root scope.
    pub fn new() -> Self {
        Self { frame: Arc::new(Frame { parent: None, bindings: HashMap::new() }) }
    }

    /// A root scope seeded with bindings.
    pub fn with_bindings<I, K>(bindings: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
    {
        let bindings = bindings.into_iter().map(|(k, v)| (k.into(), v)).collect();
        Self { frame: Arc::new(Frame { parent: None, bindings }) }
    }

    /// A new child scope with one additional binding; this scope is shared
    /// as the parent, not copied.
    pub fn bind(&self, name: impl Into<String>, value: V) -> Self {
        let mut bindings = HashMap::new();
        bindings.insert(name.into(), value);
        Self { frame: Arc::new(Frame { parent: Some(self.frame.clone()), bindings }) }
    }

    /// An empty child scope.
    pub fn child(&self) -> Self {
        Self {
            frame: Arc::new(Frame { parent: Some(self.frame.clone()), bindings: HashMap::new() }),
        }
    }

    /// True if `name` resolves at any level.
    pub fn contains(&self, name: &str) -> bool {
        self.lookup(name).is_some()
    }
}

impl<V> Lookup<V> for Scope<V> {
    fn lookup(&self, name: &str) -> Option<&V> {
        let mut frame = Some(self.frame.as_ref());
        while let Some(f) = frame {
            if let Some(v) = f.bindings.get(name) {
                return Some(v);
            }
            frame = f.parent.as_deref();
        }
        None
    }
}

impl<V: fmt::Debug> fmt::Debug for Scope<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut depth = 0;
        let mut frame = Some(self.frame.as_ref());
        let mut map = f.debug_map();
        while let Some(fr) = frame {
            for (k, v) in &fr.bindings {
                map.entry(&format!("{}@{}", k, depth), v);
            }
            depth += 1;
            frame = fr.parent.as_deref();
        }
        map.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lookup_finds_local_binding() {
        let scope = Scope::new().bind("x", 1);
        assert_eq!(scope.lookup("x"), Some(&1));
        assert_eq!(scope.lookup("y"), None);
    }

    #[test]
    fn lookup_searches_upward_through_ancestors() {
        let root = Scope::with_bindings([("a", 1), ("b", 2)]);
        let leaf = root.child().bind("c", 3);
        assert_eq!(leaf.lookup("a"), Some(&1));
        assert_eq!(leaf.lookup("c"), Some(&3));
        assert!(leaf.contains("b"));
    }

    #[test]
    fn inner_binding_shadows_outer() {
        let root = Scope::with_bindings([("x", 1)]);
        let inner = root.bind("x", 2);
        assert_eq!(inner.lookup("x"), Some(&2));
        // parent untouched
        assert_eq!(root.lookup("x"), Some(&1));
    }

    #[test]
    fn bind_shares_rather_than_copies_the_parent() {
        let root = Scope::with_bindings([("shared", 0)]);
        let a = root.bind("a", 1);
        let b = root.bind("b", 2);
        assert_eq!(a.lookup("shared"), Some(&0));
        assert_eq!(b.lookup("shared"), Some(&0));
        assert_eq!(a.lookup("b"), None);
        assert_eq!(b.lookup("a"), None);
    }
}
