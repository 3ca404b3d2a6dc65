//! Error classification for fallback and retry decisions.
//!
//! A matcher decides whether a raised error should be intercepted (by a
//! fallback alternate) or retried. Matching can key on a status-like code,
//! a kind name, a message fragment, or an arbitrary predicate. `Any` matches
//! every error; it is the behavior of a fallback given no matcher.

use std::fmt;
use std::sync::Arc;

/// Optional structured detail an error type can expose for matching.
///
/// Both methods have defaults so plain error types participate without
/// ceremony: no status, and the kind derived from the type name.
pub trait ErrorDetails {
    /// A status-like numeric code (for example an HTTP status), if any.
    fn status(&self) -> Option<u16> {
        None
    }

    /// A short kind name. Defaults to the unqualified type name.
    fn kind(&self) -> &str
    where
        Self: Sized,
    {
        let full = std::any::type_name::<Self>();
        full.rsplit("::").next().unwrap_or(full)
    }
}

/// Classifies a raised error; used by `fallback` and `retrying`.
pub enum ErrorMatcher<E> {
    /// Match every error.
    Any,
    /// Match errors whose `status()` equals the given code.
    Status(u16),
    /// Match errors whose `kind()` equals the given name.
    Kind(&'static str),
    /// Match errors whose display output contains the given fragment.
    MessageContains(String),
    /// Match errors satisfying an arbitrary predicate.
    Predicate(Arc<dyn Fn(&E) -> bool + Send + Sync>),
}

impl<E> Clone for ErrorMatcher<E> {
    fn clone(&self) -> Self {
        match self {
            Self::Any => Self::Any,
            Self::Status(code) => Self::Status(*code),
            Self::Kind(name) => Self::Kind(name),
            Self::MessageContains(s) => Self::MessageContains(s.clone()),
            Self::Predicate(p) => Self::Predicate(p.clone()),
        }
    }
}

impl<E> fmt::Debug for ErrorMatcher<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Any => write!(f, "ErrorMatcher::Any"),
            Self::Status(code) => write!(f, "ErrorMatcher::Status({})", code),
            Self::Kind(name) => write!(f, "ErrorMatcher::Kind({:?})", name),
            Self::MessageContains(s) => write!(f, "ErrorMatcher::MessageContains({:?})", s),
            Self::Predicate(_) => write!(f, "ErrorMatcher::Predicate(..)"),
        }
    }
}

impl<E> ErrorMatcher<E>
where
    E: ErrorDetails + fmt::Display,
{
    /// Build a predicate matcher.
    pub fn predicate<F>(pred: F) -> Self
    where
        F: Fn(&E) -> bool + Send + Sync + 'static,
    {
        Self::Predicate(Arc::new(pred))
    }

    /// Decide whether `err` is matched.
    pub fn matches(&self, err: &E) -> bool {
        match self {
            Self::Any => true,
            Self::Status(code) => err.status() == Some(*code),
            Self::Kind(name) => err.kind() == *name,
            Self::MessageContains(fragment) => err.to_string().contains(fragment.as_str()),
            Self::Predicate(pred) => pred(err),
        }
    }
}
