//! Cloneable comparison handles with expression-style composition.

use std::cmp::Ordering;
use std::fmt;
use std::sync::Arc;

/// A total preorder over values. Ties are broken downstream by stable
/// ordering, never by the comparer itself.
pub struct Comparer<V>(Arc<dyn Fn(&V, &V) -> Ordering + Send + Sync>);

impl<V> Comparer<V> {
    pub fn new(compare: impl Fn(&V, &V) -> Ordering + Send + Sync + 'static) -> Self {
        Self(Arc::new(compare))
    }

    pub fn compare(&self, a: &V, b: &V) -> Ordering {
        (self.0)(a, b)
    }

    /// Order ascending by an extracted sort key.
    pub fn ascending<T, F>(extract: F) -> Self
    where
        T: Ord,
        F: Fn(&V) -> T + Send + Sync + 'static,
    {
        Self::new(move |a, b| extract(a).cmp(&extract(b)))
    }

    pub fn descending<T, F>(extract: F) -> Self
    where
        T: Ord,
        F: Fn(&V) -> T + Send + Sync + 'static,
    {
        Self::new(move |a, b| extract(b).cmp(&extract(a)))
    }

    /// Refine equal-comparing values by a further ascending key.
    pub fn then_ascending<T, F>(self, extract: F) -> Self
    where
        V: 'static,
        T: Ord,
        F: Fn(&V) -> T + Send + Sync + 'static,
    {
        Self::new(move |a, b| {
            self.compare(a, b)
                .then_with(|| extract(a).cmp(&extract(b)))
        })
    }

    pub fn then_descending<T, F>(self, extract: F) -> Self
    where
        V: 'static,
        T: Ord,
        F: Fn(&V) -> T + Send + Sync + 'static,
    {
        Self::new(move |a, b| {
            self.compare(a, b)
                .then_with(|| extract(b).cmp(&extract(a)))
        })
    }
}

impl<V> Clone for Comparer<V> {
    fn clone(&self) -> Self {
        Self(Arc::clone(&self.0))
    }
}

impl<V> fmt::Debug for Comparer<V> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Comparer")
    }
}
