//! Typed deltas over a keyed collection.
//!
//! A `ChangeSet` is the only thing a cache ever publishes: an ordered batch
//! of `Change`s where later changes assume earlier ones have already been
//! applied. Folding every published change set, in order, over empty state
//! must reproduce the producer's exact current state.

use serde::{Deserialize, Serialize};

/// A single delta applied to a keyed collection.
///
/// The non-move variants carry an optional positional `index`: `None` when
/// emitted by the cache itself, `Some` once a sorting operator has placed
/// the change inside a total order. `Move` is positional-only and never
/// carries a value change.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Change<K, V> {
    Add {
        key: K,
        value: V,
        index: Option<usize>,
    },
    Update {
        key: K,
        current: V,
        previous: V,
        index: Option<usize>,
    },
    Remove {
        key: K,
        value: V,
        index: Option<usize>,
    },
    /// The value mutated in place; key and identity are unchanged.
    Refresh {
        key: K,
        value: V,
        index: Option<usize>,
    },
    Move {
        key: K,
        value: V,
        previous_index: usize,
        current_index: usize,
    },
}

impl<K, V> Change<K, V> {
    pub fn add(key: K, value: V) -> Self {
        Change::Add {
            key,
            value,
            index: None,
        }
    }

    pub fn update(key: K, current: V, previous: V) -> Self {
        Change::Update {
            key,
            current,
            previous,
            index: None,
        }
    }

    pub fn remove(key: K, value: V) -> Self {
        Change::Remove {
            key,
            value,
            index: None,
        }
    }

    pub fn refresh(key: K, value: V) -> Self {
        Change::Refresh {
            key,
            value,
            index: None,
        }
    }

    pub fn moved(key: K, value: V, previous_index: usize, current_index: usize) -> Self {
        Change::Move {
            key,
            value,
            previous_index,
            current_index,
        }
    }

    pub fn key(&self) -> &K {
        match self {
            Change::Add { key, .. }
            | Change::Update { key, .. }
            | Change::Remove { key, .. }
            | Change::Refresh { key, .. }
            | Change::Move { key, .. } => key,
        }
    }

    /// The value after this change has been applied.
    pub fn value(&self) -> &V {
        match self {
            Change::Add { value, .. }
            | Change::Remove { value, .. }
            | Change::Refresh { value, .. }
            | Change::Move { value, .. } => value,
            Change::Update { current, .. } => current,
        }
    }

    /// The position this change acts on, if it has been placed in an order.
    pub fn index(&self) -> Option<usize> {
        match self {
            Change::Add { index, .. }
            | Change::Update { index, .. }
            | Change::Remove { index, .. }
            | Change::Refresh { index, .. } => *index,
            Change::Move { current_index, .. } => Some(*current_index),
        }
    }

    /// Place the change at `index`. `Move` already carries explicit
    /// positions and is returned unchanged.
    pub fn with_index(mut self, position: usize) -> Self {
        match &mut self {
            Change::Add { index, .. }
            | Change::Update { index, .. }
            | Change::Remove { index, .. }
            | Change::Refresh { index, .. } => *index = Some(position),
            Change::Move { .. } => {}
        }
        self
    }
}

/// An ordered batch of changes describing one mutation pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChangeSet<K, V> {
    changes: Vec<Change<K, V>>,
}

impl<K, V> ChangeSet<K, V> {
    pub fn new() -> Self {
        Self {
            changes: Vec::new(),
        }
    }

    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            changes: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, change: Change<K, V>) {
        self.changes.push(change);
    }

    /// Concatenate `other` after this set, keeping arrival order.
    pub fn append(&mut self, mut other: ChangeSet<K, V>) {
        self.changes.append(&mut other.changes);
    }

    pub fn len(&self) -> usize {
        self.changes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.changes.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Change<K, V>> {
        self.changes.iter()
    }

    pub fn adds(&self) -> usize {
        self.count(|c| matches!(c, Change::Add { .. }))
    }

    pub fn updates(&self) -> usize {
        self.count(|c| matches!(c, Change::Update { .. }))
    }

    pub fn removes(&self) -> usize {
        self.count(|c| matches!(c, Change::Remove { .. }))
    }

    pub fn refreshes(&self) -> usize {
        self.count(|c| matches!(c, Change::Refresh { .. }))
    }

    pub fn moves(&self) -> usize {
        self.count(|c| matches!(c, Change::Move { .. }))
    }

    fn count(&self, predicate: impl Fn(&Change<K, V>) -> bool) -> usize {
        self.changes.iter().filter(|c| predicate(c)).count()
    }
}

impl<K, V> Default for ChangeSet<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> From<Vec<Change<K, V>>> for ChangeSet<K, V> {
    fn from(changes: Vec<Change<K, V>>) -> Self {
        Self { changes }
    }
}

impl<K, V> FromIterator<Change<K, V>> for ChangeSet<K, V> {
    fn from_iter<I: IntoIterator<Item = Change<K, V>>>(iter: I) -> Self {
        Self {
            changes: iter.into_iter().collect(),
        }
    }
}

impl<K, V> IntoIterator for ChangeSet<K, V> {
    type Item = Change<K, V>;
    type IntoIter = std::vec::IntoIter<Change<K, V>>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.into_iter()
    }
}

impl<'a, K, V> IntoIterator for &'a ChangeSet<K, V> {
    type Item = &'a Change<K, V>;
    type IntoIter = std::slice::Iter<'a, Change<K, V>>;

    fn into_iter(self) -> Self::IntoIter {
        self.changes.iter()
    }
}
