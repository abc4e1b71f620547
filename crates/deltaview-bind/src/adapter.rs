//! Minimal-edit replay of change sets into an ordered sequence.
//!
//! The target sequence is externally owned: single owner, single writer.
//! Concurrent mutation from other threads is out of contract and must be
//! serialized by the caller.

use std::sync::{Arc, Mutex};

use deltaview_core::prelude::*;

/// Seam trait for an externally owned mutable ordered sequence.
pub trait OrderedSink<V> {
    fn insert_at(&mut self, index: usize, value: V);
    fn remove_at(&mut self, index: usize);
    fn replace_at(&mut self, index: usize, value: V);
    fn move_to(&mut self, previous_index: usize, current_index: usize);
    fn clear(&mut self);
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<V> OrderedSink<V> for Vec<V> {
    fn insert_at(&mut self, index: usize, value: V) {
        self.insert(index, value);
    }

    fn remove_at(&mut self, index: usize) {
        self.remove(index);
    }

    fn replace_at(&mut self, index: usize, value: V) {
        self[index] = value;
    }

    fn move_to(&mut self, previous_index: usize, current_index: usize) {
        let value = self.remove(previous_index);
        self.insert(current_index, value);
    }

    fn clear(&mut self) {
        Vec::clear(self);
    }

    fn len(&self) -> usize {
        Vec::len(self)
    }
}

/// Applies sorted change sets. Stateless: every change carries the index
/// it acts on, and rebuild-shaped messages carry the full order.
#[derive(Debug, Clone, Copy, Default)]
pub struct SortedListAdapter;

impl SortedListAdapter {
    pub fn new() -> Self {
        Self
    }

    pub fn adapt<K, V, T>(&self, message: &SortedChangeSet<K, V>, target: &mut T)
    where
        V: Clone,
        T: OrderedSink<V>,
    {
        match message.reason() {
            SortReason::InitialLoad | SortReason::Reset => {
                target.clear();
                for (_, value) in message.items() {
                    let end = target.len();
                    target.insert_at(end, value.clone());
                }
            }
            _ => {
                for change in message.changes() {
                    apply_positioned(change, target);
                }
            }
        }
    }
}

fn apply_positioned<K, V, T>(change: &Change<K, V>, target: &mut T)
where
    V: Clone,
    T: OrderedSink<V>,
{
    match change {
        Change::Add { value, index, .. } => {
            let at = index.unwrap_or(target.len());
            target.insert_at(at, value.clone());
        }
        Change::Update {
            current,
            index: Some(at),
            ..
        } => target.replace_at(*at, current.clone()),
        Change::Remove {
            index: Some(at), ..
        } => target.remove_at(*at),
        Change::Refresh {
            value,
            index: Some(at),
            ..
        } => target.replace_at(*at, value.clone()),
        Change::Move {
            previous_index,
            current_index,
            ..
        } => target.move_to(*previous_index, *current_index),
        // Unpositioned in-place changes have nothing to act on here.
        Change::Update { index: None, .. }
        | Change::Remove { index: None, .. }
        | Change::Refresh { index: None, .. } => {}
    }
}

/// Applies plain (unsorted) change sets, resolving positions through an
/// internal key mirror: adds append, everything else edits the key's slot.
#[derive(Debug, Clone)]
pub struct ListAdapter<K> {
    keys: Vec<K>,
}

impl<K: Clone + PartialEq> ListAdapter<K> {
    pub fn new() -> Self {
        Self { keys: Vec::new() }
    }

    pub fn adapt<V, T>(&mut self, changes: &ChangeSet<K, V>, target: &mut T)
    where
        V: Clone,
        T: OrderedSink<V>,
    {
        for change in changes {
            match change {
                Change::Add { key, value, .. } => {
                    let end = self.keys.len();
                    self.keys.push(key.clone());
                    target.insert_at(end, value.clone());
                }
                Change::Update { key, current, .. } => {
                    if let Some(at) = self.position(key) {
                        target.replace_at(at, current.clone());
                    }
                }
                Change::Remove { key, .. } => {
                    if let Some(at) = self.position(key) {
                        self.keys.remove(at);
                        target.remove_at(at);
                    }
                }
                Change::Refresh { key, value, .. } => {
                    if let Some(at) = self.position(key) {
                        target.replace_at(at, value.clone());
                    }
                }
                Change::Move {
                    previous_index,
                    current_index,
                    ..
                } => {
                    let key = self.keys.remove(*previous_index);
                    self.keys.insert(*current_index, key);
                    target.move_to(*previous_index, *current_index);
                }
            }
        }
    }

    fn position(&self, key: &K) -> Option<usize> {
        self.keys.iter().position(|existing| existing == key)
    }
}

impl<K: Clone + PartialEq> Default for ListAdapter<K> {
    fn default() -> Self {
        Self::new()
    }
}

/// Terminal binding of a sorted stream onto a shared vector.
pub trait SortedStreamExt<K, V> {
    /// Keep `target` continuously equal to the stream's emitted order.
    /// Dropping the subscription stops updates without clearing the
    /// target.
    fn bind(&self, target: Arc<Mutex<Vec<V>>>) -> Subscription;
}

impl<K, V> SortedStreamExt<K, V> for SortedStream<K, V>
where
    K: Send + 'static,
    V: Clone + Send + 'static,
{
    fn bind(&self, target: Arc<Mutex<Vec<V>>>) -> Subscription {
        let adapter = SortedListAdapter::new();
        self.subscribe(move |event: Event<SortedChangeSet<K, V>>| {
            if let Event::Next(message) = event {
                let mut list = target.lock().unwrap();
                adapter.adapt(&message, &mut *list);
            }
        })
    }
}
