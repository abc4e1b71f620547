//! Materialized state and conformance aggregators.
//!
//! `CacheState` is the verification oracle: folding every change set a
//! producer emitted, in order, over an empty `CacheState` must reproduce the
//! producer's current state exactly. The aggregators capture a stream's
//! full message history alongside that fold.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex};

use crate::change::{Change, ChangeSet};
use crate::sorted::{SortReason, SortedChangeSet};
use crate::stream::{ChangeStream, Event, SortedStream, Subscription};

/// Key→value snapshot obtained by folding change sets from empty state.
#[derive(Debug, Clone)]
pub struct CacheState<K, V> {
    entries: HashMap<K, V>,
}

impl<K: Eq + Hash, V: PartialEq> PartialEq for CacheState<K, V> {
    fn eq(&self, other: &Self) -> bool {
        self.entries == other.entries
    }
}

impl<K: Eq + Hash + Clone, V: Clone> CacheState<K, V> {
    pub fn new() -> Self {
        Self {
            entries: HashMap::new(),
        }
    }

    /// Apply one change set in order. `Move` is positional-only and leaves
    /// keyed state untouched.
    pub fn apply(&mut self, changes: &ChangeSet<K, V>) {
        for change in changes {
            match change {
                Change::Add { key, value, .. } | Change::Refresh { key, value, .. } => {
                    self.entries.insert(key.clone(), value.clone());
                }
                Change::Update { key, current, .. } => {
                    self.entries.insert(key.clone(), current.clone());
                }
                Change::Remove { key, .. } => {
                    self.entries.remove(key);
                }
                Change::Move { .. } => {}
            }
        }
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, key: &K) -> Option<&V> {
        self.entries.get(key)
    }

    pub fn contains_key(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    pub fn entries(&self) -> impl Iterator<Item = (&K, &V)> {
        self.entries.iter()
    }
}

impl<K: Eq + Hash + Clone, V: Clone> Default for CacheState<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

struct AggregatorInner<K, V> {
    messages: Vec<ChangeSet<K, V>>,
    state: CacheState<K, V>,
    completed: bool,
}

/// Records every message received from a change-set stream plus the folded
/// state, for conformance assertions.
pub struct ChangeSetAggregator<K, V> {
    shared: Arc<Mutex<AggregatorInner<K, V>>>,
    _subscription: Subscription,
}

impl<K, V> ChangeSetAggregator<K, V>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Clone + Send + 'static,
{
    pub fn capture(stream: &ChangeStream<K, V>) -> Self {
        let shared = Arc::new(Mutex::new(AggregatorInner {
            messages: Vec::new(),
            state: CacheState::new(),
            completed: false,
        }));

        let recorder = Arc::clone(&shared);
        let subscription = stream.subscribe(move |event: Event<ChangeSet<K, V>>| {
            let mut inner = recorder.lock().unwrap();
            match event {
                Event::Next(changes) => {
                    inner.state.apply(&changes);
                    inner.messages.push(changes);
                }
                Event::Completed => inner.completed = true,
            }
        });

        Self {
            shared,
            _subscription: subscription,
        }
    }

    pub fn messages(&self) -> Vec<ChangeSet<K, V>> {
        self.shared.lock().unwrap().messages.clone()
    }

    pub fn message_count(&self) -> usize {
        self.shared.lock().unwrap().messages.len()
    }

    pub fn data(&self) -> CacheState<K, V> {
        self.shared.lock().unwrap().state.clone()
    }

    pub fn is_completed(&self) -> bool {
        self.shared.lock().unwrap().completed
    }
}

struct SortedAggregatorInner<K, V> {
    messages: Vec<SortedChangeSet<K, V>>,
    state: CacheState<K, V>,
    sorted: Vec<(K, V)>,
    completed: bool,
}

/// Same as `ChangeSetAggregator`, for sorted streams. Also tracks the last
/// emitted total order.
pub struct SortedChangeSetAggregator<K, V> {
    shared: Arc<Mutex<SortedAggregatorInner<K, V>>>,
    _subscription: Subscription,
}

impl<K, V> SortedChangeSetAggregator<K, V>
where
    K: Eq + Hash + Clone + Send + 'static,
    V: Clone + Send + 'static,
{
    pub fn capture(stream: &SortedStream<K, V>) -> Self {
        let shared = Arc::new(Mutex::new(SortedAggregatorInner {
            messages: Vec::new(),
            state: CacheState::new(),
            sorted: Vec::new(),
            completed: false,
        }));

        let recorder = Arc::clone(&shared);
        let subscription = stream.subscribe(move |event: Event<SortedChangeSet<K, V>>| {
            let mut inner = recorder.lock().unwrap();
            match event {
                Event::Next(message) => {
                    inner.state.apply(message.changes());
                    inner.sorted = message.items().to_vec();
                    inner.messages.push(message);
                }
                Event::Completed => inner.completed = true,
            }
        });

        Self {
            shared,
            _subscription: subscription,
        }
    }

    pub fn messages(&self) -> Vec<SortedChangeSet<K, V>> {
        self.shared.lock().unwrap().messages.clone()
    }

    pub fn message_count(&self) -> usize {
        self.shared.lock().unwrap().messages.len()
    }

    pub fn data(&self) -> CacheState<K, V> {
        self.shared.lock().unwrap().state.clone()
    }

    /// The total order carried by the most recent emission.
    pub fn sorted_items(&self) -> Vec<(K, V)> {
        self.shared.lock().unwrap().sorted.clone()
    }

    pub fn last_reason(&self) -> Option<SortReason> {
        self.shared
            .lock()
            .unwrap()
            .messages
            .last()
            .map(|message| message.reason())
    }

    pub fn is_completed(&self) -> bool {
        self.shared.lock().unwrap().completed
    }
}
