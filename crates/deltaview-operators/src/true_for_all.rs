//! Boolean conjunction over per-item secondary signals.
//!
//! Tracks, per cache key, the latest value observed from that item's
//! `Signal`, and recomputes `AND(predicate(latest))` after every
//! membership change and every signal update. Zero tracked items is the
//! empty conjunction: `true`.

use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Arc, Mutex, Weak};

use deltaview_core::prelude::*;

struct TrackedValue<S> {
    value: S,
    // Dropping the handle stops watching the item's signal.
    _watch: Subscription,
}

/// Key→latest-value state for the conjunction. The stream wiring in
/// `ChangeStreamOps::true_for_all` owns one of these per subscriber.
pub struct TrueForAll<K, S> {
    predicate: Arc<dyn Fn(&S) -> bool + Send + Sync>,
    tracked: HashMap<K, TrackedValue<S>>,
}

impl<K, S> TrueForAll<K, S>
where
    K: Eq + Hash,
{
    pub fn new(predicate: Arc<dyn Fn(&S) -> bool + Send + Sync>) -> Self {
        Self {
            predicate,
            tracked: HashMap::new(),
        }
    }

    pub fn aggregate(&self) -> bool {
        self.tracked
            .values()
            .all(|tracked| (self.predicate)(&tracked.value))
    }

    pub fn tracked_count(&self) -> usize {
        self.tracked.len()
    }

    fn insert(&mut self, key: K, value: S, watch: Subscription) {
        // Replacing an entry drops the previous watch subscription.
        self.tracked.insert(key, TrackedValue {
            value,
            _watch: watch,
        });
    }

    fn record(&mut self, key: &K, value: S) {
        if let Some(tracked) = self.tracked.get_mut(key) {
            tracked.value = value;
        }
    }

    fn remove(&mut self, key: &K) {
        self.tracked.remove(key);
    }
}

/// Fold one upstream change set into `state`, wiring signal watches for
/// (re)registered items, then emit the recomputed aggregate.
pub(crate) fn process_change_set<K, V, S>(
    state: &Arc<Mutex<TrueForAll<K, S>>>,
    sink: &SharedSink<bool>,
    signal_of: &Arc<dyn Fn(&V) -> Signal<S> + Send + Sync>,
    changes: &ChangeSet<K, V>,
) where
    K: Clone + Eq + Hash + Send + 'static,
    S: Clone + Send + 'static,
{
    for change in changes {
        match change {
            Change::Add { key, value, .. } | Change::Update { key, current: value, .. } => {
                register(state, sink, signal_of, key.clone(), value);
            }
            Change::Remove { key, .. } => {
                state.lock().unwrap().remove(key);
            }
            Change::Refresh { .. } | Change::Move { .. } => {}
        }
    }
    let aggregate = state.lock().unwrap().aggregate();
    tracing::trace!(aggregate, "recomputed conjunction");
    sink.lock().unwrap().accept(Event::Next(aggregate));
}

fn register<K, V, S>(
    state: &Arc<Mutex<TrueForAll<K, S>>>,
    sink: &SharedSink<bool>,
    signal_of: &Arc<dyn Fn(&V) -> Signal<S> + Send + Sync>,
    key: K,
    value: &V,
) where
    K: Clone + Eq + Hash + Send + 'static,
    S: Clone + Send + 'static,
{
    let signal = (signal_of)(value);
    // Seed from the current value; the watch only ever sees later updates,
    // since the entry is not registered until after subscription.
    let seed = signal.get();
    let watch = {
        let weak: Weak<Mutex<TrueForAll<K, S>>> = Arc::downgrade(state);
        let sink = Arc::clone(sink);
        let watched_key = key.clone();
        signal.subscribe(move |event: Event<S>| {
            if let Event::Next(value) = event {
                if let Some(state) = weak.upgrade() {
                    let aggregate = {
                        let mut state = state.lock().unwrap();
                        state.record(&watched_key, value);
                        state.aggregate()
                    };
                    sink.lock().unwrap().accept(Event::Next(aggregate));
                }
            }
        })
    };
    state.lock().unwrap().insert(key, seed, watch);
}
