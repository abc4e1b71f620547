//! The authoritative keyed collection.
//!
//! A `KeyedCache` owns the key→value map and is its only mutator. Every
//! mutating call produces exactly one change set, published synchronously
//! to all subscribers under the cache's own lock, so each subscriber
//! observes the same total order of changes with no interleaving.

use std::collections::HashMap;
use std::fmt;
use std::hash::Hash;
use std::sync::{Arc, Mutex, MutexGuard};

use deltaview_core::prelude::*;

struct Slot<V> {
    // Monotonic insertion stamp; keeps replay and clear order deterministic.
    seq: u64,
    value: V,
}

struct CacheInner<K, V> {
    entries: HashMap<K, Slot<V>>,
    next_seq: u64,
    fanout: Fanout<ChangeSet<K, V>>,
    disposed: bool,
}

/// In-memory keyed source cache.
///
/// Keys are derived from values by the key selector supplied at
/// construction; the selector must be pure and deterministic, and keys are
/// unique within the cache at all times. Duplicate-key adds are updates,
/// never errors.
pub struct KeyedCache<K, V> {
    inner: Arc<Mutex<CacheInner<K, V>>>,
    key_of: Arc<dyn Fn(&V) -> K + Send + Sync>,
}

impl<K, V> KeyedCache<K, V>
where
    K: Clone + Eq + Hash + fmt::Debug + Send + 'static,
    V: Clone + Send + 'static,
{
    pub fn new(key_of: impl Fn(&V) -> K + Send + Sync + 'static) -> Self {
        Self {
            inner: Arc::new(Mutex::new(CacheInner {
                entries: HashMap::new(),
                next_seq: 0,
                fanout: Fanout::new(),
                disposed: false,
            })),
            key_of: Arc::new(key_of),
        }
    }

    fn guard(&self) -> Result<MutexGuard<'_, CacheInner<K, V>>> {
        let inner = self.inner.lock().unwrap();
        if inner.disposed {
            return Err(Error::Disposed);
        }
        Ok(inner)
    }

    pub fn add_or_update(&self, item: V) -> Result<()> {
        self.add_or_update_many(std::iter::once(item))
    }

    /// Insert or replace a batch of items as one change set.
    pub fn add_or_update_many(&self, items: impl IntoIterator<Item = V>) -> Result<()> {
        let mut inner = self.guard()?;
        let mut changes = ChangeSet::new();
        for item in items {
            let key = (self.key_of)(&item);
            match inner.entries.remove(&key) {
                Some(slot) => {
                    // Replacing keeps the original insertion stamp.
                    inner.entries.insert(
                        key.clone(),
                        Slot {
                            seq: slot.seq,
                            value: item.clone(),
                        },
                    );
                    changes.push(Change::update(key, item, slot.value));
                }
                None => {
                    let seq = inner.next_seq;
                    inner.next_seq += 1;
                    inner.entries.insert(
                        key.clone(),
                        Slot {
                            seq,
                            value: item.clone(),
                        },
                    );
                    changes.push(Change::add(key, item));
                }
            }
        }
        emit(&mut inner, changes);
        Ok(())
    }

    /// Remove by key. Removing an absent key is a no-op, not an error.
    pub fn remove(&self, key: &K) -> Result<()> {
        self.remove_many(std::iter::once(key.clone()))
    }

    pub fn remove_many(&self, keys: impl IntoIterator<Item = K>) -> Result<()> {
        let mut inner = self.guard()?;
        let mut changes = ChangeSet::new();
        for key in keys {
            if let Some(slot) = inner.entries.remove(&key) {
                changes.push(Change::remove(key, slot.value));
            }
        }
        emit(&mut inner, changes);
        Ok(())
    }

    /// Signal an out-of-band in-place mutation of an existing entry. The
    /// key must be present; refreshing an absent key fails.
    pub fn refresh(&self, key: &K) -> Result<()> {
        self.refresh_many(std::iter::once(key.clone()))
    }

    /// All keys are validated before anything is emitted, so a failed
    /// refresh never produces a partial change set.
    pub fn refresh_many(&self, keys: impl IntoIterator<Item = K>) -> Result<()> {
        let mut inner = self.guard()?;
        let keys: Vec<K> = keys.into_iter().collect();
        for key in &keys {
            if !inner.entries.contains_key(key) {
                return Err(Error::KeyNotFound(format!("{key:?}")));
            }
        }
        let mut changes = ChangeSet::with_capacity(keys.len());
        for key in keys {
            let value = inner.entries[&key].value.clone();
            changes.push(Change::refresh(key, value));
        }
        emit(&mut inner, changes);
        Ok(())
    }

    /// Remove every entry, emitting one remove per entry in insertion
    /// order.
    pub fn clear(&self) -> Result<()> {
        let mut inner = self.guard()?;
        let mut drained: Vec<(K, Slot<V>)> = inner.entries.drain().collect();
        drained.sort_by_key(|(_, slot)| slot.seq);
        let changes: ChangeSet<K, V> = drained
            .into_iter()
            .map(|(key, slot)| Change::remove(key, slot.value))
            .collect();
        emit(&mut inner, changes);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.inner.lock().unwrap().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn get(&self, key: &K) -> Option<V> {
        self.inner
            .lock()
            .unwrap()
            .entries
            .get(key)
            .map(|slot| slot.value.clone())
    }

    pub fn keys(&self) -> Vec<K> {
        self.snapshot().into_iter().map(|(key, _)| key).collect()
    }

    /// Current entries in insertion order.
    pub fn snapshot(&self) -> Vec<(K, V)> {
        let inner = self.inner.lock().unwrap();
        let mut entries: Vec<(&K, &Slot<V>)> = inner.entries.iter().collect();
        entries.sort_by_key(|(_, slot)| slot.seq);
        entries
            .into_iter()
            .map(|(key, slot)| (key.clone(), slot.value.clone()))
            .collect()
    }

    /// Subscribe to the live change-set stream.
    ///
    /// A subscriber joining a non-empty cache first receives one synthetic
    /// change set adding the current state in insertion order, so folding
    /// its messages from empty state is correct from time zero. The stream
    /// holds no strong reference to the cache.
    pub fn connect(&self) -> ChangeStream<K, V> {
        let weak = Arc::downgrade(&self.inner);
        EventStream::new(move |sink: SharedSink<ChangeSet<K, V>>| {
            let Some(inner) = weak.upgrade() else {
                sink.lock().unwrap().accept(Event::Completed);
                return Subscription::empty();
            };
            let mut guard = inner.lock().unwrap();
            if guard.disposed {
                drop(guard);
                sink.lock().unwrap().accept(Event::Completed);
                return Subscription::empty();
            }
            if !guard.entries.is_empty() {
                let mut snapshot: Vec<(&K, &Slot<V>)> = guard.entries.iter().collect();
                snapshot.sort_by_key(|(_, slot)| slot.seq);
                let initial: ChangeSet<K, V> = snapshot
                    .into_iter()
                    .map(|(key, slot)| Change::add(key.clone(), slot.value.clone()))
                    .collect();
                sink.lock().unwrap().accept(Event::Next(initial));
            }
            let id = guard.fanout.attach(Arc::clone(&sink));
            drop(guard);

            let weak = weak.clone();
            Subscription::new(move || {
                if let Some(inner) = weak.upgrade() {
                    inner.lock().unwrap().fanout.detach(id);
                }
            })
        })
    }

    /// Complete every active subscription and release internal state.
    /// Subsequent mutating calls fail with `Error::Disposed`. Also runs on
    /// drop.
    pub fn dispose(&self) {
        let mut inner = self.inner.lock().unwrap();
        if inner.disposed {
            return;
        }
        inner.disposed = true;
        inner.entries.clear();
        inner.fanout.complete();
        tracing::trace!("cache disposed; subscriptions completed");
    }
}

fn emit<K, V>(inner: &mut CacheInner<K, V>, changes: ChangeSet<K, V>)
where
    K: Clone,
    V: Clone,
{
    if changes.is_empty() {
        return;
    }
    tracing::trace!(
        adds = changes.adds(),
        updates = changes.updates(),
        removes = changes.removes(),
        refreshes = changes.refreshes(),
        "publishing change set"
    );
    inner.fanout.publish(changes);
}

impl<K, V> Drop for KeyedCache<K, V> {
    fn drop(&mut self) {
        let mut inner = self.inner.lock().unwrap();
        if !inner.disposed {
            inner.disposed = true;
            inner.entries.clear();
            inner.fanout.complete();
        }
    }
}
