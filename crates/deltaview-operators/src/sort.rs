//! Incremental sort over a change-set stream.
//!
//! `Sorter` mirrors upstream state in an unsorted shadow map and keeps the
//! previously emitted order. Each upstream event is turned into either a
//! bounded positional patch (indexed structural changes plus explicit
//! moves) or a full rebuild, depending on `reset_threshold`.

use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};
use std::hash::Hash;

use deltaview_core::prelude::*;

use crate::comparer::Comparer;

/// Patch-vs-rebuild cutover used when no explicit threshold is supplied.
pub const DEFAULT_RESET_THRESHOLD: usize = 100;

/// Stateful sort transform. Drive it directly with `apply_changes` /
/// `apply_comparer`, or through a stream via
/// `ChangeStreamOps::sort`/`sort_with`.
#[derive(Clone)]
pub struct Sorter<K, V> {
    comparer: Comparer<V>,
    reset_threshold: usize,
    shadow: HashMap<K, V>,
    sorted: Vec<(K, V)>,
    primed: bool,
}

impl<K, V> Sorter<K, V>
where
    K: Clone + Eq + Hash,
    V: Clone,
{
    pub fn new(comparer: Comparer<V>, reset_threshold: usize) -> Self {
        Self {
            comparer,
            reset_threshold,
            shadow: HashMap::new(),
            sorted: Vec::new(),
            primed: false,
        }
    }

    pub fn len(&self) -> usize {
        self.shadow.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shadow.is_empty()
    }

    /// Fold one upstream change set into the derived order.
    pub fn apply_changes(&mut self, changes: &ChangeSet<K, V>) -> Option<SortedChangeSet<K, V>> {
        if changes.is_empty() {
            return None;
        }
        for change in changes {
            match change {
                Change::Add { key, value, .. } | Change::Refresh { key, value, .. } => {
                    self.shadow.insert(key.clone(), value.clone());
                }
                Change::Update { key, current, .. } => {
                    self.shadow.insert(key.clone(), current.clone());
                }
                Change::Remove { key, .. } => {
                    self.shadow.remove(key);
                }
                Change::Move { .. } => {}
            }
        }

        if !self.primed {
            return Some(self.prime(changes));
        }

        let mut working = self.sorted.clone();
        let mut emitted: Vec<Change<K, V>> = Vec::new();
        for change in changes {
            match change {
                Change::Add { key, value, .. } => {
                    let position = self.ordered_position(&working, value);
                    working.insert(position, (key.clone(), value.clone()));
                    emitted.push(change.clone().with_index(position));
                }
                Change::Update { key, current, .. } => match position_of(&working, key) {
                    Some(position) => {
                        working[position].1 = current.clone();
                        emitted.push(change.clone().with_index(position));
                    }
                    None => {
                        let position = self.ordered_position(&working, current);
                        working.insert(position, (key.clone(), current.clone()));
                        emitted.push(change.clone().with_index(position));
                    }
                },
                Change::Remove { key, .. } => {
                    if let Some(position) = position_of(&working, key) {
                        working.remove(position);
                        emitted.push(change.clone().with_index(position));
                    }
                }
                Change::Refresh { key, value, .. } => {
                    if let Some(position) = position_of(&working, key) {
                        working[position].1 = value.clone();
                        emitted.push(change.clone().with_index(position));
                    }
                }
                Change::Move { .. } => {}
            }
        }

        let mut target = working.clone();
        target.sort_by(|a, b| self.comparer.compare(&a.1, &b.1));
        // Splicing past the threshold is wasted work: the emission becomes
        // a reset and the partial move list is discarded.
        let moves = reorder_moves(&mut working, &target, self.reset_threshold);

        let message = if emitted.len() + moves.len() > self.reset_threshold {
            tracing::trace!(
                changes = emitted.len(),
                moves = moves.len(),
                "data change above threshold; rebuilding"
            );
            // Structural changes are kept so keyed folds stay exact; the
            // moves are subsumed by the rebuilt order.
            SortedChangeSet::new(SortReason::Reset, ChangeSet::from(emitted), target.clone())
        } else {
            emitted.extend(moves);
            SortedChangeSet::new(
                SortReason::DataChanged,
                ChangeSet::from(emitted),
                target.clone(),
            )
        };
        self.sorted = target;
        Some(message)
    }

    /// Swap the comparer. The trigger classifies as `ComparerChanged` and
    /// settles on `Reorder` or `Reset` depending on how many items end up
    /// displaced.
    pub fn apply_comparer(&mut self, comparer: Comparer<V>) -> Option<SortedChangeSet<K, V>> {
        self.comparer = comparer;
        if !self.primed {
            return None;
        }

        let mut target = self.sorted.clone();
        target.sort_by(|a, b| self.comparer.compare(&a.1, &b.1));

        let mut displaced = 0usize;
        {
            let target_positions: HashMap<&K, usize> = target
                .iter()
                .enumerate()
                .map(|(position, (key, _))| (key, position))
                .collect();
            for (position, (key, _)) in self.sorted.iter().enumerate() {
                if target_positions.get(&key) != Some(&position) {
                    displaced += 1;
                }
            }
        }

        let trigger = SortReason::ComparerChanged;
        let message = if displaced > self.reset_threshold {
            tracing::trace!(?trigger, displaced, "comparer change above threshold; rebuilding");
            SortedChangeSet::new(SortReason::Reset, ChangeSet::new(), target.clone())
        } else {
            let mut scratch = self.sorted.clone();
            let moves = reorder_moves(&mut scratch, &target, usize::MAX);
            tracing::trace!(?trigger, moves = moves.len(), "comparer change; reordering");
            SortedChangeSet::new(SortReason::Reorder, ChangeSet::from(moves), target.clone())
        };
        self.sorted = target;
        Some(message)
    }

    fn prime(&mut self, changes: &ChangeSet<K, V>) -> SortedChangeSet<K, V> {
        self.primed = true;
        let mut seen: HashSet<K> = HashSet::with_capacity(changes.len());
        let mut order: Vec<(K, V)> = Vec::with_capacity(self.shadow.len());
        for change in changes {
            let key = change.key();
            if seen.insert(key.clone()) {
                if let Some(value) = self.shadow.get(key) {
                    order.push((key.clone(), value.clone()));
                }
            }
        }
        order.sort_by(|a, b| self.comparer.compare(&a.1, &b.1));
        self.sorted = order;

        let initial: ChangeSet<K, V> = self
            .sorted
            .iter()
            .enumerate()
            .map(|(position, (key, value))| {
                Change::add(key.clone(), value.clone()).with_index(position)
            })
            .collect();
        tracing::trace!(items = self.sorted.len(), "initial sorted load");
        SortedChangeSet::new(SortReason::InitialLoad, initial, self.sorted.clone())
    }

    /// Slot for a new value: after every existing item that does not
    /// compare greater, so equal items keep arrival order.
    fn ordered_position(&self, working: &[(K, V)], value: &V) -> usize {
        working.partition_point(|(_, existing)| {
            self.comparer.compare(existing, value) != Ordering::Greater
        })
    }
}

fn position_of<K: Eq, V>(working: &[(K, V)], key: &K) -> Option<usize> {
    working.iter().position(|(existing, _)| existing == key)
}

/// Splice `current` into `target` order, pulling each out-of-place item to
/// its slot and emitting one move per splice. Both sequences must hold the
/// same keys. Stops once the move count passes `limit`.
fn reorder_moves<K, V>(
    current: &mut Vec<(K, V)>,
    target: &[(K, V)],
    limit: usize,
) -> Vec<Change<K, V>>
where
    K: Clone + Eq,
    V: Clone,
{
    let mut moves = Vec::new();
    for position in 0..target.len() {
        if moves.len() > limit {
            break;
        }
        if current[position].0 == target[position].0 {
            continue;
        }
        let Some(offset) = current[position + 1..]
            .iter()
            .position(|(key, _)| *key == target[position].0)
        else {
            continue;
        };
        let source = position + 1 + offset;
        let (key, value) = current.remove(source);
        current.insert(position, (key.clone(), value.clone()));
        moves.push(Change::moved(key, value, source, position));
    }
    moves
}
