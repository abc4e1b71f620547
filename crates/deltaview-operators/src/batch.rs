//! Window-based buffering of change sets.
//!
//! `Batcher` is the pure buffer; the timer wiring lives in
//! `ChangeStreamOps::batch`, driven by an injected `Scheduler` so tests
//! advance logical time instantly instead of waiting on the wall clock.

use deltaview_core::prelude::*;

/// Buffer of change sets received since the last window boundary.
#[derive(Clone)]
pub struct Batcher<K, V> {
    buffer: Vec<ChangeSet<K, V>>,
}

impl<K, V> Default for Batcher<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Batcher<K, V> {
    pub fn new() -> Self {
        Self { buffer: Vec::new() }
    }

    pub fn push(&mut self, changes: ChangeSet<K, V>) {
        if !changes.is_empty() {
            self.buffer.push(changes);
        }
    }

    pub fn pending(&self) -> usize {
        self.buffer.len()
    }

    /// Coalesce everything buffered, in arrival order. Returns `None` when
    /// the buffer is empty: consumers never receive empty batches.
    pub fn flush(&mut self) -> Option<ChangeSet<K, V>> {
        if self.buffer.is_empty() {
            return None;
        }
        let mut combined = ChangeSet::new();
        for changes in self.buffer.drain(..) {
            combined.append(changes);
        }
        tracing::trace!(changes = combined.len(), "flushed batch window");
        Some(combined)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flush_concatenates_in_arrival_order() {
        let mut batcher: Batcher<u32, &str> = Batcher::new();
        batcher.push(vec![Change::add(1, "a")].into());
        batcher.push(ChangeSet::new());
        batcher.push(vec![Change::update(1, "a2", "a"), Change::add(2, "b")].into());

        let combined = batcher.flush().expect("non-empty buffer");
        assert_eq!(combined.len(), 3);
        assert_eq!(combined.adds(), 2);
        assert_eq!(combined.updates(), 1);

        assert!(batcher.flush().is_none());
    }
}
