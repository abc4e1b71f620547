//! Change sets carrying a total order.

use serde::{Deserialize, Serialize};

use crate::change::ChangeSet;

/// Why a sorted emission happened.
///
/// `ComparerChanged` classifies the trigger of a comparer swap; before
/// emission it is downgraded to `Reorder` (bounded positional patching) or
/// `Reset` (full rebuild), so consumers only ever observe the other four.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SortReason {
    InitialLoad,
    DataChanged,
    Reorder,
    Reset,
    ComparerChanged,
}

/// A change set plus the complete target order it results in.
///
/// `items` is always the full ordered sequence, so consumers that ignore
/// move granularity still observe correct state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SortedChangeSet<K, V> {
    reason: SortReason,
    changes: ChangeSet<K, V>,
    items: Vec<(K, V)>,
}

impl<K, V> SortedChangeSet<K, V> {
    pub fn new(reason: SortReason, changes: ChangeSet<K, V>, items: Vec<(K, V)>) -> Self {
        Self {
            reason,
            changes,
            items,
        }
    }

    pub fn reason(&self) -> SortReason {
        self.reason
    }

    pub fn changes(&self) -> &ChangeSet<K, V> {
        &self.changes
    }

    /// The ordered (key, value) sequence after applying this change set.
    pub fn items(&self) -> &[(K, V)] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }
}
