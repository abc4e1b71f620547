#![forbid(unsafe_code)]
//! deltaview-bind: terminal adapters for ordered sequences.
//!
//! Replays (sorted) change sets into an externally owned ordered sequence
//! using minimal edits, so after folding a stream's full history the bound
//! sequence equals the materialized, comparer-ordered source state.

pub mod adapter;

pub use adapter::{ListAdapter, OrderedSink, SortedListAdapter, SortedStreamExt};
