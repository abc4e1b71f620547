//! Convenient re-exports for downstream crates.

pub use crate::change::{Change, ChangeSet};
pub use crate::clock::{Scheduler, ThreadScheduler, TimerHandle, VirtualScheduler};
pub use crate::error::{Error, Result};
pub use crate::materialize::{CacheState, ChangeSetAggregator, SortedChangeSetAggregator};
pub use crate::sorted::{SortReason, SortedChangeSet};
pub use crate::stream::{
    shared_sink, ChangeStream, Event, EventStream, Fanout, SharedSink, Signal, Sink, SortedStream,
    Subscription,
};
