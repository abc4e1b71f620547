#![forbid(unsafe_code)]
//! deltaview-core: change-set algebra, stream primitives, clocks, and
//! materialization utilities.
//!
//! Design intent:
//! - Keep this crate pure and synchronous: no I/O, no runtime, no ambient
//!   time (time-driven operators take a `clock::Scheduler`).
//! - Downstream crates (cache, operators, bind) build on the `Sink`/
//!   `EventStream` seams defined here.
//! - Folding every emitted change set from empty state must reproduce the
//!   producer's exact current state; `materialize::CacheState` is that
//!   oracle and the conformance tests lean on it.

pub mod change;
pub mod clock;
pub mod error;
pub mod materialize;
pub mod prelude;
pub mod sorted;
pub mod stream;

pub use change::{Change, ChangeSet};
pub use error::{Error, Result};
pub use sorted::{SortReason, SortedChangeSet};
pub use stream::{ChangeStream, Event, EventStream, Signal, Sink, SortedStream, Subscription};
