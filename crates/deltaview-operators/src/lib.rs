#![forbid(unsafe_code)]
//! deltaview-operators: derived operators over change-set streams.
//!
//! Design intent:
//! - Each operator's state machine is a plain struct (`Sorter`, `Batcher`,
//!   `TrueForAll`) that can be driven directly in tests, without a cache
//!   or a live clock.
//! - Stream wiring lives in `ext::ChangeStreamOps`; every subscriber gets
//!   its own private operator state and never mutates upstream.
//! - The batch operator is the only time-driven piece and depends on the
//!   injected `Scheduler` from core, never ambient time.

pub mod batch;
pub mod comparer;
pub mod ext;
pub mod sort;
pub mod true_for_all;

pub use batch::Batcher;
pub use comparer::Comparer;
pub use ext::ChangeStreamOps;
pub use sort::{Sorter, DEFAULT_RESET_THRESHOLD};
pub use true_for_all::TrueForAll;
