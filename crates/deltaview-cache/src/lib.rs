#![forbid(unsafe_code)]
//! deltaview-cache: the keyed source of truth.
//!
//! Owns the authoritative key→value map, publishes every mutation as one
//! change set, and hands out composable change-set streams via `connect`.

pub mod cache;

pub use cache::KeyedCache;
