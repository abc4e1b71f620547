//! Stream composition: the chainable operator surface.
//!
//! Every method wires a fresh operator state per subscription, so two
//! subscribers to the same derived stream never share shadow state, and
//! dropping a subscription releases that state together with any timer or
//! secondary-feed registration.

use std::hash::Hash;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use deltaview_core::prelude::*;

use crate::batch::Batcher;
use crate::comparer::Comparer;
use crate::sort::Sorter;
use crate::true_for_all::{process_change_set, TrueForAll};

/// Operators over a live change-set stream.
pub trait ChangeStreamOps<K, V> {
    /// Maintain a derived total order under a fixed comparer.
    fn sort(&self, comparer: Comparer<V>, reset_threshold: usize) -> SortedStream<K, V>;

    /// Maintain a derived total order under a comparer that may be
    /// replaced at runtime through `comparers`.
    fn sort_with(&self, comparers: Signal<Comparer<V>>, reset_threshold: usize)
        -> SortedStream<K, V>;

    /// Buffer upstream change sets and emit one coalesced set per window
    /// boundary. Fails fast on a non-positive window.
    fn batch(
        &self,
        window: Duration,
        scheduler: Arc<dyn Scheduler>,
    ) -> Result<ChangeStream<K, V>>;

    /// `AND(predicate(latest))` over every item's secondary signal.
    fn true_for_all<S, F, P>(&self, signal_of: F, predicate: P) -> EventStream<bool>
    where
        S: Clone + Send + 'static,
        F: Fn(&V) -> Signal<S> + Send + Sync + 'static,
        P: Fn(&S) -> bool + Send + Sync + 'static;
}

impl<K, V> ChangeStreamOps<K, V> for ChangeStream<K, V>
where
    K: Clone + Eq + Hash + Send + 'static,
    V: Clone + Send + 'static,
{
    fn sort(&self, comparer: Comparer<V>, reset_threshold: usize) -> SortedStream<K, V> {
        self.sort_with(Signal::new(comparer), reset_threshold)
    }

    fn sort_with(
        &self,
        comparers: Signal<Comparer<V>>,
        reset_threshold: usize,
    ) -> SortedStream<K, V> {
        let upstream = self.clone();
        EventStream::new(move |sink: SharedSink<SortedChangeSet<K, V>>| {
            let sorter = Arc::new(Mutex::new(Sorter::new(comparers.get(), reset_threshold)));

            let comparer_watch = {
                let sorter = Arc::clone(&sorter);
                let sink = Arc::clone(&sink);
                comparers.subscribe(move |event: Event<Comparer<V>>| {
                    if let Event::Next(comparer) = event {
                        let emission = sorter.lock().unwrap().apply_comparer(comparer);
                        if let Some(message) = emission {
                            sink.lock().unwrap().accept(Event::Next(message));
                        }
                    }
                })
            };

            let data = {
                let sorter = Arc::clone(&sorter);
                let sink = Arc::clone(&sink);
                upstream.subscribe(move |event: Event<ChangeSet<K, V>>| match event {
                    Event::Next(changes) => {
                        let emission = sorter.lock().unwrap().apply_changes(&changes);
                        if let Some(message) = emission {
                            sink.lock().unwrap().accept(Event::Next(message));
                        }
                    }
                    Event::Completed => sink.lock().unwrap().accept(Event::Completed),
                })
            };

            data.join(comparer_watch)
        })
    }

    fn batch(
        &self,
        window: Duration,
        scheduler: Arc<dyn Scheduler>,
    ) -> Result<ChangeStream<K, V>> {
        if window.is_zero() {
            return Err(Error::Config("batch window must be positive".into()));
        }
        let upstream = self.clone();
        Ok(EventStream::new(move |sink: SharedSink<ChangeSet<K, V>>| {
            let batcher = Arc::new(Mutex::new(Batcher::new()));

            let timer = {
                let batcher = Arc::clone(&batcher);
                let sink = Arc::clone(&sink);
                scheduler.schedule_periodic(
                    window,
                    Box::new(move || {
                        if let Some(combined) = batcher.lock().unwrap().flush() {
                            sink.lock().unwrap().accept(Event::Next(combined));
                        }
                    }),
                )
            };

            let data = {
                let batcher = Arc::clone(&batcher);
                let sink = Arc::clone(&sink);
                upstream.subscribe(move |event: Event<ChangeSet<K, V>>| match event {
                    Event::Next(changes) => batcher.lock().unwrap().push(changes),
                    Event::Completed => {
                        if let Some(combined) = batcher.lock().unwrap().flush() {
                            sink.lock().unwrap().accept(Event::Next(combined));
                        }
                        sink.lock().unwrap().accept(Event::Completed);
                    }
                })
            };

            // Dropping the joined handle cancels the timer and discards
            // anything still buffered, without emitting it.
            data.join(Subscription::new(move || drop(timer)))
        }))
    }

    fn true_for_all<S, F, P>(&self, signal_of: F, predicate: P) -> EventStream<bool>
    where
        S: Clone + Send + 'static,
        F: Fn(&V) -> Signal<S> + Send + Sync + 'static,
        P: Fn(&S) -> bool + Send + Sync + 'static,
    {
        let upstream = self.clone();
        let signal_of: Arc<dyn Fn(&V) -> Signal<S> + Send + Sync> = Arc::new(signal_of);
        let predicate: Arc<dyn Fn(&S) -> bool + Send + Sync> = Arc::new(predicate);
        EventStream::new(move |sink: SharedSink<bool>| {
            let state = Arc::new(Mutex::new(TrueForAll::new(Arc::clone(&predicate))));

            let signal_of = Arc::clone(&signal_of);
            let state_for_events = Arc::clone(&state);
            let sink = Arc::clone(&sink);
            upstream.subscribe(move |event: Event<ChangeSet<K, V>>| match event {
                Event::Next(changes) => {
                    process_change_set(&state_for_events, &sink, &signal_of, &changes);
                }
                Event::Completed => sink.lock().unwrap().accept(Event::Completed),
            })
        })
    }
}
