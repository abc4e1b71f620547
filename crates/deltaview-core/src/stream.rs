//! Stream primitives: sinks, fan-out, cold streams, and signals.
//!
//! Design intent:
//! - No callback chains hidden inside operators: a stream is an explicit
//!   attach function, and every operator's state machine lives in a plain
//!   struct that can be driven directly in tests.
//! - Delivery is synchronous on the publishing thread. A producer holds its
//!   own lock while publishing, which is what serializes the total order of
//!   messages every subscriber observes.
//! - Sinks must not call back into the structure that is delivering to them
//!   (their own upstream fan-out or signal); that is the single
//!   re-entrancy rule of the crate.

use std::sync::{Arc, Mutex, Weak};

use crate::change::ChangeSet;
use crate::sorted::SortedChangeSet;

/// One message delivered to a sink. There is no in-band error event:
/// structural failures surface synchronously at the mutating call site.
#[derive(Debug, Clone, PartialEq)]
pub enum Event<M> {
    Next(M),
    Completed,
}

/// Receiving end of a stream.
pub trait Sink<M>: Send {
    fn accept(&mut self, event: Event<M>);
}

impl<M, F> Sink<M> for F
where
    F: FnMut(Event<M>) + Send,
{
    fn accept(&mut self, event: Event<M>) {
        self(event)
    }
}

pub type SharedSink<M> = Arc<Mutex<dyn Sink<M>>>;

pub fn shared_sink<M>(sink: impl Sink<M> + 'static) -> SharedSink<M> {
    Arc::new(Mutex::new(sink))
}

/// Cancel-on-drop handle for an active subscription.
pub struct Subscription {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl Subscription {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    /// A subscription with nothing to release.
    pub fn empty() -> Self {
        Self { cancel: None }
    }

    /// Tie two subscriptions together so cancelling one handle releases
    /// both (used by operators owning an upstream registration plus a
    /// timer or secondary feed).
    pub fn join(self, other: Subscription) -> Subscription {
        let mut first = self;
        let mut second = other;
        Subscription::new(move || {
            first.run();
            second.run();
        })
    }

    pub fn unsubscribe(mut self) {
        self.run();
    }

    fn run(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.run();
    }
}

/// Subscriber registry delivering every published message to each attached
/// sink, in attach order.
pub struct Fanout<M> {
    next_id: u64,
    sinks: Vec<(u64, SharedSink<M>)>,
    completed: bool,
}

impl<M> Fanout<M> {
    pub fn new() -> Self {
        Self {
            next_id: 0,
            sinks: Vec::new(),
            completed: false,
        }
    }

    /// Register a sink. Attaching to a completed fan-out delivers
    /// `Completed` immediately.
    pub fn attach(&mut self, sink: SharedSink<M>) -> u64 {
        let id = self.next_id;
        self.next_id += 1;
        if self.completed {
            sink.lock().unwrap().accept(Event::Completed);
        } else {
            self.sinks.push((id, sink));
        }
        id
    }

    pub fn detach(&mut self, id: u64) {
        self.sinks.retain(|(sink_id, _)| *sink_id != id);
    }

    pub fn is_completed(&self) -> bool {
        self.completed
    }

    pub fn subscriber_count(&self) -> usize {
        self.sinks.len()
    }

    /// Complete the stream and release every sink.
    pub fn complete(&mut self) {
        if self.completed {
            return;
        }
        self.completed = true;
        for (_, sink) in self.sinks.drain(..) {
            sink.lock().unwrap().accept(Event::Completed);
        }
    }
}

impl<M: Clone> Fanout<M> {
    pub fn publish(&mut self, message: M) {
        if self.completed {
            return;
        }
        for (_, sink) in &self.sinks {
            sink.lock().unwrap().accept(Event::Next(message.clone()));
        }
    }
}

impl<M> Default for Fanout<M> {
    fn default() -> Self {
        Self::new()
    }
}

/// A cold, cloneable stream handle.
///
/// Subscribing runs the attach function, which wires the sink to a live
/// source. Operators compose by wrapping attach functions, so every
/// subscriber gets its own private operator state.
pub struct EventStream<M> {
    attach: Arc<dyn Fn(SharedSink<M>) -> Subscription + Send + Sync>,
}

impl<M> EventStream<M> {
    pub fn new(attach: impl Fn(SharedSink<M>) -> Subscription + Send + Sync + 'static) -> Self {
        Self {
            attach: Arc::new(attach),
        }
    }

    pub fn subscribe(&self, sink: impl Sink<M> + 'static) -> Subscription {
        (self.attach)(shared_sink(sink))
    }

    pub fn subscribe_shared(&self, sink: SharedSink<M>) -> Subscription {
        (self.attach)(sink)
    }
}

impl<M> Clone for EventStream<M> {
    fn clone(&self) -> Self {
        Self {
            attach: Arc::clone(&self.attach),
        }
    }
}

/// A live stream of plain change sets.
pub type ChangeStream<K, V> = EventStream<ChangeSet<K, V>>;

/// A live stream of sorted change sets.
pub type SortedStream<K, V> = EventStream<SortedChangeSet<K, V>>;

/// A current value plus an update feed.
///
/// Registrants read the current value with `get` and then `subscribe` for
/// later updates; `subscribe` itself delivers nothing, which keeps
/// registration free of re-entrant delivery.
pub struct Signal<T> {
    inner: Arc<Mutex<SignalInner<T>>>,
}

struct SignalInner<T> {
    current: T,
    fanout: Fanout<T>,
}

impl<T: Clone + Send + 'static> Signal<T> {
    pub fn new(initial: T) -> Self {
        Self {
            inner: Arc::new(Mutex::new(SignalInner {
                current: initial,
                fanout: Fanout::new(),
            })),
        }
    }

    pub fn get(&self) -> T {
        self.inner.lock().unwrap().current.clone()
    }

    /// Replace the current value and deliver it to every subscriber.
    pub fn set(&self, value: T) {
        let mut inner = self.inner.lock().unwrap();
        inner.current = value.clone();
        inner.fanout.publish(value);
    }

    pub fn subscribe(&self, sink: impl Sink<T> + 'static) -> Subscription {
        let id = self.inner.lock().unwrap().fanout.attach(shared_sink(sink));
        let weak = Arc::downgrade(&self.inner);
        Subscription::new(move || detach_signal(weak, id))
    }
}

fn detach_signal<T>(weak: Weak<Mutex<SignalInner<T>>>, id: u64) {
    if let Some(inner) = weak.upgrade() {
        inner.lock().unwrap().fanout.detach(id);
    }
}

impl<T> Clone for Signal<T> {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dropping_a_subscription_detaches_the_sink() {
        let signal = Signal::new(0u32);
        let seen = Arc::new(Mutex::new(Vec::new()));

        let recorder = Arc::clone(&seen);
        let subscription = signal.subscribe(move |event: Event<u32>| {
            if let Event::Next(value) = event {
                recorder.lock().unwrap().push(value);
            }
        });

        signal.set(1);
        subscription.unsubscribe();
        signal.set(2);

        assert_eq!(*seen.lock().unwrap(), vec![1]);
        assert_eq!(signal.get(), 2);
    }

    #[test]
    fn completed_fanout_rejects_publishes_and_notifies_late_sinks() {
        let mut fanout: Fanout<u8> = Fanout::new();
        let completed = Arc::new(Mutex::new(false));

        fanout.complete();
        fanout.publish(1);

        let flag = Arc::clone(&completed);
        fanout.attach(shared_sink(move |event: Event<u8>| {
            if matches!(event, Event::Completed) {
                *flag.lock().unwrap() = true;
            }
        }));

        assert!(*completed.lock().unwrap());
        assert_eq!(fanout.subscriber_count(), 0);
    }
}
