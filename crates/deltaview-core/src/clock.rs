//! Clock/scheduler abstraction for time-driven operators.
//!
//! Operators never read ambient wall time. They take a `Scheduler`, so the
//! same code runs against the deterministic `VirtualScheduler` in tests
//! (advance logical time instantly) and against `ThreadScheduler` in
//! production.

use std::collections::HashSet;
use std::sync::mpsc;
use std::sync::{Arc, Mutex, OnceLock};
use std::thread;
use std::time::{Duration, Instant};

/// Wake-up source for time-driven operators.
pub trait Scheduler: Send + Sync {
    /// Current logical time.
    fn now(&self) -> Duration;

    /// Invoke `task` every `period` until the returned handle is dropped.
    fn schedule_periodic(&self, period: Duration, task: Box<dyn FnMut() + Send>) -> TimerHandle;
}

/// Cancel-on-drop handle for a scheduled timer.
pub struct TimerHandle {
    cancel: Option<Box<dyn FnOnce() + Send>>,
}

impl TimerHandle {
    pub fn new(cancel: impl FnOnce() + Send + 'static) -> Self {
        Self {
            cancel: Some(Box::new(cancel)),
        }
    }

    pub fn cancel(mut self) {
        self.run();
    }

    fn run(&mut self) {
        if let Some(cancel) = self.cancel.take() {
            cancel();
        }
    }
}

impl Drop for TimerHandle {
    fn drop(&mut self) {
        self.run();
    }
}

struct TimerEntry {
    id: u64,
    due: Duration,
    period: Duration,
    task: Box<dyn FnMut() + Send>,
}

#[derive(Default)]
struct VirtualQueue {
    now: Duration,
    next_id: u64,
    entries: Vec<TimerEntry>,
    // Timers cancelled while their task is mid-flight.
    cancelled: HashSet<u64>,
}

/// Deterministic logical clock. Time only moves when the owner calls
/// `advance_by`/`advance_to`; due timers fire in due-time order (ties by
/// registration order) and periodic timers re-arm after each fire.
#[derive(Clone, Default)]
pub struct VirtualScheduler {
    inner: Arc<Mutex<VirtualQueue>>,
}

impl VirtualScheduler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance_by(&self, delta: Duration) {
        let deadline = self.inner.lock().unwrap().now + delta;
        self.advance_to(deadline);
    }

    pub fn advance_to(&self, deadline: Duration) {
        loop {
            let mut queue = self.inner.lock().unwrap();
            let next = queue
                .entries
                .iter()
                .enumerate()
                .filter(|(_, entry)| entry.due <= deadline)
                .min_by_key(|(_, entry)| (entry.due, entry.id))
                .map(|(position, _)| position);

            let Some(position) = next else {
                if queue.now < deadline {
                    queue.now = deadline;
                }
                return;
            };

            let mut entry = queue.entries.remove(position);
            queue.now = entry.due;
            drop(queue);

            (entry.task)();

            let mut queue = self.inner.lock().unwrap();
            if queue.cancelled.remove(&entry.id) || entry.period.is_zero() {
                continue;
            }
            entry.due += entry.period;
            queue.entries.push(entry);
        }
    }
}

impl Scheduler for VirtualScheduler {
    fn now(&self) -> Duration {
        self.inner.lock().unwrap().now
    }

    fn schedule_periodic(&self, period: Duration, task: Box<dyn FnMut() + Send>) -> TimerHandle {
        let mut queue = self.inner.lock().unwrap();
        let id = queue.next_id;
        queue.next_id += 1;
        let due = queue.now + period;
        queue.entries.push(TimerEntry {
            id,
            due,
            period,
            task,
        });
        drop(queue);

        let inner = Arc::clone(&self.inner);
        TimerHandle::new(move || {
            let mut queue = inner.lock().unwrap();
            if let Some(position) = queue.entries.iter().position(|entry| entry.id == id) {
                queue.entries.remove(position);
            } else {
                queue.cancelled.insert(id);
            }
        })
    }
}

fn process_epoch() -> Instant {
    static EPOCH: OnceLock<Instant> = OnceLock::new();
    *EPOCH.get_or_init(Instant::now)
}

/// Wall-clock scheduler backed by one thread per timer. The thread parks on
/// a stop channel with a timeout, so cancelling the handle stops it at the
/// next wake-up.
#[derive(Clone, Copy, Default)]
pub struct ThreadScheduler;

impl ThreadScheduler {
    pub fn new() -> Self {
        Self
    }
}

impl Scheduler for ThreadScheduler {
    fn now(&self) -> Duration {
        process_epoch().elapsed()
    }

    fn schedule_periodic(&self, period: Duration, mut task: Box<dyn FnMut() + Send>) -> TimerHandle {
        let (stop_tx, stop_rx) = mpsc::channel::<()>();
        thread::spawn(move || loop {
            match stop_rx.recv_timeout(period) {
                Err(mpsc::RecvTimeoutError::Timeout) => task(),
                _ => break,
            }
        });
        TimerHandle::new(move || {
            let _ = stop_tx.send(());
        })
    }
}
