//! Deferred task execution for the session controller.
//!
//! Tasks are plain values rather than closures: the owner schedules a task,
//! later drains the due ones with [`Scheduler::poll_due`] and dispatches them
//! itself. Everything runs on the caller's thread, so a countdown expiring
//! and a last-moment submission can never interleave.

use std::cell::Cell;
use std::collections::BTreeMap;
use std::rc::Rc;
use std::time::{Duration, Instant};

/// Opaque ticket for a scheduled task.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct TaskHandle(u64);

/// Source of "now" for a scheduler, measured from an arbitrary origin.
pub trait Clock {
    fn now(&self) -> Duration;
}

/// Wall clock for the running game.
#[derive(Debug, Clone, Copy)]
pub struct MonotonicClock {
    origin: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }
}

/// Manually advanced clock. Clones share the same time.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    now: Rc<Cell<Duration>>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }

    pub fn set(&self, to: Duration) {
        self.now.set(to);
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.now.get()
    }
}

/// "Run this after N milliseconds" and "never mind".
pub trait Scheduler<T> {
    fn schedule(&mut self, delay: Duration, task: T) -> TaskHandle;

    /// Cancelling an unknown, fired or already cancelled handle is a no-op.
    fn cancel(&mut self, handle: TaskHandle);

    fn is_pending(&self, handle: TaskHandle) -> bool;

    fn pending(&self) -> usize;

    fn now(&self) -> Duration;

    /// Remove and return every task whose deadline has passed, earliest
    /// first. Tasks sharing a deadline come out in scheduling order.
    fn poll_due(&mut self) -> Vec<T>;

    /// Time until the next deadline, if anything is pending.
    fn next_deadline_in(&self) -> Option<Duration>;

    fn cancel_all(&mut self);
}

/// Deadline-ordered task queue over a [`Clock`].
#[derive(Debug)]
pub struct TimerQueue<T, C: Clock = MonotonicClock> {
    clock: C,
    next_id: u64,
    // (deadline, id) orders by time, then by scheduling order
    tasks: BTreeMap<(Duration, u64), T>,
    deadlines: BTreeMap<u64, Duration>,
}

impl<T, C: Clock> TimerQueue<T, C> {
    pub fn new(clock: C) -> Self {
        Self {
            clock,
            next_id: 0,
            tasks: BTreeMap::new(),
            deadlines: BTreeMap::new(),
        }
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }
}

impl<T> Default for TimerQueue<T, MonotonicClock> {
    fn default() -> Self {
        Self::new(MonotonicClock::new())
    }
}

impl<T, C: Clock> Scheduler<T> for TimerQueue<T, C> {
    fn schedule(&mut self, delay: Duration, task: T) -> TaskHandle {
        let id = self.next_id;
        self.next_id += 1;
        let deadline = self.clock.now() + delay;
        self.tasks.insert((deadline, id), task);
        self.deadlines.insert(id, deadline);
        TaskHandle(id)
    }

    fn cancel(&mut self, handle: TaskHandle) {
        if let Some(deadline) = self.deadlines.remove(&handle.0) {
            self.tasks.remove(&(deadline, handle.0));
        }
    }

    fn is_pending(&self, handle: TaskHandle) -> bool {
        self.deadlines.contains_key(&handle.0)
    }

    fn pending(&self) -> usize {
        self.tasks.len()
    }

    fn now(&self) -> Duration {
        self.clock.now()
    }

    fn poll_due(&mut self) -> Vec<T> {
        let now = self.clock.now();
        let mut due = Vec::new();
        while let Some(entry) = self.tasks.first_entry() {
            if entry.key().0 > now {
                break;
            }
            let ((_, id), task) = entry.remove_entry();
            self.deadlines.remove(&id);
            due.push(task);
        }
        due
    }

    fn next_deadline_in(&self) -> Option<Duration> {
        let now = self.clock.now();
        self.tasks
            .keys()
            .next()
            .map(|(deadline, _)| deadline.saturating_sub(now))
    }

    fn cancel_all(&mut self) {
        self.tasks.clear();
        self.deadlines.clear();
    }
}
