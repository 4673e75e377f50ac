//! Timers over an injectable clock
//!
//! Every suspension the chrome needs (auto-hide, fade completion, debounced
//! focus-out, deferred resize) is a one-shot timer in a per-player
//! [`TimerQueue`]. The queue never sleeps; the event loop asks for the next
//! deadline and calls [`TimerQueue::take_due`] when it passes.

use std::cell::Cell;
use std::fmt;
use std::rc::Rc;
use std::time::Duration;

use tokio::time::Instant;

/// Source of the current time
pub trait Clock: fmt::Debug {
    fn now(&self) -> Instant;
}

pub type SharedClock = Rc<dyn Clock>;

/// Wall clock backed by tokio's time driver (pausable under `test-util`)
#[derive(Debug, Default, Clone, Copy)]
pub struct TokioClock;

impl Clock for TokioClock {
    fn now(&self) -> Instant {
        Instant::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    origin: Instant,
    offset: Cell<Duration>,
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl ManualClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
            offset: Cell::new(Duration::ZERO),
        }
    }

    pub fn advance(&self, by: Duration) {
        self.offset.set(self.offset.get() + by);
    }

    pub fn elapsed(&self) -> Duration {
        self.offset.get()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Instant {
        self.origin + self.offset.get()
    }
}

/// Handle to a scheduled timer
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TimerId(u64);

#[derive(Debug)]
struct Pending<K> {
    id: TimerId,
    deadline: Instant,
    kind: K,
}

/// One-shot timers tagged with a `K`
pub struct TimerQueue<K> {
    clock: SharedClock,
    next_id: u64,
    pending: Vec<Pending<K>>,
}

impl<K: fmt::Debug> fmt::Debug for TimerQueue<K> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TimerQueue")
            .field("pending", &self.pending)
            .finish()
    }
}

impl<K: Copy> TimerQueue<K> {
    pub fn new(clock: SharedClock) -> Self {
        Self {
            clock,
            next_id: 0,
            pending: Vec::new(),
        }
    }

    pub fn now(&self) -> Instant {
        self.clock.now()
    }

    pub fn schedule(&mut self, delay: Duration, kind: K) -> TimerId {
        let id = TimerId(self.next_id);
        self.next_id += 1;
        self.pending.push(Pending {
            id,
            deadline: self.clock.now() + delay,
            kind,
        });
        id
    }

    /// Cancel a timer. Returns false if it already fired or was cancelled.
    pub fn cancel(&mut self, id: TimerId) -> bool {
        let before = self.pending.len();
        self.pending.retain(|p| p.id != id);
        before != self.pending.len()
    }

    /// Cancel every pending timer, returning how many there were
    pub fn clear(&mut self) -> usize {
        let count = self.pending.len();
        self.pending.clear();
        count
    }

    pub fn is_pending(&self, id: TimerId) -> bool {
        self.pending.iter().any(|p| p.id == id)
    }

    pub fn deadline(&self, id: TimerId) -> Option<Instant> {
        self.pending.iter().find(|p| p.id == id).map(|p| p.deadline)
    }

    pub fn next_deadline(&self) -> Option<Instant> {
        self.pending.iter().map(|p| p.deadline).min()
    }

    pub fn len(&self) -> usize {
        self.pending.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Count pending timers matching `pred`
    pub fn count_where(&self, pred: impl Fn(&K) -> bool) -> usize {
        self.pending.iter().filter(|p| pred(&p.kind)).count()
    }

    /// Remove and return every timer whose deadline has passed, earliest first
    pub fn take_due(&mut self) -> Vec<(TimerId, K)> {
        let now = self.clock.now();
        let mut due: Vec<Pending<K>> = Vec::new();
        let mut i = 0;
        while i < self.pending.len() {
            if self.pending[i].deadline <= now {
                due.push(self.pending.remove(i));
            } else {
                i += 1;
            }
        }
        due.sort_by_key(|p| (p.deadline, p.id));
        due.into_iter().map(|p| (p.id, p.kind)).collect()
    }
}
