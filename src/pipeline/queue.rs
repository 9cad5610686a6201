//! Bounded, blocking hand-off between the producer and the writer pool
//!
//! One lock guards the pending ring and the `finished` flag; producers wait on
//! `not_full`, consumers wait on `not_empty`. `finish()` wakes every waiter on
//! both conditions so no thread stays parked after shutdown.

use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use crossbeam::utils::CachePadded;
use parking_lot::{Condvar, Mutex, MutexGuard};
use ringbuf::traits::{Consumer, Observer, RingBuffer};
use ringbuf::HeapRb;
use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, PopError};

/// What `push` does when the queue is at capacity
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueuePolicy {
    /// Block the producer until a consumer makes room (backpressure)
    #[default]
    Block,
    /// Never block: evict the oldest pending item to make room
    DropOldest,
}

impl FromStr for QueuePolicy {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().replace('-', "_").as_str() {
            "block" => Ok(Self::Block),
            "drop_oldest" => Ok(Self::DropOldest),
            _ => Err(ConfigError::UnknownPolicy(s.to_string())),
        }
    }
}

/// Fixed-capacity MPMC queue with blocking push/pop and a one-way finish signal
pub struct BoundedQueue<T> {
    state: Mutex<QueueState<T>>,
    not_empty: Condvar,
    not_full: Condvar,
    policy: QueuePolicy,
    capacity: usize,

    /// Statistics
    counters: CachePadded<Counters>,
}

struct QueueState<T> {
    ring: HeapRb<T>,
    finished: bool,
}

#[derive(Default)]
struct Counters {
    pushed: AtomicU64,
    popped: AtomicU64,
    rejected: AtomicU64,
    evicted: AtomicU64,
}

/// Snapshot of the queue's lifetime counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct QueueCounters {
    pub pushed: u64,
    pub popped: u64,
    /// Pushes refused because the queue was already finished
    pub rejected: u64,
    /// Items discarded by [`QueuePolicy::DropOldest`]
    pub evicted: u64,
}

impl<T> BoundedQueue<T> {
    /// Blocking queue holding at most `capacity` pending items.
    ///
    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn new(capacity: usize) -> Self {
        Self::with_policy(capacity, QueuePolicy::Block)
    }

    /// # Panics
    ///
    /// Panics if `capacity` is zero.
    pub fn with_policy(capacity: usize, policy: QueuePolicy) -> Self {
        assert!(capacity > 0, "queue capacity must be non-zero");
        Self {
            state: Mutex::new(QueueState {
                ring: HeapRb::new(capacity),
                finished: false,
            }),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            policy,
            capacity,
            counters: CachePadded::new(Counters::default()),
        }
    }

    /// Producer: append an item.
    ///
    /// Under [`QueuePolicy::Block`] this waits while the queue is full. Returns
    /// `false` once the queue is finished; the item is dropped in that case.
    #[must_use = "a rejected push means the queue is finished"]
    pub fn push(&self, item: T) -> bool {
        let mut state = self.state.lock();

        if self.policy == QueuePolicy::Block {
            while !state.finished && state.ring.is_full() {
                self.not_full.wait(&mut state);
            }
        }

        if state.finished {
            drop(state);
            self.counters.rejected.fetch_add(1, Ordering::Relaxed);
            return false;
        }

        // Block already waited for room, so this only overwrites under DropOldest
        let evicted = state.ring.push_overwrite(item);
        let depth = state.ring.occupied_len();
        drop(state);

        self.counters.pushed.fetch_add(1, Ordering::Relaxed);
        if evicted.is_some() {
            self.counters.evicted.fetch_add(1, Ordering::Relaxed);
            metrics::counter!("frames_evicted").increment(1);
        }
        metrics::gauge!("queue_depth").set(depth as f64);

        self.not_empty.notify_one();
        true
    }

    /// Consumer: remove the oldest pending item.
    ///
    /// Waits while the queue is empty and open. Returns `None` only when the
    /// queue is finished and fully drained.
    pub fn pop(&self) -> Option<T> {
        let mut state = self.state.lock();
        loop {
            if let Some(item) = state.ring.try_pop() {
                return Some(self.taken(state, item));
            }
            if state.finished {
                return None;
            }
            self.not_empty.wait(&mut state);
        }
    }

    /// Like [`pop`](Self::pop) but gives up after `timeout`.
    pub fn pop_timeout(&self, timeout: Duration) -> Result<T, PopError> {
        let deadline = Instant::now() + timeout;
        let mut state = self.state.lock();
        let mut timed_out = false;
        loop {
            if let Some(item) = state.ring.try_pop() {
                return Ok(self.taken(state, item));
            }
            if state.finished {
                return Err(PopError::Finished);
            }
            if timed_out {
                return Err(PopError::Timeout);
            }
            timed_out = self.not_empty.wait_until(&mut state, deadline).timed_out();
        }
    }

    fn taken(&self, state: MutexGuard<'_, QueueState<T>>, item: T) -> T {
        let depth = state.ring.occupied_len();
        drop(state);

        self.counters.popped.fetch_add(1, Ordering::Relaxed);
        metrics::gauge!("queue_depth").set(depth as f64);

        self.not_full.notify_one();
        item
    }

    /// Mark the queue finished and wake every blocked producer and consumer.
    ///
    /// Idempotent. Afterwards `push` returns `false` without blocking and `pop`
    /// drains what is left before returning `None`.
    pub fn finish(&self) {
        let mut state = self.state.lock();
        if state.finished {
            return;
        }
        state.finished = true;
        drop(state);

        self.not_empty.notify_all();
        self.not_full.notify_all();
    }

    pub fn is_finished(&self) -> bool {
        self.state.lock().finished
    }

    /// Pending item count. Advisory: may be stale as soon as it returns.
    pub fn size(&self) -> usize {
        self.state.lock().ring.occupied_len()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn policy(&self) -> QueuePolicy {
        self.policy
    }

    pub fn counters(&self) -> QueueCounters {
        QueueCounters {
            pushed: self.counters.pushed.load(Ordering::Relaxed),
            popped: self.counters.popped.load(Ordering::Relaxed),
            rejected: self.counters.rejected.load(Ordering::Relaxed),
            evicted: self.counters.evicted.load(Ordering::Relaxed),
        }
    }
}
