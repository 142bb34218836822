//! Native RTOS message queue backend.
//!
//! [`RtosQueue`] is the primitive the target OS provides: a fixed-size queue
//! whose `take`/`put` accept a timeout in ticks. [`HostQueue`] is the hosted
//! port of that primitive, and [`NativeQueue`] adapts any such primitive to
//! the [`QueueBackend`] contract.

use core::time::Duration;
use std::time::Instant;

use heapless::Deque;
use parking_lot::{Condvar, Mutex};

use crate::item::WorkItem;
use crate::queue::{QueueBackend, DEFAULT_QUEUE_CAPACITY};

/// Length of one RTOS tick on hosted ports.
pub const TICK: Duration = Duration::from_millis(1);

/// Ticks the native backend waits for an item before reporting idle.
pub const NATIVE_TAKE_WAIT_TICKS: u32 = 100;

/// Blocking budget for a queue operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Timeout {
    /// Give up after this many ticks; zero polls once.
    Ticks(u32),
    /// Block until the operation succeeds.
    Forever,
}

impl Timeout {
    fn deadline(self) -> Option<Instant> {
        match self {
            Self::Ticks(ticks) => Some(Instant::now() + TICK * ticks),
            Self::Forever => None,
        }
    }
}

/// Message queue primitive of the target OS.
pub trait RtosQueue: Send + Sync {
    /// Dequeues the oldest item, waiting up to `timeout`.
    fn take(&self, timeout: Timeout) -> Option<WorkItem>;

    /// Enqueues `item`, waiting up to `timeout` for space.
    ///
    /// Returns the item back if the queue stayed full.
    fn put(&self, item: WorkItem, timeout: Timeout) -> Result<(), WorkItem>;

    fn capacity(&self) -> usize;
    fn len(&self) -> usize;
}

/// Hosted RTOS queue holding up to `N` items.
pub struct HostQueue<const N: usize = DEFAULT_QUEUE_CAPACITY> {
    slots: Mutex<Deque<WorkItem, N>>,
    not_empty: Condvar,
    not_full: Condvar,
}

impl<const N: usize> HostQueue<N> {
    pub fn new() -> Self {
        Self {
            slots: Mutex::new(Deque::new()),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
        }
    }
}

impl<const N: usize> Default for HostQueue<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> RtosQueue for HostQueue<N> {
    fn take(&self, timeout: Timeout) -> Option<WorkItem> {
        let deadline = timeout.deadline();
        let mut slots = self.slots.lock();
        loop {
            if let Some(item) = slots.pop_front() {
                self.not_full.notify_one();
                return Some(item);
            }
            match deadline {
                None => self.not_empty.wait(&mut slots),
                Some(deadline) => {
                    if self.not_empty.wait_until(&mut slots, deadline).timed_out() {
                        let item = slots.pop_front();
                        if item.is_some() {
                            self.not_full.notify_one();
                        }
                        return item;
                    }
                }
            }
        }
    }

    fn put(&self, item: WorkItem, timeout: Timeout) -> Result<(), WorkItem> {
        let deadline = timeout.deadline();
        let mut slots = self.slots.lock();
        let mut item = item;
        loop {
            match slots.push_back(item) {
                Ok(()) => {
                    self.not_empty.notify_one();
                    return Ok(());
                }
                Err(rejected) => item = rejected,
            }
            match deadline {
                None => self.not_full.wait(&mut slots),
                Some(deadline) => {
                    if self.not_full.wait_until(&mut slots, deadline).timed_out() {
                        return match slots.push_back(item) {
                            Ok(()) => {
                                self.not_empty.notify_one();
                                Ok(())
                            }
                            Err(rejected) => Err(rejected),
                        };
                    }
                }
            }
        }
    }

    fn capacity(&self) -> usize {
        N
    }

    fn len(&self) -> usize {
        self.slots.lock().len()
    }
}

/// Backend over an RTOS message queue.
///
/// `put` never gives up: a full queue stalls the producer rather than
/// losing a cross-thread call.
pub struct NativeQueue<Q: RtosQueue = HostQueue> {
    queue: Q,
}

impl NativeQueue<HostQueue> {
    /// Native backend with the default capacity on the hosted port.
    pub fn new() -> Self {
        Self::from_queue(HostQueue::new())
    }
}

impl Default for NativeQueue<HostQueue> {
    fn default() -> Self {
        Self::new()
    }
}

impl<Q: RtosQueue> NativeQueue<Q> {
    pub fn from_queue(queue: Q) -> Self {
        Self { queue }
    }

    pub fn inner(&self) -> &Q {
        &self.queue
    }
}

impl<Q: RtosQueue> QueueBackend for NativeQueue<Q> {
    fn try_take(&self) -> Option<WorkItem> {
        self.queue.take(Timeout::Ticks(NATIVE_TAKE_WAIT_TICKS))
    }

    fn put(&self, item: WorkItem) {
        let mut item = item;
        loop {
            match self.queue.put(item, Timeout::Forever) {
                Ok(()) => return,
                Err(rejected) => item = rejected,
            }
        }
    }

    fn capacity(&self) -> usize {
        self.queue.capacity()
    }

    fn len(&self) -> usize {
        self.queue.len()
    }
}
