//! Queue backends feeding an active object.
//!
//! The run loop only talks to [`QueueBackend`]; the concrete backend is
//! injected when the active object is constructed. [`ChannelQueue`] is the
//! portable software channel used on hosts and in tests, while
//! [`NativeQueue`](crate::native::NativeQueue) wraps an RTOS message queue.

use crossbeam::channel::{self, Receiver, Sender, TryRecvError};

use crate::item::WorkItem;

/// Default number of items a backend holds before producers block.
pub const DEFAULT_QUEUE_CAPACITY: usize = 50;

/// Bounded FIFO of work items.
///
/// `put` may block but never drops an item; `try_take` waits at most the
/// backend's own budget and returns `None` if nothing arrived.
pub trait QueueBackend: Send + Sync {
    fn try_take(&self) -> Option<WorkItem>;
    fn put(&self, item: WorkItem);
    fn capacity(&self) -> usize;
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Fixed-capacity software channel.
pub struct ChannelQueue {
    tx: Sender<WorkItem>,
    rx: Receiver<WorkItem>,
    capacity: usize,
}

impl ChannelQueue {
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_QUEUE_CAPACITY)
    }

    pub fn with_capacity(capacity: usize) -> Self {
        let (tx, rx) = channel::bounded(capacity);
        Self { tx, rx, capacity }
    }
}

impl Default for ChannelQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl QueueBackend for ChannelQueue {
    /// Single non-blocking receive attempt.
    fn try_take(&self) -> Option<WorkItem> {
        match self.rx.try_recv() {
            Ok(item) => Some(item),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => {
                log::error!("channel queue disconnected while its owner is alive");
                None
            }
        }
    }

    /// Blocks while the channel is full.
    fn put(&self, item: WorkItem) {
        // Both ends live in `self`, so the send cannot observe a disconnect.
        if let Err(err) = self.tx.send(item) {
            log::error!("channel queue rejected {:?}", err.into_inner());
        }
    }

    fn capacity(&self) -> usize {
        self.capacity
    }

    fn len(&self) -> usize {
        self.rx.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::sync::{Arc, Mutex};
    use std::thread;
    use std::time::Duration;

    fn tagged(log: &Arc<Mutex<Vec<u32>>>, tag: u32) -> WorkItem {
        let log = log.clone();
        WorkItem::task(move || log.lock().unwrap().push(tag))
    }

    #[test]
    fn channel_is_fifo() {
        let queue = ChannelQueue::with_capacity(4);
        let log = Arc::new(Mutex::new(Vec::new()));
        for tag in 1..=3 {
            queue.put(tagged(&log, tag));
        }
        assert_eq!(queue.len(), 3);

        while let Some(mut item) = queue.try_take() {
            item.invoke();
            item.dispose();
        }
        assert_eq!(*log.lock().unwrap(), vec![1, 2, 3]);
        assert!(queue.is_empty());
    }

    #[test]
    fn empty_channel_returns_none_immediately() {
        let queue = ChannelQueue::new();
        assert_eq!(queue.capacity(), DEFAULT_QUEUE_CAPACITY);
        assert!(queue.try_take().is_none());
    }

    #[test]
    fn put_blocks_until_space() {
        let queue = Arc::new(ChannelQueue::with_capacity(1));
        queue.put(WorkItem::task(|| {}));

        let done = Arc::new(AtomicBool::new(false));
        let producer = {
            let queue = queue.clone();
            let done = done.clone();
            thread::spawn(move || {
                queue.put(WorkItem::task(|| {}));
                done.store(true, Ordering::SeqCst);
            })
        };

        thread::sleep(Duration::from_millis(50));
        assert!(!done.load(Ordering::SeqCst));

        assert!(queue.try_take().is_some());
        producer.join().unwrap();
        assert!(done.load(Ordering::SeqCst));
        assert_eq!(queue.len(), 1);
    }
}
