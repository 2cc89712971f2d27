//! Single-producer/single-consumer bounded queue with blocking backpressure.
//!
//! Unlike [`crate::spsc::SpscRingBuffer`], which is lock-free and meant for
//! the real-time callback, this queue blocks: it is the hand-off between a
//! graph thread and a file reader/writer worker thread, where waiting is
//! the correct behavior rather than a dropped block.

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex};
use std::time::Duration;

struct Inner<T> {
    items: Mutex<VecDeque<T>>,
    not_empty: Condvar,
    not_full: Condvar,
    high_water_mark: usize,
    closed: std::sync::atomic::AtomicBool,
}

/// Creates a producer/consumer pair sharing one bounded FIFO.
pub fn bounded_queue<T>(high_water_mark: usize) -> (QueueProducer<T>, QueueConsumer<T>) {
    let inner = Arc::new(Inner {
        items: Mutex::new(VecDeque::with_capacity(high_water_mark)),
        not_empty: Condvar::new(),
        not_full: Condvar::new(),
        high_water_mark,
        closed: std::sync::atomic::AtomicBool::new(false),
    });
    (QueueProducer { inner: Arc::clone(&inner) }, QueueConsumer { inner })
}

/// Error returned by a blocking push/pop when the queue has been closed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Closed;

pub struct QueueProducer<T> {
    inner: Arc<Inner<T>>,
}

impl<T> QueueProducer<T> {
    /// Blocks until there is room, then pushes. Returns `Err(Closed)` if the
    /// queue was closed while waiting.
    pub fn push(&self, item: T) -> Result<(), Closed> {
        let mut items = self.inner.items.lock().unwrap();
        loop {
            if self.inner.closed.load(std::sync::atomic::Ordering::Acquire) {
                return Err(Closed);
            }
            if items.len() < self.inner.high_water_mark {
                items.push_back(item);
                self.inner.not_empty.notify_one();
                return Ok(());
            }
            items = self.inner.not_full.wait(items).unwrap();
        }
    }

    /// Pushes without blocking; returns the item back if the queue is full
    /// or closed.
    pub fn try_push(&self, item: T) -> Result<(), T> {
        let mut items = self.inner.items.lock().unwrap();
        if self.inner.closed.load(std::sync::atomic::Ordering::Acquire) || items.len() >= self.inner.high_water_mark {
            return Err(item);
        }
        items.push_back(item);
        self.inner.not_empty.notify_one();
        Ok(())
    }

    pub fn close(&self) {
        self.inner.closed.store(true, std::sync::atomic::Ordering::Release);
        self.inner.not_empty.notify_all();
        self.inner.not_full.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(std::sync::atomic::Ordering::Acquire)
    }
}

pub struct QueueConsumer<T> {
    inner: Arc<Inner<T>>,
}

impl<T> QueueConsumer<T> {
    /// Blocks until an item is available or the queue is closed and
    /// drained.
    pub fn pop(&self) -> Result<T, Closed> {
        let mut items = self.inner.items.lock().unwrap();
        loop {
            if let Some(item) = items.pop_front() {
                self.inner.not_full.notify_one();
                return Ok(item);
            }
            if self.inner.closed.load(std::sync::atomic::Ordering::Acquire) {
                return Err(Closed);
            }
            items = self.inner.not_empty.wait(items).unwrap();
        }
    }

    /// Blocks for at most `timeout`, returning `Ok(None)` on timeout without
    /// treating it as closure.
    pub fn pop_timeout(&self, timeout: Duration) -> Result<Option<T>, Closed> {
        let mut items = self.inner.items.lock().unwrap();
        loop {
            if let Some(item) = items.pop_front() {
                self.inner.not_full.notify_one();
                return Ok(Some(item));
            }
            if self.inner.closed.load(std::sync::atomic::Ordering::Acquire) {
                return Err(Closed);
            }
            let (guard, result) = self.inner.not_empty.wait_timeout(items, timeout).unwrap();
            items = guard;
            if result.timed_out() {
                return Ok(None);
            }
        }
    }

    pub fn try_pop(&self) -> Option<T> {
        let mut items = self.inner.items.lock().unwrap();
        let item = items.pop_front();
        if item.is_some() {
            self.inner.not_full.notify_one();
        }
        item
    }

    /// Drains and returns every remaining item, e.g. to release pooled
    /// buffers back to their pool on `close()`.
    pub fn drain(&self) -> Vec<T> {
        let mut items = self.inner.items.lock().unwrap();
        self.inner.not_full.notify_all();
        items.drain(..).collect()
    }

    pub fn is_closed(&self) -> bool {
        self.inner.closed.load(std::sync::atomic::Ordering::Acquire)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn fifo_order_preserved() {
        let (tx, rx) = bounded_queue::<i32>(4);
        tx.push(1).unwrap();
        tx.push(2).unwrap();
        tx.push(3).unwrap();
        assert_eq!(rx.pop().unwrap(), 1);
        assert_eq!(rx.pop().unwrap(), 2);
        assert_eq!(rx.pop().unwrap(), 3);
    }

    #[test]
    fn try_push_fails_when_full() {
        let (tx, _rx) = bounded_queue::<i32>(1);
        tx.try_push(1).unwrap();
        assert_eq!(tx.try_push(2), Err(2));
    }

    #[test]
    fn close_unblocks_waiting_consumer() {
        let (tx, rx) = bounded_queue::<i32>(1);
        let handle = thread::spawn(move || rx.pop());
        thread::sleep(Duration::from_millis(20));
        tx.close();
        assert_eq!(handle.join().unwrap(), Err(Closed));
    }

    #[test]
    fn drain_returns_all_remaining_items() {
        let (tx, rx) = bounded_queue::<i32>(4);
        tx.try_push(1).unwrap();
        tx.try_push(2).unwrap();
        let drained = rx.drain();
        assert_eq!(drained, vec![1, 2]);
    }
}
