//! # Concurrent Queue
//!
//! FIFO handoff between I/O threads and the application, built on
//! [`IntrusiveList`] behind a mutex with a condition variable.
//!
//! - `enqueue` appends at the tail and wakes one blocked taker.
//! - `dequeue` / `peek_with` never block.
//! - `take` suspends the caller without spinning until an item arrives or
//!   the queue is closed.
//!
//! Items enqueued by several producers come out in the order their
//! `enqueue` calls acquired the lock.

use std::sync::{Condvar, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, Instant};

use crate::core::list::IntrusiveList;

struct Inner<T> {
    list: IntrusiveList<T>,
    closed: bool,
}

/// Multi-producer FIFO with a blocking `take`.
pub struct ConcurrentQueue<T> {
    inner: Mutex<Inner<T>>,
    available: Condvar,
}

impl<T> ConcurrentQueue<T> {
    pub fn new() -> Self {
        Self {
            inner: Mutex::new(Inner {
                list: IntrusiveList::new(),
                closed: false,
            }),
            available: Condvar::new(),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Inner<T>> {
        self.inner.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append `item` and wake one blocked taker.
    pub fn enqueue(&self, item: T) {
        self.lock().list.push_back(item);
        self.available.notify_one();
    }

    /// Append `item` unless the queue is closed, in which case it is handed
    /// back. The closed check and the append happen under one lock.
    pub fn try_enqueue(&self, item: T) -> Result<(), T> {
        let mut inner = self.lock();
        if inner.closed {
            return Err(item);
        }
        inner.list.push_back(item);
        drop(inner);
        self.available.notify_one();
        Ok(())
    }

    /// Remove the head item without blocking.
    pub fn dequeue(&self) -> Option<T> {
        self.lock().list.pop_front()
    }

    /// Inspect the head item without removing it.
    pub fn peek_with<R>(&self, f: impl FnOnce(&T) -> R) -> Option<R> {
        self.lock().list.front().map(f)
    }

    /// Block until an item is available and remove it.
    ///
    /// Returns `None` once the queue is closed; items still queued at that
    /// point remain reachable through [`dequeue`](Self::dequeue).
    pub fn take(&self) -> Option<T> {
        let mut inner = self.lock();
        loop {
            if inner.closed {
                return None;
            }
            if let Some(item) = inner.list.pop_front() {
                return Some(item);
            }
            inner = self
                .available
                .wait(inner)
                .unwrap_or_else(PoisonError::into_inner);
        }
    }

    /// Like [`take`](Self::take) but gives up after `timeout`.
    pub fn take_timeout(&self, timeout: Duration) -> Option<T> {
        let deadline = Instant::now() + timeout;
        let mut inner = self.lock();
        loop {
            if inner.closed {
                return None;
            }
            if let Some(item) = inner.list.pop_front() {
                return Some(item);
            }
            let now = Instant::now();
            if now >= deadline {
                return None;
            }
            inner = self
                .available
                .wait_timeout(inner, deadline - now)
                .unwrap_or_else(PoisonError::into_inner)
                .0;
        }
    }

    /// Stop blocking takers. Every current and future `take` returns `None`.
    pub fn close(&self) {
        self.lock().closed = true;
        self.available.notify_all();
    }

    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    pub fn is_empty(&self) -> bool {
        self.lock().list.is_empty()
    }

    pub fn len(&self) -> usize {
        self.lock().list.len()
    }

    /// Drop every queued item.
    pub fn clear(&self) {
        self.lock().list.clear();
    }
}

impl<T> Default for ConcurrentQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    #[test]
    fn test_fifo_single_thread() {
        let queue = ConcurrentQueue::new();
        for i in 0..10 {
            queue.enqueue(i);
        }
        assert_eq!(queue.peek_with(|v| *v), Some(0));
        let out: Vec<_> = std::iter::from_fn(|| queue.dequeue()).collect();
        assert_eq!(out, (0..10).collect::<Vec<_>>());
        assert!(queue.dequeue().is_none());
    }

    #[test]
    fn test_take_blocks_until_enqueue() {
        let queue = Arc::new(ConcurrentQueue::new());
        let consumer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.take())
        };

        thread::sleep(Duration::from_millis(50));
        assert!(!consumer.is_finished());

        queue.enqueue(42);
        assert_eq!(consumer.join().unwrap(), Some(42));
    }

    #[test]
    fn test_close_releases_taker() {
        let queue: Arc<ConcurrentQueue<u8>> = Arc::new(ConcurrentQueue::new());
        let consumer = {
            let queue = Arc::clone(&queue);
            thread::spawn(move || queue.take())
        };
        thread::sleep(Duration::from_millis(20));
        queue.close();
        assert_eq!(consumer.join().unwrap(), None);
        assert!(queue.is_closed());

        // Closed queue still accepts and hands out items without blocking
        queue.enqueue(1);
        assert_eq!(queue.take(), None);
        assert_eq!(queue.dequeue(), Some(1));
    }

    #[test]
    fn test_try_enqueue_refuses_after_close() {
        let queue = ConcurrentQueue::new();
        assert_eq!(queue.try_enqueue(1), Ok(()));
        queue.close();
        assert_eq!(queue.try_enqueue(2), Err(2));
        assert_eq!(queue.len(), 1);
        assert_eq!(queue.dequeue(), Some(1));
    }

    #[test]
    fn test_try_enqueue_races_close() {
        for _ in 0..50 {
            let queue: Arc<ConcurrentQueue<u32>> = Arc::new(ConcurrentQueue::new());
            let producer = {
                let queue = Arc::clone(&queue);
                thread::spawn(move || (0..1000).filter(|i| queue.try_enqueue(*i).is_ok()).count())
            };
            queue.close();
            let accepted = producer.join().unwrap();
            assert_eq!(accepted, queue.len());
        }
    }

    #[test]
    fn test_take_timeout_expires() {
        let queue: ConcurrentQueue<u8> = ConcurrentQueue::new();
        let start = Instant::now();
        assert_eq!(queue.take_timeout(Duration::from_millis(30)), None);
        assert!(start.elapsed() >= Duration::from_millis(30));
    }
}
