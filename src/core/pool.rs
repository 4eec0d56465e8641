//! # Object Pool
//!
//! Recycling allocator for short-lived objects (messages, queue entries).
//!
//! Acquisition pops the freelist or builds a fresh instance through
//! [`Default`]; release runs the [`Recycle`] hook and pushes the instance
//! back. The reset is mandatory: a reused object must never carry state from
//! its previous use.
//!
//! Two variants:
//! - [`Pool`] is unlocked and for objects that never leave one thread.
//! - [`SyncPool`] guards its freelist with a mutex and hands out [`Pooled`]
//!   guards that return themselves on drop, from whichever thread drops them.
//!
//! ## Usage
//! ```rust
//! use peerwire::core::pool::SyncPool;
//! use peerwire::core::buffer::NetBuffer;
//!
//! let pool: SyncPool<NetBuffer> = SyncPool::new();
//! let mut buffer = pool.acquire();
//! buffer.write_i32(42);
//! drop(buffer); // reset and returned to the pool
//! assert_eq!(pool.available(), 1);
//! assert!(pool.acquire().is_empty());
//! ```

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::{Arc, Mutex, PoisonError};

use crate::core::buffer::NetBuffer;

/// Reset hook run before an object goes back to its pool.
pub trait Recycle {
    /// Clear all per-use state.
    fn recycle(&mut self);
}

impl Recycle for NetBuffer {
    fn recycle(&mut self) {
        self.reset();
    }
}

/// Single-thread pool.
#[derive(Debug)]
pub struct Pool<T> {
    free: Vec<T>,
}

impl<T: Recycle + Default> Pool<T> {
    pub fn new() -> Self {
        Self { free: Vec::new() }
    }

    /// Create a pool holding `count` ready instances.
    pub fn with_preallocated(count: usize) -> Self {
        Self {
            free: (0..count).map(|_| T::default()).collect(),
        }
    }

    /// Pop a recycled instance, or build a new one.
    pub fn acquire(&mut self) -> T {
        self.free.pop().unwrap_or_default()
    }

    /// Reset `item` and keep it for the next acquisition.
    pub fn release(&mut self, mut item: T) {
        item.recycle();
        self.free.push(item);
    }

    /// Number of instances waiting in the freelist.
    pub fn available(&self) -> usize {
        self.free.len()
    }

    /// Drop every pooled instance.
    pub fn clear(&mut self) {
        self.free.clear();
    }
}

impl<T: Recycle + Default> Default for Pool<T> {
    fn default() -> Self {
        Self::new()
    }
}

/// Thread-safe pool handing out [`Pooled`] guards.
pub struct SyncPool<T: Recycle> {
    free: Arc<Mutex<Vec<T>>>,
}

impl<T: Recycle + Default> SyncPool<T> {
    pub fn new() -> Self {
        Self {
            free: Arc::new(Mutex::new(Vec::new())),
        }
    }

    /// Create a pool holding `count` ready instances.
    pub fn with_preallocated(count: usize) -> Self {
        let free = (0..count).map(|_| T::default()).collect();
        Self {
            free: Arc::new(Mutex::new(free)),
        }
    }

    /// Pop a recycled instance, or build a new one.
    pub fn acquire(&self) -> Pooled<T> {
        let item = self
            .free
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .pop()
            .unwrap_or_default();

        Pooled {
            item: Some(item),
            free: Arc::clone(&self.free),
        }
    }

    /// Number of instances waiting in the freelist.
    pub fn available(&self) -> usize {
        self.free
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Drop every pooled instance.
    pub fn clear(&self) {
        self.free
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
    }
}

impl<T: Recycle + Default> Default for SyncPool<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Recycle> Clone for SyncPool<T> {
    fn clone(&self) -> Self {
        Self {
            free: Arc::clone(&self.free),
        }
    }
}

impl<T: Recycle> fmt::Debug for SyncPool<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let available = self
            .free
            .lock()
            .map(|free| free.len())
            .unwrap_or_default();
        f.debug_struct("SyncPool")
            .field("available", &available)
            .finish()
    }
}

/// An object on loan from a [`SyncPool`]. Reset and returned on drop.
pub struct Pooled<T: Recycle> {
    item: Option<T>,
    free: Arc<Mutex<Vec<T>>>,
}

impl<T: Recycle> Pooled<T> {
    /// Take the object out of the pool's custody. It will not be recycled.
    pub fn detach(mut self) -> T {
        match self.item.take() {
            Some(item) => item,
            None => unreachable!("pooled item is only taken on detach or drop"),
        }
    }
}

impl<T: Recycle> Deref for Pooled<T> {
    type Target = T;

    fn deref(&self) -> &T {
        match &self.item {
            Some(item) => item,
            None => unreachable!("pooled item is only taken on detach or drop"),
        }
    }
}

impl<T: Recycle> DerefMut for Pooled<T> {
    fn deref_mut(&mut self) -> &mut T {
        match &mut self.item {
            Some(item) => item,
            None => unreachable!("pooled item is only taken on detach or drop"),
        }
    }
}

impl<T: Recycle> Drop for Pooled<T> {
    fn drop(&mut self) {
        if let Some(mut item) = self.item.take() {
            item.recycle();
            self.free
                .lock()
                .unwrap_or_else(PoisonError::into_inner)
                .push(item);
        }
    }
}

impl<T: Recycle + fmt::Debug> fmt::Debug for Pooled<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Pooled").field(&**self).finish()
    }
}
