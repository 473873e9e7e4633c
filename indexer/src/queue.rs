//! Blocking FIFO queue with a hard capacity.
//!
//! `put` parks the caller while the queue is full and `take` parks while it
//! is empty, which gives the producer backpressure instead of unbounded
//! buffering.

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

pub struct BoundedQueue<T> {
    items: Mutex<VecDeque<T>>,
    not_empty: Condvar,
    not_full: Condvar,
    capacity: usize,
    high_water: AtomicUsize,
}

impl<T> BoundedQueue<T> {
    /// # Panics
    ///
    /// Panics if `capacity` is zero; such a queue could never accept an item.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "queue capacity must be positive");
        Self {
            items: Mutex::new(VecDeque::with_capacity(capacity)),
            not_empty: Condvar::new(),
            not_full: Condvar::new(),
            capacity,
            high_water: AtomicUsize::new(0),
        }
    }

    /// Append `item`, blocking while the queue is full.
    pub fn put(&self, item: T) {
        let mut items = self.items.lock();
        while items.len() >= self.capacity {
            self.not_full.wait(&mut items);
        }
        items.push_back(item);
        self.high_water.fetch_max(items.len(), Ordering::Relaxed);
        drop(items);
        self.not_empty.notify_one();
    }

    /// Remove the oldest item, blocking while the queue is empty.
    pub fn take(&self) -> T {
        let mut items = self.items.lock();
        loop {
            if let Some(item) = items.pop_front() {
                drop(items);
                self.not_full.notify_one();
                return item;
            }
            self.not_empty.wait(&mut items);
        }
    }

    pub fn len(&self) -> usize { self.items.lock().len() }

    pub fn is_empty(&self) -> bool { self.items.lock().is_empty() }

    pub fn capacity(&self) -> usize { self.capacity }

    /// Largest number of items ever held at once.
    pub fn high_water_mark(&self) -> usize { self.high_water.load(Ordering::Relaxed) }
}
