//! Bounded Ring Buffer Implementation

use std::collections::VecDeque;

/// Default history capacity (300 frames = ~10 s at 30fps)
pub const DEFAULT_CAPACITY: usize = 300;

/// Fixed-capacity history that evicts the oldest sample on overflow
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    /// Samples in insertion order (front = oldest)
    storage: VecDeque<T>,
    /// Maximum number of retained samples
    capacity: usize,
}

impl<T: Copy> RingBuffer<T> {
    /// Create a new ring buffer with given capacity.
    ///
    /// A zero capacity is bumped to one so that the latest sample is always
    /// observable.
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            storage: VecDeque::with_capacity(capacity),
            capacity,
        }
    }

    /// Push a sample into the buffer (evicts oldest if full)
    pub fn push(&mut self, sample: T) {
        if self.storage.len() == self.capacity {
            self.storage.pop_front();
        }
        self.storage.push_back(sample);
    }

    /// Number of samples currently retained
    pub fn len(&self) -> usize {
        self.storage.len()
    }

    /// Check if buffer is empty
    pub fn is_empty(&self) -> bool {
        self.storage.is_empty()
    }

    /// Get the buffer capacity
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Most recent sample
    pub fn latest(&self) -> Option<T> {
        self.storage.back().copied()
    }

    /// The trailing `count` samples in insertion order (oldest first).
    ///
    /// Returns fewer than `count` samples when the buffer holds fewer.
    pub fn trailing(&self, count: usize) -> Vec<T> {
        let skip = self.storage.len().saturating_sub(count);
        self.storage.iter().skip(skip).copied().collect()
    }

    /// Iterate over retained samples, oldest first
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.storage.iter()
    }

    /// Clear the buffer
    pub fn clear(&mut self) {
        self.storage.clear();
    }
}
