//! Bounded log storage to keep memory flat regardless of run duration.

use std::collections::VecDeque;

use serde::{Serialize, Serializer};

/// A ring buffer with a maximum capacity that evicts the oldest element
/// whenever a push would exceed it.
///
/// Unlike a batch-evicting vector, eviction here is strictly one-for-one so
/// the buffer always holds exactly the `capacity` most recent elements once
/// full.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundedLog<T> {
    inner: VecDeque<T>,
    capacity: usize,
}

impl<T> BoundedLog<T> {
    /// Create a new bounded log with the specified capacity.
    ///
    /// # Panics
    /// Panics if `capacity` is 0.
    pub fn new(capacity: usize) -> Self {
        assert!(capacity > 0, "capacity must be greater than 0");
        Self {
            inner: VecDeque::new(),
            capacity,
        }
    }

    /// Push an element, evicting the oldest one if at capacity.
    ///
    /// Returns the evicted element, if any.
    pub fn push(&mut self, item: T) -> Option<T> {
        let evicted = if self.inner.len() >= self.capacity {
            self.inner.pop_front()
        } else {
            None
        };
        self.inner.push_back(item);
        evicted
    }

    /// Change the capacity, dropping the oldest elements if the log is now
    /// over capacity. A capacity of 0 is ignored.
    pub fn set_capacity(&mut self, capacity: usize) {
        if capacity == 0 {
            return;
        }
        self.capacity = capacity;
        while self.inner.len() > self.capacity {
            self.inner.pop_front();
        }
    }

    /// Get the maximum capacity.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Get the current length.
    pub fn len(&self) -> usize {
        self.inner.len()
    }

    /// Check if empty.
    pub fn is_empty(&self) -> bool {
        self.inner.is_empty()
    }

    /// Oldest retained element.
    pub fn first(&self) -> Option<&T> {
        self.inner.front()
    }

    /// Newest element.
    pub fn last(&self) -> Option<&T> {
        self.inner.back()
    }

    /// Get element by index (0 is the oldest retained).
    pub fn get(&self, index: usize) -> Option<&T> {
        self.inner.get(index)
    }

    /// Iterate oldest to newest.
    pub fn iter(&self) -> std::collections::vec_deque::Iter<'_, T> {
        self.inner.iter()
    }

    /// Clear all elements.
    pub fn clear(&mut self) {
        self.inner.clear();
    }
}

impl<T> Extend<T> for BoundedLog<T> {
    fn extend<I: IntoIterator<Item = T>>(&mut self, iter: I) {
        for item in iter {
            self.push(item);
        }
    }
}

impl<'a, T> IntoIterator for &'a BoundedLog<T> {
    type Item = &'a T;
    type IntoIter = std::collections::vec_deque::Iter<'a, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.inner.iter()
    }
}

impl<T: Serialize> Serialize for BoundedLog<T> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_seq(self.inner.iter())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_basic_push() {
        let mut log = BoundedLog::new(10);
        log.push(1);
        log.push(2);
        log.push(3);

        assert_eq!(log.len(), 3);
        assert_eq!(log.get(0), Some(&1));
        assert_eq!(log.last(), Some(&3));
    }

    #[test]
    fn test_eviction_is_one_for_one() {
        let mut log = BoundedLog::new(10);
        for i in 0..10 {
            assert_eq!(log.push(i), None);
        }

        assert_eq!(log.push(10), Some(0));
        assert_eq!(log.len(), 10);
        assert_eq!(log.first(), Some(&1));
        assert_eq!(log.last(), Some(&10));
    }

    #[test]
    fn test_retains_most_recent_after_long_run() {
        let mut log = BoundedLog::new(400);
        log.extend(0..10_000);

        assert_eq!(log.len(), 400);
        let retained: Vec<_> = log.iter().copied().collect();
        let expected: Vec<_> = (9_600..10_000).collect();
        assert_eq!(retained, expected);
    }

    #[test]
    fn test_set_capacity_trims_oldest() {
        let mut log = BoundedLog::new(5);
        log.extend(0..5);
        log.set_capacity(2);

        assert_eq!(log.capacity(), 2);
        assert_eq!(log.iter().copied().collect::<Vec<_>>(), vec![3, 4]);

        log.set_capacity(0);
        assert_eq!(log.capacity(), 2);
    }

    #[test]
    fn test_serializes_as_sequence() {
        let mut log = BoundedLog::new(2);
        log.extend(["a", "b", "c"]);
        assert_eq!(serde_json::to_string(&log).unwrap(), r#"["b","c"]"#);
    }

    #[test]
    #[should_panic(expected = "capacity must be greater than 0")]
    fn test_zero_capacity_panics() {
        let _log: BoundedLog<i32> = BoundedLog::new(0);
    }
}
