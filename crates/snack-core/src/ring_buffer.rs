//! Bounded history for device log lines

use std::collections::VecDeque;

/// Keeps the newest `capacity` values; older ones fall off the front.
#[derive(Debug, Clone)]
pub struct RingBuffer<T> {
    items: VecDeque<T>,
    capacity: usize,
    evicted: u64,
}

impl<T> RingBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            items: VecDeque::with_capacity(capacity),
            capacity,
            evicted: 0,
        }
    }

    /// Append `value`. Returns the value that fell off, if any.
    ///
    /// With zero capacity the value itself is returned.
    pub fn push(&mut self, value: T) -> Option<T> {
        if self.capacity == 0 {
            self.evicted += 1;
            return Some(value);
        }
        let dropped = if self.items.len() == self.capacity {
            self.evicted += 1;
            self.items.pop_front()
        } else {
            None
        };
        self.items.push_back(value);
        dropped
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// How many values have been pushed out since creation.
    pub fn evicted(&self) -> u64 {
        self.evicted
    }

    /// Oldest to newest.
    pub fn iter(&self) -> impl DoubleEndedIterator<Item = &T> {
        self.items.iter()
    }

    /// The last `n` values, oldest first.
    pub fn recent(&self, n: usize) -> impl Iterator<Item = &T> {
        self.items.iter().skip(self.items.len().saturating_sub(n))
    }

    pub fn latest(&self) -> Option<&T> {
        self.items.back()
    }

    pub fn oldest(&self) -> Option<&T> {
        self.items.front()
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_push_returns_evicted_value() {
        let mut history = RingBuffer::new(2);
        assert_eq!(history.push("a"), None);
        assert_eq!(history.push("b"), None);
        assert_eq!(history.push("c"), Some("a"));
        assert_eq!(history.evicted(), 1);
        assert_eq!(history.oldest(), Some(&"b"));
        assert_eq!(history.latest(), Some(&"c"));
    }

    #[test]
    fn test_recent_is_oldest_first() {
        let mut history = RingBuffer::new(5);
        for i in 1..=7 {
            history.push(i);
        }
        assert_eq!(history.iter().copied().collect::<Vec<_>>(), vec![3, 4, 5, 6, 7]);
        assert_eq!(history.recent(2).copied().collect::<Vec<_>>(), vec![6, 7]);
        assert_eq!(history.recent(50).count(), 5);
        assert_eq!(history.iter().next_back(), Some(&7));
    }

    #[test]
    fn test_zero_capacity_keeps_nothing() {
        let mut history = RingBuffer::new(0);
        assert_eq!(history.push("dropped"), Some("dropped"));
        assert!(history.is_empty());
        assert_eq!(history.evicted(), 1);
    }

    #[test]
    fn test_clear_keeps_eviction_count() {
        let mut history = RingBuffer::new(1);
        history.push(1);
        history.push(2);
        history.clear();
        assert!(history.is_empty());
        assert_eq!(history.latest(), None);
        assert_eq!(history.evicted(), 1);
    }
}
