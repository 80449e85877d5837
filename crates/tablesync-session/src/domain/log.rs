//! Bounded recent-history buffer.

use std::collections::VecDeque;

/// Keeps the most recent `capacity` entries, oldest first.
#[derive(Debug, Clone)]
pub struct RecentLog<T> {
    entries: VecDeque<T>,
    capacity: usize,
}

impl<T: Clone> RecentLog<T> {
    /// An empty log. A capacity of zero keeps nothing.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity.min(1024)),
            capacity,
        }
    }

    /// Appends an entry, evicting the oldest when full.
    pub fn push(&mut self, entry: T) {
        if self.capacity == 0 {
            return;
        }
        if self.entries.len() == self.capacity {
            self.entries.pop_front();
        }
        self.entries.push_back(entry);
    }

    /// Number of retained entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether nothing is retained.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Retained entries matching `keep`, oldest first.
    pub fn collect_where(&self, keep: impl Fn(&T) -> bool) -> Vec<T> {
        self.entries.iter().filter(|e| keep(e)).cloned().collect()
    }

    /// All retained entries, oldest first.
    #[must_use]
    pub fn to_vec(&self) -> Vec<T> {
        self.entries.iter().cloned().collect()
    }
}
