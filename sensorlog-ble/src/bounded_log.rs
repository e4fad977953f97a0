//! Fixed-capacity FIFO log of serialized readings.

use std::collections::VecDeque;
use std::num::NonZeroUsize;

/// Holds the most recent `capacity` entries in insertion order.
///
/// Storage grows with the number of entries actually held, so a very large
/// capacity behaves as an unbounded log.
#[derive(Debug, Clone)]
pub struct BoundedLog {
    entries: VecDeque<String>,
    capacity: NonZeroUsize,
}

impl BoundedLog {
    pub fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: VecDeque::new(),
            capacity,
        }
    }

    /// Append `entry`, evicting the oldest entry when the log is full.
    ///
    /// Returns the updated contents, oldest first.
    pub fn push(&mut self, entry: impl Into<String>) -> &[String] {
        if self.entries.len() == self.capacity.get() {
            self.entries.pop_front();
        }
        self.entries.push_back(entry.into());
        self.as_slice()
    }

    /// Current contents, oldest first.
    pub fn as_slice(&mut self) -> &[String] {
        self.entries.make_contiguous()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(String::as_str)
    }

    /// Most recently pushed entry.
    pub fn newest(&self) -> Option<&str> {
        self.entries.back().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity.get()
    }

    /// File contents mirroring the log: one entry per line.
    pub fn render(&self) -> String {
        let mut text = String::with_capacity(self.entries.iter().map(|e| e.len() + 1).sum());
        for entry in &self.entries {
            text.push_str(entry);
            text.push('\n');
        }
        text
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn log(capacity: usize) -> BoundedLog {
        BoundedLog::new(NonZeroUsize::new(capacity).unwrap())
    }

    #[test]
    fn test_push_below_capacity() {
        let mut log = log(3);
        log.push("a");
        assert_eq!(log.push("b"), ["a", "b"]);
        assert_eq!(log.len(), 2);
    }

    #[test]
    fn test_push_evicts_oldest() {
        let mut log = log(3);
        for entry in ["a", "b", "c"] {
            log.push(entry);
        }
        assert_eq!(log.push("d"), ["b", "c", "d"]);
        assert_eq!(log.newest(), Some("d"));
        assert_eq!(log.len(), 3);
    }

    #[test]
    fn test_holds_most_recent_entries() {
        for capacity in 1..=5 {
            let mut log = log(capacity);
            let mut pushed = Vec::new();
            for i in 0..12 {
                let entry = format!("entry-{}", i);
                pushed.push(entry.clone());
                let contents = log.push(entry).to_vec();
                let start = pushed.len().saturating_sub(capacity);
                assert_eq!(contents, pushed[start..], "capacity {}", capacity);
            }
        }
    }

    #[test]
    fn test_capacity_one() {
        let mut log = log(1);
        log.push("a");
        assert_eq!(log.push("b"), ["b"]);
    }

    #[test]
    fn test_large_capacity_does_not_preallocate() {
        let mut log = BoundedLog::new(NonZeroUsize::new(1_000_000_000_000).unwrap());
        assert_eq!(log.push("a"), ["a"]);
        assert_eq!(log.capacity(), 1_000_000_000_000);
    }

    #[test]
    fn test_render() {
        let mut log = log(2);
        assert_eq!(log.render(), "");
        log.push("x");
        log.push("y");
        log.push("z");
        assert_eq!(log.render(), "y\nz\n");
        assert_eq!(log.iter().collect::<Vec<_>>(), ["y", "z"]);
    }
}
