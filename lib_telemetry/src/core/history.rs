//! Bounded, FIFO-eviction history of accepted readings.
//!
//! A plain data structure; the coordinating service applies the locking
//! discipline (queries concurrent, mutations exclusive).

use std::collections::VecDeque;

use crate::core::reading::Reading;

/// Default number of readings retained before head eviction kicks in.
pub const DEFAULT_CAPACITY: usize = 100;

/// Fixed-capacity, oldest-first ring of the most recent accepted readings.
pub struct HistoryBuffer {
    readings: VecDeque<Reading>,
    capacity: usize,
    /// Cumulative acceptances over the process lifetime. Not reset by
    /// [`HistoryBuffer::clear`].
    total_accepted: u64,
}

impl HistoryBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            readings: VecDeque::with_capacity(capacity),
            capacity,
            total_accepted: 0,
        }
    }

    /// Appends at the tail, evicting exactly one head entry when full.
    pub fn append(&mut self, reading: Reading) {
        if self.readings.len() == self.capacity {
            self.readings.pop_front();
        }
        self.readings.push_back(reading);
        self.total_accepted += 1;
    }

    /// The most recently appended reading, if any.
    pub fn latest(&self) -> Option<&Reading> {
        self.readings.back()
    }

    /// The last `n` readings, most-recent-first. `n` is clamped to the
    /// current length.
    pub fn recent(&self, n: usize) -> Vec<Reading> {
        self.readings.iter().rev().take(n).cloned().collect()
    }

    /// The pH values of the last `n` readings, oldest-first, as the trend
    /// estimator expects them.
    pub fn ph_tail(&self, n: usize) -> Vec<f64> {
        let skip = self.readings.len().saturating_sub(n);
        self.readings.iter().skip(skip).map(|r| r.ph).collect()
    }

    /// Empties the buffer, returning how many readings were removed.
    pub fn clear(&mut self) -> usize {
        let removed = self.readings.len();
        self.readings.clear();
        removed
    }

    pub fn len(&self) -> usize {
        self.readings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.readings.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn total_accepted(&self) -> u64 {
        self.total_accepted
    }
}

impl Default for HistoryBuffer {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::reading::{RawReading, DEFAULT_DEVICE_ID};
    use crate::core::validator::validate;

    fn reading(ph: f64) -> Reading {
        validate(RawReading {
            ph,
            turbidity: 100.0,
            timestamp: None,
            device_id: Some(DEFAULT_DEVICE_ID.to_string()),
        })
        .unwrap()
    }

    #[test]
    fn append_evicts_oldest_at_capacity() {
        let mut buf = HistoryBuffer::new(3);
        for ph in [7.0, 7.1, 7.2, 7.3] {
            buf.append(reading(ph));
        }
        assert_eq!(buf.len(), 3);
        let held: Vec<f64> = buf.recent(10).iter().rev().map(|r| r.ph).collect();
        assert_eq!(held, vec![7.1, 7.2, 7.3]);
        assert_eq!(buf.total_accepted(), 4);
    }

    #[test]
    fn recent_is_newest_first_and_clamped() {
        let mut buf = HistoryBuffer::new(10);
        for ph in [7.0, 7.1, 7.2] {
            buf.append(reading(ph));
        }
        let phs: Vec<f64> = buf.recent(5).iter().map(|r| r.ph).collect();
        assert_eq!(phs, vec![7.2, 7.1, 7.0]);
        assert_eq!(buf.recent(2).len(), 2);
    }

    #[test]
    fn ph_tail_is_oldest_first() {
        let mut buf = HistoryBuffer::new(10);
        for ph in [6.8, 6.9, 7.0, 7.1] {
            buf.append(reading(ph));
        }
        assert_eq!(buf.ph_tail(3), vec![6.9, 7.0, 7.1]);
        assert_eq!(buf.ph_tail(10), vec![6.8, 6.9, 7.0, 7.1]);
    }

    #[test]
    fn clear_reports_removed_count_but_keeps_lifetime_total() {
        let mut buf = HistoryBuffer::new(10);
        for ph in [7.0, 7.1, 7.2] {
            buf.append(reading(ph));
        }
        assert_eq!(buf.clear(), 3);
        assert!(buf.latest().is_none());
        assert!(buf.is_empty());
        assert_eq!(buf.total_accepted(), 3);
        assert_eq!(buf.clear(), 0);
    }
}
