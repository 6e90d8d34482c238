//! Fill de-duplication and staleness filtering.
//!
//! The fill feed is polled, so the same fills reappear on every poll; the
//! deduplicator passes each fill id through exactly once. The seen set is
//! bounded by truncating to the most recent entries — an old duplicate
//! resurfacing after truncation is an accepted rare false negative, not a
//! correctness problem.

use std::collections::{HashSet, VecDeque};
use whale_core::Fill;

/// Truncate the seen set once it grows past this many ids.
const SEEN_CAPACITY: usize = 1000;

/// Number of most recent ids kept after truncation.
const SEEN_RETAIN: usize = 500;

/// Sliding-window fill deduplicator with a staleness filter.
#[derive(Debug)]
pub struct FillDeduplicator {
    seen: HashSet<u64>,
    /// Insertion order of ids, oldest first. Drives truncation.
    order: VecDeque<u64>,
    max_age_secs: u64,
}

impl FillDeduplicator {
    /// Create a deduplicator that treats fills older than `max_age_secs`
    /// (fill timestamp vs. wall clock) as stale.
    pub fn new(max_age_secs: u64) -> Self {
        Self {
            seen: HashSet::with_capacity(SEEN_CAPACITY),
            order: VecDeque::with_capacity(SEEN_CAPACITY),
            max_age_secs,
        }
    }

    /// Record a fill id. Returns `true` if it had not been seen before.
    ///
    /// Stale fills are still recorded (their ids must not pass through
    /// later), so call this before the staleness check.
    pub fn observe(&mut self, fill_id: u64) -> bool {
        if !self.seen.insert(fill_id) {
            return false;
        }
        self.order.push_back(fill_id);

        if self.order.len() > SEEN_CAPACITY {
            while self.order.len() > SEEN_RETAIN {
                if let Some(old) = self.order.pop_front() {
                    self.seen.remove(&old);
                }
            }
        }
        true
    }

    /// Whether a fill is too old to be worth aggregating.
    pub fn is_stale(&self, fill: &Fill, now_ms: u64) -> bool {
        fill.age_secs(now_ms) > self.max_age_secs
    }

    /// Number of ids currently tracked.
    pub fn len(&self) -> usize {
        self.order.len()
    }

    /// Whether no ids are tracked yet.
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;
    use whale_core::FillSide;

    fn fill(id: u64, time_ms: u64) -> Fill {
        Fill {
            coin: "BTC".to_string(),
            side: FillSide::Buy,
            size: dec!(1),
            price: dec!(50000),
            time_ms,
            fill_id: id,
        }
    }

    #[test]
    fn test_duplicate_id_observed_once() {
        let mut dedup = FillDeduplicator::new(300);
        assert!(dedup.observe(7));
        assert!(!dedup.observe(7));
        assert_eq!(dedup.len(), 1);
    }

    #[test]
    fn test_staleness_boundary() {
        let dedup = FillDeduplicator::new(300);
        let now_ms = 1_000_000_000;
        // Exactly at the limit is still fresh.
        assert!(!dedup.is_stale(&fill(1, now_ms - 300_000), now_ms));
        assert!(dedup.is_stale(&fill(2, now_ms - 301_000), now_ms));
    }

    #[test]
    fn test_truncation_keeps_most_recent() {
        let mut dedup = FillDeduplicator::new(300);
        for id in 0..=SEEN_CAPACITY as u64 {
            dedup.observe(id);
        }
        assert_eq!(dedup.len(), SEEN_RETAIN);
        // The newest ids survive, the oldest were evicted.
        assert!(!dedup.observe(SEEN_CAPACITY as u64));
        assert!(dedup.observe(0));
    }
}
