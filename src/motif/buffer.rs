//! Bounded FIFO of recent evidence tokens.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use crate::evidence::{EvidenceToken, TokenEntry};

/// Token buffer bounded by both entry count and a rolling time window.
///
/// Whichever bound is hit first evicts the oldest entries.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenBuffer {
    entries: VecDeque<TokenEntry>,
    capacity: usize,
    window_secs: f64,
    /// Entries evicted over the buffer's lifetime
    evicted: u64,
}

impl TokenBuffer {
    pub fn new(capacity: usize, window_secs: f64) -> Self {
        Self {
            entries: VecDeque::with_capacity(capacity),
            capacity,
            window_secs,
            evicted: 0,
        }
    }

    /// Append an entry, evicting by window (relative to the new entry's
    /// timestamp) and then by capacity. Returns how many entries were evicted.
    pub fn push(&mut self, entry: TokenEntry) -> usize {
        let cutoff = entry.timestamp - self.window_secs;
        let mut evicted = 0;

        while let Some(front) = self.entries.front() {
            if front.timestamp < cutoff {
                self.entries.pop_front();
                evicted += 1;
            } else {
                break;
            }
        }

        self.entries.push_back(entry);

        while self.entries.len() > self.capacity {
            self.entries.pop_front();
            evicted += 1;
        }

        self.evicted += evicted as u64;
        evicted
    }

    /// The last `n` tokens in arrival order, if the buffer holds at least `n`.
    pub fn tail(&self, n: usize) -> Option<Vec<EvidenceToken>> {
        if n == 0 || self.entries.len() < n {
            return None;
        }
        let start = self.entries.len() - n;
        Some(self.entries.iter().skip(start).map(|e| e.token).collect())
    }

    /// Entries with `start <= timestamp <= end`.
    pub fn in_range(&self, start: f64, end: f64) -> Vec<TokenEntry> {
        self.entries
            .iter()
            .filter(|e| e.timestamp >= start && e.timestamp <= end)
            .copied()
            .collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &TokenEntry> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn window_secs(&self) -> f64 {
        self.window_secs
    }

    pub fn oldest(&self) -> Option<&TokenEntry> {
        self.entries.front()
    }

    pub fn newest(&self) -> Option<&TokenEntry> {
        self.entries.back()
    }

    pub fn evicted_total(&self) -> u64 {
        self.evicted
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use EvidenceToken::*;

    fn entry(token: EvidenceToken, ts: f64) -> TokenEntry {
        TokenEntry::new(token, ts)
    }

    #[test]
    fn test_capacity_eviction() {
        let mut buffer = TokenBuffer::new(3, 1_000.0);
        buffer.push(entry(TradeExec, 1.0));
        buffer.push(entry(LiqOccur, 2.0));
        buffer.push(entry(PriceTouch, 3.0));
        let evicted = buffer.push(entry(ObAppear, 4.0));

        assert_eq!(evicted, 1);
        assert_eq!(buffer.len(), 3);
        assert_eq!(buffer.oldest().unwrap().token, LiqOccur);
        assert_eq!(buffer.evicted_total(), 1);
    }

    #[test]
    fn test_window_eviction() {
        let mut buffer = TokenBuffer::new(100, 10.0);
        buffer.push(entry(TradeExec, 0.0));
        buffer.push(entry(TradeExec, 5.0));
        let evicted = buffer.push(entry(LiqOccur, 12.0));

        assert_eq!(evicted, 1);
        assert_eq!(buffer.len(), 2);
        assert_eq!(buffer.oldest().unwrap().timestamp, 5.0);
    }

    #[test]
    fn test_window_boundary_is_inclusive() {
        let mut buffer = TokenBuffer::new(100, 10.0);
        buffer.push(entry(TradeExec, 0.0));
        buffer.push(entry(TradeExec, 10.0));
        assert_eq!(buffer.len(), 2);
    }

    #[test]
    fn test_tail() {
        let mut buffer = TokenBuffer::new(10, 100.0);
        assert!(buffer.tail(2).is_none());
        buffer.push(entry(ObAppear, 1.0));
        buffer.push(entry(ObPersist, 2.0));
        buffer.push(entry(TradeExec, 3.0));

        assert_eq!(buffer.tail(2).unwrap(), vec![ObPersist, TradeExec]);
        assert_eq!(buffer.tail(3).unwrap(), vec![ObAppear, ObPersist, TradeExec]);
        assert!(buffer.tail(4).is_none());
        assert!(buffer.tail(0).is_none());
    }

    #[test]
    fn test_in_range() {
        let mut buffer = TokenBuffer::new(10, 100.0);
        for ts in [1.0, 2.0, 3.0, 4.0] {
            buffer.push(entry(PriceTouch, ts));
        }
        let hits = buffer.in_range(2.0, 3.0);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].timestamp, 2.0);
    }
}
