//! Incremental motif extraction over a node's token buffer.

use serde::{Deserialize, Serialize};

use super::buffer::TokenBuffer;
use super::table::{Motif, MotifTable, MAX_MOTIF_LEN, MIN_MOTIF_LEN};
use crate::evidence::{EvidenceToken, TokenEntry};

/// Token buffer plus the motif table derived from it.
///
/// Each appended token closes exactly one bigram and one trigram window
/// (when the buffer is long enough), so across a run every overlapping
/// subsequence is counted once.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotifExtractor {
    buffer: TokenBuffer,
    table: MotifTable,
}

impl MotifExtractor {
    pub fn new(capacity: usize, window_secs: f64) -> Self {
        Self {
            buffer: TokenBuffer::new(capacity, window_secs),
            table: MotifTable::new(),
        }
    }

    /// Append a token and count the motifs that end at it.
    ///
    /// Eviction happens first, so a motif never spans a token that has
    /// already aged out of the window.
    pub fn observe(&mut self, token: EvidenceToken, ts: f64) {
        self.buffer.push(TokenEntry::new(token, ts));

        for len in MIN_MOTIF_LEN..=MAX_MOTIF_LEN {
            if let Some(tokens) = self.buffer.tail(len) {
                self.table.record(Motif(tokens), ts);
            }
        }
    }

    pub fn apply_decay(&mut self, factor: f64) {
        self.table.apply_decay(factor);
    }

    pub fn buffer(&self) -> &TokenBuffer {
        &self.buffer
    }

    pub fn table(&self) -> &MotifTable {
        &self.table
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use EvidenceToken::*;

    #[test]
    fn test_bigram_count_is_len_minus_one() {
        // No adjacent pair repeats
        let sequence = [ObAppear, ObPersist, TradeExec, LiqOccur, LiqCascade, PriceExit, PriceTouch];
        let mut extractor = MotifExtractor::new(100, 86_400.0);
        for (i, token) in sequence.iter().enumerate() {
            extractor.observe(*token, i as f64);
        }

        assert_eq!(extractor.table().distinct_bigrams(), sequence.len() - 1);
        assert_eq!(extractor.table().distinct_trigrams(), sequence.len() - 2);
    }

    #[test]
    fn test_repeated_motif_counts_every_time() {
        let mut extractor = MotifExtractor::new(100, 86_400.0);
        for i in 0..4 {
            extractor.observe(TradeExec, i as f64);
        }

        let bigram = Motif::bigram(TradeExec, TradeExec);
        let trigram = Motif::trigram(TradeExec, TradeExec, TradeExec);
        assert_eq!(extractor.table().get(&bigram).unwrap().count, 3);
        assert_eq!(extractor.table().get(&trigram).unwrap().count, 2);
    }

    #[test]
    fn test_single_token_has_no_motifs() {
        let mut extractor = MotifExtractor::new(100, 86_400.0);
        extractor.observe(PriceTouch, 0.0);
        assert!(extractor.table().is_empty());
        assert_eq!(extractor.buffer().len(), 1);
    }

    #[test]
    fn test_window_breaks_motifs() {
        let mut extractor = MotifExtractor::new(100, 10.0);
        extractor.observe(LiqOccur, 0.0);
        extractor.observe(TradeExec, 100.0);

        assert!(extractor.table().is_empty());
        assert_eq!(extractor.buffer().len(), 1);
    }

    #[test]
    fn test_capacity_keeps_recent_context() {
        let mut extractor = MotifExtractor::new(3, 86_400.0);
        for (i, token) in [ObAppear, ObPersist, ObVanish, TradeExec].iter().enumerate() {
            extractor.observe(*token, i as f64);
        }

        assert_eq!(extractor.buffer().len(), 3);
        let last = Motif::trigram(ObPersist, ObVanish, TradeExec);
        assert_eq!(extractor.table().get(&last).unwrap().count, 1);
    }
}
