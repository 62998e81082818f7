//! Temporal evidence ordering.
//!
//! Each memory node keeps a bounded buffer of the tokens observed at its
//! level and compresses their order into decaying bigram/trigram counts.
//! Motifs are only counted; nothing here scores them or predicts what
//! follows.

mod buffer;
mod extractor;
mod table;

pub use buffer::TokenBuffer;
pub use extractor::MotifExtractor;
pub use table::{Motif, MotifStats, MotifTable, MAX_MOTIF_LEN, MIN_MOTIF_LEN};
