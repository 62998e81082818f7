//! Motif keys and per-node occurrence tables.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::collections::BTreeMap;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::evidence::EvidenceToken;

/// Shortest stored motif.
pub const MIN_MOTIF_LEN: usize = 2;
/// Longest stored motif. Longer subsequences are never tracked.
pub const MAX_MOTIF_LEN: usize = 3;

/// An ordered run of 2 or 3 evidence tokens.
///
/// Serialized as `A>B` or `A>B>C` so it can key a JSON object.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Motif(pub(crate) Vec<EvidenceToken>);

impl Motif {
    pub fn new(tokens: Vec<EvidenceToken>) -> Result<Self> {
        if tokens.len() < MIN_MOTIF_LEN || tokens.len() > MAX_MOTIF_LEN {
            return Err(Error::invalid_query(format!(
                "motif length must be {} or {}, got {}",
                MIN_MOTIF_LEN,
                MAX_MOTIF_LEN,
                tokens.len()
            )));
        }
        Ok(Self(tokens))
    }

    pub fn bigram(a: EvidenceToken, b: EvidenceToken) -> Self {
        Self(vec![a, b])
    }

    pub fn trigram(a: EvidenceToken, b: EvidenceToken, c: EvidenceToken) -> Self {
        Self(vec![a, b, c])
    }

    pub fn tokens(&self) -> &[EvidenceToken] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_bigram(&self) -> bool {
        self.0.len() == 2
    }

    pub fn is_trigram(&self) -> bool {
        self.0.len() == 3
    }
}

impl std::fmt::Display for Motif {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let names: Vec<&str> = self.0.iter().map(|t| t.as_str()).collect();
        write!(f, "{}", names.join(">"))
    }
}

impl FromStr for Motif {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        let tokens = s
            .split('>')
            .map(|part| part.trim().parse::<EvidenceToken>())
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(Error::InvalidQuery)?;
        Self::new(tokens)
    }
}

impl Serialize for Motif {
    fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for Motif {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let s = String::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// Occurrence record for one motif at one node.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotifStats {
    /// Every occurrence counts, repeats included
    pub count: u64,
    pub last_seen_ts: f64,
    /// Mechanically decayed recency, reset to 1.0 on each occurrence
    pub strength: f64,
}

/// Per-node motif occurrence table.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MotifTable {
    motifs: BTreeMap<Motif, MotifStats>,
}

impl MotifTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one occurrence of `motif` at `ts`.
    pub fn record(&mut self, motif: Motif, ts: f64) {
        let stats = self.motifs.entry(motif).or_insert(MotifStats {
            count: 0,
            last_seen_ts: ts,
            strength: 1.0,
        });
        stats.count += 1;
        stats.last_seen_ts = ts;
        stats.strength = 1.0;
    }

    /// Multiply every motif strength by `factor` (clamped to `[0, 1]`).
    pub fn apply_decay(&mut self, factor: f64) {
        let factor = factor.clamp(0.0, 1.0);
        for stats in self.motifs.values_mut() {
            stats.strength *= factor;
        }
    }

    pub fn get(&self, motif: &Motif) -> Option<&MotifStats> {
        self.motifs.get(motif)
    }

    pub fn contains(&self, motif: &Motif) -> bool {
        self.motifs.contains_key(motif)
    }

    /// Iterate in canonical motif order.
    pub fn iter(&self) -> impl Iterator<Item = (&Motif, &MotifStats)> {
        self.motifs.iter()
    }

    pub fn len(&self) -> usize {
        self.motifs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.motifs.is_empty()
    }

    pub fn distinct_bigrams(&self) -> usize {
        self.motifs.keys().filter(|m| m.is_bigram()).count()
    }

    pub fn distinct_trigrams(&self) -> usize {
        self.motifs.keys().filter(|m| m.is_trigram()).count()
    }

    /// Total occurrences of motifs of the given length.
    pub fn occurrences_of_len(&self, len: usize) -> u64 {
        self.motifs
            .iter()
            .filter(|(m, _)| m.len() == len)
            .map(|(_, s)| s.count)
            .sum()
    }

    /// Check that all strengths are finite and within `[0, 1]`.
    pub fn check_bounds(&self) -> std::result::Result<(), String> {
        for (motif, stats) in &self.motifs {
            if !stats.strength.is_finite() || !(0.0..=1.0).contains(&stats.strength) {
                return Err(format!(
                    "motif {} strength {} outside [0, 1]",
                    motif, stats.strength
                ));
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use EvidenceToken::*;

    #[test]
    fn test_motif_length_bounds() {
        assert!(Motif::new(vec![TradeExec]).is_err());
        assert!(Motif::new(vec![TradeExec, LiqOccur]).is_ok());
        assert!(Motif::new(vec![TradeExec, LiqOccur, PriceExit]).is_ok());
        assert!(Motif::new(vec![TradeExec, LiqOccur, PriceExit, ObVanish]).is_err());
    }

    #[test]
    fn test_motif_string_form() {
        let motif = Motif::trigram(ObAppear, TradeExec, LiqCascade);
        assert_eq!(motif.to_string(), "OB_APPEAR>TRADE_EXEC>LIQ_CASCADE");
        assert_eq!("OB_APPEAR>TRADE_EXEC>LIQ_CASCADE".parse::<Motif>().unwrap(), motif);
        assert!("OB_APPEAR>NOT_A_TOKEN".parse::<Motif>().is_err());
    }

    #[test]
    fn test_record_counts_every_occurrence() {
        let mut table = MotifTable::new();
        let motif = Motif::bigram(TradeExec, TradeExec);
        table.record(motif.clone(), 1.0);
        table.record(motif.clone(), 2.0);
        table.record(motif.clone(), 3.0);

        let stats = table.get(&motif).unwrap();
        assert_eq!(stats.count, 3);
        assert_eq!(stats.last_seen_ts, 3.0);
        assert_eq!(table.len(), 1);
    }

    #[test]
    fn test_decay_and_refresh() {
        let mut table = MotifTable::new();
        let motif = Motif::bigram(PriceTouch, PriceExit);
        table.record(motif.clone(), 1.0);
        table.apply_decay(0.5);
        assert_eq!(table.get(&motif).unwrap().strength, 0.5);

        table.record(motif.clone(), 2.0);
        assert_eq!(table.get(&motif).unwrap().strength, 1.0);
    }

    #[test]
    fn test_json_map_keys() {
        let mut table = MotifTable::new();
        table.record(Motif::bigram(LiqOccur, LiqCascade), 10.0);
        let json = serde_json::to_string(&table).unwrap();
        assert!(json.contains("\"LIQ_OCCUR>LIQ_CASCADE\""));

        let back: MotifTable = serde_json::from_str(&json).unwrap();
        assert_eq!(back, table);
    }

    #[test]
    fn test_length_breakdown() {
        let mut table = MotifTable::new();
        table.record(Motif::bigram(ObAppear, ObPersist), 1.0);
        table.record(Motif::bigram(ObPersist, ObVanish), 2.0);
        table.record(Motif::trigram(ObAppear, ObPersist, ObVanish), 2.0);
        table.record(Motif::trigram(ObAppear, ObPersist, ObVanish), 3.0);

        assert_eq!(table.distinct_bigrams(), 2);
        assert_eq!(table.distinct_trigrams(), 1);
        assert_eq!(table.occurrences_of_len(3), 2);
    }
}
