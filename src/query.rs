//! Read-only query facade over a [`MemoryStore`].
//!
//! Every method returns raw counts, timestamps or lists ordered by a numeric
//! field (price, time, count). Nothing here scores or ranks evidence.

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use crate::error::{Error, Result};
use crate::evidence::{EvidenceToken, TokenEntry};
use crate::memory::{
    CreationReason, EvidenceCounters, MemoryMetrics, MemoryNode, MemoryStore, NodeId, NodeOrder,
    NodeSide, Tier, Timestamp,
};
use crate::motif::{Motif, MotifStats, MotifTable};
use crate::topology::{
    NeighborhoodDensity, PriceGap, TopologyAnalyzer, TopologyCluster, TopologySummary,
};

/// Listing order for a node's motifs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MotifOrder {
    /// Token order, bigrams before trigrams sharing a prefix
    #[default]
    Canonical,
    CountDescending,
    LastSeenDescending,
}

/// One node's record of a motif.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotifOccurrence {
    pub node_id: NodeId,
    pub tier: Tier,
    pub price_center: f64,
    pub count: u64,
    pub last_seen_ts: Timestamp,
    pub strength: f64,
}

/// Distinct motif counts and total occurrences.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MotifDiversity {
    pub distinct_bigrams: usize,
    pub distinct_trigrams: usize,
    pub bigram_occurrences: u64,
    pub trigram_occurrences: u64,
}

impl MotifDiversity {
    pub fn distinct_total(&self) -> usize {
        self.distinct_bigrams + self.distinct_trigrams
    }

    fn from_table(table: &MotifTable) -> Self {
        Self {
            distinct_bigrams: table.distinct_bigrams(),
            distinct_trigrams: table.distinct_trigrams(),
            bigram_occurrences: table.occurrences_of_len(2),
            trigram_occurrences: table.occurrences_of_len(3),
        }
    }
}

/// Token buffer bounds and fill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BufferInfo {
    pub node_id: NodeId,
    pub len: usize,
    pub capacity: usize,
    pub window_secs: f64,
    pub oldest_ts: Option<Timestamp>,
    pub newest_ts: Option<Timestamp>,
    pub evicted_total: u64,
}

/// Flat view of a node without its token buffer and motif table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeMetadata {
    pub id: NodeId,
    pub tier: Tier,
    pub price_center: f64,
    pub price_band: f64,
    pub band_low: f64,
    pub band_high: f64,
    pub side: NodeSide,
    pub creation_reason: CreationReason,
    pub first_seen_ts: Timestamp,
    pub last_interaction_ts: Timestamp,
    pub last_decay_applied_ts: Timestamp,
    pub strength: f64,
    pub confidence: f64,
    pub decay_rate: f64,
    pub invalidated_since: Option<Timestamp>,
    pub revival_count: u64,
    pub evidence: EvidenceCounters,
    pub interaction_gap_median: f64,
    pub interaction_gap_stddev: f64,
    pub motif_count: usize,
    pub buffer_len: usize,
}

impl From<&MemoryNode> for NodeMetadata {
    fn from(node: &MemoryNode) -> Self {
        Self {
            id: node.id,
            tier: node.tier,
            price_center: node.price_center,
            price_band: node.price_band,
            band_low: node.band_low(),
            band_high: node.band_high(),
            side: node.side,
            creation_reason: node.creation_reason,
            first_seen_ts: node.first_seen_ts,
            last_interaction_ts: node.last_interaction_ts,
            last_decay_applied_ts: node.last_decay_applied_ts,
            strength: node.strength,
            confidence: node.confidence,
            decay_rate: node.decay_rate,
            invalidated_since: node.invalidated_since,
            revival_count: node.revival_count,
            evidence: node.evidence.clone(),
            interaction_gap_median: node.timing.interaction_gap_median,
            interaction_gap_stddev: node.timing.interaction_gap_stddev,
            motif_count: node.motifs.table().len(),
            buffer_len: node.motifs.buffer().len(),
        }
    }
}

/// Borrowing query view over one store.
#[derive(Clone, Copy)]
pub struct MemoryQuery<'a> {
    store: &'a MemoryStore,
}

impl<'a> MemoryQuery<'a> {
    pub fn new(store: &'a MemoryStore) -> Self {
        Self { store }
    }

    fn node(&self, id: NodeId) -> Result<&'a MemoryNode> {
        self.store.get_node(id)
    }

    // ==================== Sequences ====================

    /// The node's buffered tokens in arrival order.
    pub fn node_sequence(&self, id: NodeId) -> Result<Vec<TokenEntry>> {
        Ok(self.node(id)?.motifs.buffer().iter().copied().collect())
    }

    /// Buffered tokens with `start <= timestamp <= end`.
    pub fn tokens_in_range(
        &self,
        id: NodeId,
        start: Timestamp,
        end: Timestamp,
    ) -> Result<Vec<TokenEntry>> {
        if !start.is_finite() || !end.is_finite() || start > end {
            return Err(Error::invalid_query(format!(
                "time range [{}, {}] is not valid",
                start, end
            )));
        }
        Ok(self.node(id)?.motifs.buffer().in_range(start, end))
    }

    pub fn tokens_of_kind(&self, id: NodeId, token: EvidenceToken) -> Result<Vec<TokenEntry>> {
        Ok(self
            .node(id)?
            .motifs
            .buffer()
            .iter()
            .filter(|entry| entry.token == token)
            .copied()
            .collect())
    }

    // ==================== Motifs ====================

    pub fn node_motifs(&self, id: NodeId, order: MotifOrder) -> Result<Vec<(Motif, MotifStats)>> {
        let mut motifs: Vec<(Motif, MotifStats)> = self
            .node(id)?
            .motifs
            .table()
            .iter()
            .map(|(motif, stats)| (motif.clone(), *stats))
            .collect();

        // Stable sorts keep canonical order among equal keys
        match order {
            MotifOrder::Canonical => {}
            MotifOrder::CountDescending => motifs.sort_by(|a, b| b.1.count.cmp(&a.1.count)),
            MotifOrder::LastSeenDescending => {
                motifs.sort_by(|a, b| b.1.last_seen_ts.total_cmp(&a.1.last_seen_ts))
            }
        }
        Ok(motifs)
    }

    pub fn motif_stats(&self, id: NodeId, motif: &Motif) -> Result<Option<MotifStats>> {
        Ok(self.node(id)?.motifs.table().get(motif).copied())
    }

    /// Every node, in any tier, whose table contains `motif`, by ascending price.
    pub fn nodes_with_motif(&self, motif: &Motif) -> Vec<MotifOccurrence> {
        let mut hits: Vec<MotifOccurrence> = self
            .store
            .all_nodes()
            .filter_map(|node| {
                node.motifs.table().get(motif).map(|stats| MotifOccurrence {
                    node_id: node.id,
                    tier: node.tier,
                    price_center: node.price_center,
                    count: stats.count,
                    last_seen_ts: stats.last_seen_ts,
                    strength: stats.strength,
                })
            })
            .collect();
        hits.sort_by(|a, b| {
            a.price_center
                .total_cmp(&b.price_center)
                .then(a.node_id.cmp(&b.node_id))
        });
        hits
    }

    pub fn motif_diversity(&self, id: NodeId) -> Result<MotifDiversity> {
        Ok(MotifDiversity::from_table(self.node(id)?.motifs.table()))
    }

    /// Distinct motifs across all nodes; occurrences summed over nodes.
    pub fn global_motif_diversity(&self) -> MotifDiversity {
        let mut distinct: BTreeSet<&Motif> = BTreeSet::new();
        let mut diversity = MotifDiversity::default();

        for node in self.store.all_nodes() {
            let table = node.motifs.table();
            distinct.extend(table.iter().map(|(motif, _)| motif));
            diversity.bigram_occurrences += table.occurrences_of_len(2);
            diversity.trigram_occurrences += table.occurrences_of_len(3);
        }

        diversity.distinct_bigrams = distinct.iter().filter(|m| m.is_bigram()).count();
        diversity.distinct_trigrams = distinct.iter().filter(|m| m.is_trigram()).count();
        diversity
    }

    // ==================== Introspection ====================

    pub fn buffer_info(&self, id: NodeId) -> Result<BufferInfo> {
        let buffer = self.node(id)?.motifs.buffer();
        Ok(BufferInfo {
            node_id: id,
            len: buffer.len(),
            capacity: buffer.capacity(),
            window_secs: buffer.window_secs(),
            oldest_ts: buffer.oldest().map(|e| e.timestamp),
            newest_ts: buffer.newest().map(|e| e.timestamp),
            evicted_total: buffer.evicted_total(),
        })
    }

    pub fn node_metadata(&self, id: NodeId) -> Result<NodeMetadata> {
        self.node(id).map(NodeMetadata::from)
    }

    pub fn active_nodes(
        &self,
        price: f64,
        radius: f64,
        order: NodeOrder,
    ) -> Result<Vec<&'a MemoryNode>> {
        self.store.get_active_nodes(price, radius, order)
    }

    pub fn dormant_nodes(
        &self,
        price: f64,
        radius: f64,
        order: NodeOrder,
    ) -> Result<Vec<&'a MemoryNode>> {
        self.store.get_dormant_nodes(price, radius, order)
    }

    pub fn metrics(&self) -> MemoryMetrics {
        self.store.get_metrics()
    }

    // ==================== Topology ====================

    pub fn topology(&self, include_dormant: bool) -> TopologyAnalyzer<'a> {
        TopologyAnalyzer::from_store(self.store, include_dormant)
    }

    pub fn density(
        &self,
        price: f64,
        radius: f64,
        include_dormant: bool,
    ) -> Result<NeighborhoodDensity> {
        self.topology(include_dormant).density(price, radius)
    }

    pub fn clusters(&self, include_dormant: bool) -> Vec<TopologyCluster> {
        self.topology(include_dormant).clusters()
    }

    pub fn gaps(&self, include_dormant: bool) -> Vec<PriceGap> {
        self.topology(include_dormant).gaps()
    }

    pub fn topology_summary(&self, include_dormant: bool) -> TopologySummary {
        self.topology(include_dormant).summary()
    }
}
