//! Structural analysis over a set of memory nodes.
//!
//! Everything here is read-only and reports counts, ratios and price
//! intervals. Cluster ids are sequence numbers in price order.

use serde::{Deserialize, Serialize};

use crate::config::TopologyConfig;
use crate::error::{Error, Result};
use crate::memory::{MemoryNode, MemoryStore, NodeId, Tier};

/// Node count and summed strength around a price.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NeighborhoodDensity {
    pub price: f64,
    pub radius: f64,
    pub node_count: usize,
    pub strength_sum: f64,
}

/// A group of linked nodes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopologyCluster {
    pub cluster_id: usize,
    /// Mean of member price centers
    pub price_center: f64,
    /// Lowest band edge to highest band edge
    pub price_range: (f64, f64),
    pub node_count: usize,
    pub avg_strength: f64,
    pub node_ids: Vec<NodeId>,
}

/// A price interval no qualifying node covers.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PriceGap {
    pub gap_start: f64,
    pub gap_end: f64,
    pub width: f64,
}

/// Aggregate shape of a node set.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopologySummary {
    pub node_count: usize,
    pub price_low: Option<f64>,
    pub price_high: Option<f64>,
    pub span: f64,
    /// Total width of the union of all bands
    pub covered_width: f64,
    /// `covered_width / span`, zero for an empty or degenerate set
    pub coverage_ratio: f64,
    pub gap_count: usize,
    pub cluster_count: usize,
}

/// Analyzer over a borrowed node set.
pub struct TopologyAnalyzer<'a> {
    nodes: Vec<&'a MemoryNode>,
    config: TopologyConfig,
}

impl<'a> TopologyAnalyzer<'a> {
    /// Analyze the given nodes. Order does not matter.
    pub fn new(nodes: impl IntoIterator<Item = &'a MemoryNode>, config: TopologyConfig) -> Self {
        let mut nodes: Vec<&'a MemoryNode> = nodes.into_iter().collect();
        nodes.sort_by(|a, b| {
            a.band_low()
                .total_cmp(&b.band_low())
                .then(a.id.cmp(&b.id))
        });
        Self { nodes, config }
    }

    /// ACTIVE nodes of a store, plus DORMANT ones when asked.
    pub fn from_store(store: &'a MemoryStore, include_dormant: bool) -> Self {
        let dormant = include_dormant
            .then(|| store.nodes(Tier::Dormant))
            .into_iter()
            .flatten();
        Self::new(
            store.nodes(Tier::Active).chain(dormant),
            store.config().topology.clone(),
        )
    }

    pub fn nodes(&self) -> &[&'a MemoryNode] {
        &self.nodes
    }

    /// Nodes whose band intersects `[price - radius, price + radius]`.
    pub fn density(&self, price: f64, radius: f64) -> Result<NeighborhoodDensity> {
        if !price.is_finite() || !radius.is_finite() || radius < 0.0 {
            return Err(Error::invalid_query(format!(
                "density window {} ± {} is not valid",
                price, radius
            )));
        }

        let (low, high) = (price - radius, price + radius);
        let hits = self.nodes.iter().filter(|n| n.intersects(low, high));
        let (node_count, strength_sum) =
            hits.fold((0, 0.0), |(count, sum), n| (count + 1, sum + n.strength));

        Ok(NeighborhoodDensity {
            price,
            radius,
            node_count,
            strength_sum,
        })
    }

    /// Single-linkage clusters.
    ///
    /// Two nodes link when their bands are within `adjacency_tolerance` of
    /// each other, their active time ranges overlap (unless disabled) and
    /// their interaction counts differ by at most `evidence_tolerance`
    /// relative to the larger.
    pub fn clusters(&self) -> Vec<TopologyCluster> {
        let n = self.nodes.len();
        let mut parent: Vec<usize> = (0..n).collect();

        for i in 0..n {
            for j in (i + 1)..n {
                if self.linked(self.nodes[i], self.nodes[j]) {
                    let (ri, rj) = (find(&mut parent, i), find(&mut parent, j));
                    if ri != rj {
                        parent[ri.max(rj)] = ri.min(rj);
                    }
                }
            }
        }

        // Roots are the lowest index in each group, and nodes are sorted by
        // band_low, so iterating indices yields clusters in price order.
        let mut groups: Vec<(usize, Vec<&MemoryNode>)> = Vec::new();
        for i in 0..n {
            let root = find(&mut parent, i);
            match groups.iter_mut().find(|(r, _)| *r == root) {
                Some((_, members)) => members.push(self.nodes[i]),
                None => groups.push((root, vec![self.nodes[i]])),
            }
        }

        groups
            .into_iter()
            .enumerate()
            .map(|(cluster_id, (_, members))| {
                let count = members.len() as f64;
                let low = members.iter().map(|m| m.band_low()).fold(f64::INFINITY, f64::min);
                let high = members
                    .iter()
                    .map(|m| m.band_high())
                    .fold(f64::NEG_INFINITY, f64::max);
                let mut node_ids: Vec<NodeId> = members.iter().map(|m| m.id).collect();
                node_ids.sort();

                TopologyCluster {
                    cluster_id,
                    price_center: members.iter().map(|m| m.price_center).sum::<f64>() / count,
                    price_range: (low, high),
                    node_count: members.len(),
                    avg_strength: members.iter().map(|m| m.strength).sum::<f64>() / count,
                    node_ids,
                }
            })
            .collect()
    }

    fn linked(&self, a: &MemoryNode, b: &MemoryNode) -> bool {
        let band_gap = a.band_low().max(b.band_low()) - a.band_high().min(b.band_high());
        if band_gap > self.config.adjacency_tolerance {
            return false;
        }

        if self.config.require_temporal_overlap
            && (a.first_seen_ts > b.last_interaction_ts || b.first_seen_ts > a.last_interaction_ts)
        {
            return false;
        }

        let (na, nb) = (
            a.evidence.interaction_count as f64,
            b.evidence.interaction_count as f64,
        );
        let larger = na.max(nb);
        larger == 0.0 || (na - nb).abs() / larger <= self.config.evidence_tolerance
    }

    /// Uncovered intervals between the bands of nodes whose interaction
    /// count exceeds `gap_interaction_floor`, wider than `gap_min_width`.
    pub fn gaps(&self) -> Vec<PriceGap> {
        let covered = merge_bands(
            self.nodes
                .iter()
                .copied()
                .filter(|n| n.evidence.interaction_count > self.config.gap_interaction_floor),
        );

        covered
            .windows(2)
            .filter_map(|pair| {
                let (start, end) = (pair[0].1, pair[1].0);
                let width = end - start;
                (width > self.config.gap_min_width).then_some(PriceGap {
                    gap_start: start,
                    gap_end: end,
                    width,
                })
            })
            .collect()
    }

    pub fn summary(&self) -> TopologySummary {
        let covered = merge_bands(self.nodes.iter().copied());
        let price_low = covered.first().map(|(low, _)| *low);
        let price_high = covered.last().map(|(_, high)| *high);
        let span = match (price_low, price_high) {
            (Some(low), Some(high)) => high - low,
            _ => 0.0,
        };
        let covered_width: f64 = covered.iter().map(|(low, high)| high - low).sum();

        TopologySummary {
            node_count: self.nodes.len(),
            price_low,
            price_high,
            span,
            covered_width,
            coverage_ratio: if span > 0.0 { covered_width / span } else { 0.0 },
            gap_count: self.gaps().len(),
            cluster_count: self.clusters().len(),
        }
    }
}

fn find(parent: &mut [usize], i: usize) -> usize {
    let mut root = i;
    while parent[root] != root {
        root = parent[root];
    }
    let mut cur = i;
    while parent[cur] != root {
        let next = parent[cur];
        parent[cur] = root;
        cur = next;
    }
    root
}

/// Union of closed bands as sorted, disjoint intervals.
fn merge_bands<'a>(nodes: impl Iterator<Item = &'a MemoryNode>) -> Vec<(f64, f64)> {
    let mut bands: Vec<(f64, f64)> = nodes.map(|n| (n.band_low(), n.band_high())).collect();
    bands.sort_by(|a, b| a.0.total_cmp(&b.0).then(a.1.total_cmp(&b.1)));

    let mut merged: Vec<(f64, f64)> = Vec::with_capacity(bands.len());
    for (low, high) in bands {
        match merged.last_mut() {
            Some(last) if low <= last.1 => last.1 = last.1.max(high),
            _ => merged.push((low, high)),
        }
    }
    merged
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{BandConfig, MemoryConfig};
    use crate::evidence::EvidenceEvent;

    const SYMBOL: &str = "SOLUSDT";

    fn store_with_band(half_width: f64) -> MemoryStore {
        let config = MemoryConfig {
            band: BandConfig {
                band_fraction: 1e-9,
                min_band: half_width,
            },
            ..MemoryConfig::default()
        };
        MemoryStore::new(SYMBOL, config).unwrap()
    }

    fn trade_at(store: &mut MemoryStore, ts: f64, price: f64) -> NodeId {
        store
            .ingest(&EvidenceEvent::trade(ts, SYMBOL, price, 1.0, true))
            .unwrap()
            .unwrap()
    }

    #[test]
    fn test_density() {
        let mut store = store_with_band(0.5);
        trade_at(&mut store, 1.0, 100.0);
        trade_at(&mut store, 2.0, 102.0);
        trade_at(&mut store, 3.0, 110.0);

        let analyzer = TopologyAnalyzer::from_store(&store, false);
        let density = analyzer.density(101.0, 1.0).unwrap();
        assert_eq!(density.node_count, 2);
        assert!((density.strength_sum - 1.0).abs() < 1e-12);

        assert!(analyzer.density(101.0, -1.0).is_err());
    }

    #[test]
    fn test_gap_width_matches_inserted_gap() {
        let band = 0.5;
        let mut store = store_with_band(band);
        let mut ts = 0.0;
        for price in [100.0, 101.0, 102.0, 103.0, 104.0, 105.0] {
            ts += 1.0;
            trade_at(&mut store, ts, price);
        }
        // Deliberate gap: centers 105 -> 115
        for price in [115.0, 116.0, 117.0] {
            ts += 1.0;
            trade_at(&mut store, ts, price);
        }

        let gaps = TopologyAnalyzer::from_store(&store, false).gaps();
        assert_eq!(gaps.len(), 1);
        let gap = gaps[0];
        assert!((gap.width - 10.0).abs() <= 2.0 * band, "width {}", gap.width);
        assert!((gap.gap_start - 105.5).abs() < 1e-9);
        assert!((gap.gap_end - 114.5).abs() < 1e-9);
    }

    #[test]
    fn test_gap_ignores_nodes_at_interaction_floor() {
        let mut store = store_with_band(0.5);
        trade_at(&mut store, 1.0, 100.0);
        // Repeated rejection gives a touch-only node with zero interactions
        store
            .ingest(&EvidenceEvent::price_touch(2.0, SYMBOL, 105.0))
            .unwrap();
        let touched = store
            .ingest(&EvidenceEvent::price_touch(2.5, SYMBOL, 105.0))
            .unwrap();
        assert!(touched.is_some());
        trade_at(&mut store, 3.0, 110.0);

        let gaps = TopologyAnalyzer::from_store(&store, false).gaps();
        assert_eq!(gaps.len(), 1);
        assert!((gaps[0].width - 9.0).abs() < 1e-9);

        // A single interaction equals a floor of 1 and no longer covers
        trade_at(&mut store, 4.0, 120.0);
        let mut config = store.config().topology.clone();
        config.gap_interaction_floor = 1;
        let gaps = TopologyAnalyzer::new(store.nodes(Tier::Active), config).gaps();
        assert!(gaps.is_empty());

        let mut store_two = store_with_band(0.5);
        for ts in [1.0, 2.0] {
            trade_at(&mut store_two, ts, 100.0);
        }
        trade_at(&mut store_two, 3.0, 110.0);
        for ts in [4.0, 5.0] {
            trade_at(&mut store_two, ts, 110.0);
        }
        let mut config = store_two.config().topology.clone();
        config.gap_interaction_floor = 1;
        let gaps = TopologyAnalyzer::new(store_two.nodes(Tier::Active), config).gaps();
        assert_eq!(gaps.len(), 1);
    }

    #[test]
    fn test_clusters_by_adjacency() {
        let mut store = store_with_band(0.5);
        let a = trade_at(&mut store, 1.0, 100.0);
        let b = trade_at(&mut store, 2.0, 101.0);
        let c = trade_at(&mut store, 3.0, 120.0);

        let mut config = store.config().topology.clone();
        config.require_temporal_overlap = false;
        let analyzer = TopologyAnalyzer::new(store.nodes(Tier::Active), config);
        let clusters = analyzer.clusters();

        assert_eq!(clusters.len(), 2);
        assert_eq!(clusters[0].cluster_id, 0);
        assert_eq!(clusters[0].node_ids, vec![a, b]);
        assert_eq!(clusters[0].price_range, (99.5, 101.5));
        assert!((clusters[0].price_center - 100.5).abs() < 1e-12);
        assert_eq!(clusters[1].node_ids, vec![c]);
    }

    #[test]
    fn test_temporal_overlap_splits_clusters() {
        let mut store = store_with_band(0.5);
        trade_at(&mut store, 1.0, 100.0);
        trade_at(&mut store, 50.0, 101.0);

        // Each node interacted once, at disjoint times
        let analyzer = TopologyAnalyzer::from_store(&store, false);
        assert_eq!(analyzer.clusters().len(), 2);
    }

    #[test]
    fn test_evidence_tolerance_splits_clusters() {
        let mut store = store_with_band(0.5);
        trade_at(&mut store, 1.0, 100.0);
        for ts in 2..10 {
            trade_at(&mut store, ts as f64, 101.0);
        }
        trade_at(&mut store, 10.0, 100.0);

        let mut config = store.config().topology.clone();
        config.evidence_tolerance = 0.5;
        let strict = TopologyAnalyzer::new(store.nodes(Tier::Active), config.clone());
        assert_eq!(strict.clusters().len(), 2);

        config.evidence_tolerance = 1.0;
        let loose = TopologyAnalyzer::new(store.nodes(Tier::Active), config);
        assert_eq!(loose.clusters().len(), 1);
    }

    #[test]
    fn test_summary() {
        let mut store = store_with_band(0.5);
        trade_at(&mut store, 1.0, 100.0);
        trade_at(&mut store, 2.0, 104.0);

        let summary = TopologyAnalyzer::from_store(&store, false).summary();
        assert_eq!(summary.node_count, 2);
        assert_eq!(summary.price_low, Some(99.5));
        assert_eq!(summary.price_high, Some(104.5));
        assert!((summary.span - 5.0).abs() < 1e-12);
        assert!((summary.covered_width - 2.0).abs() < 1e-12);
        assert!((summary.coverage_ratio - 0.4).abs() < 1e-12);
        assert_eq!(summary.gap_count, 1);
    }

    #[test]
    fn test_empty_summary() {
        let store = store_with_band(0.5);
        let summary = TopologyAnalyzer::from_store(&store, true).summary();
        assert_eq!(summary.node_count, 0);
        assert_eq!(summary.span, 0.0);
        assert_eq!(summary.coverage_ratio, 0.0);
    }
}
