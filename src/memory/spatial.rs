//! Band-overlap matching of a price against existing nodes.

use super::node::MemoryNode;
use super::types::NodeId;

/// Pick the node an event at `price` belongs to.
///
/// Candidates are nodes whose closed band covers `price`. The nearest
/// `price_center` wins; equal distances go to the smallest id. Returns
/// `None` when no band covers the price.
pub fn match_node<'a, I>(price: f64, nodes: I) -> Option<NodeId>
where
    I: IntoIterator<Item = &'a MemoryNode>,
{
    nodes
        .into_iter()
        .filter(|node| node.covers(price))
        .min_by(|a, b| {
            a.distance_to(price)
                .total_cmp(&b.distance_to(price))
                .then(a.id.cmp(&b.id))
        })
        .map(|node| node.id)
}

/// Nodes whose band intersects `[price - radius, price + radius]`.
pub fn within_radius<'a, I>(price: f64, radius: f64, nodes: I) -> Vec<&'a MemoryNode>
where
    I: IntoIterator<Item = &'a MemoryNode>,
{
    let (low, high) = (price - radius, price + radius);
    nodes
        .into_iter()
        .filter(|node| node.intersects(low, high))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MemoryConfig;
    use crate::evidence::EvidenceEvent;

    fn node(id: u64, price: f64, band: f64) -> MemoryNode {
        let event = EvidenceEvent::trade(1.0, "BTC", price, 1.0, true);
        let mut node = MemoryNode::new(NodeId(id), &event, &MemoryConfig::default(), 1e-5);
        node.price_band = band;
        node
    }

    #[test]
    fn test_no_match_outside_bands() {
        let nodes = vec![node(1, 100.0, 0.5), node(2, 110.0, 0.5)];
        assert_eq!(match_node(105.0, &nodes), None);
    }

    #[test]
    fn test_nearest_center_wins() {
        let nodes = vec![node(1, 100.0, 2.0), node(2, 101.0, 2.0)];
        assert_eq!(match_node(100.8, &nodes), Some(NodeId(2)));
        assert_eq!(match_node(100.2, &nodes), Some(NodeId(1)));
    }

    #[test]
    fn test_tie_goes_to_smallest_id() {
        let nodes = vec![node(7, 101.0, 2.0), node(3, 99.0, 2.0)];
        assert_eq!(match_node(100.0, &nodes), Some(NodeId(3)));
    }

    #[test]
    fn test_band_edge_is_inclusive() {
        let nodes = vec![node(1, 100.0, 0.5)];
        assert_eq!(match_node(100.5, &nodes), Some(NodeId(1)));
    }

    #[test]
    fn test_within_radius() {
        let nodes = vec![node(1, 100.0, 0.1), node(2, 103.0, 0.1), node(3, 97.5, 0.1)];
        let hits = within_radius(100.0, 2.5, &nodes);
        let ids: Vec<NodeId> = hits.iter().map(|n| n.id).collect();
        assert_eq!(ids, vec![NodeId(1), NodeId(3)]);
    }

    #[test]
    fn test_zero_radius_hits_covering_band() {
        let nodes = vec![node(1, 100.0, 0.5)];
        assert_eq!(within_radius(100.4, 0.0, &nodes).len(), 1);
        assert!(within_radius(100.6, 0.0, &nodes).is_empty());
    }
}
