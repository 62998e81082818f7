//! Identifiers, tiers and audit records for the memory store.

use serde::{Deserialize, Serialize};

/// Seconds, supplied by the caller. The core never reads a clock.
pub type Timestamp = f64;

/// Stable node identifier, assigned sequentially per store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NodeId(pub u64);

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "node#{}", self.0)
    }
}

/// Lifecycle tier of a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Tier {
    /// Recently reinforced, decays at the base rate
    Active,
    /// Retained history, decays at a tenth of the base rate
    Dormant,
    /// Frozen, retrievable by id only
    Archived,
}

impl Tier {
    /// The tier a node falls to next, if any.
    pub fn next(&self) -> Option<Tier> {
        match self {
            Self::Active => Some(Self::Dormant),
            Self::Dormant => Some(Self::Archived),
            Self::Archived => None,
        }
    }

    pub fn is_frozen(&self) -> bool {
        matches!(self, Self::Archived)
    }
}

impl std::fmt::Display for Tier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Active => write!(f, "ACTIVE"),
            Self::Dormant => write!(f, "DORMANT"),
            Self::Archived => write!(f, "ARCHIVED"),
        }
    }
}

/// Book side a node was created from. Never used for matching.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeSide {
    Bid,
    Ask,
    Both,
}

/// The kind of evidence that created a node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CreationReason {
    LiquidationProximity,
    TradeExecution,
    OrderBookPresence,
    PriceRejection,
}

impl std::fmt::Display for CreationReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::LiquidationProximity => write!(f, "liquidation_proximity"),
            Self::TradeExecution => write!(f, "trade_execution"),
            Self::OrderBookPresence => write!(f, "order_book_presence"),
            Self::PriceRejection => write!(f, "price_rejection"),
        }
    }
}

/// Why a node changed tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionCause {
    StrengthBelowThreshold,
    IdleTimeout,
    /// New matching evidence arrived for a DORMANT or ARCHIVED node
    Revival,
}

/// Entry in the tier transition log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TierTransition {
    pub node_id: NodeId,
    pub from: Tier,
    pub to: Tier,
    pub timestamp: Timestamp,
    pub cause: TransitionCause,
    /// Node strength right after the transition
    pub strength: f64,
}

/// A rolled-back mutation, kept for offline audit.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViolationRecord {
    pub node_id: NodeId,
    pub timestamp: Timestamp,
    pub operation: String,
    pub message: String,
}

/// Ordering for node listings. Numeric criteria only; ties fall back to id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeOrder {
    /// Nearest price center first
    #[default]
    PriceDistance,
    /// Highest strength value first
    Strength,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tier_progression() {
        assert_eq!(Tier::Active.next(), Some(Tier::Dormant));
        assert_eq!(Tier::Dormant.next(), Some(Tier::Archived));
        assert_eq!(Tier::Archived.next(), None);
        assert!(Tier::Archived.is_frozen());
    }

    #[test]
    fn test_serde_names() {
        assert_eq!(serde_json::to_string(&Tier::Dormant).unwrap(), "\"DORMANT\"");
        assert_eq!(
            serde_json::to_string(&CreationReason::LiquidationProximity).unwrap(),
            "\"liquidation_proximity\""
        );
    }
}
