//! The memory node record and how evidence updates it.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use super::types::{CreationReason, NodeId, NodeSide, Tier, Timestamp};
use crate::config::{EvidenceConfig, MemoryConfig};
use crate::evidence::{EvidenceEvent, EvidenceToken, LiquidationSide};
use crate::motif::MotifExtractor;

/// Relative slack for float accumulation in volume invariants.
const VOLUME_EPSILON: f64 = 1e-9;

/// Monotonic evidence counters for a node.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EvidenceCounters {
    pub interaction_count: u64,
    pub orderbook_appearance_count: u64,
    pub trade_execution_count: u64,
    pub liquidation_proximity_count: u64,

    pub volume_total: f64,
    pub buyer_initiated_volume: f64,
    pub seller_initiated_volume: f64,
    pub passive_fill_volume: f64,
    pub aggressive_fill_volume: f64,

    pub liquidations_within_band: u64,
    pub long_liquidations: u64,
    pub short_liquidations: u64,
    pub max_liquidation_cascade_size: u64,

    /// Price touches are tracked apart from interactions
    pub price_touch_count: u64,
}

impl EvidenceCounters {
    /// Mean size of the trades seen so far, if any.
    pub fn mean_trade_size(&self) -> Option<f64> {
        if self.trade_execution_count == 0 {
            return None;
        }
        let traded = self.buyer_initiated_volume + self.seller_initiated_volume;
        Some(traded / self.trade_execution_count as f64)
    }
}

/// Transient facts about the level used to derive tokens.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LevelState {
    /// Latest order-book size seen inside the band
    pub resting_size: f64,
    pub last_liquidation_ts: Option<Timestamp>,
    pub current_cascade_size: u64,
    pub last_touch_ts: Option<Timestamp>,
}

/// Bounded history of interaction times and the spacing between them.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InteractionTiming {
    recent: VecDeque<Timestamp>,
    capacity: usize,
    pub interaction_gap_median: f64,
    /// Population standard deviation of the gaps
    pub interaction_gap_stddev: f64,
}

impl InteractionTiming {
    pub fn new(capacity: usize) -> Self {
        Self {
            recent: VecDeque::with_capacity(capacity),
            capacity,
            interaction_gap_median: 0.0,
            interaction_gap_stddev: 0.0,
        }
    }

    pub fn record(&mut self, ts: Timestamp) {
        self.recent.push_back(ts);
        while self.recent.len() > self.capacity {
            self.recent.pop_front();
        }
        self.recompute();
    }

    pub fn recent(&self) -> impl Iterator<Item = &Timestamp> {
        self.recent.iter()
    }

    pub fn len(&self) -> usize {
        self.recent.len()
    }

    pub fn is_empty(&self) -> bool {
        self.recent.is_empty()
    }

    fn recompute(&mut self) {
        let mut gaps: Vec<f64> = self
            .recent
            .iter()
            .zip(self.recent.iter().skip(1))
            .map(|(a, b)| b - a)
            .collect();

        if gaps.is_empty() {
            self.interaction_gap_median = 0.0;
            self.interaction_gap_stddev = 0.0;
            return;
        }

        gaps.sort_by(|a, b| a.total_cmp(b));
        let mid = gaps.len() / 2;
        self.interaction_gap_median = if gaps.len() % 2 == 0 {
            (gaps[mid - 1] + gaps[mid]) / 2.0
        } else {
            gaps[mid]
        };

        let n = gaps.len() as f64;
        let mean = gaps.iter().sum::<f64>() / n;
        let variance = gaps.iter().map(|g| (g - mean).powi(2)).sum::<f64>() / n;
        self.interaction_gap_stddev = variance.sqrt();
    }
}

/// A price band's accumulated evidence, lifecycle state and motif table.
///
/// Identity fields (`id`, `price_center`, `price_band`, `side`,
/// `first_seen_ts`, `creation_reason`) never change after creation. The store
/// only hands out shared references, so all mutation goes through it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryNode {
    pub id: NodeId,
    pub price_center: f64,
    /// Half-width of the band
    pub price_band: f64,
    pub side: NodeSide,
    pub first_seen_ts: Timestamp,
    pub creation_reason: CreationReason,

    pub tier: Tier,
    pub strength: f64,
    pub confidence: f64,
    /// Current per-second decay rate, tier- and invalidation-adjusted
    pub decay_rate: f64,
    pub last_interaction_ts: Timestamp,
    pub last_decay_applied_ts: Timestamp,
    /// When observed price first moved beyond the invalidation distance
    pub invalidated_since: Option<Timestamp>,
    pub revival_count: u64,

    pub evidence: EvidenceCounters,
    pub level: LevelState,
    pub timing: InteractionTiming,
    pub motifs: MotifExtractor,
}

impl MemoryNode {
    /// Create an ACTIVE node centred on the event's price.
    pub(crate) fn new(
        id: NodeId,
        event: &EvidenceEvent,
        config: &MemoryConfig,
        active_rate: f64,
    ) -> Self {
        let price = event.price();
        let ts = event.timestamp();
        let (side, creation_reason) = match event {
            EvidenceEvent::Trade { .. } => (NodeSide::Both, CreationReason::TradeExecution),
            EvidenceEvent::Liquidation { .. } => {
                (NodeSide::Both, CreationReason::LiquidationProximity)
            }
            EvidenceEvent::OrderBook { side, .. } => (
                match side {
                    crate::evidence::BookSide::Bid => NodeSide::Bid,
                    crate::evidence::BookSide::Ask => NodeSide::Ask,
                },
                CreationReason::OrderBookPresence,
            ),
            EvidenceEvent::PriceTouch { .. } => (NodeSide::Both, CreationReason::PriceRejection),
        };

        Self {
            id,
            price_center: price,
            price_band: config.band.band_for(price),
            side,
            first_seen_ts: ts,
            creation_reason,
            tier: Tier::Active,
            strength: config.evidence.initial_strength,
            confidence: 0.0,
            decay_rate: active_rate,
            last_interaction_ts: ts,
            last_decay_applied_ts: ts,
            invalidated_since: None,
            revival_count: 0,
            evidence: EvidenceCounters::default(),
            level: LevelState::default(),
            timing: InteractionTiming::new(config.evidence.interaction_history),
            motifs: MotifExtractor::new(
                config.motif.buffer_capacity,
                config.motif.buffer_window_secs,
            ),
        }
    }

    pub fn band_low(&self) -> f64 {
        self.price_center - self.price_band
    }

    pub fn band_high(&self) -> f64 {
        self.price_center + self.price_band
    }

    /// Whether the closed band contains `price`.
    pub fn covers(&self, price: f64) -> bool {
        price >= self.band_low() && price <= self.band_high()
    }

    pub fn distance_to(&self, price: f64) -> f64 {
        (self.price_center - price).abs()
    }

    /// Whether the band intersects the closed interval `[low, high]`.
    pub fn intersects(&self, low: f64, high: f64) -> bool {
        self.band_low() <= high && self.band_high() >= low
    }

    pub fn idle_secs(&self, now: Timestamp) -> f64 {
        (now - self.last_interaction_ts).max(0.0)
    }

    /// Update counters and level state for `event` and return the tokens it
    /// produced, in order. Strength is left to the caller.
    ///
    /// `dwelling` means the previous price touch on the store was inside
    /// this node's band.
    pub(crate) fn absorb(
        &mut self,
        event: &EvidenceEvent,
        config: &EvidenceConfig,
        dwelling: bool,
    ) -> Vec<EvidenceToken> {
        let ts = event.timestamp();
        let mut tokens = Vec::with_capacity(2);
        let mut counted = true;

        match event {
            EvidenceEvent::Trade {
                quantity,
                is_buyer_initiated,
                ..
            } => {
                let high_volume = self.evidence.trade_execution_count
                    >= config.min_trades_for_volume_baseline
                    && self
                        .evidence
                        .mean_trade_size()
                        .map(|mean| *quantity >= config.high_volume_multiple * mean)
                        .unwrap_or(false);

                let ev = &mut self.evidence;
                ev.trade_execution_count += 1;
                ev.volume_total += quantity;
                if *is_buyer_initiated {
                    ev.buyer_initiated_volume += quantity;
                } else {
                    ev.seller_initiated_volume += quantity;
                }
                if self.level.resting_size > 0.0 {
                    ev.passive_fill_volume += quantity;
                } else {
                    ev.aggressive_fill_volume += quantity;
                }

                tokens.push(EvidenceToken::TradeExec);
                if high_volume {
                    tokens.push(EvidenceToken::TradeVolumeHigh);
                }
            }
            EvidenceEvent::Liquidation { quantity, side, .. } => {
                let in_cascade = self
                    .level
                    .last_liquidation_ts
                    .map(|prev| ts - prev <= config.cascade_window_secs)
                    .unwrap_or(false);
                self.level.current_cascade_size = if in_cascade {
                    self.level.current_cascade_size + 1
                } else {
                    1
                };
                self.level.last_liquidation_ts = Some(ts);

                let ev = &mut self.evidence;
                ev.liquidation_proximity_count += 1;
                ev.liquidations_within_band += 1;
                match side {
                    LiquidationSide::Long => ev.long_liquidations += 1,
                    LiquidationSide::Short => ev.short_liquidations += 1,
                }
                ev.volume_total += quantity;
                ev.max_liquidation_cascade_size = ev
                    .max_liquidation_cascade_size
                    .max(self.level.current_cascade_size);

                tokens.push(EvidenceToken::LiqOccur);
                if self.level.current_cascade_size >= 2 {
                    tokens.push(EvidenceToken::LiqCascade);
                }
            }
            EvidenceEvent::OrderBook { size, .. } => {
                let resting = self.level.resting_size > 0.0;
                match (resting, *size > 0.0) {
                    (false, true) => tokens.push(EvidenceToken::ObAppear),
                    (true, true) => tokens.push(EvidenceToken::ObPersist),
                    (true, false) => tokens.push(EvidenceToken::ObVanish),
                    (false, false) => {}
                }
                self.level.resting_size = *size;
                self.evidence.orderbook_appearance_count += 1;
            }
            EvidenceEvent::PriceTouch { .. } => {
                counted = false;
                self.evidence.price_touch_count += 1;
                self.level.last_touch_ts = Some(ts);
                tokens.push(if dwelling {
                    EvidenceToken::PriceDwell
                } else {
                    EvidenceToken::PriceTouch
                });
            }
        }

        if counted {
            self.evidence.interaction_count += 1;
            self.timing.record(ts);
        }
        self.last_interaction_ts = self.last_interaction_ts.max(ts);
        self.refresh_confidence(config);

        for token in &tokens {
            self.motifs.observe(*token, ts);
        }

        tokens
    }

    /// Append a token that is not tied to new evidence at this level.
    pub(crate) fn observe_token(&mut self, token: EvidenceToken, ts: Timestamp) {
        self.motifs.observe(token, ts);
    }

    /// Add `boost` to strength, capped at 1.0.
    pub(crate) fn reinforce(&mut self, boost: f64) {
        self.strength = (self.strength + boost).min(1.0);
    }

    /// Saturating evidence ratio `n / (n + k)`.
    fn refresh_confidence(&mut self, config: &EvidenceConfig) {
        let n = self.evidence.interaction_count as f64;
        self.confidence = n / (n + config.confidence_half_saturation);
    }

    /// Check the node-local invariants.
    pub fn check_invariants(&self) -> std::result::Result<(), String> {
        let ev = &self.evidence;

        let sum = ev.orderbook_appearance_count
            + ev.trade_execution_count
            + ev.liquidation_proximity_count;
        if ev.interaction_count != sum {
            return Err(format!(
                "interaction_count {} != orderbook {} + trades {} + liquidations {}",
                ev.interaction_count,
                ev.orderbook_appearance_count,
                ev.trade_execution_count,
                ev.liquidation_proximity_count
            ));
        }

        if ev.long_liquidations + ev.short_liquidations != ev.liquidations_within_band {
            return Err(format!(
                "long {} + short {} != liquidations_within_band {}",
                ev.long_liquidations, ev.short_liquidations, ev.liquidations_within_band
            ));
        }

        let slack = VOLUME_EPSILON * ev.volume_total.max(1.0);
        if ev.buyer_initiated_volume + ev.seller_initiated_volume > ev.volume_total + slack {
            return Err(format!(
                "buyer {} + seller {} volume exceeds total {}",
                ev.buyer_initiated_volume, ev.seller_initiated_volume, ev.volume_total
            ));
        }
        if ev.passive_fill_volume + ev.aggressive_fill_volume > ev.volume_total + slack {
            return Err(format!(
                "passive {} + aggressive {} volume exceeds total {}",
                ev.passive_fill_volume, ev.aggressive_fill_volume, ev.volume_total
            ));
        }

        if self.last_interaction_ts < self.first_seen_ts {
            return Err(format!(
                "last_interaction_ts {} precedes first_seen_ts {}",
                self.last_interaction_ts, self.first_seen_ts
            ));
        }

        for (name, value) in [("strength", self.strength), ("confidence", self.confidence)] {
            if !value.is_finite() || !(0.0..=1.0).contains(&value) {
                return Err(format!("{} {} outside [0, 1]", name, value));
            }
        }

        if !self.decay_rate.is_finite() || self.decay_rate < 0.0 {
            return Err(format!("decay_rate {} is not a valid rate", self.decay_rate));
        }

        self.motifs.table().check_bounds()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evidence::BookSide;

    fn node_at(event: &EvidenceEvent) -> MemoryNode {
        MemoryNode::new(NodeId(1), event, &MemoryConfig::default(), 1e-5)
    }

    #[test]
    fn test_new_node_identity() {
        let event = EvidenceEvent::liquidation(1000.0, "BTC", 100.0, 50.0, LiquidationSide::Long);
        let node = node_at(&event);

        assert_eq!(node.creation_reason, CreationReason::LiquidationProximity);
        assert_eq!(node.tier, Tier::Active);
        assert_eq!(node.first_seen_ts, 1000.0);
        assert!((node.price_band - 0.1).abs() < 1e-12);
        assert!(node.covers(100.05));
        assert!(!node.covers(100.2));
    }

    #[test]
    fn test_order_book_side_recorded() {
        let event = EvidenceEvent::order_book(1.0, "BTC", 100.0, 3.0, BookSide::Ask);
        let node = node_at(&event);
        assert_eq!(node.side, NodeSide::Ask);
        assert_eq!(node.creation_reason, CreationReason::OrderBookPresence);
    }

    #[test]
    fn test_trade_fills_and_volume_split() {
        let config = EvidenceConfig::default();
        let ob = EvidenceEvent::order_book(1.0, "BTC", 100.0, 5.0, BookSide::Bid);
        let mut node = node_at(&ob);
        node.absorb(&ob, &config, false);
        node.absorb(&EvidenceEvent::trade(2.0, "BTC", 100.0, 2.0, false), &config, false);

        let ev = &node.evidence;
        assert_eq!(ev.interaction_count, 2);
        assert_eq!(ev.seller_initiated_volume, 2.0);
        assert_eq!(ev.passive_fill_volume, 2.0);
        assert_eq!(ev.aggressive_fill_volume, 0.0);
        node.check_invariants().unwrap();
    }

    #[test]
    fn test_high_volume_token_needs_baseline() {
        let config = EvidenceConfig::default();
        let first = EvidenceEvent::trade(1.0, "BTC", 100.0, 100.0, true);
        let mut node = node_at(&first);

        // Large first trade: no baseline yet
        let tokens = node.absorb(&first, &config, false);
        assert_eq!(tokens, vec![EvidenceToken::TradeExec]);

        for i in 0..5 {
            node.absorb(&EvidenceEvent::trade(2.0 + i as f64, "BTC", 100.0, 1.0, true), &config, false);
        }
        // mean = 105 / 6 = 17.5, threshold = 52.5
        let tokens = node.absorb(&EvidenceEvent::trade(10.0, "BTC", 100.0, 60.0, true), &config, false);
        assert_eq!(tokens, vec![EvidenceToken::TradeExec, EvidenceToken::TradeVolumeHigh]);
    }

    #[test]
    fn test_liquidation_cascade() {
        let config = EvidenceConfig::default();
        let first = EvidenceEvent::liquidation(100.0, "BTC", 100.0, 1.0, LiquidationSide::Long);
        let mut node = node_at(&first);

        assert_eq!(node.absorb(&first, &config, false), vec![EvidenceToken::LiqOccur]);
        let second = EvidenceEvent::liquidation(105.0, "BTC", 100.0, 1.0, LiquidationSide::Short);
        assert_eq!(
            node.absorb(&second, &config, false),
            vec![EvidenceToken::LiqOccur, EvidenceToken::LiqCascade]
        );
        let third = EvidenceEvent::liquidation(108.0, "BTC", 100.0, 1.0, LiquidationSide::Long);
        node.absorb(&third, &config, false);
        let late = EvidenceEvent::liquidation(500.0, "BTC", 100.0, 1.0, LiquidationSide::Long);
        assert_eq!(node.absorb(&late, &config, false), vec![EvidenceToken::LiqOccur]);

        let ev = &node.evidence;
        assert_eq!(ev.max_liquidation_cascade_size, 3);
        assert_eq!(ev.long_liquidations, 3);
        assert_eq!(ev.short_liquidations, 1);
        assert_eq!(ev.liquidations_within_band, 4);
        node.check_invariants().unwrap();
    }

    #[test]
    fn test_order_book_tokens() {
        let config = EvidenceConfig::default();
        let appear = EvidenceEvent::order_book(1.0, "BTC", 100.0, 5.0, BookSide::Bid);
        let mut node = node_at(&appear);

        assert_eq!(node.absorb(&appear, &config, false), vec![EvidenceToken::ObAppear]);
        let persist = EvidenceEvent::order_book(2.0, "BTC", 100.0, 4.0, BookSide::Bid);
        assert_eq!(node.absorb(&persist, &config, false), vec![EvidenceToken::ObPersist]);
        let vanish = EvidenceEvent::order_book(3.0, "BTC", 100.0, 0.0, BookSide::Bid);
        assert_eq!(node.absorb(&vanish, &config, false), vec![EvidenceToken::ObVanish]);
        let empty = EvidenceEvent::order_book(4.0, "BTC", 100.0, 0.0, BookSide::Bid);
        assert!(node.absorb(&empty, &config, false).is_empty());

        assert_eq!(node.evidence.orderbook_appearance_count, 4);
        node.check_invariants().unwrap();
    }

    #[test]
    fn test_touch_does_not_count_as_interaction() {
        let config = EvidenceConfig::default();
        let touch = EvidenceEvent::price_touch(1.0, "BTC", 100.0);
        let mut node = node_at(&touch);

        assert_eq!(node.absorb(&touch, &config, false), vec![EvidenceToken::PriceTouch]);
        let again = EvidenceEvent::price_touch(2.0, "BTC", 100.0);
        assert_eq!(node.absorb(&again, &config, true), vec![EvidenceToken::PriceDwell]);

        assert_eq!(node.evidence.interaction_count, 0);
        assert_eq!(node.evidence.price_touch_count, 2);
        assert_eq!(node.last_interaction_ts, 2.0);
        node.check_invariants().unwrap();
    }

    #[test]
    fn test_interaction_timing() {
        let mut timing = InteractionTiming::new(4);
        for ts in [0.0, 10.0, 20.0, 40.0, 80.0] {
            timing.record(ts);
        }
        // Kept: 10, 20, 40, 80 -> gaps 10, 20, 40
        assert_eq!(timing.len(), 4);
        assert_eq!(timing.interaction_gap_median, 20.0);
        let mean = 70.0 / 3.0;
        let var = ((10.0 - mean) * (10.0 - mean)
            + (20.0 - mean) * (20.0 - mean)
            + (40.0 - mean) * (40.0 - mean))
            / 3.0;
        assert!((timing.interaction_gap_stddev - f64::sqrt(var)).abs() < 1e-9);
    }

    #[test]
    fn test_confidence_saturates() {
        let config = EvidenceConfig::default();
        let first = EvidenceEvent::trade(1.0, "BTC", 100.0, 1.0, true);
        let mut node = node_at(&first);
        for i in 0..5 {
            node.absorb(&EvidenceEvent::trade(1.0 + i as f64, "BTC", 100.0, 1.0, true), &config, false);
        }
        assert!((node.confidence - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_invariant_detection() {
        let event = EvidenceEvent::trade(1.0, "BTC", 100.0, 1.0, true);
        let mut node = node_at(&event);
        node.evidence.interaction_count = 3;
        assert!(node.check_invariants().is_err());

        let mut node = node_at(&event);
        node.strength = 1.5;
        assert!(node.check_invariants().is_err());

        let mut node = node_at(&event);
        node.evidence.long_liquidations = 1;
        assert!(node.check_invariants().is_err());
    }
}
