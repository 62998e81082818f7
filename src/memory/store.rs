//! In-memory, per-symbol store of price-level memory nodes.

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, VecDeque};
use tracing::{debug, error, info, instrument, warn};

use super::decay::{DecayEngine, DecayOutcome, DecayReport};
use super::node::MemoryNode;
use super::pending::{PendingLevel, PendingLevels, PendingObservation};
use super::spatial;
use super::types::{
    CreationReason, NodeId, NodeOrder, Tier, TierTransition, Timestamp, TransitionCause,
    ViolationRecord,
};
use crate::config::MemoryConfig;
use crate::error::{Error, Result};
use crate::evidence::{EvidenceEvent, EvidenceToken};
use crate::query::MemoryQuery;

/// The most recent price touch seen by the store.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TouchState {
    /// `None` when the touch landed on a candidate level
    pub node_id: Option<NodeId>,
    pub price: f64,
}

/// Running totals kept by the store.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreCounters {
    pub events_accepted: u64,
    pub events_rejected: u64,
    pub nodes_created: u64,
    pub revivals: u64,
    pub transitions: u64,
    pub invariant_violations: u64,
}

/// Memory store for a single symbol.
///
/// Nodes live in exactly one of three tier collections and move between
/// them by value. All time comes from the caller: event timestamps drive
/// ingestion and `decay_nodes` takes the current time explicitly.
#[derive(Debug, Clone)]
pub struct MemoryStore {
    symbol: String,
    config: MemoryConfig,
    engine: DecayEngine,

    active: BTreeMap<NodeId, MemoryNode>,
    dormant: BTreeMap<NodeId, MemoryNode>,
    archived: BTreeMap<NodeId, MemoryNode>,

    next_id: u64,
    last_event_ts: Option<Timestamp>,
    last_decay_ts: Option<Timestamp>,
    last_touch: Option<TouchState>,
    pending: PendingLevels,

    counters: StoreCounters,
    transitions: VecDeque<TierTransition>,
    violations: VecDeque<ViolationRecord>,
}

impl MemoryStore {
    /// Create an empty store for `symbol`.
    pub fn new(symbol: impl Into<String>, config: MemoryConfig) -> Result<Self> {
        let symbol = symbol.into();
        if symbol.trim().is_empty() {
            return Err(Error::config("symbol must not be empty"));
        }
        config.validate()?;

        Ok(Self {
            symbol,
            engine: DecayEngine::new(config.decay.clone()),
            config,
            active: BTreeMap::new(),
            dormant: BTreeMap::new(),
            archived: BTreeMap::new(),
            next_id: 1,
            last_event_ts: None,
            last_decay_ts: None,
            last_touch: None,
            pending: PendingLevels::default(),
            counters: StoreCounters::default(),
            transitions: VecDeque::new(),
            violations: VecDeque::new(),
        })
    }

    /// Rebuild a store from a snapshot taken with the same configuration.
    pub fn from_snapshot(snapshot: MemorySnapshot, config: MemoryConfig) -> Result<Self> {
        let mut store = Self::new(snapshot.symbol, config)?;

        let tiers = [
            (Tier::Active, snapshot.active),
            (Tier::Dormant, snapshot.dormant),
            (Tier::Archived, snapshot.archived),
        ];
        for (tier, nodes) in tiers {
            for node in nodes {
                if node.tier != tier {
                    return Err(Error::invariant_violation(
                        node.id,
                        format!("node in {} collection has tier {}", tier, node.tier),
                    ));
                }
                if node.id.0 >= snapshot.next_id {
                    return Err(Error::invariant_violation(
                        node.id,
                        format!("id not below next_id {}", snapshot.next_id),
                    ));
                }
                if store.contains(node.id) {
                    return Err(Error::invariant_violation(node.id, "duplicate node id"));
                }
                node.check_invariants()
                    .map_err(|message| Error::invariant_violation(node.id, message))?;
                store.place_node(node);
            }
        }

        store.next_id = snapshot.next_id;
        store.last_event_ts = snapshot.last_event_ts;
        store.last_decay_ts = snapshot.last_decay_ts;
        store.last_touch = snapshot.last_touch;
        store.pending = snapshot.pending;
        store.counters = snapshot.counters;
        store.transitions = snapshot.transitions;
        store.violations = snapshot.violations;
        store.trim_logs();
        Ok(store)
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    pub fn engine(&self) -> &DecayEngine {
        &self.engine
    }

    // ==================== Ingestion ====================

    /// Apply one evidence event and return the id of the node it was
    /// associated with.
    ///
    /// `Ok(None)` means the event was accepted at an uncovered level that
    /// has not yet seen enough book presence or price rejection to become a
    /// node. Rejected events leave the store untouched apart from the
    /// rejection counter.
    #[instrument(skip(self, event), fields(symbol = %self.symbol, kind = %event.kind()))]
    pub fn ingest(&mut self, event: &EvidenceEvent) -> Result<Option<NodeId>> {
        if let Err(err) = self.check_event(event) {
            self.counters.events_rejected += 1;
            warn!("Rejected event: {}", err);
            return Err(err);
        }

        let price = event.price();
        let outcome = match self.locate_match(price) {
            Some(id) => self.apply_to_existing(id, event).map(Some),
            None => self.place_uncovered(event),
        };

        let node_id = match outcome {
            Ok(id) => id,
            Err(err) => {
                self.counters.events_rejected += 1;
                return Err(err);
            }
        };

        self.pending
            .expire(event.timestamp(), self.config.evidence.qualification_window_secs);
        self.observe_price(event, node_id);
        self.last_event_ts = Some(event.timestamp());
        self.counters.events_accepted += 1;
        Ok(node_id)
    }

    fn check_event(&self, event: &EvidenceEvent) -> Result<()> {
        event.validate()?;

        if event.symbol() != self.symbol {
            return Err(Error::invalid_event(format!(
                "event for symbol {} sent to store for {}",
                event.symbol(),
                self.symbol
            )));
        }

        if let Some(last) = self.last_event_ts {
            if event.timestamp() < last {
                return Err(Error::invalid_event(format!(
                    "non-monotonic timestamp {} after {}",
                    event.timestamp(),
                    last
                )));
            }
        }

        Ok(())
    }

    /// ACTIVE and DORMANT nodes first; ARCHIVED only when nothing else covers the price.
    fn locate_match(&self, price: f64) -> Option<NodeId> {
        spatial::match_node(price, self.active.values().chain(self.dormant.values()))
            .or_else(|| spatial::match_node(price, self.archived.values()))
    }

    fn apply_to_existing(&mut self, id: NodeId, event: &EvidenceEvent) -> Result<NodeId> {
        let ts = event.timestamp();
        let original = self.take_node(id, ts, "ingest")?;
        let mut node = original.clone();

        let dwelling = matches!(event, EvidenceEvent::PriceTouch { .. })
            && self.last_touch.map_or(false, |touch| touch.node_id == Some(id));

        let from = node.tier;
        let decayed = node.strength;
        let revived = from != Tier::Active;

        if revived {
            node.strength = self.engine.revival_strength(decayed);
            node.last_decay_applied_ts = node.last_decay_applied_ts.max(ts);
            node.revival_count += 1;
            self.engine.enter_tier(&mut node, Tier::Active, ts);
        } else {
            node.reinforce(self.config.evidence.evidence_boost);
        }
        let tokens = node.absorb(event, &self.config.evidence, dwelling);

        let check = node.check_invariants().and_then(|()| {
            if revived && decayed < 1.0 && node.strength <= decayed {
                Err(format!(
                    "revival strength {} not above decayed strength {}",
                    node.strength, decayed
                ))
            } else {
                Ok(())
            }
        });
        let strength = node.strength;
        self.commit(original, node, check, ts, "ingest")?;

        if revived {
            info!(
                node_id = %id,
                from = %from,
                decayed,
                strength,
                "Revived node on new evidence"
            );
            self.counters.revivals += 1;
            self.log_transition(TierTransition {
                node_id: id,
                from,
                to: Tier::Active,
                timestamp: ts,
                cause: TransitionCause::Revival,
                strength,
            });
        } else {
            debug!(node_id = %id, ?tokens, strength, "Updated node");
        }

        Ok(id)
    }

    /// Trades and liquidations create a node at once. Book presence and
    /// price touches wait as a candidate level until they repeat.
    fn place_uncovered(&mut self, event: &EvidenceEvent) -> Result<Option<NodeId>> {
        let price = event.price();
        let ts = event.timestamp();
        let window = self.config.evidence.qualification_window_secs;

        let reason = match event {
            EvidenceEvent::Trade { .. } | EvidenceEvent::Liquidation { .. } => {
                return self.create_node(event, &[]).map(Some);
            }
            EvidenceEvent::OrderBook { size, .. } if *size == 0.0 => {
                if self.pending.withdraw(price, ts, window) {
                    debug!(price, "Book presence withdrawn before qualifying");
                    return Ok(None);
                }
                return Err(Error::invalid_event(format!(
                    "order-book removal at {} where no node exists",
                    price
                )));
            }
            EvidenceEvent::OrderBook { .. } => CreationReason::OrderBookPresence,
            EvidenceEvent::PriceTouch { .. } => CreationReason::PriceRejection,
        };

        let previous_touch = match event {
            EvidenceEvent::PriceTouch { .. } => self
                .last_touch
                .filter(|touch| touch.node_id.is_none())
                .map(|touch| touch.price),
            _ => None,
        };
        let band = self.config.band.band_for(price);
        let qualified = self.pending.observe(
            event,
            reason,
            band,
            previous_touch,
            &self.config.evidence,
        );

        match qualified {
            Some(level) => self.promote(level).map(Some),
            None => {
                debug!(price, reason = %reason, "Observed candidate level");
                Ok(None)
            }
        }
    }

    fn promote(&mut self, level: PendingLevel) -> Result<NodeId> {
        match level.observations.split_first() {
            Some((first, rest)) => self.create_node(&first.event, rest),
            None => Err(Error::Internal(format!(
                "candidate level at {} has no observations",
                level.price
            ))),
        }
    }

    /// Create a node from `event`, then fold in any later observations
    /// buffered at the same level.
    fn create_node(&mut self, event: &EvidenceEvent, rest: &[PendingObservation]) -> Result<NodeId> {
        let id = NodeId(self.next_id);
        let mut node = MemoryNode::new(id, event, &self.config, self.engine.tier_rate(Tier::Active));
        let mut tokens = node.absorb(event, &self.config.evidence, false);
        for observation in rest {
            node.reinforce(self.config.evidence.evidence_boost);
            tokens.extend(node.absorb(&observation.event, &self.config.evidence, observation.dwelling));
        }

        if let Err(message) = node.check_invariants() {
            self.record_violation(id, event.timestamp(), "create", &message);
            return Err(Error::invariant_violation(id, message));
        }

        debug!(
            node_id = %id,
            price = node.price_center,
            band = node.price_band,
            reason = %node.creation_reason,
            ?tokens,
            "Created node"
        );
        self.next_id += 1;
        self.counters.nodes_created += 1;
        self.pending.discard_covered(&node);
        self.active.insert(id, node);
        Ok(id)
    }

    /// Track invalidation distance on live nodes and emit `PRICE_EXIT` when a
    /// touch leaves the previously touched band.
    ///
    /// Both only touch level metadata and the token buffer of the other
    /// node. Its counters, strength and tier are left alone.
    fn observe_price(&mut self, event: &EvidenceEvent, matched: Option<NodeId>) {
        let price = event.price();
        let ts = event.timestamp();

        for node in self.active.values_mut().chain(self.dormant.values_mut()) {
            if DecayEngine::is_beyond_invalidation(node, price) {
                if node.invalidated_since.is_none() {
                    node.invalidated_since = Some(ts);
                }
            } else {
                node.invalidated_since = None;
            }
        }

        if !matches!(event, EvidenceEvent::PriceTouch { .. }) {
            return;
        }

        if let Some(previous) = self.last_touch.and_then(|touch| touch.node_id) {
            if Some(previous) != matched {
                let left = self
                    .active
                    .get_mut(&previous)
                    .or_else(|| self.dormant.get_mut(&previous));
                if let Some(node) = left {
                    if !node.covers(price) {
                        node.observe_token(EvidenceToken::PriceExit, ts);
                    }
                }
            }
        }
        self.last_touch = Some(TouchState {
            node_id: matched,
            price,
        });
    }

    // ==================== Decay ====================

    /// Decay every ACTIVE and DORMANT node up to `current_ts` and apply at
    /// most one tier transition per node.
    ///
    /// A repeated call with the same `current_ts` changes nothing. Nodes
    /// never return to ACTIVE here.
    #[instrument(skip(self), fields(symbol = %self.symbol))]
    pub fn decay_nodes(&mut self, current_ts: Timestamp) -> Result<DecayReport> {
        if !current_ts.is_finite() || current_ts < 0.0 {
            return Err(Error::invalid_event(format!(
                "decay timestamp {} is not a finite non-negative number",
                current_ts
            )));
        }

        let mut report = DecayReport::new(current_ts);
        let ids: Vec<NodeId> = self
            .active
            .keys()
            .chain(self.dormant.keys())
            .copied()
            .collect();

        for id in ids {
            let original = match self.take_node(id, current_ts, "decay") {
                Ok(node) => node,
                Err(_) => {
                    report.rolled_back += 1;
                    continue;
                }
            };
            let mut node = original.clone();

            if self.engine.apply(&mut node, current_ts) == DecayOutcome::Skipped {
                report.skipped += 1;
                self.place_node(original);
                continue;
            }
            report.decayed += 1;

            let from = node.tier;
            let transition = self.engine.next_tier(&node, current_ts).map(|(to, cause)| {
                self.engine.enter_tier(&mut node, to, current_ts);
                TierTransition {
                    node_id: id,
                    from,
                    to,
                    timestamp: current_ts,
                    cause,
                    strength: node.strength,
                }
            });

            let check = node.check_invariants();
            match self.commit(original, node, check, current_ts, "decay") {
                Ok(()) => {
                    if let Some(transition) = transition {
                        debug!(
                            node_id = %id,
                            from = %transition.from,
                            to = %transition.to,
                            cause = ?transition.cause,
                            strength = transition.strength,
                            "Tier transition"
                        );
                        self.log_transition(transition.clone());
                        report.transitions.push(transition);
                    }
                }
                Err(_) => report.rolled_back += 1,
            }
        }

        self.last_decay_ts = Some(self.last_decay_ts.map_or(current_ts, |t| t.max(current_ts)));
        debug!(
            decayed = report.decayed,
            skipped = report.skipped,
            transitions = report.transitions.len(),
            "Decay pass complete"
        );
        Ok(report)
    }

    // ==================== Mutation plumbing ====================

    /// Remove a node from its tier collection for mutation.
    ///
    /// A node present in more than one collection is left where it is and
    /// the mutation fails.
    fn take_node(&mut self, id: NodeId, ts: Timestamp, operation: &str) -> Result<MemoryNode> {
        let holders = [
            self.active.contains_key(&id),
            self.dormant.contains_key(&id),
            self.archived.contains_key(&id),
        ]
        .iter()
        .filter(|held| **held)
        .count();

        if holders > 1 {
            let message = format!("present in {} tier collections", holders);
            self.record_violation(id, ts, operation, &message);
            return Err(Error::invariant_violation(id, message));
        }

        self.active
            .remove(&id)
            .or_else(|| self.dormant.remove(&id))
            .or_else(|| self.archived.remove(&id))
            .ok_or(Error::UnknownNode(id))
    }

    fn place_node(&mut self, node: MemoryNode) {
        let map = match node.tier {
            Tier::Active => &mut self.active,
            Tier::Dormant => &mut self.dormant,
            Tier::Archived => &mut self.archived,
        };
        map.insert(node.id, node);
    }

    /// Keep `updated` if it passed its checks, otherwise restore `original`.
    fn commit(
        &mut self,
        original: MemoryNode,
        updated: MemoryNode,
        check: std::result::Result<(), String>,
        ts: Timestamp,
        operation: &str,
    ) -> Result<()> {
        match check {
            Ok(()) => {
                self.place_node(updated);
                Ok(())
            }
            Err(message) => {
                let id = original.id;
                self.place_node(original);
                self.record_violation(id, ts, operation, &message);
                Err(Error::invariant_violation(id, message))
            }
        }
    }

    fn record_violation(&mut self, node_id: NodeId, ts: Timestamp, operation: &str, message: &str) {
        error!(
            node_id = %node_id,
            operation,
            message,
            "Invariant violation, mutation rolled back"
        );
        self.counters.invariant_violations += 1;
        self.violations.push_back(ViolationRecord {
            node_id,
            timestamp: ts,
            operation: operation.to_string(),
            message: message.to_string(),
        });
        self.trim_logs();
    }

    fn log_transition(&mut self, transition: TierTransition) {
        self.counters.transitions += 1;
        self.transitions.push_back(transition);
        self.trim_logs();
    }

    /// Keep only the newest entries of each log.
    fn trim_logs(&mut self) {
        let audit = &self.config.audit;
        while self.transitions.len() > audit.transition_log_capacity {
            self.transitions.pop_front();
        }
        while self.violations.len() > audit.violation_log_capacity {
            self.violations.pop_front();
        }
    }

    // ==================== Lookups ====================

    /// ACTIVE nodes whose band intersects `[price - radius, price + radius]`.
    pub fn get_active_nodes(
        &self,
        price: f64,
        radius: f64,
        order: NodeOrder,
    ) -> Result<Vec<&MemoryNode>> {
        Self::nodes_near(self.active.values(), price, radius, order)
    }

    /// DORMANT nodes whose band intersects `[price - radius, price + radius]`.
    pub fn get_dormant_nodes(
        &self,
        price: f64,
        radius: f64,
        order: NodeOrder,
    ) -> Result<Vec<&MemoryNode>> {
        Self::nodes_near(self.dormant.values(), price, radius, order)
    }

    fn nodes_near<'a>(
        nodes: impl Iterator<Item = &'a MemoryNode>,
        price: f64,
        radius: f64,
        order: NodeOrder,
    ) -> Result<Vec<&'a MemoryNode>> {
        if !price.is_finite() || price <= 0.0 {
            return Err(Error::invalid_query(format!("price {} must be positive", price)));
        }
        if !radius.is_finite() || radius < 0.0 {
            return Err(Error::invalid_query(format!(
                "radius {} must be finite and non-negative",
                radius
            )));
        }

        let mut hits = spatial::within_radius(price, radius, nodes);
        sort_nodes(&mut hits, price, order);
        Ok(hits)
    }

    /// A node by id, whatever its tier.
    pub fn get_node(&self, id: NodeId) -> Result<&MemoryNode> {
        self.active
            .get(&id)
            .or_else(|| self.dormant.get(&id))
            .or_else(|| self.archived.get(&id))
            .ok_or(Error::UnknownNode(id))
    }

    pub fn contains(&self, id: NodeId) -> bool {
        self.active.contains_key(&id)
            || self.dormant.contains_key(&id)
            || self.archived.contains_key(&id)
    }

    pub fn tier_of(&self, id: NodeId) -> Result<Tier> {
        self.get_node(id).map(|node| node.tier)
    }

    /// All nodes of one tier, by id.
    pub fn nodes(&self, tier: Tier) -> impl Iterator<Item = &MemoryNode> {
        match tier {
            Tier::Active => self.active.values(),
            Tier::Dormant => self.dormant.values(),
            Tier::Archived => self.archived.values(),
        }
    }

    /// Every node in the store, ACTIVE then DORMANT then ARCHIVED.
    pub fn all_nodes(&self) -> impl Iterator<Item = &MemoryNode> {
        self.active
            .values()
            .chain(self.dormant.values())
            .chain(self.archived.values())
    }

    pub fn len(&self) -> usize {
        self.active.len() + self.dormant.len() + self.archived.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn last_event_ts(&self) -> Option<Timestamp> {
        self.last_event_ts
    }

    pub fn last_decay_ts(&self) -> Option<Timestamp> {
        self.last_decay_ts
    }

    pub fn counters(&self) -> &StoreCounters {
        &self.counters
    }

    /// The most recent tier changes, oldest first, revivals included.
    /// Bounded by `audit.transition_log_capacity`.
    pub fn transitions(&self) -> &VecDeque<TierTransition> {
        &self.transitions
    }

    /// Take the transition log, leaving it empty. The running total in
    /// [`StoreCounters`] is kept.
    pub fn drain_transitions(&mut self) -> Vec<TierTransition> {
        self.transitions.drain(..).collect()
    }

    /// The most recent rolled-back mutations, oldest first.
    pub fn violations(&self) -> &VecDeque<ViolationRecord> {
        &self.violations
    }

    /// Uncovered levels still waiting to qualify for a node.
    pub fn pending_levels(&self) -> &PendingLevels {
        &self.pending
    }

    pub fn query(&self) -> MemoryQuery<'_> {
        MemoryQuery::new(self)
    }

    // ==================== Metrics & Snapshots ====================

    /// Aggregate counts and strength/confidence statistics.
    pub fn get_metrics(&self) -> MemoryMetrics {
        let mut mean_strength_by_tier = BTreeMap::new();
        for tier in [Tier::Active, Tier::Dormant, Tier::Archived] {
            if let Some(stats) = AggregateStats::from_values(self.nodes(tier).map(|n| n.strength)) {
                mean_strength_by_tier.insert(tier, stats.mean);
            }
        }

        MemoryMetrics {
            symbol: self.symbol.clone(),
            active_nodes: self.active.len(),
            dormant_nodes: self.dormant.len(),
            archived_nodes: self.archived.len(),
            total_nodes: self.len(),
            strength: AggregateStats::from_values(self.all_nodes().map(|n| n.strength)),
            confidence: AggregateStats::from_values(self.all_nodes().map(|n| n.confidence)),
            mean_strength_by_tier,
            total_motifs: self.all_nodes().map(|n| n.motifs.table().len()).sum(),
            events_accepted: self.counters.events_accepted,
            events_rejected: self.counters.events_rejected,
            nodes_created: self.counters.nodes_created,
            revivals: self.counters.revivals,
            transitions: self.counters.transitions,
            pending_levels: self.pending.len(),
            invariant_violations: self.counters.invariant_violations,
            last_event_ts: self.last_event_ts,
            last_decay_ts: self.last_decay_ts,
        }
    }

    /// Full serializable state, nodes ordered by id within each tier.
    pub fn snapshot(&self) -> MemorySnapshot {
        MemorySnapshot {
            symbol: self.symbol.clone(),
            next_id: self.next_id,
            last_event_ts: self.last_event_ts,
            last_decay_ts: self.last_decay_ts,
            last_touch: self.last_touch,
            pending: self.pending.clone(),
            active: self.active.values().cloned().collect(),
            dormant: self.dormant.values().cloned().collect(),
            archived: self.archived.values().cloned().collect(),
            counters: self.counters.clone(),
            transitions: self.transitions.clone(),
            violations: self.violations.clone(),
        }
    }

    /// SHA-256 of the JSON snapshot, hex encoded.
    pub fn state_digest(&self) -> Result<String> {
        let bytes = serde_json::to_vec(&self.snapshot())?;
        let hash = Sha256::digest(&bytes);
        Ok(format!("{:x}", hash))
    }
}

fn sort_nodes(nodes: &mut [&MemoryNode], price: f64, order: NodeOrder) {
    match order {
        NodeOrder::PriceDistance => nodes.sort_by(|a, b| {
            a.distance_to(price)
                .total_cmp(&b.distance_to(price))
                .then(a.id.cmp(&b.id))
        }),
        NodeOrder::Strength => nodes.sort_by(|a, b| {
            b.strength
                .total_cmp(&a.strength)
                .then(a.id.cmp(&b.id))
        }),
    }
}

/// Min, max and mean over a set of values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AggregateStats {
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub mean: f64,
}

impl AggregateStats {
    /// `None` for an empty input.
    pub fn from_values(values: impl Iterator<Item = f64>) -> Option<Self> {
        let mut count = 0usize;
        let mut sum = 0.0;
        let mut min = f64::INFINITY;
        let mut max = f64::NEG_INFINITY;
        for v in values {
            count += 1;
            sum += v;
            min = min.min(v);
            max = max.max(v);
        }
        (count > 0).then(|| Self {
            count,
            min,
            max,
            mean: sum / count as f64,
        })
    }
}

/// Store-wide metrics.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemoryMetrics {
    pub symbol: String,
    pub active_nodes: usize,
    pub dormant_nodes: usize,
    pub archived_nodes: usize,
    pub total_nodes: usize,
    /// Over all tiers; `None` while the store is empty
    pub strength: Option<AggregateStats>,
    pub confidence: Option<AggregateStats>,
    pub mean_strength_by_tier: BTreeMap<Tier, f64>,
    pub total_motifs: usize,
    pub events_accepted: u64,
    pub events_rejected: u64,
    pub nodes_created: u64,
    pub revivals: u64,
    /// Every transition since creation, including those no longer logged
    pub transitions: u64,
    pub pending_levels: usize,
    pub invariant_violations: u64,
    pub last_event_ts: Option<Timestamp>,
    pub last_decay_ts: Option<Timestamp>,
}

/// Serializable store state. Two stores fed the same events and decay
/// calls produce byte-identical snapshots.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MemorySnapshot {
    pub symbol: String,
    pub next_id: u64,
    pub last_event_ts: Option<Timestamp>,
    pub last_decay_ts: Option<Timestamp>,
    pub last_touch: Option<TouchState>,
    #[serde(default)]
    pub pending: PendingLevels,
    pub active: Vec<MemoryNode>,
    pub dormant: Vec<MemoryNode>,
    pub archived: Vec<MemoryNode>,
    pub counters: StoreCounters,
    pub transitions: VecDeque<TierTransition>,
    pub violations: VecDeque<ViolationRecord>,
}

impl MemorySnapshot {
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(self)?)
    }

    pub fn from_json(json: &str) -> Result<Self> {
        Ok(serde_json::from_str(json)?)
    }
}
