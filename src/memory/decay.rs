//! Time-driven decay, tiering and revival rules.
//!
//! The engine is a pure function of configuration, elapsed time and tier.
//! It is only ever invoked from [`MemoryStore::decay_nodes`] and from the
//! revival path of ingestion, never as a side effect of ordinary evidence.
//!
//! [`MemoryStore::decay_nodes`]: super::MemoryStore::decay_nodes

use serde::{Deserialize, Serialize};

use super::node::MemoryNode;
use super::types::{Tier, TierTransition, Timestamp, TransitionCause};
use crate::config::{
    DecayConfig, DORMANT_RATE_DIVISOR, INVALIDATION_BAND_MULTIPLE, INVALIDATION_RATE_MULTIPLIER,
};

/// What a decay pass did to one node.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum DecayOutcome {
    /// Archived, or `current_ts` not after the node's last decay
    Skipped,
    /// Strength multiplied by `factor` at `rate`
    Applied { factor: f64, rate: f64 },
}

/// Summary of one `decay_nodes` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecayReport {
    pub current_ts: Timestamp,
    pub decayed: usize,
    pub skipped: usize,
    pub transitions: Vec<TierTransition>,
    /// Nodes whose decay was rolled back after a failed consistency check
    pub rolled_back: usize,
}

impl DecayReport {
    pub(crate) fn new(current_ts: Timestamp) -> Self {
        Self {
            current_ts,
            decayed: 0,
            skipped: 0,
            transitions: Vec::new(),
            rolled_back: 0,
        }
    }
}

/// Decay and archival rules.
#[derive(Debug, Clone)]
pub struct DecayEngine {
    config: DecayConfig,
}

impl DecayEngine {
    pub fn new(config: DecayConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &DecayConfig {
        &self.config
    }

    /// Base rate for a tier: `r`, `r / 10`, or `0`.
    pub fn tier_rate(&self, tier: Tier) -> f64 {
        match tier {
            Tier::Active => self.config.base_decay_rate,
            Tier::Dormant => self.config.base_decay_rate / DORMANT_RATE_DIVISOR,
            Tier::Archived => 0.0,
        }
    }

    /// Whether the node has sat beyond the invalidation distance for the full window.
    pub fn is_accelerated(&self, node: &MemoryNode, current_ts: Timestamp) -> bool {
        node.invalidated_since
            .map(|since| current_ts - since >= self.config.invalidation_window_secs)
            .unwrap_or(false)
    }

    /// Tier rate, multiplied while the node is invalidated.
    pub fn effective_rate(&self, node: &MemoryNode, current_ts: Timestamp) -> f64 {
        let rate = self.tier_rate(node.tier);
        if self.is_accelerated(node, current_ts) {
            rate * INVALIDATION_RATE_MULTIPLIER
        } else {
            rate
        }
    }

    /// `max(0, 1 - rate * elapsed)`.
    pub fn decay_factor(rate: f64, elapsed_secs: f64) -> f64 {
        (1.0 - rate * elapsed_secs).max(0.0)
    }

    /// Whether `price` is far enough from the node to count against it.
    pub fn is_beyond_invalidation(node: &MemoryNode, price: f64) -> bool {
        node.distance_to(price) > INVALIDATION_BAND_MULTIPLE * node.price_band
    }

    /// Seconds of `(from, to]` spent past the invalidation window.
    fn accelerated_secs(&self, node: &MemoryNode, from: Timestamp, to: Timestamp) -> f64 {
        node.invalidated_since
            .map(|since| since + self.config.invalidation_window_secs)
            .map(|start| (to - start.max(from)).max(0.0))
            .unwrap_or(0.0)
    }

    /// Decay the node's strength and motifs up to `current_ts`.
    ///
    /// The interval is split where acceleration begins: the part before it
    /// decays at the tier rate and the rest at the accelerated rate, giving
    /// `max(0, 1 - r * t1) * max(0, 1 - 10r * t2)`.
    ///
    /// Idempotent for a repeated `current_ts`: the elapsed time is measured
    /// from `last_decay_applied_ts`, which this call advances.
    pub fn apply(&self, node: &mut MemoryNode, current_ts: Timestamp) -> DecayOutcome {
        if node.tier.is_frozen() {
            return DecayOutcome::Skipped;
        }

        let elapsed = current_ts - node.last_decay_applied_ts;
        if elapsed <= 0.0 {
            return DecayOutcome::Skipped;
        }

        let base = self.tier_rate(node.tier);
        let accelerated = self.accelerated_secs(node, node.last_decay_applied_ts, current_ts);
        let factor = Self::decay_factor(base, elapsed - accelerated)
            * Self::decay_factor(base * INVALIDATION_RATE_MULTIPLIER, accelerated);
        let rate = self.effective_rate(node, current_ts);

        node.decay_rate = rate;
        node.strength = (node.strength * factor).clamp(0.0, 1.0);
        node.motifs.apply_decay(factor);
        node.last_decay_applied_ts = current_ts;

        DecayOutcome::Applied { factor, rate }
    }

    /// The tier the node should move to at `current_ts`, if any. At most one step.
    pub fn next_tier(
        &self,
        node: &MemoryNode,
        current_ts: Timestamp,
    ) -> Option<(Tier, TransitionCause)> {
        let idle = node.idle_secs(current_ts);
        let (threshold, timeout) = match node.tier {
            Tier::Active => (self.config.dormant_threshold, self.config.dormant_timeout_secs),
            Tier::Dormant => (self.config.archive_threshold, self.config.archive_timeout_secs),
            Tier::Archived => return None,
        };
        let target = node.tier.next()?;

        if node.strength < threshold {
            Some((target, TransitionCause::StrengthBelowThreshold))
        } else if idle > timeout {
            Some((target, TransitionCause::IdleTimeout))
        } else {
            None
        }
    }

    /// Move the node into `tier`, switching node and motif decay rate together.
    pub fn enter_tier(&self, node: &mut MemoryNode, tier: Tier, current_ts: Timestamp) {
        node.tier = tier;
        node.decay_rate = self.effective_rate(node, current_ts);
    }

    /// Strength after revival: `min(1, decayed + revival_boost)`.
    ///
    /// Strictly greater than `decayed` whenever `decayed < 1`.
    pub fn revival_strength(&self, decayed: f64) -> f64 {
        (decayed + self.config.revival_boost).min(1.0)
    }
}
