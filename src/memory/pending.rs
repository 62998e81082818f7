//! Candidate levels that have not yet earned a node.
//!
//! Trades and liquidations create a node on first sight. Book presence and
//! price rejection must repeat at an uncovered level within the
//! qualification window first; until then the observations wait here.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;

use super::node::MemoryNode;
use super::types::{CreationReason, Timestamp};
use crate::config::EvidenceConfig;
use crate::evidence::EvidenceEvent;

/// One buffered event at a candidate level.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingObservation {
    pub event: EvidenceEvent,
    /// The previous price touch on the store was at this level
    pub dwelling: bool,
}

/// An uncovered price that has been seen but has not qualified yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingLevel {
    pub price: f64,
    pub price_band: f64,
    pub reason: CreationReason,
    pub first_ts: Timestamp,
    pub observations: Vec<PendingObservation>,
}

impl PendingLevel {
    fn new(event: &EvidenceEvent, reason: CreationReason, price_band: f64) -> Self {
        Self {
            price: event.price(),
            price_band,
            reason,
            first_ts: event.timestamp(),
            observations: vec![PendingObservation {
                event: event.clone(),
                dwelling: false,
            }],
        }
    }

    pub fn covers(&self, price: f64) -> bool {
        (price - self.price).abs() <= self.price_band
    }

    fn is_fresh(&self, now: Timestamp, window: f64) -> bool {
        now - self.first_ts <= window
    }
}

/// Candidate levels in the order they were first seen.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PendingLevels {
    levels: VecDeque<PendingLevel>,
}

impl PendingLevels {
    pub fn len(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &PendingLevel> {
        self.levels.iter()
    }

    /// Nearest fresh level of `reason` covering `price`; ties go to the older.
    fn nearest(&self, price: f64, reason: CreationReason, now: Timestamp, window: f64) -> Option<usize> {
        self.levels
            .iter()
            .enumerate()
            .filter(|(_, level)| {
                level.reason == reason && level.covers(price) && level.is_fresh(now, window)
            })
            .min_by(|(ia, a), (ib, b)| {
                (a.price - price)
                    .abs()
                    .total_cmp(&(b.price - price).abs())
                    .then(ia.cmp(ib))
            })
            .map(|(index, _)| index)
    }

    /// Record an observation and return the level once it has enough.
    ///
    /// `previous_touch` is the price of the last store-level touch when that
    /// touch also landed on a candidate rather than a node.
    pub(crate) fn observe(
        &mut self,
        event: &EvidenceEvent,
        reason: CreationReason,
        price_band: f64,
        previous_touch: Option<f64>,
        rules: &EvidenceConfig,
    ) -> Option<PendingLevel> {
        let now = event.timestamp();
        let window = rules.qualification_window_secs;
        let required = match reason {
            CreationReason::OrderBookPresence => rules.presence_min_updates,
            _ => rules.rejection_min_touches,
        } as usize;

        self.expire(now, window);

        match self.nearest(event.price(), reason, now, window) {
            Some(index) => {
                let level = &mut self.levels[index];
                let dwelling = previous_touch.map_or(false, |p| level.covers(p));
                level.observations.push(PendingObservation {
                    event: event.clone(),
                    dwelling,
                });
                if level.observations.len() >= required {
                    return self.levels.remove(index);
                }
                None
            }
            None => {
                let level = PendingLevel::new(event, reason, price_band);
                if required <= 1 {
                    return Some(level);
                }
                self.levels.push_back(level);
                while self.levels.len() > rules.max_pending_levels {
                    self.levels.pop_front();
                }
                None
            }
        }
    }

    /// Drop a fresh book candidate at `price`, if any. Returns whether one was dropped.
    pub(crate) fn withdraw(&mut self, price: f64, now: Timestamp, window: f64) -> bool {
        match self.nearest(price, CreationReason::OrderBookPresence, now, window) {
            Some(index) => {
                self.levels.remove(index);
                true
            }
            None => false,
        }
    }

    /// Forget levels whose first observation fell out of the window.
    pub(crate) fn expire(&mut self, now: Timestamp, window: f64) {
        self.levels.retain(|level| level.is_fresh(now, window));
    }

    /// Forget levels a node now covers.
    pub(crate) fn discard_covered(&mut self, node: &MemoryNode) {
        self.levels.retain(|level| !node.covers(level.price));
    }
}
