//! Configuration for the memory store and its subsystems.
//!
//! Durations are held in seconds so configs round-trip through JSON; the
//! `with_*` helpers take `chrono::Duration` for readability at call sites.

use chrono::Duration;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Dormant nodes decay at the active rate divided by this.
pub const DORMANT_RATE_DIVISOR: f64 = 10.0;

/// Rate multiplier while a node is invalidated.
pub const INVALIDATION_RATE_MULTIPLIER: f64 = 10.0;

/// Price distance, in band half-widths, beyond which a node counts as left behind.
pub const INVALIDATION_BAND_MULTIPLE: f64 = 2.0;

fn secs(d: Duration) -> f64 {
    d.num_milliseconds() as f64 / 1000.0
}

/// How wide a newly created node's band is.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BandConfig {
    /// Band half-width as a fraction of the creating price
    pub band_fraction: f64,
    /// Lower bound on the half-width, in price units
    pub min_band: f64,
}

impl Default for BandConfig {
    fn default() -> Self {
        Self {
            band_fraction: 0.001,
            min_band: 0.0,
        }
    }
}

impl BandConfig {
    /// Half-width for a node created at `price`.
    pub fn band_for(&self, price: f64) -> f64 {
        (price * self.band_fraction).max(self.min_band)
    }
}

/// Decay, tiering and revival parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DecayConfig {
    /// Active-tier decay rate per second
    pub base_decay_rate: f64,
    /// ACTIVE -> DORMANT below this strength
    pub dormant_threshold: f64,
    /// DORMANT -> ARCHIVED below this strength
    pub archive_threshold: f64,
    /// ACTIVE -> DORMANT after this much idle time
    pub dormant_timeout_secs: f64,
    /// DORMANT -> ARCHIVED after this much idle time
    pub archive_timeout_secs: f64,
    /// How long price must stay beyond the invalidation distance before
    /// the accelerated rate applies
    pub invalidation_window_secs: f64,
    /// Added to the decayed strength when new evidence revives a node
    pub revival_boost: f64,
}

impl Default for DecayConfig {
    fn default() -> Self {
        Self {
            base_decay_rate: 1e-5,
            dormant_threshold: 0.2,
            archive_threshold: 0.02,
            dormant_timeout_secs: secs(Duration::hours(24)),
            archive_timeout_secs: secs(Duration::days(30)),
            invalidation_window_secs: secs(Duration::minutes(30)),
            revival_boost: 0.3,
        }
    }
}

impl DecayConfig {
    pub fn with_base_decay_rate(mut self, rate: f64) -> Self {
        self.base_decay_rate = rate;
        self
    }

    pub fn with_thresholds(mut self, dormant: f64, archive: f64) -> Self {
        self.dormant_threshold = dormant;
        self.archive_threshold = archive;
        self
    }

    pub fn with_dormant_timeout(mut self, timeout: Duration) -> Self {
        self.dormant_timeout_secs = secs(timeout);
        self
    }

    pub fn with_archive_timeout(mut self, timeout: Duration) -> Self {
        self.archive_timeout_secs = secs(timeout);
        self
    }

    pub fn with_invalidation_window(mut self, window: Duration) -> Self {
        self.invalidation_window_secs = secs(window);
        self
    }

    pub fn with_revival_boost(mut self, boost: f64) -> Self {
        self.revival_boost = boost;
        self
    }
}

/// How evidence updates node state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvidenceConfig {
    /// Strength of a freshly created node
    pub initial_strength: f64,
    /// Strength added per matching event, capped at 1.0
    pub evidence_boost: f64,
    /// Interaction count at which confidence reaches 0.5
    pub confidence_half_saturation: f64,
    /// Liquidations closer together than this extend a cascade
    pub cascade_window_secs: f64,
    /// A trade is TRADE_VOLUME_HIGH at this multiple of the level's mean trade size
    pub high_volume_multiple: f64,
    /// Trades needed at a level before the mean trade size is used
    pub min_trades_for_volume_baseline: u64,
    /// Recent interaction timestamps kept for gap statistics
    pub interaction_history: usize,
    /// Non-zero book updates an uncovered level needs before it gets a node
    pub presence_min_updates: u32,
    /// Price touches an uncovered level needs before it gets a node
    pub rejection_min_touches: u32,
    /// Both counts must be reached within this long of the first observation
    pub qualification_window_secs: f64,
    /// Candidate levels tracked at once; the oldest is dropped past this
    pub max_pending_levels: usize,
}

impl Default for EvidenceConfig {
    fn default() -> Self {
        Self {
            initial_strength: 0.5,
            evidence_boost: 0.1,
            confidence_half_saturation: 5.0,
            cascade_window_secs: 10.0,
            high_volume_multiple: 3.0,
            min_trades_for_volume_baseline: 5,
            interaction_history: 32,
            presence_min_updates: 2,
            rejection_min_touches: 2,
            qualification_window_secs: secs(Duration::minutes(5)),
            max_pending_levels: 256,
        }
    }
}

impl EvidenceConfig {
    pub fn with_cascade_window(mut self, window: Duration) -> Self {
        self.cascade_window_secs = secs(window);
        self
    }

    /// Observations required before book presence or price rejection
    /// creates a node. A count of 1 creates on the first observation.
    pub fn with_qualification(mut self, updates: u32, touches: u32, window: Duration) -> Self {
        self.presence_min_updates = updates;
        self.rejection_min_touches = touches;
        self.qualification_window_secs = secs(window);
        self
    }
}

/// Per-node token buffer bounds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MotifConfig {
    pub buffer_capacity: usize,
    pub buffer_window_secs: f64,
}

impl Default for MotifConfig {
    fn default() -> Self {
        Self {
            buffer_capacity: 100,
            buffer_window_secs: secs(Duration::hours(24)),
        }
    }
}

impl MotifConfig {
    pub fn with_buffer_window(mut self, window: Duration) -> Self {
        self.buffer_window_secs = secs(window);
        self
    }
}

/// Topology analysis parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopologyConfig {
    /// Bands closer than this still count as adjacent for clustering
    pub adjacency_tolerance: f64,
    /// Require `[first_seen, last_interaction]` ranges to intersect
    pub require_temporal_overlap: bool,
    /// Max relative difference of interaction counts within a cluster link
    pub evidence_tolerance: f64,
    /// A node covers price for gap detection only when its interaction
    /// count exceeds this
    pub gap_interaction_floor: u64,
    /// Gaps narrower than this are not reported
    pub gap_min_width: f64,
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            adjacency_tolerance: 0.0,
            require_temporal_overlap: true,
            evidence_tolerance: 0.5,
            gap_interaction_floor: 0,
            gap_min_width: 0.0,
        }
    }
}

/// Bounds on the store's transition and violation logs.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditConfig {
    pub transition_log_capacity: usize,
    pub violation_log_capacity: usize,
}

impl Default for AuditConfig {
    fn default() -> Self {
        Self {
            transition_log_capacity: 1024,
            violation_log_capacity: 256,
        }
    }
}

/// Full store configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MemoryConfig {
    #[serde(default)]
    pub band: BandConfig,
    #[serde(default)]
    pub decay: DecayConfig,
    #[serde(default)]
    pub evidence: EvidenceConfig,
    #[serde(default)]
    pub motif: MotifConfig,
    #[serde(default)]
    pub topology: TopologyConfig,
    #[serde(default)]
    pub audit: AuditConfig,
}

impl MemoryConfig {
    /// Intraday horizon: faster decay, shorter timeouts and buffer window.
    pub fn short_horizon() -> Self {
        Self {
            decay: DecayConfig::default()
                .with_base_decay_rate(1e-4)
                .with_dormant_timeout(Duration::hours(2))
                .with_archive_timeout(Duration::days(3))
                .with_invalidation_window(Duration::minutes(5)),
            motif: MotifConfig::default().with_buffer_window(Duration::hours(4)),
            ..Self::default()
        }
    }

    /// Multi-week horizon: slow decay and long timeouts.
    pub fn long_horizon() -> Self {
        Self {
            decay: DecayConfig::default()
                .with_base_decay_rate(1e-6)
                .with_dormant_timeout(Duration::days(7))
                .with_archive_timeout(Duration::days(180))
                .with_invalidation_window(Duration::hours(6)),
            motif: MotifConfig::default().with_buffer_window(Duration::days(7)),
            ..Self::default()
        }
    }

    /// Parse a JSON config; missing sections take their defaults.
    pub fn from_json(json: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let unit = |name: &str, v: f64| -> Result<()> {
            if !v.is_finite() || !(0.0..=1.0).contains(&v) {
                return Err(Error::config(format!("{} must be within [0, 1], got {}", name, v)));
            }
            Ok(())
        };
        let non_negative = |name: &str, v: f64| -> Result<()> {
            if !v.is_finite() || v < 0.0 {
                return Err(Error::config(format!(
                    "{} must be finite and non-negative, got {}",
                    name, v
                )));
            }
            Ok(())
        };

        let band = &self.band;
        non_negative("band.band_fraction", band.band_fraction)?;
        non_negative("band.min_band", band.min_band)?;
        if band.band_fraction == 0.0 && band.min_band == 0.0 {
            return Err(Error::config(
                "band.band_fraction and band.min_band cannot both be zero",
            ));
        }

        let decay = &self.decay;
        non_negative("decay.base_decay_rate", decay.base_decay_rate)?;
        unit("decay.dormant_threshold", decay.dormant_threshold)?;
        unit("decay.archive_threshold", decay.archive_threshold)?;
        if decay.archive_threshold > decay.dormant_threshold {
            return Err(Error::config(format!(
                "decay.archive_threshold ({}) must not exceed decay.dormant_threshold ({})",
                decay.archive_threshold, decay.dormant_threshold
            )));
        }
        non_negative("decay.dormant_timeout_secs", decay.dormant_timeout_secs)?;
        non_negative("decay.archive_timeout_secs", decay.archive_timeout_secs)?;
        non_negative("decay.invalidation_window_secs", decay.invalidation_window_secs)?;
        unit("decay.revival_boost", decay.revival_boost)?;
        if decay.revival_boost == 0.0 {
            return Err(Error::config("decay.revival_boost must be greater than zero"));
        }

        let evidence = &self.evidence;
        unit("evidence.initial_strength", evidence.initial_strength)?;
        unit("evidence.evidence_boost", evidence.evidence_boost)?;
        non_negative(
            "evidence.confidence_half_saturation",
            evidence.confidence_half_saturation,
        )?;
        if evidence.confidence_half_saturation == 0.0 {
            return Err(Error::config(
                "evidence.confidence_half_saturation must be greater than zero",
            ));
        }
        non_negative("evidence.cascade_window_secs", evidence.cascade_window_secs)?;
        non_negative("evidence.high_volume_multiple", evidence.high_volume_multiple)?;
        if evidence.interaction_history < 2 {
            return Err(Error::config("evidence.interaction_history must be at least 2"));
        }
        if evidence.presence_min_updates == 0 || evidence.rejection_min_touches == 0 {
            return Err(Error::config(
                "evidence.presence_min_updates and evidence.rejection_min_touches must be at least 1",
            ));
        }
        non_negative(
            "evidence.qualification_window_secs",
            evidence.qualification_window_secs,
        )?;
        if evidence.max_pending_levels == 0 {
            return Err(Error::config("evidence.max_pending_levels must be at least 1"));
        }

        let motif = &self.motif;
        if motif.buffer_capacity < 3 {
            return Err(Error::config(format!(
                "motif.buffer_capacity must be at least 3, got {}",
                motif.buffer_capacity
            )));
        }
        non_negative("motif.buffer_window_secs", motif.buffer_window_secs)?;

        let topology = &self.topology;
        non_negative("topology.adjacency_tolerance", topology.adjacency_tolerance)?;
        non_negative("topology.evidence_tolerance", topology.evidence_tolerance)?;
        non_negative("topology.gap_min_width", topology.gap_min_width)?;

        if self.audit.transition_log_capacity == 0 || self.audit.violation_log_capacity == 0 {
            return Err(Error::config("audit log capacities must be at least 1"));
        }

        Ok(())
    }
}
