//! Price-level memory with tiered decay.
//!
//! Each symbol gets a [`MemoryStore`] holding memory nodes: price bands that
//! accumulate evidence counters and a motif table. Nodes move through three
//! tiers as their strength decays:
//!
//! - **Active**: recently reinforced, decays at the base rate
//! - **Dormant**: retained history, decays at a tenth of the base rate
//! - **Archived**: frozen, retrievable by id only
//!
//! Only new matching evidence brings a node back to Active.
//!
//! Trades and liquidations create a node on first sight. Order-book presence
//! and price rejection must repeat at an uncovered level before they do;
//! until then `ingest` returns `Ok(None)`.
//!
//! ## Example
//!
//! ```rust,ignore
//! use market_memory::{EvidenceEvent, LiquidationSide, MemoryConfig, MemoryStore, NodeOrder};
//!
//! let mut store = MemoryStore::new("BTCUSDT", MemoryConfig::default())?;
//!
//! let id = store.ingest(&EvidenceEvent::liquidation(
//!     1000.0, "BTCUSDT", 100.0, 50.0, LiquidationSide::Long,
//! ))?;
//! assert!(id.is_some());
//!
//! // Decay is driven by caller-supplied time
//! let report = store.decay_nodes(1000.0 + 3600.0)?;
//!
//! let nearby = store.get_active_nodes(100.0, 1.0, NodeOrder::PriceDistance)?;
//! ```

mod decay;
mod node;
mod pending;
mod proptest;
pub mod spatial;
mod store;
mod types;

pub use decay::{DecayEngine, DecayOutcome, DecayReport};
pub use node::{EvidenceCounters, InteractionTiming, LevelState, MemoryNode};
pub use pending::{PendingLevel, PendingLevels, PendingObservation};
pub use store::{
    AggregateStats, MemoryMetrics, MemorySnapshot, MemoryStore, StoreCounters, TouchState,
};
pub use types::{
    CreationReason, NodeId, NodeOrder, NodeSide, Tier, TierTransition, Timestamp,
    TransitionCause, ViolationRecord,
};
