//! # market-memory
//!
//! A non-predictive memory of market evidence at price levels.
//!
//! Trades, liquidations, order-book updates and price touches are folded
//! into per-symbol memory nodes. Each node records what happened inside its
//! price band: evidence counters, a lifecycle tier driven by caller-supplied
//! time, and the order in which neutral evidence tokens arrived.
//!
//! ## Core Components
//!
//! - **Memory**: tiered node storage, spatial matching, decay and revival
//! - **Motif**: bounded token buffers and bigram/trigram occurrence tables
//! - **Topology**: density, clusters and gaps over a node set
//! - **Query**: read-only accessors returning counts, timestamps and lists
//! - **Shard / Actor**: per-symbol isolation for threads or tokio tasks
//!
//! Nothing here produces signals, rankings or predictions.
//!
//! ## Example
//!
//! ```rust,ignore
//! use market_memory::{EvidenceEvent, MemoryConfig, MemoryStore, MotifOrder};
//!
//! let mut store = MemoryStore::new("BTCUSDT", MemoryConfig::default())?;
//! if let Some(id) = store.ingest(&EvidenceEvent::trade(1000.0, "BTCUSDT", 100.0, 2.5, true))? {
//!     store.decay_nodes(4600.0)?;
//!     let motifs = store.query().node_motifs(id, MotifOrder::CountDescending)?;
//!     println!("{} motifs, digest {}", motifs.len(), store.state_digest()?);
//! }
//! ```

pub mod actor;
pub mod config;
pub mod error;
pub mod evidence;
pub mod memory;
pub mod motif;
pub mod query;
pub mod shard;
pub mod topology;

// Re-exports for convenience
pub use actor::{spawn_actor, ActorHandle, ActorPool};
pub use config::{
    AuditConfig, BandConfig, DecayConfig, EvidenceConfig, MemoryConfig, MotifConfig,
    TopologyConfig,
};
pub use error::{Error, Result};
pub use evidence::{
    BookSide, EventKind, EvidenceEvent, EvidenceToken, LiquidationSide, TokenEntry, TokenFamily,
};
pub use memory::{
    AggregateStats, CreationReason, DecayEngine, DecayReport, EvidenceCounters, MemoryMetrics,
    MemoryNode, MemorySnapshot, MemoryStore, NodeId, NodeOrder, NodeSide, PendingLevel,
    PendingLevels, Tier, TierTransition, Timestamp, TransitionCause, ViolationRecord,
};
pub use motif::{Motif, MotifExtractor, MotifStats, MotifTable, TokenBuffer};
pub use query::{BufferInfo, MemoryQuery, MotifDiversity, MotifOccurrence, MotifOrder, NodeMetadata};
pub use shard::ShardedMemory;
pub use topology::{
    NeighborhoodDensity, PriceGap, TopologyAnalyzer, TopologyCluster, TopologySummary,
};
