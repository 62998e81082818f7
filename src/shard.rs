//! Lock-per-symbol sharding for synchronous callers.
//!
//! Each symbol's store sits behind its own mutex, so ingestion and decay on
//! one symbol are serialized while other symbols proceed independently.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tracing::debug;

use crate::config::MemoryConfig;
use crate::error::{Error, Result};
use crate::evidence::EvidenceEvent;
use crate::memory::{DecayReport, MemoryMetrics, MemoryStore, NodeId, Timestamp};

type Shard = Arc<Mutex<MemoryStore>>;

/// Per-symbol stores created on first use.
pub struct ShardedMemory {
    config: MemoryConfig,
    shards: Mutex<BTreeMap<String, Shard>>,
}

impl ShardedMemory {
    pub fn new(config: MemoryConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            shards: Mutex::new(BTreeMap::new()),
        })
    }

    pub fn config(&self) -> &MemoryConfig {
        &self.config
    }

    fn shard(&self, symbol: &str, create: bool) -> Result<Shard> {
        let mut shards = self
            .shards
            .lock()
            .map_err(|e| Error::Internal(format!("Failed to lock shard map: {}", e)))?;

        if let Some(shard) = shards.get(symbol) {
            return Ok(Arc::clone(shard));
        }
        if !create {
            return Err(Error::ShardUnavailable(format!("no store for symbol {}", symbol)));
        }

        let store = MemoryStore::new(symbol, self.config.clone())?;
        let shard = Arc::new(Mutex::new(store));
        shards.insert(symbol.to_string(), Arc::clone(&shard));
        debug!(symbol, "Created shard");
        Ok(shard)
    }

    fn with_shard<F, T>(shard: &Shard, f: F) -> Result<T>
    where
        F: FnOnce(&mut MemoryStore) -> Result<T>,
    {
        let mut store = shard
            .lock()
            .map_err(|e| Error::Internal(format!("Failed to lock store: {}", e)))?;
        f(&mut store)
    }

    /// Route an event to its symbol's store, creating the store if needed.
    pub fn ingest(&self, event: &EvidenceEvent) -> Result<Option<NodeId>> {
        event.validate()?;
        let shard = self.shard(event.symbol(), true)?;
        Self::with_shard(&shard, |store| store.ingest(event))
    }

    pub fn decay_symbol(&self, symbol: &str, current_ts: Timestamp) -> Result<DecayReport> {
        let shard = self.shard(symbol, false)?;
        Self::with_shard(&shard, |store| store.decay_nodes(current_ts))
    }

    /// Decay every symbol at `current_ts`, one shard at a time.
    pub fn decay_all(&self, current_ts: Timestamp) -> Result<BTreeMap<String, DecayReport>> {
        let mut reports = BTreeMap::new();
        for symbol in self.symbols()? {
            let report = self.decay_symbol(&symbol, current_ts)?;
            reports.insert(symbol, report);
        }
        Ok(reports)
    }

    /// Run a read-only closure against one symbol's store.
    pub fn with_store<F, T>(&self, symbol: &str, f: F) -> Result<T>
    where
        F: FnOnce(&MemoryStore) -> T,
    {
        let shard = self.shard(symbol, false)?;
        Self::with_shard(&shard, |store| Ok(f(store)))
    }

    pub fn metrics(&self, symbol: &str) -> Result<MemoryMetrics> {
        self.with_store(symbol, |store| store.get_metrics())
    }

    pub fn state_digest(&self, symbol: &str) -> Result<String> {
        self.with_store(symbol, |store| store.state_digest())?
    }

    pub fn symbols(&self) -> Result<Vec<String>> {
        let shards = self
            .shards
            .lock()
            .map_err(|e| Error::Internal(format!("Failed to lock shard map: {}", e)))?;
        Ok(shards.keys().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DecayConfig;
    use crate::evidence::LiquidationSide;

    fn memory() -> ShardedMemory {
        ShardedMemory::new(MemoryConfig {
            decay: DecayConfig::default().with_base_decay_rate(1e-3),
            ..MemoryConfig::default()
        })
        .unwrap()
    }

    #[test]
    fn test_symbols_are_isolated() {
        let memory = memory();
        memory
            .ingest(&EvidenceEvent::trade(10.0, "BTC", 100.0, 1.0, true))
            .unwrap();
        memory
            .ingest(&EvidenceEvent::trade(5.0, "ETH", 100.0, 1.0, true))
            .unwrap();

        // Each symbol has its own ordering and ids
        assert_eq!(memory.symbols().unwrap(), vec!["BTC".to_string(), "ETH".to_string()]);
        assert_eq!(memory.metrics("BTC").unwrap().total_nodes, 1);
        assert_eq!(
            memory.with_store("ETH", |s| s.get_node(NodeId(1)).map(|n| n.price_center)).unwrap().unwrap(),
            100.0
        );
    }

    #[test]
    fn test_decay_all() {
        let memory = memory();
        memory
            .ingest(&EvidenceEvent::liquidation(0.0, "BTC", 100.0, 1.0, LiquidationSide::Long))
            .unwrap();
        memory
            .ingest(&EvidenceEvent::liquidation(0.0, "ETH", 10.0, 1.0, LiquidationSide::Short))
            .unwrap();

        let reports = memory.decay_all(100.0).unwrap();
        assert_eq!(reports.len(), 2);
        assert!(reports.values().all(|r| r.decayed == 1));
    }

    #[test]
    fn test_unknown_symbol() {
        let memory = memory();
        assert!(matches!(
            memory.decay_symbol("DOGE", 1.0),
            Err(Error::ShardUnavailable(_))
        ));
    }

    #[test]
    fn test_invalid_event_does_not_create_shard() {
        let memory = memory();
        assert!(memory
            .ingest(&EvidenceEvent::trade(1.0, "BTC", -5.0, 1.0, true))
            .is_err());
        assert!(memory.symbols().unwrap().is_empty());
    }

    #[test]
    fn test_parallel_symbols() {
        let memory = Arc::new(memory());
        let handles: Vec<_> = ["BTC", "ETH", "SOL"]
            .into_iter()
            .map(|symbol| {
                let memory = Arc::clone(&memory);
                std::thread::spawn(move || {
                    for i in 0..100 {
                        memory
                            .ingest(&EvidenceEvent::trade(i as f64, symbol, 100.0 + (i % 7) as f64, 1.0, true))
                            .unwrap();
                    }
                })
            })
            .collect();
        for handle in handles {
            handle.join().unwrap();
        }

        let digests: Vec<String> = ["BTC", "ETH", "SOL"]
            .iter()
            .map(|s| memory.state_digest(s).unwrap())
            .collect();
        // Same event shape per symbol, but the symbol is part of the state
        assert_ne!(digests[0], digests[1]);
        assert_eq!(memory.metrics("SOL").unwrap().events_accepted, 100);
    }
}
