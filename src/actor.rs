//! One tokio task per symbol, owning that symbol's store.
//!
//! Commands for a symbol are processed in the order they are sent, so
//! ingestion and decay never interleave on the same store. Different
//! symbols run on different tasks with no shared state.

use futures::future::join_all;
use std::collections::BTreeMap;
use tokio::sync::{mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::config::MemoryConfig;
use crate::error::{Error, Result};
use crate::evidence::EvidenceEvent;
use crate::memory::{DecayReport, MemoryMetrics, MemorySnapshot, MemoryStore, NodeId, Timestamp};
use crate::query::NodeMetadata;

const COMMAND_BUFFER: usize = 256;

/// Request sent to a symbol actor.
#[derive(Debug)]
enum Command {
    Ingest {
        event: EvidenceEvent,
        reply: oneshot::Sender<Result<Option<NodeId>>>,
    },
    Decay {
        current_ts: Timestamp,
        reply: oneshot::Sender<Result<DecayReport>>,
    },
    Metrics {
        reply: oneshot::Sender<MemoryMetrics>,
    },
    Node {
        id: NodeId,
        reply: oneshot::Sender<Result<NodeMetadata>>,
    },
    Snapshot {
        reply: oneshot::Sender<MemorySnapshot>,
    },
    Digest {
        reply: oneshot::Sender<Result<String>>,
    },
    Shutdown,
}

/// Spawn an actor that owns `store`. Must be called inside a tokio runtime.
pub fn spawn_actor(store: MemoryStore) -> ActorHandle {
    let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
    let symbol = store.symbol().to_string();
    tokio::spawn(actor_loop(store, rx));
    ActorHandle { symbol, tx }
}

async fn actor_loop(mut store: MemoryStore, mut rx: mpsc::Receiver<Command>) {
    debug!(symbol = store.symbol(), "Actor started");
    loop {
        match rx.recv().await {
            Some(Command::Ingest { event, reply }) => {
                let _ = reply.send(store.ingest(&event));
            }
            Some(Command::Decay { current_ts, reply }) => {
                let _ = reply.send(store.decay_nodes(current_ts));
            }
            Some(Command::Metrics { reply }) => {
                let _ = reply.send(store.get_metrics());
            }
            Some(Command::Node { id, reply }) => {
                let _ = reply.send(store.query().node_metadata(id));
            }
            Some(Command::Snapshot { reply }) => {
                let _ = reply.send(store.snapshot());
            }
            Some(Command::Digest { reply }) => {
                let _ = reply.send(store.state_digest());
            }
            Some(Command::Shutdown) | None => break,
        }
    }
    debug!(symbol = store.symbol(), "Actor stopped");
}

/// Cloneable sender side of a symbol actor.
#[derive(Debug, Clone)]
pub struct ActorHandle {
    symbol: String,
    tx: mpsc::Sender<Command>,
}

impl ActorHandle {
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    async fn request<T>(&self, build: impl FnOnce(oneshot::Sender<T>) -> Command) -> Result<T> {
        let (reply, rx) = oneshot::channel();
        self.tx
            .send(build(reply))
            .await
            .map_err(|_| Error::ShardUnavailable(format!("actor for {} has stopped", self.symbol)))?;
        rx.await.map_err(|_| {
            Error::ShardUnavailable(format!("actor for {} dropped the reply", self.symbol))
        })
    }

    pub async fn ingest(&self, event: EvidenceEvent) -> Result<Option<NodeId>> {
        self.request(|reply| Command::Ingest { event, reply }).await?
    }

    pub async fn decay_nodes(&self, current_ts: Timestamp) -> Result<DecayReport> {
        self.request(|reply| Command::Decay { current_ts, reply }).await?
    }

    pub async fn metrics(&self) -> Result<MemoryMetrics> {
        self.request(|reply| Command::Metrics { reply }).await
    }

    pub async fn node_metadata(&self, id: NodeId) -> Result<NodeMetadata> {
        self.request(|reply| Command::Node { id, reply }).await?
    }

    pub async fn snapshot(&self) -> Result<MemorySnapshot> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    pub async fn state_digest(&self) -> Result<String> {
        self.request(|reply| Command::Digest { reply }).await?
    }

    /// Ask the actor to stop after the commands already queued.
    pub async fn shutdown(&self) -> Result<()> {
        self.tx
            .send(Command::Shutdown)
            .await
            .map_err(|_| Error::ShardUnavailable(format!("actor for {} has stopped", self.symbol)))
    }
}

/// Actors keyed by symbol, spawned on first use.
pub struct ActorPool {
    config: MemoryConfig,
    actors: BTreeMap<String, ActorHandle>,
}

impl ActorPool {
    pub fn new(config: MemoryConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            actors: BTreeMap::new(),
        })
    }

    /// The handle for `symbol`, spawning its actor if needed.
    pub fn handle(&mut self, symbol: &str) -> Result<ActorHandle> {
        if let Some(handle) = self.actors.get(symbol) {
            return Ok(handle.clone());
        }
        let store = MemoryStore::new(symbol, self.config.clone())?;
        let handle = spawn_actor(store);
        info!(symbol, "Spawned symbol actor");
        self.actors.insert(symbol.to_string(), handle.clone());
        Ok(handle)
    }

    pub fn get(&self, symbol: &str) -> Option<&ActorHandle> {
        self.actors.get(symbol)
    }

    pub fn symbols(&self) -> impl Iterator<Item = &str> {
        self.actors.keys().map(String::as_str)
    }

    pub async fn ingest(&mut self, event: EvidenceEvent) -> Result<Option<NodeId>> {
        event.validate()?;
        let handle = self.handle(event.symbol())?;
        handle.ingest(event).await
    }

    /// Decay every symbol concurrently at `current_ts`.
    pub async fn decay_all(
        &self,
        current_ts: Timestamp,
    ) -> BTreeMap<String, Result<DecayReport>> {
        let pending = self.actors.iter().map(|(symbol, handle)| async move {
            (symbol.clone(), handle.decay_nodes(current_ts).await)
        });
        let results: BTreeMap<String, Result<DecayReport>> =
            join_all(pending).await.into_iter().collect();

        for (symbol, result) in &results {
            if let Err(err) = result {
                warn!(symbol = %symbol, "Decay failed: {}", err);
            }
        }
        results
    }

    pub async fn digests(&self) -> Result<BTreeMap<String, String>> {
        let pending = self.actors.iter().map(|(symbol, handle)| async move {
            handle.state_digest().await.map(|digest| (symbol.clone(), digest))
        });
        join_all(pending).await.into_iter().collect()
    }

    /// Stop every actor and forget the handles.
    pub async fn shutdown(&mut self) {
        let handles = std::mem::take(&mut self.actors);
        for (symbol, handle) in handles {
            if let Err(err) = handle.shutdown().await {
                warn!(symbol = %symbol, "Shutdown failed: {}", err);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DecayConfig;
    use crate::evidence::LiquidationSide;
    use crate::memory::Tier;

    fn config() -> MemoryConfig {
        MemoryConfig {
            decay: DecayConfig::default().with_base_decay_rate(1e-4),
            ..MemoryConfig::default()
        }
    }

    #[tokio::test]
    async fn test_actor_ingest_and_decay() {
        let handle = spawn_actor(MemoryStore::new("BTC", config()).unwrap());
        let id = handle
            .ingest(EvidenceEvent::liquidation(1000.0, "BTC", 100.0, 50.0, LiquidationSide::Long))
            .await
            .unwrap()
            .unwrap();

        let report = handle.decay_nodes(8000.0).await.unwrap();
        assert_eq!(report.transitions.len(), 1);

        let meta = handle.node_metadata(id).await.unwrap();
        assert_eq!(meta.tier, Tier::Dormant);
        assert_eq!(meta.evidence.liquidations_within_band, 1);
    }

    #[tokio::test]
    async fn test_actor_reports_errors() {
        let handle = spawn_actor(MemoryStore::new("BTC", config()).unwrap());
        let err = handle
            .ingest(EvidenceEvent::trade(1.0, "ETH", 100.0, 1.0, true))
            .await
            .unwrap_err();
        assert!(matches!(err, Error::InvalidEvent { .. }));
        assert_eq!(handle.metrics().await.unwrap().events_rejected, 1);
    }

    #[tokio::test]
    async fn test_shutdown_closes_actor() {
        let handle = spawn_actor(MemoryStore::new("BTC", config()).unwrap());
        handle.shutdown().await.unwrap();
        // Give the actor a chance to drain and exit
        tokio::task::yield_now().await;
        let mut closed = false;
        for _ in 0..100 {
            if handle.metrics().await.is_err() {
                closed = true;
                break;
            }
            tokio::task::yield_now().await;
        }
        assert!(closed);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_pool_matches_sequential_replay() {
        let mut pool = ActorPool::new(config()).unwrap();
        let mut reference = BTreeMap::new();

        for symbol in ["BTC", "ETH"] {
            let mut store = MemoryStore::new(symbol, config()).unwrap();
            for i in 0..50 {
                let event =
                    EvidenceEvent::trade(i as f64 * 10.0, symbol, 100.0 + (i % 5) as f64, 1.0, i % 2 == 0);
                store.ingest(&event).unwrap();
                pool.ingest(event).await.unwrap();
            }
            store.decay_nodes(1_000.0).unwrap();
            reference.insert(symbol.to_string(), store.state_digest().unwrap());
        }

        let reports = pool.decay_all(1_000.0).await;
        assert_eq!(reports.len(), 2);
        assert!(reports.values().all(|r| r.is_ok()));

        assert_eq!(pool.digests().await.unwrap(), reference);
        assert_eq!(pool.symbols().collect::<Vec<_>>(), vec!["BTC", "ETH"]);

        pool.shutdown().await;
        assert!(pool.get("BTC").is_none());
    }
}
