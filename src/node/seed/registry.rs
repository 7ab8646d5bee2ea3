use std::sync::Arc;

use tracing::{debug, info};

use crate::error::Result;
use crate::node::messages::{DeadNodeReport, WireMessage};
use crate::node::NodeAddress;
use crate::store::{EventLog, RegistryStore};

/// Authoritative list of peers registered with one seed.
///
/// Entries keep insertion order until a removal, after which the list is
/// rewritten sorted ascending. Every change is persisted before the caller
/// sees its result.
pub struct SeedRegistry {
    peers: Vec<NodeAddress>,
    store: Arc<dyn RegistryStore>,
    events: Arc<dyn EventLog>,
}

impl SeedRegistry {
    /// Open the registry with an empty peer list, resetting the store
    pub async fn open(store: Arc<dyn RegistryStore>, events: Arc<dyn EventLog>) -> Result<Self> {
        store.save(&[]).await?;
        Ok(Self {
            peers: Vec::new(),
            store,
            events,
        })
    }

    pub fn peers(&self) -> &[NodeAddress] {
        &self.peers
    }

    pub fn contains(&self, peer: &NodeAddress) -> bool {
        self.peers.contains(peer)
    }

    /// Register a peer and return the peers that registered before it.
    /// The registrant never appears in its own snapshot.
    pub async fn handle_register(&mut self, peer: NodeAddress) -> Result<Vec<NodeAddress>> {
        let snapshot: Vec<NodeAddress> = self
            .peers
            .iter()
            .filter(|p| **p != peer)
            .cloned()
            .collect();

        if self.contains(&peer) {
            debug!("Peer {} re-registered", peer);
        } else {
            let mut updated = self.peers.clone();
            updated.push(peer.clone());
            self.store.save(&updated).await?;
            self.peers = updated;
            info!("Registered peer {} ({} total)", peer, self.peers.len());
        }
        self.events
            .append(&WireMessage::Register(peer).encode())
            .await?;

        Ok(snapshot)
    }

    /// Remove a peer reported dead. Returns false when it was not registered.
    pub async fn handle_dead_node_report(&mut self, report: &DeadNodeReport) -> Result<bool> {
        let Some(pos) = self.peers.iter().position(|p| *p == report.dead) else {
            debug!(
                "Ignoring dead-node report for unregistered peer {} from {}",
                report.dead, report.reporter_host
            );
            return Ok(false);
        };

        let mut updated = self.peers.clone();
        updated.remove(pos);
        updated.sort();
        self.store.save(&updated).await?;
        self.peers = updated;
        self.events
            .append(&WireMessage::DeadNode(report.clone()).encode())
            .await?;
        info!(
            "Removed dead peer {} reported by {} ({} remaining)",
            report.dead,
            report.reporter_host,
            self.peers.len()
        );
        Ok(true)
    }
}
