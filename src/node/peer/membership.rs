//! Local view of the cluster held by one peer.
//!
//! The live set holds every peer learned from seeds, discovery or inbound
//! probes. A peer leaves the live set only by being declared dead, after
//! which its address is remembered so it is never learned or reported again.
use std::collections::BTreeMap;

use rand::seq::SliceRandom;
use rand::Rng;
use serde::Serialize;
use tracing::{debug, info};

use super::commands::{Effects, Outbound};
use crate::node::messages::{Timestamp, WireMessage};
use crate::node::NodeAddress;
use crate::settings::FailurePolicy;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub enum PeerStatus {
    Active,
    Dead,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PeerRecord {
    pub address: NodeAddress,
    pub consecutive_failures: u32,
    pub status: PeerStatus,
    /// Unix seconds of the last liveness reply
    pub last_seen: Option<Timestamp>,
}

impl PeerRecord {
    fn new(address: NodeAddress) -> Self {
        Self {
            address,
            consecutive_failures: 0,
            status: PeerStatus::Active,
            last_seen: None,
        }
    }
}

/// Result of counting one failed probe against a peer
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum FailureVerdict {
    /// Peer is not in the live set
    Unknown,
    /// Peer was already declared dead
    AlreadyDead,
    /// Counted, still below the threshold
    Suspect(u32),
    /// Counted and the threshold is reached
    ThresholdReached(u32),
}

#[derive(Debug)]
pub struct Membership {
    local: NodeAddress,
    seeds: Vec<NodeAddress>,
    live: BTreeMap<NodeAddress, PeerRecord>,
    dead: BTreeMap<NodeAddress, PeerRecord>,
}

impl Membership {
    pub fn new(local: NodeAddress, seeds: Vec<NodeAddress>) -> Self {
        Self {
            local,
            seeds,
            live: BTreeMap::new(),
            dead: BTreeMap::new(),
        }
    }

    pub fn local(&self) -> &NodeAddress {
        &self.local
    }

    pub fn seeds(&self) -> &[NodeAddress] {
        &self.seeds
    }

    pub fn get(&self, peer: &NodeAddress) -> Option<&PeerRecord> {
        self.live.get(peer).or_else(|| self.dead.get(peer))
    }

    pub fn is_dead(&self, peer: &NodeAddress) -> bool {
        self.dead.contains_key(peer)
    }

    pub fn len(&self) -> usize {
        self.live.len()
    }

    pub fn is_empty(&self) -> bool {
        self.live.is_empty()
    }

    /// Peers eligible for gossip and probes
    pub fn active_peers(&self) -> Vec<NodeAddress> {
        self.live
            .values()
            .filter(|r| r.status == PeerStatus::Active)
            .map(|r| r.address.clone())
            .collect()
    }

    pub fn records(&self) -> Vec<PeerRecord> {
        self.live.values().cloned().collect()
    }

    pub fn dead_peers(&self) -> Vec<NodeAddress> {
        self.dead.keys().cloned().collect()
    }

    /// Add one address. Self and dead peers are never added.
    pub fn learn(&mut self, peer: NodeAddress) -> bool {
        if peer == self.local || self.dead.contains_key(&peer) || self.live.contains_key(&peer) {
            return false;
        }
        debug!("[{}] Learned peer {}", self.local, peer);
        self.live.insert(peer.clone(), PeerRecord::new(peer));
        true
    }

    /// Union a seed's peer list into the live set; returns the newly learned peers
    pub fn merge_peer_list(&mut self, peers: &[NodeAddress]) -> Vec<NodeAddress> {
        peers
            .iter()
            .filter(|p| self.learn((*p).clone()))
            .cloned()
            .collect()
    }

    /// Shuffle the live set and take at most `fanout` distinct peers
    pub fn select_discovery_targets<R: Rng + ?Sized>(
        &self,
        rng: &mut R,
        fanout: usize,
    ) -> Vec<NodeAddress> {
        let mut candidates = self.active_peers();
        candidates.shuffle(rng);
        candidates.truncate(fanout);
        candidates
    }

    /// REGISTER with every configured seed
    pub fn discover(&self) -> Effects {
        let message = WireMessage::Register(self.local.clone());
        Effects {
            outbound: self
                .seeds
                .iter()
                .map(|seed| Outbound::Register {
                    seed: seed.clone(),
                    message: message.clone(),
                })
                .collect(),
            events: Vec::new(),
        }
    }

    /// Handle a PEERS reply: merge, then handshake with up to `fanout` peers
    pub fn on_peer_list<R: Rng + ?Sized>(
        &mut self,
        seed: &NodeAddress,
        peers: Vec<NodeAddress>,
        rng: &mut R,
        fanout: usize,
    ) -> Effects {
        let event = WireMessage::Peers(peers.clone()).encode();
        let learned = self.merge_peer_list(&peers);
        info!(
            "[{}] Seed {} returned {} peers ({} new, {} known)",
            self.local,
            seed,
            peers.len(),
            learned.len(),
            self.live.len()
        );

        Effects {
            outbound: self
                .select_discovery_targets(rng, fanout)
                .into_iter()
                .map(|peer| Outbound::Handshake { peer })
                .collect(),
            events: vec![event],
        }
    }

    /// A discovery handshake succeeded: the failure counter starts from zero
    pub fn mark_handshake_ok(&mut self, peer: &NodeAddress) {
        if let Some(record) = self.live.get_mut(peer) {
            record.consecutive_failures = 0;
            debug!("[{}] Connected to peer {}", self.local, peer);
        }
    }

    /// Count one failed probe
    pub fn record_failure(&mut self, peer: &NodeAddress, threshold: u32) -> FailureVerdict {
        if self.dead.contains_key(peer) {
            return FailureVerdict::AlreadyDead;
        }
        let Some(record) = self.live.get_mut(peer) else {
            return FailureVerdict::Unknown;
        };
        record.consecutive_failures += 1;
        if record.consecutive_failures >= threshold {
            FailureVerdict::ThresholdReached(record.consecutive_failures)
        } else {
            FailureVerdict::Suspect(record.consecutive_failures)
        }
    }

    /// Count one successful probe; only the consecutive policy forgives earlier failures
    pub fn record_probe_success(&mut self, peer: &NodeAddress, policy: FailurePolicy) {
        if policy == FailurePolicy::Consecutive {
            if let Some(record) = self.live.get_mut(peer) {
                record.consecutive_failures = 0;
            }
        }
    }

    /// A liveness reply arrived from this peer
    pub fn record_reply(&mut self, peer: &NodeAddress, policy: FailurePolicy, now: Timestamp) -> bool {
        let Some(record) = self.live.get_mut(peer) else {
            return false;
        };
        record.last_seen = Some(now);
        if policy == FailurePolicy::Consecutive {
            record.consecutive_failures = 0;
        }
        true
    }

    /// Move a peer from the live set to the dead set. False if it was already dead or unknown.
    pub fn mark_dead(&mut self, peer: &NodeAddress) -> bool {
        let Some(mut record) = self.live.remove(peer) else {
            return false;
        };
        record.status = PeerStatus::Dead;
        self.dead.insert(peer.clone(), record);
        true
    }
}
