//! Protocol state of one peer, free of I/O.
//!
//! Every handler takes the current time explicitly and returns [`Effects`]
//! for the controller to carry out.
use std::net::SocketAddr;

use rand::rngs::StdRng;
use tracing::{info, warn};

use super::commands::{Effects, MembershipSnapshot};
use super::detector::FailureDetector;
use super::gossip::GossipDisseminator;
use super::membership::Membership;
use crate::node::messages::{GossipId, Timestamp, WireMessage};
use crate::node::NodeAddress;
use crate::settings::PeerSettings;

pub struct PeerEngine {
    membership: Membership,
    gossip: GossipDisseminator,
    detector: FailureDetector,
    rng: StdRng,
    fanout: usize,
    adopt_probing_peers: bool,
}

impl PeerEngine {
    pub fn new(
        local: NodeAddress,
        seeds: Vec<NodeAddress>,
        settings: &PeerSettings,
        rng: StdRng,
    ) -> Self {
        Self {
            membership: Membership::new(local, seeds),
            gossip: GossipDisseminator::new(),
            detector: FailureDetector::new(settings.death_threshold, settings.failure_policy),
            rng,
            fanout: settings.discovery_fanout,
            adopt_probing_peers: settings.adopt_probing_peers,
        }
    }

    pub fn local(&self) -> &NodeAddress {
        self.membership.local()
    }

    pub fn membership(&self) -> &Membership {
        &self.membership
    }

    pub fn discover(&self) -> Effects {
        self.membership.discover()
    }

    pub fn on_peers_received(&mut self, seed: &NodeAddress, peers: Vec<NodeAddress>) -> Effects {
        self.membership
            .on_peer_list(seed, peers, &mut self.rng, self.fanout)
    }

    pub fn on_handshake_result(&mut self, peer: &NodeAddress, ok: bool) {
        if ok {
            self.membership.mark_handshake_ok(peer);
        } else {
            warn!("[{}] Could not connect to peer {}", self.local(), peer);
        }
    }

    pub fn probe_round(&self, now: Timestamp) -> Effects {
        self.detector.probe_round(&self.membership, now)
    }

    pub fn on_probe_result(&mut self, peer: &NodeAddress, ok: bool, now: Timestamp) -> Effects {
        self.detector
            .on_probe_result(&mut self.membership, peer, ok, now)
    }

    pub fn publish(&mut self, content: Option<String>, now: Timestamp) -> (GossipId, Effects) {
        let targets = self.membership.active_peers();
        let local = self.membership.local().clone();
        let (message, effects) = self.gossip.originate(&local, content, now, &targets);
        (message.id, effects)
    }

    /// Dispatch one decoded message that arrived from `remote`
    pub fn on_message(&mut self, message: WireMessage, remote: SocketAddr, now: Timestamp) -> Effects {
        match message {
            WireMessage::Gossip(gossip) => {
                let targets = self.membership.active_peers();
                self.gossip.on_receive(gossip, &targets)
            }
            WireMessage::LivenessRequest(probe) => {
                let requester = NodeAddress::new(remote.ip().to_string(), probe.sender_port);
                if self.adopt_probing_peers && self.membership.learn(requester.clone()) {
                    info!("[{}] Adopted probing peer {}", self.local(), requester);
                }
                self.detector
                    .on_liveness_request(&self.membership, requester, now)
            }
            WireMessage::LivenessReply(probe) => {
                let from = NodeAddress::new(remote.ip().to_string(), probe.sender_port);
                self.detector
                    .on_liveness_reply(&mut self.membership, &from, now);
                Effects::none()
            }
            other => {
                warn!(
                    "[{}] Ignoring {} message from {}",
                    self.local(),
                    other.kind(),
                    remote
                );
                Effects::none()
            }
        }
    }

    pub fn snapshot(&self) -> MembershipSnapshot {
        MembershipSnapshot {
            local: self.membership.local().clone(),
            seeds: self.membership.seeds().to_vec(),
            peers: self.membership.records(),
            dead: self.membership.dead_peers(),
            seen_messages: self.gossip.seen_count(),
            failure_policy: self.detector.policy,
        }
    }
}

#[cfg(test)]
mod tests {
    use rand::SeedableRng;

    use super::*;
    use crate::node::messages::{GossipMessage, LivenessProbe};
    use crate::node::peer::commands::Outbound;
    use crate::settings::FailurePolicy;

    fn addr(port: u16) -> NodeAddress {
        NodeAddress::new("127.0.0.1", port)
    }

    fn remote(port: u16) -> SocketAddr {
        SocketAddr::from(([127, 0, 0, 1], port))
    }

    fn engine(settings: &PeerSettings) -> PeerEngine {
        PeerEngine::new(addr(9000), vec![addr(8000)], settings, StdRng::seed_from_u64(3))
    }

    #[test]
    fn test_join_then_gossip_reaches_discovered_peers() {
        let settings = PeerSettings::new("127.0.0.1", 9000);
        let mut engine = engine(&settings);

        let effects = engine.on_peers_received(&addr(8000), vec![addr(9001), addr(9002)]);
        assert_eq!(effects.outbound.len(), 2);

        let effects = engine.on_message(
            WireMessage::Gossip(GossipMessage::new(10, addr(9001), None)),
            remote(40000),
            11,
        );
        assert_eq!(effects.events.len(), 1);
        let targets: Vec<_> = effects.outbound.iter().map(|o| o.target().clone()).collect();
        assert_eq!(targets, vec![addr(9001), addr(9002)]);
        assert_eq!(engine.snapshot().seen_messages, 1);
    }

    #[test]
    fn test_liveness_request_adopts_requester() {
        let settings = PeerSettings::new("127.0.0.1", 9000);
        let mut engine = engine(&settings);

        let effects = engine.on_message(
            WireMessage::LivenessRequest(LivenessProbe {
                timestamp: 5,
                sender_port: 9007,
            }),
            remote(51234),
            6,
        );
        assert_eq!(effects.outbound.len(), 1);
        assert!(matches!(
            &effects.outbound[0],
            Outbound::Reply { target, .. } if target == &addr(9007)
        ));
        assert_eq!(engine.membership().active_peers(), vec![addr(9007)]);
    }

    #[test]
    fn test_liveness_request_without_adoption() {
        let mut settings = PeerSettings::new("127.0.0.1", 9000);
        settings.adopt_probing_peers = false;
        let mut engine = engine(&settings);

        let effects = engine.on_message(
            WireMessage::LivenessRequest(LivenessProbe {
                timestamp: 5,
                sender_port: 9007,
            }),
            remote(51234),
            6,
        );
        // still answered
        assert_eq!(effects.outbound.len(), 1);
        assert!(engine.membership().is_empty());
    }

    #[test]
    fn test_reply_records_last_seen() {
        let mut settings = PeerSettings::new("127.0.0.1", 9000);
        settings.failure_policy = FailurePolicy::Consecutive;
        let mut engine = engine(&settings);
        engine.on_peers_received(&addr(8000), vec![addr(9001)]);
        engine.on_probe_result(&addr(9001), false, 1);

        engine.on_message(
            WireMessage::LivenessReply(LivenessProbe {
                timestamp: 2,
                sender_port: 9001,
            }),
            remote(40001),
            3,
        );
        let record = engine.membership().get(&addr(9001)).cloned();
        assert_eq!(record.as_ref().and_then(|r| r.last_seen), Some(3));
        assert_eq!(record.map(|r| r.consecutive_failures), Some(0));
    }

    #[test]
    fn test_seed_messages_are_ignored() {
        let settings = PeerSettings::new("127.0.0.1", 9000);
        let mut engine = engine(&settings);
        let effects = engine.on_message(WireMessage::Register(addr(9005)), remote(1), 1);
        assert_eq!(effects, Effects::none());
        assert!(engine.membership().is_empty());
    }

    #[test]
    fn test_dead_peer_not_readopted_by_probe() {
        let settings = PeerSettings::new("127.0.0.1", 9000);
        let mut engine = engine(&settings);
        engine.on_peers_received(&addr(8000), vec![addr(9001)]);
        for now in 0..3 {
            engine.on_probe_result(&addr(9001), false, now);
        }
        assert_eq!(engine.snapshot().dead, vec![addr(9001)]);

        engine.on_message(
            WireMessage::LivenessRequest(LivenessProbe {
                timestamp: 9,
                sender_port: 9001,
            }),
            remote(40001),
            9,
        );
        assert!(engine.membership().active_peers().is_empty());
        assert_eq!(engine.probe_round(10), Effects::none());
    }
}
