//! Flood gossip with deduplication.
//!
//! A node forwards each distinct message at most once: the first time it
//! sees the identity it logs the message and re-broadcasts it to every
//! active peer; every later copy is dropped. There is no hop count.
use std::collections::HashSet;
use std::time::Duration;

use tracing::{debug, info, warn};

use super::commands::{Effects, Outbound};
use super::controller::PeerHandle;
use crate::node::messages::{GossipId, GossipMessage, Timestamp, WireMessage};
use crate::node::NodeAddress;

#[derive(Debug, Default)]
pub struct GossipDisseminator {
    // append-only
    seen: HashSet<GossipId>,
    last_originated: Option<Timestamp>,
}

impl GossipDisseminator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn seen_count(&self) -> usize {
        self.seen.len()
    }

    pub fn has_seen(&self, id: &GossipId) -> bool {
        self.seen.contains(id)
    }

    /// Stamp a new local message. Timestamps strictly increase per origin so
    /// two messages published within the same second keep distinct identities.
    pub fn originate(
        &mut self,
        origin: &NodeAddress,
        content: Option<String>,
        now: Timestamp,
        targets: &[NodeAddress],
    ) -> (GossipMessage, Effects) {
        let timestamp = match self.last_originated {
            Some(last) if last >= now => last + 1,
            _ => now,
        };
        self.last_originated = Some(timestamp);

        let message = GossipMessage::new(timestamp, origin.clone(), content);
        self.seen.insert(message.id.clone());
        info!(
            "[{}] Generated message: {}",
            origin,
            WireMessage::Gossip(message.clone())
        );

        let effects = Effects {
            outbound: Self::broadcast(&message, targets),
            events: Vec::new(),
        };
        (message, effects)
    }

    /// Handle a gossip message from the network
    pub fn on_receive(&mut self, message: GossipMessage, targets: &[NodeAddress]) -> Effects {
        if !self.seen.insert(message.id.clone()) {
            debug!(
                "Dropping duplicate gossip {}:{}",
                message.id.timestamp, message.id.origin
            );
            return Effects::none();
        }

        let line = WireMessage::Gossip(message.clone()).encode();
        debug!("Received new gossip message: {}", line);
        Effects {
            outbound: Self::broadcast(&message, targets),
            events: vec![line],
        }
    }

    /// One unmodified copy per target, each on its own connection
    pub fn broadcast(message: &GossipMessage, targets: &[NodeAddress]) -> Vec<Outbound> {
        targets
            .iter()
            .map(|peer| Outbound::Gossip {
                peer: peer.clone(),
                message: message.clone(),
            })
            .collect()
    }
}

/// Publish `count` messages, one every `interval`, starting immediately.
/// Runs as a harness that exercises the cluster; real callers publish through
/// [`PeerHandle::publish`].
pub async fn generate_messages(handle: PeerHandle, count: usize, interval: Duration) {
    let mut ticker = tokio::time::interval(interval);
    for n in 0..count {
        ticker.tick().await;
        if let Err(e) = handle.publish(None).await {
            warn!("[{}] Gossip generator stopped after {} messages: {}", handle.address(), n, e);
            return;
        }
    }
    debug!("[{}] Gossip generator finished {} messages", handle.address(), count);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(port: u16) -> NodeAddress {
        NodeAddress::new("127.0.0.1", port)
    }

    #[test]
    fn test_duplicate_is_logged_and_forwarded_once() {
        let mut gossip = GossipDisseminator::new();
        let targets = vec![addr(9002), addr(9003)];
        let message = GossipMessage::new(100, addr(9001), None);

        let first = gossip.on_receive(message.clone(), &targets);
        assert_eq!(first.events, vec!["Gossip Message:100:127.0.0.1:9001".to_string()]);
        assert_eq!(first.outbound.len(), 2);

        let second = gossip.on_receive(message, &targets);
        assert_eq!(second, Effects::none());
        assert_eq!(gossip.seen_count(), 1);
    }

    #[test]
    fn test_identity_includes_origin() {
        let mut gossip = GossipDisseminator::new();
        let targets = vec![addr(9009)];

        // same timestamp, different origins: both are new
        assert_eq!(
            gossip.on_receive(GossipMessage::new(100, addr(9001), None), &targets).events.len(),
            1
        );
        assert_eq!(
            gossip.on_receive(GossipMessage::new(100, addr(9002), None), &targets).events.len(),
            1
        );
        // content is not part of the identity
        assert!(gossip
            .on_receive(GossipMessage::new(100, addr(9001), Some("x".into())), &targets)
            .events
            .is_empty());
    }

    #[test]
    fn test_originate_marks_seen_and_keeps_timestamps_unique() {
        let mut gossip = GossipDisseminator::new();
        let local = addr(9001);
        let targets = vec![addr(9002)];

        let (first, effects) = gossip.originate(&local, None, 50, &targets);
        assert_eq!(first.id.timestamp, 50);
        assert!(effects.events.is_empty());
        assert_eq!(
            effects.outbound,
            vec![Outbound::Gossip {
                peer: addr(9002),
                message: first.clone()
            }]
        );

        let (second, _) = gossip.originate(&local, None, 50, &targets);
        assert_eq!(second.id.timestamp, 51);
        let (third, _) = gossip.originate(&local, None, 49, &targets);
        assert_eq!(third.id.timestamp, 52);

        // our own message coming back is a duplicate
        assert_eq!(gossip.on_receive(first, &targets), Effects::none());
    }

    #[test]
    fn test_broadcast_with_no_peers() {
        let message = GossipMessage::new(1, addr(9001), None);
        assert!(GossipDisseminator::broadcast(&message, &[]).is_empty());
    }
}
