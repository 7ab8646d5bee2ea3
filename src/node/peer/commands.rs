/// Commands and effects exchanged inside a single peer node.
use serde::Serialize;
use tokio::sync::oneshot;

use super::membership::PeerRecord;
use crate::error::Result;
use crate::node::messages::{GossipId, GossipMessage, WireMessage};
use crate::node::NodeAddress;
use crate::settings::FailurePolicy;
use crate::transport::{FrozenReceiverStats, FrozenSenderStats};

/// One outbound network action. Sends are fire-and-forget except where the
/// outcome is reported back to the controller as a [`PeerCommand`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Outbound {
    /// REGISTER with a seed and wait for its PEERS reply
    Register { seed: NodeAddress, message: WireMessage },
    /// Connect-and-close discovery handshake; outcome reported
    Handshake { peer: NodeAddress },
    /// Gossip to one peer, fire-and-forget
    Gossip { peer: NodeAddress, message: GossipMessage },
    /// Liveness request; outcome reported
    Probe { peer: NodeAddress, message: WireMessage },
    /// Liveness reply, fire-and-forget
    Reply { target: NodeAddress, message: WireMessage },
    /// Dead-node report to one seed, fire-and-forget
    DeadReport { seed: NodeAddress, message: WireMessage },
}

impl Outbound {
    pub fn target(&self) -> &NodeAddress {
        match self {
            Outbound::Register { seed, .. } | Outbound::DeadReport { seed, .. } => seed,
            Outbound::Handshake { peer }
            | Outbound::Gossip { peer, .. }
            | Outbound::Probe { peer, .. } => peer,
            Outbound::Reply { target, .. } => target,
        }
    }
}

/// What handling one event asks the controller to do
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Effects {
    pub outbound: Vec<Outbound>,
    /// Lines for the event log
    pub events: Vec<String>,
}

impl Effects {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn extend(&mut self, other: Effects) {
        self.outbound.extend(other.outbound);
        self.events.extend(other.events);
    }
}

/// Commands that can be sent to a peer controller
#[derive(Debug)]
pub enum PeerCommand {
    /// A seed answered our REGISTER
    PeersReceived {
        seed: NodeAddress,
        peers: Vec<NodeAddress>,
    },
    /// Discovery handshake finished
    HandshakeResult { peer: NodeAddress, ok: bool },
    /// Liveness request send finished
    ProbeResult { peer: NodeAddress, ok: bool },
    /// Originate a gossip message
    Publish {
        content: Option<String>,
        resp_chan: oneshot::Sender<Result<GossipId>>,
    },
    /// Report current membership
    Snapshot {
        resp_chan: oneshot::Sender<MembershipSnapshot>,
    },
}

/// Point-in-time view of a peer's membership state
#[derive(Clone, Debug, Serialize)]
pub struct MembershipSnapshot {
    pub local: NodeAddress,
    pub seeds: Vec<NodeAddress>,
    pub peers: Vec<PeerRecord>,
    pub dead: Vec<NodeAddress>,
    pub seen_messages: usize,
    pub failure_policy: FailurePolicy,
}

#[derive(Clone, Debug, Serialize)]
pub struct PeerNodeStatus {
    pub membership: MembershipSnapshot,
    pub sender: FrozenSenderStats,
    pub receiver: FrozenReceiverStats,
}
