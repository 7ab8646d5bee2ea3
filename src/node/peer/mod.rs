//! Peer role: joins through the seeds, floods gossip to its peers and
//! reports peers that stop accepting connections.
pub mod commands;
pub mod controller;
pub mod detector;
pub mod engine;
pub mod gossip;
pub mod membership;

pub use commands::{Effects, MembershipSnapshot, Outbound, PeerCommand, PeerNodeStatus};
pub use controller::{PeerController, PeerHandle, PeerNode};
pub use detector::FailureDetector;
pub use engine::PeerEngine;
pub use gossip::GossipDisseminator;
pub use membership::{FailureVerdict, Membership, PeerRecord, PeerStatus};
