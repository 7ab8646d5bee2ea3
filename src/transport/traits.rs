//! Transport traits
//!
//! Seeds and peers only ever talk to the network through [`Sender`], which
//! lets the protocol engines run against the TCP transport in production and
//! against scripted senders in tests.

use async_trait::async_trait;

use super::stats::FrozenSenderStats;
use crate::error::Result;
use crate::node::{NodeAddress, WireMessage};

/// Outbound side of the one-message-per-connection protocol
#[async_trait]
pub trait Sender: Send + Sync {
    /// Connect, send one message, close. Success means the message was written.
    async fn send(&self, target: &NodeAddress, message: &WireMessage) -> Result<()>;

    /// Connect, send one message, wait for one reply on the same connection
    async fn request(&self, target: &NodeAddress, message: &WireMessage) -> Result<WireMessage>;

    /// Connect and immediately close, without a payload
    async fn handshake(&self, target: &NodeAddress) -> Result<()>;

    /// Get transport statistics for monitoring
    fn get_stats(&self) -> FrozenSenderStats;
}
