use std::sync::atomic::{AtomicU64, Ordering};

use serde::Serialize;

/// Counters for outbound connections
#[derive(Debug, Default)]
pub struct SenderStats {
    pub messages_sent: AtomicU64,
    pub connect_errors: AtomicU64,
    pub timeout_errors: AtomicU64,
}

/// Counters for inbound connections
#[derive(Debug, Default)]
pub struct ReceiverStats {
    pub connections_accepted: AtomicU64,
    pub messages_received: AtomicU64,
    pub receive_errors: AtomicU64,
    pub malformed_messages: AtomicU64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct FrozenSenderStats {
    pub messages_sent: u64,
    pub connect_errors: u64,
    pub timeout_errors: u64,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct FrozenReceiverStats {
    pub connections_accepted: u64,
    pub messages_received: u64,
    pub receive_errors: u64,
    pub malformed_messages: u64,
}

impl SenderStats {
    pub fn freeze(&self) -> FrozenSenderStats {
        FrozenSenderStats {
            messages_sent: self.messages_sent.load(Ordering::Relaxed),
            connect_errors: self.connect_errors.load(Ordering::Relaxed),
            timeout_errors: self.timeout_errors.load(Ordering::Relaxed),
        }
    }
}

impl ReceiverStats {
    pub fn freeze(&self) -> FrozenReceiverStats {
        FrozenReceiverStats {
            connections_accepted: self.connections_accepted.load(Ordering::Relaxed),
            messages_received: self.messages_received.load(Ordering::Relaxed),
            receive_errors: self.receive_errors.load(Ordering::Relaxed),
            malformed_messages: self.malformed_messages.load(Ordering::Relaxed),
        }
    }
}
