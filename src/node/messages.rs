//! Wire Message Protocol
//!
//! Every message is a single line of text carried alone on one TCP
//! connection. Fields are colon delimited after a kind prefix; the peer list
//! is space delimited.
//!
//! | Kind | Format |
//! |---|---|
//! | Register | `REGISTER:<host>:<port>` (legacy `REGISTER <port>`) |
//! | Peer list | `PEERS <host:port> <host:port> ...` (bare ports accepted) |
//! | Gossip | `Gossip Message:<timestamp>:<originHost>:<originPort>[:<content>]` |
//! | Liveness probe | `Liveness Request:<timestamp>:<senderPort>` |
//! | Liveness ack | `Liveness Reply:<timestamp>:<senderPort>` |
//! | Dead node report | `Dead Node:<deadHost>:<deadPort>:<timestamp>:<reporterHost>` |
use serde::{Deserialize, Serialize};

use super::NodeAddress;
use crate::error::CodecError;

const REGISTER: &str = "REGISTER";
const PEERS: &str = "PEERS";
const GOSSIP: &str = "Gossip Message:";
const LIVENESS_REQUEST: &str = "Liveness Request:";
const LIVENESS_REPLY: &str = "Liveness Reply:";
const DEAD_NODE: &str = "Dead Node:";

/// Unix timestamp in seconds
pub type Timestamp = i64;

pub fn now() -> Timestamp {
    chrono::Utc::now().timestamp()
}

/// Identity of a gossip message; two messages with the same identity are the same message
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GossipId {
    pub timestamp: Timestamp,
    pub origin: NodeAddress,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GossipMessage {
    pub id: GossipId,
    pub content: Option<String>,
}

impl GossipMessage {
    pub fn new(timestamp: Timestamp, origin: NodeAddress, content: Option<String>) -> Self {
        Self {
            id: GossipId { timestamp, origin },
            content,
        }
    }
}

/// Body shared by liveness requests and replies
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LivenessProbe {
    pub timestamp: Timestamp,
    pub sender_port: u16,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeadNodeReport {
    pub dead: NodeAddress,
    pub timestamp: Timestamp,
    pub reporter_host: String,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WireMessage {
    Register(NodeAddress),
    Peers(Vec<NodeAddress>),
    Gossip(GossipMessage),
    LivenessRequest(LivenessProbe),
    LivenessReply(LivenessProbe),
    DeadNode(DeadNodeReport),
}

impl WireMessage {
    pub fn kind(&self) -> &'static str {
        match self {
            WireMessage::Register(_) => "register",
            WireMessage::Peers(_) => "peers",
            WireMessage::Gossip(_) => "gossip",
            WireMessage::LivenessRequest(_) => "liveness_request",
            WireMessage::LivenessReply(_) => "liveness_reply",
            WireMessage::DeadNode(_) => "dead_node",
        }
    }

    pub fn encode(&self) -> String {
        match self {
            WireMessage::Register(addr) => format!("{}:{}:{}", REGISTER, addr.host, addr.port),
            WireMessage::Peers(peers) => {
                let mut line = PEERS.to_string();
                for peer in peers {
                    line.push(' ');
                    line.push_str(&peer.to_string());
                }
                line
            }
            WireMessage::Gossip(msg) => {
                let mut line = format!(
                    "{}{}:{}:{}",
                    GOSSIP, msg.id.timestamp, msg.id.origin.host, msg.id.origin.port
                );
                if let Some(content) = &msg.content {
                    line.push(':');
                    line.push_str(content);
                }
                line
            }
            WireMessage::LivenessRequest(probe) => {
                format!("{}{}:{}", LIVENESS_REQUEST, probe.timestamp, probe.sender_port)
            }
            WireMessage::LivenessReply(probe) => {
                format!("{}{}:{}", LIVENESS_REPLY, probe.timestamp, probe.sender_port)
            }
            WireMessage::DeadNode(report) => format!(
                "{}{}:{}:{}:{}",
                DEAD_NODE, report.dead.host, report.dead.port, report.timestamp, report.reporter_host
            ),
        }
    }

    /// Decode one frame. `fallback_host` resolves bare ports in legacy
    /// `REGISTER <port>` and `PEERS <port> ...` forms.
    pub fn decode(frame: &str, fallback_host: &str) -> Result<Self, CodecError> {
        let line = frame.trim_end_matches(['\r', '\n', '\0', ' ']);

        if let Some(rest) = line.strip_prefix(GOSSIP) {
            return decode_gossip(rest);
        }
        if let Some(rest) = line.strip_prefix(LIVENESS_REQUEST) {
            return decode_probe(rest).map(WireMessage::LivenessRequest);
        }
        if let Some(rest) = line.strip_prefix(LIVENESS_REPLY) {
            return decode_probe(rest).map(WireMessage::LivenessReply);
        }
        if let Some(rest) = line.strip_prefix(DEAD_NODE) {
            return decode_dead_node(rest);
        }
        if let Some(rest) = line.strip_prefix(REGISTER) {
            return decode_register(rest, fallback_host);
        }
        if let Some(rest) = line.strip_prefix(PEERS) {
            if !rest.is_empty() && !rest.starts_with(' ') {
                return Err(CodecError::UnknownKind(line.to_string()));
            }
            return rest
                .split_whitespace()
                .map(|token| NodeAddress::parse_with_default_host(token, fallback_host))
                .collect::<Result<Vec<_>, _>>()
                .map(WireMessage::Peers);
        }
        Err(CodecError::UnknownKind(line.chars().take(32).collect()))
    }

    pub fn decode_bytes(frame: &[u8], fallback_host: &str) -> Result<Self, CodecError> {
        let text = std::str::from_utf8(frame).map_err(|_| CodecError::NotText)?;
        Self::decode(text, fallback_host)
    }
}

impl std::fmt::Display for WireMessage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.encode())
    }
}

fn parse_timestamp(field: &str) -> Result<Timestamp, CodecError> {
    field
        .trim()
        .parse::<Timestamp>()
        .map_err(|_| CodecError::InvalidTimestamp(field.to_string()))
}

fn required<'a>(field: Option<&'a str>, name: &'static str) -> Result<&'a str, CodecError> {
    field.ok_or(CodecError::MissingField(name))
}

fn decode_register(rest: &str, fallback_host: &str) -> Result<WireMessage, CodecError> {
    if let Some(addr) = rest.strip_prefix(':') {
        return addr.parse::<NodeAddress>().map(WireMessage::Register);
    }
    if let Some(port) = rest.strip_prefix(' ') {
        let port = NodeAddress::parse_port(required(port.split_whitespace().next(), "port")?)?;
        return Ok(WireMessage::Register(NodeAddress::new(fallback_host, port)));
    }
    Err(CodecError::MissingField("address"))
}

fn decode_gossip(rest: &str) -> Result<WireMessage, CodecError> {
    let mut fields = rest.splitn(4, ':');
    let timestamp = parse_timestamp(required(fields.next(), "timestamp")?)?;
    let host = required(fields.next(), "origin host")?;
    NodeAddress::validate_host(host)?;
    let port = NodeAddress::parse_port(required(fields.next(), "origin port")?)?;
    let content = fields.next().map(str::to_string);
    Ok(WireMessage::Gossip(GossipMessage::new(
        timestamp,
        NodeAddress::new(host, port),
        content,
    )))
}

fn decode_probe(rest: &str) -> Result<LivenessProbe, CodecError> {
    let mut fields = rest.split(':');
    let timestamp = parse_timestamp(required(fields.next(), "timestamp")?)?;
    let sender_port = NodeAddress::parse_port(required(fields.next(), "sender port")?)?;
    Ok(LivenessProbe {
        timestamp,
        sender_port,
    })
}

fn decode_dead_node(rest: &str) -> Result<WireMessage, CodecError> {
    let mut fields = rest.split(':');
    let host = required(fields.next(), "dead host")?;
    NodeAddress::validate_host(host)?;
    let port = NodeAddress::parse_port(required(fields.next(), "dead port")?)?;
    let timestamp = parse_timestamp(required(fields.next(), "timestamp")?)?;
    let reporter_host = required(fields.next(), "reporter host")?.to_string();
    Ok(WireMessage::DeadNode(DeadNodeReport {
        dead: NodeAddress::new(host, port),
        timestamp,
        reporter_host,
    }))
}
