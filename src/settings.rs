//! rumor application settings
use std::path::PathBuf;
use std::time::Duration;

use serde::Serialize;

use crate::node::NodeAddress;

pub const APP_NAME: &str = env!("CARGO_PKG_NAME");
pub const APP_VERSION: &str = env!("CARGO_PKG_VERSION");

pub const DEFAULT_HOST: &str = "127.0.0.1";
pub const DEFAULT_LISTEN_ADDRESS: &str = "0.0.0.0";
pub const DEFAULT_SEED_CONFIG: &str = "config.txt";

// Protocol constants
pub const DISCOVERY_FANOUT: usize = 4;
pub const DEATH_THRESHOLD: u32 = 3;
pub const GOSSIP_MESSAGE_COUNT: usize = 10;
pub const GOSSIP_INTERVAL_SECS: u64 = 5;
pub const PROBE_PERIOD_SECS: u64 = 15;
pub const PROBE_DELAY_SECS: u64 = 13;
pub const IO_TIMEOUT_MS: u64 = 5000;

/// How successful probes affect a peer's failure counter
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum FailurePolicy {
    /// Failures accumulate across rounds and are never reset by a success
    #[default]
    Cumulative,
    /// A successful probe or a liveness reply resets the counter to zero
    Consecutive,
}

impl std::fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            FailurePolicy::Cumulative => write!(f, "cumulative"),
            FailurePolicy::Consecutive => write!(f, "consecutive"),
        }
    }
}

impl std::str::FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "cumulative" => Ok(FailurePolicy::Cumulative),
            "consecutive" => Ok(FailurePolicy::Consecutive),
            _ => Err(format!("Invalid failure policy: {}", s)),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl std::fmt::Display for LogFormat {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LogFormat::Text => write!(f, "text"),
            LogFormat::Json => write!(f, "json"),
        }
    }
}

impl std::str::FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            _ => Err(format!("Invalid log format: {}", s)),
        }
    }
}

#[derive(Clone, Debug)]
pub struct SeedSettings {
    // Address advertised to peers and written to the seed config
    pub host: String,
    pub port: u16,

    // Interface the TCP listener binds to
    pub listen_address: String,

    // Shared seed list this seed appends itself to
    pub seed_config: Option<PathBuf>,

    // Registry snapshot file; in-memory when absent
    pub registry_file: Option<PathBuf>,

    // Event log file; discarded when absent
    pub output_file: Option<PathBuf>,

    // HTTP status API port
    pub http_port: Option<u16>,

    pub io_timeout: Duration,
}

impl SeedSettings {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            listen_address: DEFAULT_LISTEN_ADDRESS.to_string(),
            seed_config: None,
            registry_file: None,
            output_file: None,
            http_port: None,
            io_timeout: Duration::from_millis(IO_TIMEOUT_MS),
        }
    }

    pub fn address(&self) -> NodeAddress {
        NodeAddress::new(self.host.clone(), self.port)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.listen_address, self.port)
    }
}

#[derive(Clone, Debug)]
pub struct PeerSettings {
    // Address advertised in REGISTER and gossip origin fields
    pub host: String,
    pub port: u16,

    // Interface the TCP listener binds to
    pub listen_address: String,

    // Seeds given directly on the command line
    pub seeds: Vec<NodeAddress>,

    // Shared seed list read once at startup
    pub seed_config: Option<PathBuf>,

    // Event log file; discarded when absent
    pub output_file: Option<PathBuf>,

    // HTTP status/publish API port
    pub http_port: Option<u16>,

    // Membership and failure detection
    pub discovery_fanout: usize,
    pub death_threshold: u32,
    pub failure_policy: FailurePolicy,
    pub adopt_probing_peers: bool,

    // Gossip generator (test harness)
    pub gossip_count: usize,
    pub gossip_interval: Duration,

    // Probe rounds start every period; the first fires after delay
    pub probe_period: Duration,
    pub probe_delay: Duration,

    pub io_timeout: Duration,
}

impl PeerSettings {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            listen_address: DEFAULT_LISTEN_ADDRESS.to_string(),
            seeds: Vec::new(),
            seed_config: None,
            output_file: None,
            http_port: None,
            discovery_fanout: DISCOVERY_FANOUT,
            death_threshold: DEATH_THRESHOLD,
            failure_policy: FailurePolicy::default(),
            adopt_probing_peers: true,
            gossip_count: GOSSIP_MESSAGE_COUNT,
            gossip_interval: Duration::from_secs(GOSSIP_INTERVAL_SECS),
            probe_period: Duration::from_secs(PROBE_PERIOD_SECS),
            probe_delay: Duration::from_secs(PROBE_DELAY_SECS),
            io_timeout: Duration::from_millis(IO_TIMEOUT_MS),
        }
    }

    pub fn address(&self) -> NodeAddress {
        NodeAddress::new(self.host.clone(), self.port)
    }

    pub fn bind_addr(&self) -> String {
        format!("{}:{}", self.listen_address, self.port)
    }
}

/// Which role this process runs
#[derive(Clone, Debug)]
pub enum NodeSettings {
    Seed(SeedSettings),
    Peer(PeerSettings),
}

impl NodeSettings {
    pub fn http_port(&self) -> Option<u16> {
        match self {
            NodeSettings::Seed(s) => s.http_port,
            NodeSettings::Peer(s) => s.http_port,
        }
    }

    pub fn listen_address(&self) -> &str {
        match self {
            NodeSettings::Seed(s) => &s.listen_address,
            NodeSettings::Peer(s) => &s.listen_address,
        }
    }
}
