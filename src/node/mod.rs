use std::sync::Arc;

use tracing::info;

pub mod messages;
pub mod node_address;
pub mod peer;
pub mod seed;

use crate::error::Result;
use crate::settings::{NodeSettings, PeerSettings, SeedSettings};
use crate::store::{
    EventLog, FileEventLog, FileRegistryStore, MemoryRegistryStore, NullEventLog, RegistryStore,
};
use crate::transport::TcpTransport;
pub use messages::WireMessage;
pub use node_address::NodeAddress;
pub use peer::{PeerHandle, PeerNode};
pub use seed::{SeedHandle, SeedNode};

pub enum NodeWrapper {
    Seed(SeedNode),
    Peer(PeerNode),
}

impl NodeWrapper {
    /// Build the collaborators for this role from settings and start the node
    pub async fn new(settings: NodeSettings) -> Result<Self> {
        match settings {
            NodeSettings::Seed(settings) => {
                info!(
                    "[{}] Starting in seed mode (registry: {:?})",
                    settings.address(),
                    settings.registry_file
                );
                let store: Arc<dyn RegistryStore> = match &settings.registry_file {
                    Some(path) => Arc::new(FileRegistryStore::new(path)),
                    None => Arc::new(MemoryRegistryStore::new()),
                };
                let events = event_log(&settings.output_file);
                Ok(Self::Seed(SeedNode::start(settings, store, events).await?))
            }
            NodeSettings::Peer(settings) => {
                info!(
                    "[{}] Starting in peer mode with {} seeds on the command line",
                    settings.address(),
                    settings.seeds.len()
                );
                let transport = Arc::new(TcpTransport::new(settings.io_timeout));
                let events = event_log(&settings.output_file);
                Ok(Self::Peer(PeerNode::start(settings, transport, events).await?))
            }
        }
    }

    pub fn address(&self) -> &NodeAddress {
        match self {
            Self::Seed(node) => node.address(),
            Self::Peer(node) => node.address(),
        }
    }

    pub fn shutdown(self) {
        match self {
            Self::Seed(node) => node.shutdown(),
            Self::Peer(node) => node.shutdown(),
        }
    }
}

fn event_log(path: &Option<std::path::PathBuf>) -> Arc<dyn EventLog> {
    match path {
        Some(path) => Arc::new(FileEventLog::new(path)),
        None => Arc::new(NullEventLog),
    }
}

/// Default event log file name for a node, `output_<port>.txt`
pub fn default_output_file(port: u16) -> std::path::PathBuf {
    std::path::PathBuf::from(format!("output_{}.txt", port))
}

/// Default seed registry file name, `peerslist_<port>.txt`
pub fn default_registry_file(port: u16) -> std::path::PathBuf {
    std::path::PathBuf::from(format!("peerslist_{}.txt", port))
}

impl From<SeedSettings> for NodeSettings {
    fn from(settings: SeedSettings) -> Self {
        NodeSettings::Seed(settings)
    }
}

impl From<PeerSettings> for NodeSettings {
    fn from(settings: PeerSettings) -> Self {
        NodeSettings::Peer(settings)
    }
}
