use std::net::SocketAddr;
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::registry::SeedRegistry;
use crate::error::Result;
use crate::node::messages::WireMessage;
use crate::node::NodeAddress;
use crate::settings::SeedSettings;
use crate::store::{EventLog, RegistryStore, SeedList};
use crate::transport::{FrozenReceiverStats, InboundMessage, TcpReceiver};

/// Commands handled by the seed controller besides network traffic
#[derive(Debug)]
pub enum SeedCommand {
    ListPeers {
        resp_chan: oneshot::Sender<Vec<NodeAddress>>,
    },
}

#[derive(Clone, Debug, Serialize)]
pub struct SeedStatus {
    pub address: NodeAddress,
    pub peers: Vec<NodeAddress>,
    pub receiver: FrozenReceiverStats,
}

/// Cheap handle for talking to a running seed
#[derive(Clone, Debug)]
pub struct SeedHandle {
    address: NodeAddress,
    command_tx: mpsc::Sender<SeedCommand>,
    receiver_stats: Arc<crate::transport::stats::ReceiverStats>,
}

impl SeedHandle {
    pub fn address(&self) -> &NodeAddress {
        &self.address
    }

    pub async fn peers(&self) -> Result<Vec<NodeAddress>> {
        let (resp_chan, resp_rx) = oneshot::channel();
        self.command_tx
            .send(SeedCommand::ListPeers { resp_chan })
            .await?;
        Ok(resp_rx.await?)
    }

    pub async fn status(&self) -> Result<SeedStatus> {
        Ok(SeedStatus {
            address: self.address.clone(),
            peers: self.peers().await?,
            receiver: self.receiver_stats.freeze(),
        })
    }
}

/// Owns the registry; every registration and removal is applied here, one at a time
pub struct SeedController {
    address: NodeAddress,
    registry: SeedRegistry,
}

impl SeedController {
    pub fn new(address: NodeAddress, registry: SeedRegistry) -> Self {
        Self { address, registry }
    }

    pub async fn run(
        mut self,
        mut inbound_rx: mpsc::Receiver<InboundMessage>,
        mut command_rx: mpsc::Receiver<SeedCommand>,
    ) {
        info!("[{}] Seed controller started", self.address);
        loop {
            tokio::select! {
                Some(inbound) = inbound_rx.recv() => {
                    let InboundMessage { message, remote, reply_tx } = inbound;
                    let reply = self.handle_message(message, remote).await;
                    // the connection may already be gone
                    let _ = reply_tx.send(reply);
                }
                Some(cmd) = command_rx.recv() => {
                    self.handle_command(cmd);
                }
                else => {
                    info!("[{}] Seed channels closed, exiting", self.address);
                    break;
                }
            }
        }
    }

    fn handle_command(&self, cmd: SeedCommand) {
        match cmd {
            SeedCommand::ListPeers { resp_chan } => {
                if resp_chan.send(self.registry.peers().to_vec()).is_err() {
                    error!("[{}] Failed sending oneshot peers response", self.address);
                }
            }
        }
    }

    async fn handle_message(&mut self, message: WireMessage, remote: SocketAddr) -> Option<WireMessage> {
        match message {
            WireMessage::Register(peer) => {
                debug!("[{}] REGISTER {} from {}", self.address, peer, remote);
                match self.registry.handle_register(peer).await {
                    Ok(snapshot) => Some(WireMessage::Peers(snapshot)),
                    Err(e) => {
                        error!("[{}] Registration failed: {}", self.address, e);
                        None
                    }
                }
            }
            WireMessage::DeadNode(report) => {
                if let Err(e) = self.registry.handle_dead_node_report(&report).await {
                    error!("[{}] Dead-node report failed: {}", self.address, e);
                }
                None
            }
            other => {
                warn!(
                    "[{}] Ignoring {} message from {}",
                    self.address,
                    other.kind(),
                    remote
                );
                None
            }
        }
    }
}

/// A running seed: receiver, controller and handle
pub struct SeedNode {
    pub handle: SeedHandle,
    pub local_addr: SocketAddr,
    receiver: TcpReceiver,
    tasks: Vec<JoinHandle<()>>,
}

impl SeedNode {
    pub async fn start(
        settings: SeedSettings,
        store: Arc<dyn RegistryStore>,
        events: Arc<dyn EventLog>,
    ) -> Result<Self> {
        let (inbound_tx, inbound_rx) = mpsc::channel(1000);
        let (command_tx, command_rx) = mpsc::channel(64);

        let receiver = TcpReceiver::bind(&settings.bind_addr(), inbound_tx, settings.io_timeout).await?;
        let mut address = settings.address();
        if address.port == 0 {
            address.port = receiver.local_addr.port();
        }

        if let Some(path) = &settings.seed_config {
            SeedList::new(path).append(&address).await?;
        }

        let registry = SeedRegistry::open(store, events).await?;
        let controller = SeedController::new(address.clone(), registry);

        let mut tasks = vec![receiver.start()];
        tasks.push(tokio::spawn(controller.run(inbound_rx, command_rx)));
        info!("Seed node listening on {} as {}", receiver.local_addr, address);

        Ok(Self {
            handle: SeedHandle {
                address,
                command_tx,
                receiver_stats: receiver.stats_handle(),
            },
            local_addr: receiver.local_addr,
            receiver,
            tasks,
        })
    }

    pub fn address(&self) -> &NodeAddress {
        self.handle.address()
    }

    pub fn receiver_stats(&self) -> FrozenReceiverStats {
        self.receiver.get_stats()
    }

    /// Stop accepting connections and stop the controller
    pub fn shutdown(self) {
        for task in &self.tasks {
            task.abort();
        }
        info!("Seed node {} shut down", self.handle.address);
    }
}
