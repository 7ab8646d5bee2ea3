use std::net::SocketAddr;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::commands::{Effects, MembershipSnapshot, Outbound, PeerCommand, PeerNodeStatus};
use super::detector::FailureDetector;
use super::engine::PeerEngine;
use super::gossip::generate_messages;
use crate::error::Result;
use crate::node::messages::{self, GossipId, WireMessage};
use crate::node::NodeAddress;
use crate::settings::PeerSettings;
use crate::store::{EventLog, SeedList};
use crate::transport::stats::ReceiverStats;
use crate::transport::{FrozenReceiverStats, InboundMessage, Sender, TcpReceiver};

/// Cheap handle for talking to a running peer
#[derive(Clone)]
pub struct PeerHandle {
    address: NodeAddress,
    command_tx: mpsc::Sender<PeerCommand>,
    sender: Arc<dyn Sender>,
    receiver_stats: Arc<ReceiverStats>,
}

impl std::fmt::Debug for PeerHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PeerHandle")
            .field("address", &self.address)
            .finish()
    }
}

impl PeerHandle {
    pub fn address(&self) -> &NodeAddress {
        &self.address
    }

    /// Originate a gossip message from this peer
    pub async fn publish(&self, content: Option<String>) -> Result<GossipId> {
        let (resp_chan, resp_rx) = oneshot::channel();
        self.command_tx
            .send(PeerCommand::Publish { content, resp_chan })
            .await?;
        resp_rx.await?
    }

    pub async fn snapshot(&self) -> Result<MembershipSnapshot> {
        let (resp_chan, resp_rx) = oneshot::channel();
        self.command_tx
            .send(PeerCommand::Snapshot { resp_chan })
            .await?;
        Ok(resp_rx.await?)
    }

    pub async fn status(&self) -> Result<PeerNodeStatus> {
        Ok(PeerNodeStatus {
            membership: self.snapshot().await?,
            sender: self.sender.get_stats(),
            receiver: self.receiver_stats.freeze(),
        })
    }
}

/// Owns the peer's protocol state. Network sends run in their own tasks and
/// report outcomes back through the command channel.
pub struct PeerController {
    engine: PeerEngine,
    sender: Arc<dyn Sender>,
    events: Arc<dyn EventLog>,
    command_tx: mpsc::Sender<PeerCommand>,
}

impl PeerController {
    pub fn new(
        engine: PeerEngine,
        sender: Arc<dyn Sender>,
        events: Arc<dyn EventLog>,
        command_tx: mpsc::Sender<PeerCommand>,
    ) -> Self {
        Self {
            engine,
            sender,
            events,
            command_tx,
        }
    }

    pub async fn run(
        mut self,
        settings: PeerSettings,
        mut inbound_rx: mpsc::Receiver<InboundMessage>,
        mut command_rx: mpsc::Receiver<PeerCommand>,
    ) {
        let local = self.engine.local().clone();
        info!(
            "[{}] Peer controller started, probing every {:?} after {:?}",
            local, settings.probe_period, settings.probe_delay
        );

        let discovery = self.engine.discover();
        self.apply(discovery).await;

        let mut probe_timer = FailureDetector::schedule(settings.probe_delay, settings.probe_period);
        loop {
            tokio::select! {
                Some(inbound) = inbound_rx.recv() => {
                    let InboundMessage { message, remote, reply_tx } = inbound;
                    // peers never answer on the inbound connection
                    let _ = reply_tx.send(None);
                    self.handle_message(message, remote).await;
                }
                Some(cmd) = command_rx.recv() => {
                    self.handle_command(cmd).await;
                }
                _ = probe_timer.tick() => {
                    let effects = self.engine.probe_round(messages::now());
                    self.apply(effects).await;
                }
                else => {
                    info!("[{}] Peer channels closed, exiting", local);
                    break;
                }
            }
        }
    }

    async fn handle_message(&mut self, message: WireMessage, remote: SocketAddr) {
        debug!("[{}] {} from {}", self.engine.local(), message.kind(), remote);
        let effects = self.engine.on_message(message, remote, messages::now());
        self.apply(effects).await;
    }

    async fn handle_command(&mut self, cmd: PeerCommand) {
        match cmd {
            PeerCommand::PeersReceived { seed, peers } => {
                let effects = self.engine.on_peers_received(&seed, peers);
                self.apply(effects).await;
            }
            PeerCommand::HandshakeResult { peer, ok } => {
                self.engine.on_handshake_result(&peer, ok);
            }
            PeerCommand::ProbeResult { peer, ok } => {
                let effects = self.engine.on_probe_result(&peer, ok, messages::now());
                self.apply(effects).await;
            }
            PeerCommand::Publish { content, resp_chan } => {
                let (id, effects) = self.engine.publish(content, messages::now());
                self.apply(effects).await;
                if resp_chan.send(Ok(id)).is_err() {
                    error!("[{}] Failed sending oneshot publish response", self.engine.local());
                }
            }
            PeerCommand::Snapshot { resp_chan } => {
                if resp_chan.send(self.engine.snapshot()).is_err() {
                    error!("[{}] Failed sending oneshot snapshot response", self.engine.local());
                }
            }
        }
    }

    /// Record events in order, then launch every send
    async fn apply(&self, effects: Effects) {
        for line in &effects.events {
            if let Err(e) = self.events.append(line).await {
                error!("[{}] Failed to append to event log: {}", self.engine.local(), e);
            }
        }
        for outbound in effects.outbound {
            self.dispatch(outbound);
        }
    }

    fn dispatch(&self, outbound: Outbound) {
        let sender = self.sender.clone();
        let command_tx = self.command_tx.clone();
        let local = self.engine.local().clone();

        tokio::spawn(async move {
            let report = match outbound {
                Outbound::Register { seed, message } => match sender.request(&seed, &message).await {
                    Ok(WireMessage::Peers(peers)) => Some(PeerCommand::PeersReceived { seed, peers }),
                    Ok(other) => {
                        warn!("[{}] Seed {} answered with {}", local, seed, other.kind());
                        None
                    }
                    Err(e) => {
                        warn!("[{}] Failed to register with seed {}: {}", local, seed, e);
                        None
                    }
                },
                Outbound::Handshake { peer } => {
                    let ok = sender.handshake(&peer).await.is_ok();
                    Some(PeerCommand::HandshakeResult { peer, ok })
                }
                Outbound::Probe { peer, message } => {
                    let ok = match sender.send(&peer, &message).await {
                        Ok(()) => true,
                        Err(e) => {
                            debug!("[{}] Probe to {} failed: {}", local, peer, e);
                            false
                        }
                    };
                    Some(PeerCommand::ProbeResult { peer, ok })
                }
                Outbound::Gossip { peer, message } => {
                    if let Err(e) = sender.send(&peer, &WireMessage::Gossip(message)).await {
                        debug!("[{}] Gossip to {} failed: {}", local, peer, e);
                    }
                    None
                }
                Outbound::Reply { target, message } => {
                    if let Err(e) = sender.send(&target, &message).await {
                        debug!("[{}] Liveness reply to {} failed: {}", local, target, e);
                    }
                    None
                }
                Outbound::DeadReport { seed, message } => {
                    if let Err(e) = sender.send(&seed, &message).await {
                        warn!("[{}] Failed to report to seed {}: {}", local, seed, e);
                    }
                    None
                }
            };

            if let Some(cmd) = report {
                if command_tx.send(cmd).await.is_err() {
                    debug!("[{}] Controller gone, dropping send outcome", local);
                }
            }
        });
    }
}

/// A running peer: receiver, controller, optional generator and handle
pub struct PeerNode {
    pub handle: PeerHandle,
    pub local_addr: SocketAddr,
    receiver: TcpReceiver,
    tasks: Vec<JoinHandle<()>>,
}

impl PeerNode {
    pub async fn start(
        settings: PeerSettings,
        sender: Arc<dyn Sender>,
        events: Arc<dyn EventLog>,
    ) -> Result<Self> {
        Self::start_with_rng(settings, sender, events, StdRng::from_entropy()).await
    }

    /// Start with a fixed random source for discovery fan-out
    pub async fn start_with_rng(
        settings: PeerSettings,
        sender: Arc<dyn Sender>,
        events: Arc<dyn EventLog>,
        rng: StdRng,
    ) -> Result<Self> {
        let (inbound_tx, inbound_rx) = mpsc::channel(1000);
        let (command_tx, command_rx) = mpsc::channel(1000);

        let receiver = TcpReceiver::bind(&settings.bind_addr(), inbound_tx, settings.io_timeout).await?;
        let mut address = settings.address();
        if address.port == 0 {
            address.port = receiver.local_addr.port();
        }

        let mut seeds = settings.seeds.clone();
        if let Some(path) = &settings.seed_config {
            for seed in SeedList::new(path).read().await? {
                if !seeds.contains(&seed) {
                    seeds.push(seed);
                }
            }
        }
        if seeds.is_empty() {
            warn!("[{}] No seeds configured, waiting to be probed", address);
        }

        let engine = PeerEngine::new(address.clone(), seeds, &settings, rng);
        let controller = PeerController::new(engine, sender.clone(), events, command_tx.clone());

        let handle = PeerHandle {
            address: address.clone(),
            command_tx,
            sender,
            receiver_stats: receiver.stats_handle(),
        };

        let mut tasks = vec![receiver.start()];
        let gossip_count = settings.gossip_count;
        let gossip_interval = settings.gossip_interval;
        tasks.push(tokio::spawn(controller.run(settings, inbound_rx, command_rx)));
        if gossip_count > 0 {
            tasks.push(tokio::spawn(generate_messages(
                handle.clone(),
                gossip_count,
                gossip_interval,
            )));
        }
        info!("Peer node listening on {} as {}", receiver.local_addr, address);

        Ok(Self {
            handle,
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

    /// Stop accepting connections and stop every task of this peer
    pub fn shutdown(self) {
        for task in &self.tasks {
            task.abort();
        }
        info!("Peer node {} shut down", self.handle.address);
    }
}
