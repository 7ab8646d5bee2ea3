//! Seeds and peers talking over loopback TCP with shortened timings.
use std::collections::HashSet;
use std::future::Future;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::{TcpListener, TcpSocket, TcpStream};

use rumor::error::Result;
use rumor::node::{NodeAddress, PeerNode, SeedNode, WireMessage};
use rumor::settings::{PeerSettings, SeedSettings};
use rumor::store::{FileRegistryStore, MemoryEventLog, MemoryRegistryStore, RegistryStore, SeedList};
use rumor::transport::{FrozenSenderStats, Sender, TcpTransport};

const IO_TIMEOUT: Duration = Duration::from_millis(300);
const NEVER: Duration = Duration::from_secs(3600);

async fn eventually<F, Fut>(mut check: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    for _ in 0..100 {
        if check().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    false
}

async fn start_seed(store: Arc<dyn RegistryStore>, events: Arc<MemoryEventLog>) -> SeedNode {
    let mut settings = SeedSettings::new("127.0.0.1", 0);
    settings.listen_address = "127.0.0.1".to_string();
    settings.io_timeout = IO_TIMEOUT;
    SeedNode::start(settings, store, events).await.unwrap()
}

fn peer_settings(seed: &NodeAddress, probe_every: Duration) -> PeerSettings {
    let mut settings = PeerSettings::new("127.0.0.1", 0);
    settings.listen_address = "127.0.0.1".to_string();
    settings.seeds = vec![seed.clone()];
    settings.gossip_count = 0;
    settings.probe_delay = probe_every;
    settings.probe_period = probe_every;
    settings.io_timeout = IO_TIMEOUT;
    settings
}

async fn start_peer(settings: PeerSettings, events: Arc<MemoryEventLog>) -> PeerNode {
    let transport = Arc::new(TcpTransport::new(settings.io_timeout));
    PeerNode::start(settings, transport, events).await.unwrap()
}

/// Start peers one at a time, each after the previous one is registered
async fn join_peers(
    seed: &SeedNode,
    count: usize,
    probe_every: Duration,
) -> Vec<(PeerNode, Arc<MemoryEventLog>)> {
    let mut peers = Vec::new();
    for n in 1..=count {
        let events = Arc::new(MemoryEventLog::new());
        let peer = start_peer(peer_settings(seed.address(), probe_every), events.clone()).await;
        let handle = seed.handle.clone();
        assert!(eventually(|| {
            let handle = handle.clone();
            async move { handle.peers().await.map(|p| p.len() == n).unwrap_or(false) }
        })
        .await);
        peers.push((peer, events));
    }
    peers
}

#[tokio::test]
async fn test_join_response_excludes_registrant() {
    let seed_events = Arc::new(MemoryEventLog::new());
    let seed = start_seed(Arc::new(MemoryRegistryStore::new()), seed_events.clone()).await;
    let peers = join_peers(&seed, 3, NEVER).await;

    let addresses: Vec<NodeAddress> = peers.iter().map(|(p, _)| p.address().clone()).collect();
    let expected = [
        "PEERS".to_string(),
        format!("PEERS {}", addresses[0]),
        format!("PEERS {} {}", addresses[0], addresses[1]),
    ];
    for ((peer, events), line) in peers.iter().zip(expected.iter()) {
        let events = events.clone();
        assert!(
            eventually(|| {
                let events = events.clone();
                async move { events.entries().first() == Some(line) }
            })
            .await,
            "{} logged {:?}",
            peer.address(),
            events.entries()
        );
    }

    assert_eq!(seed.handle.peers().await.unwrap(), addresses);
    assert_eq!(
        seed_events.entries(),
        addresses
            .iter()
            .map(|a| WireMessage::Register(a.clone()).encode())
            .collect::<Vec<_>>()
    );

    // the last peer handshakes with both earlier peers and knows them
    let snapshot = peers[2].0.handle.snapshot().await.unwrap();
    let known: Vec<_> = snapshot.peers.iter().map(|r| r.address.clone()).collect();
    assert_eq!(known.len(), 2);
    assert!(known.contains(&addresses[0]) && known.contains(&addresses[1]));

    for (peer, _) in peers {
        peer.shutdown();
    }
    seed.shutdown();
}

#[tokio::test]
async fn test_gossip_floods_every_peer_once() {
    let seed = start_seed(
        Arc::new(MemoryRegistryStore::new()),
        Arc::new(MemoryEventLog::new()),
    )
    .await;
    let peers = join_peers(&seed, 4, NEVER).await;

    // the last peer knows all the others
    let origin = peers[3].0.handle.clone();
    assert!(
        eventually(|| {
            let origin = origin.clone();
            async move { origin.snapshot().await.map(|s| s.peers.len() == 3).unwrap_or(false) }
        })
        .await
    );
    let id = origin.publish(Some("hello".to_string())).await.unwrap();
    let line = format!("Gossip Message:{}:{}:hello", id.timestamp, id.origin);

    for (peer, events) in &peers[..3] {
        let events = events.clone();
        let line = line.clone();
        assert!(
            eventually(|| {
                let events = events.clone();
                let line = line.clone();
                async move { events.entries().contains(&line) }
            })
            .await,
            "{} never saw the gossip",
            peer.address()
        );
    }

    // give re-broadcasts time to echo around, then check nobody logged twice
    tokio::time::sleep(Duration::from_millis(300)).await;
    for (_, events) in &peers[..3] {
        assert_eq!(events.entries().iter().filter(|e| **e == line).count(), 1);
    }
    // the origin never logs its own message
    assert!(!peers[3].1.entries().contains(&line));

    for (peer, _) in peers {
        peer.shutdown();
    }
    seed.shutdown();
}

#[tokio::test]
async fn test_probing_connects_early_joiners() {
    let seed = start_seed(
        Arc::new(MemoryRegistryStore::new()),
        Arc::new(MemoryEventLog::new()),
    )
    .await;
    let peers = join_peers(&seed, 3, Duration::from_millis(100)).await;

    // the first peer learned nobody from the seed, but is adopted into
    // the overlay by the probes of later peers
    let first = peers[0].0.handle.clone();
    assert!(
        eventually(|| {
            let first = first.clone();
            async move { first.snapshot().await.map(|s| s.peers.len() == 2).unwrap_or(false) }
        })
        .await
    );

    let id = first.publish(None).await.unwrap();
    let line = format!("Gossip Message:{}:{}", id.timestamp, id.origin);
    for (_, events) in &peers[1..] {
        let events = events.clone();
        let line = line.clone();
        assert!(
            eventually(|| {
                let events = events.clone();
                let line = line.clone();
                async move { events.entries().contains(&line) }
            })
            .await
        );
    }

    // replies are processed
    assert!(
        eventually(|| {
            let first = first.clone();
            async move {
                first
                    .snapshot()
                    .await
                    .map(|s| s.peers.iter().all(|r| r.last_seen.is_some()))
                    .unwrap_or(false)
            }
        })
        .await
    );
    assert!(first.snapshot().await.unwrap().dead.is_empty());

    for (peer, _) in peers {
        peer.shutdown();
    }
    seed.shutdown();
}

#[tokio::test]
async fn test_dead_peer_is_removed_from_seed() {
    let dir = tempfile::TempDir::new().unwrap();
    let store = Arc::new(FileRegistryStore::new(dir.path().join("registry.txt")));
    let seed_events = Arc::new(MemoryEventLog::new());
    let seed = start_seed(store.clone(), seed_events.clone()).await;

    let mut peers = join_peers(&seed, 4, Duration::from_millis(100)).await;
    let (victim, _) = peers.remove(1);
    let dead = victim.address().clone();
    victim.shutdown();

    let handle = seed.handle.clone();
    let target = dead.clone();
    assert!(
        eventually(|| {
            let handle = handle.clone();
            let target = target.clone();
            async move {
                handle
                    .peers()
                    .await
                    .map(|p| !p.contains(&target))
                    .unwrap_or(false)
            }
        })
        .await
    );

    // persisted sorted, and only the first accepted report is logged
    let mut expected: Vec<NodeAddress> = peers.iter().map(|(p, _)| p.address().clone()).collect();
    expected.sort();
    assert_eq!(store.load().await.unwrap(), expected);
    assert_eq!(seed.handle.peers().await.unwrap(), expected);

    tokio::time::sleep(Duration::from_millis(500)).await;
    let reports: Vec<_> = seed_events
        .entries()
        .into_iter()
        .filter(|e| e.starts_with("Dead Node:"))
        .collect();
    assert_eq!(reports.len(), 1);
    assert!(reports[0].starts_with(&format!("Dead Node:{}:{}:", dead.host, dead.port)));

    // survivors stop probing and gossiping to the dead peer
    for (peer, events) in &peers {
        let snapshot = peer.handle.snapshot().await.unwrap();
        assert!(snapshot.peers.iter().all(|r| r.address != dead));
        if snapshot.dead.contains(&dead) {
            assert!(events
                .entries()
                .iter()
                .any(|e| e.starts_with("Dead Node:")));
        }
    }

    for (peer, _) in peers {
        peer.shutdown();
    }
    seed.shutdown();
}

/// Records handshake targets and forwards everything to TCP
struct RecordingSender {
    inner: TcpTransport,
    handshakes: Mutex<Vec<NodeAddress>>,
}

#[async_trait]
impl Sender for RecordingSender {
    async fn send(&self, target: &NodeAddress, message: &WireMessage) -> Result<()> {
        self.inner.send(target, message).await
    }

    async fn request(&self, target: &NodeAddress, message: &WireMessage) -> Result<WireMessage> {
        self.inner.request(target, message).await
    }

    async fn handshake(&self, target: &NodeAddress) -> Result<()> {
        self.handshakes.lock().unwrap().push(target.clone());
        self.inner.handshake(target).await
    }

    fn get_stats(&self) -> FrozenSenderStats {
        self.inner.get_stats()
    }
}

#[tokio::test]
async fn test_discovery_fanout_is_bounded() {
    let seed = start_seed(
        Arc::new(MemoryRegistryStore::new()),
        Arc::new(MemoryEventLog::new()),
    )
    .await;
    let peers = join_peers(&seed, 6, NEVER).await;

    let sender = Arc::new(RecordingSender {
        inner: TcpTransport::new(IO_TIMEOUT),
        handshakes: Mutex::new(Vec::new()),
    });
    let late = PeerNode::start(
        peer_settings(seed.address(), NEVER),
        sender.clone(),
        Arc::new(MemoryEventLog::new()),
    )
    .await
    .unwrap();

    let recorder = sender.clone();
    assert!(
        eventually(|| {
            let recorder = recorder.clone();
            async move { recorder.handshakes.lock().unwrap().len() == 4 }
        })
        .await
    );
    tokio::time::sleep(Duration::from_millis(200)).await;

    let targets = sender.handshakes.lock().unwrap().clone();
    assert_eq!(targets.len(), 4);
    assert_eq!(targets.iter().collect::<HashSet<_>>().len(), 4);
    assert_eq!(late.handle.snapshot().await.unwrap().peers.len(), 6);

    late.shutdown();
    for (peer, _) in peers {
        peer.shutdown();
    }
    seed.shutdown();
}

#[tokio::test]
async fn test_peer_finds_seed_through_seed_list() {
    let dir = tempfile::TempDir::new().unwrap();
    let seed_config = dir.path().join("config.txt");

    let mut settings = SeedSettings::new("127.0.0.1", 0);
    settings.listen_address = "127.0.0.1".to_string();
    settings.seed_config = Some(seed_config.clone());
    let seed = SeedNode::start(
        settings,
        Arc::new(MemoryRegistryStore::new()),
        Arc::new(MemoryEventLog::new()),
    )
    .await
    .unwrap();
    assert_eq!(
        SeedList::new(&seed_config).read().await.unwrap(),
        vec![seed.address().clone()]
    );

    let mut settings = peer_settings(seed.address(), NEVER);
    settings.seeds.clear();
    settings.seed_config = Some(seed_config);
    let peer = start_peer(settings, Arc::new(MemoryEventLog::new())).await;

    let handle = seed.handle.clone();
    let expected = peer.address().clone();
    assert!(
        eventually(|| {
            let handle = handle.clone();
            let expected = expected.clone();
            async move { handle.peers().await.map(|p| p == vec![expected]).unwrap_or(false) }
        })
        .await
    );

    peer.shutdown();
    seed.shutdown();
}

/// A listener whose accept queue is full, so further connects hang until
/// the caller gives up. The queued connections must stay open.
async fn stalled_listener() -> (TcpListener, Vec<TcpStream>, NodeAddress) {
    let socket = TcpSocket::new_v4().unwrap();
    socket.bind("127.0.0.1:0".parse().unwrap()).unwrap();
    let listener = socket.listen(0).unwrap();
    let local = listener.local_addr().unwrap();

    let mut queued = Vec::new();
    for _ in 0..16 {
        match tokio::time::timeout(Duration::from_millis(100), TcpStream::connect(local)).await {
            Ok(Ok(stream)) => queued.push(stream),
            _ => break,
        }
    }
    (listener, queued, NodeAddress::new("127.0.0.1", local.port()))
}

#[tokio::test]
async fn test_timed_out_probes_count_as_failures() {
    let seed = start_seed(
        Arc::new(MemoryRegistryStore::new()),
        Arc::new(MemoryEventLog::new()),
    )
    .await;
    let (_listener, _queued, stalled) = stalled_listener().await;

    // register the unresponsive address so the peer learns it from the seed
    TcpTransport::new(IO_TIMEOUT)
        .request(seed.address(), &WireMessage::Register(stalled.clone()))
        .await
        .unwrap();

    let events = Arc::new(MemoryEventLog::new());
    let peer = start_peer(
        peer_settings(seed.address(), Duration::from_millis(100)),
        events.clone(),
    )
    .await;

    let handle = peer.handle.clone();
    let target = stalled.clone();
    assert!(
        eventually(|| {
            let handle = handle.clone();
            let target = target.clone();
            async move {
                handle
                    .snapshot()
                    .await
                    .map(|s| s.dead.contains(&target))
                    .unwrap_or(false)
            }
        })
        .await
    );

    let status = peer.handle.status().await.unwrap();
    assert!(status.sender.timeout_errors >= 3, "{:?}", status.sender);
    assert_eq!(status.sender.connect_errors, 0);
    assert!(events
        .entries()
        .iter()
        .any(|e| e.starts_with(&format!("Dead Node:{}:{}:", stalled.host, stalled.port))));

    let seed_handle = seed.handle.clone();
    assert!(
        eventually(|| {
            let seed_handle = seed_handle.clone();
            async move { seed_handle.peers().await.map(|p| p.len() == 1).unwrap_or(false) }
        })
        .await
    );

    peer.shutdown();
    seed.shutdown();
}
