//! TCP Receiver
//!
//! Accepts inbound connections, one task per connection. Each connection
//! carries a single frame which is decoded and handed to the owning
//! controller together with a channel for an optional reply.
use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::timeout;
use tracing::{debug, warn};

use super::stats::{FrozenReceiverStats, ReceiverStats};
use super::{read_frame, write_frame};
use crate::error::Result;
use crate::transport_error;
use crate::node::WireMessage;

/// A decoded message with a channel to send the reply back on the same connection
#[derive(Debug)]
pub struct InboundMessage {
    pub message: WireMessage,
    pub remote: SocketAddr,
    pub reply_tx: oneshot::Sender<Option<WireMessage>>,
}

/// TCP message receiver
pub struct TcpReceiver {
    pub local_addr: SocketAddr,
    listener: Arc<TcpListener>,
    stats: Arc<ReceiverStats>,
    message_tx: mpsc::Sender<InboundMessage>,
    io_timeout: Duration,
}

impl TcpReceiver {
    /// Create a new TCP receiver
    pub async fn bind(
        bind_addr: &str,
        message_tx: mpsc::Sender<InboundMessage>,
        io_timeout: Duration,
    ) -> Result<Self> {
        let listener = TcpListener::bind(bind_addr)
            .await
            .map_err(|e| transport_error!("Bind {} failed: {}", bind_addr, e))?;

        let local_addr = listener
            .local_addr()
            .map_err(|e| transport_error!("Bind {} failed: {}", bind_addr, e))?;

        Ok(Self {
            local_addr,
            listener: Arc::new(listener),
            stats: Arc::new(ReceiverStats::default()),
            message_tx,
            io_timeout,
        })
    }

    /// Start the accept loop
    pub fn start(&self) -> JoinHandle<()> {
        let listener = self.listener.clone();
        let stats = self.stats.clone();
        let tx = self.message_tx.clone();
        let io_timeout = self.io_timeout;

        tokio::spawn(async move {
            loop {
                let (stream, peer_addr) = match listener.accept().await {
                    Ok(conn) => conn,
                    Err(e) => {
                        stats.receive_errors.fetch_add(1, Ordering::Relaxed);
                        warn!("TCP accept failed: {}", e);
                        continue;
                    }
                };
                stats.connections_accepted.fetch_add(1, Ordering::Relaxed);

                let tx = tx.clone();
                let stats = stats.clone();
                tokio::spawn(async move {
                    handle_connection(stream, peer_addr, tx, stats, io_timeout).await;
                });
            }
        })
    }

    /// Get receiver statistics
    pub fn get_stats(&self) -> FrozenReceiverStats {
        self.stats.freeze()
    }

    pub fn stats_handle(&self) -> Arc<ReceiverStats> {
        self.stats.clone()
    }
}

async fn handle_connection(
    mut stream: TcpStream,
    peer_addr: SocketAddr,
    tx: mpsc::Sender<InboundMessage>,
    stats: Arc<ReceiverStats>,
    io_timeout: Duration,
) {
    let frame = match timeout(io_timeout, read_frame(&mut stream)).await {
        Ok(Ok(frame)) => frame,
        Ok(Err(e)) => {
            stats.receive_errors.fetch_add(1, Ordering::Relaxed);
            warn!("Failed to read frame from {}: {}", peer_addr, e);
            return;
        }
        Err(_) => {
            stats.receive_errors.fetch_add(1, Ordering::Relaxed);
            warn!("Timed out reading frame from {}", peer_addr);
            return;
        }
    };

    if frame.is_empty() {
        debug!("Handshake from {}", peer_addr);
        return;
    }

    let message = match WireMessage::decode_bytes(&frame, &peer_addr.ip().to_string()) {
        Ok(message) => message,
        Err(e) => {
            stats.malformed_messages.fetch_add(1, Ordering::Relaxed);
            warn!(
                "Discarding malformed message from {}: {} ({:?})",
                peer_addr,
                e,
                String::from_utf8_lossy(&frame)
            );
            return;
        }
    };
    stats.messages_received.fetch_add(1, Ordering::Relaxed);
    debug!("Received {} from {}", message.kind(), peer_addr);

    let (reply_tx, reply_rx) = oneshot::channel();
    let inbound = InboundMessage {
        message,
        remote: peer_addr,
        reply_tx,
    };
    if tx.send(inbound).await.is_err() {
        warn!("Controller gone, dropping message from {}", peer_addr);
        return;
    }

    match timeout(io_timeout, reply_rx).await {
        Ok(Ok(Some(reply))) => {
            let frame = reply.encode();
            match timeout(io_timeout, write_frame(&mut stream, frame.as_bytes())).await {
                Ok(Ok(())) => debug!("Replied {} to {}", reply.kind(), peer_addr),
                Ok(Err(e)) => warn!("Failed to write reply to {}: {}", peer_addr, e),
                Err(_) => warn!("Timed out writing reply to {}", peer_addr),
            }
        }
        Ok(Ok(None)) => {}
        Ok(Err(_)) => debug!("Controller dropped reply channel for {}", peer_addr),
        Err(_) => warn!("Timed out waiting for reply to {}", peer_addr),
    }
}

#[cfg(test)]
mod tests {
    use tokio::io::AsyncWriteExt;

    use super::*;
    use crate::node::NodeAddress;

    #[tokio::test]
    async fn test_receiver_creation() {
        let (tx, _rx) = mpsc::channel(16);
        let receiver = TcpReceiver::bind("127.0.0.1:0", tx, Duration::from_secs(1))
            .await
            .unwrap();

        assert_ne!(receiver.local_addr.port(), 0);
        assert_eq!(receiver.get_stats().messages_received, 0);
    }

    #[tokio::test]
    async fn test_receiver_forwards_and_replies() {
        let (tx, mut rx) = mpsc::channel(16);
        let receiver = TcpReceiver::bind("127.0.0.1:0", tx, Duration::from_secs(2))
            .await
            .unwrap();
        let handle = receiver.start();

        tokio::spawn(async move {
            let inbound = rx.recv().await.unwrap();
            assert_eq!(
                inbound.message,
                WireMessage::Register(NodeAddress::new("127.0.0.1", 7100))
            );
            inbound
                .reply_tx
                .send(Some(WireMessage::Peers(vec![])))
                .unwrap();
        });

        let mut stream = TcpStream::connect(receiver.local_addr).await.unwrap();
        write_frame(&mut stream, b"REGISTER:127.0.0.1:7100").await.unwrap();
        let reply = read_frame(&mut stream).await.unwrap();
        assert_eq!(reply, b"PEERS".to_vec());

        assert_eq!(receiver.get_stats().messages_received, 1);
        handle.abort();
    }

    #[tokio::test]
    async fn test_malformed_message_is_counted_and_dropped() {
        let (tx, mut rx) = mpsc::channel(16);
        let receiver = TcpReceiver::bind("127.0.0.1:0", tx, Duration::from_secs(2))
            .await
            .unwrap();
        let handle = receiver.start();

        let mut stream = TcpStream::connect(receiver.local_addr).await.unwrap();
        stream.write_all(b"NOT A MESSAGE").await.unwrap();
        stream.shutdown().await.unwrap();
        // Connection is closed without a reply
        let reply = read_frame(&mut stream).await.unwrap();
        assert!(reply.is_empty());

        assert_eq!(receiver.get_stats().malformed_messages, 1);
        assert!(rx.try_recv().is_err());
        handle.abort();
    }

    #[tokio::test]
    async fn test_silent_connection_times_out() {
        let (tx, mut rx) = mpsc::channel(16);
        let receiver = TcpReceiver::bind("127.0.0.1:0", tx, Duration::from_millis(200))
            .await
            .unwrap();
        let handle = receiver.start();

        // connect but never write or half-close
        let _stream = TcpStream::connect(receiver.local_addr).await.unwrap();
        tokio::time::sleep(Duration::from_millis(600)).await;

        let stats = receiver.get_stats();
        assert_eq!(stats.connections_accepted, 1);
        assert_eq!(stats.receive_errors, 1);
        assert_eq!(stats.messages_received, 0);
        assert!(rx.try_recv().is_err());
        handle.abort();
    }
}
