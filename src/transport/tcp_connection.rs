//! TCP Transport Implementation
//!
//! Every exchange opens a fresh connection. Each connect, write and read is
//! bounded by the configured I/O timeout, and a timeout is reported as a
//! transport failure exactly like a refused connection.
use std::future::Future;
use std::sync::atomic::Ordering;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;
use tokio::time::timeout;
use tracing::debug;

use super::stats::{FrozenSenderStats, SenderStats};
use super::traits::Sender;
use super::{read_frame, write_frame};
use crate::error::Result;
use crate::transport_error;
use crate::node::{NodeAddress, WireMessage};

#[derive(Clone, Debug)]
pub struct TcpTransport {
    io_timeout: Duration,
    stats: Arc<SenderStats>,
}

impl TcpTransport {
    pub fn new(io_timeout: Duration) -> Self {
        Self {
            io_timeout,
            stats: Arc::new(SenderStats::default()),
        }
    }

    async fn bounded<T, F>(&self, what: &str, target: &NodeAddress, fut: F) -> Result<T>
    where
        F: Future<Output = std::io::Result<T>>,
    {
        match timeout(self.io_timeout, fut).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                self.stats.connect_errors.fetch_add(1, Ordering::Relaxed);
                Err(transport_error!("{} {} failed: {}", what, target, e))
            }
            Err(_) => {
                self.stats.timeout_errors.fetch_add(1, Ordering::Relaxed);
                Err(transport_error!(
                    "{} {} timed out after {:?}",
                    what,
                    target,
                    self.io_timeout
                ))
            }
        }
    }

    async fn connect(&self, target: &NodeAddress) -> Result<TcpStream> {
        self.bounded(
            "connect",
            target,
            TcpStream::connect((target.host.as_str(), target.port)),
        )
        .await
    }
}

#[async_trait]
impl Sender for TcpTransport {
    async fn send(&self, target: &NodeAddress, message: &WireMessage) -> Result<()> {
        let mut stream = self.connect(target).await?;
        let frame = message.encode();
        self.bounded("send to", target, write_frame(&mut stream, frame.as_bytes()))
            .await?;
        self.stats.messages_sent.fetch_add(1, Ordering::Relaxed);
        debug!("Sent {} to {}: {}", message.kind(), target, frame);
        Ok(())
    }

    async fn request(&self, target: &NodeAddress, message: &WireMessage) -> Result<WireMessage> {
        let mut stream = self.connect(target).await?;
        let frame = message.encode();
        self.bounded("send to", target, write_frame(&mut stream, frame.as_bytes()))
            .await?;
        self.stats.messages_sent.fetch_add(1, Ordering::Relaxed);
        let reply = self
            .bounded("read reply from", target, read_frame(&mut stream))
            .await?;
        Ok(WireMessage::decode_bytes(&reply, &target.host)?)
    }

    async fn handshake(&self, target: &NodeAddress) -> Result<()> {
        let _stream = self.connect(target).await?;
        debug!("Handshake with {} succeeded", target);
        Ok(())
    }

    fn get_stats(&self) -> FrozenSenderStats {
        self.stats.freeze()
    }
}
