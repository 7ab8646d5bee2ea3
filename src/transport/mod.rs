//! TCP Transport Module
//!
//! One textual message per connection: the sender writes its frame and
//! half-closes, the receiver reads to EOF. Replies travel back on the same
//! connection the same way. There is no length prefix; the frame boundary is
//! the end of stream.

pub mod stats;
pub mod tcp_connection;
pub mod tcp_receiver;
pub mod traits;

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

pub use stats::{FrozenReceiverStats, FrozenSenderStats};
pub use tcp_connection::TcpTransport;
pub use tcp_receiver::{InboundMessage, TcpReceiver};
pub use traits::Sender;

/// Upper bound on one frame; anything larger is dropped as malformed
pub const MAX_FRAME_BYTES: usize = 64 * 1024;

/// Write one frame and half-close the write side
pub async fn write_frame<W: AsyncWrite + Unpin>(writer: &mut W, data: &[u8]) -> std::io::Result<()> {
    writer.write_all(data).await?;
    writer.flush().await?;
    writer.shutdown().await
}

/// Read one frame: everything up to EOF. An empty frame is a bare handshake.
pub async fn read_frame<R: AsyncRead + Unpin>(reader: &mut R) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    reader
        .take(MAX_FRAME_BYTES as u64 + 1)
        .read_to_end(&mut buf)
        .await?;
    if buf.len() > MAX_FRAME_BYTES {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("frame exceeds {} bytes", MAX_FRAME_BYTES),
        ));
    }
    Ok(buf)
}
