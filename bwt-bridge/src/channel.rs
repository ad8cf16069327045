//! Byte-channel opening.
//!
//! The core only ever sees two abstract duplex byte streams; what sits
//! behind them is decided here. Two endpoints exist: a serial device
//! node (virtual or physical COM port, already configured by the
//! platform driver) and a TCP connection to the virtual-USB bridge used
//! on hosts where the emulator exposes a local socket instead of a port.

use std::path::PathBuf;
use std::pin::Pin;

use log::info;
use tokio::fs::OpenOptions;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;

use crate::error::BridgeError;

pub type BoxReader = Pin<Box<dyn AsyncRead + Send>>;
pub type BoxWriter = Pin<Box<dyn AsyncWrite + Send>>;

/// A duplex byte channel, split into its two directions.
///
/// Owned exclusively by the session that opened it.
pub struct ByteChannel {
    pub reader: BoxReader,
    pub writer: BoxWriter,
}

/// Where the device lives. Selected from configuration at construction
/// time; this is the whole of the platform variance.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Endpoint {
    /// A serial device node, e.g. `/dev/ttyUSB0` or a virtual COM port.
    /// Line parameters are the platform driver's business.
    Device(PathBuf),
    /// TCP address of the virtual-USB bridge (`virtualUSB.py` style).
    Tcp(String),
}

impl Endpoint {
    /// Open the endpoint as a duplex byte channel.
    ///
    /// Failures here are the one hard error of the core: without a
    /// channel there is nothing to bridge.
    pub async fn open(&self) -> Result<ByteChannel, BridgeError> {
        match self {
            Endpoint::Device(path) => {
                info!("Opening serial device {:?}", path);
                // Two handles so the read and write sides can be driven
                // independently, like a split socket.
                let reader = OpenOptions::new()
                    .read(true)
                    .open(path)
                    .await
                    .map_err(BridgeError::ChannelOpen)?;
                let writer = OpenOptions::new()
                    .write(true)
                    .open(path)
                    .await
                    .map_err(BridgeError::ChannelOpen)?;
                Ok(ByteChannel {
                    reader: Box::pin(reader),
                    writer: Box::pin(writer),
                })
            }
            Endpoint::Tcp(addr) => {
                info!("Connecting to virtual USB bridge at {}", addr);
                let stream = TcpStream::connect(addr)
                    .await
                    .map_err(BridgeError::ChannelOpen)?;
                stream.set_nodelay(true).map_err(BridgeError::ChannelOpen)?;
                let (r, w) = stream.into_split();
                Ok(ByteChannel {
                    reader: Box::pin(r),
                    writer: Box::pin(w),
                })
            }
        }
    }
}

impl ByteChannel {
    /// An in-memory channel pair for tests: the bridge end and the
    /// "device" end of the same pipe.
    pub fn pair(capacity: usize) -> (ByteChannel, ByteChannel) {
        let (a, b) = tokio::io::duplex(capacity);
        let (ar, aw) = tokio::io::split(a);
        let (br, bw) = tokio::io::split(b);
        (
            ByteChannel {
                reader: Box::pin(ar),
                writer: Box::pin(aw),
            },
            ByteChannel {
                reader: Box::pin(br),
                writer: Box::pin(bw),
            },
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};

    #[tokio::test]
    async fn test_pair_is_duplex() {
        let (mut bridge, mut device) = ByteChannel::pair(64);

        bridge.writer.write_all(b"n").await.unwrap();
        let mut buf = [0u8; 1];
        device.reader.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"n");

        device.writer.write_all(b"bt").await.unwrap();
        let mut buf = [0u8; 2];
        bridge.reader.read_exact(&mut buf).await.unwrap();
        assert_eq!(&buf, b"bt");
    }

    #[tokio::test]
    async fn test_open_missing_device_is_hard_error() {
        let ep = Endpoint::Device(PathBuf::from("/nonexistent/bwt-port"));
        match ep.open().await {
            Err(BridgeError::ChannelOpen(_)) => {}
            other => panic!("expected ChannelOpen error, got {:?}", other.map(|_| ())),
        }
    }
}
