//! Session-establishment handshake.
//!
//! The bridge proves liveness and synchronization to the device software
//! by flooding the line with filler bytes at a fixed cadence until the
//! remote answers with the `"bt"` sentinel, then acknowledges with its
//! own `"bt"`. Only after that does steady-state decoding begin.

use std::time::Duration;

use log::{debug, info};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::time::MissedTickBehavior;

use bwt_protocol::{FILLER, READ_BUF_SIZE, SENTINEL};

use crate::channel::{BoxReader, BoxWriter};
use crate::error::BridgeError;

/// Handshake lifecycle of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeState {
    /// No handshake attempted or the last one was abandoned.
    Idle,
    /// A handshake is in flight; concurrent requests are rejected.
    Handshaking,
    /// The sentinel was observed and acknowledged.
    Complete,
    /// The last attempt failed with an I/O error.
    Failed,
}

/// Drive one handshake exchange to completion.
///
/// Emits [`FILLER`] every `interval` (normally
/// [`bwt_protocol::FILLER_INTERVAL`]) while
/// scanning incoming bytes through a 2-byte window for `b` immediately
/// followed by `t`. Sentinel receipt ends the filler emission (the two
/// activities race in one `select!` loop, so the writer cannot outlive
/// the reader's success signal) and the `"bt"` acknowledgement is
/// written back.
///
/// `timeout` is a hardening option; the faithful port passes `None` and
/// blocks until the sentinel or an I/O error.
pub async fn run(
    reader: &mut BoxReader,
    writer: &mut BoxWriter,
    interval: Duration,
    timeout: Option<Duration>,
) -> Result<(), BridgeError> {
    match timeout {
        Some(limit) => tokio::time::timeout(limit, drive(reader, writer, interval))
            .await
            .map_err(|_| BridgeError::HandshakeTimeout)?,
        None => drive(reader, writer, interval).await,
    }
}

async fn drive(
    reader: &mut BoxReader,
    writer: &mut BoxWriter,
    interval: Duration,
) -> Result<(), BridgeError> {
    let mut tick = tokio::time::interval(interval);
    tick.set_missed_tick_behavior(MissedTickBehavior::Delay);

    let mut buf = [0u8; READ_BUF_SIZE];
    let mut window = [0u8; 2];

    info!("Handshake started, sending filler bytes");
    loop {
        tokio::select! {
            _ = tick.tick() => {
                writer.write_all(&[FILLER]).await?;
                writer.flush().await?;
            }
            read = reader.read(&mut buf) => {
                let n = read?;
                if n == 0 {
                    return Err(BridgeError::ChannelClosed);
                }
                for &b in &buf[..n] {
                    window[0] = window[1];
                    window[1] = b;
                    if window == *SENTINEL {
                        debug!("Sentinel observed, acknowledging");
                        writer.write_all(SENTINEL).await?;
                        writer.flush().await?;
                        info!("Handshake complete");
                        return Ok(());
                    }
                }
            }
        }
    }
}
