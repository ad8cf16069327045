//! Error types for the bridge runtime.

use thiserror::Error;

/// Errors surfaced by the session and the collaborator-facing API.
///
/// Only [`BridgeError::ChannelOpen`] is fatal to a caller: without a
/// channel the bridge cannot function. Everything else is recovered at
/// the component that detects it, logged, and leaves the session alive.
#[derive(Error, Debug)]
pub enum BridgeError {
    /// The channel has not been opened yet; call `init_serial_comm` first.
    #[error("Channel not initialized")]
    ChannelUnavailable,

    /// Opening the channel failed. Propagated to the caller as a hard
    /// error during construction.
    #[error("Failed to open channel: {0}")]
    ChannelOpen(#[source] std::io::Error),

    /// A handshake was requested while one is already in flight. The
    /// request is dropped, not queued.
    #[error("Handshake already in progress")]
    HandshakeInProgress,

    /// Read/write error on the channel; the in-flight operation is
    /// aborted and handshake state resets to idle.
    #[error("Channel I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The remote side closed the channel.
    #[error("Channel closed by peer")]
    ChannelClosed,

    /// The optional handshake timeout elapsed before the sentinel.
    #[error("Handshake timed out")]
    HandshakeTimeout,

    /// Listener registration for a channel name outside the capability set.
    #[error("Unrecognized event channel: {0:?}")]
    UnrecognizedChannel(String),

    /// A pass-through button code carried a malformed percent escape.
    /// The write is skipped.
    #[error("Invalid percent escape in button code: {0:?}")]
    BadEscape(String),

    /// The session task is gone; commands can no longer be delivered.
    #[error("Session stopped")]
    SessionStopped,
}
