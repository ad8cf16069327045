//! Serial bridge runtime for the Braille writing tablet emulator.
//!
//! The bridge opens a byte channel to the device (a serial node or the
//! TCP virtual-USB bridge), establishes the filler/sentinel handshake,
//! then decodes the steady-state token stream into debounced, typed
//! events against a board model. [`handler::SerialBridge`] is the entry
//! point; everything below it hangs off the per-session pipeline.

pub mod board;
pub mod channel;
pub mod config;
pub mod debounce;
pub mod dispatcher;
pub mod error;
pub mod handler;
pub mod handshake;
pub mod logging;
pub mod session;

pub use board::{Board, BoardSnapshot};
pub use channel::{ByteChannel, Endpoint};
pub use config::BridgeSettings;
pub use dispatcher::{BwtEvent, EventChannel, Handler};
pub use error::BridgeError;
pub use handler::{ActionHandler, SerialBridge};
pub use handshake::HandshakeState;
pub use session::{Session, SessionHandle};
