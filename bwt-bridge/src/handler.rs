//! The request surface the UI and server layers drive the bridge with.
//!
//! [`SerialBridge`] owns one session at a time. `init_serial_comm` opens
//! the configured endpoint and spawns the session task; every subsequent
//! operation is routed through the session handle. The endpoint kind
//! (serial device node or TCP virtual-USB bridge) is picked from
//! configuration at construction time, nothing else varies per platform.

use std::sync::atomic::{AtomicU64, Ordering};

use log::{error, info, warn};
use tokio::task::JoinHandle;

use crate::board::BoardSnapshot;
use crate::channel::Endpoint;
use crate::config::BridgeSettings;
use crate::dispatcher::Handler;
use crate::error::BridgeError;
use crate::handshake::HandshakeState;
use crate::session::{Session, SessionHandle};

static NEXT_SESSION_ID: AtomicU64 = AtomicU64::new(1);

/// The operations exposed to collaborators.
#[allow(async_fn_in_trait)]
pub trait ActionHandler {
    /// Open the channel and start the session task. Calling it again on
    /// a connected bridge is a no-op.
    async fn init_serial_comm(&mut self) -> Result<(), BridgeError>;

    /// Route one button-code request: `"init"` requests a handshake, any
    /// other code is percent-decoded and written to the device verbatim.
    async fn handle_button_code(&mut self, code: &str) -> Result<(), BridgeError>;
}

pub struct SerialBridge {
    endpoint: Endpoint,
    settings: BridgeSettings,
    session: Option<SessionHandle>,
    task: Option<JoinHandle<()>>,
}

impl SerialBridge {
    pub fn new(endpoint: Endpoint, settings: BridgeSettings) -> Self {
        Self {
            endpoint,
            settings,
            session: None,
            task: None,
        }
    }

    fn session(&self) -> Result<&SessionHandle, BridgeError> {
        self.session.as_ref().ok_or_else(|| {
            error!("Channel not initialized, call init_serial_comm first");
            BridgeError::ChannelUnavailable
        })
    }

    pub fn handshake_state(&self) -> Result<HandshakeState, BridgeError> {
        Ok(self.session()?.handshake_state())
    }

    /// Wait for the handshake to settle as `Complete` or `Failed`.
    pub async fn wait_handshake(&self) -> Result<HandshakeState, BridgeError> {
        Ok(self.session()?.handshake_settled().await)
    }

    pub async fn board_snapshot(&self) -> Result<BoardSnapshot, BridgeError> {
        Ok(self.session()?.board_snapshot().await)
    }

    pub async fn start_tracking(&self) -> Result<(), BridgeError> {
        self.session()?.start_tracking().await;
        Ok(())
    }

    /// Stop tracking and return the committed cell masks.
    pub async fn stop_tracking(&self) -> Result<Vec<u8>, BridgeError> {
        Ok(self.session()?.stop_tracking().await)
    }

    /// Drain the committed masks while tracking stays on. `None` when
    /// tracking is off.
    pub async fn dump_tracking_as_bits(&self) -> Result<Option<Vec<u8>>, BridgeError> {
        Ok(self.session()?.dump_tracking_as_bits().await)
    }

    /// Like [`Self::dump_tracking_as_bits`] but rendered through the
    /// braille glyph table.
    pub async fn dump_tracking_as_string(&self) -> Result<Option<String>, BridgeError> {
        Ok(self.session()?.dump_tracking_as_string().await)
    }

    pub async fn replace_listener(&self, name: &str, handler: Handler) -> Result<bool, BridgeError> {
        Ok(self.session()?.replace_listener(name, handler).await)
    }

    /// Stop the session task and wait for it to wind down.
    pub async fn stop(&mut self) {
        if let Some(session) = self.session.take() {
            session.stop().await;
        }
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                error!("Session task ended abnormally: {}", e);
            }
        }
    }
}

impl ActionHandler for SerialBridge {
    async fn init_serial_comm(&mut self) -> Result<(), BridgeError> {
        if self.session.is_some() {
            info!("Channel already open, ignoring init request");
            return Ok(());
        }
        let channel = self.endpoint.open().await?;
        let id = NEXT_SESSION_ID.fetch_add(1, Ordering::Relaxed);
        let (session, handle) = Session::new(id, channel, &self.settings);
        self.task = Some(tokio::spawn(session.run()));
        self.session = Some(handle);
        Ok(())
    }

    async fn handle_button_code(&mut self, code: &str) -> Result<(), BridgeError> {
        if code.trim().is_empty() {
            warn!("Empty button code, ignoring");
            return Ok(());
        }
        let session = self.session()?;

        if code == "init" {
            match session.request_handshake().await {
                Err(BridgeError::HandshakeInProgress) => {
                    // Rejected, not queued.
                    info!("Handshake already in progress, dropping request");
                    Ok(())
                }
                other => other,
            }
        } else {
            match percent_decode(code) {
                Ok(bytes) => session.write(bytes).await,
                Err(e) => {
                    error!("{}", e);
                    Err(e)
                }
            }
        }
    }
}

/// Decode `%XX` escapes and `'+'`-for-space in a button code.
///
/// The UI layers URL-encode free-form pass-through payloads; everything
/// else passes unchanged.
pub(crate) fn percent_decode(input: &str) -> Result<Vec<u8>, BridgeError> {
    let raw = input.as_bytes();
    let mut out = Vec::with_capacity(raw.len());
    let mut i = 0;
    while i < raw.len() {
        match raw[i] {
            b'%' => {
                let hex = raw
                    .get(i + 1..i + 3)
                    .and_then(|pair| std::str::from_utf8(pair).ok())
                    .and_then(|pair| u8::from_str_radix(pair, 16).ok())
                    .ok_or_else(|| BridgeError::BadEscape(input.to_string()))?;
                out.push(hex);
                i += 3;
            }
            b'+' => {
                out.push(b' ');
                i += 1;
            }
            b => {
                out.push(b);
                i += 1;
            }
        }
    }
    Ok(out)
}
