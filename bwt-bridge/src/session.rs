//! Session orchestration.
//!
//! One task per session owns the byte channel and funnels everything
//! through a single serialized processing point: raw reads are tokenized,
//! debounced, classified, and dispatched under one lock acquisition, so
//! events for a message are fully ordered and never interleave with the
//! next message. Handshakes run inline in the same task, which is what
//! gates steady-state decoding until the exchange completes.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Weak};
use std::time::Duration;

use bytes::BytesMut;
use log::{debug, error, info, warn};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::sync::{mpsc, watch, Mutex};

use bwt_protocol::braille::glyph_for_mask;
use bwt_protocol::wire::MAIN_CLUSTER_CELL;
use bwt_protocol::{clean_message, InputCode, TokenDecoder, READ_BUF_SIZE};

use crate::board::{Board, BoardSnapshot};
use crate::channel::ByteChannel;
use crate::config::BridgeSettings;
use crate::debounce::DebounceFilter;
use crate::dispatcher::{BoardCtx, BwtEvent, EventDispatcher, Handler};
use crate::error::BridgeError;
use crate::handshake::{self, HandshakeState};

/// Commands delivered to the session task by the collaborator API.
#[derive(Debug)]
pub(crate) enum Command {
    /// Run the handshake exchange. The in-progress gate was already
    /// taken by the requester; a command never queues behind another
    /// handshake.
    Handshake,
    /// Write raw bytes to the output side, unvalidated.
    Write(Vec<u8>),
}

/// Everything the decode path mutates, behind one lock.
///
/// The session task is the only writer during decode; debounce unblock
/// timers and the snapshot/tracking accessors share the same mutex.
pub struct Pipeline {
    decoder: TokenDecoder,
    debounce: DebounceFilter,
    board: Board,
    dispatcher: EventDispatcher,
    tracking: bool,
    input_buffer: Vec<u8>,
}

impl Pipeline {
    fn new(settings: &BridgeSettings) -> Self {
        Self {
            decoder: TokenDecoder::new(),
            debounce: DebounceFilter::new(),
            board: Board::new(settings.cell_count),
            dispatcher: EventDispatcher::new(),
            tracking: false,
            input_buffer: Vec::new(),
        }
    }

    /// Run one raw token through debounce and, while tracking, the event
    /// pipeline. Returns true when the token fired and an unblock timer
    /// must be scheduled.
    fn process_token(&mut self, raw: &str) -> bool {
        if !self.debounce.should_fire(raw) {
            debug!("Token {:?} blocked by debounce", raw);
            return false;
        }
        // Debounce bookkeeping runs even with tracking off, so toggling
        // tracking cannot replay a bounced repeat.
        if self.tracking {
            self.trigger(raw);
        }
        true
    }

    fn trigger(&mut self, raw: &str) {
        let message = clean_message(raw);
        let code = match InputCode::parse(&message) {
            Ok(Some(code)) => code,
            Ok(None) => return, // empty or the handshake sentinel
            Err(e) => {
                debug!("Dropping token {:?}: {}", raw, e);
                return;
            }
        };

        let (curr_cell, curr_dot, category) = match code {
            InputCode::Alt => (
                None,
                None,
                BwtEvent::AltBtn {
                    message: message.clone(),
                },
            ),
            InputCode::Main { dot } => (
                Some(MAIN_CLUSTER_CELL),
                Some(dot),
                BwtEvent::MainBtn {
                    message: message.clone(),
                    dot,
                },
            ),
            InputCode::Cell { cell, dot } => {
                if cell >= self.board.cell_count() {
                    warn!(
                        "Cell {} out of range (board has {} cells), dropping {:?}",
                        cell,
                        self.board.cell_count(),
                        raw
                    );
                    return;
                }
                (
                    Some(cell),
                    Some(dot),
                    BwtEvent::Cells {
                        message: message.clone(),
                        cell,
                        dot,
                    },
                )
            }
        };

        // A change-cell transition fires before the ordinary event; the
        // departed cell is committed the moment focus moves away.
        if let Some(cell) = curr_cell {
            if let Some(Some(old_cell)) = self.board.touch(cell) {
                let event = BwtEvent::ChangeCell {
                    old_cell,
                    new_cell: cell,
                };
                self.dispatch(&event);
            }
        }

        self.dispatch(&category);

        let cell_bits = curr_cell.map(|c| self.board.bits_at(c)).unwrap_or(0);
        let board_event = BwtEvent::Board {
            message,
            cell: curr_cell,
            cell_bits,
            dot: curr_dot,
        };
        self.dispatch(&board_event);
    }

    fn dispatch(&mut self, event: &BwtEvent) {
        let mut ctx = BoardCtx {
            board: &mut self.board,
            input_buffer: &mut self.input_buffer,
        };
        self.dispatcher.dispatch(event, &mut ctx);
    }
}

/// The session task: owns the channel, runs until stopped or the
/// channel closes.
pub struct Session {
    id: u64,
    channel: ByteChannel,
    pipeline: Arc<Mutex<Pipeline>>,
    cmd_rx: mpsc::Receiver<Command>,
    shutdown_rx: mpsc::Receiver<()>,
    handshaking: Arc<AtomicBool>,
    state: watch::Sender<HandshakeState>,
    filler_interval: Duration,
    handshake_timeout: Option<Duration>,
    debounce_window: Duration,
}

/// Collaborator-side handle to a running session.
#[derive(Clone)]
pub struct SessionHandle {
    cmd_tx: mpsc::Sender<Command>,
    shutdown_tx: mpsc::Sender<()>,
    pipeline: Arc<Mutex<Pipeline>>,
    handshaking: Arc<AtomicBool>,
    state: watch::Receiver<HandshakeState>,
}

impl Session {
    pub fn new(id: u64, channel: ByteChannel, settings: &BridgeSettings) -> (Session, SessionHandle) {
        let pipeline = Arc::new(Mutex::new(Pipeline::new(settings)));
        let handshaking = Arc::new(AtomicBool::new(false));
        let (state_tx, state_rx) = watch::channel(HandshakeState::Idle);
        let (cmd_tx, cmd_rx) = mpsc::channel(16);
        let (shutdown_tx, shutdown_rx) = mpsc::channel(1);

        let session = Session {
            id,
            channel,
            pipeline: Arc::clone(&pipeline),
            cmd_rx,
            shutdown_rx,
            handshaking: Arc::clone(&handshaking),
            state: state_tx,
            filler_interval: settings.filler_interval,
            handshake_timeout: settings.handshake_timeout,
            debounce_window: settings.debounce_window,
        };
        let handle = SessionHandle {
            cmd_tx,
            shutdown_tx,
            pipeline,
            handshaking,
            state: state_rx,
        };
        (session, handle)
    }

    /// Drive the session until shutdown, handle drop, or channel close.
    pub async fn run(mut self) {
        let mut buf = BytesMut::with_capacity(READ_BUF_SIZE);
        info!("[Session {}] Started", self.id);

        loop {
            tokio::select! {
                _ = self.shutdown_rx.recv() => {
                    info!("[Session {}] Shutdown requested", self.id);
                    break;
                }
                cmd = self.cmd_rx.recv() => match cmd {
                    Some(Command::Handshake) => {
                        if !self.run_handshake().await {
                            info!("[Session {}] Shutdown requested", self.id);
                            break;
                        }
                    }
                    Some(Command::Write(bytes)) => {
                        if let Err(e) = self.write_all(&bytes).await {
                            error!("[Session {}] Write failed: {}", self.id, e);
                        }
                    }
                    None => {
                        debug!("[Session {}] Handle dropped", self.id);
                        break;
                    }
                },
                read = self.channel.reader.read_buf(&mut buf) => match read {
                    Ok(0) => {
                        info!("[Session {}] Channel closed by peer", self.id);
                        break;
                    }
                    Ok(_) => {
                        let chunk = buf.split();
                        self.feed(&chunk).await;
                    }
                    Err(e) => {
                        error!("[Session {}] Read error: {}", self.id, e);
                        break;
                    }
                },
            }
        }
        info!("[Session {}] Stopped", self.id);
    }

    async fn write_all(&mut self, bytes: &[u8]) -> Result<(), BridgeError> {
        self.channel.writer.write_all(bytes).await?;
        self.channel.writer.flush().await?;
        Ok(())
    }

    /// Run the handshake inline. Ordinary decode does not proceed while
    /// the exchange is in flight, but shutdown still must: the exchange
    /// races the shutdown signal, so a silent device cannot pin the
    /// session. Returns false when shutdown won the race.
    async fn run_handshake(&mut self) -> bool {
        self.state.send_replace(HandshakeState::Handshaking);

        let result = tokio::select! {
            _ = self.shutdown_rx.recv() => {
                debug!("[Session {}] Handshake abandoned by shutdown", self.id);
                self.state.send_replace(HandshakeState::Idle);
                self.handshaking.store(false, Ordering::Release);
                return false;
            }
            result = handshake::run(
                &mut self.channel.reader,
                &mut self.channel.writer,
                self.filler_interval,
                self.handshake_timeout,
            ) => result,
        };

        match result {
            Ok(()) => {
                self.state.send_replace(HandshakeState::Complete);
                // Bytes consumed during the exchange never reach the
                // decoder; clear any partial token from before it.
                self.pipeline.lock().await.decoder.reset();
            }
            Err(e) => {
                error!("[Session {}] Handshake failed: {}", self.id, e);
                self.state.send_replace(HandshakeState::Failed);
            }
        }
        self.handshaking.store(false, Ordering::Release);
        true
    }

    /// Tokenize and process a chunk of steady-state traffic.
    async fn feed(&mut self, bytes: &[u8]) {
        let fired = {
            let mut pipeline = self.pipeline.lock().await;
            let tokens = pipeline.decoder.push(bytes);
            for e in pipeline.decoder.take_errors() {
                warn!("[Session {}] {}", self.id, e);
            }

            let mut fired = Vec::new();
            for token in tokens {
                if pipeline.process_token(&token) {
                    fired.push(token);
                }
            }
            fired
        };

        for token in fired {
            schedule_unblock(
                Arc::downgrade(&self.pipeline),
                token,
                self.debounce_window,
            );
        }
    }
}

/// One-shot unblock timer for a fired token. Holds only a weak pipeline
/// reference so pending timers die with the session.
fn schedule_unblock(pipeline: Weak<Mutex<Pipeline>>, token: String, window: Duration) {
    tokio::spawn(async move {
        tokio::time::sleep(window).await;
        if let Some(pipeline) = pipeline.upgrade() {
            pipeline.lock().await.debounce.unblock(&token);
        }
    });
}

impl SessionHandle {
    /// Request a handshake. Rejected, not queued, when one is already in
    /// flight; the gate is taken here so a concurrent second caller is
    /// dropped before anything reaches the session task.
    pub async fn request_handshake(&self) -> Result<(), BridgeError> {
        if self.handshaking.swap(true, Ordering::AcqRel) {
            return Err(BridgeError::HandshakeInProgress);
        }
        if self.cmd_tx.send(Command::Handshake).await.is_err() {
            self.handshaking.store(false, Ordering::Release);
            return Err(BridgeError::SessionStopped);
        }
        Ok(())
    }

    /// Queue a raw write to the device.
    pub async fn write(&self, bytes: Vec<u8>) -> Result<(), BridgeError> {
        self.cmd_tx
            .send(Command::Write(bytes))
            .await
            .map_err(|_| BridgeError::SessionStopped)
    }

    pub fn handshake_state(&self) -> HandshakeState {
        *self.state.borrow()
    }

    /// Wait until the handshake settles as `Complete` or `Failed`.
    /// Returns the last published state if the session ends first.
    pub async fn handshake_settled(&self) -> HandshakeState {
        let mut state = self.state.clone();
        loop {
            let current = *state.borrow_and_update();
            if matches!(current, HandshakeState::Complete | HandshakeState::Failed) {
                return current;
            }
            if state.changed().await.is_err() {
                return *state.borrow();
            }
        }
    }

    pub async fn board_snapshot(&self) -> BoardSnapshot {
        self.pipeline.lock().await.board.snapshot()
    }

    /// Let events flow and the board mutate.
    pub async fn start_tracking(&self) {
        self.pipeline.lock().await.tracking = true;
    }

    /// Stop tracking and drain whatever the input buffer holds.
    pub async fn stop_tracking(&self) -> Vec<u8> {
        let mut pipeline = self.pipeline.lock().await;
        pipeline.tracking = false;
        std::mem::take(&mut pipeline.input_buffer)
    }

    /// Drain the committed cell masks. `None` when tracking is off.
    pub async fn dump_tracking_as_bits(&self) -> Option<Vec<u8>> {
        let mut pipeline = self.pipeline.lock().await;
        if !pipeline.tracking {
            return None;
        }
        Some(std::mem::take(&mut pipeline.input_buffer))
    }

    /// Drain the committed cell masks rendered through the braille glyph
    /// table. `None` when tracking is off; unknown masks render as '?'.
    pub async fn dump_tracking_as_string(&self) -> Option<String> {
        let bits = self.dump_tracking_as_bits().await?;
        Some(
            bits.into_iter()
                .map(|mask| glyph_for_mask(mask).unwrap_or('?'))
                .collect(),
        )
    }

    /// Replace the handler for a named event channel.
    pub async fn replace_listener(&self, name: &str, handler: Handler) -> bool {
        self.pipeline
            .lock()
            .await
            .dispatcher
            .replace_listener(name, handler)
    }

    /// Signal the session task to stop. Pending debounce timers expire
    /// against a weak reference and die with the pipeline.
    pub async fn stop(&self) {
        let _ = self.shutdown_tx.send(()).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::channel::ByteChannel;
    use crate::config::BridgeSettings;
    use bwt_protocol::FILLER;

    fn settings() -> BridgeSettings {
        BridgeSettings::default()
    }

    async fn spawn_session() -> (SessionHandle, ByteChannel, tokio::task::JoinHandle<()>) {
        let (bridge_end, device_end) = ByteChannel::pair(4096);
        let (session, handle) = Session::new(1, bridge_end, &settings());
        let task = tokio::spawn(session.run());
        (handle, device_end, task)
    }

    #[tokio::test(start_paused = true)]
    async fn test_debounce_window_suppresses_fast_repeat() {
        use tokio::io::AsyncWriteExt;

        let (handle, mut device, _task) = spawn_session().await;
        handle.start_tracking().await;

        device.writer.write_all(b"dn").await.unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
        device.writer.write_all(b"dn").await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        // Second press arrived inside the 300 ms window: one dot set once.
        let snap = handle.board_snapshot().await;
        assert_eq!(snap.cells[0], 0b100);

        // Past the window the same token fires again (board OR is
        // idempotent, so check via the buffer after a cell switch).
        tokio::time::sleep(Duration::from_millis(400)).await;
        device.writer.write_all(b"dn").await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        device.writer.write_all(b"12n").await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        let committed = handle.stop_tracking().await;
        assert_eq!(committed, vec![0b100]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_tracking_gate() {
        use tokio::io::AsyncWriteExt;

        let (handle, mut device, _task) = spawn_session().await;

        // Tracking off: nothing reaches the board.
        device.writer.write_all(b"dn").await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(handle.board_snapshot().await.cells[0], 0);
        assert_eq!(handle.dump_tracking_as_bits().await, None);

        handle.start_tracking().await;
        tokio::time::sleep(Duration::from_millis(400)).await;
        device.writer.write_all(b"dn").await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert_eq!(handle.board_snapshot().await.cells[0], 0b100);
    }

    #[tokio::test(start_paused = true)]
    async fn test_change_cell_commit_and_string_dump() {
        use tokio::io::AsyncWriteExt;

        let (handle, mut device, _task) = spawn_session().await;
        handle.start_tracking().await;

        // Spell 'a' (dot 1) in cell 1, then move to cell 2.
        device.writer.write_all(b"11n").await.unwrap();
        tokio::time::sleep(Duration::from_millis(400)).await;
        device.writer.write_all(b"21n").await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;

        let text = handle.dump_tracking_as_string().await.unwrap();
        assert_eq!(text, "a");
        // Committed cell was reset.
        assert_eq!(handle.board_snapshot().await.cells[1], 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_concurrent_handshake_rejected() {
        use tokio::io::AsyncReadExt;

        let (handle, mut device, _task) = spawn_session().await;

        handle.request_handshake().await.unwrap();
        // Give the session task a chance to enter the exchange.
        tokio::task::yield_now().await;

        // All further requests while in flight are dropped.
        for _ in 0..3 {
            assert!(matches!(
                handle.request_handshake().await,
                Err(BridgeError::HandshakeInProgress)
            ));
        }

        // The first request still completes normally.
        let device_side = tokio::spawn(async move {
            let mut buf = [0u8; 64];
            let n = device.reader.read(&mut buf).await.unwrap();
            assert!(buf[..n].iter().all(|&b| b == FILLER));
            use tokio::io::AsyncWriteExt;
            device.writer.write_all(b"bt").await.unwrap();
            let mut ack = [0u8; 2];
            device.reader.read_exact(&mut ack).await.unwrap();
            assert_eq!(&ack, b"bt");
            device
        });
        // Keep the device end alive so EOF does not stop the session.
        let _device = device_side.await.unwrap();

        // The gate reopens once the exchange settles.
        assert_eq!(handle.handshake_settled().await, HandshakeState::Complete);
        handle.request_handshake().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_ends_task() {
        let (handle, _device, task) = spawn_session().await;
        handle.stop().await;
        task.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_interrupts_hung_handshake() {
        // Device stays silent and no timeout is configured, so the
        // exchange would block forever; stop() must still end the task.
        let (handle, _device, task) = spawn_session().await;

        handle.request_handshake().await.unwrap();
        tokio::task::yield_now().await;
        handle.stop().await;

        tokio::time::timeout(Duration::from_secs(2), task)
            .await
            .expect("session task kept running after stop()")
            .unwrap();
        assert_eq!(handle.handshake_state(), HandshakeState::Idle);
    }
}
