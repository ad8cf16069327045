//! Typed event dispatch for decoded, debounced input.
//!
//! The dispatcher is owned by its session and holds exactly one handler
//! per named channel. Default handlers make the bridge useful with zero
//! consumer registration: they accumulate dots on the board and commit a
//! cell's mask to the input buffer when focus leaves it. Consumers
//! override behavior by replacing a handler, never by chaining.

use log::{debug, error, info};
use serde::Serialize;

use bwt_protocol::wire::MAIN_CLUSTER_CELL;

use crate::board::Board;

/// The fixed capability set of event channels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EventChannel {
    Board,
    MainBtn,
    AltBtn,
    Cells,
    ChangeCell,
}

impl EventChannel {
    pub const ALL: [EventChannel; 5] = [
        EventChannel::Board,
        EventChannel::MainBtn,
        EventChannel::AltBtn,
        EventChannel::Cells,
        EventChannel::ChangeCell,
    ];

    /// The registration name the collaborator layers use.
    pub fn name(self) -> &'static str {
        match self {
            EventChannel::Board => "onBoardEvent",
            EventChannel::MainBtn => "onMainBtnEvent",
            EventChannel::AltBtn => "onAltBtnEvent",
            EventChannel::Cells => "onCellsEvent",
            EventChannel::ChangeCell => "onChangeCellEvent",
        }
    }

    pub fn from_name(name: &str) -> Option<EventChannel> {
        EventChannel::ALL.into_iter().find(|c| c.name() == name)
    }

    fn index(self) -> usize {
        match self {
            EventChannel::Board => 0,
            EventChannel::MainBtn => 1,
            EventChannel::AltBtn => 2,
            EventChannel::Cells => 3,
            EventChannel::ChangeCell => 4,
        }
    }
}

/// A typed notification derived from one decoded message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub enum BwtEvent {
    /// The single special/alt key.
    AltBtn { message: String },
    /// A main-cluster dot key; `dot` is 1-6.
    MainBtn { message: String, dot: u8 },
    /// A dot press on a content cell.
    Cells { message: String, cell: usize, dot: u8 },
    /// Focus moved from one cell to another.
    ChangeCell { old_cell: usize, new_cell: usize },
    /// Generic event fired last for every input-carrying message.
    Board {
        message: String,
        cell: Option<usize>,
        cell_bits: u8,
        dot: Option<u8>,
    },
}

impl BwtEvent {
    pub fn channel(&self) -> EventChannel {
        match self {
            BwtEvent::AltBtn { .. } => EventChannel::AltBtn,
            BwtEvent::MainBtn { .. } => EventChannel::MainBtn,
            BwtEvent::Cells { .. } => EventChannel::Cells,
            BwtEvent::ChangeCell { .. } => EventChannel::ChangeCell,
            BwtEvent::Board { .. } => EventChannel::Board,
        }
    }
}

/// Mutable state a handler may act on.
pub struct BoardCtx<'a> {
    pub board: &'a mut Board,
    pub input_buffer: &'a mut Vec<u8>,
}

pub type Handler = Box<dyn FnMut(&BwtEvent, &mut BoardCtx<'_>) + Send>;

/// One handler slot per channel.
pub struct EventDispatcher {
    handlers: [Handler; 5],
}

impl Default for EventDispatcher {
    fn default() -> Self {
        Self::new()
    }
}

impl EventDispatcher {
    /// A dispatcher with the default handlers installed.
    pub fn new() -> Self {
        Self {
            handlers: [
                Box::new(default_board_handler),
                Box::new(default_main_btn_handler),
                Box::new(default_alt_btn_handler),
                Box::new(default_cells_handler),
                Box::new(default_change_cell_handler),
            ],
        }
    }

    /// Replace the handler for a named channel. Returns false if the
    /// name is outside the capability set.
    pub fn replace_listener(&mut self, name: &str, handler: Handler) -> bool {
        match EventChannel::from_name(name) {
            Some(channel) => {
                info!("Replacing listener on {}", channel.name());
                self.handlers[channel.index()] = handler;
                true
            }
            None => {
                error!("Unrecognized event channel: {:?}", name);
                false
            }
        }
    }

    pub fn dispatch(&mut self, event: &BwtEvent, ctx: &mut BoardCtx<'_>) {
        (self.handlers[event.channel().index()])(event, ctx);
    }
}

fn default_board_handler(event: &BwtEvent, _ctx: &mut BoardCtx<'_>) {
    // No default behavior; the channel exists for consumers.
    debug!("Board event: {:?}", event);
}

fn default_main_btn_handler(event: &BwtEvent, ctx: &mut BoardCtx<'_>) {
    if let BwtEvent::MainBtn { dot, .. } = event {
        if let Err(e) = ctx.board.handle_new_input(MAIN_CLUSTER_CELL, *dot) {
            error!("Main button input rejected: {}", e);
        }
    }
}

fn default_alt_btn_handler(event: &BwtEvent, _ctx: &mut BoardCtx<'_>) {
    // The alt key has no default meaning; consumers decide.
    debug!("Alt button event: {:?}", event);
}

fn default_cells_handler(event: &BwtEvent, ctx: &mut BoardCtx<'_>) {
    if let BwtEvent::Cells { cell, dot, .. } = event {
        if let Err(e) = ctx.board.handle_new_input(*cell, *dot) {
            error!("Cell input rejected: {}", e);
        }
    }
}

fn default_change_cell_handler(event: &BwtEvent, ctx: &mut BoardCtx<'_>) {
    if let BwtEvent::ChangeCell { old_cell, .. } = event {
        // The departed cell's gesture is committed and its mask reset.
        let bits = ctx.board.bits_at(*old_cell);
        ctx.input_buffer.push(bits);
        ctx.board.set_bits_at(*old_cell, 0);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_channel_names_round_trip() {
        for channel in EventChannel::ALL {
            assert_eq!(EventChannel::from_name(channel.name()), Some(channel));
        }
        assert_eq!(EventChannel::from_name("onFooEvent"), None);
    }

    #[test]
    fn test_default_cells_handler_sets_bits() {
        let mut dispatcher = EventDispatcher::new();
        let mut board = Board::default();
        let mut buffer = Vec::new();

        let event = BwtEvent::Cells {
            message: "12".into(),
            cell: 1,
            dot: 2,
        };
        dispatcher.dispatch(
            &event,
            &mut BoardCtx {
                board: &mut board,
                input_buffer: &mut buffer,
            },
        );
        assert_eq!(board.bits_at(1), 0b10);
        assert!(buffer.is_empty());
    }

    #[test]
    fn test_default_change_cell_handler_commits_and_resets() {
        let mut dispatcher = EventDispatcher::new();
        let mut board = Board::default();
        board.handle_new_input(1, 2).unwrap();
        let mut buffer = Vec::new();

        let event = BwtEvent::ChangeCell {
            old_cell: 1,
            new_cell: 2,
        };
        dispatcher.dispatch(
            &event,
            &mut BoardCtx {
                board: &mut board,
                input_buffer: &mut buffer,
            },
        );
        assert_eq!(buffer, vec![0b10]);
        assert_eq!(board.bits_at(1), 0);
    }

    #[test]
    fn test_replace_listener() {
        let mut dispatcher = EventDispatcher::new();
        let mut board = Board::default();
        let mut buffer = Vec::new();

        assert!(!dispatcher.replace_listener("onBogusEvent", Box::new(|_, _| {})));
        assert!(dispatcher.replace_listener(
            "onCellsEvent",
            Box::new(|_, ctx| {
                // Replacement handler: record a marker instead of dots.
                ctx.input_buffer.push(0xFF);
            })
        ));

        let event = BwtEvent::Cells {
            message: "12".into(),
            cell: 1,
            dot: 2,
        };
        dispatcher.dispatch(
            &event,
            &mut BoardCtx {
                board: &mut board,
                input_buffer: &mut buffer,
            },
        );
        assert_eq!(buffer, vec![0xFF]);
        assert_eq!(board.bits_at(1), 0);
    }
}
