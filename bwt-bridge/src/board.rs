//! Board state: per-cell dot masks and the active-cell tracker.

use log::warn;
use serde::Serialize;

use bwt_protocol::wire::DEFAULT_CELL_COUNT;
use bwt_protocol::ProtocolError;

/// The bit-state of every addressable cell on the emulated device.
///
/// Cell 0 is the main control cluster; the rest are content cells. Each
/// cell holds a dot mask with bit `1 << (dot - 1)` per pressed dot.
/// Mutated only by the session's pipeline in response to decoded events.
#[derive(Debug, Clone)]
pub struct Board {
    cells: Vec<u8>,
    /// The cell the last classified event targeted, if any.
    last_active: Option<usize>,
}

/// Read-only snapshot handed to collaborators (the HTTP/UI layers).
#[derive(Debug, Clone, Serialize)]
pub struct BoardSnapshot {
    pub cells: Vec<u8>,
    pub last_active: Option<usize>,
}

impl Default for Board {
    fn default() -> Self {
        Self::new(DEFAULT_CELL_COUNT)
    }
}

impl Board {
    pub fn new(cell_count: usize) -> Self {
        Self {
            cells: vec![0; cell_count],
            last_active: None,
        }
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    /// Set the dot bit in the given cell. Repeated input for a held dot
    /// is idempotent.
    pub fn handle_new_input(&mut self, cell: usize, dot: u8) -> Result<(), ProtocolError> {
        let cells = self.cells.len();
        let mask = self.cells.get_mut(cell).ok_or(ProtocolError::CellOutOfRange { cell, cells })?;
        *mask |= 1 << (dot - 1);
        Ok(())
    }

    pub fn bits_at(&self, cell: usize) -> u8 {
        self.cells.get(cell).copied().unwrap_or_else(|| {
            warn!("bits_at({}) out of range", cell);
            0
        })
    }

    pub fn set_bits_at(&mut self, cell: usize, bits: u8) {
        match self.cells.get_mut(cell) {
            Some(mask) => *mask = bits,
            None => warn!("set_bits_at({}) out of range", cell),
        }
    }

    pub fn last_active(&self) -> Option<usize> {
        self.last_active
    }

    /// Record a classified event's target cell. Returns the previous
    /// active cell when this event moved focus to a different cell;
    /// `None` means no change-cell transition fires. The first ever
    /// event has no previous cell and therefore no transition.
    pub fn touch(&mut self, cell: usize) -> Option<Option<usize>> {
        if self.last_active == Some(cell) {
            return None;
        }
        let old = self.last_active;
        self.last_active = Some(cell);
        Some(old)
    }

    pub fn snapshot(&self) -> BoardSnapshot {
        BoardSnapshot {
            cells: self.cells.clone(),
            last_active: self.last_active,
        }
    }
}
