//! Wire-level constants of the BWT device protocol.

use std::time::Duration;

/// Filler byte: handshake keepalive and steady-state token delimiter.
pub const FILLER: u8 = b'n';

/// Terminator byte: second half of the `"bt"` sentinel, also a delimiter.
pub const TERMINATOR: u8 = b't';

/// Handshake completion sentinel, sent in both directions.
pub const SENTINEL: &[u8; 2] = b"bt";

/// Cadence at which the filler byte is emitted during the handshake.
pub const FILLER_INTERVAL: Duration = Duration::from_millis(100);

/// Window during which a repeated token is suppressed.
pub const DEBOUNCE_WINDOW: Duration = Duration::from_millis(300);

/// Maximum token length. The device never emits more than 6 bytes
/// between delimiters; anything longer is a decode overflow.
pub const MAX_TOKEN_LEN: usize = 6;

/// Size of the raw read buffer used by the session loop.
pub const READ_BUF_SIZE: usize = 1024;

/// Nominal line rate of the physical device (8N1). Parameter setup is
/// delegated to the platform serial driver; recorded here for reference.
pub const BAUD_RATE: u32 = 57_600;

/// Default board size: 32 content cells plus the main control cluster.
pub const DEFAULT_CELL_COUNT: usize = 33;

/// Index of the main control cluster within the board.
pub const MAIN_CLUSTER_CELL: usize = 0;

/// Reference alphabet for button classification. Offset 0 is the alt
/// button; offsets 1-6 are the main-cluster dot keys.
pub const REFERENCE_ALPHABET: &str = "abcdefg";
