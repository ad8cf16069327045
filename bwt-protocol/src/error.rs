//! Error types for the BWT wire protocol.

use thiserror::Error;

/// Errors raised while decoding or classifying device traffic.
///
/// All of these are recoverable: the decoder drops the offending bytes
/// and resumes at the next delimiter, and the session logs and skips
/// tokens that fail to classify.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ProtocolError {
    /// A token exceeded the fixed framing buffer.
    #[error("Token overflow: byte 0x{byte:02X} dropped after {max} buffered bytes")]
    DecodeOverflow { byte: u8, max: usize },

    /// A cleaned message matched neither a button letter nor a cell code.
    #[error("Unrecognized input code: {0:?}")]
    UnknownCode(String),

    /// A cell code had the wrong digit count or a dot outside 1-6.
    #[error("Bad cell code {code:?}: {reason}")]
    BadCellCode { code: String, reason: &'static str },

    /// A cell index beyond the board was addressed.
    #[error("Cell index {cell} out of range (board has {cells} cells)")]
    CellOutOfRange { cell: usize, cells: usize },
}
