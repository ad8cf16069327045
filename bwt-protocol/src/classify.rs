//! Message cleaning and input classification.
//!
//! The device vocabulary is small: one alt key, six main-cluster dot
//! keys, and per-cell dot codes. Classification order matters and first
//! match wins, mirroring the device firmware.

use serde::{Deserialize, Serialize};

use crate::decoder::is_sentinel;
use crate::error::ProtocolError;
use crate::wire::REFERENCE_ALPHABET;

/// A classified input code.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum InputCode {
    /// The single special/alt key ("a"). Not addressed to any cell.
    Alt,
    /// A main-cluster dot key ("b".."g"); `dot` is the offset in the
    /// reference alphabet, so "d" carries dot 3.
    Main { dot: u8 },
    /// A dot press on a content cell, decoded from a digit code.
    Cell { cell: usize, dot: u8 },
}

/// Normalize a raw token before classification: lowercase, strip any
/// residual filler characters, trim whitespace.
pub fn clean_message(raw: &str) -> String {
    raw.to_ascii_lowercase().replace('n', "").trim().to_string()
}

impl InputCode {
    /// Classify a cleaned message.
    ///
    /// Returns `Ok(None)` for messages that are valid but carry no input
    /// (the empty message and the `"bt"` sentinel).
    ///
    /// Cell codes are 2-3 ASCII digits: the final digit is the dot
    /// number (1-6), the leading digits are the cell index. `"12"` is
    /// cell 1, dot 2; `"103"` is cell 10, dot 3. The physical device's
    /// encoding is not pinned down by the historical sources, so this
    /// rule is a protocol parameter deliberately confined to this
    /// function.
    pub fn parse(message: &str) -> Result<Option<InputCode>, ProtocolError> {
        if message.is_empty() || is_sentinel(message) {
            return Ok(None);
        }

        if message.len() == 1 {
            if let Some(offset) = REFERENCE_ALPHABET.find(message) {
                return Ok(Some(if offset == 0 {
                    InputCode::Alt
                } else {
                    InputCode::Main { dot: offset as u8 }
                }));
            }
        }

        if !message.bytes().all(|b| b.is_ascii_digit()) {
            return Err(ProtocolError::UnknownCode(message.to_string()));
        }
        if message.len() < 2 || message.len() > 3 {
            return Err(ProtocolError::BadCellCode {
                code: message.to_string(),
                reason: "expected 2-3 digits",
            });
        }

        let (cell_part, dot_part) = message.split_at(message.len() - 1);
        let dot: u8 = dot_part.parse().expect("checked ascii digits");
        if !(1..=6).contains(&dot) {
            return Err(ProtocolError::BadCellCode {
                code: message.to_string(),
                reason: "dot must be 1-6",
            });
        }
        let cell: usize = cell_part.parse().expect("checked ascii digits");

        Ok(Some(InputCode::Cell { cell, dot }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_clean_message() {
        assert_eq!(clean_message("D"), "d");
        assert_eq!(clean_message("n12n"), "12");
        assert_eq!(clean_message(" bt "), "bt");
        assert_eq!(clean_message("nn"), "");
    }

    #[test]
    fn test_alt_is_exactly_a() {
        assert_eq!(InputCode::parse("a").unwrap(), Some(InputCode::Alt));
        // The empty message is not the alt key.
        assert_eq!(InputCode::parse("").unwrap(), None);
    }

    #[test]
    fn test_main_button_dot_offsets() {
        assert_eq!(
            InputCode::parse("b").unwrap(),
            Some(InputCode::Main { dot: 1 })
        );
        assert_eq!(
            InputCode::parse("d").unwrap(),
            Some(InputCode::Main { dot: 3 })
        );
        assert_eq!(
            InputCode::parse("g").unwrap(),
            Some(InputCode::Main { dot: 6 })
        );
    }

    #[test]
    fn test_cell_codes() {
        assert_eq!(
            InputCode::parse("12").unwrap(),
            Some(InputCode::Cell { cell: 1, dot: 2 })
        );
        assert_eq!(
            InputCode::parse("103").unwrap(),
            Some(InputCode::Cell { cell: 10, dot: 3 })
        );
    }

    #[test]
    fn test_sentinel_is_not_input() {
        assert_eq!(InputCode::parse("bt").unwrap(), None);
    }

    #[test]
    fn test_bad_codes() {
        assert!(matches!(
            InputCode::parse("z"),
            Err(ProtocolError::UnknownCode(_))
        ));
        assert!(matches!(
            InputCode::parse("5"),
            Err(ProtocolError::BadCellCode { .. })
        ));
        assert!(matches!(
            InputCode::parse("19"),
            Err(ProtocolError::BadCellCode { .. })
        ));
        assert!(matches!(
            InputCode::parse("1234"),
            Err(ProtocolError::BadCellCode { .. })
        ));
    }
}
