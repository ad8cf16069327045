//! Streaming token decoder for the raw device byte stream.

use crate::error::ProtocolError;
use crate::wire::{FILLER, MAX_TOKEN_LEN, SENTINEL, TERMINATOR};

/// Incremental decoder that turns raw bytes into discrete tokens.
///
/// Feed it chunks as they arrive from the channel; each call returns the
/// tokens completed by that chunk. Partial tokens are carried across
/// calls, so the decoder can be driven from a read loop of any chunking.
///
/// A boundary is declared on [`FILLER`] or [`TERMINATOR`]. The
/// terminator is appended to the token before flushing, which is what
/// lets the `"bt"` handshake sentinel through as a single token. Bytes
/// past [`MAX_TOKEN_LEN`] are dropped and reported through
/// [`TokenDecoder::take_errors`]; the 6 buffered bytes still flush at
/// the next boundary, matching the device firmware's tolerance for a
/// glitched stream.
#[derive(Debug, Default)]
pub struct TokenDecoder {
    /// In-progress token, never longer than [`MAX_TOKEN_LEN`].
    token: Vec<u8>,
    /// Overflow errors accumulated since the last [`take_errors`] call.
    ///
    /// [`take_errors`]: TokenDecoder::take_errors
    errors: Vec<ProtocolError>,
}

impl TokenDecoder {
    pub fn new() -> Self {
        Self {
            token: Vec::with_capacity(MAX_TOKEN_LEN),
            errors: Vec::new(),
        }
    }

    /// Ingest a chunk of raw bytes and return the tokens it completed.
    ///
    /// Empty tokens (a run of delimiter bytes) are emitted as empty
    /// strings; the caller's cleaning step discards them.
    pub fn push(&mut self, bytes: &[u8]) -> Vec<String> {
        let mut tokens = Vec::new();

        for &b in bytes {
            if b == FILLER || b == TERMINATOR {
                if b == TERMINATOR && self.token.len() < MAX_TOKEN_LEN {
                    // Keep the sentinel's 't' so "bt" survives as one token.
                    self.token.push(b);
                }
                tokens.push(String::from_utf8_lossy(&self.token).into_owned());
                self.token.clear();
            } else if self.token.len() >= MAX_TOKEN_LEN {
                self.errors.push(ProtocolError::DecodeOverflow {
                    byte: b,
                    max: MAX_TOKEN_LEN,
                });
            } else {
                self.token.push(b);
            }
        }

        tokens
    }

    /// Drain the overflow errors recorded since the last call.
    pub fn take_errors(&mut self) -> Vec<ProtocolError> {
        std::mem::take(&mut self.errors)
    }

    /// Discard any partial token, e.g. after a reconnect.
    pub fn reset(&mut self) {
        self.token.clear();
        self.errors.clear();
    }
}

/// True if the raw token is the handshake sentinel.
pub fn is_sentinel(token: &str) -> bool {
    token.as_bytes() == SENTINEL
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_single_tokens() {
        let mut dec = TokenDecoder::new();
        assert_eq!(dec.push(b"dn"), vec!["d"]);
        assert_eq!(dec.push(b"12n"), vec!["12"]);
        assert!(dec.take_errors().is_empty());
    }

    #[test]
    fn test_token_split_across_chunks() {
        let mut dec = TokenDecoder::new();
        assert!(dec.push(b"1").is_empty());
        assert_eq!(dec.push(b"2n"), vec!["12"]);
    }

    #[test]
    fn test_sentinel_survives_terminator() {
        let mut dec = TokenDecoder::new();
        assert_eq!(dec.push(b"bt"), vec!["bt"]);
        assert!(is_sentinel("bt"));
        assert!(!is_sentinel("b"));
    }

    #[test]
    fn test_round_trip_token_sequence() {
        // Any valid token sequence joined by fillers decodes back exactly.
        let tokens = ["d", "12", "a", "103", "g"];
        let mut stream = Vec::new();
        for t in &tokens {
            stream.extend_from_slice(t.as_bytes());
            stream.push(FILLER);
        }

        let mut dec = TokenDecoder::new();
        let decoded = dec.push(&stream);
        assert_eq!(decoded, tokens);
    }

    #[test]
    fn test_empty_tokens_from_filler_run() {
        let mut dec = TokenDecoder::new();
        assert_eq!(dec.push(b"nn"), vec!["", ""]);
    }

    #[test]
    fn test_overflow_drops_excess_and_recovers() {
        let mut dec = TokenDecoder::new();
        let tokens = dec.push(b"abcdefgh n12n");
        // First 6 bytes are kept, the rest dropped until the delimiter.
        assert_eq!(tokens, vec!["abcdef", "12"]);

        let errors = dec.take_errors();
        assert_eq!(errors.len(), 3); // 'g', 'h', ' '
        assert!(matches!(
            errors[0],
            ProtocolError::DecodeOverflow { byte: b'g', max: 6 }
        ));
        assert!(dec.take_errors().is_empty());
    }

    #[test]
    fn test_reset_discards_partial() {
        let mut dec = TokenDecoder::new();
        dec.push(b"12");
        dec.reset();
        assert_eq!(dec.push(b"3n"), vec!["3"]);
    }
}
