//! Wire protocol definitions for the BWT serial bridge.
//!
//! This crate defines the byte-level protocol spoken between the Braille
//! writing tablet (or its emulator) and client software. There is no I/O
//! here; the bridge crate feeds raw bytes in and gets tokens out.
//!
//! # Framing
//!
//! The device emits short ASCII tokens separated by delimiter bytes:
//!
//! ```text
//!   d n 1 2 n b t
//!   ^   ^     ^
//!   |   |     +-- "bt": handshake sentinel, terminated by 't'
//!   |   +-- "12": cell code, terminated by the filler 'n'
//!   +-- "d": main-button code
//! ```
//!
//! A token boundary is declared on the filler byte `'n'` or the
//! terminator `'t'`; a `'t'` is appended to the in-progress token before
//! the flush so the sentinel survives as the two-character token `"bt"`.
//! Tokens longer than [`wire::MAX_TOKEN_LEN`] are a decode overflow: the
//! excess byte is dropped and decoding resumes at the next delimiter.
//!
//! This framing is deliberately simple and not escape-safe: a literal
//! `'n'` or `'t'` inside a would-be multi-character token is
//! indistinguishable from a delimiter. That is a known weakness of the
//! device protocol, reproduced here for compatibility.
//!
//! # Example
//!
//! ```rust
//! use bwt_protocol::{InputCode, TokenDecoder};
//!
//! let mut decoder = TokenDecoder::new();
//! let tokens = decoder.push(b"dn12n");
//! assert_eq!(tokens, vec!["d".to_string(), "12".to_string()]);
//!
//! assert_eq!(InputCode::parse("d").unwrap(), Some(InputCode::Main { dot: 3 }));
//! assert_eq!(InputCode::parse("12").unwrap(), Some(InputCode::Cell { cell: 1, dot: 2 }));
//! ```

pub mod braille;
pub mod classify;
pub mod decoder;
pub mod error;
pub mod wire;

pub use classify::{clean_message, InputCode};
pub use decoder::TokenDecoder;
pub use error::ProtocolError;
pub use wire::{
    DEBOUNCE_WINDOW, FILLER, FILLER_INTERVAL, MAX_TOKEN_LEN, READ_BUF_SIZE, SENTINEL, TERMINATOR,
};
