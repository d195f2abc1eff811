//! VT byte-stream front end: UTF-8 decoding, escape-sequence parsing, and the
//! CSI parameter model.
//!
//! Everything downstream of a file descriptor and upstream of terminal
//! semantics lives here. The parser is a faithful DEC-ANSI state machine
//! (vt100.net/emu/dec_ansi_parser) with one extension: an `Ss3` state used
//! only when parsing input from the host terminal.
//!
//! Invariants:
//! - The decoder emits exactly one U+FFFD per maximal invalid subpart.
//! - Parser output order matches input byte order.
//! - A malformed escape sequence never produces an event; the machine
//!   resynchronizes at the next `ESC`, `CAN`, or `SUB`.

mod params;
mod parser;
mod utf8;

pub use params::{Params, Subparams};
pub use parser::{
    ControlCharacter, Csi, Dcs, Escape, EscapeSequenceParser, Osc, ParserEvent, ParserMode,
};
pub use utf8::Utf8StreamDecoder;
