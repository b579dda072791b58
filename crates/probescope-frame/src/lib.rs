//! Escape-stuffed framing for the ProbeScope serial protocol.
//!
//! Every frame on the wire is delimited by reserved marker bytes:
//! - `0x1E` starts a frame, `0x04` ends it
//! - `0x1A` escapes the next byte so it is taken literally
//! - `0x17` (end of block) is reserved and always escaped inside payloads
//!
//! There is no length prefix. The [`FrameParser`] consumes one byte at a time
//! and yields the unstuffed payload when the end marker arrives; the
//! interpretation of that payload lives in `probescope-message`.

pub mod codec;
pub mod error;
pub mod parser;
pub mod reader;
pub mod wire;
pub mod writer;

pub use codec::{
    encode_frame, escape, escape_into, escaped_len, unescape, Frame, FrameConfig,
    DEFAULT_MAX_FRAME_SIZE,
};
pub use error::{FrameError, FrameWarning, Result};
pub use parser::{FrameParser, ParseState};
pub use reader::FrameReader;
pub use wire::{is_reserved, BLOCK_END, END, ESCAPE, RESERVED, START};
pub use writer::FrameWriter;
