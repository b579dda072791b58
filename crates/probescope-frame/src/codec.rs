use bytes::{BufMut, Bytes, BytesMut};

use crate::error::{FrameError, Result};
use crate::wire::{is_reserved, END, ESCAPE, START};

/// Default maximum unstuffed frame size: 64 KiB.
///
/// The largest frame the device sends is a sample block of a few thousand
/// bytes; anything far beyond that is a lost end marker.
pub const DEFAULT_MAX_FRAME_SIZE: usize = 64 * 1024;

/// One complete frame with its markers and escapes removed.
///
/// The payload starts with the frame-kind byte and the opcode byte; everything
/// after them is opcode-specific.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    /// The unstuffed payload.
    pub payload: Bytes,
}

impl Frame {
    /// Create a new frame.
    pub fn new(payload: impl Into<Bytes>) -> Self {
        Self {
            payload: payload.into(),
        }
    }

    /// The frame-kind selector (payload byte 0), if present.
    pub fn kind_byte(&self) -> Option<u8> {
        self.payload.first().copied()
    }

    /// The opcode (payload byte 1), if present.
    pub fn opcode_byte(&self) -> Option<u8> {
        self.payload.get(1).copied()
    }

    /// The total wire size of this frame (markers + stuffed payload).
    pub fn wire_size(&self) -> usize {
        2 + escaped_len(&self.payload)
    }

    /// Append the wire form of this frame to `dst`.
    pub fn encode(&self, dst: &mut BytesMut) {
        encode_frame(&self.payload, dst);
    }
}

/// Number of bytes `data` occupies once escaped.
pub fn escaped_len(data: &[u8]) -> usize {
    data.len() + data.iter().filter(|&&b| is_reserved(b)).count()
}

/// Append `data` to `dst`, preceding every reserved byte with `ESCAPE`.
pub fn escape_into(data: &[u8], dst: &mut BytesMut) {
    dst.reserve(escaped_len(data));
    for &byte in data {
        if is_reserved(byte) {
            dst.put_u8(ESCAPE);
        }
        dst.put_u8(byte);
    }
}

/// Escape `data` into a fresh buffer.
pub fn escape(data: &[u8]) -> Bytes {
    let mut dst = BytesMut::with_capacity(escaped_len(data));
    escape_into(data, &mut dst);
    dst.freeze()
}

/// Remove escaping from a stuffed byte sequence.
///
/// Any byte following `ESCAPE` is taken literally. A trailing `ESCAPE` with
/// nothing after it is rejected.
pub fn unescape(stuffed: &[u8]) -> Result<Bytes> {
    let mut out = BytesMut::with_capacity(stuffed.len());
    let mut bytes = stuffed.iter();
    while let Some(&byte) = bytes.next() {
        if byte == ESCAPE {
            let &literal = bytes.next().ok_or(FrameError::TrailingEscape)?;
            out.put_u8(literal);
        } else {
            out.put_u8(byte);
        }
    }
    Ok(out.freeze())
}

/// Encode a frame into the wire format.
///
/// Wire format:
/// ```text
/// ┌─────────┬──────────────────────────────┬─────────┐
/// │ START   │ Payload, reserved bytes       │ END     │
/// │ 0x1E    │ preceded by ESCAPE (0x1A)     │ 0x04    │
/// └─────────┴──────────────────────────────┴─────────┘
/// ```
pub fn encode_frame(payload: &[u8], dst: &mut BytesMut) {
    dst.reserve(2 + escaped_len(payload));
    dst.put_u8(START);
    escape_into(payload, dst);
    dst.put_u8(END);
}

/// Configuration for frame parsing and writing.
#[derive(Debug, Clone)]
pub struct FrameConfig {
    /// Maximum unstuffed frame size in bytes. Default: 64 KiB.
    pub max_frame_size: usize,
}

impl Default for FrameConfig {
    fn default() -> Self {
        Self {
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
        }
    }
}
