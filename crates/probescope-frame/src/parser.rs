use bytes::{BufMut, BytesMut};

use crate::codec::{Frame, FrameConfig};
use crate::error::FrameWarning;
use crate::wire::{END, ESCAPE, START};

/// Where the parser is relative to frame boundaries.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ParseState {
    /// Outside any frame, waiting for START.
    Idle,
    /// Accumulating payload bytes.
    InFrame {
        /// The previous byte was ESCAPE; the next byte is literal.
        escape_next: bool,
    },
}

/// Byte-at-a-time frame parser.
///
/// One parser lives for the lifetime of a connection. It never fails hard:
/// malformed input produces a [`FrameWarning`], the offending bytes are
/// dropped, and the next START resynchronises.
#[derive(Debug)]
pub struct FrameParser {
    state: ParseState,
    buf: BytesMut,
    max_frame_size: usize,
}

impl Default for FrameParser {
    fn default() -> Self {
        Self::new()
    }
}

impl FrameParser {
    /// Create a parser with the default configuration.
    pub fn new() -> Self {
        Self::with_config(&FrameConfig::default())
    }

    /// Create a parser with an explicit configuration.
    pub fn with_config(config: &FrameConfig) -> Self {
        Self {
            state: ParseState::Idle,
            buf: BytesMut::new(),
            max_frame_size: config.max_frame_size,
        }
    }

    /// Current state.
    pub fn state(&self) -> ParseState {
        self.state
    }

    /// True when outside any frame.
    pub fn is_idle(&self) -> bool {
        self.state == ParseState::Idle
    }

    /// Number of payload bytes accumulated for the open frame.
    pub fn buffered(&self) -> usize {
        self.buf.len()
    }

    /// Maximum unstuffed frame size.
    pub fn max_frame_size(&self) -> usize {
        self.max_frame_size
    }

    /// Update the maximum frame size for subsequent bytes.
    pub fn set_max_frame_size(&mut self, max_frame_size: usize) {
        self.max_frame_size = max_frame_size;
    }

    /// Abandon any partial frame and return to `Idle`.
    pub fn reset(&mut self) {
        self.state = ParseState::Idle;
        self.buf.clear();
    }

    /// Feed a single byte.
    ///
    /// Returns `Ok(Some(frame))` when the byte completes a frame, `Ok(None)`
    /// when more bytes are needed, or `Err(warning)` when the byte was
    /// discarded. The parser remains usable after a warning.
    pub fn feed(&mut self, byte: u8) -> Result<Option<Frame>, FrameWarning> {
        match self.state {
            ParseState::Idle => {
                if byte == START {
                    self.buf.clear();
                    self.state = ParseState::InFrame { escape_next: false };
                    Ok(None)
                } else {
                    Err(FrameWarning::StrayByte(byte))
                }
            }
            ParseState::InFrame { escape_next: true } => {
                self.state = ParseState::InFrame { escape_next: false };
                self.push(byte)
            }
            ParseState::InFrame { escape_next: false } => match byte {
                ESCAPE => {
                    self.state = ParseState::InFrame { escape_next: true };
                    Ok(None)
                }
                END => {
                    self.state = ParseState::Idle;
                    let payload = self.buf.split().freeze();
                    Ok(Some(Frame { payload }))
                }
                _ => self.push(byte),
            },
        }
    }

    fn push(&mut self, byte: u8) -> Result<Option<Frame>, FrameWarning> {
        if self.buf.len() >= self.max_frame_size {
            self.reset();
            return Err(FrameWarning::FrameTooLarge {
                max: self.max_frame_size,
            });
        }
        self.buf.put_u8(byte);
        Ok(None)
    }
}
