use std::time::Duration;

use probescope_frame::FrameWarning;

use crate::opcode::FrameKind;

/// Non-fatal protocol violations.
///
/// None of these stop the stream. The offending frame is dropped or decoded
/// best-effort, and the decoder keeps accepting bytes.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ProtocolWarning {
    /// Framing violation (stray byte, oversized frame).
    #[error(transparent)]
    Framing(#[from] FrameWarning),

    /// A frame stayed open past the idle-frame timeout and was discarded.
    #[error("frame open for {0:?} without an end marker, discarded")]
    FrameIdleTimeout(Duration),

    /// A frame with no kind byte.
    #[error("empty frame")]
    EmptyFrame,

    /// The frame-kind selector is not command or response.
    #[error("unknown frame kind 0x{kind:02X} ({len} bytes)")]
    UnknownKind { kind: u8, len: usize },

    /// The frame ends after its kind byte.
    #[error("{kind} frame has no opcode")]
    MissingOpcode { kind: FrameKind },

    /// No decoder exists for this kind/opcode pair.
    #[error("unknown {kind} opcode 0x{opcode:02X}")]
    UnknownOpcode { kind: FrameKind, opcode: u8 },

    /// Declared structure disagrees with the bytes received.
    #[error(transparent)]
    Integrity(#[from] IntegrityWarning),
}

/// Structural-integrity violations found by the typed decoders.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum IntegrityWarning {
    /// A field tag byte is not the expected value.
    #[error("{field} tag at byte {offset} is 0x{found:02X}, expected 0x{expected:02X}")]
    TagMismatch {
        field: &'static str,
        offset: usize,
        expected: u8,
        found: u8,
    },

    /// The payload is shorter than the fixed header.
    #[error("payload has {actual} bytes, fixed layout needs {needed}")]
    Truncated { needed: usize, actual: usize },

    /// Sample bytes received differ from the declared count.
    #[error("received {actual} samples, header declared {declared}")]
    SampleCountMismatch { declared: u32, actual: usize },

    /// Register bytes received differ from the declared length.
    #[error("received {actual} register bytes, header declared {declared}")]
    ReadLengthMismatch { declared: u32, actual: usize },
}

impl ProtocolWarning {
    /// Broad category, for counters and CLI output.
    pub fn category(&self) -> &'static str {
        match self {
            ProtocolWarning::Framing(_) | ProtocolWarning::FrameIdleTimeout(_) => "framing",
            ProtocolWarning::EmptyFrame
            | ProtocolWarning::UnknownKind { .. }
            | ProtocolWarning::MissingOpcode { .. }
            | ProtocolWarning::UnknownOpcode { .. } => "dispatch",
            ProtocolWarning::Integrity(_) => "integrity",
        }
    }
}
