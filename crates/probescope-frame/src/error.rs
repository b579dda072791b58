use crate::wire::marker_name;

/// Errors that can occur during frame encoding/decoding.
#[derive(Debug, thiserror::Error)]
pub enum FrameError {
    /// The stuffed input ended with an escape marker and no escaped byte.
    #[error("stuffed input ends with a dangling escape byte")]
    TrailingEscape,

    /// The payload exceeds the configured maximum size.
    #[error("payload too large ({size} bytes, max {max})")]
    PayloadTooLarge { size: usize, max: usize },

    /// An I/O error occurred while reading or writing frames.
    #[error("frame I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The stream ended before a complete frame was received.
    #[error("connection closed (incomplete frame)")]
    ConnectionClosed,
}

/// Non-fatal framing violations reported by the parser.
///
/// The parser discards the offending input and stays usable; these are
/// surfaced so callers can log or count them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum FrameWarning {
    /// A byte arrived outside any frame.
    #[error("unexpected byte {} between frames", describe_byte(.0))]
    StrayByte(u8),

    /// A frame grew past the maximum frame size and was discarded.
    #[error("frame exceeded {max} bytes before its end marker, discarded")]
    FrameTooLarge { max: usize },
}

pub type Result<T> = std::result::Result<T, FrameError>;

fn describe_byte(byte: &u8) -> String {
    match marker_name(*byte) {
        Some(name) => format!("0x{byte:02X} ({name})"),
        None => format!("0x{byte:02X}"),
    }
}
