//! Reserved marker bytes.
//!
//! These values are fixed by the device firmware and are not configurable.

/// Start-of-message marker.
pub const START: u8 = 0x1E;

/// End-of-message marker.
pub const END: u8 = 0x04;

/// End-of-block marker. No decoder assigns it meaning, but it is escaped
/// like the other markers.
pub const BLOCK_END: u8 = 0x17;

/// Escape marker: the next raw byte is literal.
pub const ESCAPE: u8 = 0x1A;

/// Every byte value that must be escaped inside a payload.
pub const RESERVED: [u8; 4] = [ESCAPE, START, END, BLOCK_END];

/// Returns true if `byte` must be escaped inside a payload.
pub fn is_reserved(byte: u8) -> bool {
    matches!(byte, ESCAPE | START | END | BLOCK_END)
}

/// Returns a human-readable name for a marker byte.
pub fn marker_name(byte: u8) -> Option<&'static str> {
    match byte {
        START => Some("START"),
        END => Some("END"),
        BLOCK_END => Some("BLOCK_END"),
        ESCAPE => Some("ESCAPE"),
        _ => None,
    }
}
