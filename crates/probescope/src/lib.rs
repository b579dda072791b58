//! ProbeScope instrument protocol.
//!
//! A host talks to the acquisition device over a serial link using
//! escape-stuffed frames. This crate re-exports the layers:
//!
//! - [`link`]: shared byte link with a bounded lock wait
//! - [`frame`]: markers, escaping, the byte-at-a-time frame parser
//! - [`message`]: typed messages, dispatcher, command encoder
//! - [`device`]: device session, request tracking, emulator (behind `device`)

/// Re-export link types.
pub mod link {
    pub use probescope_link::*;
}

/// Re-export frame types.
pub mod frame {
    pub use probescope_frame::*;
}

/// Re-export message types.
pub mod message {
    pub use probescope_message::*;
}

/// Re-export device types (requires `device` feature).
#[cfg(feature = "device")]
pub mod device {
    pub use probescope_device::*;
}
