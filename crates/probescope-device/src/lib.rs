//! Device sessions for ProbeScope instruments.
//!
//! [`connect`] splits a byte link into a [`Device`] (commands) and a
//! [`DeviceReader`] (draining and decoding). Both go through one
//! [`SharedLink`](probescope_link::SharedLink), so reads never interleave with
//! a command being written, and both share the [`RequestTracker`] that keeps
//! at most one sample request in flight.
//!
//! The [`Emulator`] plays the instrument's side of the protocol and is what
//! the tests and the `probescope emulate` command talk to.

pub mod clock;
pub mod config;
pub mod connector;
pub mod device;
pub mod emulator;
pub mod error;
pub mod tracker;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::DeviceConfig;
pub use connector::{connect, connect_with_clock, connect_with_config};
pub use device::{Device, DeviceReader, ReaderHandle};
pub use emulator::{Emulator, EmulatorConfig};
pub use error::{DeviceError, Result};
pub use tracker::{PendingRequest, RequestTracker};
