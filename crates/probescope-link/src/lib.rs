//! Byte-link abstraction for ProbeScope instrument connections.
//!
//! The link is whatever carries raw bytes between host and device: a serial
//! port, a pty, a FIFO pair, or the in-memory [`MemoryLink`] used by tests and
//! the device emulator. Opening and configuring the underlying port is the
//! caller's job; this crate only arbitrates access to it.
//!
//! Reads and writes share one lock ([`SharedLink`]) so a drain in progress
//! never interleaves with a command being written. Lock acquisition is
//! bounded: a caller that cannot get the link within the configured wait gets
//! [`LinkError::LockTimeout`] instead of blocking.

pub mod error;
pub mod memory;
pub mod shared;
pub mod traits;

pub use error::{LinkError, Result};
pub use memory::MemoryLink;
pub use shared::{SharedLink, DEFAULT_LOCK_TIMEOUT};
pub use traits::ByteLink;
