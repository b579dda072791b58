//! Typed messages for the ProbeScope protocol.
//!
//! Inbound, a [`MessageDecoder`] runs the frame parser and hands each
//! completed payload to the dispatcher, which selects a typed decoder from the
//! frame kind (byte 0) and opcode (byte 1). Outbound, [`Command`] and the
//! helpers in [`command`] build stuffed command frames.
//!
//! Nothing in this crate fails hard on bad input. Violations come back as
//! [`ProtocolWarning`]s next to whatever could still be decoded.
//!
//! # Feature flags
//!
//! - `async`: [`ProbeCodec`], a `tokio_util::codec` adapter.

pub mod command;
pub mod decode;
pub mod decoder;
pub mod dispatch;
pub mod message;
pub mod opcode;
pub mod reply;
pub mod warning;

#[cfg(feature = "async")]
pub mod codec;

#[cfg(feature = "async")]
pub use codec::ProbeCodec;
pub use command::{
    init_dac, read_registers, request_samples, set_dac, set_vga, write_registers, Command,
    VGA_FULL_SCALE,
};
pub use decoder::{Decoded, MessageDecoder};
pub use dispatch::dispatch;
pub use message::{
    Message, RegisterReadResult, RegisterWriteAck, SampleBlock, TriggerNotification,
};
pub use opcode::{FrameKind, Opcode};
pub use warning::{IntegrityWarning, ProtocolWarning};
