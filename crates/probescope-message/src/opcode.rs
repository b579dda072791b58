//! Frame kinds, opcodes and field tags.

use std::fmt;

/// Frame-kind selector: command (host to device, or device notification).
pub const KIND_COMMAND: u8 = 0x43;
/// Frame-kind selector: result/response.
pub const KIND_RESPONSE: u8 = 0x52;

/// Opcode: request sample data.
pub const REQUEST_SAMPLE_DATA: u8 = 0x73;
/// Opcode: triggered. A notification as a command, a sample push as a response.
pub const TRIGGERED: u8 = 0x74;
/// Opcode: write registers.
pub const WRITE_REGISTERS: u8 = 0x77;
/// Opcode: read registers.
pub const READ_REGISTERS: u8 = 0x72;

/// Field tag preceding a length field (`'L'`).
pub const LENGTH_TAG: u8 = 0x4C;
/// Field tag preceding a data field (`'D'`).
pub const DATA_TAG: u8 = 0x44;
/// Field tag preceding an address field (`'A'`).
pub const ADDRESS_TAG: u8 = 0x41;

/// Payload byte 0.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FrameKind {
    Command,
    Response,
}

impl FrameKind {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            KIND_COMMAND => Some(Self::Command),
            KIND_RESPONSE => Some(Self::Response),
            _ => None,
        }
    }

    pub fn as_byte(self) -> u8 {
        match self {
            Self::Command => KIND_COMMAND,
            Self::Response => KIND_RESPONSE,
        }
    }
}

impl fmt::Display for FrameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Command => f.write_str("command"),
            Self::Response => f.write_str("response"),
        }
    }
}

/// Payload byte 1.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Opcode {
    RequestSampleData,
    Triggered,
    WriteRegisters,
    ReadRegisters,
}

impl Opcode {
    pub fn from_byte(byte: u8) -> Option<Self> {
        match byte {
            REQUEST_SAMPLE_DATA => Some(Self::RequestSampleData),
            TRIGGERED => Some(Self::Triggered),
            WRITE_REGISTERS => Some(Self::WriteRegisters),
            READ_REGISTERS => Some(Self::ReadRegisters),
            _ => None,
        }
    }

    pub fn as_byte(self) -> u8 {
        match self {
            Self::RequestSampleData => REQUEST_SAMPLE_DATA,
            Self::Triggered => TRIGGERED,
            Self::WriteRegisters => WRITE_REGISTERS,
            Self::ReadRegisters => READ_REGISTERS,
        }
    }

    /// Short name for logs and CLI output.
    pub fn name(self) -> &'static str {
        match self {
            Self::RequestSampleData => "request-sample-data",
            Self::Triggered => "triggered",
            Self::WriteRegisters => "write-registers",
            Self::ReadRegisters => "read-registers",
        }
    }
}

impl fmt::Display for Opcode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}
